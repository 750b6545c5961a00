/// SQLite Adapter
///
/// `SqliteDriver` implements the Driver Facade over `rusqlite`;
/// `SqliteDatabase` is the adapter using it. The connection string is a
/// file path, or a `Data Source=<path>` style key/value string.
use crate::core::db::adapter::Database;
use crate::core::db::connection::ConnectionString;
use crate::core::db::driver::{
    Driver, DriverConnection, Record, RecordHandler, COLUMNS_COLLECTION,
    INDEX_COLUMNS_COLLECTION, TABLES_COLLECTION,
};
use crate::core::db::query;
use crate::core::db::schema::{Column, Table};
use crate::core::error::DriverError;
use crate::core::params::{ParameterSet, PARAMETER_PREFIX};
use crate::core::value::Value;
use crate::core::Result;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, Statement};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Constraint-name prefix the driver reports for primary-key columns.
pub const SQLITE_PRIMARY_KEY_PREFIX: &str = "PK_";

const LIST_TABLES_SQL: &str =
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

/// Driver Facade over `rusqlite`. Every `open` creates a new connection.
#[derive(Debug, Clone, Default)]
pub struct SqliteDriver {
    busy_timeout: Option<Duration>,
}

impl SqliteDriver {
    pub fn new(busy_timeout_ms: Option<u64>) -> Self {
        SqliteDriver {
            busy_timeout: busy_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Extracts the file path from a connection string.
    pub fn path_of(connection_string: &str) -> String {
        if !connection_string.contains('=') {
            return connection_string.trim().to_string();
        }
        let cs = ConnectionString::parse(connection_string);
        ["data source", "datasource", "filename"]
            .iter()
            .find_map(|key| cs.get(key))
            .unwrap_or_default()
            .to_string()
    }
}

impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        "rusqlite"
    }

    fn open(&self, connection_string: &str) -> std::result::Result<Box<dyn DriverConnection>, DriverError> {
        let path = Self::path_of(connection_string);
        trace!("Opening SQLite database {}", path);
        let conn = Connection::open(&path)?;
        if let Some(timeout) = self.busy_timeout {
            conn.busy_timeout(timeout)?;
        }
        Ok(Box::new(SqliteConnection { conn }))
    }
}

struct SqliteConnection {
    conn: Connection,
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Bool(b) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*b as i64)),
            Value::Int(i) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*i)),
            Value::Double(f) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::DateTime(dt) => ToSqlOutput::Owned(rusqlite::types::Value::Text(
                dt.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            )),
            Value::Guid(g) => ToSqlOutput::Owned(rusqlite::types::Value::Text(g.to_string())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b.as_slice())),
        })
    }
}

fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Double(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).to_string()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

/// Binds every parameter the statement names as `@name`. Parameters the
/// statement does not mention are skipped.
fn bind(stmt: &mut Statement<'_>, params: &ParameterSet) -> rusqlite::Result<()> {
    for (name, value) in params.iter() {
        let placeholder = format!("{}{}", PARAMETER_PREFIX, name);
        if let Some(index) = stmt.parameter_index(&placeholder)? {
            stmt.raw_bind_parameter(index, value)?;
        }
    }
    Ok(())
}

/// `varchar(255)` -> `varchar`
fn base_type_name(declared: &str) -> &str {
    declared.split('(').next().unwrap_or_default().trim()
}

impl SqliteConnection {
    fn table_names(&self) -> rusqlite::Result<Vec<String>> {
        let mut stmt = self.conn.prepare(LIST_TABLES_SQL)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    fn column_records(&self) -> rusqlite::Result<Vec<Record>> {
        let mut records = Vec::new();
        for table in self.table_names()? {
            let mut stmt = self
                .conn
                .prepare("SELECT cid, name, type FROM pragma_table_info(?1) ORDER BY cid")?;
            let rows = stmt.query_map([&table], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;
            for row in rows {
                let (cid, name, declared) = row?;
                let record: Record = vec![
                    ("table_name", Value::from(&table)),
                    ("column_name", Value::from(name)),
                    ("data_type", Value::from(base_type_name(&declared))),
                    ("ordinal_position", Value::Int(cid + 1)),
                ]
                .into_iter()
                .collect();
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Primary keys are reported as a `PK_<table>` constraint; other
    /// indexes under their own names.
    fn index_column_records(&self) -> rusqlite::Result<Vec<Record>> {
        let mut records = Vec::new();
        for table in self.table_names()? {
            let constraint = format!("{}{}", SQLITE_PRIMARY_KEY_PREFIX, table);
            let mut stmt = self
                .conn
                .prepare("SELECT name, pk FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk")?;
            let keys = stmt
                .query_map([&table], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for (column, ordinal) in keys {
                records.push(index_record(&table, &constraint, &column, ordinal));
            }

            let mut stmt = self.conn.prepare(
                "SELECT il.name, ii.seqno, ii.name \
                 FROM pragma_index_list(?1) AS il, pragma_index_info(il.name) AS ii \
                 WHERE il.origin <> 'pk' AND ii.name IS NOT NULL \
                 ORDER BY il.name, ii.seqno",
            )?;
            let indexed = stmt
                .query_map([&table], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for (index, seqno, column) in indexed {
                records.push(index_record(&table, &index, &column, seqno + 1));
            }
        }
        Ok(records)
    }
}

fn index_record(table: &str, constraint: &str, column: &str, ordinal: i64) -> Record {
    vec![
        ("table_name", Value::from(table)),
        ("constraint_name", Value::from(constraint)),
        ("column_name", Value::from(column)),
        ("ordinal_position", Value::Int(ordinal)),
    ]
    .into_iter()
    .collect()
}

impl DriverConnection for SqliteConnection {
    fn execute(&mut self, sql: &str, params: &ParameterSet) -> std::result::Result<u64, DriverError> {
        let mut stmt = self.conn.prepare(sql)?;
        bind(&mut stmt, params)?;
        Ok(stmt.raw_execute()? as u64)
    }

    fn query_scalar(&mut self, sql: &str, params: &ParameterSet) -> std::result::Result<Value, DriverError> {
        let mut stmt = self.conn.prepare(sql)?;
        bind(&mut stmt, params)?;
        let mut rows = stmt.raw_query();
        match rows.next()? {
            Some(row) => Ok(value_from_ref(row.get_ref(0)?)),
            None => Ok(Value::Null),
        }
    }

    fn query(
        &mut self,
        sql: &str,
        params: &ParameterSet,
        handler: &mut RecordHandler<'_>,
    ) -> std::result::Result<(), DriverError> {
        let mut stmt = self.conn.prepare(sql)?;
        bind(&mut stmt, params)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            let mut record = Record::new();
            for (i, name) in names.iter().enumerate() {
                record.push(name.as_str(), value_from_ref(row.get_ref(i)?));
            }
            handler(record)?;
        }
        Ok(())
    }

    fn schema_collection(&mut self, name: &str) -> std::result::Result<Vec<Record>, DriverError> {
        let records = match name {
            TABLES_COLLECTION => self
                .table_names()?
                .into_iter()
                .map(|t| std::iter::once(("table_name", Value::from(t))).collect())
                .collect(),
            COLUMNS_COLLECTION => self.column_records()?,
            INDEX_COLUMNS_COLLECTION => self.index_column_records()?,
            other => {
                return Err(DriverError::new(format!("Unknown schema collection: {}", other)));
            }
        };
        Ok(records)
    }
}

/// A handle to one SQLite database file.
#[derive(Clone)]
pub struct SqliteDatabase {
    connection_string: String,
    driver: Arc<dyn Driver>,
}

impl SqliteDatabase {
    pub fn new(connection_string: impl Into<String>, driver: Arc<dyn Driver>) -> Self {
        SqliteDatabase {
            connection_string: connection_string.into(),
            driver,
        }
    }

    /// Handle on `path` using a default [`SqliteDriver`].
    pub fn open(path: impl Into<String>) -> Self {
        Self::new(path, Arc::new(SqliteDriver::default()))
    }
}

impl Database for SqliteDatabase {
    fn adapter_name(&self) -> &'static str {
        "sqlite"
    }

    fn connection_string(&self) -> &str {
        &self.connection_string
    }

    fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn list_tables(&self) -> Result<Vec<Table>> {
        let rows = self.get_rows(LIST_TABLES_SQL, &ParameterSet::new())?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("name"))
            .map(|v| Table::new(v.to_string()))
            .collect())
    }

    fn primary_key_prefix(&self) -> &str {
        SQLITE_PRIMARY_KEY_PREFIX
    }

    fn select_first_sql(&self, table: &str, key: Option<&[Column]>) -> String {
        query::select_limit_sql(table, key)
    }
}
