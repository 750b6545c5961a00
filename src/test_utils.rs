/// # Test Utilities Module
///
/// Fixtures shared by unit tests:
/// - `ScriptedDriver`: an in-memory Driver Facade that imitates a SQL
///   Server instance closely enough to exercise the reference adapter
/// - `SqliteFixture`: a temporary SQLite database file
use crate::core::db::driver::{
    Driver, DriverConnection, Record, RecordHandler, COLUMNS_COLLECTION,
    INDEX_COLUMNS_COLLECTION,
};
use crate::core::db::{ConnectionString, SqliteDatabase};
use crate::core::error::DriverError;
use crate::core::params::ParameterSet;
use crate::core::value::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Debug, Clone)]
struct Statement {
    connection_string: String,
    sql: String,
    params: ParameterSet,
}

#[derive(Default)]
struct State {
    /// database name -> table names
    databases: BTreeMap<String, Vec<String>>,
    statements: Vec<Statement>,
    released: Vec<String>,
    rows: HashMap<String, Vec<Record>>,
    scalars: HashMap<String, Value>,
    collections: HashMap<String, Vec<Record>>,
    fail_next: Option<DriverError>,
}

/// Scripted stand-in for a SQL Server driver.
///
/// Understands `CREATE/DROP DATABASE`, `CREATE TABLE`, and the
/// `sys.databases` / `sys.tables` catalog queries. Other queries return
/// whatever was scripted for their exact SQL text.
#[derive(Clone)]
pub struct ScriptedDriver {
    state: Arc<Mutex<State>>,
    error_codes: bool,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        let mut state = State::default();
        state.databases.insert(
            "master".to_string(),
            vec!["spt_fallback_db".to_string(), "spt_monitor".to_string()],
        );
        for name in ["tempdb", "model", "msdb"] {
            state.databases.insert(name.to_string(), Vec::new());
        }
        ScriptedDriver {
            state: Arc::new(Mutex::new(state)),
            error_codes: true,
        }
    }

    pub fn with_error_codes(mut self, enabled: bool) -> Self {
        self.error_codes = enabled;
        self
    }

    /// Adds a `pairs (b, a, note)` table keyed by `PK_pairs (a, b)`.
    pub fn with_pairs_table(self, database: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state
                .databases
                .entry(database.to_string())
                .or_default()
                .push("pairs".to_string());
            state.collections.insert(
                COLUMNS_COLLECTION.to_string(),
                vec![
                    column("pairs", "b", "int", 1),
                    column("pairs", "a", "int", 2),
                    column("pairs", "note", "nvarchar", 3),
                ],
            );
            state.collections.insert(
                INDEX_COLUMNS_COLLECTION.to_string(),
                vec![
                    index("pairs", "PK_pairs", "b", 2),
                    index("pairs", "IX_pairs_note", "note", 1),
                    index("pairs", "PK_pairs", "a", 1),
                ],
            );
        }
        self
    }

    pub fn shared(&self) -> Arc<dyn Driver> {
        Arc::new(self.clone())
    }

    pub fn script_rows(&self, sql: &str, rows: Vec<Vec<(&str, Value)>>) {
        let records = rows.into_iter().map(|r| r.into_iter().collect()).collect();
        self.state.lock().unwrap().rows.insert(sql.to_string(), records);
    }

    pub fn script_scalar(&self, sql: &str, value: Value) {
        self.state.lock().unwrap().scalars.insert(sql.to_string(), value);
    }

    pub fn fail_next(&self, err: DriverError) {
        self.state.lock().unwrap().fail_next = Some(err);
    }

    /// (connection string, sql) of every statement, in order.
    pub fn executed(&self) -> Vec<(String, String)> {
        self.state
            .lock()
            .unwrap()
            .statements
            .iter()
            .map(|s| (s.connection_string.clone(), s.sql.clone()))
            .collect()
    }

    pub fn last_statement(&self) -> Option<(String, ParameterSet)> {
        self.state
            .lock()
            .unwrap()
            .statements
            .last()
            .map(|s| (s.sql.clone(), s.params.clone()))
    }

    pub fn released_pools(&self) -> Vec<String> {
        self.state.lock().unwrap().released.clone()
    }
}

fn column(table: &str, name: &str, data_type: &str, ordinal: i64) -> Record {
    vec![
        ("TABLE_NAME", Value::from(table)),
        ("COLUMN_NAME", Value::from(name)),
        ("DATA_TYPE", Value::from(data_type)),
        ("ORDINAL_POSITION", Value::Int(ordinal)),
    ]
    .into_iter()
    .collect()
}

fn index(table: &str, constraint: &str, name: &str, ordinal: i64) -> Record {
    vec![
        ("TABLE_NAME", Value::from(table)),
        ("CONSTRAINT_NAME", Value::from(constraint)),
        ("COLUMN_NAME", Value::from(name)),
        ("ORDINAL_POSITION", Value::Int(ordinal)),
    ]
    .into_iter()
    .collect()
}

impl Driver for ScriptedDriver {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn open(&self, connection_string: &str) -> Result<Box<dyn DriverConnection>, DriverError> {
        Ok(Box::new(ScriptedConnection {
            state: Arc::clone(&self.state),
            connection_string: connection_string.to_string(),
            error_codes: self.error_codes,
        }))
    }

    fn release_pooled_connections(&self, connection_string: &str) -> Result<(), DriverError> {
        self.state
            .lock()
            .unwrap()
            .released
            .push(connection_string.to_string());
        Ok(())
    }

    fn supports_error_codes(&self) -> bool {
        self.error_codes
    }
}

struct ScriptedConnection {
    state: Arc<Mutex<State>>,
    connection_string: String,
    error_codes: bool,
}

impl ScriptedConnection {
    fn current_database(&self) -> String {
        ConnectionString::parse(&self.connection_string)
            .database()
            .unwrap_or("master")
            .to_string()
    }

    fn error(&self, code: i32, message: String) -> DriverError {
        if self.error_codes {
            DriverError::with_code(code, message)
        } else {
            DriverError::new(message)
        }
    }

    fn log(&self, sql: &str, params: &ParameterSet) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(Statement {
            connection_string: self.connection_string.clone(),
            sql: sql.to_string(),
            params: params.clone(),
        });
        match state.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl DriverConnection for ScriptedConnection {
    fn execute(&mut self, sql: &str, params: &ParameterSet) -> Result<u64, DriverError> {
        self.log(sql, params)?;
        let current = self.current_database();
        let mut state = self.state.lock().unwrap();

        if let Some(name) = sql.strip_prefix("CREATE DATABASE ") {
            let name = name.trim().to_string();
            if state.databases.contains_key(&name) {
                return Err(self.error(
                    1801,
                    format!("Database '{}' already exists. Choose a different database name.", name),
                ));
            }
            state.databases.insert(name, Vec::new());
        } else if let Some(name) = sql.strip_prefix("DROP DATABASE ") {
            if state.databases.remove(name.trim()).is_none() {
                return Err(self.error(
                    3701,
                    format!(
                        "Cannot drop the database '{}', because it does not exist or you do not have permission.",
                        name.trim()
                    ),
                ));
            }
        } else if let Some(rest) = sql.strip_prefix("CREATE TABLE ") {
            let table = rest.split('(').next().unwrap_or_default().trim().to_string();
            match state.databases.get_mut(&current) {
                Some(tables) => tables.push(table),
                None => {
                    return Err(self.error(
                        911,
                        format!("Database '{}' does not exist. Make sure that the name is entered correctly.", current),
                    ))
                }
            }
        }
        Ok(1)
    }

    fn query_scalar(&mut self, sql: &str, params: &ParameterSet) -> Result<Value, DriverError> {
        self.log(sql, params)?;
        let state = self.state.lock().unwrap();
        Ok(state.scalars.get(sql).cloned().unwrap_or(Value::Null))
    }

    fn query(
        &mut self,
        sql: &str,
        params: &ParameterSet,
        handler: &mut RecordHandler<'_>,
    ) -> Result<(), DriverError> {
        self.log(sql, params)?;
        let current = self.current_database();
        let records: Vec<Record> = {
            let state = self.state.lock().unwrap();
            match sql {
                "SELECT name FROM sys.databases" => state
                    .databases
                    .keys()
                    .map(|name| std::iter::once(("name", Value::from(name))).collect())
                    .collect(),
                "SELECT name FROM sys.tables" => state
                    .databases
                    .get(&current)
                    .map(|tables| {
                        tables
                            .iter()
                            .map(|t| std::iter::once(("name", Value::from(t))).collect())
                            .collect()
                    })
                    .unwrap_or_default(),
                _ => state.rows.get(sql).cloned().unwrap_or_default(),
            }
        };
        for record in records {
            handler(record)?;
        }
        Ok(())
    }

    fn schema_collection(&mut self, name: &str) -> Result<Vec<Record>, DriverError> {
        let state = self.state.lock().unwrap();
        Ok(state.collections.get(name).cloned().unwrap_or_default())
    }
}

/// A SQLite database file in a temporary directory, removed on drop.
pub struct SqliteFixture {
    pub dir: TempDir,
    pub path: String,
}

impl SqliteFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db").to_string_lossy().to_string();
        SqliteFixture { dir, path }
    }

    pub fn database(&self) -> SqliteDatabase {
        SqliteDatabase::open(&self.path)
    }
}
