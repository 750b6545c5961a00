/// Database Handle Module
///
/// The `Database` trait is the adapter contract. Vendors supply the
/// connection string, driver, table enumeration and dialect hooks; every
/// other operation is implemented once here in terms of those.
///
/// No connection outlives a call: each statement opens its own driver
/// connection, which is closed when it goes out of scope on every exit
/// path.
use crate::core::db::driver::{
    Driver, DriverConnection, Record, COLUMNS_COLLECTION, INDEX_COLUMNS_COLLECTION,
    TABLES_COLLECTION,
};
use crate::core::db::query::{self, Row, RowList};
use crate::core::db::schema::{self, Column, Table};
use crate::core::error::DriverError;
use crate::core::params::{ParameterSet, ToParameters};
use crate::core::value::Value;
use crate::core::{Result, SequelError};
use std::any::Any;
use tracing::{debug, trace};

/// Constraint-name prefix that marks primary-key constraints.
pub const DEFAULT_PRIMARY_KEY_PREFIX: &str = "PK_";

pub trait Database {
    /// Short adapter name, e.g. `"sqlserver"`.
    fn adapter_name(&self) -> &'static str;

    /// Native connection string statements run against.
    fn connection_string(&self) -> &str;

    fn driver(&self) -> &dyn Driver;

    /// Allows downcasting to the concrete adapter for vendor operations.
    fn as_any(&self) -> &dyn Any;

    /// Enumerates tables with a vendor catalog query.
    fn list_tables(&self) -> Result<Vec<Table>>;

    fn primary_key_prefix(&self) -> &str {
        DEFAULT_PRIMARY_KEY_PREFIX
    }

    /// SQL selecting a single row of `table`, newest first when `key` is given.
    fn select_first_sql(&self, table: &str, key: Option<&[Column]>) -> String {
        query::select_top_sql(table, key)
    }

    fn open_connection(&self) -> Result<Box<dyn DriverConnection>> {
        trace!("[{}] opening connection", self.adapter_name());
        Ok(self.driver().open(self.connection_string())?)
    }

    /// Executes a statement and returns the affected row count.
    fn execute_non_query(&self, sql: &str, params: &ParameterSet) -> Result<u64> {
        debug!("[{}] {}", self.adapter_name(), sql);
        let mut conn = self.open_connection()?;
        Ok(conn.execute(sql, params)?)
    }

    /// Executes a query and returns the first column of the first row.
    fn execute_scalar(&self, sql: &str, params: &ParameterSet) -> Result<Value> {
        debug!("[{}] {}", self.adapter_name(), sql);
        let mut conn = self.open_connection()?;
        Ok(conn.query_scalar(sql, params)?)
    }

    /// Executes a query and streams every record to `handler`.
    ///
    /// An error from `handler` stops the read and is returned unchanged.
    fn execute_reader(
        &self,
        sql: &str,
        params: &ParameterSet,
        handler: &mut dyn FnMut(Record) -> Result<()>,
    ) -> Result<()> {
        debug!("[{}] {}", self.adapter_name(), sql);
        let mut conn = self.open_connection()?;
        let mut failure = None;
        let outcome = conn.query(sql, params, &mut |record| match handler(record) {
            Ok(()) => Ok(()),
            Err(e) => {
                failure = Some(e);
                Err(DriverError::new("row handler failed"))
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }
        Ok(outcome?)
    }

    /// Returns a driver metadata collection.
    fn schema_collection(&self, name: &str) -> Result<Vec<Record>> {
        debug!("[{}] schema collection {}", self.adapter_name(), name);
        let mut conn = self.open_connection()?;
        Ok(conn.schema_collection(name)?)
    }

    /// Tables from the driver's table collection.
    fn tables(&self) -> Result<Vec<Table>> {
        let records = self.schema_collection(TABLES_COLLECTION)?;
        Ok(schema::tables_from_records(&records))
    }

    fn table_names(&self) -> Result<Vec<String>> {
        Ok(self.list_tables()?.into_iter().map(|t| t.name).collect())
    }

    /// Looks a table up by name; `None` if it does not exist.
    fn table(&self, name: &str) -> Result<Option<Table>> {
        Ok(self.tables()?.into_iter().find(|t| t.name == name))
    }

    /// Runs `CREATE TABLE <name> (<column_definitions>)`.
    fn create_table(&self, name: &str, column_definitions: &str) -> Result<bool> {
        self.execute_non_query(
            &query::create_table_sql(name, column_definitions),
            &ParameterSet::new(),
        )?;
        Ok(true)
    }

    fn drop_table(&self, name: &str) -> Result<bool> {
        self.execute_non_query(&query::drop_table_sql(name), &ParameterSet::new())?;
        Ok(true)
    }

    /// Columns of `table` with their logical types.
    fn columns(&self, table: &str) -> Result<Vec<Column>> {
        let records = self.schema_collection(COLUMNS_COLLECTION)?;
        schema::columns_from_records(table, &records)
    }

    /// Primary-key columns of `table` in constraint ordinal order.
    fn primary_key_columns(&self, table: &str) -> Result<Vec<Column>> {
        let columns = self.columns(table)?;
        let records = self.schema_collection(INDEX_COLUMNS_COLLECTION)?;
        Ok(schema::primary_key_from_records(
            table,
            self.primary_key_prefix(),
            &columns,
            &records,
        ))
    }

    /// The primary key as rendered in generated SQL; empty if none.
    fn key_name(&self, table: &str) -> Result<String> {
        Ok(schema::key_name(&self.primary_key_columns(table)?))
    }

    fn get_rows(&self, sql: &str, params: &ParameterSet) -> Result<RowList> {
        let mut rows = Vec::new();
        self.execute_reader(sql, params, &mut |record| {
            rows.push(Row::from_record(record, None));
            Ok(())
        })?;
        Ok(rows)
    }

    /// First record of the result, or `None` for an empty result.
    fn get_row(&self, sql: &str, params: &ParameterSet) -> Result<Option<Row>> {
        Ok(self.get_rows(sql, params)?.into_iter().next())
    }

    /// Inserts one row from a parameter set, keyed mapping or record
    /// type; parameter names are used as column names.
    fn insert(&self, table: &str, values: &dyn ToParameters) -> Result<u64> {
        let values = values.to_parameters()?;
        self.execute_non_query(&query::insert_sql(table, &values), &values)
    }

    /// Writes every field of `row` back to its table.
    ///
    /// The record is matched on the key values the row was fetched with,
    /// so an update that rewrites the key still targets the original
    /// record. On success those values become the row's stored state.
    fn update(&self, row: &mut Row) -> Result<u64> {
        if row.is_empty() {
            return Ok(0);
        }
        let table = owning_table(row)?;
        let key = self.require_primary_key(table)?;
        let key_params = key_parameters(row, &key);
        let changes = row.parameters();
        let affected = execute_update(self, table, &key, key_params, &changes)?;
        row.mark_persisted();
        Ok(affected)
    }

    /// Persists `changes` for `row`'s record, then applies them to `row`.
    ///
    /// `row` is left untouched when the statement fails. An empty change
    /// set is a no-op.
    fn update_row(&self, row: &mut Row, changes: &dyn ToParameters) -> Result<u64> {
        let changes = changes.to_parameters()?;
        if changes.is_empty() {
            return Ok(0);
        }
        let table = owning_table(row)?;
        let key = self.require_primary_key(table)?;
        let key_params = key_parameters(row, &key);
        let affected = execute_update(self, table, &key, key_params, &changes)?;
        for (name, value) in changes.iter() {
            row.set(name, value.clone());
        }
        row.mark_persisted();
        Ok(affected)
    }

    fn row_count(&self, table: &str) -> Result<i64> {
        let value = self.execute_scalar(&query::count_sql(table), &ParameterSet::new())?;
        value.as_i64().ok_or_else(|| {
            SequelError::Driver(DriverError::new(format!(
                "COUNT(*) on {} returned a non-integer value: {}",
                table, value
            )))
        })
    }

    fn first_row(&self, table: &str) -> Result<Option<Row>> {
        let sql = self.select_first_sql(table, None);
        Ok(self
            .get_row(&sql, &ParameterSet::new())?
            .map(|row| row.with_table(table)))
    }

    /// The row with the greatest primary key.
    fn last_row(&self, table: &str) -> Result<Option<Row>> {
        let key = self.require_primary_key(table)?;
        let sql = self.select_first_sql(table, Some(key.as_slice()));
        Ok(self
            .get_row(&sql, &ParameterSet::new())?
            .map(|row| row.with_table(table)))
    }

    fn require_primary_key(&self, table: &str) -> Result<Vec<Column>> {
        let key = self.primary_key_columns(table)?;
        if key.is_empty() {
            return Err(SequelError::NoPrimaryKey(table.to_string()));
        }
        Ok(key)
    }
}

fn owning_table(row: &Row) -> Result<&str> {
    row.table().ok_or_else(|| {
        SequelError::MissingTable(row.columns().collect::<Vec<_>>().join(", "))
    })
}

/// Binds the stored key values of `row`.
fn key_parameters(row: &Row, key: &[Column]) -> ParameterSet {
    let mut params = ParameterSet::new();
    match key {
        [single] => params.insert_unchecked(
            query::UPDATE_KEY_PARAMETER,
            row.persisted(&single.name).cloned().unwrap_or_default(),
        ),
        _ => {
            for column in key {
                params.insert_unchecked(
                    query::update_key_parameter(&column.name),
                    row.persisted(&column.name).cloned().unwrap_or_default(),
                );
            }
        }
    }
    params
}

fn execute_update<D: Database + ?Sized>(
    db: &D,
    table: &str,
    key: &[Column],
    key_params: ParameterSet,
    changes: &ParameterSet,
) -> Result<u64> {
    let sql = query::update_sql(table, changes, key);
    let mut params = changes.clone();
    params.extend(&key_params);
    db.execute_non_query(&sql, &params)
}
