/// Driver Facade
///
/// The narrow interface through which adapters talk to a database client.
/// A `Driver` opens connections from a native connection string; a
/// `DriverConnection` executes statements and exposes schema metadata.
/// Dropping a connection closes it.
use crate::core::error::DriverError;
use crate::core::params::ParameterSet;
use crate::core::value::Value;
use indexmap::IndexMap;

/// Name of the table metadata collection (`table_name`).
pub const TABLES_COLLECTION: &str = "Tables";
/// Name of the column metadata collection
/// (`table_name`, `column_name`, `data_type`, `ordinal_position`).
pub const COLUMNS_COLLECTION: &str = "Columns";
/// Name of the index/constraint column collection
/// (`table_name`, `constraint_name`, `column_name`, `ordinal_position`).
pub const INDEX_COLUMNS_COLLECTION: &str = "IndexColumns";

/// One tabular record returned by a driver, keyed by column name in
/// result order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Text of a metadata column, matched case-insensitively.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.as_str())
    }

    /// Integer of a metadata column, matched case-insensitively.
    pub fn integer(&self, name: &str) -> Option<i64> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.as_i64())
    }

    pub fn into_fields(self) -> IndexMap<String, Value> {
        self.fields
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.push(k, v);
        }
        record
    }
}

/// Callback invoked once per streamed record.
pub type RecordHandler<'a> = dyn FnMut(Record) -> Result<(), DriverError> + 'a;

/// A live connection produced by [`Driver::open`].
pub trait DriverConnection {
    /// Executes a statement, returning the affected row count.
    fn execute(&mut self, sql: &str, params: &ParameterSet) -> Result<u64, DriverError>;

    /// Executes a query, returning the first column of the first row
    /// (`Value::Null` when there is none).
    fn query_scalar(&mut self, sql: &str, params: &ParameterSet) -> Result<Value, DriverError>;

    /// Executes a query, streaming each record to `handler` in order.
    fn query(
        &mut self,
        sql: &str,
        params: &ParameterSet,
        handler: &mut RecordHandler<'_>,
    ) -> Result<(), DriverError>;

    /// Returns a named metadata collection.
    fn schema_collection(&mut self, name: &str) -> Result<Vec<Record>, DriverError>;
}

/// Factory for driver connections.
pub trait Driver: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    fn open(&self, connection_string: &str) -> Result<Box<dyn DriverConnection>, DriverError>;

    /// Releases any pooled connections the driver keeps for
    /// `connection_string`. Drivers without pooling do nothing.
    fn release_pooled_connections(&self, _connection_string: &str) -> Result<(), DriverError> {
        Ok(())
    }

    /// Whether `DriverError::code` carries engine error numbers that can
    /// be matched instead of message text.
    fn supports_error_codes(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_lookup_is_case_insensitive() {
        let record: Record = vec![
            ("TABLE_NAME", Value::from("dogs")),
            ("ORDINAL_POSITION", Value::Int(2)),
        ]
        .into_iter()
        .collect();

        assert_eq!(record.text("table_name"), Some("dogs"));
        assert_eq!(record.integer("ordinal_position"), Some(2));
        assert_eq!(record.get("table_name"), None);
        assert_eq!(record.text("missing"), None);
    }
}
