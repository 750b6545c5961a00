/// Query Building Module
///
/// SQL text generation for the statements the engine issues, and the `Row`
/// record that result sets are mapped into. Identifiers are emitted
/// verbatim: callers are trusted to pass safe table and column names.
use crate::core::db::driver::Record;
use crate::core::db::schema::{key_name, Column};
use crate::core::params::{ParameterSet, PARAMETER_PREFIX};
use crate::core::value::Value;
use indexmap::IndexMap;
use serde::Serialize;

/// Parameter name bound to the original key value of an updated row.
pub const UPDATE_KEY_PARAMETER: &str = "updateKeyValue";

/// `CREATE TABLE <name> (<definition>)`
pub fn create_table_sql(table: &str, column_definitions: &str) -> String {
    format!("CREATE TABLE {} ({})", table, column_definitions)
}

/// `DROP TABLE <name>`
pub fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE {}", table)
}

/// `INSERT INTO <name> (<k1>, <k2>) VALUES (@k1, @k2)`, or
/// `INSERT INTO <name> DEFAULT VALUES` for an empty set.
pub fn insert_sql(table: &str, params: &ParameterSet) -> String {
    if params.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", table);
    }
    let names: Vec<&str> = params.names().collect();
    let placeholders: Vec<String> = names
        .iter()
        .map(|n| format!("{}{}", PARAMETER_PREFIX, n))
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        names.join(", "),
        placeholders.join(", ")
    )
}

/// `UPDATE <name> SET <k1> = @k1, ... WHERE <pk> = @updateKeyValue`
///
/// Composite keys bind one `@updateKeyValue_<column>` per key column.
pub fn update_sql(table: &str, changes: &ParameterSet, key: &[Column]) -> String {
    let assignments: Vec<String> = changes
        .names()
        .map(|n| format!("{} = {}{}", n, PARAMETER_PREFIX, n))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE {}",
        table,
        assignments.join(", "),
        key_predicate(key)
    )
}

fn key_predicate(key: &[Column]) -> String {
    match key {
        [single] => format!("{} = {}{}", single.name, PARAMETER_PREFIX, UPDATE_KEY_PARAMETER),
        _ => key
            .iter()
            .map(|c| {
                format!(
                    "{} = {}{}",
                    c.name,
                    PARAMETER_PREFIX,
                    update_key_parameter(&c.name)
                )
            })
            .collect::<Vec<_>>()
            .join(" AND "),
    }
}

/// Parameter name for one column of a composite key.
pub fn update_key_parameter(column: &str) -> String {
    format!("{}_{}", UPDATE_KEY_PARAMETER, column)
}

/// `SELECT COUNT(*) FROM <name>`
pub fn count_sql(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", table)
}

/// `SELECT TOP 1 * FROM <name> [ORDER BY <pk> DESC]`
pub fn select_top_sql(table: &str, key: Option<&[Column]>) -> String {
    match key {
        Some(key) => format!("SELECT TOP 1 * FROM {} ORDER BY {} DESC", table, key_name(key)),
        None => format!("SELECT TOP 1 * FROM {}", table),
    }
}

/// `SELECT * FROM <name> [ORDER BY <pk> DESC] LIMIT 1`
pub fn select_limit_sql(table: &str, key: Option<&[Column]>) -> String {
    match key {
        Some(key) => format!("SELECT * FROM {} ORDER BY {} DESC LIMIT 1", table, key_name(key)),
        None => format!("SELECT * FROM {} LIMIT 1", table),
    }
}

/// A fetched record: column name to value in result order, optionally
/// tagged with the table it was read from.
///
/// Changing a row's fields does not write through; persist with
/// `Database::update` or `Database::update_row`. Updates locate the
/// record by the values the row had when it was fetched or last
/// persisted, so a key changed with [`Row::set`] still targets the
/// stored record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Row {
    #[serde(skip)]
    table: Option<String>,
    #[serde(flatten)]
    fields: IndexMap<String, Value>,
    #[serde(skip)]
    persisted: IndexMap<String, Value>,
}

/// Rows of a result set, in result order.
pub type RowList = Vec<Row>;

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_record(record: Record, table: Option<&str>) -> Self {
        let fields = record.into_fields();
        Row {
            table: table.map(str::to_string),
            persisted: fields.clone(),
            fields,
        }
    }

    /// Tags the row with its table and takes the current fields as the
    /// stored state.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self.mark_persisted();
        self
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(column.into(), value.into());
    }

    /// The stored value of `column`, or its current value if the column
    /// was added after the row was fetched.
    pub fn persisted(&self, column: &str) -> Option<&Value> {
        self.persisted.get(column).or_else(|| self.fields.get(column))
    }

    /// Records the current fields as the stored state.
    pub fn mark_persisted(&mut self) {
        self.persisted = self.fields.clone();
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The row's fields as a parameter set, in column order.
    pub fn parameters(&self) -> ParameterSet {
        let mut params = ParameterSet::new();
        for (k, v) in &self.fields {
            params.insert_unchecked(k.as_str(), v.clone());
        }
        params
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
