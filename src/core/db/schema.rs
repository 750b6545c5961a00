/// Schema Introspection Module
///
/// Builds `Table` and `Column` descriptors from driver-reported metadata
/// collections. Descriptors are rebuilt on every call and never cached;
/// a column refers back to its table by name only.
use crate::core::db::driver::Record;
use crate::core::{Result, SequelError};
use serde::Serialize;

/// Portable classification of a column's native type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LogicalType {
    Byte,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    Boolean,
    String,
    DateTime,
    DateTimeOffset,
    Time,
    Guid,
    Binary,
}

/// Translates a vendor type name into a logical type.
///
/// Matching is exact after trimming and lowercasing. Unrecognized names
/// return `None`; callers turn that into `UnknownColumnType`.
pub fn map_type(raw_name: &str) -> Option<LogicalType> {
    let name = raw_name.trim().to_ascii_lowercase();
    let mapped = match name.as_str() {
        "tinyint" => LogicalType::Byte,
        "smallint" => LogicalType::Int16,
        "int" | "mediumint" => LogicalType::Int32,
        "bigint" | "integer" => LogicalType::Int64,
        "real" | "float4" => LogicalType::Single,
        "float" | "double" | "double precision" | "float8" => LogicalType::Double,
        "decimal" | "numeric" | "money" | "smallmoney" => LogicalType::Decimal,
        "bit" | "bool" | "boolean" => LogicalType::Boolean,
        "char" | "nchar" | "varchar" | "nvarchar" | "text" | "ntext" | "character"
        | "varying character" | "clob" | "xml" => LogicalType::String,
        "date" | "datetime" | "datetime2" | "smalldatetime" | "timestamp" => {
            LogicalType::DateTime
        }
        "datetimeoffset" => LogicalType::DateTimeOffset,
        "time" => LogicalType::Time,
        "uniqueidentifier" | "uuid" | "guid" => LogicalType::Guid,
        "binary" | "varbinary" | "image" | "blob" | "rowversion" => LogicalType::Binary,
        _ => return None,
    };
    Some(mapped)
}

/// A table known to the catalog at the time of the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub name: String,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Table { name: name.into() }
    }
}

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    /// Name of the owning table
    pub table: String,
    pub logical_type: LogicalType,
    /// Vendor type name as reported by the driver
    pub type_name: String,
    /// 1-based position reported by the driver
    pub ordinal: i64,
}

/// Builds one `Table` per record of a table collection.
pub fn tables_from_records(records: &[Record]) -> Vec<Table> {
    records
        .iter()
        .filter_map(|r| r.text("table_name"))
        .map(Table::new)
        .collect()
}

/// Builds the columns of `table` from a column collection, in ordinal order.
pub fn columns_from_records(table: &str, records: &[Record]) -> Result<Vec<Column>> {
    let mut columns = Vec::new();
    for record in records {
        if record.text("table_name") != Some(table) {
            continue;
        }
        let name = record.text("column_name").unwrap_or_default().to_string();
        let type_name = record.text("data_type").unwrap_or_default().to_string();
        let logical_type = map_type(&type_name).ok_or_else(|| SequelError::UnknownColumnType {
            table: table.to_string(),
            column: name.clone(),
            type_name: type_name.clone(),
        })?;
        columns.push(Column {
            name,
            table: table.to_string(),
            logical_type,
            type_name,
            ordinal: record.integer("ordinal_position").unwrap_or(0),
        });
    }
    columns.sort_by_key(|c| c.ordinal);
    Ok(columns)
}

/// Selects the primary-key columns of `table` from an index/constraint
/// collection.
///
/// A record belongs to the key when its constraint name starts with
/// `prefix`. Each match is resolved against `columns`; the result follows
/// the constraint's ordinal order.
pub fn primary_key_from_records(
    table: &str,
    prefix: &str,
    columns: &[Column],
    records: &[Record],
) -> Vec<Column> {
    let mut keyed: Vec<(i64, &Column)> = records
        .iter()
        .filter(|r| r.text("table_name") == Some(table))
        .filter(|r| {
            r.text("constraint_name")
                .map(|name| name.starts_with(prefix))
                .unwrap_or(false)
        })
        .filter_map(|r| {
            let column_name = r.text("column_name")?;
            let column = columns.iter().find(|c| c.name == column_name)?;
            Some((r.integer("ordinal_position").unwrap_or(0), column))
        })
        .collect();
    // Stable sort keeps collection order for equal ordinals.
    keyed.sort_by_key(|(ordinal, _)| *ordinal);
    keyed.into_iter().map(|(_, c)| c.clone()).collect()
}

/// Renders a primary key as it appears in generated SQL, e.g. `"a, b"`.
pub fn key_name(key: &[Column]) -> String {
    key.iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::Value;

    fn column_record(table: &str, column: &str, data_type: &str, ordinal: i64) -> Record {
        vec![
            ("TABLE_NAME", Value::from(table)),
            ("COLUMN_NAME", Value::from(column)),
            ("DATA_TYPE", Value::from(data_type)),
            ("ORDINAL_POSITION", Value::Int(ordinal)),
        ]
        .into_iter()
        .collect()
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

    #[test]
    fn test_map_type() {
        assert_eq!(map_type("int"), Some(LogicalType::Int32));
        assert_eq!(map_type(" VARCHAR "), Some(LogicalType::String));
        assert_eq!(map_type("Bit"), Some(LogicalType::Boolean));
        assert_eq!(map_type("uniqueidentifier"), Some(LogicalType::Guid));
        assert_eq!(map_type("datetime2"), Some(LogicalType::DateTime));
        assert_eq!(map_type("float"), Some(LogicalType::Double));
        assert_eq!(map_type("geography"), None);
        assert_eq!(map_type("varchar(255)"), None);
    }

    #[test]
    fn test_columns_filtered_by_table_and_ordered() {
        let records = vec![
            column_record("dogs", "name", "varchar", 2),
            column_record("cats", "id", "int", 1),
            column_record("dogs", "id", "int", 1),
        ];
        let columns = columns_from_records("dogs", &records).unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].name, "id");
        assert_eq!(columns[0].logical_type, LogicalType::Int32);
        assert_eq!(columns[0].table, "dogs");
        assert_eq!(columns[1].name, "name");
        assert_eq!(columns[1].logical_type, LogicalType::String);
    }

    #[test]
    fn test_unknown_column_type_fails_fast() {
        let records = vec![column_record("maps", "shape", "geometry", 1)];
        match columns_from_records("maps", &records) {
            Err(SequelError::UnknownColumnType { column, type_name, .. }) => {
                assert_eq!(column, "shape");
                assert_eq!(type_name, "geometry");
            }
            other => panic!("Expected UnknownColumnType, got {:?}", other),
        }
    }

    #[test]
    fn test_composite_primary_key_follows_ordinal_order() {
        let columns = columns_from_records(
            "pairs",
            &[
                column_record("pairs", "b", "int", 1),
                column_record("pairs", "a", "int", 2),
                column_record("pairs", "note", "text", 3),
            ],
        )
        .unwrap();
        let records = vec![
            index_record("pairs", "PK_pairs", "b", 2),
            index_record("pairs", "IX_pairs_note", "note", 1),
            index_record("pairs", "PK_pairs", "a", 1),
            index_record("other", "PK_other", "a", 1),
        ];
        let key = primary_key_from_records("pairs", "PK_", &columns, &records);
        assert_eq!(key_name(&key), "a, b");
    }

    #[test]
    fn test_no_primary_key() {
        let columns = vec![];
        let records = vec![index_record("t", "IX_t", "a", 1)];
        let key = primary_key_from_records("t", "PK_", &columns, &records);
        assert!(key.is_empty());
        assert_eq!(key_name(&key), "");
    }
}
