// Core infrastructure modules
pub mod core;

pub mod config;

#[cfg(test)]
pub(crate) mod test_utils;

pub use crate::config::Config;
pub use crate::core::db::{
    AdapterKind, Column, Database, Dispatcher, Driver, DriverConnection, LogicalType, Record,
    Row, RowList, SqlServerDatabase, SqliteDatabase, SqliteDriver, Table,
};
pub use crate::core::params::{ParameterSet, ToParameters};
pub use crate::core::value::Value;
pub use crate::core::{DriverError, Result, SequelError};

/// Returns a handle for `descriptor` using the default dispatcher, which
/// has the SQLite driver registered.
///
/// No configuration file is read: bare connection strings go to the SQL
/// Server adapter. To honor a configuration, build the dispatcher from it.
///
/// ```
/// let db = sequel::connect("sqlite://app.db").unwrap();
/// assert_eq!(db.connection_string(), "app.db");
///
/// let config = sequel::Config::from_toml_str(r#"default_adapter = "sqlite""#).unwrap();
/// let db = sequel::Dispatcher::from_config(&config)
///     .unwrap()
///     .connect("app.db")
///     .unwrap();
/// assert_eq!(db.adapter_name(), "sqlite");
/// ```
pub fn connect(descriptor: &str) -> Result<Box<dyn Database>> {
    Dispatcher::new().connect(descriptor)
}
