/// SQL Server Adapter
///
/// Reference adapter. Connected to a server's `master` database it can
/// also list, create and drop databases on that server.
use crate::config::SqlServerConfig;
use crate::core::db::adapter::Database;
use crate::core::db::connection::ConnectionString;
use crate::core::db::driver::Driver;
use crate::core::db::schema::Table;
use crate::core::error::DriverError;
use crate::core::params::ParameterSet;
use crate::core::{Result, SequelError};
use std::any::Any;
use std::sync::Arc;
use tracing::{info, warn};

/// Message text matched when a driver cannot report error numbers.
/// These substrings are part of the compatibility contract with drivers.
pub const ALREADY_EXISTS_TEXT: &str = "already exists";
pub const DOES_NOT_EXIST_TEXT: &str = "does not exist";

/// SQL Server error 1801: database already exists.
pub const ERROR_DATABASE_EXISTS: i32 = 1801;
/// SQL Server error 3701: cannot drop, object does not exist.
pub const ERROR_CANNOT_DROP: i32 = 3701;

/// Why a create or drop statement failed, when the failure is an
/// existence race rather than a real error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistenceConflict {
    AlreadyExists,
    DoesNotExist,
}

/// Classifies `err`, preferring structured codes when `use_codes` is set.
pub fn existence_conflict(err: &DriverError, use_codes: bool) -> Option<ExistenceConflict> {
    if use_codes {
        return match err.code {
            Some(ERROR_DATABASE_EXISTS) => Some(ExistenceConflict::AlreadyExists),
            Some(ERROR_CANNOT_DROP) => Some(ExistenceConflict::DoesNotExist),
            _ => None,
        };
    }
    let message = err.message.to_ascii_lowercase();
    if message.contains(ALREADY_EXISTS_TEXT) {
        Some(ExistenceConflict::AlreadyExists)
    } else if message.contains(DOES_NOT_EXIST_TEXT) {
        Some(ExistenceConflict::DoesNotExist)
    } else {
        None
    }
}

/// A handle to one SQL Server database.
///
/// Handles are immutable: [`SqlServerDatabase::use_database`] returns a
/// new handle that shares the driver.
#[derive(Clone)]
pub struct SqlServerDatabase {
    connection_string: String,
    driver: Arc<dyn Driver>,
    config: SqlServerConfig,
}

impl SqlServerDatabase {
    pub fn new(connection_string: impl Into<String>, driver: Arc<dyn Driver>) -> Self {
        Self::with_config(connection_string, driver, SqlServerConfig::default())
    }

    pub fn with_config(
        connection_string: impl Into<String>,
        driver: Arc<dyn Driver>,
        config: SqlServerConfig,
    ) -> Self {
        SqlServerDatabase {
            connection_string: connection_string.into(),
            driver,
            config,
        }
    }

    /// The database named by the connection string, if any.
    pub fn current_database(&self) -> Option<String> {
        ConnectionString::parse(&self.connection_string)
            .database()
            .map(str::to_string)
    }

    /// Returns a handle whose statements run against `name`.
    ///
    /// The name is not validated; a missing database fails on the next
    /// statement.
    pub fn use_database(&self, name: &str) -> SqlServerDatabase {
        let mut cs = ConnectionString::parse(&self.connection_string);
        cs.set_database(name);
        info!("Using database {}", name);
        SqlServerDatabase {
            connection_string: cs.to_string(),
            driver: Arc::clone(&self.driver),
            config: self.config.clone(),
        }
    }

    pub fn database_names(&self) -> Result<Vec<String>> {
        let rows = self.get_rows("SELECT name FROM sys.databases", &ParameterSet::new())?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("name"))
            .map(|v| v.to_string())
            .collect())
    }

    /// Creates a database. Returns `false` if it already exists.
    pub fn create_database(&self, name: &str) -> Result<bool> {
        let sql = format!("CREATE DATABASE {}", name);
        match self.execute_non_query(&sql, &ParameterSet::new()) {
            Ok(_) => {
                info!("Created database {}", name);
                Ok(true)
            }
            Err(SequelError::Driver(e)) if self.conflict(&e) == Some(ExistenceConflict::AlreadyExists) => {
                warn!("Database {} already exists: {}", name, e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Drops a database. Returns `false` if it does not exist.
    ///
    /// The statement is issued from the configured safe database after the
    /// driver releases pooled connections to the target.
    pub fn drop_database(&self, name: &str) -> Result<bool> {
        let safe = self.use_database(&self.config.safe_database);
        let target = self.use_database(name);
        self.driver
            .release_pooled_connections(target.connection_string())?;

        let sql = format!("DROP DATABASE {}", name);
        match safe.execute_non_query(&sql, &ParameterSet::new()) {
            Ok(_) => {
                info!("Dropped database {}", name);
                Ok(true)
            }
            Err(SequelError::Driver(e)) if self.conflict(&e) == Some(ExistenceConflict::DoesNotExist) => {
                warn!("Database {} does not exist: {}", name, e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn conflict(&self, err: &DriverError) -> Option<ExistenceConflict> {
        existence_conflict(err, self.driver.supports_error_codes())
    }
}

impl Database for SqlServerDatabase {
    fn adapter_name(&self) -> &'static str {
        "sqlserver"
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
        let rows = self.get_rows("SELECT name FROM sys.tables", &ParameterSet::new())?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("name"))
            .map(|v| Table::new(v.to_string()))
            .collect())
    }

    fn primary_key_prefix(&self) -> &str {
        &self.config.primary_key_prefix
    }
}
