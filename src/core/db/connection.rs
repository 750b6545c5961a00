/// Connection Dispatch Module
///
/// Parses `scheme://native-info` descriptors and constructs the matching
/// adapter. Construction never touches the network; the first operation
/// on the returned handle opens the first connection.
use crate::config::Config;
use crate::core::db::adapter::Database;
use crate::core::db::driver::Driver;
use crate::core::db::sqlite::{SqliteDatabase, SqliteDriver};
use crate::core::db::sqlserver::SqlServerDatabase;
use crate::core::{Result, SequelError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

static DESCRIPTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^([^:]+)://(.*)$").expect("valid descriptor regex"));

/// A parsed connection descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub scheme: Option<String>,
    pub native_info: String,
}

impl ConnectionDescriptor {
    /// Splits `scheme://rest`; anything else is native info with no scheme.
    pub fn parse(descriptor: &str) -> Self {
        match DESCRIPTOR.captures(descriptor) {
            Some(caps) => ConnectionDescriptor {
                scheme: Some(caps[1].to_string()),
                native_info: caps[2].to_string(),
            },
            None => ConnectionDescriptor {
                scheme: None,
                native_info: descriptor.to_string(),
            },
        }
    }
}

/// The adapters a descriptor can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKind {
    SqlServer,
    Sqlite,
}

impl AdapterKind {
    /// Resolves a scheme, case-insensitively after trimming.
    pub fn from_scheme(scheme: &str) -> Result<Self> {
        match scheme.trim().to_ascii_lowercase().as_str() {
            "sqlserver" | "mssql" => Ok(AdapterKind::SqlServer),
            "sqlite" => Ok(AdapterKind::Sqlite),
            _ => Err(SequelError::UnsupportedAdapter(scheme.to_string())),
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            AdapterKind::SqlServer => "sqlserver",
            AdapterKind::Sqlite => "sqlite",
        }
    }
}

/// Resolves descriptors to adapters backed by registered drivers.
///
/// The SQLite driver is registered by default. SQL Server needs a driver
/// supplied with [`Dispatcher::with_driver`].
pub struct Dispatcher {
    config: Config,
    default_kind: AdapterKind,
    drivers: HashMap<AdapterKind, Arc<dyn Driver>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let config = Config::default();
        let default_kind = AdapterKind::SqlServer;
        Self::build(config, default_kind)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let default_kind = AdapterKind::from_scheme(&config.default_adapter)?;
        Ok(Self::build(config.clone(), default_kind))
    }

    fn build(config: Config, default_kind: AdapterKind) -> Self {
        let mut drivers: HashMap<AdapterKind, Arc<dyn Driver>> = HashMap::new();
        drivers.insert(
            AdapterKind::Sqlite,
            Arc::new(SqliteDriver::new(config.sqlite.busy_timeout_ms)),
        );
        Dispatcher {
            config,
            default_kind,
            drivers,
        }
    }

    /// Registers (or replaces) the driver used for `kind`.
    pub fn with_driver(mut self, kind: AdapterKind, driver: Arc<dyn Driver>) -> Self {
        debug!("Registered {} driver for {}", driver.name(), kind.scheme());
        self.drivers.insert(kind, driver);
        self
    }

    pub fn default_kind(&self) -> AdapterKind {
        self.default_kind
    }

    pub fn has_driver(&self, kind: AdapterKind) -> bool {
        self.drivers.contains_key(&kind)
    }

    /// Returns a handle for `descriptor` without opening a connection.
    pub fn connect(&self, descriptor: &str) -> Result<Box<dyn Database>> {
        let parsed = ConnectionDescriptor::parse(descriptor);
        let kind = match &parsed.scheme {
            Some(scheme) => AdapterKind::from_scheme(scheme)?,
            None => self.default_kind,
        };
        let driver = self.drivers.get(&kind).cloned().ok_or_else(|| {
            SequelError::UnsupportedAdapter(format!("{} (no driver registered)", kind.scheme()))
        })?;
        debug!("Connecting {} adapter", kind.scheme());

        let db: Box<dyn Database> = match kind {
            AdapterKind::SqlServer => Box::new(SqlServerDatabase::with_config(
                parsed.native_info,
                driver,
                self.config.sqlserver.clone(),
            )),
            AdapterKind::Sqlite => Box::new(SqliteDatabase::new(parsed.native_info, driver)),
        };
        Ok(db)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// A `key=value;key=value` native connection string.
///
/// Keys keep their spelling and order; lookups ignore case. Segments
/// without `=` are kept as bare keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pairs: Vec<(String, Option<String>)>,
}

/// Keys naming the current database, in lookup order.
const DATABASE_KEYS: [&str; 2] = ["database", "initial catalog"];

impl ConnectionString {
    pub fn parse(raw: &str) -> Self {
        let pairs = raw
            .split(';')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(|segment| match segment.split_once('=') {
                Some((key, value)) => (key.trim().to_string(), Some(value.trim().to_string())),
                None => (segment.to_string(), None),
            })
            .collect();
        ConnectionString { pairs }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn database(&self) -> Option<&str> {
        DATABASE_KEYS.iter().find_map(|key| self.get(key))
    }

    /// Replaces the current database, appending `Database=<name>` when the
    /// string names none.
    pub fn set_database(&mut self, name: &str) {
        let existing = self.pairs.iter_mut().find(|(k, _)| {
            DATABASE_KEYS
                .iter()
                .any(|candidate| k.eq_ignore_ascii_case(candidate))
        });
        match existing {
            Some((_, value)) => *value = Some(name.to_string()),
            None => self
                .pairs
                .push(("Database".to_string(), Some(name.to_string()))),
        }
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .pairs
            .iter()
            .map(|(k, v)| match v {
                Some(v) => format!("{}={}", k, v),
                None => k.clone(),
            })
            .collect();
        write!(f, "{}", rendered.join(";"))
    }
}
