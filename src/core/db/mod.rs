/// Database Module
///
/// The adapter layer, organized bottom-up:
/// - **Driver Facade** (`driver.rs`): the narrow client interface adapters consume
/// - **Schema Catalog** (`schema.rs`): tables, columns, logical types, primary keys
/// - **Query Engine** (`query.rs`): generated SQL text and the `Row` record
/// - **Database Handle** (`adapter.rs`): the `Database` trait shared by all adapters
/// - **Adapters** (`sqlserver.rs`, `sqlite.rs`): vendor catalogs and dialects
/// - **Connection Dispatch** (`connection.rs`): `scheme://` descriptors to adapters
///
/// Nothing here caches metadata: every call re-reads the driver.
pub mod adapter;
pub mod connection;
pub mod driver;
pub mod query;
pub mod schema;
pub mod sqlite;
pub mod sqlserver;

pub use adapter::{Database, DEFAULT_PRIMARY_KEY_PREFIX};
pub use connection::{AdapterKind, ConnectionDescriptor, ConnectionString, Dispatcher};
pub use driver::{Driver, DriverConnection, Record};
pub use query::{Row, RowList};
pub use schema::{map_type, Column, LogicalType, Table};
pub use sqlite::{SqliteDatabase, SqliteDriver};
pub use sqlserver::SqlServerDatabase;
