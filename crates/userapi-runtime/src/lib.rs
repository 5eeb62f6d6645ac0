pub mod cache;
pub mod db;
pub mod gateway;
pub mod migrations;
pub mod users;

pub use cache::TtlCache;
pub use db::Database;
pub use gateway::{GatewayConfig, GatewayServer};
pub use migrations::{
    load_migrations, Direction, Migration, MigrationError, MigrationExecutor, MigrationRunner,
    PgMigrationLog,
};
pub use users::{PgUserRepository, UserService};
