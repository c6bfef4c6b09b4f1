pub mod database_config;
pub mod database_error;
pub mod database_migration;
pub mod driven;
pub mod driver;
pub mod env_config;
pub mod inventory_proto;
pub mod logging;
pub mod server_config;
#[cfg(test)]
pub(crate) mod test_support;

pub use database_config::DatabaseConfig;
pub use database_migration::DatabaseMigration;
pub use server_config::ServerConfig;
