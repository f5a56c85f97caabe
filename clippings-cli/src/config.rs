//! CLI configuration

/// Settings shared by all CLI commands
pub struct Config {
    /// Postgres connection string
    pub database_url: String,
}
