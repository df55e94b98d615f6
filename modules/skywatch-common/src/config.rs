use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Dedup engine
    pub max_merge_iterations: usize,
    pub provenance_domain: String,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            max_merge_iterations: env::var("DEDUP_MAX_ITERATIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("DEDUP_MAX_ITERATIONS must be a number"),
            provenance_domain: env::var("PROVENANCE_DOMAIN")
                .unwrap_or_else(|_| "skywatch.internal".to_string()),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
