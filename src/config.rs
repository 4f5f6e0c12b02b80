use anyhow::Context;

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_MAX_CONNECTIONS: &str = "DATABASE_MAX_CONNECTIONS";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
}

impl Config {
    /// Reads settings from the process environment, loading `.env` first if present.
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup(ENV_DATABASE_URL)
            .filter(|v| !v.trim().is_empty())
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        let max_connections = match lookup(ENV_MAX_CONNECTIONS) {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| format!("{ENV_MAX_CONNECTIONS} must be a positive integer, got {raw:?}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            database_url,
            max_connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn requires_a_database_url() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[(ENV_DATABASE_URL, "  ")])).is_err());
    }

    #[test]
    fn defaults_the_pool_size() {
        let config = Config::from_lookup(lookup(&[(ENV_DATABASE_URL, "postgres://localhost/app")]))
            .unwrap();
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn rejects_a_bad_pool_size() {
        let vars = [
            (ENV_DATABASE_URL, "postgres://localhost/app"),
            (ENV_MAX_CONNECTIONS, "zero"),
        ];
        assert!(Config::from_lookup(lookup(&vars)).is_err());

        let vars = [
            (ENV_DATABASE_URL, "postgres://localhost/app"),
            (ENV_MAX_CONNECTIONS, "12"),
        ];
        assert_eq!(Config::from_lookup(lookup(&vars)).unwrap().max_connections, 12);
    }
}
