use std::time::Duration;

use crate::error::DbError;

pub const MEMORY_URL: &str = "sqlite::memory:";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
	pub database_url: String,
	pub max_connections: u32,
	pub acquire_timeout: Duration,
}

impl Config {
	pub fn new(database_url: impl Into<String>) -> Self {
		Config{
			database_url: database_url.into(),
			max_connections: DEFAULT_MAX_CONNECTIONS,
			acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
		}
	}

	/// Private in-memory database on a single connection, which keeps test
	/// statements strictly sequential.
	pub fn in_memory() -> Self {
		Config{ max_connections: 1, ..Config::new(MEMORY_URL) }
	}

	/// `.env` is optional; DATABASE_URL is not.
	pub fn from_env() -> Result<Self, DbError> {
		dotenvy::dotenv().ok();
		Config::from_lookup(|key| std::env::var(key).ok())
	}

	pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, DbError> {
		let database_url = get("DATABASE_URL")
			.ok_or_else(|| DbError::Config("DATABASE_URL not set in env".to_string()))?;
		let mut config = Config::new(database_url);

		if let Some(raw) = get("LSYS_MAX_CONNECTIONS") {
			config.max_connections = raw.parse()
				.ok()
				.filter(|n| *n > 0)
				.ok_or_else(|| DbError::Config(format!("LSYS_MAX_CONNECTIONS must be a positive integer, got '{raw}'")))?;
		}
		if let Some(raw) = get("LSYS_ACQUIRE_TIMEOUT_SECS") {
			let secs: u64 = raw.parse()
				.map_err(|_| DbError::Config(format!("LSYS_ACQUIRE_TIMEOUT_SECS must be seconds, got '{raw}'")))?;
			config.acquire_timeout = Duration::from_secs(secs);
		}
		if config.is_in_memory() {
			config.max_connections = 1;
		}
		Ok(config)
	}

	pub fn is_in_memory(&self) -> bool {
		self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> = pairs.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |key| map.get(key).cloned()
	}

	#[test]
	fn database_url_is_required() {
		let err = Config::from_lookup(lookup(&[])).unwrap_err();
		assert!(err.to_string().contains("DATABASE_URL"));
	}

	#[test]
	fn overrides_are_read() {
		let config = Config::from_lookup(lookup(&[
			("DATABASE_URL", "sqlite://library.db"),
			("LSYS_MAX_CONNECTIONS", "8"),
			("LSYS_ACQUIRE_TIMEOUT_SECS", "10"),
		])).unwrap();
		assert_eq!(config.max_connections, 8);
		assert_eq!(config.acquire_timeout, Duration::from_secs(10));
		assert!(!config.is_in_memory());
	}

	#[test]
	fn memory_urls_use_one_connection() {
		let config = Config::from_lookup(lookup(&[
			("DATABASE_URL", MEMORY_URL),
			("LSYS_MAX_CONNECTIONS", "4"),
		])).unwrap();
		assert_eq!(config.max_connections, 1);
	}

	#[test]
	fn bad_numbers_are_rejected() {
		assert!(Config::from_lookup(lookup(&[("DATABASE_URL", MEMORY_URL), ("LSYS_MAX_CONNECTIONS", "0")])).is_err());
		assert!(Config::from_lookup(lookup(&[("DATABASE_URL", MEMORY_URL), ("LSYS_ACQUIRE_TIMEOUT_SECS", "soon")])).is_err());
	}
}
