// src/config.rs
use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub host: IpAddr,
    pub port: u16,
    /// Warehouse used by checkout when the request names none.
    pub default_warehouse_id: Option<i64>,
}

impl AppConfig {
    /// Reads configuration from process environment (after `.env` is loaded).
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| "DATABASE_URL must be set".to_string())?;

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| "JWT_SECRET must be set".to_string())?;

        let host = match lookup("HOST") {
            Some(h) => h.parse::<IpAddr>().map_err(|e| format!("Invalid HOST '{h}': {e}"))?,
            None => IpAddr::from([127, 0, 0, 1]),
        };

        let port = match lookup("PORT") {
            Some(p) => p.parse::<u16>().map_err(|e| format!("Invalid PORT '{p}': {e}"))?,
            None => 3000,
        };

        let database_max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(n) => n
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| format!("Invalid DATABASE_MAX_CONNECTIONS '{n}'"))?,
            None => 10,
        };

        let default_warehouse_id = match lookup("DEFAULT_WAREHOUSE_ID") {
            Some(id) if !id.trim().is_empty() => Some(
                id.trim()
                    .parse::<i64>()
                    .map_err(|e| format!("Invalid DEFAULT_WAREHOUSE_ID '{id}': {e}"))?,
            ),
            _ => None,
        };

        Ok(Self {
            database_url,
            database_max_connections,
            jwt_secret,
            host,
            port,
            default_warehouse_id,
        })
    }
}
