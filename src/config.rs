use std::{fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    pub session_expiry_minutes: i64,
    /// Refuse websocket joins to rooms the store doesn't know about
    pub validate_rooms: bool,
    /// Record websocket messages in the store before broadcasting them
    pub persist_messages: bool,
    /// Where uploaded images are written
    pub media_dir: PathBuf,
    /// Public URL prefix `media_dir` is served under
    pub media_url: String,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://roomcast.db?mode=rwc".to_owned(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            db_max_connections: 16,
            session_expiry_minutes: 60,
            validate_rooms: false,
            persist_messages: true,
            media_dir: PathBuf::from("media"),
            media_url: "/media".to_owned(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Reads the process environment, after loading `.env` if there is one.
    pub fn from_env() -> anyhow::Result<Config> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let defaults = Config::default();
        Ok(Config {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: parse(&lookup, "BIND_ADDR", defaults.bind_addr)?,
            db_max_connections: parse(&lookup, "DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            session_expiry_minutes: parse(&lookup, "SESSION_EXPIRY_MINUTES", defaults.session_expiry_minutes)?,
            validate_rooms: parse(&lookup, "VALIDATE_ROOMS", defaults.validate_rooms)?,
            persist_messages: parse(&lookup, "PERSIST_MESSAGES", defaults.persist_messages)?,
            media_dir: lookup("MEDIA_DIR").map(PathBuf::from).unwrap_or(defaults.media_dir),
            media_url: lookup("MEDIA_URL")
                .map(|url| url.trim_end_matches('/').to_owned())
                .filter(|url| url.starts_with('/'))
                .unwrap_or(defaults.media_url),
            max_upload_bytes: parse(&lookup, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    raw.trim()
        .parse()
        .map_err(|err| anyhow::anyhow!("{err}"))
        .with_context(|| format!("invalid {key}: {raw:?}"))
}
