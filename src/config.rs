use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Where uploaded photos are written, served under `/media`.
    pub media_dir: PathBuf,
    pub media_base_url: String,
    pub content_source_url: String,
    pub session_minutes: i64,
    /// Events a chat socket may fall behind on the bus before it loses some.
    pub bus_capacity: usize,
}

impl Config {
    /// Reads `.env` and the process environment. Unset keys use defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| dotenv::var(key).unwrap_or_else(|_| default.to_owned());

        let bind_addr = var("BIND_ADDR", "0.0.0.0:8080");
        let session_minutes = var("SESSION_MINUTES", "60");
        let bus_capacity = var("BUS_CAPACITY", "256");

        Ok(Self {
            database_url: var("DATABASE_URL", "sqlite://roomchat.db?mode=rwc"),
            bind_addr: bind_addr
                .parse()
                .with_context(|| format!("BIND_ADDR is not a socket address: {bind_addr}"))?,
            media_dir: var("MEDIA_DIR", "media").into(),
            media_base_url: var("MEDIA_BASE_URL", "http://localhost:8080/media"),
            content_source_url: var("CONTENT_SOURCE_URL", "https://ghibliapi.vercel.app/films"),
            session_minutes: session_minutes
                .parse()
                .with_context(|| format!("SESSION_MINUTES is not a number: {session_minutes}"))?,
            bus_capacity: match bus_capacity.parse::<usize>() {
                Ok(0) => anyhow::bail!("BUS_CAPACITY must be at least 1"),
                parsed => parsed.with_context(|| format!("BUS_CAPACITY is not a number: {bus_capacity}"))?,
            },
        })
    }
}
