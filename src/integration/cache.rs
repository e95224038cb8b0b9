use std::env;
use std::fmt::Display;

use log::warn;
use redis::AsyncCommands;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{conversation, user};

use super::Result;

const TTL_SECS: u64 = 3600;

#[derive(Clone)]
pub struct Config {
    host: String,
    port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 6379,
        }
    }
}

impl Config {
    pub fn env() -> Result<Self> {
        let host = env::var("REDIS_HOST")?;
        let port = env::var("REDIS_PORT")?.parse()?;
        Ok(Self { host, port })
    }

    pub async fn connect(&self) -> Result<redis::aio::ConnectionManager> {
        let con = redis::Client::open(format!("redis://{}:{}", self.host, self.port))?
            .get_connection_manager()
            .await?;
        Ok(con)
    }
}

pub enum Key {
    UserInfo(user::Sub),
    Conversation(conversation::Id),
}

impl Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::UserInfo(sub) => write!(f, "user_info:{sub}"),
            Key::Conversation(id) => write!(f, "conversations:{id}"),
        }
    }
}

/// Thin wrapper over the shared connection. Every operation here backs a
/// cache or a best-effort side channel, so failures are logged and
/// swallowed instead of propagated.
#[derive(Clone)]
pub struct Redis {
    con: redis::aio::ConnectionManager,
}

impl Redis {
    pub fn new(con: redis::aio::ConnectionManager) -> Self {
        Self { con }
    }

    pub async fn json_get<T: DeserializeOwned>(&self, key: &Key) -> Option<T> {
        let mut con = self.con.clone();
        match con.get::<_, Option<String>>(key.to_string()).await {
            Ok(raw) => raw.and_then(|raw| serde_json::from_str(&raw).ok()),
            Err(e) => {
                warn!("failed to read cache key {key}: {e}");
                None
            }
        }
    }

    pub async fn json_set_ex<T: Serialize>(&self, key: &Key, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("failed to serialize cache value for {key}: {e}");
                return;
            }
        };

        let mut con = self.con.clone();
        if let Err(e) = con.set_ex::<_, _, ()>(key.to_string(), raw, TTL_SECS).await {
            warn!("failed to write cache key {key}: {e}");
        }
    }

    /// Merge-writes the given hash fields; fields not present in the call
    /// are left untouched on the server.
    pub async fn hset_fields(&self, key: &Key, fields: &[(&str, String)]) {
        if fields.is_empty() {
            return;
        }

        let mut con = self.con.clone();
        if let Err(e) = con.hset_multiple::<_, _, _, ()>(key.to_string(), fields).await {
            warn!("failed to merge hash {key}: {e}");
        }
    }

    pub async fn publish(&self, channel: &str, payload: Vec<u8>) {
        let mut con = self.con.clone();
        if let Err(e) = con.publish::<_, _, ()>(channel, payload).await {
            warn!("failed to publish to {channel}: {e}");
        }
    }
}
