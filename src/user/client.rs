use std::env;

use async_trait::async_trait;
use log::warn;
use serde::Deserialize;

use crate::integration::cache;

use super::model::UserInfo;
use super::{Result, Sub};

/// Read-only contracts against the profile and friendship services.
///
/// Identity lookups are tolerant: an unresolved sub yields `None` and the
/// caller falls back to a placeholder. The friendship check is consulted
/// exactly once, at private conversation creation.
#[async_trait]
pub trait UserClient {
    async fn find_user_info(&self, sub: &Sub) -> Option<UserInfo>;

    async fn are_friends(&self, me: &Sub, other: &Sub) -> Result<bool>;
}

#[derive(Clone)]
pub struct Config {
    base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: String::from("http://127.0.0.1:8001"),
        }
    }
}

impl Config {
    pub fn env() -> Option<Self> {
        match env::var("USERS_URL") {
            Ok(base_url) => Some(Self { base_url }),
            Err(_) => {
                warn!("USERS_URL is not configured");
                None
            }
        }
    }
}

#[derive(Clone)]
pub struct HttpUserClient {
    config: Config,
    http: reqwest::Client,
    redis: cache::Redis,
}

impl HttpUserClient {
    pub fn new(config: Config, http: reqwest::Client, redis: cache::Redis) -> Self {
        Self {
            config,
            http,
            redis,
        }
    }
}

#[derive(Deserialize)]
struct FriendshipStatus {
    accepted: bool,
}

#[async_trait]
impl UserClient for HttpUserClient {
    async fn find_user_info(&self, sub: &Sub) -> Option<UserInfo> {
        let key = cache::Key::UserInfo(sub.clone());
        if let Some(cached) = self.redis.json_get::<UserInfo>(&key).await {
            return Some(cached);
        }

        let url = format!("{}/api/users/{sub}", self.config.base_url);
        match self.http.get(url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<UserInfo>().await {
                Ok(user_info) => {
                    self.redis.json_set_ex(&key, &user_info).await;
                    Some(user_info)
                }
                Err(e) => {
                    warn!("malformed user info for {sub}: {e}");
                    None
                }
            },
            Ok(resp) => {
                warn!("user info lookup for {sub} returned {}", resp.status());
                None
            }
            Err(e) => {
                warn!("user info lookup for {sub} failed: {e}");
                None
            }
        }
    }

    async fn are_friends(&self, me: &Sub, other: &Sub) -> Result<bool> {
        let url = format!(
            "{}/api/friendships/{me}/{other}",
            self.config.base_url
        );

        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Ok(false);
        }

        let status = resp.json::<FriendshipStatus>().await?;
        Ok(status.accepted)
    }
}
