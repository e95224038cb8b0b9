use std::fmt::Display;
use std::sync::Arc;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

pub mod client;
pub mod model;

type Result<T> = std::result::Result<T, Error>;
pub type Client = Arc<dyn client::UserClient + Send + Sync>;

/// Stable identifier of an already-authenticated caller, as issued by the
/// identity provider. This core never validates credentials, it only
/// receives a verified sub from the gateway.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Sub(pub String);

impl Display for Sub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Sub {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Sub {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Sub, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Sub(s))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    _Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    _ParseJson(#[from] serde_json::Error),
}

impl From<Error> for StatusCode {
    fn from(e: Error) -> Self {
        match e {
            Error::_Reqwest(_) | Error::_ParseJson(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
