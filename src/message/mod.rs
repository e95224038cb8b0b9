use std::fmt::Display;
use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

mod handler;
pub mod model;
pub mod repository;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn repository::MessageRepository + Send + Sync>;
pub type Service = Arc<dyn service::MessageService + Send + Sync>;

#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq, Hash)]
pub struct Id(pub String);

impl Id {
    pub fn random() -> Self {
        Self(mongodb::bson::oid::ObjectId::new().to_hex())
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Id> for Bson {
    fn from(id: Id) -> Self {
        Bson::String(id.0)
    }
}

pub fn api<S>(s: AppState) -> Router<S> {
    Router::new()
        .route("/messages", post(handler::send))
        .route("/messages", get(handler::find_all))
        .route("/messages/share", post(handler::share_post))
        .route("/messages/{id}", put(handler::edit))
        .route("/messages/{id}", delete(handler::soft_delete))
        .route("/messages/{id}/recall", put(handler::recall))
        .with_state(s)
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("message not found: {0:?}")]
    NotFound(Option<Id>),
    #[error("caller is not the sender of the message")]
    NotSender,
    #[error("message is recalled")]
    Recalled,
    #[error("only text messages can be edited")]
    NotEditable,
    #[error("message content is empty")]
    EmptyContent,
    #[error("reply target does not belong to the conversation")]
    InvalidReply,
    #[error("system messages cannot be sent directly")]
    SystemReserved,

    #[error(transparent)]
    _Participant(#[from] crate::participant::Error),

    #[error(transparent)]
    _Conversation(#[from] crate::conversation::Error),

    #[error(transparent)]
    _MongoDB(#[from] mongodb::error::Error),
}

impl From<Error> for StatusCode {
    fn from(e: Error) -> Self {
        match e {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::NotSender => StatusCode::FORBIDDEN,
            Error::Recalled
            | Error::NotEditable
            | Error::EmptyContent
            | Error::InvalidReply
            | Error::SystemReserved => StatusCode::BAD_REQUEST,
            Error::_Participant(e) => e.into(),
            Error::_Conversation(e) => e.into(),
            Error::_MongoDB(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
