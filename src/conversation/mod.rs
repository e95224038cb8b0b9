use std::fmt::Display;
use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use crate::user;

mod handler;
pub mod model;
pub mod repository;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn repository::ConversationRepository + Send + Sync>;
pub type Service = Arc<dyn service::ConversationService + Send + Sync>;

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

/// Immutable after creation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Private,
    Group,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Private => "private",
            Kind::Group => "group",
        }
    }
}

impl From<Kind> for Bson {
    fn from(kind: Kind) -> Self {
        Bson::String(kind.as_str().to_owned())
    }
}

pub fn api<S>(s: AppState) -> Router<S> {
    Router::new()
        .route("/conversations", get(handler::find_all))
        .route("/conversations/private", post(handler::create_private))
        .route("/conversations/group", post(handler::create_group))
        .route("/conversations/{id}", get(handler::find_one))
        .route("/conversations/{id}", put(handler::update_group))
        .route("/conversations/{id}", delete(handler::delete))
        .route("/conversations/{id}/read", put(handler::mark_read))
        .with_state(s)
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("conversation not found: {0:?}")]
    NotFound(Option<Id>),
    #[error("user is not a member of the conversation")]
    NotMember,
    #[error("operation is only valid on group conversations")]
    NotGroup,
    #[error("cannot start a conversation with oneself")]
    SelfPair,
    #[error("users {0:?} and {1:?} are not friends")]
    NotFriends(user::Sub, user::Sub),

    #[error(transparent)]
    _Participant(#[from] crate::participant::Error),

    #[error(transparent)]
    _User(#[from] user::Error),

    #[error(transparent)]
    _MongoDB(#[from] mongodb::error::Error),
}

impl From<Error> for StatusCode {
    fn from(e: Error) -> Self {
        match e {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::NotMember => StatusCode::FORBIDDEN,
            Error::NotGroup | Error::SelfPair | Error::NotFriends(..) => StatusCode::BAD_REQUEST,
            Error::_Participant(e) => e.into(),
            Error::_User(e) => e.into(),
            Error::_MongoDB(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
