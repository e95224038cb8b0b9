use std::fmt::Display;
use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{delete, post, put};
use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use crate::user;

mod handler;
pub mod model;
pub mod repository;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn repository::ParticipantRepository + Send + Sync>;
pub type Service = Arc<dyn service::ParticipantService + Send + Sync>;

/// Group role hierarchy. Leader is a singleton per group and is only ever
/// reassigned through a leadership transfer, never through a plain role
/// update.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Leader,
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Leader => "leader",
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<Role> for Bson {
    fn from(role: Role) -> Self {
        Bson::String(role.as_str().to_owned())
    }
}

pub fn api<S>(s: AppState) -> Router<S> {
    Router::new()
        .route("/conversations/{id}/members", post(handler::add_member))
        .route(
            "/conversations/{id}/members/{sub}",
            delete(handler::remove_member),
        )
        .route(
            "/conversations/{id}/members/{sub}/role",
            put(handler::update_role),
        )
        .route("/conversations/{id}/leader", put(handler::transfer_leadership))
        .route("/conversations/{id}/leave", put(handler::leave))
        .route("/conversations/{id}/block", put(handler::block))
        .route("/conversations/{id}/me", put(handler::update_own_settings))
        .with_state(s)
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("conversation not found: {0:?}")]
    ConversationNotFound(crate::conversation::Id),
    #[error("user {0:?} is not an active member")]
    NotMember(user::Sub),
    #[error("caller role does not permit this operation")]
    InsufficientRole,
    #[error("user {0:?} is already an active member")]
    AlreadyMember(user::Sub),
    #[error("the leader cannot be removed")]
    LeaderImmune,
    #[error("the leader must transfer leadership first")]
    LeaderMustTransfer,
    #[error("leadership is only assigned via transfer")]
    RoleNotAssignable,
    #[error("cannot transfer leadership to oneself")]
    SelfTransfer,
    #[error("a concurrent leadership change won")]
    TransferConflict,
    #[error("operation is only valid on group conversations")]
    NotGroup,
    #[error("operation is only valid on private conversations")]
    NotPrivate,

    #[error(transparent)]
    _MongoDB(#[from] mongodb::error::Error),
}

impl From<Error> for StatusCode {
    fn from(e: Error) -> Self {
        match e {
            Error::ConversationNotFound(_) => StatusCode::NOT_FOUND,
            Error::NotMember(_) | Error::InsufficientRole | Error::LeaderImmune => {
                StatusCode::FORBIDDEN
            }
            Error::LeaderMustTransfer
            | Error::RoleNotAssignable
            | Error::SelfTransfer
            | Error::NotGroup
            | Error::NotPrivate => StatusCode::BAD_REQUEST,
            Error::AlreadyMember(_) | Error::TransferConflict => StatusCode::CONFLICT,
            Error::_MongoDB(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
