use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::error;

pub mod auth;
pub mod conversation;
pub mod event;
pub mod integration;
pub mod message;
pub mod participant;
pub mod state;
pub mod user;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unauthorized to access the resource")]
    Unauthorized,
    #[error("missing required query parameter: {0}")]
    QueryParamRequired(String),

    #[error(transparent)]
    _Conversation(#[from] conversation::Error),

    #[error(transparent)]
    _Participant(#[from] participant::Error),

    #[error(transparent)]
    _Message(#[from] message::Error),

    #[error(transparent)]
    _User(#[from] user::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        error!("{self}");

        let message = self.to_string();
        let status = match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::QueryParamRequired(_) => StatusCode::BAD_REQUEST,
            Self::_Conversation(e) => e.into(),
            Self::_Participant(e) => e.into(),
            Self::_Message(e) => e.into(),
            Self::_User(e) => e.into(),
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            return (status, "Internal server error".to_owned()).into_response();
        }

        (status, message).into_response()
    }
}
