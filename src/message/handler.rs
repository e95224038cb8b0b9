use axum::Extension;
use axum::Json;
use axum::extract::{Path, State};
use axum_extra::extract::Query;
use serde::Deserialize;

use crate::{conversation, user};

use super::Service;
use super::model::{EditMessageRequest, MessageDto, SendMessageRequest, SharePostRequest};

pub async fn send(
    Extension(sub): Extension<user::Sub>,
    State(service): State<Service>,
    Json(req): Json<SendMessageRequest>,
) -> crate::Result<Json<MessageDto>> {
    let dto = service.send(&sub, req).await?;
    Ok(Json(dto))
}

pub async fn share_post(
    Extension(sub): Extension<user::Sub>,
    State(service): State<Service>,
    Json(req): Json<SharePostRequest>,
) -> crate::Result<Json<MessageDto>> {
    let dto = service.share_post(&sub, req).await?;
    Ok(Json(dto))
}

#[derive(Deserialize)]
pub struct Params {
    conversation_id: Option<conversation::Id>,
    limit: Option<usize>,
    before: Option<i64>,
}

pub async fn find_all(
    Extension(sub): Extension<user::Sub>,
    Query(params): Query<Params>,
    State(service): State<Service>,
) -> crate::Result<Json<Vec<MessageDto>>> {
    let conversation_id = params
        .conversation_id
        .ok_or(crate::Error::QueryParamRequired("conversation_id".into()))?;

    let dtos = service
        .find_by_conversation(&conversation_id, &sub, params.limit, params.before)
        .await?;

    Ok(Json(dtos))
}

pub async fn edit(
    Extension(sub): Extension<user::Sub>,
    Path(id): Path<super::Id>,
    State(service): State<Service>,
    Json(req): Json<EditMessageRequest>,
) -> crate::Result<()> {
    service.edit(&id, &sub, req).await?;
    Ok(())
}

pub async fn recall(
    Extension(sub): Extension<user::Sub>,
    Path(id): Path<super::Id>,
    State(service): State<Service>,
) -> crate::Result<()> {
    service.recall(&id, &sub).await?;
    Ok(())
}

pub async fn soft_delete(
    Extension(sub): Extension<user::Sub>,
    Path(id): Path<super::Id>,
    State(service): State<Service>,
) -> crate::Result<()> {
    service.delete_for_me(&id, &sub).await?;
    Ok(())
}
