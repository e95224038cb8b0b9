use axum::Extension;
use axum::Json;
use axum::extract::{Path, State};

use crate::user;

use super::model::{
    ConversationDetailsDto, ConversationDto, CreateGroupRequest, CreatePrivateRequest,
    UpdateGroupRequest,
};
use super::{Id, Service};

pub async fn create_private(
    Extension(sub): Extension<user::Sub>,
    State(service): State<Service>,
    Json(req): Json<CreatePrivateRequest>,
) -> crate::Result<Json<Id>> {
    let id = service.create_private(&sub, &req.friend).await?;
    Ok(Json(id))
}

pub async fn create_group(
    Extension(sub): Extension<user::Sub>,
    State(service): State<Service>,
    Json(req): Json<CreateGroupRequest>,
) -> crate::Result<Json<Id>> {
    let id = service.create_group(&sub, req).await?;
    Ok(Json(id))
}

pub async fn find_all(
    Extension(sub): Extension<user::Sub>,
    State(service): State<Service>,
) -> crate::Result<Json<Vec<ConversationDto>>> {
    let conversations = service.find_all(&sub).await?;
    Ok(Json(conversations))
}

pub async fn find_one(
    Extension(sub): Extension<user::Sub>,
    Path(id): Path<Id>,
    State(service): State<Service>,
) -> crate::Result<Json<ConversationDetailsDto>> {
    let details = service.find_by_id(&id, &sub).await?;
    Ok(Json(details))
}

pub async fn update_group(
    Extension(sub): Extension<user::Sub>,
    Path(id): Path<Id>,
    State(service): State<Service>,
    Json(req): Json<UpdateGroupRequest>,
) -> crate::Result<()> {
    service.update_group(&id, &sub, req).await?;
    Ok(())
}

pub async fn delete(
    Extension(sub): Extension<user::Sub>,
    Path(id): Path<Id>,
    State(service): State<Service>,
) -> crate::Result<()> {
    service.delete(&id, &sub).await?;
    Ok(())
}

pub async fn mark_read(
    Extension(sub): Extension<user::Sub>,
    Path(id): Path<Id>,
    State(service): State<Service>,
) -> crate::Result<()> {
    service.mark_read(&id, &sub).await?;
    Ok(())
}
