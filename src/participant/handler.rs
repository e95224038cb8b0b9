use axum::Extension;
use axum::Json;
use axum::extract::{Path, State};

use crate::{conversation, user};

use super::Service;
use super::model::{
    AddMemberRequest, OwnSettingsRequest, TransferLeadershipRequest, UpdateRoleRequest,
};

pub async fn add_member(
    Extension(sub): Extension<user::Sub>,
    Path(id): Path<conversation::Id>,
    State(service): State<Service>,
    Json(req): Json<AddMemberRequest>,
) -> crate::Result<()> {
    service.add_member(&id, &sub, req.sub).await?;
    Ok(())
}

pub async fn remove_member(
    Extension(sub): Extension<user::Sub>,
    Path((id, target)): Path<(conversation::Id, user::Sub)>,
    State(service): State<Service>,
) -> crate::Result<()> {
    service.remove_member(&id, &sub, &target).await?;
    Ok(())
}

pub async fn update_role(
    Extension(sub): Extension<user::Sub>,
    Path((id, target)): Path<(conversation::Id, user::Sub)>,
    State(service): State<Service>,
    Json(req): Json<UpdateRoleRequest>,
) -> crate::Result<()> {
    service.update_role(&id, &sub, &target, req.role).await?;
    Ok(())
}

pub async fn transfer_leadership(
    Extension(sub): Extension<user::Sub>,
    Path(id): Path<conversation::Id>,
    State(service): State<Service>,
    Json(req): Json<TransferLeadershipRequest>,
) -> crate::Result<()> {
    service.transfer_leadership(&id, &sub, &req.sub).await?;
    Ok(())
}

pub async fn leave(
    Extension(sub): Extension<user::Sub>,
    Path(id): Path<conversation::Id>,
    State(service): State<Service>,
) -> crate::Result<()> {
    service.leave(&id, &sub).await?;
    Ok(())
}

pub async fn block(
    Extension(sub): Extension<user::Sub>,
    Path(id): Path<conversation::Id>,
    State(service): State<Service>,
) -> crate::Result<()> {
    service.block(&id, &sub).await?;
    Ok(())
}

pub async fn update_own_settings(
    Extension(sub): Extension<user::Sub>,
    Path(id): Path<conversation::Id>,
    State(service): State<Service>,
    Json(req): Json<OwnSettingsRequest>,
) -> crate::Result<()> {
    if req.nickname.is_some() {
        service.set_nickname(&id, &sub, req.nickname).await?;
    }
    if let Some(muted) = req.muted {
        service.set_muted(&id, &sub, muted).await?;
    }
    Ok(())
}
