use conversation_service::conversation::model::CreateGroupRequest;
use conversation_service::message::model::SendMessageRequest;
use conversation_service::participant::repository::ParticipantRepository;
use conversation_service::participant::{self, Role};
use conversation_service::{conversation, message};

use conversation_service::event::model::NotificationKind;

use common::{Harness, settle, sub, text};

mod common;

async fn group(
    h: &Harness,
    leader: &conversation_service::user::Sub,
    members: &[conversation_service::user::Sub],
) -> conversation::Id {
    h.conversations
        .create_group(
            leader,
            CreateGroupRequest {
                name: "party".into(),
                avatar: None,
                members: members.to_vec(),
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn concurrent_leadership_transfers_elect_exactly_one_leader() {
    let h = Harness::new();
    let id = group(&h, &sub("jora"), &[sub("valera"), sub("radu")]).await;

    let (jora, valera, radu) = (sub("jora"), sub("valera"), sub("radu"));
    let to_valera = h.participants.transfer_leadership(&id, &jora, &valera);
    let to_radu = h.participants.transfer_leadership(&id, &jora, &radu);

    let (a, b) = tokio::join!(to_valera, to_radu);
    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);

    let rows = h
        .participant_repo
        .find_active_by_conversation(&id)
        .await
        .unwrap();
    let leaders = rows
        .iter()
        .filter(|p| p.role == Role::Leader)
        .collect::<Vec<_>>();
    assert_eq!(leaders.len(), 1);

    // the old leader stays in the group as an admin
    let old = rows.iter().find(|p| p.sub == sub("jora")).unwrap();
    assert_eq!(old.role, Role::Admin);
}

#[tokio::test]
async fn leader_cannot_leave_without_transferring() {
    let h = Harness::new();
    let id = group(&h, &sub("jora"), &[sub("valera")]).await;

    let err = h.participants.leave(&id, &sub("jora")).await.unwrap_err();
    assert!(matches!(err, participant::Error::LeaderMustTransfer));

    h.participants
        .transfer_leadership(&id, &sub("jora"), &sub("valera"))
        .await
        .unwrap();
    h.participants.leave(&id, &sub("jora")).await.unwrap();
}

#[tokio::test]
async fn leader_is_immune_to_removal() {
    let h = Harness::new();
    let id = group(&h, &sub("jora"), &[sub("valera")]).await;
    h.participants
        .update_role(&id, &sub("jora"), &sub("valera"), Role::Admin)
        .await
        .unwrap();

    let err = h
        .participants
        .remove_member(&id, &sub("valera"), &sub("jora"))
        .await
        .unwrap_err();

    assert!(matches!(err, participant::Error::LeaderImmune));
}

#[tokio::test]
async fn admin_cannot_remove_a_peer_admin() {
    let h = Harness::new();
    let id = group(&h, &sub("jora"), &[sub("valera"), sub("radu")]).await;
    h.participants
        .update_role(&id, &sub("jora"), &sub("valera"), Role::Admin)
        .await
        .unwrap();
    h.participants
        .update_role(&id, &sub("jora"), &sub("radu"), Role::Admin)
        .await
        .unwrap();

    let err = h
        .participants
        .remove_member(&id, &sub("valera"), &sub("radu"))
        .await
        .unwrap_err();
    assert!(matches!(err, participant::Error::InsufficientRole));

    // the leader can
    h.participants
        .remove_member(&id, &sub("jora"), &sub("radu"))
        .await
        .unwrap();
}

#[tokio::test]
async fn plain_member_cannot_remove_members() {
    let h = Harness::new();
    let id = group(&h, &sub("jora"), &[sub("valera"), sub("radu")]).await;

    let err = h
        .participants
        .remove_member(&id, &sub("valera"), &sub("radu"))
        .await
        .unwrap_err();

    assert!(matches!(err, participant::Error::InsufficientRole));
}

#[tokio::test]
async fn leadership_is_never_assigned_through_role_update() {
    let h = Harness::new();
    let id = group(&h, &sub("jora"), &[sub("valera")]).await;

    let err = h
        .participants
        .update_role(&id, &sub("jora"), &sub("valera"), Role::Leader)
        .await
        .unwrap_err();

    assert!(matches!(err, participant::Error::RoleNotAssignable));
}

#[tokio::test]
async fn transfer_to_oneself_is_rejected() {
    let h = Harness::new();
    let id = group(&h, &sub("jora"), &[sub("valera")]).await;

    let err = h
        .participants
        .transfer_leadership(&id, &sub("jora"), &sub("jora"))
        .await
        .unwrap_err();

    assert!(matches!(err, participant::Error::SelfTransfer));
}

#[tokio::test]
async fn adding_an_active_member_conflicts() {
    let h = Harness::new();
    let id = group(&h, &sub("jora"), &[sub("valera")]).await;

    let err = h
        .participants
        .add_member(&id, &sub("jora"), sub("valera"))
        .await
        .unwrap_err();

    assert!(matches!(err, participant::Error::AlreadyMember(_)));
}

#[tokio::test]
async fn rejoining_resets_the_role_to_member() {
    let h = Harness::new();
    let id = group(&h, &sub("jora"), &[sub("valera")]).await;
    h.participants
        .update_role(&id, &sub("jora"), &sub("valera"), Role::Admin)
        .await
        .unwrap();

    h.participants
        .remove_member(&id, &sub("jora"), &sub("valera"))
        .await
        .unwrap();
    h.participants
        .add_member(&id, &sub("jora"), sub("valera"))
        .await
        .unwrap();

    let row = h
        .participant_repo
        .find_active(&id, &sub("valera"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.role, Role::Member);
}

#[tokio::test]
async fn member_management_is_rejected_on_private_conversations() {
    let h = Harness::new();
    h.users.befriend(&sub("jora"), &sub("valera"));
    let id = h
        .conversations
        .create_private(&sub("jora"), &sub("valera"))
        .await
        .unwrap();

    let err = h
        .participants
        .add_member(&id, &sub("jora"), sub("radu"))
        .await
        .unwrap_err();

    assert!(matches!(err, participant::Error::NotGroup));
}

#[tokio::test]
async fn blocking_freezes_both_sides_but_keeps_the_pair() {
    let h = Harness::new();
    h.users.befriend(&sub("jora"), &sub("valera"));
    let id = h
        .conversations
        .create_private(&sub("jora"), &sub("valera"))
        .await
        .unwrap();

    h.participants.block(&id, &sub("jora")).await.unwrap();

    for actor in ["jora", "valera"] {
        let err = h
            .messages
            .send(
                &sub(actor),
                SendMessageRequest {
                    conversation_id: id.clone(),
                    content: text("hello?"),
                    reply_to: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            message::Error::_Participant(participant::Error::NotMember(_))
        ));
    }

    // the pair still resolves to the blocked conversation, no duplicate
    let again = h
        .conversations
        .create_private(&sub("valera"), &sub("jora"))
        .await
        .unwrap();
    assert_eq!(again, id);
}

#[tokio::test]
async fn blocking_notifies_the_counterpart_and_freezes_the_mirror() {
    let h = Harness::new();
    h.users.befriend(&sub("jora"), &sub("valera"));
    let id = h
        .conversations
        .create_private(&sub("jora"), &sub("valera"))
        .await
        .unwrap();

    h.participants.block(&id, &sub("jora")).await.unwrap();
    settle().await;

    let notifications = h.events.notifications.lock().unwrap();
    assert!(notifications.iter().any(|(recipients, noti)| {
        noti.kind == NotificationKind::ConversationBlocked
            && recipients == &vec![sub("valera")]
    }));

    let mirrors = h.events.mirrors.lock().unwrap();
    let update = mirrors
        .iter()
        .rev()
        .find(|(mirrored, _)| mirrored == &id)
        .map(|(_, update)| update)
        .unwrap();
    assert_eq!(update.members.as_deref(), Some(&[][..]));
}

#[tokio::test]
async fn blocking_a_group_is_rejected() {
    let h = Harness::new();
    let id = group(&h, &sub("jora"), &[sub("valera")]).await;

    let err = h.participants.block(&id, &sub("jora")).await.unwrap_err();
    assert!(matches!(err, participant::Error::NotPrivate));
}

#[tokio::test]
async fn left_member_loses_every_capability() {
    let h = Harness::new();
    let id = group(&h, &sub("jora"), &[sub("valera")]).await;

    h.participants.leave(&id, &sub("valera")).await.unwrap();

    let err = h
        .messages
        .send(
            &sub("valera"),
            SendMessageRequest {
                conversation_id: id.clone(),
                content: text("still here?"),
                reply_to: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        message::Error::_Participant(participant::Error::NotMember(_))
    ));

    let err = h
        .conversations
        .find_by_id(&id, &sub("valera"))
        .await
        .unwrap_err();
    assert!(matches!(err, conversation::Error::_Participant(_)));
}

#[tokio::test]
async fn fanout_skips_muted_members_and_the_actor() {
    let h = Harness::new();
    let id = group(&h, &sub("jora"), &[sub("valera"), sub("radu")]).await;

    h.participants
        .set_muted(&id, &sub("radu"), true)
        .await
        .unwrap();

    let recipients = h
        .participants
        .fanout_recipients(&id, &sub("jora"))
        .await
        .unwrap();

    assert_eq!(recipients, vec![sub("valera")]);
}

#[tokio::test]
async fn membership_changes_notify_the_other_members() {
    let h = Harness::new();
    let id = group(&h, &sub("jora"), &[sub("valera")]).await;

    h.participants
        .add_member(&id, &sub("jora"), sub("radu"))
        .await
        .unwrap();
    settle().await;

    let notifications = h.events.notifications.lock().unwrap();
    assert!(notifications.iter().any(|(recipients, noti)| {
        noti.kind == NotificationKind::MemberAdded && recipients.contains(&sub("radu"))
    }));
}

#[tokio::test]
async fn nickname_overrides_the_profile_name() {
    let h = Harness::new();
    let id = group(&h, &sub("jora"), &[sub("valera")]).await;

    h.participants
        .set_nickname(&id, &sub("valera"), Some("Val".into()))
        .await
        .unwrap();

    let details = h
        .conversations
        .find_by_id(&id, &sub("jora"))
        .await
        .unwrap();
    let member = details
        .members
        .iter()
        .find(|m| m.sub == sub("valera"))
        .unwrap();
    assert_eq!(member.name, "Val");
}
