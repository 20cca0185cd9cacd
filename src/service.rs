//! Task service port.
//!
//! Abstract, transport-agnostic contract the mutation engine mutates against.
//! Replies are a tagged result rather than a bare nullable: `Rejected` stands
//! for an application-level "null" reply, `Transport` for a failed call. The
//! engine treats both as failure but matches them exhaustively.
//!
//! The async methods use `async_trait` instead of returning
//! `Pin<Box<dyn Future>>` for better mockall compatibility.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{Priority, Quest, QuestPatch, SideQuestPatch, Status};

/// Failure modes of a task service call
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    /// The service answered but declined the operation (a recoverable,
    /// application-level failure)
    #[error("request rejected: {0}")]
    Rejected(String),
    /// The call itself failed (network, timeout, serialization)
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Opaque reward payload; forwarded to the notification layer uninterpreted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct XpPayload {
    #[serde(default)]
    pub xp_events: serde_json::Value,
    #[serde(default)]
    pub player_rpg: serde_json::Value,
}

/// A successful mutation reply: the authoritative quest (for side-quest
/// operations this is the *owning* quest with side_quests populated) plus
/// any reward payload the server attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestReply {
    pub quest: Quest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp: Option<XpPayload>,
}

impl QuestReply {
    pub fn new(quest: Quest) -> Self {
        QuestReply { quest, xp: None }
    }
}

/// Fields for a new quest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestDraft {
    pub description: String,
    pub priority: Priority,
    pub task_level: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
}

impl QuestDraft {
    pub fn new(description: impl Into<String>) -> Self {
        QuestDraft {
            description: description.into(),
            priority: Priority::Medium,
            task_level: crate::model::MIN_TASK_LEVEL,
            due_date: None,
            campaign_id: None,
        }
    }
}

/// Port to the remote task service.
///
/// The server assigns authoritative ids; every reply carries the full owning
/// quest so the engine can replace optimistic records wholesale.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TaskService: Send + Sync {
    async fn create_quest(&self, draft: QuestDraft) -> Result<QuestReply, ServiceError>;

    /// Returns whether the quest was deleted; `Ok(false)` is a recoverable
    /// application-level failure.
    async fn delete_quest(&self, id: String) -> Result<bool, ServiceError>;

    async fn update_quest(&self, id: String, patch: QuestPatch)
    -> Result<QuestReply, ServiceError>;

    async fn create_side_quest(
        &self,
        quest_id: String,
        description: String,
    ) -> Result<QuestReply, ServiceError>;

    async fn update_side_quest(
        &self,
        quest_id: String,
        side_quest_id: String,
        patch: SideQuestPatch,
    ) -> Result<QuestReply, ServiceError>;

    async fn delete_side_quest(
        &self,
        quest_id: String,
        side_quest_id: String,
    ) -> Result<QuestReply, ServiceError>;

    async fn set_quest_status(
        &self,
        quest_id: String,
        status: Status,
        note: Option<String>,
    ) -> Result<QuestReply, ServiceError>;

    async fn set_side_quest_status(
        &self,
        quest_id: String,
        side_quest_id: String,
        status: Status,
        note: Option<String>,
    ) -> Result<QuestReply, ServiceError>;
}
