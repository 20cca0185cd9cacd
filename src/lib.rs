//! questlog — orchestration engine for a personal quest tracker.
//!
//! Keeps a locally held quest list consistent while performing optimistic
//! mutations against a remote task service, reconciling drag reorders with
//! concurrent refreshes, running a keyboard-driven selection state machine,
//! scheduling short-lived animation flags, and offering time-boxed undo for
//! deletions. Rendering, transport, and reward arithmetic are the host's
//! collaborators, reached through the [`service::TaskService`] port and the
//! [`engine::Notice`] queue.

pub mod config;
pub mod engine;
pub mod model;
pub mod reconcile;
pub mod service;

pub use config::{EngineConfig, Timings};
pub use engine::{Command, ConfirmAction, Engine, Mode, Notice};
pub use engine::anim::{AnimationFlags, Pulse};
pub use engine::store::{QuestStore, SelectionState, SideQuestEdit, SideQuestRef};
pub use engine::undo::UndoEntry;
pub use model::{Priority, Quest, QuestPatch, SideQuest, SideQuestPatch, Status};
pub use service::{QuestDraft, QuestReply, ServiceError, TaskService, XpPayload};
