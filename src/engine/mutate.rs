//! The mutation engine: optimistic-apply / confirm-or-revert around every
//! task service verb.
//!
//! Each operation validates locally, applies the speculative change through
//! the store's setters, marks the owning quest loading, awaits the service,
//! and then either adopts the authoritative reply or rolls the subtree back
//! to its pre-call shape. Failures never propagate: every public operation
//! resolves normally and surfaces a fixed notice instead.
//!
//! Store borrows are taken per phase and never held across an await, so an
//! interleaved call always sees (and updates) the current state rather than
//! a stale copy captured at issue time.

use chrono::Utc;
use tracing::{debug, warn};

use crate::model::{Quest, QuestPatch, SideQuest, SideQuestPatch, Status};
use crate::service::{QuestDraft, QuestReply, ServiceError};

use super::anim::{flag_quest_created, flag_quest_status, flag_side_quest_status};
use super::sched::TimerKey;
use super::{Command, Engine, Notice};

const ERR_CREATE_QUEST: &str = "Failed to create quest";
const ERR_UPDATE_QUEST: &str = "Failed to update quest";
const ERR_DELETE_QUEST: &str = "Failed to delete quest";
const ERR_ADD_SIDE_QUEST: &str = "Failed to add side quest";
const ERR_UPDATE_SIDE_QUEST: &str = "Failed to update side quest";
const ERR_DELETE_SIDE_QUEST: &str = "Failed to delete side quest";
const ERR_SET_STATUS: &str = "Failed to update status";

impl Engine {
    /// Dispatch a command produced by the key handler
    pub async fn dispatch(&self, command: Command) {
        match command {
            Command::CreateQuest(draft) => self.create_quest(draft).await,
            Command::DeleteQuest { id } => self.delete_quest(&id).await,
            Command::UpdateQuest { id, patch } => self.update_quest(&id, patch).await,
            Command::CreateSideQuest {
                quest_id,
                description,
            } => self.create_side_quest(&quest_id, &description).await,
            Command::UpdateSideQuest {
                quest_id,
                side_quest_id,
                patch,
            } => self.update_side_quest(&quest_id, &side_quest_id, patch).await,
            Command::DeleteSideQuest {
                quest_id,
                side_quest_id,
            } => self.delete_side_quest(&quest_id, &side_quest_id).await,
            Command::SetQuestStatus { id, status, note } => {
                self.set_quest_status(&id, status, note.as_deref()).await
            }
            Command::SetSideQuestStatus {
                quest_id,
                side_quest_id,
                status,
                note,
            } => {
                self.set_side_quest_status(&quest_id, &side_quest_id, status, note.as_deref())
                    .await
            }
        }
    }

    // -----------------------------------------------------------------------
    // Quest-level verbs
    // -----------------------------------------------------------------------

    /// Create a quest. No speculative record: the server assigns the id, so
    /// the quest appears (with spawn animation) when the reply lands.
    pub async fn create_quest(&self, draft: QuestDraft) {
        let description = draft.description.trim().to_string();
        if description.is_empty() {
            return;
        }
        let draft = QuestDraft {
            description,
            ..draft
        };
        debug!(description = %draft.description, "create quest");

        let result = self.service().create_quest(draft).await;
        let now = self.now();
        let mut st = self.state();
        match result {
            Ok(reply) => {
                let quest = reply.quest.clone();
                let id = quest.id.clone();
                st.store.update_quests(move |quests| {
                    match quests.iter().position(|q| q.id == quest.id) {
                        Some(index) => quests[index] = quest,
                        None => quests.insert(0, quest),
                    }
                });
                flag_quest_created(&mut st, &id, now);
                st.tokens.bump_quests();
                st.request_refresh(now);
                forward_xp(&mut st, reply);
            }
            Err(err) => {
                warn!(error = %err, "create quest failed");
                st.notify(Notice::Error(ERR_CREATE_QUEST.to_string()));
            }
        }
    }

    /// Delete a quest: removed locally and snapshotted to the undo queue
    /// before the network call. A failed delete reverts the local removal
    /// and dismisses the snapshot, keeping UI and server in sync.
    pub async fn delete_quest(&self, id: &str) {
        let (snapshot, index, entry_id) = {
            let now = self.now();
            let mut st = self.state();
            let Some(index) = st.store.quest_index(id) else {
                return;
            };
            let snapshot = st.store.quests()[index].clone();
            st.store.update_quests(|quests| {
                quests.remove(index);
            });
            st.store.forget_quest(id);
            st.sched.cancel_quest(id);
            let entry_id = st.schedule_undo(snapshot.clone(), now);
            st.tokens.bump_quests();
            st.tokens.forget(id);
            st.request_refresh(now);
            (snapshot, index, entry_id)
        };
        debug!(quest = id, "delete quest");

        let result = self.service().delete_quest(id.to_string()).await;
        match result {
            Ok(true) => {}
            Ok(false) | Err(_) => {
                if let Err(err) = &result {
                    warn!(error = %err, quest = id, "delete quest failed");
                } else {
                    warn!(quest = id, "delete quest rejected");
                }
                let now = self.now();
                let mut st = self.state();
                if st.undo.remove(&entry_id).is_some() {
                    st.sched.cancel(&TimerKey::UndoExpiry(entry_id));
                }
                st.store.update_quests(move |quests| {
                    if !quests.iter().any(|q| q.id == snapshot.id) {
                        let at = index.min(quests.len());
                        quests.insert(at, snapshot);
                    }
                });
                st.tokens.bump_quests();
                st.request_refresh(now);
                st.notify(Notice::Error(ERR_DELETE_QUEST.to_string()));
            }
        }
    }

    /// Patch a quest's fields. The patch is applied speculatively; quest
    /// edit state clears as soon as the call is issued, whatever the outcome.
    pub async fn update_quest(&self, id: &str, patch: QuestPatch) {
        if patch
            .description
            .as_deref()
            .is_some_and(|text| text.trim().is_empty())
        {
            return;
        }
        let snapshot = {
            let now = self.now();
            let mut st = self.state();
            let Some(snapshot) = st.store.quest(id).cloned() else {
                return;
            };
            let applied = patch.clone();
            let quest_id = id.to_string();
            st.store.update_quests(move |quests| {
                if let Some(quest) = quests.iter_mut().find(|q| q.id == quest_id) {
                    applied.apply_to(quest);
                }
            });
            if st.store.selection.editing_quest.as_deref() == Some(id) {
                st.store.selection.editing_quest = None;
            }
            st.store.loading.insert(id.to_string());
            st.request_refresh(now);
            snapshot
        };

        let result = self.service().update_quest(id.to_string(), patch).await;
        self.confirm_or_revert_quest(id, result, snapshot, ERR_UPDATE_QUEST);
    }

    /// Toggle or set a quest's status
    pub async fn set_quest_status(&self, id: &str, status: Status, note: Option<&str>) {
        let previous = {
            let now = self.now();
            let mut st = self.state();
            let Some(previous) = st.store.quest(id).map(|q| q.status) else {
                return;
            };
            let quest_id = id.to_string();
            st.store.update_quests(move |quests| {
                if let Some(quest) = quests.iter_mut().find(|q| q.id == quest_id) {
                    quest.status = status;
                }
            });
            st.store.loading.insert(id.to_string());
            st.request_refresh(now);
            previous
        };

        let result = self
            .service()
            .set_quest_status(id.to_string(), status, note.map(str::to_string))
            .await;
        let now = self.now();
        let mut st = self.state();
        st.store.loading.remove(id);
        match result {
            Ok(reply) => {
                let quest = reply.quest.clone();
                let resolved = quest.status;
                let quest_id = id.to_string();
                st.store.update_quests(move |quests| {
                    if let Some(index) = quests.iter().position(|q| q.id == quest_id) {
                        quests[index] = quest;
                    }
                });
                flag_quest_status(&mut st, id, resolved, now);
                st.tokens.bump_quests();
                st.request_refresh(now);
                forward_xp(&mut st, reply);
            }
            Err(err) => {
                warn!(error = %err, quest = id, "set quest status failed");
                let quest_id = id.to_string();
                st.store.update_quests(move |quests| {
                    if let Some(quest) = quests.iter_mut().find(|q| q.id == quest_id) {
                        quest.status = previous;
                    }
                });
                st.request_refresh(now);
                st.notify(Notice::Error(ERR_SET_STATUS.to_string()));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Side-quest verbs
    // -----------------------------------------------------------------------

    /// Add a side-quest: a synthetic optimistic record is spliced in
    /// immediately and replaced by the authoritative subtree on success,
    /// or removed (restoring the exact pre-call shape) on failure.
    pub async fn create_side_quest(&self, quest_id: &str, description: &str) {
        let text = description.trim().to_string();
        if text.is_empty() {
            return;
        }
        let optimistic_id = {
            let now = self.now();
            let mut st = self.state();
            if st.store.quest(quest_id).is_none() {
                return;
            }
            let sub = SideQuest::optimistic(quest_id, &text, Utc::now().timestamp_millis());
            let optimistic_id = sub.id.clone();
            let owner = quest_id.to_string();
            st.store.update_quests(move |quests| {
                if let Some(quest) = quests.iter_mut().find(|q| q.id == owner) {
                    quest.side_quests.push(sub);
                }
            });
            st.store.loading.insert(quest_id.to_string());
            st.request_refresh(now);
            optimistic_id
        };
        debug!(quest = quest_id, "create side quest");

        let result = self
            .service()
            .create_side_quest(quest_id.to_string(), text)
            .await;
        let now = self.now();
        let mut st = self.state();
        st.store.loading.remove(quest_id);
        match result {
            Ok(reply) => {
                let quest = reply.quest.clone();
                st.store.update_quests(move |quests| {
                    if let Some(index) = quests.iter().position(|q| q.id == quest.id) {
                        quests[index] = quest;
                    }
                });
                st.tokens.bump_side_quests(quest_id);
                st.request_refresh(now);
                forward_xp(&mut st, reply);
            }
            Err(err) => {
                warn!(error = %err, quest = quest_id, "create side quest failed");
                let owner = quest_id.to_string();
                st.store.update_quests(move |quests| {
                    if let Some(quest) = quests.iter_mut().find(|q| q.id == owner) {
                        quest.side_quests.retain(|s| s.id != optimistic_id);
                    }
                });
                st.request_refresh(now);
                st.notify(Notice::Error(ERR_ADD_SIDE_QUEST.to_string()));
            }
        }
    }

    pub async fn update_side_quest(
        &self,
        quest_id: &str,
        side_quest_id: &str,
        patch: SideQuestPatch,
    ) {
        if patch
            .description
            .as_deref()
            .is_some_and(|text| text.trim().is_empty())
        {
            return;
        }
        let snapshot = {
            let now = self.now();
            let mut st = self.state();
            let Some(snapshot) = st
                .store
                .quest(quest_id)
                .and_then(|q| q.side_quest(side_quest_id))
                .cloned()
            else {
                return;
            };
            let applied = patch.clone();
            let (owner, sub_id) = (quest_id.to_string(), side_quest_id.to_string());
            st.store.update_quests(move |quests| {
                if let Some(sub) = quests
                    .iter_mut()
                    .find(|q| q.id == owner)
                    .and_then(|q| q.side_quest_mut(&sub_id))
                {
                    applied.apply_to(sub);
                }
            });
            st.store.loading.insert(quest_id.to_string());
            st.request_refresh(now);
            snapshot
        };

        let result = self
            .service()
            .update_side_quest(quest_id.to_string(), side_quest_id.to_string(), patch)
            .await;
        let now = self.now();
        let mut st = self.state();
        st.store.loading.remove(quest_id);
        match result {
            Ok(reply) => {
                let quest = reply.quest.clone();
                st.store.update_quests(move |quests| {
                    if let Some(index) = quests.iter().position(|q| q.id == quest.id) {
                        quests[index] = quest;
                    }
                });
                st.tokens.bump_side_quests(quest_id);
                st.request_refresh(now);
                forward_xp(&mut st, reply);
            }
            Err(err) => {
                warn!(error = %err, quest = quest_id, "update side quest failed");
                let owner = quest_id.to_string();
                st.store.update_quests(move |quests| {
                    if let Some(sub) = quests
                        .iter_mut()
                        .find(|q| q.id == owner)
                        .and_then(|q| q.side_quest_mut(&snapshot.id))
                    {
                        *sub = snapshot;
                    }
                });
                st.request_refresh(now);
                st.notify(Notice::Error(ERR_UPDATE_SIDE_QUEST.to_string()));
            }
        }
    }

    pub async fn delete_side_quest(&self, quest_id: &str, side_quest_id: &str) {
        let (snapshot, index) = {
            let now = self.now();
            let mut st = self.state();
            let Some((index, snapshot)) = st.store.quest(quest_id).and_then(|q| {
                q.side_quests
                    .iter()
                    .position(|s| s.id == side_quest_id)
                    .map(|i| (i, q.side_quests[i].clone()))
            }) else {
                return;
            };
            let owner = quest_id.to_string();
            st.store.update_quests(move |quests| {
                if let Some(quest) = quests.iter_mut().find(|q| q.id == owner) {
                    quest.side_quests.remove(index);
                }
            });
            st.store.loading.insert(quest_id.to_string());
            st.request_refresh(now);
            (snapshot, index)
        };

        let result = self
            .service()
            .delete_side_quest(quest_id.to_string(), side_quest_id.to_string())
            .await;
        let now = self.now();
        let mut st = self.state();
        st.store.loading.remove(quest_id);
        match result {
            Ok(reply) => {
                let quest = reply.quest.clone();
                st.store.update_quests(move |quests| {
                    if let Some(list_index) = quests.iter().position(|q| q.id == quest.id) {
                        quests[list_index] = quest;
                    }
                });
                st.tokens.bump_side_quests(quest_id);
                st.request_refresh(now);
                forward_xp(&mut st, reply);
            }
            Err(err) => {
                warn!(error = %err, quest = quest_id, "delete side quest failed");
                let owner = quest_id.to_string();
                st.store.update_quests(move |quests| {
                    if let Some(quest) = quests.iter_mut().find(|q| q.id == owner) {
                        let at = index.min(quest.side_quests.len());
                        quest.side_quests.insert(at, snapshot);
                    }
                });
                st.request_refresh(now);
                st.notify(Notice::Error(ERR_DELETE_SIDE_QUEST.to_string()));
            }
        }
    }

    pub async fn set_side_quest_status(
        &self,
        quest_id: &str,
        side_quest_id: &str,
        status: Status,
        note: Option<&str>,
    ) {
        let previous = {
            let now = self.now();
            let mut st = self.state();
            let Some(previous) = st
                .store
                .quest(quest_id)
                .and_then(|q| q.side_quest(side_quest_id))
                .map(|s| s.status)
            else {
                return;
            };
            let (owner, sub_id) = (quest_id.to_string(), side_quest_id.to_string());
            st.store.update_quests(move |quests| {
                if let Some(sub) = quests
                    .iter_mut()
                    .find(|q| q.id == owner)
                    .and_then(|q| q.side_quest_mut(&sub_id))
                {
                    sub.status = status;
                }
            });
            st.store.loading.insert(quest_id.to_string());
            st.request_refresh(now);
            previous
        };

        let result = self
            .service()
            .set_side_quest_status(
                quest_id.to_string(),
                side_quest_id.to_string(),
                status,
                note.map(str::to_string),
            )
            .await;
        let now = self.now();
        let mut st = self.state();
        st.store.loading.remove(quest_id);
        match result {
            Ok(reply) => {
                let quest = reply.quest.clone();
                let resolved = quest
                    .side_quest(side_quest_id)
                    .map(|s| s.status)
                    .unwrap_or(status);
                st.store.update_quests(move |quests| {
                    if let Some(index) = quests.iter().position(|q| q.id == quest.id) {
                        quests[index] = quest;
                    }
                });
                flag_side_quest_status(&mut st, quest_id, side_quest_id, resolved, now);
                st.tokens.bump_side_quests(quest_id);
                st.request_refresh(now);
                forward_xp(&mut st, reply);
            }
            Err(err) => {
                warn!(error = %err, quest = quest_id, "set side quest status failed");
                let (owner, sub_id) = (quest_id.to_string(), side_quest_id.to_string());
                st.store.update_quests(move |quests| {
                    if let Some(sub) = quests
                        .iter_mut()
                        .find(|q| q.id == owner)
                        .and_then(|q| q.side_quest_mut(&sub_id))
                    {
                        sub.status = previous;
                    }
                });
                st.request_refresh(now);
                st.notify(Notice::Error(ERR_SET_STATUS.to_string()));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Shared plumbing
    // -----------------------------------------------------------------------

    fn confirm_or_revert_quest(
        &self,
        id: &str,
        result: Result<QuestReply, ServiceError>,
        snapshot: Quest,
        failure: &str,
    ) {
        let now = self.now();
        let mut st = self.state();
        st.store.loading.remove(id);
        match result {
            Ok(reply) => {
                let quest = reply.quest.clone();
                st.store.update_quests(move |quests| {
                    if let Some(index) = quests.iter().position(|q| q.id == quest.id) {
                        quests[index] = quest;
                    }
                });
                st.tokens.bump_quests();
                st.request_refresh(now);
                forward_xp(&mut st, reply);
            }
            Err(err) => {
                warn!(error = %err, quest = id, "quest mutation failed");
                st.store.update_quests(move |quests| {
                    if let Some(index) = quests.iter().position(|q| q.id == snapshot.id) {
                        quests[index] = snapshot;
                    }
                });
                st.request_refresh(now);
                st.notify(Notice::Error(failure.to_string()));
            }
        }
    }
}

fn forward_xp(st: &mut super::EngineState, reply: QuestReply) {
    if let Some(xp) = reply.xp {
        st.notify(Notice::Xp(xp));
    }
}
