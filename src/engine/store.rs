use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::{Quest, SideQuest};

use super::anim::AnimationFlags;

/// A selected side-quest, addressed through its owning quest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideQuestRef {
    pub quest_id: String,
    pub side_quest_id: String,
}

/// An in-progress side-quest edit with its text buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideQuestEdit {
    pub quest_id: String,
    pub side_quest_id: String,
    pub buffer: String,
}

/// Which quest/side-quest is selected or being edited.
///
/// Invariant: whenever the referenced quest or side-quest disappears from the
/// list, every field referencing it is cleared within the same update cycle
/// (enforced by the store's setters).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionState {
    pub selected_quest: Option<String>,
    pub selected_side_quest: Option<SideQuestRef>,
    pub editing_quest: Option<String>,
    pub editing_side_quest: Option<SideQuestEdit>,
}

/// Single source of truth for the quest list and all ephemeral UI maps.
///
/// The quest list is owned exclusively here and mutated only through
/// `set_quests`/`update_quests`, both of which apply against the *current*
/// state and re-establish the selection invariant before returning. That is
/// what lets interleaved optimistic and server-confirmed writes coexist
/// without clobbering each other from a stale copy.
#[derive(Debug, Default)]
pub struct QuestStore {
    quests: Vec<Quest>,
    /// Quests with a service call in flight
    pub loading: HashSet<String>,
    pub anim: AnimationFlags,
    /// Collapsed panels; absent means expanded
    pub collapsed: IndexMap<String, bool>,
    pub selection: SelectionState,
}

impl QuestStore {
    pub fn new() -> Self {
        QuestStore::default()
    }

    pub fn quests(&self) -> &[Quest] {
        &self.quests
    }

    /// Replace the quest list with a literal value
    pub fn set_quests(&mut self, quests: Vec<Quest>) {
        self.quests = quests;
        self.heal_selection();
    }

    /// Functional update: the closure sees the current list, not a captured
    /// copy from when the triggering operation started
    pub fn update_quests(&mut self, f: impl FnOnce(&mut Vec<Quest>)) {
        f(&mut self.quests);
        self.heal_selection();
    }

    pub fn quest(&self, id: &str) -> Option<&Quest> {
        self.quests.iter().find(|q| q.id == id)
    }

    pub fn quest_index(&self, id: &str) -> Option<usize> {
        self.quests.iter().position(|q| q.id == id)
    }

    pub fn side_quests(&self, quest_id: &str) -> Option<&[SideQuest]> {
        self.quest(quest_id).map(|q| q.side_quests.as_slice())
    }

    pub fn is_collapsed(&self, quest_id: &str) -> bool {
        self.collapsed.get(quest_id).copied().unwrap_or(false)
    }

    pub fn set_collapsed(&mut self, quest_id: &str, collapsed: bool) {
        self.collapsed.insert(quest_id.to_string(), collapsed);
    }

    /// Atomically clear all selection and edit fields; used when starting
    /// any exclusive editing action and on teardown
    pub fn reset_transient_state(&mut self) {
        self.selection = SelectionState::default();
    }

    /// Drop all per-quest ephemera for a removed quest
    pub fn forget_quest(&mut self, quest_id: &str) {
        self.loading.remove(quest_id);
        self.anim.clear_quest(quest_id);
        self.collapsed.shift_remove(quest_id);
    }

    /// Clear selection/edit fields whose referent no longer exists
    fn heal_selection(&mut self) {
        let sel = &mut self.selection;
        if let Some(id) = &sel.selected_quest
            && !self.quests.iter().any(|q| q.id == *id)
        {
            sel.selected_quest = None;
            sel.selected_side_quest = None;
        }
        if let Some(sub) = &sel.selected_side_quest
            && !side_quest_exists(&self.quests, &sub.quest_id, &sub.side_quest_id)
        {
            sel.selected_side_quest = None;
        }
        if let Some(id) = &sel.editing_quest
            && !self.quests.iter().any(|q| q.id == *id)
        {
            sel.editing_quest = None;
        }
        if let Some(edit) = &sel.editing_side_quest
            && !side_quest_exists(&self.quests, &edit.quest_id, &edit.side_quest_id)
        {
            sel.editing_side_quest = None;
        }
    }
}

fn side_quest_exists(quests: &[Quest], quest_id: &str, side_quest_id: &str) -> bool {
    quests
        .iter()
        .find(|q| q.id == quest_id)
        .is_some_and(|q| q.side_quests.iter().any(|s| s.id == side_quest_id))
}
