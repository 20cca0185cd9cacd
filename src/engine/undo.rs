use serde::{Deserialize, Serialize};

use crate::model::Quest;

/// A deleted quest held for time-boxed restoration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoEntry {
    /// `"<questId>-<timestamp>"`
    pub id: String,
    /// Deep snapshot, independent of later mutations
    pub quest: Quest,
}

impl UndoEntry {
    pub fn new(quest: Quest, stamp_millis: i64) -> Self {
        UndoEntry {
            id: format!("{}-{}", quest.id, stamp_millis),
            quest,
        }
    }
}

/// FIFO buffer of deleted-quest snapshots. Expiry timers live in the
/// scheduler (`TimerKey::UndoExpiry`); the queue itself only stores entries.
#[derive(Debug, Default)]
pub struct UndoQueue {
    entries: Vec<UndoEntry>,
}

impl UndoQueue {
    pub fn new() -> Self {
        UndoQueue::default()
    }

    pub fn push(&mut self, entry: UndoEntry) {
        self.entries.push(entry);
    }

    pub fn remove(&mut self, entry_id: &str) -> Option<UndoEntry> {
        let index = self.entries.iter().position(|e| e.id == entry_id)?;
        Some(self.entries.remove(index))
    }

    /// Remove the newest entry snapshotting the given quest (restore path)
    pub fn remove_for_quest(&mut self, quest_id: &str) -> Option<UndoEntry> {
        let index = self
            .entries
            .iter()
            .rposition(|e| e.quest.id == quest_id)?;
        Some(self.entries.remove(index))
    }

    pub fn entries(&self) -> &[UndoEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
