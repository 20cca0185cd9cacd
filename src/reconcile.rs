//! Drag reconciliation.
//!
//! Merges a freshly fetched list with a possibly user-reordered one so a
//! background refresh never visually resets an in-progress drag: survivors
//! keep their previous relative position (with the incoming list's data),
//! newly arrived items append in incoming order, deleted items drop out.
//! Identity is keyed by id, never by reference or position, except as a
//! last-resort fallback for items that carry no id at all.

use std::collections::{HashMap, HashSet};

use crate::model::{Quest, SideQuest};

/// Identity of a list item for reconciliation purposes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemKey {
    Id(String),
    /// Positional fallback for id-less items
    Index(usize),
}

/// Items a list reconciliation can be run over
pub trait Keyed {
    /// Stable identity (an `id` or equivalent key field); `None` falls back
    /// to the positional index
    fn reconcile_id(&self) -> Option<&str>;
}

impl Keyed for Quest {
    fn reconcile_id(&self) -> Option<&str> {
        Some(&self.id)
    }
}

impl Keyed for SideQuest {
    fn reconcile_id(&self) -> Option<&str> {
        Some(&self.id)
    }
}

fn key_of<T: Keyed>(item: &T, index: usize) -> ItemKey {
    match item.reconcile_id() {
        Some(id) => ItemKey::Id(id.to_string()),
        None => ItemKey::Index(index),
    }
}

/// Merge `incoming` (authoritative data) with `previous` (authoritative order).
///
/// Every key present in `incoming` appears exactly once in the result.
pub fn merge<T: Keyed + Clone>(incoming: &[T], previous: &[T]) -> Vec<T> {
    let incoming_by_key: HashMap<ItemKey, usize> = incoming
        .iter()
        .enumerate()
        .map(|(i, item)| (key_of(item, i), i))
        .collect();

    let mut taken: HashSet<ItemKey> = HashSet::new();
    let mut merged: Vec<T> = Vec::with_capacity(incoming.len());

    // Survivors from `previous`, in their previous relative order,
    // carrying the incoming copy of their data.
    for (i, prev) in previous.iter().enumerate() {
        let key = key_of(prev, i);
        if let Some(&idx) = incoming_by_key.get(&key)
            && taken.insert(key)
        {
            merged.push(incoming[idx].clone());
        }
    }

    // Newly arrived items, in incoming order.
    for (i, item) in incoming.iter().enumerate() {
        let key = key_of(item, i);
        if !taken.contains(&key) {
            merged.push(item.clone());
        }
    }

    merged
}

/// Monotonic epochs that force reconciliation to re-run when external data
/// changes. One token for the top-level quest list, one per quest for its
/// side-quest list; the engine bumps them after every successful mutation.
#[derive(Debug, Clone, Default)]
pub struct RefreshTokens {
    quests: u64,
    side_quests: HashMap<String, u64>,
}

impl RefreshTokens {
    pub fn quests(&self) -> u64 {
        self.quests
    }

    pub fn side_quests(&self, quest_id: &str) -> u64 {
        self.side_quests.get(quest_id).copied().unwrap_or(0)
    }

    pub fn bump_quests(&mut self) {
        self.quests += 1;
    }

    pub fn bump_side_quests(&mut self, quest_id: &str) {
        *self.side_quests.entry(quest_id.to_string()).or_insert(0) += 1;
    }

    /// Forget the per-quest token of a deleted quest
    pub fn forget(&mut self, quest_id: &str) {
        self.side_quests.remove(quest_id);
    }
}
