use std::collections::HashMap;
use std::time::Instant;

/// Identity of a pending timer. One timer per key: arming an already-armed
/// key replaces the old deadline, so rapid repeated transitions never stack
/// duplicate timers or leave stale flags behind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Pulse on a quest row
    QuestPulse(String),
    /// Pulse on a side-quest row, keyed by (quest, side-quest)
    SideQuestPulse(String, String),
    Glow(String),
    Celebrate(String),
    Spawn(String),
    /// Delayed collapse-and-move of a completed quest
    SinkDone(String),
    /// Expiry of an undo entry, keyed by entry id
    UndoExpiry(String),
    /// Debounced layout refresh signal
    LayoutRefresh,
}

impl TimerKey {
    /// Whether this timer belongs to the given quest
    fn owned_by(&self, quest_id: &str) -> bool {
        match self {
            TimerKey::QuestPulse(id)
            | TimerKey::Glow(id)
            | TimerKey::Celebrate(id)
            | TimerKey::Spawn(id)
            | TimerKey::SinkDone(id)
            | TimerKey::SideQuestPulse(id, _) => id == quest_id,
            TimerKey::UndoExpiry(_) | TimerKey::LayoutRefresh => false,
        }
    }
}

/// Deadline scheduler for all ephemeral state.
///
/// Deliberately passive: the host drives it by calling `Engine::tick`, which
/// drains `due` against an explicit `now`. That keeps every timer testable
/// with a simulated clock and bounds outstanding timers to one per key.
#[derive(Debug, Default)]
pub struct Scheduler {
    pending: HashMap<TimerKey, Instant>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler::default()
    }

    /// Arm (or re-arm) the timer for `key` to fire at `deadline`
    pub fn arm(&mut self, key: TimerKey, deadline: Instant) {
        self.pending.insert(key, deadline);
    }

    pub fn cancel(&mut self, key: &TimerKey) {
        self.pending.remove(key);
    }

    /// Cancel every timer owned by a quest (used when the quest is deleted)
    pub fn cancel_quest(&mut self, quest_id: &str) {
        self.pending.retain(|key, _| !key.owned_by(quest_id));
    }

    pub fn is_armed(&self, key: &TimerKey) -> bool {
        self.pending.contains_key(key)
    }

    /// Remove and return every expired key, ordered by deadline
    pub fn due(&mut self, now: Instant) -> Vec<TimerKey> {
        let mut fired: Vec<(TimerKey, Instant)> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, deadline)| (key.clone(), *deadline))
            .collect();
        fired.sort_by_key(|(_, deadline)| *deadline);
        for (key, _) in &fired {
            self.pending.remove(key);
        }
        fired.into_iter().map(|(key, _)| key).collect()
    }

    /// Cancel everything (component teardown)
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
