use std::collections::HashSet;
use std::time::Instant;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::Status;

use super::EngineState;
use super::sched::TimerKey;

/// Pulse intensity tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pulse {
    Full,
    Subtle,
    Spawn,
}

/// Compound key for side-quest pulses
pub fn side_quest_key(quest_id: &str, side_quest_id: &str) -> String {
    format!("{}:{}", quest_id, side_quest_id)
}

/// Short-lived, purely presentational flags.
///
/// Four independent maps keyed by quest id (or `"questId:sideQuestId"` for
/// side-quest pulses). Entries are inserted on a triggering transition and
/// removed by scheduler timers, never by further state changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationFlags {
    pub pulse: IndexMap<String, Pulse>,
    pub glow: HashSet<String>,
    pub spawn: HashSet<String>,
    pub celebrating: HashSet<String>,
}

impl AnimationFlags {
    /// Drop every flag referencing a quest (quest deleted mid-animation)
    pub fn clear_quest(&mut self, quest_id: &str) {
        let prefix = format!("{}:", quest_id);
        self.pulse
            .retain(|key, _| key != quest_id && !key.starts_with(&prefix));
        self.glow.remove(quest_id);
        self.spawn.remove(quest_id);
        self.celebrating.remove(quest_id);
    }

    pub fn clear(&mut self) {
        self.pulse.clear();
        self.glow.clear();
        self.spawn.clear();
        self.celebrating.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pulse.is_empty()
            && self.glow.is_empty()
            && self.spawn.is_empty()
            && self.celebrating.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Flag controller
//
// Pure reaction layer: given a transition, set flags and arm their expiry
// timers. Independent of whether the transition was optimistic or confirmed.
// ---------------------------------------------------------------------------

/// Quest creation: spawn flag + spawn pulse, auto-cleared together
pub(crate) fn flag_quest_created(state: &mut EngineState, id: &str, now: Instant) {
    let window = state.config.timings.spawn();
    state.store.anim.spawn.insert(id.to_string());
    state.store.anim.pulse.insert(id.to_string(), Pulse::Spawn);
    state.sched.arm(TimerKey::Spawn(id.to_string()), now + window);
    state.sched.arm(TimerKey::QuestPulse(id.to_string()), now + window);
}

/// A quest status write resolved. Done additionally glows, celebrates, and
/// schedules the delayed collapse-and-move so the row is not yanked away
/// before the completion animation finishes.
pub(crate) fn flag_quest_status(state: &mut EngineState, id: &str, status: Status, now: Instant) {
    let t = &state.config.timings;
    let (pulse, glow, celebrate, sink) = (t.pulse(), t.glow(), t.celebrate(), t.sink_delay());

    state.store.anim.pulse.insert(id.to_string(), Pulse::Full);
    state.sched.arm(TimerKey::QuestPulse(id.to_string()), now + pulse);

    if status.is_done() {
        state.store.anim.glow.insert(id.to_string());
        state.store.anim.celebrating.insert(id.to_string());
        state.sched.arm(TimerKey::Glow(id.to_string()), now + glow);
        state.sched.arm(TimerKey::Celebrate(id.to_string()), now + celebrate);
        state.sched.arm(TimerKey::SinkDone(id.to_string()), now + sink);
    }
}

/// A side-quest status write resolved: pulse on the compound key, full when
/// it became done (and the parent is force-expanded so the completed item
/// stays visible), subtle otherwise.
pub(crate) fn flag_side_quest_status(
    state: &mut EngineState,
    quest_id: &str,
    side_quest_id: &str,
    status: Status,
    now: Instant,
) {
    let window = state.config.timings.pulse();
    let tag = if status.is_done() {
        Pulse::Full
    } else {
        Pulse::Subtle
    };
    state
        .store
        .anim
        .pulse
        .insert(side_quest_key(quest_id, side_quest_id), tag);
    state.sched.arm(
        TimerKey::SideQuestPulse(quest_id.to_string(), side_quest_id.to_string()),
        now + window,
    );
    if status.is_done() {
        state.store.set_collapsed(quest_id, false);
    }
}
