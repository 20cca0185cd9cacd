use std::time::Instant;

use crate::model::SideQuestPatch;

use super::store::{SideQuestEdit, SideQuestRef};
use super::{Command, EngineState, Mode, Notice};

// ---------------------------------------------------------------------------
// Selection transitions
// ---------------------------------------------------------------------------

pub(crate) fn select_quest(state: &mut EngineState, id: &str, now: Instant) {
    if state.store.quest(id).is_none() {
        return;
    }
    let sel = &mut state.store.selection;
    sel.selected_quest = Some(id.to_string());
    sel.selected_side_quest = None;
    sel.editing_side_quest = None;
    // Selecting auto-expands the quest's panel.
    state.store.set_collapsed(id, false);
    state.request_refresh(now);
}

pub(crate) fn select_side_quest(
    state: &mut EngineState,
    quest_id: &str,
    side_quest_id: &str,
    now: Instant,
) {
    let exists = state
        .store
        .quest(quest_id)
        .is_some_and(|q| q.side_quest(side_quest_id).is_some());
    if !exists {
        return;
    }
    let sel = &mut state.store.selection;
    sel.selected_quest = Some(quest_id.to_string());
    sel.selected_side_quest = Some(SideQuestRef {
        quest_id: quest_id.to_string(),
        side_quest_id: side_quest_id.to_string(),
    });
    state.store.set_collapsed(quest_id, false);
    state.request_refresh(now);
}

/// Back to none-selected. Quest-level edit state survives; only side-quest
/// selection and an in-progress side-quest edit are cleared.
pub(crate) fn clear_selection(state: &mut EngineState, now: Instant) {
    let sel = &mut state.store.selection;
    sel.selected_quest = None;
    sel.selected_side_quest = None;
    sel.editing_side_quest = None;
    state.mode = Mode::Navigate;
    state.request_refresh(now);
}

// ---------------------------------------------------------------------------
// Editing
// ---------------------------------------------------------------------------

pub(crate) fn start_editing_quest(state: &mut EngineState, id: &str, now: Instant) {
    if state.store.quest(id).is_none() {
        return;
    }
    // Editing is exclusive: drop any other selection/edit first.
    state.store.reset_transient_state();
    state.store.selection.selected_quest = Some(id.to_string());
    state.store.selection.editing_quest = Some(id.to_string());
    state.request_refresh(now);
}

pub(crate) fn start_editing_side_quest(
    state: &mut EngineState,
    quest_id: &str,
    side_quest_id: &str,
    now: Instant,
) {
    let Some(description) = state
        .store
        .quest(quest_id)
        .and_then(|q| q.side_quest(side_quest_id))
        .map(|s| s.description.clone())
    else {
        return;
    };
    state.store.reset_transient_state();
    let sel = &mut state.store.selection;
    sel.selected_quest = Some(quest_id.to_string());
    sel.selected_side_quest = Some(SideQuestRef {
        quest_id: quest_id.to_string(),
        side_quest_id: side_quest_id.to_string(),
    });
    sel.editing_side_quest = Some(SideQuestEdit {
        quest_id: quest_id.to_string(),
        side_quest_id: side_quest_id.to_string(),
        buffer: description,
    });
    state.mode = Mode::EditSideQuest;
    state.notify(Notice::FocusSideQuestInput {
        quest_id: quest_id.to_string(),
        side_quest_id: side_quest_id.to_string(),
    });
    state.request_refresh(now);
}

pub(crate) fn cancel_side_quest_edit(state: &mut EngineState, now: Instant) {
    state.store.selection.editing_side_quest = None;
    state.mode = Mode::Navigate;
    state.request_refresh(now);
}

/// Validate the edit buffer and hand the save off to the mutation engine.
/// Empty trimmed text keeps the edit open and surfaces a notice.
pub(crate) fn save_side_quest_edit(state: &mut EngineState, now: Instant) -> Option<Command> {
    let edit = state.store.selection.editing_side_quest.clone()?;
    let text = edit.buffer.trim().to_string();
    if text.is_empty() {
        state.notify(Notice::Error("Description cannot be empty".to_string()));
        return None;
    }
    state.store.selection.editing_side_quest = None;
    state.mode = Mode::Navigate;
    state.request_refresh(now);
    Some(Command::UpdateSideQuest {
        quest_id: edit.quest_id,
        side_quest_id: edit.side_quest_id,
        patch: SideQuestPatch::description(text),
    })
}

// ---------------------------------------------------------------------------
// Keyboard movement
// ---------------------------------------------------------------------------

/// Move quest selection by ±1, clamped to list bounds
pub(crate) fn move_selection(state: &mut EngineState, delta: isize, now: Instant) {
    let quests = state.store.quests();
    if quests.is_empty() {
        return;
    }
    let last = quests.len() - 1;
    let next = match state
        .store
        .selection
        .selected_quest
        .as_deref()
        .and_then(|id| state.store.quest_index(id))
    {
        Some(index) => (index as isize + delta).clamp(0, last as isize) as usize,
        // Nothing selected yet: j lands on the first quest, k on the last.
        None if delta >= 0 => 0,
        None => last,
    };
    let id = quests[next].id.clone();
    select_quest(state, &id, now);
}

/// One stop in the depth-first Tab walk
#[derive(Debug, Clone, PartialEq, Eq)]
enum WalkStop {
    Quest(String),
    Side(String, String),
}

fn flat_walk(state: &EngineState) -> Vec<WalkStop> {
    let mut stops = Vec::new();
    for quest in state.store.quests() {
        stops.push(WalkStop::Quest(quest.id.clone()));
        for sub in &quest.side_quests {
            stops.push(WalkStop::Side(quest.id.clone(), sub.id.clone()));
        }
    }
    stops
}

fn current_stop(state: &EngineState, stops: &[WalkStop]) -> Option<usize> {
    let sel = &state.store.selection;
    if let Some(sub) = &sel.selected_side_quest {
        let stop = WalkStop::Side(sub.quest_id.clone(), sub.side_quest_id.clone());
        return stops.iter().position(|s| *s == stop);
    }
    let id = sel.selected_quest.as_ref()?;
    stops.iter().position(|s| *s == WalkStop::Quest(id.clone()))
}

fn goto_stop(state: &mut EngineState, stop: WalkStop, now: Instant) {
    match stop {
        WalkStop::Quest(id) => select_quest(state, &id, now),
        WalkStop::Side(quest_id, side_quest_id) => {
            select_side_quest(state, &quest_id, &side_quest_id, now)
        }
    }
}

/// Tab: depth-first across a quest's side-quests, then on to the next quest.
/// Side-quest selection clears itself at quest boundaries because the next
/// stop is a plain quest selection. Clamps at the end of the list.
pub(crate) fn walk_next(state: &mut EngineState, now: Instant) {
    let stops = flat_walk(state);
    if stops.is_empty() {
        return;
    }
    let next = match current_stop(state, &stops) {
        Some(index) => (index + 1).min(stops.len() - 1),
        None => 0,
    };
    goto_stop(state, stops[next].clone(), now);
}

/// Shift+Tab: the reverse walk
pub(crate) fn walk_prev(state: &mut EngineState, now: Instant) {
    let stops = flat_walk(state);
    if stops.is_empty() {
        return;
    }
    let prev = match current_stop(state, &stops) {
        Some(index) => index.saturating_sub(1),
        None => stops.len() - 1,
    };
    goto_stop(state, stops[prev].clone(), now);
}

/// ArrowRight: enter the selected quest's first side-quest, expanding it
pub(crate) fn enter_side_quests(state: &mut EngineState, now: Instant) {
    let Some(quest_id) = state.store.selection.selected_quest.clone() else {
        return;
    };
    let Some(first) = state
        .store
        .quest(&quest_id)
        .and_then(|q| q.side_quests.first())
        .map(|s| s.id.clone())
    else {
        return;
    };
    select_side_quest(state, &quest_id, &first, now);
}

/// ArrowLeft: leave side-quest selection, back to the parent quest
pub(crate) fn exit_side_quest(state: &mut EngineState, now: Instant) {
    let Some(sub) = state.store.selection.selected_side_quest.clone() else {
        return;
    };
    select_quest(state, &sub.quest_id, now);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::model::{Quest, SideQuest};

    fn state_with_quests() -> EngineState {
        let mut state = EngineState::new(EngineConfig::default());
        let mut a = Quest::new("a", "First");
        a.side_quests.push(SideQuest::new("a1", "sub one"));
        a.side_quests.push(SideQuest::new("a2", "sub two"));
        let b = Quest::new("b", "Second");
        state.store.set_quests(vec![a, b]);
        state
    }

    fn now() -> Instant {
        Instant::now()
    }

    #[test]
    fn test_select_quest_clears_side_selection_and_expands() {
        let mut state = state_with_quests();
        state.store.set_collapsed("b", true);
        select_side_quest(&mut state, "a", "a1", now());

        select_quest(&mut state, "b", now());
        let sel = &state.store.selection;
        assert_eq!(sel.selected_quest.as_deref(), Some("b"));
        assert_eq!(sel.selected_side_quest, None);
        assert!(!state.store.is_collapsed("b"));
    }

    #[test]
    fn test_select_missing_quest_is_noop() {
        let mut state = state_with_quests();
        select_quest(&mut state, "zzz", now());
        assert_eq!(state.store.selection.selected_quest, None);
    }

    #[test]
    fn test_clear_selection_keeps_quest_edit_state() {
        let mut state = state_with_quests();
        select_side_quest(&mut state, "a", "a1", now());
        state.store.selection.editing_quest = Some("a".into());

        clear_selection(&mut state, now());
        let sel = &state.store.selection;
        assert_eq!(sel.selected_quest, None);
        assert_eq!(sel.selected_side_quest, None);
        assert_eq!(sel.editing_quest.as_deref(), Some("a"));
    }

    #[test]
    fn test_move_selection_clamps_at_bounds() {
        let mut state = state_with_quests();
        move_selection(&mut state, 1, now());
        assert_eq!(state.store.selection.selected_quest.as_deref(), Some("a"));

        move_selection(&mut state, -1, now());
        assert_eq!(state.store.selection.selected_quest.as_deref(), Some("a"));

        move_selection(&mut state, 1, now());
        move_selection(&mut state, 1, now());
        assert_eq!(state.store.selection.selected_quest.as_deref(), Some("b"));
    }

    #[test]
    fn test_tab_walk_descends_then_crosses_quest_boundary() {
        let mut state = state_with_quests();
        walk_next(&mut state, now());
        assert_eq!(state.store.selection.selected_quest.as_deref(), Some("a"));
        assert_eq!(state.store.selection.selected_side_quest, None);

        walk_next(&mut state, now());
        let sub = state.store.selection.selected_side_quest.clone().unwrap();
        assert_eq!(sub.side_quest_id, "a1");

        walk_next(&mut state, now());
        let sub = state.store.selection.selected_side_quest.clone().unwrap();
        assert_eq!(sub.side_quest_id, "a2");

        // Boundary: side-quest selection clears as the walk reaches quest b.
        walk_next(&mut state, now());
        assert_eq!(state.store.selection.selected_quest.as_deref(), Some("b"));
        assert_eq!(state.store.selection.selected_side_quest, None);

        // Clamped at the end of the list.
        walk_next(&mut state, now());
        assert_eq!(state.store.selection.selected_quest.as_deref(), Some("b"));
    }

    #[test]
    fn test_shift_tab_walks_backwards() {
        let mut state = state_with_quests();
        select_quest(&mut state, "b", now());
        walk_prev(&mut state, now());
        let sub = state.store.selection.selected_side_quest.clone().unwrap();
        assert_eq!(sub.side_quest_id, "a2");
    }

    #[test]
    fn test_arrow_right_enters_first_side_quest_and_expands() {
        let mut state = state_with_quests();
        state.store.set_collapsed("a", true);
        select_quest(&mut state, "a", now());
        state.store.set_collapsed("a", true);

        enter_side_quests(&mut state, now());
        let sub = state.store.selection.selected_side_quest.clone().unwrap();
        assert_eq!(sub.side_quest_id, "a1");
        assert!(!state.store.is_collapsed("a"));
    }

    #[test]
    fn test_arrow_right_without_side_quests_is_noop() {
        let mut state = state_with_quests();
        select_quest(&mut state, "b", now());
        enter_side_quests(&mut state, now());
        assert_eq!(state.store.selection.selected_side_quest, None);
    }

    #[test]
    fn test_arrow_left_returns_to_parent() {
        let mut state = state_with_quests();
        select_side_quest(&mut state, "a", "a2", now());
        exit_side_quest(&mut state, now());
        assert_eq!(state.store.selection.selected_quest.as_deref(), Some("a"));
        assert_eq!(state.store.selection.selected_side_quest, None);
    }

    #[test]
    fn test_start_editing_seeds_buffer_and_requests_focus() {
        let mut state = state_with_quests();
        start_editing_side_quest(&mut state, "a", "a1", now());

        let edit = state.store.selection.editing_side_quest.clone().unwrap();
        assert_eq!(edit.buffer, "sub one");
        assert_eq!(state.mode, Mode::EditSideQuest);
        assert!(state.notices.iter().any(|n| matches!(
            n,
            Notice::FocusSideQuestInput { side_quest_id, .. } if side_quest_id == "a1"
        )));
    }

    #[test]
    fn test_save_empty_edit_is_rejected_and_stays_editing() {
        let mut state = state_with_quests();
        start_editing_side_quest(&mut state, "a", "a1", now());
        state.store.selection.editing_side_quest.as_mut().unwrap().buffer = "   ".into();

        let command = save_side_quest_edit(&mut state, now());
        assert_eq!(command, None);
        assert!(state.store.selection.editing_side_quest.is_some());
        assert!(state
            .notices
            .iter()
            .any(|n| *n == Notice::Error("Description cannot be empty".into())));
    }

    #[test]
    fn test_save_trims_and_delegates_to_mutation_engine() {
        let mut state = state_with_quests();
        start_editing_side_quest(&mut state, "a", "a1", now());
        state.store.selection.editing_side_quest.as_mut().unwrap().buffer =
            "  renamed  ".into();

        let command = save_side_quest_edit(&mut state, now());
        assert_eq!(
            command,
            Some(Command::UpdateSideQuest {
                quest_id: "a".into(),
                side_quest_id: "a1".into(),
                patch: SideQuestPatch::description("renamed"),
            })
        );
        assert_eq!(state.store.selection.editing_side_quest, None);
        assert_eq!(state.mode, Mode::Navigate);
    }
}
