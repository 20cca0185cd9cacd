use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::model::{QuestPatch, cycled_level};

use super::select::{
    cancel_side_quest_edit, clear_selection, enter_side_quests, exit_side_quest, move_selection,
    save_side_quest_edit, walk_next, walk_prev,
};
use super::{Command, ConfirmAction, EngineState, Mode};

/// Handle a globally attached key event in the current mode.
///
/// `focus_captured` is the host's opt-out: true while focus sits inside an
/// interactive element (or one carrying a skip marker), in which case the
/// event belongs to that element and the engine ignores it entirely.
pub(crate) fn handle_key(
    state: &mut EngineState,
    key: KeyEvent,
    focus_captured: bool,
    now: Instant,
) -> Option<Command> {
    if focus_captured {
        return None;
    }
    // Ignore bare modifier key presses (Shift, Ctrl, Alt, etc.)
    if matches!(key.code, KeyCode::Modifier(_)) {
        return None;
    }
    match state.mode {
        Mode::Navigate => handle_navigate(state, key, now),
        Mode::EditSideQuest => handle_edit(state, key, now),
        Mode::ConfirmDelete => handle_confirm(state, key),
    }
}

fn handle_navigate(state: &mut EngineState, key: KeyEvent, now: Instant) -> Option<Command> {
    match (key.modifiers, key.code) {
        // Move quest selection, clamped to list bounds
        (KeyModifiers::NONE, KeyCode::Char('j')) | (_, KeyCode::Down) => {
            move_selection(state, 1, now);
            None
        }
        (KeyModifiers::NONE, KeyCode::Char('k')) | (_, KeyCode::Up) => {
            move_selection(state, -1, now);
            None
        }

        // Toggle the selected quest done ↔ in_progress
        (KeyModifiers::NONE, KeyCode::Char(' ')) | (KeyModifiers::NONE, KeyCode::Enter) => {
            toggle_selected_quest(state)
        }

        // Cycle priority: low → medium → high → low
        (KeyModifiers::NONE, KeyCode::Char('c')) => cycle_priority(state),

        // Cycle task level: 1 → … → 5 → 1
        (KeyModifiers::NONE, KeyCode::Char('l')) => cycle_task_level(state),

        (_, KeyCode::Esc) => {
            clear_selection(state, now);
            None
        }

        // Depth-first walk across side-quests, then on to the next quest
        (KeyModifiers::NONE, KeyCode::Tab) => {
            walk_next(state, now);
            None
        }
        (_, KeyCode::BackTab) => {
            walk_prev(state, now);
            None
        }

        (_, KeyCode::Right) => {
            enter_side_quests(state, now);
            None
        }
        (_, KeyCode::Left) => {
            exit_side_quest(state, now);
            None
        }

        // Deletion always goes through an explicit confirmation step
        (_, KeyCode::Delete) | (_, KeyCode::Backspace) => {
            request_delete(state);
            None
        }

        _ => None,
    }
}

fn handle_edit(state: &mut EngineState, key: KeyEvent, now: Instant) -> Option<Command> {
    match (key.modifiers, key.code) {
        (_, KeyCode::Esc) => {
            cancel_side_quest_edit(state, now);
            None
        }
        (KeyModifiers::NONE, KeyCode::Enter) => save_side_quest_edit(state, now),
        (_, KeyCode::Backspace) => {
            if let Some(edit) = &mut state.store.selection.editing_side_quest {
                edit.buffer.pop();
            }
            None
        }
        (KeyModifiers::NONE | KeyModifiers::SHIFT, KeyCode::Char(c)) => {
            if let Some(edit) = &mut state.store.selection.editing_side_quest {
                edit.buffer.push(c);
            }
            None
        }
        _ => None,
    }
}

fn handle_confirm(state: &mut EngineState, key: KeyEvent) -> Option<Command> {
    match (key.modifiers, key.code) {
        // Confirm: y or Enter
        (KeyModifiers::NONE, KeyCode::Char('y')) | (KeyModifiers::NONE, KeyCode::Enter) => {
            let action = state.confirm.take();
            state.mode = Mode::Navigate;
            match action? {
                ConfirmAction::DeleteQuest { id } => Some(Command::DeleteQuest { id }),
                ConfirmAction::DeleteSideQuest {
                    quest_id,
                    side_quest_id,
                } => Some(Command::DeleteSideQuest {
                    quest_id,
                    side_quest_id,
                }),
            }
        }
        // Cancel: n or Esc
        (KeyModifiers::NONE, KeyCode::Char('n')) | (_, KeyCode::Esc) => {
            state.confirm = None;
            state.mode = Mode::Navigate;
            None
        }
        _ => None,
    }
}

fn toggle_selected_quest(state: &mut EngineState) -> Option<Command> {
    let id = state.store.selection.selected_quest.clone()?;
    let status = state.store.quest(&id)?.status.toggled();
    Some(Command::SetQuestStatus {
        id,
        status,
        note: None,
    })
}

fn cycle_priority(state: &mut EngineState) -> Option<Command> {
    let id = state.store.selection.selected_quest.clone()?;
    let priority = state.store.quest(&id)?.priority.cycled();
    Some(Command::UpdateQuest {
        id,
        patch: QuestPatch::priority(priority),
    })
}

fn cycle_task_level(state: &mut EngineState) -> Option<Command> {
    let id = state.store.selection.selected_quest.clone()?;
    let level = cycled_level(state.store.quest(&id)?.task_level);
    Some(Command::UpdateQuest {
        id,
        patch: QuestPatch::task_level(level),
    })
}

/// Queue the selected entity for deletion, pending confirmation
fn request_delete(state: &mut EngineState) {
    let sel = &state.store.selection;
    if let Some(sub) = sel.selected_side_quest.clone() {
        state.confirm = Some(ConfirmAction::DeleteSideQuest {
            quest_id: sub.quest_id,
            side_quest_id: sub.side_quest_id,
        });
        state.mode = Mode::ConfirmDelete;
    } else if let Some(id) = sel.selected_quest.clone() {
        state.confirm = Some(ConfirmAction::DeleteQuest { id });
        state.mode = Mode::ConfirmDelete;
    }
}
