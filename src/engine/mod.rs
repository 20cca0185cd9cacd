//! The orchestration engine.
//!
//! Single-threaded and cooperative: the host feeds it key events, drives
//! `tick` from its frame loop, and dispatches the `Command`s the key handler
//! hands back. The only suspension points are the task service calls inside
//! the mutation engine; everything else mutates the store synchronously
//! through its setters, so the store is always one structurally-valid
//! snapshot between awaits.

pub mod anim;
mod keys;
mod mutate;
pub mod sched;
mod select;
pub mod store;
pub mod undo;

use std::cell::RefCell;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use crossterm::event::KeyEvent;

use crate::config::EngineConfig;
use crate::model::{Quest, QuestPatch, SideQuestPatch, Status};
use crate::reconcile::{self, RefreshTokens};
use crate::service::{QuestDraft, TaskService, XpPayload};

use anim::AnimationFlags;
use sched::{Scheduler, TimerKey};
use store::{QuestStore, SelectionState};
use undo::{UndoEntry, UndoQueue};

/// Current keyboard interaction mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Navigate,
    EditSideQuest,
    ConfirmDelete,
}

/// A deletion awaiting the user's explicit confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    DeleteQuest {
        id: String,
    },
    DeleteSideQuest {
        quest_id: String,
        side_quest_id: String,
    },
}

/// A mutation the key handler wants dispatched. Key handling never awaits;
/// the host passes these to [`Engine::dispatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateQuest(QuestDraft),
    DeleteQuest {
        id: String,
    },
    UpdateQuest {
        id: String,
        patch: QuestPatch,
    },
    CreateSideQuest {
        quest_id: String,
        description: String,
    },
    UpdateSideQuest {
        quest_id: String,
        side_quest_id: String,
        patch: SideQuestPatch,
    },
    DeleteSideQuest {
        quest_id: String,
        side_quest_id: String,
    },
    SetQuestStatus {
        id: String,
        status: Status,
        note: Option<String>,
    },
    SetSideQuestStatus {
        quest_id: String,
        side_quest_id: String,
        status: Status,
        note: Option<String>,
    },
}

/// Outbound event for the host to surface: failure toasts, reward payloads
/// (forwarded uninterpreted), and input focus requests
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Error(String),
    Xp(XpPayload),
    FocusSideQuestInput {
        quest_id: String,
        side_quest_id: String,
    },
}

pub(crate) struct EngineState {
    pub(crate) config: EngineConfig,
    pub(crate) store: QuestStore,
    pub(crate) sched: Scheduler,
    pub(crate) undo: UndoQueue,
    pub(crate) tokens: RefreshTokens,
    pub(crate) notices: Vec<Notice>,
    pub(crate) mode: Mode,
    pub(crate) confirm: Option<ConfirmAction>,
}

impl EngineState {
    fn new(config: EngineConfig) -> Self {
        EngineState {
            config,
            store: QuestStore::new(),
            sched: Scheduler::new(),
            undo: UndoQueue::new(),
            tokens: RefreshTokens::default(),
            notices: Vec::new(),
            mode: Mode::Navigate,
            confirm: None,
        }
    }

    pub(crate) fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    /// Debounce the layout refresh signal: one armed timer, re-armed rather
    /// than stacked, fired on the next tick
    pub(crate) fn request_refresh(&mut self, now: Instant) {
        let deadline = now + self.config.timings.refresh_debounce();
        self.sched.arm(TimerKey::LayoutRefresh, deadline);
    }

    /// Snapshot a deleted quest and arm its expiry; returns the entry id
    pub(crate) fn schedule_undo(&mut self, quest: Quest, now: Instant) -> String {
        let entry = UndoEntry::new(quest, Utc::now().timestamp_millis());
        let entry_id = entry.id.clone();
        self.sched.arm(
            TimerKey::UndoExpiry(entry_id.clone()),
            now + self.config.timings.undo_window(),
        );
        self.undo.push(entry);
        entry_id
    }
}

type RefreshCallback = Box<dyn FnMut()>;

/// The orchestration engine: state store, selection manager, animation flag
/// controller, mutation engine, undo queue, and refresh tokens behind one
/// handle. Construct one per tracker instance (fresh instance per test).
pub struct Engine {
    state: RefCell<EngineState>,
    service: Arc<dyn TaskService>,
    on_refresh: RefCell<Option<RefreshCallback>>,
    clock: Box<dyn Fn() -> Instant>,
}

impl Engine {
    pub fn new(config: EngineConfig, service: Arc<dyn TaskService>) -> Self {
        Engine::with_clock(config, service, Instant::now)
    }

    /// As `new`, with an injected clock (simulated time in tests)
    pub fn with_clock(
        config: EngineConfig,
        service: Arc<dyn TaskService>,
        clock: impl Fn() -> Instant + 'static,
    ) -> Self {
        Engine {
            state: RefCell::new(EngineState::new(config)),
            service,
            on_refresh: RefCell::new(None),
            clock: Box::new(clock),
        }
    }

    fn now(&self) -> Instant {
        (self.clock)()
    }

    pub(crate) fn state(&self) -> std::cell::RefMut<'_, EngineState> {
        self.state.borrow_mut()
    }

    pub(crate) fn service(&self) -> &Arc<dyn TaskService> {
        &self.service
    }

    /// Register the layout refresh signal, invoked at most once per tick
    /// whenever quest list, collapse map, or selection state changed
    pub fn set_on_layout_refresh(&self, callback: impl FnMut() + 'static) {
        *self.on_refresh.borrow_mut() = Some(Box::new(callback));
    }

    // -----------------------------------------------------------------------
    // Host-driven clock
    // -----------------------------------------------------------------------

    /// Drain expired timers and apply their effects. The host calls this
    /// once per frame; every ephemeral flag, the undo window, the delayed
    /// collapse-and-move, and the debounced refresh signal resolve here.
    pub fn tick(&self) {
        let now = self.now();
        let mut fire_refresh = false;
        {
            let mut st = self.state.borrow_mut();
            for key in st.sched.due(now) {
                match key {
                    TimerKey::QuestPulse(id) => {
                        st.store.anim.pulse.shift_remove(&id);
                    }
                    TimerKey::SideQuestPulse(quest_id, side_quest_id) => {
                        st.store
                            .anim
                            .pulse
                            .shift_remove(&anim::side_quest_key(&quest_id, &side_quest_id));
                    }
                    TimerKey::Glow(id) => {
                        st.store.anim.glow.remove(&id);
                    }
                    TimerKey::Celebrate(id) => {
                        st.store.anim.celebrating.remove(&id);
                    }
                    TimerKey::Spawn(id) => {
                        st.store.anim.spawn.remove(&id);
                    }
                    TimerKey::SinkDone(id) => {
                        // Only if the quest is still done: a re-opened quest
                        // stays where it is.
                        if st.store.quest(&id).is_some_and(|q| q.status.is_done()) {
                            let quest_id = id.clone();
                            st.store.update_quests(|quests| {
                                if let Some(index) =
                                    quests.iter().position(|q| q.id == quest_id)
                                {
                                    let quest = quests.remove(index);
                                    quests.push(quest);
                                }
                            });
                            st.store.set_collapsed(&id, true);
                            st.request_refresh(now);
                        }
                    }
                    TimerKey::UndoExpiry(entry_id) => {
                        // Silent permanent loss of the snapshot.
                        st.undo.remove(&entry_id);
                    }
                    TimerKey::LayoutRefresh => fire_refresh = true,
                }
            }
        }
        if fire_refresh {
            // Borrow released above: the callback may call back into us.
            let mut taken = self.on_refresh.borrow_mut().take();
            if let Some(callback) = &mut taken {
                callback();
            }
            let mut slot = self.on_refresh.borrow_mut();
            if slot.is_none() {
                *slot = taken;
            }
        }
    }

    /// Cancel all timers and clear transient state (component teardown)
    pub fn reset(&self) {
        let mut st = self.state.borrow_mut();
        st.sched.clear();
        st.store.reset_transient_state();
        st.store.anim.clear();
        st.store.loading.clear();
        st.undo.clear();
        st.notices.clear();
        st.mode = Mode::Navigate;
        st.confirm = None;
    }

    // -----------------------------------------------------------------------
    // Keyboard surface
    // -----------------------------------------------------------------------

    /// Feed a globally attached key event; returns a mutation for the host
    /// to dispatch, if the key asked for one
    pub fn handle_key(&self, key: KeyEvent, focus_captured: bool) -> Option<Command> {
        let now = self.now();
        keys::handle_key(&mut self.state.borrow_mut(), key, focus_captured, now)
    }

    // -----------------------------------------------------------------------
    // Selection manager
    // -----------------------------------------------------------------------

    pub fn select_quest(&self, id: &str) {
        let now = self.now();
        select::select_quest(&mut self.state.borrow_mut(), id, now);
    }

    pub fn select_side_quest(&self, quest_id: &str, side_quest_id: &str) {
        let now = self.now();
        select::select_side_quest(&mut self.state.borrow_mut(), quest_id, side_quest_id, now);
    }

    pub fn clear_selection(&self) {
        let now = self.now();
        select::clear_selection(&mut self.state.borrow_mut(), now);
    }

    pub fn start_editing_quest(&self, id: &str) {
        let now = self.now();
        select::start_editing_quest(&mut self.state.borrow_mut(), id, now);
    }

    pub fn start_editing_side_quest(&self, quest_id: &str, side_quest_id: &str) {
        let now = self.now();
        select::start_editing_side_quest(&mut self.state.borrow_mut(), quest_id, side_quest_id, now);
    }

    pub fn cancel_side_quest_edit(&self) {
        let now = self.now();
        select::cancel_side_quest_edit(&mut self.state.borrow_mut(), now);
    }

    /// Validate and close the side-quest edit; the returned command carries
    /// the save for the host to dispatch
    pub fn save_side_quest_edit(&self) -> Option<Command> {
        let now = self.now();
        select::save_side_quest_edit(&mut self.state.borrow_mut(), now)
    }

    /// Replace the edit buffer text (host-rendered input field)
    pub fn set_side_quest_edit_buffer(&self, text: &str) {
        if let Some(edit) = &mut self.state.borrow_mut().store.selection.editing_side_quest {
            edit.buffer = text.to_string();
        }
    }

    // -----------------------------------------------------------------------
    // List replacement from outside a drag gesture
    // -----------------------------------------------------------------------

    /// Initial load: adopt the list as-is
    pub fn load_quests(&self, quests: Vec<Quest>) {
        let now = self.now();
        let mut st = self.state.borrow_mut();
        st.store.set_quests(quests);
        st.tokens.bump_quests();
        st.request_refresh(now);
    }

    /// External refresh: reconcile the fetched list against the current
    /// (possibly user-reordered) one so an in-progress drag is not reset.
    /// Runs independently for the top-level list and each side-quest list.
    pub fn apply_refresh(&self, incoming: Vec<Quest>) {
        let now = self.now();
        let mut st = self.state.borrow_mut();
        let previous = st.store.quests().to_vec();
        let mut merged = reconcile::merge(&incoming, &previous);
        for quest in &mut merged {
            if let Some(prev) = previous.iter().find(|p| p.id == quest.id) {
                quest.side_quests = reconcile::merge(&quest.side_quests, &prev.side_quests);
            }
        }
        st.store.set_quests(merged);
        st.tokens.bump_quests();
        st.request_refresh(now);
    }

    /// Host-driven collapse of a quest's side-quest panel. Selection and
    /// side-quest completion force-expand; this is the manual toggle.
    pub fn set_collapsed(&self, quest_id: &str, collapsed: bool) {
        let now = self.now();
        let mut st = self.state.borrow_mut();
        st.store.set_collapsed(quest_id, collapsed);
        st.request_refresh(now);
    }

    /// Persist a user-driven reorder of the top-level list
    pub fn set_quest_order(&self, ordered_ids: &[String]) {
        let now = self.now();
        let mut st = self.state.borrow_mut();
        st.store.update_quests(|quests| {
            quests.sort_by_key(|q| {
                ordered_ids
                    .iter()
                    .position(|id| *id == q.id)
                    .unwrap_or(usize::MAX)
            });
        });
        st.request_refresh(now);
    }

    // -----------------------------------------------------------------------
    // Undo queue
    // -----------------------------------------------------------------------

    /// Snapshot a quest for time-boxed restoration; returns the entry id
    pub fn schedule_quest_undo(&self, quest: Quest) -> String {
        let now = self.now();
        self.state.borrow_mut().schedule_undo(quest, now)
    }

    /// Drop an entry and cancel its expiry (explicit dismissal)
    pub fn dismiss_undo_entry(&self, entry_id: &str) {
        let mut st = self.state.borrow_mut();
        st.undo.remove(entry_id);
        st.sched.cancel(&TimerKey::UndoExpiry(entry_id.to_string()));
    }

    /// Local, best-effort re-insertion of a deleted quest: at the front if
    /// absent, overwriting in place if the id was re-created meanwhile.
    /// Dismisses the matching undo entry. Server-side restoration is the
    /// host's concern.
    pub fn restore_quest_from_snapshot(&self, snapshot: Quest) {
        let now = self.now();
        let mut st = self.state.borrow_mut();
        if let Some(entry) = st.undo.remove_for_quest(&snapshot.id) {
            st.sched.cancel(&TimerKey::UndoExpiry(entry.id));
        }
        let quest_id = snapshot.id.clone();
        st.store.update_quests(move |quests| {
            match quests.iter().position(|q| q.id == snapshot.id) {
                Some(index) => quests[index] = snapshot,
                None => quests.insert(0, snapshot),
            }
        });
        st.tokens.bump_quests();
        st.tokens.bump_side_quests(&quest_id);
        st.request_refresh(now);
    }

    pub fn undo_entries(&self) -> Vec<UndoEntry> {
        self.state.borrow().undo.entries().to_vec()
    }

    // -----------------------------------------------------------------------
    // Read accessors
    // -----------------------------------------------------------------------

    pub fn quests(&self) -> Vec<Quest> {
        self.state.borrow().store.quests().to_vec()
    }

    pub fn quest(&self, id: &str) -> Option<Quest> {
        self.state.borrow().store.quest(id).cloned()
    }

    pub fn selection(&self) -> SelectionState {
        self.state.borrow().store.selection.clone()
    }

    pub fn animation_flags(&self) -> AnimationFlags {
        self.state.borrow().store.anim.clone()
    }

    pub fn is_loading(&self, quest_id: &str) -> bool {
        self.state.borrow().store.loading.contains(quest_id)
    }

    pub fn is_collapsed(&self, quest_id: &str) -> bool {
        self.state.borrow().store.is_collapsed(quest_id)
    }

    pub fn mode(&self) -> Mode {
        self.state.borrow().mode
    }

    pub fn pending_confirm(&self) -> Option<ConfirmAction> {
        self.state.borrow().confirm.clone()
    }

    /// Take all queued outbound notices
    pub fn drain_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut self.state.borrow_mut().notices)
    }

    pub fn quest_refresh_token(&self) -> u64 {
        self.state.borrow().tokens.quests()
    }

    pub fn side_quest_refresh_token(&self, quest_id: &str) -> u64 {
        self.state.borrow().tokens.side_quests(quest_id)
    }
}
