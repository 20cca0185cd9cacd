//! End-to-end engine flows against a scripted task service and a simulated
//! clock. Every test builds a fresh engine, drives it the way a host would
//! (load, key events, dispatched commands, ticks), and asserts on the public
//! read surface only.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio::sync::oneshot;

use questlog::{
    Engine, EngineConfig, Notice, Pulse, Quest, QuestDraft, QuestPatch, QuestReply, ServiceError,
    SideQuest, Status, TaskService, XpPayload,
};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Service double that answers calls from a pre-scripted queue of replies.
/// An unscripted call fails the test via a transport error the assertions
/// will catch.
#[derive(Default)]
struct ScriptedService {
    replies: Mutex<VecDeque<Result<QuestReply, ServiceError>>>,
    deletes: Mutex<VecDeque<Result<bool, ServiceError>>>,
    calls: Mutex<Vec<&'static str>>,
}

impl ScriptedService {
    fn reply(self, reply: Result<QuestReply, ServiceError>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    fn delete_reply(self, reply: Result<bool, ServiceError>) -> Self {
        self.deletes.lock().unwrap().push_back(reply);
        self
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn next(&self, verb: &'static str) -> Result<QuestReply, ServiceError> {
        self.calls.lock().unwrap().push(verb);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::Transport(format!("unscripted call: {verb}"))))
    }
}

#[async_trait]
impl TaskService for ScriptedService {
    async fn create_quest(&self, _draft: QuestDraft) -> Result<QuestReply, ServiceError> {
        self.next("create_quest")
    }

    async fn delete_quest(&self, _id: String) -> Result<bool, ServiceError> {
        self.calls.lock().unwrap().push("delete_quest");
        self.deletes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::Transport("unscripted delete".into())))
    }

    async fn update_quest(
        &self,
        _id: String,
        _patch: QuestPatch,
    ) -> Result<QuestReply, ServiceError> {
        self.next("update_quest")
    }

    async fn create_side_quest(
        &self,
        _quest_id: String,
        _description: String,
    ) -> Result<QuestReply, ServiceError> {
        self.next("create_side_quest")
    }

    async fn update_side_quest(
        &self,
        _quest_id: String,
        _side_quest_id: String,
        _patch: questlog::SideQuestPatch,
    ) -> Result<QuestReply, ServiceError> {
        self.next("update_side_quest")
    }

    async fn delete_side_quest(
        &self,
        _quest_id: String,
        _side_quest_id: String,
    ) -> Result<QuestReply, ServiceError> {
        self.next("delete_side_quest")
    }

    async fn set_quest_status(
        &self,
        _quest_id: String,
        _status: Status,
        _note: Option<String>,
    ) -> Result<QuestReply, ServiceError> {
        self.next("set_quest_status")
    }

    async fn set_side_quest_status(
        &self,
        _quest_id: String,
        _side_quest_id: String,
        _status: Status,
        _note: Option<String>,
    ) -> Result<QuestReply, ServiceError> {
        self.next("set_side_quest_status")
    }
}

/// Service double that parks one call on a oneshot gate so the test can
/// observe (and mutate) engine state while the call is in flight.
struct GatedService {
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    reply: Mutex<Option<Result<QuestReply, ServiceError>>>,
}

impl GatedService {
    fn new(reply: Result<QuestReply, ServiceError>) -> (Arc<Self>, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        let service = Arc::new(GatedService {
            gate: Mutex::new(Some(rx)),
            reply: Mutex::new(Some(reply)),
        });
        (service, tx)
    }

    async fn gated_reply(&self) -> Result<QuestReply, ServiceError> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.reply
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(ServiceError::Transport("reply already taken".into())))
    }
}

#[async_trait]
impl TaskService for GatedService {
    async fn create_quest(&self, _draft: QuestDraft) -> Result<QuestReply, ServiceError> {
        self.gated_reply().await
    }

    async fn delete_quest(&self, _id: String) -> Result<bool, ServiceError> {
        Ok(true)
    }

    async fn update_quest(
        &self,
        _id: String,
        _patch: QuestPatch,
    ) -> Result<QuestReply, ServiceError> {
        self.gated_reply().await
    }

    async fn create_side_quest(
        &self,
        _quest_id: String,
        _description: String,
    ) -> Result<QuestReply, ServiceError> {
        self.gated_reply().await
    }

    async fn update_side_quest(
        &self,
        _quest_id: String,
        _side_quest_id: String,
        _patch: questlog::SideQuestPatch,
    ) -> Result<QuestReply, ServiceError> {
        self.gated_reply().await
    }

    async fn delete_side_quest(
        &self,
        _quest_id: String,
        _side_quest_id: String,
    ) -> Result<QuestReply, ServiceError> {
        self.gated_reply().await
    }

    async fn set_quest_status(
        &self,
        _quest_id: String,
        _status: Status,
        _note: Option<String>,
    ) -> Result<QuestReply, ServiceError> {
        self.gated_reply().await
    }

    async fn set_side_quest_status(
        &self,
        _quest_id: String,
        _side_quest_id: String,
        _status: Status,
        _note: Option<String>,
    ) -> Result<QuestReply, ServiceError> {
        self.gated_reply().await
    }
}

/// Hand-cranked clock for deterministic timer tests
#[derive(Clone)]
struct TestClock {
    start: Instant,
    offset: Rc<Cell<Duration>>,
}

impl TestClock {
    fn new() -> Self {
        TestClock {
            start: Instant::now(),
            offset: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    fn advance_ms(&self, millis: u64) {
        self.offset
            .set(self.offset.get() + Duration::from_millis(millis));
    }
}

fn engine_with(service: Arc<dyn TaskService>) -> (Engine, TestClock) {
    let clock = TestClock::new();
    let handle = clock.clone();
    let engine = Engine::with_clock(EngineConfig::default(), service, move || {
        handle.start + handle.offset.get()
    });
    (engine, clock)
}

fn quest(id: &str, description: &str) -> Quest {
    Quest::new(id, description)
}

fn quest_with_sides(id: &str, description: &str, sides: &[(&str, &str)]) -> Quest {
    let mut quest = Quest::new(id, description);
    for (sub_id, text) in sides {
        quest.side_quests.push(SideQuest::new(*sub_id, *text));
    }
    quest
}

fn ok_reply(quest: Quest) -> Result<QuestReply, ServiceError> {
    Ok(QuestReply::new(quest))
}

fn transport_err() -> Result<QuestReply, ServiceError> {
    Err(ServiceError::Transport("connection reset".into()))
}

fn error_notices(engine: &Engine) -> Vec<String> {
    engine
        .drain_notices()
        .into_iter()
        .filter_map(|n| match n {
            Notice::Error(text) => Some(text),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_refresh_preserves_user_reorder() {
    let service = Arc::new(ScriptedService::default());
    let (engine, _clock) = engine_with(service);

    engine.load_quests(vec![quest("a", "First"), quest("b", "Second"), quest("c", "Third")]);
    engine.set_quest_order(&["c".into(), "a".into(), "b".into()]);

    // Server still has the old order, plus a new quest and an edit to "a".
    engine.apply_refresh(vec![
        quest("a", "First (edited)"),
        quest("b", "Second"),
        quest("c", "Third"),
        quest("d", "Fourth"),
    ]);

    let quests = engine.quests();
    let ids: Vec<&str> = quests.iter().map(|q| q.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "a", "b", "d"]);
    assert_eq!(engine.quest("a").unwrap().description, "First (edited)");
}

#[tokio::test]
async fn test_refresh_reconciles_side_quests_per_quest() {
    let service = Arc::new(ScriptedService::default());
    let (engine, _clock) = engine_with(service);

    engine.load_quests(vec![quest_with_sides(
        "a",
        "First",
        &[("s1", "one"), ("s2", "two")],
    )]);
    // User reordered the side-quests locally.
    engine.apply_refresh(vec![quest_with_sides(
        "a",
        "First",
        &[("s2", "two"), ("s1", "one")],
    )]);
    let before = engine.quest("a").unwrap();
    assert_eq!(before.side_quests[0].id, "s1");

    // A refresh that drops one and adds one.
    engine.apply_refresh(vec![quest_with_sides(
        "a",
        "First",
        &[("s2", "two"), ("s3", "three")],
    )]);
    let after = engine.quest("a").unwrap();
    let ids: Vec<&str> = after.side_quests.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["s2", "s3"]);
}

#[tokio::test]
async fn test_selection_self_heals_when_refresh_drops_entities() {
    let service = Arc::new(ScriptedService::default());
    let (engine, _clock) = engine_with(service);

    engine.load_quests(vec![
        quest_with_sides("a", "First", &[("s1", "one")]),
        quest("b", "Second"),
    ]);
    engine.select_quest("b");
    engine.apply_refresh(vec![quest_with_sides("a", "First", &[("s1", "one")])]);
    assert_eq!(engine.selection().selected_quest, None);

    engine.select_side_quest("a", "s1");
    engine.apply_refresh(vec![quest("a", "First")]);
    let selection = engine.selection();
    assert_eq!(selection.selected_quest.as_deref(), Some("a"));
    assert_eq!(selection.selected_side_quest, None);
}

// ---------------------------------------------------------------------------
// Optimistic side-quest creation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_side_quest_round_trip_adopts_server_record() {
    let side = quest_with_sides("7", "Slay the dragon", &[("srv-1", "Chase the bug")]);
    let service = Arc::new(ScriptedService::default().reply(ok_reply(side)));
    let (engine, clock) = engine_with(service);
    engine.load_quests(vec![quest("7", "Slay the dragon")]);

    let fires = Rc::new(Cell::new(0u32));
    let counter = fires.clone();
    engine.set_on_layout_refresh(move || counter.set(counter.get() + 1));

    engine.create_side_quest("7", "  Chase the bug  ").await;

    let quest = engine.quest("7").unwrap();
    assert_eq!(quest.side_quests.len(), 1);
    assert_eq!(quest.side_quests[0].id, "srv-1");
    assert!(!quest.side_quests[0].optimistic);
    assert!(!engine.is_loading("7"));
    assert_eq!(error_notices(&engine), Vec::<String>::new());

    // Refresh requests from load, optimistic apply, and adoption all debounce
    // into a single fire.
    clock.advance_ms(16);
    engine.tick();
    assert_eq!(fires.get(), 1);
}

#[tokio::test]
async fn test_optimistic_record_visible_while_call_in_flight() {
    let resolved = quest_with_sides("7", "Slay the dragon", &[("srv-1", "Chase the bug")]);
    let (service, release) = GatedService::new(ok_reply(resolved));
    let (engine, _clock) = engine_with(service);
    engine.load_quests(vec![quest("7", "Slay the dragon")]);

    tokio::join!(engine.create_side_quest("7", "Chase the bug"), async {
        // The call is parked on the gate: the speculative record is live.
        let quest = engine.quest("7").unwrap();
        assert_eq!(quest.side_quests.len(), 1);
        let sub = &quest.side_quests[0];
        assert!(sub.optimistic);
        assert!(sub.id.starts_with("optimistic-7-"));
        assert_eq!(sub.description, "Chase the bug");
        assert!(engine.is_loading("7"));
        release.send(()).unwrap();
    });

    let quest = engine.quest("7").unwrap();
    assert_eq!(quest.side_quests.len(), 1);
    assert_eq!(quest.side_quests[0].id, "srv-1");
    assert!(!engine.is_loading("7"));
}

#[tokio::test]
async fn test_create_side_quest_failure_restores_exact_shape() {
    let service = Arc::new(ScriptedService::default().reply(transport_err()));
    let (engine, _clock) = engine_with(service);
    engine.load_quests(vec![quest_with_sides(
        "7",
        "Slay the dragon",
        &[("s1", "one"), ("s2", "two")],
    )]);
    let before = engine.quest("7").unwrap();

    engine.create_side_quest("7", "doomed").await;

    assert_eq!(engine.quest("7").unwrap(), before);
    assert!(!engine.is_loading("7"));
    assert_eq!(error_notices(&engine), vec!["Failed to add side quest"]);
}

#[tokio::test]
async fn test_blank_side_quest_description_never_reaches_the_service() {
    let service = Arc::new(ScriptedService::default());
    let (engine, _clock) = engine_with(service.clone());
    engine.load_quests(vec![quest("7", "Slay the dragon")]);

    engine.create_side_quest("7", "   ").await;

    assert!(engine.quest("7").unwrap().side_quests.is_empty());
    assert_eq!(service.calls(), Vec::<&str>::new());
}

#[tokio::test]
async fn test_resolution_applies_against_current_state_not_a_stale_copy() {
    let resolved = quest_with_sides("7", "Slay the dragon", &[("srv-1", "Chase the bug")]);
    let (service, release) = GatedService::new(ok_reply(resolved));
    let (engine, _clock) = engine_with(service);
    engine.load_quests(vec![quest("7", "Slay the dragon")]);

    tokio::join!(engine.create_side_quest("7", "Chase the bug"), async {
        // While the call is in flight a refresh removes the quest entirely.
        engine.apply_refresh(vec![]);
        release.send(()).unwrap();
    });

    // The reply must not resurrect the removed quest.
    assert_eq!(engine.quests(), Vec::<Quest>::new());
}

// ---------------------------------------------------------------------------
// Quest creation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_created_quest_lands_at_front_with_spawn_flags() {
    let service = Arc::new(ScriptedService::default().reply(ok_reply(quest("n1", "New quest"))));
    let (engine, clock) = engine_with(service);
    engine.load_quests(vec![quest("a", "Existing")]);

    engine.create_quest(QuestDraft::new("New quest")).await;

    let quests = engine.quests();
    let ids: Vec<&str> = quests.iter().map(|q| q.id.as_str()).collect();
    assert_eq!(ids, vec!["n1", "a"]);
    let flags = engine.animation_flags();
    assert!(flags.spawn.contains("n1"));
    assert_eq!(flags.pulse.get("n1"), Some(&Pulse::Spawn));

    clock.advance_ms(650);
    engine.tick();
    assert!(engine.animation_flags().is_empty());
}

#[tokio::test]
async fn test_failed_create_leaves_list_untouched() {
    let service = Arc::new(ScriptedService::default().reply(transport_err()));
    let (engine, _clock) = engine_with(service);
    engine.load_quests(vec![quest("a", "Existing")]);

    engine.create_quest(QuestDraft::new("doomed")).await;

    assert_eq!(engine.quests().len(), 1);
    assert_eq!(error_notices(&engine), vec!["Failed to create quest"]);
}

#[tokio::test]
async fn test_xp_payload_is_forwarded_uninterpreted() {
    let payload = XpPayload {
        xp_events: serde_json::json!([{ "amount": 25 }]),
        player_rpg: serde_json::json!({ "level": 3 }),
    };
    let reply = QuestReply {
        quest: quest("n1", "New quest"),
        xp: Some(payload.clone()),
    };
    let service = Arc::new(ScriptedService::default().reply(Ok(reply)));
    let (engine, _clock) = engine_with(service);

    engine.create_quest(QuestDraft::new("New quest")).await;

    assert!(engine.drain_notices().contains(&Notice::Xp(payload)));
}

// ---------------------------------------------------------------------------
// Deletion and the undo window
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_delete_snapshots_for_undo_and_expires_silently() {
    let service = Arc::new(ScriptedService::default().delete_reply(Ok(true)));
    let (engine, clock) = engine_with(service);
    engine.load_quests(vec![quest("a", "First"), quest("b", "Second")]);

    engine.delete_quest("a").await;
    assert_eq!(engine.quests().len(), 1);
    assert_eq!(engine.undo_entries().len(), 1);
    assert_eq!(engine.undo_entries()[0].quest.id, "a");

    clock.advance_ms(6999);
    engine.tick();
    assert_eq!(engine.undo_entries().len(), 1);

    clock.advance_ms(2);
    engine.tick();
    assert_eq!(engine.undo_entries().len(), 0);
    // Expiry is silent.
    assert_eq!(error_notices(&engine), Vec::<String>::new());
}

#[tokio::test]
async fn test_failed_delete_reverts_removal_and_dismisses_undo() {
    let service = Arc::new(ScriptedService::default().delete_reply(Ok(false)));
    let (engine, _clock) = engine_with(service);
    engine.load_quests(vec![quest("a", "First"), quest("b", "Second"), quest("c", "Third")]);

    engine.delete_quest("b").await;

    let quests = engine.quests();
    let ids: Vec<&str> = quests.iter().map(|q| q.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(engine.undo_entries().len(), 0);
    assert_eq!(error_notices(&engine), vec!["Failed to delete quest"]);
}

#[tokio::test]
async fn test_restore_from_snapshot_cancels_expiry() {
    let service = Arc::new(ScriptedService::default().delete_reply(Ok(true)));
    let (engine, clock) = engine_with(service);
    engine.load_quests(vec![quest("a", "First"), quest("b", "Second")]);

    engine.delete_quest("a").await;
    let snapshot = engine.undo_entries()[0].quest.clone();
    engine.restore_quest_from_snapshot(snapshot);

    let quests = engine.quests();
    let ids: Vec<&str> = quests.iter().map(|q| q.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(engine.undo_entries().len(), 0);

    // The armed expiry was cancelled; nothing fires later.
    clock.advance_ms(8000);
    engine.tick();
    assert_eq!(engine.quests().len(), 2);
}

#[tokio::test]
async fn test_restore_overwrites_a_recreated_id_in_place() {
    let service = Arc::new(ScriptedService::default());
    let (engine, _clock) = engine_with(service);
    engine.load_quests(vec![quest("a", "Recreated"), quest("b", "Second")]);

    engine.restore_quest_from_snapshot(quest("a", "Original"));

    let quests = engine.quests();
    assert_eq!(quests.len(), 2);
    assert_eq!(quests[0].description, "Original");
}

// ---------------------------------------------------------------------------
// Status transitions and animation lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_done_quest_glows_then_sinks_and_collapses() {
    let mut done = quest("a", "First");
    done.status = Status::Done;
    let service = Arc::new(ScriptedService::default().reply(ok_reply(done)));
    let (engine, clock) = engine_with(service);
    engine.load_quests(vec![quest("a", "First"), quest("b", "Second")]);

    engine.set_quest_status("a", Status::Done, None).await;

    let flags = engine.animation_flags();
    assert_eq!(flags.pulse.get("a"), Some(&Pulse::Full));
    assert!(flags.glow.contains("a"));
    assert!(flags.celebrating.contains("a"));

    // Sink delay elapses first: the quest moves to the bottom, collapsed.
    clock.advance_ms(600);
    engine.tick();
    let quests = engine.quests();
    let ids: Vec<&str> = quests.iter().map(|q| q.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert!(engine.is_collapsed("a"));

    clock.advance_ms(100);
    engine.tick();
    assert_eq!(engine.animation_flags().pulse.get("a"), None);
    assert!(engine.animation_flags().glow.contains("a"));

    clock.advance_ms(700);
    engine.tick();
    assert!(engine.animation_flags().is_empty());
}

#[tokio::test]
async fn test_reopened_quest_does_not_sink() {
    let mut done = quest("a", "First");
    done.status = Status::Done;
    let reopened = quest("a", "First");
    let service = Arc::new(
        ScriptedService::default()
            .reply(ok_reply(done))
            .reply(ok_reply(reopened)),
    );
    let (engine, clock) = engine_with(service);
    engine.load_quests(vec![quest("a", "First"), quest("b", "Second")]);

    engine.set_quest_status("a", Status::Done, None).await;
    engine.set_quest_status("a", Status::InProgress, None).await;

    clock.advance_ms(600);
    engine.tick();
    let quests = engine.quests();
    let ids: Vec<&str> = quests.iter().map(|q| q.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert!(!engine.is_collapsed("a"));
}

#[tokio::test]
async fn test_failed_status_write_reverts_to_previous() {
    let service = Arc::new(ScriptedService::default().reply(transport_err()));
    let (engine, _clock) = engine_with(service);
    engine.load_quests(vec![quest("a", "First")]);

    engine.set_quest_status("a", Status::Done, None).await;

    assert_eq!(engine.quest("a").unwrap().status, Status::Todo);
    assert!(!engine.is_loading("a"));
    assert_eq!(error_notices(&engine), vec!["Failed to update status"]);
}

#[tokio::test]
async fn test_done_side_quest_pulses_full_and_expands_parent() {
    let mut owner = quest_with_sides("7", "Slay the dragon", &[("s1", "one")]);
    owner.side_quests[0].status = Status::Done;
    let service = Arc::new(ScriptedService::default().reply(ok_reply(owner)));
    let (engine, _clock) = engine_with(service);
    engine.load_quests(vec![quest_with_sides("7", "Slay the dragon", &[("s1", "one")])]);
    engine.set_collapsed("7", true);

    engine
        .set_side_quest_status("7", "s1", Status::Done, None)
        .await;

    let flags = engine.animation_flags();
    assert_eq!(flags.pulse.get("7:s1"), Some(&Pulse::Full));
    assert!(!engine.is_collapsed("7"));
    assert_eq!(engine.quest("7").unwrap().side_quests[0].status, Status::Done);
}

#[tokio::test]
async fn test_undone_side_quest_pulses_subtle() {
    let owner = quest_with_sides("7", "Slay the dragon", &[("s1", "one")]);
    let service = Arc::new(ScriptedService::default().reply(ok_reply(owner)));
    let (engine, _clock) = engine_with(service);
    engine.load_quests(vec![quest_with_sides("7", "Slay the dragon", &[("s1", "one")])]);

    engine
        .set_side_quest_status("7", "s1", Status::InProgress, None)
        .await;

    assert_eq!(engine.animation_flags().pulse.get("7:s1"), Some(&Pulse::Subtle));
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_blank_description_patch_is_a_local_noop() {
    let service = Arc::new(ScriptedService::default());
    let (engine, _clock) = engine_with(service.clone());
    engine.load_quests(vec![quest("a", "First")]);

    engine
        .update_quest("a", QuestPatch::description("   "))
        .await;

    assert_eq!(engine.quest("a").unwrap().description, "First");
    assert_eq!(service.calls(), Vec::<&str>::new());
}

#[tokio::test]
async fn test_failed_update_restores_the_snapshot() {
    let service = Arc::new(ScriptedService::default().reply(transport_err()));
    let (engine, _clock) = engine_with(service);
    engine.load_quests(vec![quest("a", "First")]);

    engine
        .update_quest("a", QuestPatch::description("Renamed"))
        .await;

    assert_eq!(engine.quest("a").unwrap().description, "First");
    assert_eq!(error_notices(&engine), vec!["Failed to update quest"]);
}

#[tokio::test]
async fn test_failed_side_quest_delete_reinserts_at_original_position() {
    let service = Arc::new(ScriptedService::default().reply(transport_err()));
    let (engine, _clock) = engine_with(service);
    engine.load_quests(vec![quest_with_sides(
        "7",
        "Slay the dragon",
        &[("s1", "one"), ("s2", "two"), ("s3", "three")],
    )]);

    engine.delete_side_quest("7", "s2").await;

    let owner = engine.quest("7").unwrap();
    let ids: Vec<&str> = owner.side_quests.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["s1", "s2", "s3"]);
    assert_eq!(error_notices(&engine), vec!["Failed to delete side quest"]);
}

// ---------------------------------------------------------------------------
// Refresh debounce
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_burst_of_changes_fires_one_refresh() {
    let service = Arc::new(ScriptedService::default());
    let (engine, clock) = engine_with(service);
    let fires = Rc::new(Cell::new(0u32));
    let counter = fires.clone();
    engine.set_on_layout_refresh(move || counter.set(counter.get() + 1));

    engine.load_quests(vec![quest("a", "First"), quest("b", "Second")]);
    engine.select_quest("a");
    engine.select_quest("b");
    engine.clear_selection();

    clock.advance_ms(15);
    engine.tick();
    assert_eq!(fires.get(), 0);

    clock.advance_ms(1);
    engine.tick();
    assert_eq!(fires.get(), 1);

    // Quiet period: no further fires.
    clock.advance_ms(100);
    engine.tick();
    assert_eq!(fires.get(), 1);
}
