//! Controller behavior tests against scripted collaborators.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use cradle_application::{GameController, ResumeOutcome};
use cradle_core::content::model::{EndingSummary, GeneratedOutcome, InitialScene, SessionContext};
use cradle_core::content::service::{ContentService, ProgressSink};
use cradle_core::credit::CreditLedger;
use cradle_core::error::{CradleError, Result};
use cradle_core::session::model::{ChildProfile, Level, ParentRole, PendingChoice, PlayerProfile};
use cradle_core::session::question::{ChoiceInput, Question, QuestionOption, RETRY_OPTION_ID};
use cradle_core::session::store::SnapshotStore;
use cradle_core::session::{GamePhase, SessionSnapshot};
use cradle_core::telemetry::NullEventSink;
use cradle_infrastructure::{MemoryCreditLedger, MemorySnapshotStore};

// ============================================================================
// Scripted content service
// ============================================================================

#[derive(Default)]
struct MockContentService {
    initial: Mutex<VecDeque<Result<InitialScene>>>,
    questions: Mutex<VecDeque<Result<Question>>>,
    outcomes: Mutex<VecDeque<Result<GeneratedOutcome>>>,
    endings: Mutex<VecDeque<Result<EndingSummary>>>,
    /// Accumulated-text chunks replayed through the progress sink before a
    /// question resolves.
    question_stream: Mutex<Vec<String>>,
    /// Same, for the initial scene.
    initial_stream: Mutex<Vec<String>>,
    /// Progress sinks captured for the stale-callback test.
    captured_sinks: Mutex<Vec<ProgressSink>>,
    /// When set, question calls park here until notified.
    hold_questions: Mutex<Option<Arc<Notify>>>,
}

impl MockContentService {
    fn push_initial(&self, result: Result<InitialScene>) {
        self.initial.lock().unwrap().push_back(result);
    }

    fn push_question(&self, result: Result<Question>) {
        self.questions.lock().unwrap().push_back(result);
    }

    fn push_outcome(&self, result: Result<GeneratedOutcome>) {
        self.outcomes.lock().unwrap().push_back(result);
    }

    fn push_ending(&self, result: Result<EndingSummary>) {
        self.endings.lock().unwrap().push_back(result);
    }

    fn set_question_stream(&self, chunks: Vec<&str>) {
        *self.question_stream.lock().unwrap() =
            chunks.into_iter().map(|c| c.to_string()).collect();
    }

    fn set_initial_stream(&self, chunks: Vec<&str>) {
        *self.initial_stream.lock().unwrap() =
            chunks.into_iter().map(|c| c.to_string()).collect();
    }

    fn remaining_outcomes(&self) -> usize {
        self.outcomes.lock().unwrap().len()
    }

    fn remaining_questions(&self) -> usize {
        self.questions.lock().unwrap().len()
    }

    fn hold_next_question(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold_questions.lock().unwrap() = Some(notify.clone());
        notify
    }
}

#[async_trait]
impl ContentService for MockContentService {
    async fn generate_initial_scene(
        &self,
        _requirements: Option<&str>,
        progress: Option<ProgressSink>,
    ) -> Result<InitialScene> {
        if let Some(sink) = progress {
            let chunks = std::mem::take(&mut *self.initial_stream.lock().unwrap());
            for chunk in &chunks {
                sink(chunk);
            }
        }
        self.initial
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CradleError::generation("no scripted initial scene")))
    }

    async fn generate_question(
        &self,
        _ctx: &SessionContext,
        progress: Option<ProgressSink>,
    ) -> Result<Question> {
        let hold = self.hold_questions.lock().unwrap().take();
        if let Some(notify) = hold {
            notify.notified().await;
        }

        if let Some(sink) = progress {
            let chunks = std::mem::take(&mut *self.question_stream.lock().unwrap());
            for chunk in &chunks {
                sink(chunk);
            }
            self.captured_sinks.lock().unwrap().push(sink);
        }

        self.questions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CradleError::generation("no scripted question")))
    }

    async fn generate_outcome(
        &self,
        _ctx: &SessionContext,
        _question: &Question,
        _choice_text: &str,
        _progress: Option<ProgressSink>,
    ) -> Result<GeneratedOutcome> {
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CradleError::generation("no scripted outcome")))
    }

    async fn generate_ending(&self, _ctx: &SessionContext) -> Result<EndingSummary> {
        self.endings
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CradleError::generation("no scripted ending")))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn scene() -> InitialScene {
    InitialScene {
        player: PlayerProfile {
            role: ParentRole::Mother,
            gender: "female".to_string(),
            age: 31,
        },
        child: ChildProfile {
            name: "Noa".to_string(),
            gender: "female".to_string(),
            age: 0,
            traits: vec!["curious".to_string()],
        },
        player_description: "A night-shift nurse".to_string(),
        child_description: "A small, loud miracle".to_string(),
        finance: Level::new(5),
        relationship: Level::new(6),
        single_parent: true,
        narrative: "It begins on a rainy Tuesday.".to_string(),
    }
}

fn question(id: &str) -> Question {
    Question {
        id: id.to_string(),
        text: format!("Question {id}?"),
        options: vec![
            QuestionOption {
                id: "opt1".to_string(),
                text: "The expensive route".to_string(),
                finance_delta: -2,
                relationship_delta: 1,
                is_recovery: false,
                triggers_ending: false,
            },
            QuestionOption {
                id: "opt2".to_string(),
                text: "The frugal route".to_string(),
                finance_delta: 0,
                relationship_delta: -1,
                is_recovery: false,
                triggers_ending: false,
            },
        ],
        important_event: false,
    }
}

fn outcome(text: &str) -> GeneratedOutcome {
    GeneratedOutcome {
        text: text.to_string(),
        image_ref: None,
        ending: false,
        next_question: None,
    }
}

struct Harness {
    controller: Arc<GameController>,
    content: Arc<MockContentService>,
    store: Arc<MemorySnapshotStore>,
}

fn harness() -> Harness {
    let content = Arc::new(MockContentService::default());
    let store = Arc::new(MemorySnapshotStore::new());
    let controller = Arc::new(GameController::new(
        store.clone(),
        content.clone(),
        Arc::new(NullEventSink),
    ));
    Harness {
        controller,
        content,
        store,
    }
}

async fn initialized(h: &Harness) {
    h.content.push_initial(Ok(scene()));
    h.controller.initialize_game(None, None).await.unwrap();
}

/// Drives the session into `Playing` at a given child age.
async fn playing_at_age(h: &Harness, age: u8) {
    initialized(h).await;
    // One completed turn per year until the target age.
    for year in 0..=age {
        h.content.push_question(Ok(question(&format!("q{year}"))));
        if year == 0 {
            h.controller.continue_game().await.unwrap();
        } else {
            h.content
                .push_outcome(Ok(outcome(&format!("outcome {}", year - 1))));
            h.controller
                .select_option(ChoiceInput::option("opt2"))
                .await
                .unwrap();
            h.controller.continue_game().await.unwrap();
        }
    }
}

// ============================================================================
// Initialization
// ============================================================================

#[tokio::test]
async fn initialize_seeds_session_and_lands_in_feedback() {
    let h = harness();
    initialized(&h).await;

    let snapshot = h.controller.snapshot().await;
    assert_eq!(h.controller.phase().await, GamePhase::Feedback);
    assert!(snapshot.only_seed_history());
    assert_eq!(snapshot.finance.value(), 5);
    assert_eq!(snapshot.relationship.value(), 6);
    assert!(snapshot.single_parent);
    assert_eq!(snapshot.feedback_text, "It begins on a rainy Tuesday.");
    // Persisted immediately.
    assert!(h.store.load().await.is_some());
}

#[tokio::test]
async fn initialize_accepts_preloaded_scene_without_service_call() {
    let h = harness();
    // No scripted initial scene: a service call would fail.
    h.controller
        .initialize_game(None, Some(scene()))
        .await
        .unwrap();
    assert_eq!(h.controller.phase().await, GamePhase::Feedback);
}

#[tokio::test]
async fn initialize_failure_parks_in_failed_phase() {
    let h = harness();
    h.content
        .push_initial(Err(CradleError::generation_retryable("network down")));

    let err = h.controller.initialize_game(None, None).await.unwrap_err();
    assert!(err.is_generation());
    assert_eq!(h.controller.phase().await, GamePhase::InitializationFailed);
    let snapshot = h.controller.snapshot().await;
    assert!(snapshot.last_error.unwrap().contains("network down"));
}

#[tokio::test]
async fn initialize_clears_previous_save() {
    let h = harness();
    initialized(&h).await;
    assert!(h.store.load().await.is_some());

    h.content
        .push_initial(Err(CradleError::generation("unavailable")));
    let _ = h.controller.initialize_game(None, None).await;
    assert!(h.store.load().await.is_none());
}

// ============================================================================
// Question loading
// ============================================================================

#[tokio::test]
async fn load_question_enters_playing() {
    let h = harness();
    initialized(&h).await;
    h.content.push_question(Ok(question("q0")));

    let q = h.controller.load_question().await.unwrap();
    assert_eq!(q.id, "q0");
    assert_eq!(h.controller.phase().await, GamePhase::Playing);
    assert_eq!(
        h.controller.current_question().await.unwrap().id,
        "q0"
    );
}

#[tokio::test]
async fn load_question_failure_substitutes_fallback() {
    let h = harness();
    initialized(&h).await;
    h.content
        .push_question(Err(CradleError::generation_retryable("connection reset")));

    // The error does not propagate; a playable fallback lands instead.
    let q = h.controller.load_question().await.unwrap();
    assert_eq!(q.options.len(), 2);
    assert!(q.text.contains("Noa"));
    assert_eq!(h.controller.phase().await, GamePhase::Playing);

    let snapshot = h.controller.snapshot().await;
    assert!(snapshot.last_error.unwrap().contains("connection reset"));
}

#[tokio::test]
async fn load_question_without_session_is_an_error() {
    let h = harness();
    let err = h.controller.load_question().await.unwrap_err();
    assert!(matches!(err, CradleError::Internal(_)));
}

// ============================================================================
// Choosing options
// ============================================================================

#[tokio::test]
async fn select_option_runs_simulator_and_records_turn() {
    let h = harness();
    playing_at_age(&h, 8).await;
    h.content.push_outcome(Ok(GeneratedOutcome {
        text: "It cost a lot, but it was worth it.".to_string(),
        image_ref: Some("img-42".to_string()),
        ending: false,
        next_question: Some(question("q-look")),
    }));

    let before = h.controller.snapshot().await;
    h.controller
        .select_option(ChoiceInput::option("opt1"))
        .await
        .unwrap();

    let snapshot = h.controller.snapshot().await;
    assert_eq!(h.controller.phase().await, GamePhase::Feedback);
    // opt1: finance -2 (age 8, no grace), relationship +1.
    assert_eq!(
        snapshot.finance.value(),
        before.finance.value().saturating_sub(2)
    );
    assert_eq!(snapshot.relationship.value(), before.relationship.value() + 1);

    let record = snapshot.history.at_age(8).unwrap();
    assert_eq!(record.choice, "The expensive route");
    assert_eq!(record.outcome, "It cost a lot, but it was worth it.");
    assert_eq!(record.image_ref.as_deref(), Some("img-42"));

    // Success cleared the write-ahead marker and stored the lookahead.
    assert!(snapshot.pending_choice.is_none());
    assert_eq!(snapshot.prefetched_question.unwrap().id, "q-look");
    assert!(snapshot.current_question.is_none());
}

#[tokio::test]
async fn unknown_option_is_rejected_locally() {
    let h = harness();
    playing_at_age(&h, 3).await;

    let before = h.controller.snapshot().await;
    let err = h
        .controller
        .select_option(ChoiceInput::option("opt9"))
        .await
        .unwrap_err();

    assert!(matches!(err, CradleError::InvalidSelection(id) if id == "opt9"));
    // No network call was made and nothing changed.
    assert_eq!(h.content.remaining_outcomes(), 0);
    let after = h.controller.snapshot().await;
    assert_eq!(after.finance, before.finance);
    assert!(after.pending_choice.is_none());
    assert_eq!(h.controller.phase().await, GamePhase::Playing);
}

#[tokio::test]
async fn same_age_answer_replaces_turn_record() {
    let h = harness();
    playing_at_age(&h, 4).await;

    h.content.push_outcome(Ok(outcome("first answer")));
    h.controller
        .select_option(ChoiceInput::option("opt2"))
        .await
        .unwrap();

    // Answer again at the same age (no continue in between).
    h.content.push_question(Ok(question("q4b")));
    h.controller.load_question().await.unwrap();
    h.content.push_outcome(Ok(outcome("second answer")));
    h.controller
        .select_option(ChoiceInput::option("opt2"))
        .await
        .unwrap();

    let snapshot = h.controller.snapshot().await;
    let records: Vec<_> = snapshot
        .history
        .records()
        .iter()
        .filter(|r| r.age == 4)
        .collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, "second answer");
}

#[tokio::test]
async fn outcome_failure_keeps_pending_choice_and_offers_recovery() {
    let h = harness();
    playing_at_age(&h, 6).await;
    h.content
        .push_outcome(Err(CradleError::generation_retryable("request timed out")));

    let err = h
        .controller
        .select_option(ChoiceInput::option("opt1"))
        .await
        .unwrap_err();
    assert!(err.is_generation());

    let snapshot = h.controller.snapshot().await;
    let pending = snapshot.pending_choice.clone().expect("pending survives");
    assert_eq!(pending.option_id, "opt1");

    // A recovery question re-presents the turn.
    let recovery_q = snapshot.current_question.unwrap();
    assert!(recovery_q.option("opt1").is_some());
    assert!(recovery_q.option(RETRY_OPTION_ID).is_some());
    assert_eq!(h.controller.phase().await, GamePhase::Playing);

    // Retry re-issues the outcome call without touching the simulator.
    let finance_after_failure = snapshot.finance;
    h.content.push_outcome(Ok(outcome("made it after all")));
    h.controller
        .select_option(ChoiceInput::option(RETRY_OPTION_ID))
        .await
        .unwrap();

    let snapshot = h.controller.snapshot().await;
    assert!(snapshot.pending_choice.is_none());
    assert_eq!(snapshot.finance, finance_after_failure);
    assert_eq!(snapshot.history.at_age(6).unwrap().outcome, "made it after all");
    assert_eq!(h.controller.phase().await, GamePhase::Feedback);
}

// ============================================================================
// Custom answers and the credit ledger
// ============================================================================

fn harness_with_credits(amount: u32) -> (Harness, Arc<MemoryCreditLedger>) {
    let content = Arc::new(MockContentService::default());
    let store = Arc::new(MemorySnapshotStore::new());
    let ledger = Arc::new(MemoryCreditLedger::new());
    ledger.grant("player-1", amount);
    let controller = Arc::new(
        GameController::new(store.clone(), content.clone(), Arc::new(NullEventSink))
            .with_credit_ledger(ledger.clone(), "player-1", None),
    );
    (
        Harness {
            controller,
            content,
            store,
        },
        ledger,
    )
}

#[tokio::test]
async fn custom_answer_charges_ledger_and_plays_through() {
    let (h, ledger) = harness_with_credits(3);
    playing_at_age(&h, 7).await;
    h.content.push_outcome(Ok(outcome("a very personal touch")));

    h.controller
        .select_option(ChoiceInput::custom("We build a treehouse together"))
        .await
        .unwrap();

    assert_eq!(ledger.fetch_balance("player-1", None).await.unwrap(), 2);
    let snapshot = h.controller.snapshot().await;
    assert_eq!(
        snapshot.history.at_age(7).unwrap().choice,
        "We build a treehouse together"
    );
}

#[tokio::test]
async fn custom_answer_without_credits_is_rejected_before_any_call() {
    let (h, _ledger) = harness_with_credits(0);
    playing_at_age(&h, 7).await;

    let err = h
        .controller
        .select_option(ChoiceInput::custom("free ride"))
        .await
        .unwrap_err();
    assert!(matches!(err, CradleError::InsufficientCredits { .. }));
    assert_eq!(h.content.remaining_outcomes(), 0);
    assert!(h.controller.snapshot().await.pending_choice.is_none());
}

#[tokio::test]
async fn custom_answer_without_ledger_is_a_config_error() {
    let h = harness();
    playing_at_age(&h, 7).await;
    let err = h
        .controller
        .select_option(ChoiceInput::custom("no ledger here"))
        .await
        .unwrap_err();
    assert!(matches!(err, CradleError::Config(_)));
}

// ============================================================================
// Continuing the game
// ============================================================================

#[tokio::test]
async fn continue_with_seed_history_loads_first_question() {
    let h = harness();
    initialized(&h).await;
    h.content.push_question(Ok(question("first")));

    h.controller.continue_game().await.unwrap();
    assert_eq!(h.controller.phase().await, GamePhase::Playing);
    assert_eq!(h.controller.snapshot().await.child_age(), 0);
}

#[tokio::test]
async fn continue_advances_age_and_applies_passive_recovery() {
    let h = harness();
    playing_at_age(&h, 5).await;

    // Drain finance to 2 with two expensive answers at age 5... the grace
    // rule is gone at age 6, so set up the level directly via choices at 5
    // being suppressed; instead answer and manually continue to observe the
    // passive drift.
    h.content.push_outcome(Ok(outcome("done at five")));
    h.controller
        .select_option(ChoiceInput::option("opt1"))
        .await
        .unwrap();
    let before = h.controller.snapshot().await;
    // Age 5 is inside the grace window, so the -2 was suppressed.
    assert_eq!(before.finance.value(), 5);

    h.content.push_question(Ok(question("q6")));
    h.controller.continue_game().await.unwrap();

    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.child_age(), 6);
    // finance 5 < 7 and age advanced past the grace years: +1.
    assert_eq!(snapshot.finance.value(), 6);
}

#[tokio::test]
async fn continue_reuses_prefetched_question_without_a_fetch() {
    let h = harness();
    playing_at_age(&h, 9).await;
    h.content.push_outcome(Ok(GeneratedOutcome {
        text: "done".to_string(),
        image_ref: None,
        ending: false,
        next_question: Some(question("prefetched")),
    }));
    h.controller
        .select_option(ChoiceInput::option("opt2"))
        .await
        .unwrap();

    // No question scripted: a fetch would fail the test.
    h.controller.continue_game().await.unwrap();
    assert_eq!(h.content.remaining_questions(), 0);
    assert_eq!(
        h.controller.current_question().await.unwrap().id,
        "prefetched"
    );
    let snapshot = h.controller.snapshot().await;
    assert!(snapshot.prefetched_question.is_none());
    assert_eq!(snapshot.child_age(), 10);
}

#[tokio::test]
async fn continue_at_ending_age_generates_summary() {
    let h = harness();
    let content = h.content.clone();
    let controller = Arc::new(
        GameController::new(h.store.clone(), content.clone(), Arc::new(NullEventSink))
            .with_ending_age(2),
    );
    let h = Harness {
        controller,
        content,
        store: h.store.clone(),
    };

    playing_at_age(&h, 2).await;
    h.content.push_outcome(Ok(outcome("the last little thing")));
    h.controller
        .select_option(ChoiceInput::option("opt2"))
        .await
        .unwrap();

    h.content.push_ending(Ok(EndingSummary {
        text: "They grew up kind.".to_string(),
    }));
    h.controller.continue_game().await.unwrap();

    assert_eq!(h.controller.phase().await, GamePhase::Summary);
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.ending.as_deref(), Some("They grew up kind."));
}

#[tokio::test]
async fn outcome_ending_flag_forces_summary_regardless_of_age() {
    let h = harness();
    playing_at_age(&h, 3).await;
    h.content.push_outcome(Ok(GeneratedOutcome {
        text: "Everything changed that day.".to_string(),
        image_ref: None,
        ending: true,
        next_question: None,
    }));
    h.controller
        .select_option(ChoiceInput::option("opt2"))
        .await
        .unwrap();

    h.content.push_ending(Ok(EndingSummary {
        text: "A short, bright story.".to_string(),
    }));
    h.controller.continue_game().await.unwrap();
    assert_eq!(h.controller.phase().await, GamePhase::Summary);
}

// ============================================================================
// Saved-game recovery
// ============================================================================

#[tokio::test]
async fn resume_without_save_lands_in_welcome() {
    let h = harness();
    let resumed = h.controller.continue_saved_game().await.unwrap();
    assert_eq!(resumed, ResumeOutcome::NoSave);
    assert_eq!(h.controller.phase().await, GamePhase::Welcome);
}

fn stored_snapshot() -> SessionSnapshot {
    let mut snapshot = SessionSnapshot::new(
        PlayerProfile {
            role: ParentRole::Father,
            gender: "male".to_string(),
            age: 38,
        },
        ChildProfile {
            name: "Ira".to_string(),
            gender: "male".to_string(),
            age: 7,
            traits: Vec::new(),
        },
    );
    snapshot.feedback_text = "Last year went fine.".to_string();
    snapshot
}

#[tokio::test]
async fn resume_with_pending_choice_and_transient_error_recovers_the_turn() {
    let h = harness();
    let mut snapshot = stored_snapshot();
    snapshot.pending_choice = Some(PendingChoice {
        question_id: "q-7".to_string(),
        option_id: "optA".to_string(),
        question_text: "Switch schools?".to_string(),
        option_text: "Yes".to_string(),
    });
    snapshot.last_error = Some("Content generation error: request timed out".to_string());
    h.store.save(&snapshot).await;

    let resumed = h.controller.continue_saved_game().await.unwrap();
    assert_eq!(resumed, ResumeOutcome::RecoveredPendingTurn);
    assert_eq!(h.controller.phase().await, GamePhase::Playing);

    let question = h.controller.current_question().await.unwrap();
    assert_eq!(question.text, "Switch schools?");
    assert!(question.option("optA").is_some());
    assert!(question.option(RETRY_OPTION_ID).is_some());
}

#[tokio::test]
async fn resume_with_transient_error_but_no_pending_refetches() {
    let h = harness();
    let mut snapshot = stored_snapshot();
    snapshot.last_error = Some("network unreachable".to_string());
    h.store.save(&snapshot).await;

    h.content.push_question(Ok(question("refetched")));
    let resumed = h.controller.continue_saved_game().await.unwrap();
    assert_eq!(resumed, ResumeOutcome::RefetchedQuestion);
    assert_eq!(
        h.controller.current_question().await.unwrap().id,
        "refetched"
    );
}

#[tokio::test]
async fn resume_with_stored_question_just_resumes() {
    let h = harness();
    let mut snapshot = stored_snapshot();
    snapshot.current_question = Some(question("stored"));
    h.store.save(&snapshot).await;

    let resumed = h.controller.continue_saved_game().await.unwrap();
    assert_eq!(resumed, ResumeOutcome::Resumed);
    assert_eq!(h.controller.phase().await, GamePhase::Playing);
    assert_eq!(h.controller.current_question().await.unwrap().id, "stored");
}

#[tokio::test]
async fn resume_with_feedback_text_lands_in_feedback() {
    let h = harness();
    h.store.save(&stored_snapshot()).await;

    let resumed = h.controller.continue_saved_game().await.unwrap();
    assert_eq!(resumed, ResumeOutcome::Resumed);
    assert_eq!(h.controller.phase().await, GamePhase::Feedback);
    assert_eq!(h.controller.feedback_text().await, "Last year went fine.");
}

#[tokio::test]
async fn resume_with_unknown_error_ignores_recovery_paths() {
    let h = harness();
    let mut snapshot = stored_snapshot();
    snapshot.last_error = Some("Invalid selection: opt3".to_string());
    h.store.save(&snapshot).await;

    let resumed = h.controller.continue_saved_game().await.unwrap();
    // Non-transient error: fall back to what the snapshot already holds.
    assert_eq!(resumed, ResumeOutcome::Resumed);
    assert_eq!(h.controller.phase().await, GamePhase::Feedback);
}

#[tokio::test]
async fn reset_clears_save_and_counters() {
    let h = harness();
    initialized(&h).await;
    h.controller.reset_to_welcome().await.unwrap();

    assert_eq!(h.controller.phase().await, GamePhase::Welcome);
    assert!(h.store.load().await.is_none());
    let snapshot = h.controller.snapshot().await;
    assert!(snapshot.player.is_none());
    assert!(snapshot.history.is_empty());
}

// ============================================================================
// Concurrency guards
// ============================================================================

#[tokio::test]
async fn second_action_while_one_is_in_flight_is_rejected() {
    let h = harness();
    initialized(&h).await;

    let release = h.content.hold_next_question();
    h.content.push_question(Ok(question("slow")));

    let controller = h.controller.clone();
    let in_flight = tokio::spawn(async move { controller.load_question().await });

    // Give the spawned action time to take the gate.
    tokio::task::yield_now().await;
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let err = h.controller.continue_game().await.unwrap_err();
    assert!(matches!(err, CradleError::ActionInProgress));

    release.notify_one();
    in_flight.await.unwrap().unwrap();
    assert_eq!(h.controller.phase().await, GamePhase::Playing);
}

#[tokio::test]
async fn streaming_progress_reaches_display_callback() {
    let h = harness();
    initialized(&h).await;

    h.content.set_question_stream(vec![
        r#"{"question": "Big move"#,
        r#"{"question": "Big move?", "options": [{"id": "a", "text": "Go"}, {"id": "b", "text": "Stay"}]}"#,
    ]);
    h.content.push_question(Ok(question("streamed")));

    let updates: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_updates = updates.clone();
    h.controller
        .load_question_streaming(Arc::new(move |text: &str| {
            sink_updates.lock().unwrap().push(text.to_string());
        }))
        .await
        .unwrap();

    let updates = updates.lock().unwrap();
    assert_eq!(updates.len(), 2);
    assert!(updates[0].starts_with("Big move"));
    assert!(updates[0].contains('\u{2026}'));
    assert!(updates[1].contains("1. Go"));
    assert!(updates[1].contains("2. Stay"));
}

#[tokio::test]
async fn streaming_initialization_renders_scene_progressively() {
    let h = harness();
    h.content.set_initial_stream(vec![
        r#"{"player": {"role": "mom", "gender": "female", "age": 31}, "playerDescription": "A night-shift nur"#,
    ]);
    h.content.push_initial(Ok(scene()));

    let updates: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_updates = updates.clone();
    h.controller
        .initialize_game_streaming(
            None,
            Arc::new(move |text: &str| {
                sink_updates.lock().unwrap().push(text.to_string());
            }),
        )
        .await
        .unwrap();

    let updates = updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    assert!(updates[0].contains("A night-shift nur\u{2026}"));
    assert_eq!(h.controller.phase().await, GamePhase::Feedback);
}

#[tokio::test]
async fn stale_stream_callbacks_are_discarded() {
    let h = harness();
    initialized(&h).await;

    h.content.set_question_stream(vec![r#"{"question": "old"#]);
    h.content.push_question(Ok(question("q-old")));

    let updates: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_updates = updates.clone();
    h.controller
        .load_question_streaming(Arc::new(move |text: &str| {
            sink_updates.lock().unwrap().push(text.to_string());
        }))
        .await
        .unwrap();

    let count_after_call = updates.lock().unwrap().len();

    // The request finished; its captured sink now represents a stale epoch.
    let stale_sink = h.content.captured_sinks.lock().unwrap().pop().unwrap();
    stale_sink(r#"{"question": "late chunk that must not surface"}"#);

    assert_eq!(updates.lock().unwrap().len(), count_after_call);
    assert!(h.controller.streaming_text().is_none());
}
