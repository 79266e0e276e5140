//! Game session controller.
//!
//! The phase state machine composing the snapshot store, the content
//! service, the credit ledger, and the event sink. This is the only type
//! other subsystems call into; every external failure is converted here
//! into a recoverable phase or typed error, never an unwound turn loop.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use cradle_core::content::fallback::fallback_question;
use cradle_core::content::model::{GeneratedOutcome, InitialScene, SessionContext};
use cradle_core::content::service::{ContentService, ProgressSink};
use cradle_core::credit::CreditLedger;
use cradle_core::error::{CradleError, Result};
use cradle_core::session::model::{PendingChoice, SessionSnapshot, DEFAULT_ENDING_AGE};
use cradle_core::session::phase::GamePhase;
use cradle_core::session::question::{
    ChoiceInput, Question, QuestionOption, RELOAD_OPTION_ID, RETRY_OPTION_ID,
};
use cradle_core::session::store::SnapshotStore;
use cradle_core::simulator;
use cradle_core::telemetry::{EventSink, GameEvent};
use cradle_interaction::assembler::{ContentKind, StreamAssembler};

use crate::recovery;

/// Credits one custom free-text answer costs.
pub const CUSTOM_ANSWER_COST: u32 = 1;

/// Callback receiving the formatted display text as a stream assembles.
pub type DisplayCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// How `continue_saved_game` resumed the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// Nothing stored; the controller is at the welcome phase.
    NoSave,
    /// A recovery question re-presents an interrupted turn.
    RecoveredPendingTurn,
    /// The stored turn resumed as-is.
    Resumed,
    /// A fresh question was fetched to get the turn loop moving again.
    RefetchedQuestion,
}

/// The credit account premium actions draw from.
#[derive(Debug, Clone)]
struct CreditAccount {
    id: String,
    email: Option<String>,
}

#[derive(Debug, Default)]
struct EngineState {
    phase: GamePhase,
    snapshot: SessionSnapshot,
}

struct StreamingSlot {
    epoch: u64,
    assembler: StreamAssembler,
}

/// The game session controller.
///
/// An explicit state container owned by the caller; collaborators are
/// dependency-injected, nothing is global. Exactly one phase-transition
/// action may run at a time (a second caller gets `ActionInProgress`), and
/// every external call is tagged with a request epoch so stale streaming
/// callbacks cannot overwrite newer state.
pub struct GameController {
    store: Arc<dyn SnapshotStore>,
    content: Arc<dyn ContentService>,
    credit: Option<Arc<dyn CreditLedger>>,
    events: Arc<dyn EventSink>,
    credit_account: Option<CreditAccount>,
    ending_age: u8,
    state: RwLock<EngineState>,
    /// Reentrancy guard: held for the duration of each operation.
    action_gate: Mutex<()>,
    /// Monotonic id for external calls; stale callbacks are discarded.
    epoch: AtomicU64,
    streaming: Arc<StdMutex<Option<StreamingSlot>>>,
}

impl GameController {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        content: Arc<dyn ContentService>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            content,
            credit: None,
            events,
            credit_account: None,
            ending_age: DEFAULT_ENDING_AGE,
            state: RwLock::new(EngineState::default()),
            action_gate: Mutex::new(()),
            epoch: AtomicU64::new(0),
            streaming: Arc::new(StdMutex::new(None)),
        }
    }

    /// Attaches a credit ledger and the account premium actions bill to.
    pub fn with_credit_ledger(
        mut self,
        ledger: Arc<dyn CreditLedger>,
        account_id: impl Into<String>,
        email: Option<String>,
    ) -> Self {
        self.credit = Some(ledger);
        self.credit_account = Some(CreditAccount {
            id: account_id.into(),
            email,
        });
        self
    }

    /// Overrides the child age at which the game ends.
    pub fn with_ending_age(mut self, age: u8) -> Self {
        self.ending_age = age;
        self
    }

    // ========================================================================
    // State inspection
    // ========================================================================

    pub async fn phase(&self) -> GamePhase {
        self.state.read().await.phase
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.read().await.snapshot.clone()
    }

    pub async fn feedback_text(&self) -> String {
        self.state.read().await.snapshot.feedback_text.clone()
    }

    pub async fn current_question(&self) -> Option<Question> {
        self.state.read().await.snapshot.current_question.clone()
    }

    /// The display text of the in-flight stream, if one is running.
    pub fn streaming_text(&self) -> Option<String> {
        let guard = self.streaming.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .as_ref()
            .map(|slot| slot.assembler.display_text().to_string())
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Starts a fresh session.
    ///
    /// Clears prior persisted state, requests (or consumes a preloaded)
    /// initial scenario, seeds the history, and lands in the feedback phase
    /// showing the opening narrative. On failure the controller parks in
    /// `InitializationFailed` with the error recorded; there is no
    /// automatic retry.
    pub async fn initialize_game(
        &self,
        special_requirements: Option<&str>,
        preloaded_scene: Option<InitialScene>,
    ) -> Result<()> {
        let _guard = self.try_begin_action()?;
        self.initialize_game_inner(special_requirements, preloaded_scene, None)
            .await
    }

    /// Streaming variant of [`initialize_game`]: the opening scene renders
    /// progressively through the display callback.
    ///
    /// [`initialize_game`]: Self::initialize_game
    pub async fn initialize_game_streaming(
        &self,
        special_requirements: Option<&str>,
        on_display: DisplayCallback,
    ) -> Result<()> {
        let _guard = self.try_begin_action()?;
        self.initialize_game_inner(special_requirements, None, Some(on_display))
            .await
    }

    async fn initialize_game_inner(
        &self,
        special_requirements: Option<&str>,
        preloaded_scene: Option<InitialScene>,
        on_display: Option<DisplayCallback>,
    ) -> Result<()> {
        self.store.clear().await;
        {
            let mut state = self.state.write().await;
            state.phase = GamePhase::Initializing;
            state.snapshot = SessionSnapshot::default();
        }

        let scene = match preloaded_scene {
            Some(scene) => Ok(scene),
            None => {
                let epoch = self.next_epoch();
                let sink =
                    on_display.map(|cb| self.begin_stream(epoch, ContentKind::Initial, cb));
                let result = self
                    .content
                    .generate_initial_scene(special_requirements, sink)
                    .await;
                self.end_stream(epoch);
                result
            }
        };

        let scene = match scene {
            Ok(scene) => scene,
            Err(e) => {
                tracing::error!(target: "controller", error = %e, "initialization failed");
                let mut state = self.state.write().await;
                state.phase = GamePhase::InitializationFailed;
                state.snapshot.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        {
            let mut state = self.state.write().await;
            let mut snapshot = SessionSnapshot::new(scene.player, scene.child);
            snapshot.player_description = scene.player_description;
            snapshot.child_description = scene.child_description;
            snapshot.finance = scene.finance;
            snapshot.relationship = scene.relationship;
            snapshot.single_parent = scene.single_parent;
            snapshot.feedback_text = scene.narrative;
            state.snapshot = snapshot;
            state.phase = GamePhase::Feedback;
        }
        self.persist().await;
        Ok(())
    }

    /// Fetches the question for the current turn.
    pub async fn load_question(&self) -> Result<Question> {
        let _guard = self.try_begin_action()?;
        self.load_question_inner(None).await
    }

    /// Streaming variant of [`load_question`]: the display callback
    /// receives formatted partial text as the document assembles.
    ///
    /// [`load_question`]: Self::load_question
    pub async fn load_question_streaming(&self, on_display: DisplayCallback) -> Result<Question> {
        let _guard = self.try_begin_action()?;
        self.load_question_inner(Some(on_display)).await
    }

    /// Applies the player's choice and fetches its outcome.
    pub async fn select_option(&self, choice: ChoiceInput) -> Result<()> {
        let _guard = self.try_begin_action()?;
        self.select_option_inner(choice, None).await
    }

    /// Streaming variant of [`select_option`].
    ///
    /// [`select_option`]: Self::select_option
    pub async fn select_option_streaming(
        &self,
        choice: ChoiceInput,
        on_display: DisplayCallback,
    ) -> Result<()> {
        let _guard = self.try_begin_action()?;
        self.select_option_inner(choice, Some(on_display)).await
    }

    /// Moves the story forward after the feedback phase.
    pub async fn continue_game(&self) -> Result<()> {
        let _guard = self.try_begin_action()?;

        let snapshot = self.snapshot().await;
        if !snapshot.is_persistable() {
            return Err(CradleError::internal(
                "continue_game requires an initialized session",
            ));
        }

        // The seed record alone means no real turn has happened yet.
        if snapshot.only_seed_history() {
            self.load_question_inner(None).await?;
            return Ok(());
        }

        if snapshot.child_age() >= self.ending_age || snapshot.ending_flagged {
            return self.generate_ending_inner().await;
        }

        // Advance one year and apply the passive recovery drift.
        let prefetched = {
            let mut state = self.state.write().await;
            let snapshot = &mut state.snapshot;
            if let Some(child) = snapshot.child.as_mut() {
                child.age += 1;
            }
            let new_age = snapshot.child_age();
            snapshot.finance = simulator::passive_recovery(snapshot.finance, new_age);
            snapshot.touch();
            snapshot.prefetched_question.take()
        };

        match prefetched {
            Some(question) => {
                tracing::debug!(target: "controller", "reusing prefetched lookahead question");
                let mut state = self.state.write().await;
                state.snapshot.current_question = Some(question);
                state.phase = GamePhase::Playing;
                drop(state);
                self.persist().await;
                Ok(())
            }
            None => {
                self.load_question_inner(None).await?;
                Ok(())
            }
        }
    }

    /// Resumes a stored session after a reload, applying the recovery
    /// protocol before normal phase logic.
    pub async fn continue_saved_game(&self) -> Result<ResumeOutcome> {
        let _guard = self.try_begin_action()?;

        let Some(snapshot) = self.store.load().await else {
            let mut state = self.state.write().await;
            state.phase = GamePhase::Welcome;
            state.snapshot = SessionSnapshot::default();
            return Ok(ResumeOutcome::NoSave);
        };

        {
            let mut state = self.state.write().await;
            state.snapshot = snapshot;
        }
        self.resume_inner().await
    }

    /// Clears the persisted snapshot and returns to the welcome phase with
    /// all counters zeroed.
    pub async fn reset_to_welcome(&self) -> Result<()> {
        let _guard = self.try_begin_action()?;
        self.store.clear().await;
        let mut state = self.state.write().await;
        state.snapshot = SessionSnapshot::default();
        state.phase = GamePhase::Welcome;
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn try_begin_action(&self) -> Result<tokio::sync::MutexGuard<'_, ()>> {
        self.action_gate
            .try_lock()
            .map_err(|_| CradleError::ActionInProgress)
    }

    /// Next request epoch; anything tagged with an older epoch is stale.
    fn next_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Arms the streaming slot for a new request and builds the progress
    /// sink that feeds it. Callbacks from superseded requests find their
    /// epoch gone and are dropped without touching state.
    fn begin_stream(
        &self,
        epoch: u64,
        kind: ContentKind,
        on_display: DisplayCallback,
    ) -> ProgressSink {
        {
            let mut slot = self.streaming.lock().unwrap_or_else(|e| e.into_inner());
            *slot = Some(StreamingSlot {
                epoch,
                assembler: StreamAssembler::new(kind),
            });
        }

        let streaming = Arc::clone(&self.streaming);
        Arc::new(move |partial: &str| {
            let mut guard = streaming.lock().unwrap_or_else(|e| e.into_inner());
            match guard.as_mut() {
                Some(slot) if slot.epoch == epoch => {
                    let text = slot.assembler.push(partial).to_string();
                    drop(guard);
                    on_display(&text);
                }
                _ => {
                    tracing::debug!(target: "controller", epoch, "discarding stale stream callback");
                }
            }
        })
    }

    /// Tears down the streaming slot if it still belongs to this request.
    fn end_stream(&self, epoch: u64) {
        let mut guard = self.streaming.lock().unwrap_or_else(|e| e.into_inner());
        if guard.as_ref().is_some_and(|slot| slot.epoch == epoch) {
            *guard = None;
        }
    }

    async fn build_context(&self) -> Result<SessionContext> {
        let snapshot = self.snapshot().await;
        let (Some(player), Some(child)) = (snapshot.player.clone(), snapshot.child.clone()) else {
            return Err(CradleError::internal(
                "operation requires a session with a player and child",
            ));
        };
        Ok(SessionContext {
            player,
            child,
            player_description: snapshot.player_description.clone(),
            child_description: snapshot.child_description.clone(),
            finance: snapshot.finance,
            relationship: snapshot.relationship,
            single_parent: snapshot.single_parent,
            history: snapshot.history.records().to_vec(),
        })
    }

    async fn persist(&self) {
        let snapshot = self.snapshot().await;
        self.store.save(&snapshot).await;
    }

    /// The question fetch shared by plain and streaming entry points.
    ///
    /// A content failure never propagates: the real error is logged and
    /// recorded, a synthesized fallback question is substituted, and the
    /// phase still lands in `Playing` so the turn loop cannot wedge.
    async fn load_question_inner(&self, on_display: Option<DisplayCallback>) -> Result<Question> {
        let ctx = self.build_context().await?;
        {
            let mut state = self.state.write().await;
            state.phase = GamePhase::LoadingQuestion;
        }

        let epoch = self.next_epoch();
        let sink = on_display.map(|cb| self.begin_stream(epoch, ContentKind::Question, cb));

        let result = self.content.generate_question(&ctx, sink).await;
        self.end_stream(epoch);

        let (question, error) = match result {
            Ok(question) => (question, None),
            Err(e) => {
                tracing::warn!(target: "controller", error = %e, "question fetch failed; serving fallback");
                self.events.record(GameEvent::FallbackServed {
                    age: ctx.child.age,
                });
                (fallback_question(&ctx.child.name), Some(e.to_string()))
            }
        };

        {
            let mut state = self.state.write().await;
            state.snapshot.current_question = Some(question.clone());
            state.snapshot.last_error = error;
            state.snapshot.touch();
            state.phase = GamePhase::Playing;
        }
        self.persist().await;
        Ok(question)
    }

    async fn select_option_inner(
        &self,
        choice: ChoiceInput,
        on_display: Option<DisplayCallback>,
    ) -> Result<()> {
        let snapshot = self.snapshot().await;
        let question = snapshot
            .current_question
            .clone()
            .ok_or_else(|| CradleError::internal("no active question to answer"))?;

        // Recovery pseudo-options bypass the simulator entirely.
        match &choice {
            ChoiceInput::Option(id) if id == RETRY_OPTION_ID => {
                return self.retry_pending_outcome(on_display).await;
            }
            ChoiceInput::Option(id) if id == RELOAD_OPTION_ID => {
                return self.reload_from_store_inner().await.map(|_| ());
            }
            _ => {}
        }

        let option = self.resolve_choice(&question, choice).await?;

        // Simulator first, then the write-ahead marker, then the call.
        let was_bankrupt = snapshot.bankrupt;
        let age = snapshot.child_age();
        let effect = simulator::apply_choice(
            snapshot.finance,
            snapshot.relationship,
            snapshot.bankrupt,
            age,
            &option,
        );

        let pending = PendingChoice {
            question_id: question.id.clone(),
            option_id: option.id.clone(),
            question_text: question.text.clone(),
            option_text: option.text.clone(),
        };

        {
            let mut state = self.state.write().await;
            let snapshot = &mut state.snapshot;
            snapshot.finance = effect.finance;
            snapshot.relationship = effect.relationship;
            snapshot.bankrupt = effect.bankrupt;
            if option.triggers_ending {
                snapshot.ending_flagged = true;
            }
            snapshot.pending_choice = Some(pending.clone());
            snapshot.touch();
            state.phase = GamePhase::GeneratingOutcome;
        }
        self.persist().await;

        if effect.bankrupt && !was_bankrupt {
            self.events.record(GameEvent::BankruptcyEntered { age });
        }
        self.events.record(GameEvent::ChoiceMade {
            age,
            question_id: question.id.clone(),
            option_id: option.id.clone(),
        });

        self.run_outcome_call(&question, &option.text, on_display)
            .await
    }

    /// Resolves the player's input against the active question, including
    /// the transient custom-text option class.
    async fn resolve_choice(
        &self,
        question: &Question,
        choice: ChoiceInput,
    ) -> Result<QuestionOption> {
        match choice {
            ChoiceInput::Option(id) => question
                .option(&id)
                .cloned()
                .ok_or(CradleError::InvalidSelection(id)),
            ChoiceInput::Custom(text) => {
                self.charge_custom_answer().await?;
                Ok(QuestionOption::neutral(Uuid::new_v4().to_string(), text))
            }
        }
    }

    /// Custom answers are the premium action: the ledger is consulted and
    /// charged before the choice is accepted.
    async fn charge_custom_answer(&self) -> Result<()> {
        let (Some(ledger), Some(account)) = (&self.credit, &self.credit_account) else {
            return Err(CradleError::config(
                "custom answers require a configured credit account",
            ));
        };
        let remaining = ledger
            .consume(&account.id, account.email.as_deref(), CUSTOM_ANSWER_COST)
            .await?;
        tracing::debug!(target: "controller", remaining, "custom answer charged");
        Ok(())
    }

    /// Re-issues the outcome call for the pending choice without touching
    /// the simulator.
    async fn retry_pending_outcome(&self, on_display: Option<DisplayCallback>) -> Result<()> {
        let snapshot = self.snapshot().await;
        let pending = snapshot
            .pending_choice
            .clone()
            .ok_or_else(|| CradleError::InvalidSelection(RETRY_OPTION_ID.to_string()))?;

        let question = Question {
            id: pending.question_id.clone(),
            text: pending.question_text.clone(),
            options: vec![QuestionOption::neutral(
                pending.option_id.clone(),
                pending.option_text.clone(),
            )],
            important_event: false,
        };

        {
            let mut state = self.state.write().await;
            state.phase = GamePhase::GeneratingOutcome;
        }

        self.run_outcome_call(&question, &pending.option_text, on_display)
            .await
    }

    /// The reload pseudo-option: discard in-memory turn state and rebuild
    /// from whatever the store holds, as a restart would.
    async fn reload_from_store_inner(&self) -> Result<ResumeOutcome> {
        if let Some(snapshot) = self.store.load().await {
            let mut state = self.state.write().await;
            state.snapshot = snapshot;
        }
        self.resume_inner().await
    }

    /// Issues the outcome call and folds the result into the session.
    ///
    /// On success the turn record is upserted for the current age, the
    /// pending choice is cleared, and the phase moves to feedback. On
    /// failure the pending choice survives, the error is recorded, and a
    /// recovery question is presented in its place.
    async fn run_outcome_call(
        &self,
        question: &Question,
        choice_text: &str,
        on_display: Option<DisplayCallback>,
    ) -> Result<()> {
        let ctx = self.build_context().await?;
        let epoch = self.next_epoch();
        let sink = on_display.map(|cb| self.begin_stream(epoch, ContentKind::Outcome, cb));

        let result = self
            .content
            .generate_outcome(&ctx, question, choice_text, sink)
            .await;
        self.end_stream(epoch);

        match result {
            Ok(outcome) => {
                self.complete_outcome(question, choice_text, outcome).await;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(target: "controller", error = %e, "outcome call failed; keeping pending choice");
                {
                    let mut state = self.state.write().await;
                    let snapshot = &mut state.snapshot;
                    snapshot.last_error = Some(e.to_string());
                    if let Some(pending) = snapshot.pending_choice.clone() {
                        snapshot.current_question = Some(recovery::recovery_question(&pending));
                    }
                    snapshot.touch();
                    state.phase = GamePhase::Playing;
                }
                self.persist().await;
                Err(e)
            }
        }
    }

    async fn complete_outcome(
        &self,
        question: &Question,
        choice_text: &str,
        outcome: GeneratedOutcome,
    ) {
        {
            let mut state = self.state.write().await;
            let snapshot = &mut state.snapshot;
            let age = snapshot.child_age();
            snapshot.history.upsert(cradle_core::session::TurnRecord {
                age,
                question: question.text.clone(),
                choice: choice_text.to_string(),
                outcome: outcome.text.clone(),
                image_ref: outcome.image_ref.clone(),
            });
            snapshot.feedback_text = outcome.text;
            if outcome.ending {
                snapshot.ending_flagged = true;
            }
            snapshot.prefetched_question = outcome.next_question;
            snapshot.pending_choice = None;
            snapshot.current_question = None;
            snapshot.last_error = None;
            snapshot.touch();
            state.phase = GamePhase::Feedback;
        }
        self.persist().await;
    }

    async fn generate_ending_inner(&self) -> Result<()> {
        let ctx = self.build_context().await?;
        {
            let mut state = self.state.write().await;
            state.phase = GamePhase::EndingGame;
        }

        match self.content.generate_ending(&ctx).await {
            Ok(summary) => {
                {
                    let mut state = self.state.write().await;
                    let snapshot = &mut state.snapshot;
                    snapshot.ending = Some(summary.text.clone());
                    snapshot.feedback_text = summary.text;
                    snapshot.touch();
                    state.phase = GamePhase::Summary;
                }
                self.events.record(GameEvent::GameEnded {
                    age: ctx.child.age,
                });
                self.persist().await;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(target: "controller", error = %e, "ending generation failed");
                {
                    let mut state = self.state.write().await;
                    state.snapshot.last_error = Some(e.to_string());
                    state.phase = GamePhase::Feedback;
                }
                self.persist().await;
                Err(e)
            }
        }
    }

    /// The recovery protocol: classify the stored failure and rebuild a
    /// resumable turn.
    async fn resume_inner(&self) -> Result<ResumeOutcome> {
        let snapshot = self.snapshot().await;

        if snapshot.ending.is_some() {
            let mut state = self.state.write().await;
            state.phase = GamePhase::Summary;
            return Ok(ResumeOutcome::Resumed);
        }

        let transient = snapshot.last_error.as_deref().and_then(recovery::classify);

        if let Some(failure) = transient {
            if let Some(pending) = snapshot.pending_choice.clone() {
                tracing::info!(
                    target: "recovery",
                    ?failure,
                    "re-presenting interrupted turn as recovery question"
                );
                let mut state = self.state.write().await;
                state.snapshot.current_question = Some(recovery::recovery_question(&pending));
                state.phase = GamePhase::Playing;
                return Ok(ResumeOutcome::RecoveredPendingTurn);
            }

            tracing::info!(target: "recovery", ?failure, "re-issuing question fetch after transient failure");
            self.load_question_inner(None).await?;
            return Ok(ResumeOutcome::RefetchedQuestion);
        }

        if snapshot.current_question.is_some() {
            let mut state = self.state.write().await;
            state.phase = GamePhase::Playing;
            return Ok(ResumeOutcome::Resumed);
        }

        if !snapshot.feedback_text.is_empty() {
            let mut state = self.state.write().await;
            state.phase = GamePhase::Feedback;
            return Ok(ResumeOutcome::Resumed);
        }

        // Nothing usable in the snapshot; fetch a fresh question for the
        // current age.
        self.load_question_inner(None).await?;
        Ok(ResumeOutcome::RefetchedQuestion)
    }
}
