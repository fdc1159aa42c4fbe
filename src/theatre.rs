use tracing::{debug, info, trace, warn};

use crate::clock::Clock;
use crate::critics::Critique;
use crate::engine::{CompletionResult, StageEvent, TypingEngine};
use crate::error::{PassError, RestoreError, StorageError};
use crate::keys::Key;
use crate::pass::{BackstagePass, PassSnapshot, Tier};
use crate::persistence::{self, PersistenceBridge, SaveOutcome};
use crate::scripts::{Act, Position};
use crate::state::{
    stars_for, Award, PerformanceMetrics, Review, RoleId, SessionState, SettingsPatch,
};
use crate::storage::KeyValueStore;
use crate::store::{Event, Store};
use crate::timers::{TimerHandle, TimerPurpose, TimerRegistry};

/// How long panic mode keeps the stage directions fully visible.
pub const PANIC_REVERT_MS: i64 = 2_000;
/// How long a review stays up before the next exercise is presented.
pub const REVIEW_DISMISS_MS: i64 = 3_000;
/// Experience granted per completed exercise.
pub const EXERCISE_XP: u32 = 10;

/// Host-supplied hook invoked whenever typing input should be focused.
pub type FocusHook = Box<dyn FnMut()>;

/// Runs one actor through an [`Act`]: feeds keys to the engine, turns engine
/// output into store events, and drives timers, persistence and passes.
pub struct Theatre<S: KeyValueStore, C: Clock> {
    store: Store,
    engine: TypingEngine,
    timers: TimerRegistry,
    persistence: PersistenceBridge,
    storage: S,
    clock: C,
    act: Act,
    position: Position,
    completion_processed: bool,
    critique: Option<Critique>,
    focus: Option<FocusHook>,
}

impl<S: KeyValueStore, C: Clock> Theatre<S, C> {
    pub fn new(storage: S, clock: C, act: Act) -> Self {
        let position = Position::default();
        let engine = TypingEngine::new(act.script(position));
        Self {
            store: Store::default(),
            engine,
            timers: TimerRegistry::new(),
            persistence: PersistenceBridge::new(),
            storage,
            clock,
            act,
            position,
            completion_processed: false,
            critique: None,
            focus: None,
        }
    }

    pub fn with_focus(mut self, focus: impl FnMut() + 'static) -> Self {
        self.focus = Some(Box::new(focus));
        self
    }

    pub fn state(&self) -> &SessionState {
        self.store.state()
    }

    pub fn engine(&self) -> &TypingEngine {
        &self.engine
    }

    pub fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn act(&self) -> &Act {
        &self.act
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// The review of the exercise just finished, until it is dismissed.
    pub fn last_review(&self) -> Option<&Review> {
        self.critique.as_ref().map(|c| &c.review)
    }

    /// The critics' notice for the last review, while it is shown.
    pub fn critique(&self) -> Option<&Critique> {
        self.critique.as_ref()
    }

    pub fn now(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Every state change goes through here so persistence sees it.
    pub fn dispatch(&mut self, event: Event) -> bool {
        let changed = self.store.dispatch(event);
        if changed {
            let now = self.clock.now_ms();
            self.persistence.observe(self.store.state(), now, &mut self.timers);
        }
        changed
    }

    /// Casts the actor. A continuation code is issued the first time.
    pub fn set_role(&mut self, role: RoleId, name: Option<String>) {
        self.dispatch(Event::SetRole { role, name });
        self.ensure_code();
    }

    fn ensure_code(&mut self) {
        if self.state().actor.continuation_code.is_some() {
            return;
        }
        let role = self.state().actor.role;
        let code = persistence::generate_continuation_code(role, self.now(), &mut rand::thread_rng());
        info!(%code, ?role, "continuation code issued");
        self.dispatch(Event::SetContinuationCode(code));
    }

    /// Opens the curtains on the current script and starts the performance.
    pub fn raise_curtain(&mut self) {
        let now = self.now();
        self.dispatch(Event::OpenCurtains);
        self.dispatch(Event::StartPerformance { now });
        self.request_focus();
    }

    pub fn lower_curtain(&mut self) {
        self.dispatch(Event::CloseCurtains);
    }

    /// Feeds one key. Input is ignored while the curtains are closed.
    pub fn on_key(&mut self, key: Key, ctrl: bool) -> Vec<StageEvent> {
        if !self.state().production.curtains_open {
            trace!(?key, "curtains closed, key ignored");
            return Vec::new();
        }
        let now = self.now();
        let events = self.engine.on_key(key, ctrl, now);
        for event in &events {
            match event {
                StageEvent::KeystrokeRecorded { correct, index } => {
                    self.dispatch(Event::RecordKeystroke {
                        correct: *correct,
                        index: *index,
                    });
                }
                StageEvent::TempoUpdated(tempo) => {
                    self.dispatch(Event::UpdateTempo(*tempo));
                }
                StageEvent::PanicTriggered => {
                    self.dispatch(Event::TriggerPanic);
                    self.timers.schedule(
                        TimerPurpose::PanicRevert,
                        now + PANIC_REVERT_MS,
                        self.engine.generation(),
                    );
                }
                StageEvent::Completed(result) => self.complete(result, now),
            }
        }
        events
    }

    /// Scores the finished exercise. Runs at most once per presented script.
    fn complete(&mut self, result: &CompletionResult, now: i64) {
        if self.completion_processed {
            debug!("completion already processed, ignoring");
            return;
        }
        self.completion_processed = true;

        let perf = &self.state().performance;
        let accuracy = perf.cumulative_accuracy();
        let streak = perf.no_look_streak;
        let stars = stars_for(accuracy);

        let (scene_name, exercise_title) = match (
            self.act.scene(self.position),
            self.act.exercise(self.position),
        ) {
            (Some(scene), Some(exercise)) => (scene.name.clone(), exercise.title.clone()),
            _ => (self.act.title.clone(), String::new()),
        };
        let review = Review {
            scene: scene_name,
            exercise: exercise_title,
            tempo: result.tempo,
            accuracy,
            stars,
            timestamp: now,
        };
        info!(
            tempo = result.tempo,
            accuracy,
            stars,
            mistakes = result.mistakes,
            "exercise complete"
        );

        self.dispatch(Event::AddReview(review.clone()));
        if let Some(scene_id) = self.act.repertoire_id(self.position) {
            self.dispatch(Event::CompleteScene { scene_id, xp: EXERCISE_XP });
        }
        self.dispatch(Event::UpdatePersonalBest(PerformanceMetrics {
            tempo: result.tempo,
            accuracy,
            streak,
        }));
        self.dispatch(Event::EndPerformance);

        self.critique = Some(Critique::write(review, streak, &mut rand::thread_rng()));
        self.timers.schedule(
            TimerPurpose::ReviewDismiss,
            now + REVIEW_DISMISS_MS,
            self.engine.generation(),
        );
    }

    /// Fires every timer that is due.
    pub fn tick(&mut self) {
        let now = self.now();
        for handle in self.timers.take_due(now) {
            self.fire(handle, now);
        }
    }

    fn fire(&mut self, handle: TimerHandle, now: i64) {
        match handle.purpose {
            TimerPurpose::PersistenceDebounce => self.save(now),
            purpose if handle.owner != self.engine.generation() => {
                trace!(?purpose, owner = handle.owner, "stale timer dropped");
            }
            TimerPurpose::PanicRevert => {
                self.dispatch(Event::EndPanic);
            }
            TimerPurpose::ReviewDismiss => {
                self.critique = None;
                self.advance();
            }
        }
    }

    fn save(&mut self, now: i64) {
        match self.persistence.write(&mut self.storage, self.store.state(), now) {
            Ok(SaveOutcome::Saved { .. }) | Ok(SaveOutcome::NoCode) => {}
            Ok(outcome) => debug!(?outcome, "save not stored"),
            Err(e) => warn!(error = %e, "failed to save progress"),
        }
    }

    /// Writes any pending save now.
    pub fn flush(&mut self) -> Result<Option<SaveOutcome>, StorageError> {
        let now = self.now();
        self.persistence
            .flush(&mut self.storage, self.store.state(), now, &mut self.timers)
    }

    /// Drops expired saves from storage.
    pub fn sweep(&mut self) -> usize {
        let now = self.now();
        persistence::sweep_expired(&mut self.storage, now).unwrap_or_else(|e| {
            warn!(error = %e, "failed to sweep expired saves");
            0
        })
    }

    /// Starts the current script over.
    pub fn retry(&mut self) {
        self.clear_stage();
        self.engine.retry();
        self.lower_curtain();
        self.dispatch(Event::ResetPerformance);
        self.raise_curtain();
    }

    /// Moves on to the next exercise. At the end of the act the actor earns
    /// the act award and the last exercise is presented again.
    pub fn advance(&mut self) {
        match self.act.next(self.position) {
            Some(next) => self.go_to(next),
            None => {
                self.dispatch(Event::EarnAward(Award::act_complete()));
                self.go_to(self.position);
            }
        }
    }

    pub fn previous(&mut self) -> bool {
        match self.act.previous(self.position) {
            Some(prev) => {
                self.go_to(prev);
                true
            }
            None => false,
        }
    }

    /// Jumps to a scene and exercise. Out-of-range positions are ignored.
    pub fn navigate(&mut self, scene: usize, exercise: usize) -> bool {
        let pos = Position::new(scene, exercise);
        if !self.act.is_valid(pos) {
            debug!(scene, exercise, "navigation out of range");
            return false;
        }
        self.go_to(pos);
        true
    }

    fn go_to(&mut self, pos: Position) {
        self.lower_curtain();
        self.present(pos);
        self.dispatch(Event::ResetPerformance);
        self.raise_curtain();
    }

    /// Loads the script at `pos` without touching the curtains.
    fn present(&mut self, pos: Position) {
        self.clear_stage();
        self.position = pos;
        self.engine.load(self.act.script(pos));
        self.dispatch(Event::NavigateToScene {
            act: self.act.act,
            scene: pos.scene as u32,
        });
    }

    fn clear_stage(&mut self) {
        self.timers.cancel(TimerPurpose::PanicRevert);
        self.timers.cancel(TimerPurpose::ReviewDismiss);
        self.completion_processed = false;
        self.critique = None;
    }

    /// Where restored progress picks up: the exercise after the most recent
    /// one in the repertoire that belongs to this act, else the first
    /// exercise of the saved scene.
    fn pickup_position(&self) -> Position {
        let state = self.state();
        let latest = state
            .actor
            .repertoire
            .iter()
            .rev()
            .find_map(|id| self.act.position_of(id));
        match latest {
            Some(pos) => self.act.next(pos).unwrap_or(pos),
            None => {
                let scene = (state.production.current_scene as usize)
                    .min(self.act.scenes.len().saturating_sub(1));
                Position::new(scene, 0)
            }
        }
    }

    /// Toggles pause and returns the new paused state.
    pub fn toggle_pause(&mut self) -> bool {
        let paused = !self.engine.is_paused();
        self.engine.set_paused(paused);
        if !paused {
            self.request_focus();
        }
        paused
    }

    pub fn toggle_sound(&mut self) {
        self.dispatch(Event::ToggleSound);
    }

    pub fn update_settings(&mut self, patch: SettingsPatch) {
        self.dispatch(Event::UpdateTheatreSettings(patch));
    }

    /// Loads the session saved under `code`. The curtains stay closed until
    /// [`Theatre::raise_curtain`].
    pub fn resume(&mut self, code: &str) -> Result<(), RestoreError> {
        let restored = persistence::restore(&self.storage, code)?;
        self.dispatch(Event::LoadFromCode(Box::new(restored)));
        self.present(self.pickup_position());
        Ok(())
    }

    /// Issues a backstage pass for the current progress.
    pub fn issue_pass(&mut self) -> Result<String, StorageError> {
        let now = self.now();
        let snapshot = PassSnapshot::from_state(self.state(), now);
        let tier = Tier::from_level(self.state().actor.experience);
        let pass = BackstagePass::new(&mut self.storage).generate(&snapshot, tier)?;
        self.dispatch(Event::SaveBackstagePass(pass.clone()));
        Ok(pass)
    }

    /// Redeems a pass and takes over the progress it carries. The curtains
    /// close on the exercise the pass picks up at.
    pub fn redeem_pass(&mut self, code: &str) -> Result<PassSnapshot, PassError> {
        let snapshot = BackstagePass::new(&mut self.storage).parse(code)?;
        self.dispatch(Event::LoadBackstagePass(Box::new(snapshot.clone())));
        self.ensure_code();
        self.lower_curtain();
        self.dispatch(Event::ResetPerformance);
        self.present(self.pickup_position());
        info!(role = ?snapshot.role, shows = snapshot.show_count, "backstage pass redeemed");
        Ok(snapshot)
    }

    fn request_focus(&mut self) {
        if let Some(focus) = self.focus.as_mut() {
            focus();
        }
    }
}
