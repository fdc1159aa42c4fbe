use tracing::{debug, trace};

use crate::pass::PassSnapshot;
use crate::session::MAX_TEMPO;
use crate::state::{
    Award, PerformanceMetrics, PersonalBest, Review, RoleId, SessionState, SettingsPatch,
    Timestamp,
};

/// Streak length at which the keyboard guide fades one step.
pub const FADE_STREAK_STEP: u32 = 20;
/// Opacity removed per fade step.
pub const FADE_AMOUNT: f64 = 0.1;
/// Consecutive errors that break a streak.
pub const STREAK_BREAK_ERRORS: u32 = 3;
/// Opacity restored per streak keystroke when panic mode ends.
pub const PANIC_RESTORE_PER_STREAK: f64 = 0.05;
/// Lowest opacity panic mode restores to.
pub const PANIC_RESTORE_FLOOR: f64 = 0.1;

/// Every transition the store understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SetRole { role: RoleId, name: Option<String> },
    OpenCurtains,
    CloseCurtains,
    StartPerformance { now: Timestamp },
    EndPerformance,
    RecordKeystroke { correct: bool, index: usize },
    UpdateTempo(f64),
    UpdateAccuracy(f64),
    SetStageDirectionsOpacity(f64),
    TriggerPanic,
    EndPanic,
    CompleteScene { scene_id: String, xp: u32 },
    EarnAward(Award),
    AddReview(Review),
    UpdatePersonalBest(PerformanceMetrics),
    ResetPerformance,
    SetContinuationCode(String),
    SaveBackstagePass(String),
    ToggleSound,
    UpdateTheatreSettings(SettingsPatch),
    NavigateToScene { act: u32, scene: u32 },
    LoadFromCode(Box<SessionState>),
    LoadBackstagePass(Box<PassSnapshot>),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::SetRole { .. } => "set_role",
            Event::OpenCurtains => "open_curtains",
            Event::CloseCurtains => "close_curtains",
            Event::StartPerformance { .. } => "start_performance",
            Event::EndPerformance => "end_performance",
            Event::RecordKeystroke { .. } => "record_keystroke",
            Event::UpdateTempo(_) => "update_tempo",
            Event::UpdateAccuracy(_) => "update_accuracy",
            Event::SetStageDirectionsOpacity(_) => "set_stage_directions_opacity",
            Event::TriggerPanic => "trigger_panic",
            Event::EndPanic => "end_panic",
            Event::CompleteScene { .. } => "complete_scene",
            Event::EarnAward(_) => "earn_award",
            Event::AddReview(_) => "add_review",
            Event::UpdatePersonalBest(_) => "update_personal_best",
            Event::ResetPerformance => "reset_performance",
            Event::SetContinuationCode(_) => "set_continuation_code",
            Event::SaveBackstagePass(_) => "save_backstage_pass",
            Event::ToggleSound => "toggle_sound",
            Event::UpdateTheatreSettings(_) => "update_theatre_settings",
            Event::NavigateToScene { .. } => "navigate_to_scene",
            Event::LoadFromCode(_) => "load_from_code",
            Event::LoadBackstagePass(_) => "load_backstage_pass",
        }
    }
}

/// Pure transition function. Returns the next state; the input is untouched.
pub fn reduce(state: &SessionState, event: &Event) -> SessionState {
    let mut next = state.clone();

    match event {
        Event::SetRole { role, name } => {
            next.actor.role = Some(*role);
            if let Some(name) = name.as_ref().filter(|n| !n.trim().is_empty()) {
                next.actor.name = name.clone();
            }
        }
        Event::OpenCurtains => next.production.curtains_open = true,
        Event::CloseCurtains => next.production.curtains_open = false,
        Event::StartPerformance { now } => {
            let perf = &mut next.performance;
            perf.started = Some(*now);
            perf.character_count = 0;
            perf.error_count = 0;
            perf.consecutive_errors = 0;
            perf.no_look_streak = 0;
            perf.current_char_index = 0;
        }
        Event::EndPerformance => {
            let perf = &mut next.performance;
            perf.started = None;
            perf.accuracy = perf.cumulative_accuracy();
        }
        Event::RecordKeystroke { correct, index } => record_keystroke(&mut next, *correct, *index),
        Event::UpdateTempo(tempo) => {
            next.performance.tempo = clamp_finite(*tempo, 0.0, MAX_TEMPO);
        }
        Event::UpdateAccuracy(accuracy) => {
            next.performance.accuracy = clamp_finite(*accuracy, 0.0, 100.0);
        }
        Event::SetStageDirectionsOpacity(opacity) => {
            next.performance.stage_directions_opacity = clamp_finite(*opacity, 0.0, 1.0);
        }
        Event::TriggerPanic => {
            let perf = &mut next.performance;
            perf.in_panic_mode = true;
            perf.panic_mode_triggered = true;
            perf.stage_directions_opacity = 1.0;
        }
        Event::EndPanic => {
            let perf = &mut next.performance;
            perf.in_panic_mode = false;
            if perf.panic_mode_triggered {
                perf.stage_directions_opacity = panic_restore_opacity(perf.no_look_streak);
            }
        }
        Event::CompleteScene { scene_id, xp } => {
            next.actor.repertoire.push(scene_id.clone());
            next.actor.experience = next.actor.experience.saturating_add(*xp);
            next.production.current_scene += 1;
        }
        Event::EarnAward(award) => {
            if next.actor.has_award(&award.id) {
                return state.clone();
            }
            next.actor.awards.push(award.clone());
        }
        Event::AddReview(review) => next.actor.reviews.push(review.clone()),
        Event::UpdatePersonalBest(metrics) => {
            let best = &mut next.actor.personal_best;
            best.tempo = best.tempo.max(metrics.tempo);
            best.accuracy = best.accuracy.max(metrics.accuracy);
            best.streak = best.streak.max(metrics.streak);
        }
        Event::ResetPerformance => next.performance = Default::default(),
        Event::SetContinuationCode(code) => next.actor.continuation_code = Some(code.clone()),
        Event::SaveBackstagePass(pass) => next.actor.backstage_pass = Some(pass.clone()),
        Event::ToggleSound => next.theatre.sound_enabled = !next.theatre.sound_enabled,
        Event::UpdateTheatreSettings(patch) => next.theatre = next.theatre.apply(patch),
        Event::NavigateToScene { act, scene } => {
            next.production.current_act = *act;
            next.production.current_scene = *scene;
        }
        Event::LoadFromCode(snapshot) => {
            next = (**snapshot).clone();
            // A restore always requires an explicit re-open.
            next.production.curtains_open = false;
        }
        Event::LoadBackstagePass(pass) => load_backstage_pass(&mut next, pass),
    }

    enforce_invariants(&mut next);
    next
}

fn record_keystroke(next: &mut SessionState, correct: bool, index: usize) {
    let perf = &mut next.performance;
    // Positions are counted once; retyping after a backspace only moves the
    // streak.
    let fresh = index >= perf.character_count as usize;
    if fresh {
        perf.character_count += 1;
    }

    if correct {
        perf.no_look_streak += 1;
        perf.consecutive_errors = 0;
        if perf.no_look_streak % FADE_STREAK_STEP == 0 {
            perf.stage_directions_opacity = (perf.stage_directions_opacity - FADE_AMOUNT).max(0.0);
            trace!(
                streak = perf.no_look_streak,
                opacity = perf.stage_directions_opacity,
                "stage directions fade"
            );
        }
    } else {
        if fresh {
            perf.error_count += 1;
        }
        perf.consecutive_errors += 1;
        if perf.consecutive_errors >= STREAK_BREAK_ERRORS {
            perf.no_look_streak = 0;
        }
    }

    perf.current_char_index = index + 1;
    perf.accuracy = perf.cumulative_accuracy();
}

/// Takes the actor's standing from a redeemed pass. The pass replaces
/// awards, repertoire and personal best; name, experience, reviews and codes
/// are kept.
fn load_backstage_pass(next: &mut SessionState, pass: &PassSnapshot) {
    let actor = &mut next.actor;
    if pass.role.is_some() {
        actor.role = pass.role;
    }
    actor.awards = pass.awards.iter().map(|id| Award::from_id(id)).collect();
    actor.repertoire = pass.repertoire.clone();
    actor.personal_best = PersonalBest {
        tempo: clamp_finite(pass.tempo, 0.0, MAX_TEMPO),
        accuracy: clamp_finite(pass.accuracy, 0.0, 100.0),
        streak: pass.best_run,
    };
    next.production.current_act = pass.act.max(1);
    next.production.current_scene = pass.scene;
}

pub fn panic_restore_opacity(streak: u32) -> f64 {
    (streak as f64 * PANIC_RESTORE_PER_STREAK).clamp(PANIC_RESTORE_FLOOR, 1.0)
}

fn clamp_finite(value: f64, min: f64, max: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        min
    }
}

fn enforce_invariants(state: &mut SessionState) {
    let perf = &mut state.performance;
    debug_assert!(
        perf.error_count <= perf.character_count,
        "error_count {} exceeds character_count {}",
        perf.error_count,
        perf.character_count
    );
    if perf.error_count > perf.character_count {
        perf.error_count = perf.character_count;
    }
    perf.stage_directions_opacity = clamp_finite(perf.stage_directions_opacity, 0.0, 1.0);
    perf.accuracy = clamp_finite(perf.accuracy, 0.0, 100.0);
}

/// Single owner of the [`SessionState`]; every mutation goes through
/// [`Store::dispatch`].
#[derive(Debug, Default)]
pub struct Store {
    state: SessionState,
    revision: u64,
}

impl Store {
    pub fn new(state: SessionState) -> Self {
        Self { state, revision: 0 }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Applies `event`; returns `true` if the state changed.
    pub fn dispatch(&mut self, event: Event) -> bool {
        let next = reduce(&self.state, &event);
        if next == self.state {
            return false;
        }
        debug!(event = event.name(), revision = self.revision + 1, "dispatch");
        self.state = next;
        self.revision += 1;
        true
    }
}
