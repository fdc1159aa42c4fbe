//! Mirrors the durable part of the session into key-value storage, keyed by
//! continuation code, and restores it.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{RestoreError, StorageError};
use crate::state::{
    Actor, Award, PersonalBest, Production, Review, RoleId, SessionState, TheatreSettings,
    Timestamp,
};
use crate::storage::KeyValueStore;
use crate::timers::{TimerPurpose, TimerRegistry};

pub const SAVE_KEY_PREFIX: &str = "typecast-";
/// Trailing-edge delay between the last change and the write.
pub const DEBOUNCE_MS: i64 = 2_000;
/// Serialized saves longer than this are skipped, not truncated.
pub const MAX_SAVE_CHARS: usize = 50_000;
pub const MAX_SAVED_REVIEWS: usize = 10;
pub const EXPIRY_MS: i64 = 7 * 24 * 60 * 60 * 1_000;

pub fn save_key(code: &str) -> String {
    format!("{SAVE_KEY_PREFIX}{code}")
}

/// Record stored under `typecast-{code}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSession {
    pub code: String,
    pub saved_at: Timestamp,
    pub state: SavedState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedState {
    pub actor: SavedActor,
    #[serde(default)]
    pub production: SavedProduction,
    #[serde(default)]
    pub theatre: TheatreSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SavedActor {
    pub role: Option<RoleId>,
    pub name: Option<String>,
    pub experience: u32,
    pub personal_best: PersonalBest,
    pub reviews: Vec<Review>,
    pub awards: Vec<Award>,
    pub repertoire: Vec<String>,
    pub continuation_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SavedProduction {
    pub current_act: u32,
    pub current_scene: u32,
}

impl Default for SavedProduction {
    fn default() -> Self {
        let production = Production::default();
        Self {
            current_act: production.current_act,
            current_scene: production.current_scene,
        }
    }
}

impl SavedSession {
    pub fn capture(state: &SessionState, code: &str, now: Timestamp) -> Self {
        let actor = &state.actor;
        let skip = actor.reviews.len().saturating_sub(MAX_SAVED_REVIEWS);
        Self {
            code: code.to_string(),
            saved_at: now,
            state: SavedState {
                actor: SavedActor {
                    role: actor.role,
                    name: Some(actor.name.clone()),
                    experience: actor.experience,
                    personal_best: actor.personal_best,
                    reviews: actor.reviews[skip..].to_vec(),
                    awards: actor.awards.clone(),
                    repertoire: actor.repertoire.clone(),
                    continuation_code: actor.continuation_code.clone(),
                },
                production: SavedProduction {
                    current_act: state.production.current_act,
                    current_scene: state.production.current_scene,
                },
                theatre: state.theatre.clone(),
            },
        }
    }

    /// Rebuilds a full session; everything not saved takes its default.
    pub fn into_state(self) -> SessionState {
        let saved = self.state;
        let defaults = Actor::default();
        SessionState {
            production: Production {
                current_act: saved.production.current_act,
                current_scene: saved.production.current_scene,
                curtains_open: false,
                ..Production::default()
            },
            performance: Default::default(),
            actor: Actor {
                name: saved.actor.name.unwrap_or(defaults.name),
                role: saved.actor.role,
                experience: saved.actor.experience,
                awards: saved.actor.awards,
                repertoire: saved.actor.repertoire,
                reviews: saved.actor.reviews,
                continuation_code: saved.actor.continuation_code.or(Some(self.code)),
                backstage_pass: None,
                personal_best: saved.actor.personal_best,
            },
            theatre: saved.theatre,
        }
    }
}

/// The slice of state whose changes schedule a save.
#[derive(Debug, Clone, PartialEq)]
struct Watched {
    role: Option<RoleId>,
    name: String,
    experience: u32,
    personal_best: PersonalBest,
    act: u32,
    scene: u32,
    theatre: TheatreSettings,
    continuation_code: Option<String>,
}

impl Watched {
    fn of(state: &SessionState) -> Self {
        Self {
            role: state.actor.role,
            name: state.actor.name.clone(),
            experience: state.actor.experience,
            personal_best: state.actor.personal_best,
            act: state.production.current_act,
            scene: state.production.current_scene,
            theatre: state.theatre.clone(),
            continuation_code: state.actor.continuation_code.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { chars: usize },
    TooLarge { chars: usize },
    /// The write hit the quota; other saves were evicted and the write was
    /// dropped for this cycle.
    QuotaEvicted { evicted: usize },
    NoCode,
}

/// Debounced snapshotting of [`SessionState`] into storage.
#[derive(Debug, Default)]
pub struct PersistenceBridge {
    last_seen: Option<Watched>,
}

impl PersistenceBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call after every dispatch. Schedules (or pushes back) a save when the
    /// watched slice of state changed and a continuation code exists.
    pub fn observe(&mut self, state: &SessionState, now: Timestamp, timers: &mut TimerRegistry) {
        let watched = Watched::of(state);
        if self.last_seen.as_ref() == Some(&watched) {
            return;
        }
        self.last_seen = Some(watched);
        if state.actor.continuation_code.is_none() {
            return;
        }
        timers.schedule(TimerPurpose::PersistenceDebounce, now + DEBOUNCE_MS, 0);
    }

    /// Writes the snapshot now. Quota exhaustion is recovered here; only
    /// other backend failures are returned as errors.
    pub fn write<S: KeyValueStore + ?Sized>(
        &self,
        storage: &mut S,
        state: &SessionState,
        now: Timestamp,
    ) -> Result<SaveOutcome, StorageError> {
        let Some(code) = state.actor.continuation_code.as_deref() else {
            return Ok(SaveOutcome::NoCode);
        };

        let saved = SavedSession::capture(state, code, now);
        let data = serde_json::to_string(&saved)
            .map_err(|e| StorageError::Backend(format!("failed to serialize save: {e}")))?;

        if data.len() > MAX_SAVE_CHARS {
            warn!(chars = data.len(), limit = MAX_SAVE_CHARS, "save data too large, skipping save");
            return Ok(SaveOutcome::TooLarge { chars: data.len() });
        }

        match storage.set(&save_key(code), &data) {
            Ok(()) => {
                debug!(%code, chars = data.len(), "progress saved");
                Ok(SaveOutcome::Saved { chars: data.len() })
            }
            Err(StorageError::Quota) => {
                warn!("storage quota exceeded, clearing old saves");
                let evicted = evict_other_saves(storage, code)?;
                Ok(SaveOutcome::QuotaEvicted { evicted })
            }
            Err(e) => Err(e),
        }
    }

    /// Writes immediately if a save is pending.
    pub fn flush<S: KeyValueStore + ?Sized>(
        &self,
        storage: &mut S,
        state: &SessionState,
        now: Timestamp,
        timers: &mut TimerRegistry,
    ) -> Result<Option<SaveOutcome>, StorageError> {
        if !timers.cancel(TimerPurpose::PersistenceDebounce) {
            return Ok(None);
        }
        self.write(storage, state, now).map(Some)
    }
}

fn evict_other_saves<S: KeyValueStore + ?Sized>(
    storage: &mut S,
    keep_code: &str,
) -> Result<usize, StorageError> {
    let keep = save_key(keep_code);
    let mut evicted = 0;
    for key in storage.keys()? {
        if key.starts_with(SAVE_KEY_PREFIX) && key != keep {
            storage.remove(&key)?;
            evicted += 1;
        }
    }
    Ok(evicted)
}

/// Removes saves older than [`EXPIRY_MS`]. Records that cannot be read are
/// left alone. Returns how many were removed.
pub fn sweep_expired<S: KeyValueStore + ?Sized>(
    storage: &mut S,
    now: Timestamp,
) -> Result<usize, StorageError> {
    let mut removed = 0;
    for key in storage.keys()? {
        if !key.starts_with(SAVE_KEY_PREFIX) {
            continue;
        }
        let Some(raw) = storage.get(&key)? else {
            continue;
        };
        let saved_at = serde_json::from_str::<serde_json::Value>(&raw)
            .ok()
            .and_then(|v| v.get("savedAt").and_then(|t| t.as_i64()));
        match saved_at {
            Some(saved_at) if now.saturating_sub(saved_at) > EXPIRY_MS => {
                storage.remove(&key)?;
                removed += 1;
            }
            Some(_) => {}
            None => warn!(%key, "unreadable save record, leaving in place"),
        }
    }
    if removed > 0 {
        info!(removed, "expired saves swept");
    }
    Ok(removed)
}

/// Looks up the save for `code`.
pub fn restore<S: KeyValueStore + ?Sized>(
    storage: &S,
    code: &str,
) -> Result<SessionState, RestoreError> {
    let code = code.trim().to_uppercase();
    let raw = match storage.get(&save_key(&code)) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Err(RestoreError::NotFound),
        Err(e) => {
            warn!(error = %e, "failed to read save");
            return Err(RestoreError::NotFound);
        }
    };
    let saved: SavedSession = serde_json::from_str(&raw).map_err(|e| {
        warn!(error = %e, %code, "corrupted save data");
        RestoreError::Corrupt
    })?;
    info!(%code, "progress restored");
    Ok(saved.into_state())
}

/// Builds a fresh continuation code: four letters of the role, the last four
/// digits of the clock, and four random base-36 characters.
pub fn generate_continuation_code<R: Rng + ?Sized>(
    role: Option<RoleId>,
    now: Timestamp,
    rng: &mut R,
) -> String {
    const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let role_part: String = match role {
        Some(role) => role
            .to_string()
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .take(4)
            .collect(),
        None => "GUES".to_string(),
    };
    let time_part = format!("{:04}", now.rem_euclid(10_000));
    let random_part: String = (0..4)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{role_part}-{time_part}-SHOW-{random_part}")
}
