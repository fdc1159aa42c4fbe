//! Backstage passes: short, shareable codes that point at a stored progress
//! snapshot.
//!
//! A pass looks like `STAR-EYJ2-SHOW-IJOI`. The two middle chunks are the
//! first eight characters of the base64 encoded snapshot; they are a
//! fingerprint, not the payload, so the full encoding is kept in a small ring
//! buffer in storage and looked up on redemption.

use std::sync::OnceLock;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PassError, PassFailure, StorageError};
use crate::state::{RoleId, SessionState, Timestamp};
use crate::storage::KeyValueStore;
use crate::util::mean;

pub const VERSION: &str = "1.0.0";
/// Storage key of the ring buffer of full encodings.
pub const RING_KEY: &str = "backstagePasses";
pub const RING_CAPACITY: usize = 10;
const FINGERPRINT_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Understudy,
    Ensemble,
    Star,
    Legend,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Understudy, Tier::Ensemble, Tier::Star, Tier::Legend];

    pub fn from_level(level: u32) -> Self {
        if level >= 75 {
            Tier::Legend
        } else if level >= 50 {
            Tier::Star
        } else if level >= 25 {
            Tier::Ensemble
        } else {
            Tier::Understudy
        }
    }

    /// Named tiers; anything unrecognized is an understudy.
    pub fn from_name(name: &str) -> Self {
        match name {
            "master" => Tier::Legend,
            "advanced" => Tier::Star,
            "intermediate" => Tier::Ensemble,
            _ => Tier::Understudy,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Tier::Understudy => "UNDERSTUDY",
            Tier::Ensemble => "ENSEMBLE",
            Tier::Star => "STAR",
            Tier::Legend => "LEGEND",
        }
    }
}

/// Progress snapshot carried by a pass. Field names match the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassSnapshot {
    pub v: String,
    pub role: Option<RoleId>,
    pub act: u32,
    pub scene: u32,
    pub tempo: f64,
    pub accuracy: f64,
    #[serde(default)]
    pub awards: Vec<String>,
    #[serde(default)]
    pub show_count: u32,
    #[serde(default)]
    pub best_run: u32,
    #[serde(default)]
    pub repertoire: Vec<String>,
    #[serde(default = "default_confidence")]
    pub stage_confidence: f64,
    pub timestamp: Timestamp,
}

fn default_confidence() -> f64 {
    1.0
}

impl PassSnapshot {
    /// Summarises the actor's progress: averages over their reviews, their
    /// best streak, and how far the keyboard guide has faded. Shows are
    /// counted from the repertoire, since saves keep only recent reviews.
    pub fn from_state(state: &SessionState, now: Timestamp) -> Self {
        let actor = &state.actor;
        let tempos: Vec<f64> = actor.reviews.iter().map(|r| r.tempo).collect();
        let accuracies: Vec<f64> = actor.reviews.iter().map(|r| r.accuracy).collect();
        Self {
            v: VERSION.to_string(),
            role: actor.role,
            act: state.production.current_act,
            scene: state.production.current_scene,
            tempo: mean(&tempos).map(f64::round).unwrap_or(0.0),
            accuracy: mean(&accuracies).map(f64::round).unwrap_or(0.0),
            awards: actor.awards.iter().map(|a| a.id.clone()).collect(),
            show_count: actor.repertoire.len() as u32,
            best_run: actor.personal_best.streak,
            repertoire: actor.repertoire.clone(),
            stage_confidence: (1.0 - state.performance.stage_directions_opacity).clamp(0.0, 1.0),
            timestamp: now,
        }
    }
}

fn pass_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(UNDERSTUDY|ENSEMBLE|STAR|LEGEND)-([0-9A-Z]{4})-SHOW-([0-9A-Z]{4})$")
            .expect("pass pattern is valid")
    })
}

/// Continuation codes: `^[A-Z]{4,10}-[0-9A-Z]{4}-SHOW-[0-9A-Z]{4}$`.
pub fn is_continuation_code(code: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^[A-Z]{4,10}-[0-9A-Z]{4}-SHOW-[0-9A-Z]{4}$")
                .expect("continuation pattern is valid")
        })
        .is_match(code)
}

/// Formats the human-readable pass from a full encoding.
pub fn format_pass(tier: Tier, encoded: &str) -> String {
    let head: String = encoded.chars().take(FINGERPRINT_LEN).collect::<String>().to_uppercase();
    let (first, second) = head.split_at(head.len().min(4));
    let second = if second.is_empty() { "0000" } else { second };
    format!("{}-{}-SHOW-{}", tier.prefix(), first, second)
}

/// Encodes, stores and decodes backstage passes against a key-value store.
pub struct BackstagePass<'a, S: KeyValueStore + ?Sized> {
    storage: &'a mut S,
}

impl<'a, S: KeyValueStore + ?Sized> BackstagePass<'a, S> {
    pub fn new(storage: &'a mut S) -> Self {
        Self { storage }
    }

    /// Encodes `snapshot`, records the full encoding in the ring buffer and
    /// returns the human-readable pass.
    pub fn generate(&mut self, snapshot: &PassSnapshot, tier: Tier) -> Result<String, StorageError> {
        let json = serde_json::to_string(snapshot)
            .map_err(|e| StorageError::Backend(format!("failed to serialize pass: {e}")))?;
        let encoded = STANDARD.encode(json);
        self.remember(encoded.clone())?;
        let pass = format_pass(tier, &encoded);
        debug!(%pass, "generated backstage pass");
        Ok(pass)
    }

    /// Redeems a pass. Every failure collapses to [`PassError::Invalid`].
    pub fn parse(&self, code: &str) -> Result<PassSnapshot, PassError> {
        self.lookup(code).map_err(|reason| {
            debug!(?reason, "backstage pass rejected");
            PassError::Invalid
        })
    }

    fn lookup(&self, code: &str) -> Result<PassSnapshot, PassFailure> {
        let code = code.trim().to_uppercase();
        let Some(caps) = pass_pattern().captures(&code) else {
            let known_prefix = Tier::ALL
                .iter()
                .any(|t| code.starts_with(&format!("{}-", t.prefix())));
            return Err(if known_prefix {
                PassFailure::Malformed
            } else {
                PassFailure::UnknownPrefix
            });
        };
        let fingerprint = format!("{}{}", &caps[2], &caps[3]);

        let stored = self.stored().map_err(|_| PassFailure::NotFound)?;
        // Newest first: payloads sharing a fingerprint resolve to the latest.
        let encoded = stored
            .iter()
            .rev()
            .find(|entry| {
                let head: String = entry.chars().take(FINGERPRINT_LEN).collect();
                head.to_uppercase() == fingerprint
            })
            .ok_or(PassFailure::NotFound)?;

        let bytes = STANDARD.decode(encoded).map_err(|_| PassFailure::Corrupt)?;
        let snapshot: PassSnapshot =
            serde_json::from_slice(&bytes).map_err(|_| PassFailure::Corrupt)?;

        if snapshot.v != VERSION {
            warn!(expected = VERSION, found = %snapshot.v, "backstage pass version mismatch");
        }
        Ok(snapshot)
    }

    /// The ring buffer, oldest first. Unreadable contents count as empty.
    pub fn stored(&self) -> Result<Vec<String>, StorageError> {
        let Some(raw) = self.storage.get(RING_KEY)? else {
            return Ok(Vec::new());
        };
        Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "backstage pass buffer unreadable, starting fresh");
            Vec::new()
        }))
    }

    fn remember(&mut self, encoded: String) -> Result<(), StorageError> {
        let mut passes = self.stored()?;
        passes.push(encoded);
        if passes.len() > RING_CAPACITY {
            let overflow = passes.len() - RING_CAPACITY;
            passes.drain(..overflow);
        }
        let raw = serde_json::to_string(&passes)
            .map_err(|e| StorageError::Backend(format!("failed to serialize passes: {e}")))?;
        self.storage.set(RING_KEY, &raw)
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.storage.remove(RING_KEY)
    }
}
