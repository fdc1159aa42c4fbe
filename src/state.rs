use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Epoch milliseconds.
pub type Timestamp = i64;

pub const DEFAULT_TITLE: &str = "Type Casting";
pub const DEFAULT_ACTOR_NAME: &str = "Guest Performer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleId {
    ConfidentExecutive,
    RisingStar,
    MethodActor,
}

impl RoleId {
    pub const ALL: [RoleId; 3] = [
        RoleId::ConfidentExecutive,
        RoleId::RisingStar,
        RoleId::MethodActor,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            RoleId::ConfidentExecutive => "The Confident Executive",
            RoleId::RisingStar => "The Rising Star",
            RoleId::MethodActor => "The Method Actor",
        }
    }
}

impl FromStr for RoleId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        RoleId::ALL
            .into_iter()
            .find(|role| role.to_string() == normalized)
            .ok_or_else(|| format!("unknown role '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpotlightIntensity {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CurtainSpeed {
    Slow,
    #[default]
    Normal,
    Fast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Classic,
    Modern,
    Noir,
    Broadway,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Production {
    pub title: String,
    pub current_act: u32,
    pub current_scene: u32,
    /// Typing input is only accepted while the curtains are open.
    pub curtains_open: bool,
}

impl Default for Production {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            current_act: 1,
            current_scene: 0,
            curtains_open: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Performance {
    pub started: Option<Timestamp>,
    pub tempo: f64,
    pub accuracy: f64,
    pub stage_directions_opacity: f64,
    pub in_panic_mode: bool,
    pub panic_mode_triggered: bool,
    pub character_count: u32,
    pub error_count: u32,
    pub consecutive_errors: u32,
    pub no_look_streak: u32,
    pub current_char_index: usize,
}

impl Default for Performance {
    fn default() -> Self {
        Self {
            started: None,
            tempo: 0.0,
            accuracy: 100.0,
            stage_directions_opacity: 1.0,
            in_panic_mode: false,
            panic_mode_triggered: false,
            character_count: 0,
            error_count: 0,
            consecutive_errors: 0,
            no_look_streak: 0,
            current_char_index: 0,
        }
    }
}

impl Performance {
    /// Cumulative accuracy: every forward error counts, even once corrected.
    pub fn cumulative_accuracy(&self) -> f64 {
        if self.character_count == 0 {
            return 100.0;
        }
        let correct = self.character_count.saturating_sub(self.error_count) as f64;
        (correct / self.character_count as f64 * 100.0).clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Award {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl Award {
    pub fn act_complete() -> Self {
        Self {
            id: "act-complete".to_string(),
            name: "Act I Complete".to_string(),
            description: "Finished Finding Your Stage Legs".to_string(),
        }
    }

    /// Rebuilds an award from its id. Unknown ids keep the id as their name.
    pub fn from_id(id: &str) -> Self {
        let known = Award::act_complete();
        if id == known.id {
            return known;
        }
        Self {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub scene: String,
    pub exercise: String,
    pub tempo: f64,
    pub accuracy: f64,
    pub stars: u8,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PersonalBest {
    pub tempo: f64,
    pub accuracy: f64,
    pub streak: u32,
}

/// Incoming metrics for a personal-best update.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerformanceMetrics {
    pub tempo: f64,
    pub accuracy: f64,
    pub streak: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Actor {
    pub name: String,
    pub role: Option<RoleId>,
    pub experience: u32,
    pub awards: Vec<Award>,
    /// Completed exercise ids. Append-only; retries append again.
    pub repertoire: Vec<String>,
    pub reviews: Vec<Review>,
    pub continuation_code: Option<String>,
    pub backstage_pass: Option<String>,
    pub personal_best: PersonalBest,
}

impl Default for Actor {
    fn default() -> Self {
        Self {
            name: DEFAULT_ACTOR_NAME.to_string(),
            role: None,
            experience: 0,
            awards: Vec::new(),
            repertoire: Vec::new(),
            reviews: Vec::new(),
            continuation_code: None,
            backstage_pass: None,
            personal_best: PersonalBest::default(),
        }
    }
}

impl Actor {
    pub fn has_award(&self, id: &str) -> bool {
        self.awards.iter().any(|a| a.id == id)
    }
}

/// Theatre settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TheatreSettings {
    pub sound_enabled: bool,
    pub reduced_motion: bool,
    pub spotlight_intensity: SpotlightIntensity,
    pub curtain_speed: CurtainSpeed,
    pub prompter_enabled: bool,
    pub theme: Theme,
}

impl Default for TheatreSettings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            reduced_motion: false,
            spotlight_intensity: SpotlightIntensity::Medium,
            curtain_speed: CurtainSpeed::Normal,
            prompter_enabled: true,
            theme: Theme::Classic,
        }
    }
}

/// Partial settings update; `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub sound_enabled: Option<bool>,
    pub reduced_motion: Option<bool>,
    pub spotlight_intensity: Option<SpotlightIntensity>,
    pub curtain_speed: Option<CurtainSpeed>,
    pub prompter_enabled: Option<bool>,
    pub theme: Option<Theme>,
}

impl TheatreSettings {
    pub fn apply(&self, patch: &SettingsPatch) -> Self {
        Self {
            sound_enabled: patch.sound_enabled.unwrap_or(self.sound_enabled),
            reduced_motion: patch.reduced_motion.unwrap_or(self.reduced_motion),
            spotlight_intensity: patch.spotlight_intensity.unwrap_or(self.spotlight_intensity),
            curtain_speed: patch.curtain_speed.unwrap_or(self.curtain_speed),
            prompter_enabled: patch.prompter_enabled.unwrap_or(self.prompter_enabled),
            theme: patch.theme.unwrap_or(self.theme),
        }
    }
}

impl From<&TheatreSettings> for SettingsPatch {
    fn from(settings: &TheatreSettings) -> Self {
        Self {
            sound_enabled: Some(settings.sound_enabled),
            reduced_motion: Some(settings.reduced_motion),
            spotlight_intensity: Some(settings.spotlight_intensity),
            curtain_speed: Some(settings.curtain_speed),
            prompter_enabled: Some(settings.prompter_enabled),
            theme: Some(settings.theme),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SessionState {
    pub production: Production,
    pub performance: Performance,
    pub actor: Actor,
    pub theatre: TheatreSettings,
}

/// Stars for a finished exercise, from its accuracy.
pub fn stars_for(accuracy: f64) -> u8 {
    if accuracy >= 95.0 {
        5
    } else if accuracy >= 90.0 {
        4
    } else if accuracy >= 80.0 {
        3
    } else if accuracy >= 70.0 {
        2
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_id_parses_wire_names() {
        assert_eq!("RISING_STAR".parse::<RoleId>(), Ok(RoleId::RisingStar));
        assert_eq!("method-actor".parse::<RoleId>(), Ok(RoleId::MethodActor));
        assert!("STAGEHAND".parse::<RoleId>().is_err());
        assert_eq!(RoleId::ConfidentExecutive.to_string(), "CONFIDENT_EXECUTIVE");
    }

    #[test]
    fn default_performance_is_not_failing() {
        let perf = Performance::default();
        assert_eq!(perf.accuracy, 100.0);
        assert_eq!(perf.cumulative_accuracy(), 100.0);
        assert_eq!(perf.stage_directions_opacity, 1.0);
    }

    #[test]
    fn stars_thresholds() {
        assert_eq!(stars_for(100.0), 5);
        assert_eq!(stars_for(95.0), 5);
        assert_eq!(stars_for(94.9), 4);
        assert_eq!(stars_for(90.0), 4);
        assert_eq!(stars_for(80.0), 3);
        assert_eq!(stars_for(70.0), 2);
        assert_eq!(stars_for(69.9), 1);
        assert_eq!(stars_for(0.0), 1);
    }

    #[test]
    fn settings_patch_only_touches_named_fields() {
        let settings = TheatreSettings::default();
        let patched = settings.apply(&SettingsPatch {
            theme: Some(Theme::Noir),
            ..SettingsPatch::default()
        });
        assert_eq!(patched.theme, Theme::Noir);
        assert_eq!(patched.sound_enabled, settings.sound_enabled);
        assert_eq!(patched.curtain_speed, CurtainSpeed::Normal);
    }

    #[test]
    fn full_patch_reproduces_settings() {
        let settings = TheatreSettings {
            theme: Theme::Modern,
            curtain_speed: CurtainSpeed::Fast,
            ..TheatreSettings::default()
        };
        let applied = TheatreSettings::default().apply(&SettingsPatch::from(&settings));
        assert_eq!(applied, settings);
    }

    #[test]
    fn actor_serializes_camel_case() {
        let actor = Actor {
            role: Some(RoleId::RisingStar),
            ..Actor::default()
        };
        let json = serde_json::to_value(&actor).unwrap();
        assert_eq!(json["role"], "RISING_STAR");
        assert!(json.get("personalBest").is_some());
        assert!(json.get("continuationCode").is_some());
    }
}
