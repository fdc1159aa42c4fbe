use include_dir::{include_dir, Dir};
use serde::Deserialize;

use crate::error::ScriptError;

static SCRIPT_DIR: Dir = include_dir!("src/scripts");

/// Shown when the position points past the catalog.
pub const FALLBACK_SCRIPT: &str = "The quick brown fox jumps over the lazy dog.";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: String,
    pub title: String,
    pub script: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub warm_up: String,
    pub exercises: Vec<Exercise>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Act {
    pub act: u32,
    pub title: String,
    pub scenes: Vec<Scene>,
}

/// Scene and exercise indices into an [`Act`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub scene: usize,
    pub exercise: usize,
}

impl Position {
    pub fn new(scene: usize, exercise: usize) -> Self {
        Self { scene, exercise }
    }
}

impl Act {
    pub fn act_one() -> Result<Self, ScriptError> {
        Self::load("act_one.json")
    }

    pub fn load(file_name: &str) -> Result<Self, ScriptError> {
        let file = SCRIPT_DIR
            .get_file(file_name)
            .ok_or_else(|| ScriptError::Missing(file_name.to_string()))?;
        let contents = file
            .contents_utf8()
            .ok_or_else(|| ScriptError::Encoding(file_name.to_string()))?;
        Self::from_json(contents)
    }

    /// A one-exercise act around a custom script.
    pub fn single(script: &str) -> Self {
        Self {
            act: 1,
            title: "Improv".to_string(),
            scenes: vec![Scene {
                id: "improv".to_string(),
                name: "Improv".to_string(),
                warm_up: String::new(),
                exercises: vec![Exercise {
                    id: "custom".to_string(),
                    title: "Custom Script".to_string(),
                    script: script.trim().to_string(),
                }],
            }],
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let act: Act = serde_json::from_str(json)?;
        if act.scenes.iter().all(|s| s.exercises.is_empty()) {
            return Err(ScriptError::Empty(act.act));
        }
        Ok(act)
    }

    pub fn scene(&self, pos: Position) -> Option<&Scene> {
        self.scenes.get(pos.scene)
    }

    pub fn exercise(&self, pos: Position) -> Option<&Exercise> {
        self.scene(pos)?.exercises.get(pos.exercise)
    }

    /// Text to type at `pos`: the exercise script, the scene's warm-up when
    /// the exercise index is out of range, or [`FALLBACK_SCRIPT`].
    pub fn script(&self, pos: Position) -> &str {
        match self.scene(pos) {
            Some(scene) => scene
                .exercises
                .get(pos.exercise)
                .map(|e| e.script.as_str())
                .unwrap_or(scene.warm_up.as_str()),
            None => FALLBACK_SCRIPT,
        }
    }

    /// Repertoire id recorded when the exercise at `pos` is completed.
    pub fn repertoire_id(&self, pos: Position) -> Option<String> {
        let scene = self.scene(pos)?;
        let exercise = scene.exercises.get(pos.exercise)?;
        Some(format!("{}-{}", scene.id, exercise.id))
    }

    pub fn is_valid(&self, pos: Position) -> bool {
        self.exercise(pos).is_some()
    }

    /// The following exercise, crossing into the next scene; `None` at the
    /// end of the act.
    pub fn next(&self, pos: Position) -> Option<Position> {
        let scene = self.scene(pos)?;
        if pos.exercise + 1 < scene.exercises.len() {
            return Some(Position::new(pos.scene, pos.exercise + 1));
        }
        (pos.scene + 1..self.scenes.len())
            .find(|&i| !self.scenes[i].exercises.is_empty())
            .map(|i| Position::new(i, 0))
    }

    /// The preceding exercise, crossing back into the previous scene's last
    /// exercise.
    pub fn previous(&self, pos: Position) -> Option<Position> {
        if pos.exercise > 0 {
            return Some(Position::new(pos.scene, pos.exercise - 1));
        }
        (0..pos.scene.min(self.scenes.len()))
            .rev()
            .find(|&i| !self.scenes[i].exercises.is_empty())
            .map(|i| Position::new(i, self.scenes[i].exercises.len() - 1))
    }

    /// Where the exercise recorded as `repertoire_id` sits in this act.
    pub fn position_of(&self, repertoire_id: &str) -> Option<Position> {
        self.scenes.iter().enumerate().find_map(|(s, scene)| {
            scene
                .exercises
                .iter()
                .position(|e| {
                    repertoire_id
                        .strip_prefix(scene.id.as_str())
                        .and_then(|rest| rest.strip_prefix('-'))
                        == Some(e.id.as_str())
                })
                .map(|e| Position::new(s, e))
        })
    }
}
