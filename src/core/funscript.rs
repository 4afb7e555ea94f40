//! Funscript export of the actions generated during an activation.

use crate::core::turnpoints::Action;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single funscript point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunscriptAction {
    /// Milliseconds from the start of the video
    pub at: i64,
    pub pos: i32,
}

/// Funscript file contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Funscript {
    pub version: String,
    pub inverted: bool,
    pub range: i32,
    pub actions: Vec<FunscriptAction>,
}

impl Default for Funscript {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            inverted: false,
            range: 100,
            actions: Vec::new(),
        }
    }
}

impl Funscript {
    /// Build a script from actions, ordered by time.
    pub fn from_actions(actions: &[Action]) -> Self {
        let mut points: Vec<FunscriptAction> = actions
            .iter()
            .map(|a| FunscriptAction {
                at: a.timestamp_ms.round() as i64,
                pos: a.position,
            })
            .collect();
        points.sort_by_key(|p| p.at);

        Self {
            actions: points,
            ..Self::default()
        }
    }

    /// Whether the script holds no actions.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Write the script as JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_actions_sorts_and_rounds() {
        let actions = [
            Action::new(2066.6, 100, None),
            Action::new(1033.4, 0, Some(1)),
        ];
        let script = Funscript::from_actions(&actions);

        assert_eq!(
            script.actions,
            vec![
                FunscriptAction { at: 1033, pos: 0 },
                FunscriptAction { at: 2067, pos: 100 },
            ]
        );
    }

    #[test]
    fn test_save_writes_json() {
        let path = std::env::temp_dir()
            .join("funscript-copilot-test")
            .join("save.funscript");
        let script = Funscript::from_actions(&[Action::new(500.0, 42, None)]);
        script.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["actions"][0]["at"], 500);
        assert_eq!(parsed["actions"][0]["pos"], 42);
        assert_eq!(parsed["range"], 100);
    }
}
