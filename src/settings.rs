//! Optional settings file.
//!
//! `.readme-pilot/config.json` can override the generation defaults.
//! Missing file or fields fall back to the compiled-in constants; CLI
//! flags override both.

use serde::Deserialize;

use crate::constants::{MAX_PASSES, MODEL, STATE_DIR, TAIL_WINDOW};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model: String,
    pub max_passes: usize,
    pub tail_window: usize,
    pub output: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: MODEL.to_string(),
            max_passes: MAX_PASSES,
            tail_window: TAIL_WINDOW,
            output: "README.md".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the config file, defaults when absent.
    pub fn load() -> Self {
        let path = std::path::Path::new(STATE_DIR).join("config.json");
        let Ok(content) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            eprintln!("Warning: cannot parse {}: {}", path.display(), e);
            Self::default()
        })
    }
}
