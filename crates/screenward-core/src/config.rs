//! Persistent configuration for screenward.
//!
//! Stores user settings in `~/.screenward/config.json`. Every field has a
//! default, so a missing or partial file yields a usable configuration.
//!
//! # Example
//!
//! ```no_run
//! use screenward_core::config::ScreenwardConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = ScreenwardConfig::load();
//!
//! if !config.track_screens {
//!     println!("Screen tracking disabled, using the seed screen only");
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

const CONFIG_FILENAME: &str = "config.json";

/// Returns the screenward state directory (`~/.screenward/`).
///
/// Falls back to the system temp directory when no home directory is known.
pub fn screenward_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".screenward")
}

/// Delay intervals used by [`Sleeper`](crate::sleeper::Sleeper).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Default pause in milliseconds.
    pub pause_ms: u64,
    /// Short pause in milliseconds, also the poll interval when waiting
    /// for a screen to appear.
    pub mini_pause_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            pause_ms: 500,
            mini_pause_ms: 300,
        }
    }
}

/// Persistent screenward configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenwardConfig {
    /// Track screen transitions on a stack. When false, the tracker only
    /// ever reports the screen it was seeded with.
    pub track_screens: bool,

    /// When false, [`Scroller::scroll_down`](crate::scroll::Scroller::scroll_down)
    /// is a no-op that reports nothing to scroll.
    pub should_scroll: bool,

    /// Pause intervals.
    pub timing: Timing,

    /// Upper bound for waiting on a fresh screen or navigating back.
    /// `None` waits forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_wait_timeout_ms: Option<u64>,

    /// Most scrolls allowed to move a view when scrolling it all the way.
    /// `None` scrolls until the view stops moving.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_scroll_steps: Option<u32>,
}

impl Default for ScreenwardConfig {
    fn default() -> Self {
        Self {
            track_screens: true,
            should_scroll: true,
            timing: Timing::default(),
            screen_wait_timeout_ms: None,
            max_scroll_steps: None,
        }
    }
}

impl ScreenwardConfig {
    /// Load config from `~/.screenward/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(&screenward_dir().join(CONFIG_FILENAME))
    }

    /// Load config from `path`, falling back to [`Default`].
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save config to `~/.screenward/config.json`.
    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(&screenward_dir().join(CONFIG_FILENAME))
    }

    /// Save config as pretty-printed JSON to `path`, creating its parent
    /// directory.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }

    /// The screen wait bound as a [`Duration`].
    pub fn screen_wait_timeout(&self) -> Option<Duration> {
        self.screen_wait_timeout_ms.map(Duration::from_millis)
    }
}
