//! Persisted user defaults.
//!
//! An explicit [`SettingsStore`] capability is passed to whatever needs
//! defaults; nothing reads ambient global state. The built-in store keeps
//! a JSON file under the user config directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Defaults that persist between sessions, mostly for the depth-map to
/// point-cloud conversion the presentation side offers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Depth conversion
    pub depth_scale: f32,
    pub focal_length: f32,
    pub invert_depth: bool,
    /// Samples beyond this are treated as background and dropped.
    pub max_depth: f32,

    // File handling
    pub last_open_dir: Option<PathBuf>,

    // Recent files (most recent first, max 10)
    pub recent_files: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            depth_scale: 1.0,
            focal_length: 525.0,
            invert_depth: false,
            max_depth: 100.0,
            last_open_dir: None,
            recent_files: Vec::new(),
        }
    }
}

const MAX_RECENT_FILES: usize = 10;

impl Settings {
    /// Add file to the recent list (moves to top if already present).
    pub fn add_recent(&mut self, path: PathBuf) {
        self.recent_files.retain(|p| p != &path);
        self.recent_files.insert(0, path.clone());
        self.recent_files.truncate(MAX_RECENT_FILES);
        self.last_open_dir = path.parent().map(PathBuf::from);
    }
}

/// Capability for loading and saving [`Settings`].
pub trait SettingsStore {
    fn load(&self) -> Settings;
    fn save(&self, settings: &Settings);
}

/// Store backed by a JSON file under the user config directory.
#[derive(Debug, Default)]
pub struct FileSettingsStore {
    /// Override for tests; the config dir otherwise.
    path: Option<PathBuf>,
}

impl FileSettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store reading and writing an explicit path.
    pub fn at(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.path {
            return Some(path.clone());
        }
        dirs::config_dir().map(|mut p| {
            p.push("meshport");
            std::fs::create_dir_all(&p).ok();
            p.push("settings.json");
            p
        })
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Settings {
        let mut settings: Settings = self
            .path()
            .and_then(|p| std::fs::read_to_string(&p).ok())
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();

        // A zero or negative scale renders every point at the origin.
        if settings.depth_scale <= 0.0 {
            settings.depth_scale = 1.0;
        }
        if settings.focal_length <= 0.0 {
            settings.focal_length = 525.0;
        }

        settings
    }

    fn save(&self, settings: &Settings) {
        if let Some(path) = self.path() {
            if let Ok(json) = serde_json::to_string_pretty(settings) {
                let _ = std::fs::write(path, json);
            }
        }
    }
}

/// In-memory store for tests and embedders that manage persistence
/// themselves.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    inner: parking_lot::Mutex<Settings>,
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Settings {
        self.inner.lock().clone()
    }

    fn save(&self, settings: &Settings) {
        *self.inner.lock() = settings.clone();
    }
}
