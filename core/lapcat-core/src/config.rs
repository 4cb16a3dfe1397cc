//! Configuration loading and saving.
//!
//! Thresholds, gesture ids and the statistics store live in one JSON file
//! (`~/.lapcat/lapcat.json`). The engine never writes it directly; it hands
//! the config to a [`ConfigSink`] whenever something worth keeping changes.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::error::{LapError, Result};
use crate::gesture_ids::{self, EmoteCommandSource, GestureId};
use crate::stats::StatsStore;

pub const CONFIG_VERSION: u32 = 2;
pub const DEFAULT_SIT_EMOTE_ID: GestureId = 50;
pub const DEFAULT_GROUND_SIT_EMOTE_ID: GestureId = 52;

const CONFIG_DIR_NAME: &str = ".lapcat";
const CONFIG_FILE_NAME: &str = "lapcat.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Maximum 3D distance to a lap candidate.
    #[serde(default = "default_radius")]
    pub radius: f32,
    /// Maximum |dx| and |dz| to a lap candidate.
    #[serde(default = "default_xy_threshold")]
    pub xy_threshold: f32,
    /// Outgoing band: local player must be at least this far above the other.
    #[serde(default = "default_min_z_above")]
    pub min_z_above: f32,
    #[serde(default = "default_max_z_above")]
    pub max_z_above: f32,
    /// Incoming band: how far above the other player the local player may be.
    #[serde(default = "default_sat_on_you_equal_z_tolerance")]
    pub sat_on_you_equal_z_tolerance: f32,
    #[serde(default = "default_stable_seconds_to_count")]
    pub stable_seconds_to_count: f32,
    #[serde(default = "default_cooldown_seconds_per_person")]
    pub cooldown_seconds_per_person: i32,

    #[serde(default = "default_true")]
    pub require_sit_emote: bool,
    #[serde(default = "default_sit_emote_id")]
    pub sit_emote_id: GestureId,
    #[serde(default = "default_ground_sit_emote_id")]
    pub ground_sit_emote_id: GestureId,
    /// Lifetime of a gate opened by a sit gesture.
    #[serde(default = "default_emote_hook_seconds")]
    pub emote_hook_seconds: f32,

    #[serde(default = "default_true")]
    pub overlay_enabled: bool,

    #[serde(flatten)]
    pub stats: StatsStore,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_radius() -> f32 {
    0.90
}

fn default_xy_threshold() -> f32 {
    0.40
}

fn default_min_z_above() -> f32 {
    0.05
}

fn default_max_z_above() -> f32 {
    0.70
}

fn default_sat_on_you_equal_z_tolerance() -> f32 {
    0.10
}

fn default_stable_seconds_to_count() -> f32 {
    1.0
}

fn default_cooldown_seconds_per_person() -> i32 {
    30
}

fn default_emote_hook_seconds() -> f32 {
    6.0
}

fn default_sit_emote_id() -> GestureId {
    DEFAULT_SIT_EMOTE_ID
}

fn default_ground_sit_emote_id() -> GestureId {
    DEFAULT_GROUND_SIT_EMOTE_ID
}

fn default_true() -> bool {
    true
}

impl Default for LapConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            radius: default_radius(),
            xy_threshold: default_xy_threshold(),
            min_z_above: default_min_z_above(),
            max_z_above: default_max_z_above(),
            sat_on_you_equal_z_tolerance: default_sat_on_you_equal_z_tolerance(),
            stable_seconds_to_count: default_stable_seconds_to_count(),
            cooldown_seconds_per_person: default_cooldown_seconds_per_person(),
            require_sit_emote: true,
            sit_emote_id: default_sit_emote_id(),
            ground_sit_emote_id: default_ground_sit_emote_id(),
            emote_hook_seconds: default_emote_hook_seconds(),
            overlay_enabled: true,
            stats: StatsStore::default(),
        }
    }
}

impl LapConfig {
    /// Cooldown as a non-negative duration.
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.cooldown_seconds_per_person.max(0)))
    }

    pub fn sit_gesture_ids(&self) -> [GestureId; 2] {
        [self.sit_emote_id, self.ground_sit_emote_id]
    }

    /// Fills in zero gesture ids. Game data is tried first when sit gestures are
    /// required; the built-in defaults are the fallback. Returns true when
    /// anything changed and the config should be saved.
    pub fn ensure_gesture_ids(&mut self, source: Option<&dyn EmoteCommandSource>) -> bool {
        if self.sit_emote_id != 0 && self.ground_sit_emote_id != 0 {
            return false;
        }

        let resolved = match source {
            Some(source) if self.require_sit_emote => gesture_ids::try_resolve_from(source),
            _ => None,
        };

        match resolved {
            Some(ids) => {
                if self.sit_emote_id == 0 {
                    self.sit_emote_id = ids.sit;
                }
                if self.ground_sit_emote_id == 0 {
                    self.ground_sit_emote_id = ids.ground_sit;
                }
                info!(
                    sit = self.sit_emote_id,
                    ground_sit = self.ground_sit_emote_id,
                    "Resolved sit gesture ids from game data"
                );
            }
            None => {
                if self.sit_emote_id == 0 {
                    self.sit_emote_id = DEFAULT_SIT_EMOTE_ID;
                }
                if self.ground_sit_emote_id == 0 {
                    self.ground_sit_emote_id = DEFAULT_GROUND_SIT_EMOTE_ID;
                }
                info!(
                    sit = self.sit_emote_id,
                    ground_sit = self.ground_sit_emote_id,
                    "Using fallback sit gesture ids"
                );
            }
        }

        true
    }

    /// Loads the config, returning defaults if the file doesn't exist.
    ///
    /// An empty or corrupt file also yields defaults (with a warning) so that a
    /// bad write never locks the player out of the overlay.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs_err::read_to_string(path).map_err(|source| LapError::Io {
            context: format!("reading {}", path.display()),
            source,
        })?;

        if content.trim().is_empty() {
            warn!(path = %path.display(), "Empty config file, using defaults");
            return Ok(Self::default());
        }

        match Self::parse(path, &content) {
            Ok(config) => Ok(config),
            Err(err) => {
                warn!(error = %err, "Failed to parse config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Like [`load`](Self::load), but an empty or unparseable file is an error
    /// rather than defaults. Use before anything that writes the file back.
    pub fn load_strict(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs_err::read_to_string(path).map_err(|source| LapError::Io {
            context: format!("reading {}", path.display()),
            source,
        })?;
        if content.trim().is_empty() {
            return Err(LapError::ConfigMalformed {
                path: path.to_path_buf(),
                details: "file is empty".to_string(),
            });
        }
        Self::parse(path, &content)
    }

    /// Strict parse used by `load`; surfaces the serde error.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|err| LapError::ConfigMalformed {
            path: path.to_path_buf(),
            details: err.to_string(),
        })
    }

    /// Writes the config atomically (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).map_err(|source| LapError::Json {
            context: "serializing config".to_string(),
            source,
        })?;

        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs_err::create_dir_all(parent).map_err(|source| LapError::ConfigWriteFailed {
            path: path.to_path_buf(),
            source,
        })?;

        let write_failed = |source: std::io::Error| LapError::ConfigWriteFailed {
            path: path.to_path_buf(),
            source,
        };
        let mut temp_file = NamedTempFile::new_in(parent).map_err(write_failed)?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(write_failed)?;
        temp_file.flush().map_err(write_failed)?;
        temp_file
            .persist(path)
            .map_err(|err| write_failed(err.error))?;

        Ok(())
    }
}

/// Returns the path to the lapcat directory (~/.lapcat).
pub fn get_lapcat_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME))
}

pub fn default_config_path() -> Result<PathBuf> {
    get_lapcat_dir()
        .map(|d| d.join(CONFIG_FILE_NAME))
        .ok_or(LapError::HomeDirNotFound)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Persistence Seam
// ═══════════════════════════════════════════════════════════════════════════════

/// Where the engine sends the config when it should be persisted.
pub trait ConfigSink {
    fn save(&mut self, config: &LapConfig) -> Result<()>;
}

/// File-backed sink.
#[derive(Debug, Clone)]
pub struct JsonConfigFile {
    path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the config behind this file and migrates gesture ids, saving if
    /// the migration changed anything.
    pub fn load_migrated(&mut self, source: Option<&dyn EmoteCommandSource>) -> Result<LapConfig> {
        let config = LapConfig::load(&self.path)?;
        self.migrate(config, source)
    }

    /// [`load_migrated`](Self::load_migrated) for callers that will write the
    /// file: a malformed file is returned as an error and left untouched.
    pub fn load_for_update(
        &mut self,
        source: Option<&dyn EmoteCommandSource>,
    ) -> Result<LapConfig> {
        let config = LapConfig::load_strict(&self.path)?;
        self.migrate(config, source)
    }

    fn migrate(
        &mut self,
        mut config: LapConfig,
        source: Option<&dyn EmoteCommandSource>,
    ) -> Result<LapConfig> {
        if config.ensure_gesture_ids(source) {
            self.save(&config)?;
        }
        Ok(config)
    }
}

impl ConfigSink for JsonConfigFile {
    fn save(&mut self, config: &LapConfig) -> Result<()> {
        config.save(&self.path)
    }
}

/// Keeps the last saved config in memory. Used for replays and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub last_saved: Option<LapConfig>,
    pub save_count: usize,
}

impl ConfigSink for MemorySink {
    fn save(&mut self, config: &LapConfig) -> Result<()> {
        self.last_saved = Some(config.clone());
        self.save_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture_ids::EmoteRow;
    use crate::types::Direction;

    struct Rows(Vec<EmoteRow>);

    impl EmoteCommandSource for Rows {
        fn emote_rows(&self) -> Result<Vec<EmoteRow>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = LapConfig::default();
        assert_eq!(config.radius, 0.90);
        assert_eq!(config.xy_threshold, 0.40);
        assert_eq!(config.min_z_above, 0.05);
        assert_eq!(config.max_z_above, 0.70);
        assert_eq!(config.cooldown_seconds_per_person, 30);
        assert_eq!(config.sit_gesture_ids(), [50, 52]);
        assert!(config.require_sit_emote);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = LapConfig::parse(Path::new("cfg.json"), r#"{"radius": 1.5}"#).unwrap();
        assert_eq!(config.radius, 1.5);
        assert_eq!(config.xy_threshold, 0.40);
        assert_eq!(config.stats.unique_actor_count(), 0);
    }

    #[test]
    fn test_negative_cooldown_clamps_to_zero() {
        let config = LapConfig {
            cooldown_seconds_per_person: -5,
            ..Default::default()
        };
        assert_eq!(config.cooldown(), chrono::Duration::zero());
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let config = LapConfig::load(&temp_dir.path().join("missing.json")).unwrap();
        assert_eq!(config, LapConfig::default());
    }

    #[test]
    fn test_load_corrupt_file_returns_defaults() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("lapcat.json");
        fs_err::write(&path, "{not json").unwrap();
        let config = LapConfig::load(&path).unwrap();
        assert_eq!(config, LapConfig::default());
    }

    #[test]
    fn test_load_strict_rejects_corrupt_file() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("lapcat.json");

        fs_err::write(&path, "{not json").unwrap();
        assert!(matches!(
            LapConfig::load_strict(&path),
            Err(LapError::ConfigMalformed { .. })
        ));

        fs_err::write(&path, "  \n").unwrap();
        assert!(matches!(
            LapConfig::load_strict(&path),
            Err(LapError::ConfigMalformed { .. })
        ));

        let missing = temp_dir.path().join("missing.json");
        assert_eq!(LapConfig::load_strict(&missing).unwrap(), LapConfig::default());
    }

    #[test]
    fn test_load_for_update_leaves_bad_file_alone() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("lapcat.json");
        let bad = r#"{"sit_emote_id": 0, "people": {"Alice": {"lap_count": -1}}}"#;
        fs_err::write(&path, bad).unwrap();

        let mut sink = JsonConfigFile::new(&path);
        assert!(sink.load_for_update(None).is_err());
        assert_eq!(fs_err::read_to_string(&path).unwrap(), bad);
    }

    #[test]
    fn test_save_then_load_keeps_stats() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("nested").join("lapcat.json");

        let mut config = LapConfig::default();
        config.stats.get_or_create("Alice", "Alice").lap_count = 3;
        config.stats.get_or_create("Alice", "Alice").add_session(Direction::Outgoing, 42);
        config.save(&path).unwrap();

        let loaded = LapConfig::load(&path).unwrap();
        assert_eq!(loaded.stats.count_for("Alice"), 3);
        assert_eq!(loaded.stats.get("Alice").unwrap().total_lap_seconds, 42);

        let raw = fs_err::read_to_string(&path).unwrap();
        assert!(raw.contains("\"people\""));
    }

    #[test]
    fn test_ensure_gesture_ids_noop_when_set() {
        let mut config = LapConfig::default();
        assert!(!config.ensure_gesture_ids(None));
    }

    #[test]
    fn test_ensure_gesture_ids_prefers_game_data() {
        let mut config = LapConfig {
            sit_emote_id: 0,
            ground_sit_emote_id: 0,
            ..Default::default()
        };
        let rows = Rows(vec![EmoteRow::new(61, "/sit"), EmoteRow::new(63, "/groundsit")]);
        assert!(config.ensure_gesture_ids(Some(&rows)));
        assert_eq!(config.sit_gesture_ids(), [61, 63]);
    }

    #[test]
    fn test_ensure_gesture_ids_falls_back_to_defaults() {
        let mut config = LapConfig {
            sit_emote_id: 0,
            ..Default::default()
        };
        let rows = Rows(vec![]);
        assert!(config.ensure_gesture_ids(Some(&rows)));
        assert_eq!(config.sit_gesture_ids(), [50, 52]);
    }

    #[test]
    fn test_json_file_sink_round_trips_migration() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("lapcat.json");
        fs_err::write(&path, r#"{"sit_emote_id": 0}"#).unwrap();

        let mut sink = JsonConfigFile::new(&path);
        let config = sink.load_migrated(None).unwrap();
        assert_eq!(config.sit_emote_id, DEFAULT_SIT_EMOTE_ID);

        let reloaded = LapConfig::load(&path).unwrap();
        assert_eq!(reloaded.sit_emote_id, DEFAULT_SIT_EMOTE_ID);
    }
}
