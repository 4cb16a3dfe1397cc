//! # lapcat-core
//!
//! Detection and counting engine for Lap Cat Counter: notices when the local
//! player sits in another player's lap (or someone sits in theirs), counts it
//! per person, and keeps running statistics.
//!
//! ## Design Principles
//!
//! - **Frame-driven**: one synchronous [`LapEngine::tick`] per rendered frame. No async runtime.
//! - **Injected world**: positions come from a [`SpatialSnapshotProvider`], gestures from a
//!   [`GestureFeed`]. Nothing reads global state, so tests drive the engine with synthetic actors.
//! - **Fail safe**: an unavailable feed, a missing local player or an unreadable actor means
//!   "don't count", never an error on the frame path.
//! - **Opaque persistence**: the engine hands its config to a [`ConfigSink`]; the JSON file
//!   store is one implementation.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lapcat_core::{GestureCell, JsonConfigFile, LapEngine};
//!
//! let mut file = JsonConfigFile::new(lapcat_core::default_config_path()?);
//! let config = file.load_migrated(None)?;
//! let mut engine = LapEngine::new(config, file);
//!
//! // every frame:
//! engine.tick(dt, chrono::Utc::now(), &world, &cell);
//! for notice in engine.drain_notices() {
//!     println!("{}", notice.message);
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod format;
pub mod gate;
pub mod gesture_ids;
pub mod stats;
pub mod tracker;
pub mod types;

pub use config::*;
pub use engine::{CountNotice, LapEngine};
pub use error::{LapError, Result};
pub use feed::*;
pub use format::*;
pub use gate::{GateController, GateInput, GateSignal, GateState};
pub use gesture_ids::*;
pub use stats::*;
pub use tracker::{
    CountEvent, DebugReason, LapDebugInfo, LapTracker, TrackerFrame, TrackerPolicy,
};
pub use types::*;
