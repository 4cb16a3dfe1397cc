//! Resolves the `/sit` and `/groundsit` gesture ids from the game's emote table.
//!
//! The table's command text comes in several shapes depending on client
//! version. Flattening it to a plain string is the job of the
//! [`EmoteCommandSource`] adapter; everything here works on plain strings.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{LapError, Result};

pub const SIT_COMMAND: &str = "/sit";
pub const GROUND_SIT_COMMAND: &str = "/groundsit";

/// First whitespace-separated token that starts with a slash.
static RE_SLASH_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|\s)(/\S+)").unwrap());

/// Numeric gesture id as used by the emote execution call.
pub type GestureId = u16;

/// One row of the emote table with its command text already flattened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmoteRow {
    pub row_id: u32,
    pub command: Option<String>,
}

impl EmoteRow {
    pub fn new(row_id: u32, command: impl Into<String>) -> Self {
        Self {
            row_id,
            command: Some(command.into()),
        }
    }
}

/// Adapter over the game-data emote table.
pub trait EmoteCommandSource {
    fn emote_rows(&self) -> Result<Vec<EmoteRow>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SitGestureIds {
    pub sit: GestureId,
    pub ground_sit: GestureId,
}

/// Extracts `/command` from free-form command text, trimming trailing punctuation.
pub fn normalize_slash_command(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let token = RE_SLASH_TOKEN.captures(raw)?.get(1)?.as_str();
    let token = token.trim_end_matches(&['.', ',', ';', ':'][..]);
    if token.len() <= 1 {
        return None;
    }
    Some(token.to_string())
}

/// Scans the rows for the first `/sit` and `/groundsit` commands.
pub fn resolve_sit_ids<I>(rows: I) -> Result<SitGestureIds>
where
    I: IntoIterator<Item = EmoteRow>,
{
    let mut sit: Option<GestureId> = None;
    let mut ground_sit: Option<GestureId> = None;

    for row in rows {
        let Some(command) = row.command.as_deref().and_then(normalize_slash_command) else {
            continue;
        };
        let Ok(id) = GestureId::try_from(row.row_id) else {
            debug!(row_id = row.row_id, "Skipping emote row with out-of-range id");
            continue;
        };

        if sit.is_none() && command.eq_ignore_ascii_case(SIT_COMMAND) {
            sit = Some(id);
        }
        if ground_sit.is_none() && command.eq_ignore_ascii_case(GROUND_SIT_COMMAND) {
            ground_sit = Some(id);
        }

        if let (Some(sit), Some(ground_sit)) = (sit, ground_sit) {
            return Ok(SitGestureIds { sit, ground_sit });
        }
    }

    let missing: Vec<&str> = [(sit, SIT_COMMAND), (ground_sit, GROUND_SIT_COMMAND)]
        .into_iter()
        .filter(|(id, _)| id.is_none())
        .map(|(_, name)| name)
        .collect();
    Err(LapError::GestureIdsUnresolved {
        missing: missing.join(", "),
    })
}

/// Resolves through a source, logging rather than propagating a failure.
pub fn try_resolve_from(source: &dyn EmoteCommandSource) -> Option<SitGestureIds> {
    match source.emote_rows().and_then(resolve_sit_ids) {
        Ok(ids) => Some(ids),
        Err(err) => {
            warn!(error = %err, "Failed to resolve sit gesture ids from game data");
            None
        }
    }
}
