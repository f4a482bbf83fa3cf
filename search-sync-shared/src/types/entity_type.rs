//! Entity types and sync modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kinds of relational entities mirrored into the search index.
///
/// Each entity type owns exactly one logical index and one watermark, so
/// passes for different entity types never touch each other's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Articles,
    Images,
    Models,
}

impl EntityType {
    /// All known entity types, in the order a full run visits them.
    pub const ALL: [EntityType; 3] = [EntityType::Articles, EntityType::Images, EntityType::Models];

    /// The logical index name for this entity type.
    ///
    /// This is also the key used by the dirty queue, the pending-deletion
    /// ledger and the watermark, never a physical (shadow) index name.
    pub fn index_name(&self) -> &'static str {
        match self {
            EntityType::Articles => "articles",
            EntityType::Images => "images",
            EntityType::Models => "models",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.index_name())
    }
}

/// Error returned when parsing an unknown entity type name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown entity type: {0}")]
pub struct ParseEntityTypeError(pub String);

impl FromStr for EntityType {
    type Err = ParseEntityTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "articles" | "article" => Ok(EntityType::Articles),
            "images" | "image" => Ok(EntityType::Images),
            "models" | "model" => Ok(EntityType::Models),
            other => Err(ParseEntityTypeError(other.to_string())),
        }
    }
}

/// How a sync pass selects its candidate rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// Only rows changed after the stored watermark, plus dirty-queue rows.
    #[default]
    Incremental,
    /// Every eligible row, built into a shadow index and swapped in.
    FullRebuild,
}

impl SyncMode {
    pub fn is_full_rebuild(&self) -> bool {
        matches!(self, SyncMode::FullRebuild)
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Incremental => f.write_str("incremental"),
            SyncMode::FullRebuild => f.write_str("full-rebuild"),
        }
    }
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "incremental" => Ok(SyncMode::Incremental),
            "full-rebuild" | "full_rebuild" | "fullrebuild" | "rebuild" => {
                Ok(SyncMode::FullRebuild)
            }
            other => Err(format!("Unknown sync mode: {}", other)),
        }
    }
}
