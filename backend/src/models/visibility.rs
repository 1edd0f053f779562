use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

use super::UserId;
use crate::constants::{APPROXIMATE_DECIMALS, CITY_DECIMALS};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Who may see an owner's presence, as stored and exchanged over the API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityMode {
    All,
    #[default]
    Friends,
    Custom,
    None,
}

impl VisibilityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisibilityMode::All => "all",
            VisibilityMode::Friends => "friends",
            VisibilityMode::Custom => "custom",
            VisibilityMode::None => "none",
        }
    }
}

impl FromStr for VisibilityMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(VisibilityMode::All),
            "friends" => Ok(VisibilityMode::Friends),
            "custom" => Ok(VisibilityMode::Custom),
            "none" => Ok(VisibilityMode::None),
            other => Err(UnknownVariant {
                kind: "visibility_mode",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for VisibilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much an owner's coordinates are rounded before others see them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccuracyTier {
    #[default]
    Precise,
    Approximate,
    City,
}

impl AccuracyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccuracyTier::Precise => "precise",
            AccuracyTier::Approximate => "approximate",
            AccuracyTier::City => "city",
        }
    }

    /// Decimal places kept, or `None` for untouched coordinates.
    pub fn decimals(&self) -> Option<i32> {
        match self {
            AccuracyTier::Precise => None,
            AccuracyTier::Approximate => Some(APPROXIMATE_DECIMALS),
            AccuracyTier::City => Some(CITY_DECIMALS),
        }
    }
}

impl FromStr for AccuracyTier {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "precise" => Ok(AccuracyTier::Precise),
            "approximate" => Ok(AccuracyTier::Approximate),
            "city" => Ok(AccuracyTier::City),
            other => Err(UnknownVariant {
                kind: "accuracy_level",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for AccuracyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved audience of an owner. `Custom` carries its allow-list, so the
/// list only exists while the mode is custom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    All,
    Friends,
    Custom(HashSet<UserId>),
    None,
}

impl Audience {
    pub fn mode(&self) -> VisibilityMode {
        match self {
            Audience::All => VisibilityMode::All,
            Audience::Friends => VisibilityMode::Friends,
            Audience::Custom(_) => VisibilityMode::Custom,
            Audience::None => VisibilityMode::None,
        }
    }

    pub fn allow_list(&self) -> Option<&HashSet<UserId>> {
        match self {
            Audience::Custom(allowed) => Some(allowed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilitySettings {
    pub user_id: UserId,
    pub audience: Audience,
    pub accuracy: AccuracyTier,
}

impl VisibilitySettings {
    /// Settings assumed for users who never saved any: friends only, precise.
    pub fn default_for(user_id: UserId) -> Self {
        Self {
            user_id,
            audience: Audience::Friends,
            accuracy: AccuracyTier::Precise,
        }
    }
}

/// Row of `location_visibility_settings`. Mode and tier stay text here and are
/// parsed by the policy, so a malformed row degrades to defaults instead of
/// failing the read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct StoredSettings {
    pub user_id: UserId,
    pub visibility_mode: String,
    pub accuracy_level: String,
    pub updated_at: DateTime<Utc>,
}
