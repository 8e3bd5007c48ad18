//! Progress ledger type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable per-actor progress record. Created lazily on the first event and
/// never deleted; `xp_total` only ever grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorProfile {
    /// The authenticated identity owning this record
    pub actor_id: Uuid,
    /// Cumulative experience points
    pub xp_total: u32,
    /// Level name derived from `xp_total`
    pub level_name: String,
    /// Cached XP threshold of the next level (None at the top tier)
    pub next_level_xp: Option<u32>,
    /// Timestamp of the last rewarded event
    pub last_activity_at: Option<DateTime<Utc>>,
    /// When the profile was created
    pub created_at: DateTime<Utc>,
    /// When the profile was last updated
    pub updated_at: DateTime<Utc>,
}

/// Result of one reward application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardOutcome {
    /// XP total after the application
    pub new_xp_total: u32,
    /// Level name after the application
    pub new_level_name: String,
    /// Whether the application crossed a level threshold
    pub leveled_up: bool,
    /// False when the event key was already journaled and nothing changed
    pub applied: bool,
}

/// A one-time achievement grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeGrant {
    pub actor_id: Uuid,
    pub badge_id: String,
    pub granted_at: DateTime<Utc>,
}
