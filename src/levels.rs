//! Level ladder and XP-to-level resolution.
//!
//! Pure lookup over an ordered threshold table; storage seeds the default
//! ladder and [`crate::storage::Database::level_table`] loads it back.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One named tier of the level ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelThreshold {
    /// Display name of the tier
    pub name: String,
    /// Minimum cumulative XP required to hold this tier
    pub min_xp: u32,
}

/// Ordered level ladder. Invariant: non-empty, strictly increasing `min_xp`,
/// first entry at zero XP so every non-negative total resolves.
#[derive(Debug, Clone)]
pub struct LevelTable {
    tiers: Vec<LevelThreshold>,
}

/// Level table validation errors.
#[derive(Debug, Error)]
pub enum LevelTableError {
    #[error("level table is empty")]
    Empty,

    #[error("level table has no zero-XP floor entry (first min_xp = {0})")]
    MissingFloor(u32),

    #[error("level table thresholds not strictly increasing at '{0}'")]
    NotIncreasing(String),
}

impl LevelTable {
    /// Build a validated table from tiers sorted by `min_xp`.
    pub fn new(tiers: Vec<LevelThreshold>) -> Result<Self, LevelTableError> {
        let first = tiers.first().ok_or(LevelTableError::Empty)?;
        if first.min_xp != 0 {
            return Err(LevelTableError::MissingFloor(first.min_xp));
        }

        for pair in tiers.windows(2) {
            if pair[1].min_xp <= pair[0].min_xp {
                return Err(LevelTableError::NotIncreasing(pair[1].name.clone()));
            }
        }

        Ok(Self { tiers })
    }

    /// The tier with the greatest `min_xp <= xp_total`.
    pub fn resolve(&self, xp_total: u32) -> &LevelThreshold {
        let idx = self
            .tiers
            .partition_point(|tier| tier.min_xp <= xp_total)
            .saturating_sub(1);
        &self.tiers[idx]
    }

    /// The next tier above `xp_total`, if the ladder is not topped out.
    pub fn next_tier(&self, xp_total: u32) -> Option<&LevelThreshold> {
        let idx = self.tiers.partition_point(|tier| tier.min_xp <= xp_total);
        self.tiers.get(idx)
    }

    /// XP required for the next tier (cached on the profile for display).
    pub fn next_level_xp(&self, xp_total: u32) -> Option<u32> {
        self.next_tier(xp_total).map(|tier| tier.min_xp)
    }

    /// All tiers in ascending order.
    pub fn tiers(&self) -> &[LevelThreshold] {
        &self.tiers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder() -> LevelTable {
        LevelTable::new(vec![
            LevelThreshold { name: "Aprendiz".into(), min_xp: 0 },
            LevelThreshold { name: "Intermediario".into(), min_xp: 100 },
            LevelThreshold { name: "Especialista".into(), min_xp: 200 },
            LevelThreshold { name: "Mestre".into(), min_xp: 500 },
            LevelThreshold { name: "Doutor".into(), min_xp: 1000 },
        ])
        .unwrap()
    }

    #[test]
    fn test_resolve_between_thresholds() {
        let table = ladder();
        assert_eq!(table.resolve(150).name, "Intermediario");
    }

    #[test]
    fn test_resolve_exact_threshold() {
        let table = ladder();
        assert_eq!(table.resolve(0).name, "Aprendiz");
        assert_eq!(table.resolve(200).name, "Especialista");
        assert_eq!(table.resolve(1000).name, "Doutor");
    }

    #[test]
    fn test_resolve_above_top() {
        let table = ladder();
        assert_eq!(table.resolve(50_000).name, "Doutor");
        assert_eq!(table.next_level_xp(50_000), None);
    }

    #[test]
    fn test_next_level_xp() {
        let table = ladder();
        assert_eq!(table.next_level_xp(0), Some(100));
        assert_eq!(table.next_level_xp(150), Some(200));
        assert_eq!(table.next_level_xp(999), Some(1000));
    }

    #[test]
    fn test_rejects_missing_floor() {
        let result = LevelTable::new(vec![LevelThreshold {
            name: "Aprendiz".into(),
            min_xp: 10,
        }]);
        assert!(matches!(result, Err(LevelTableError::MissingFloor(10))));
    }

    #[test]
    fn test_rejects_non_increasing() {
        let result = LevelTable::new(vec![
            LevelThreshold { name: "A".into(), min_xp: 0 },
            LevelThreshold { name: "B".into(), min_xp: 100 },
            LevelThreshold { name: "C".into(), min_xp: 100 },
        ]);
        assert!(matches!(result, Err(LevelTableError::NotIncreasing(_))));
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(
            LevelTable::new(Vec::new()),
            Err(LevelTableError::Empty)
        ));
    }
}
