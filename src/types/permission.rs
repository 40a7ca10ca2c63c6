use std::fmt;

use serde::{Deserialize, Serialize};

/// Permission level a user holds on an app.
///
/// Exactly one level exists per (app, user) pair. Owner and Admin may mutate
/// the app and its bundles; Member has read-only access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Owner,
    Admin,
    Member,
}

impl PermissionLevel {
    /// Levels allowed to mutate an app or its bundles.
    pub const MUTATING: [PermissionLevel; 2] = [PermissionLevel::Owner, PermissionLevel::Admin];

    /// Every recorded level; used where any access at all suffices.
    pub const ANY: [PermissionLevel; 3] = [
        PermissionLevel::Owner,
        PermissionLevel::Admin,
        PermissionLevel::Member,
    ];

    /// Converts the stored integer representation back to a level.
    #[must_use]
    pub fn from_i64(value: i64) -> Option<PermissionLevel> {
        match value {
            1 => Some(PermissionLevel::Owner),
            2 => Some(PermissionLevel::Admin),
            3 => Some(PermissionLevel::Member),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            PermissionLevel::Owner => "owner",
            PermissionLevel::Admin => "admin",
            PermissionLevel::Member => "member",
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<PermissionLevel> for i64 {
    fn from(level: PermissionLevel) -> Self {
        match level {
            PermissionLevel::Owner => 1,
            PermissionLevel::Admin => 2,
            PermissionLevel::Member => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i64_round_trip() {
        for level in PermissionLevel::ANY {
            assert_eq!(PermissionLevel::from_i64(i64::from(level)), Some(level));
        }
        assert_eq!(PermissionLevel::from_i64(0), None);
        assert_eq!(PermissionLevel::from_i64(99), None);
    }

    #[test]
    fn test_display_is_lowercase() {
        assert_eq!(PermissionLevel::Owner.to_string(), "owner");
        assert_eq!(PermissionLevel::Member.as_str(), "member");
    }

    #[test]
    fn test_mutating_excludes_member() {
        assert!(!PermissionLevel::MUTATING.contains(&PermissionLevel::Member));
    }
}
