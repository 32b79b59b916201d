use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConditionError;

/// Kind of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum ConditionCategory {
    /// The node is invalid.
    #[default]
    Error,
    /// The node is valid but suspicious.
    Warning,
    /// An operation on the node is not allowed.
    Permission,
    /// Informational status.
    Info,
}

impl ConditionCategory {
    pub const ALL: [ConditionCategory; 4] = [Self::Error, Self::Warning, Self::Permission, Self::Info];
}

impl fmt::Display for ConditionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Error => "Error",
            Self::Warning => "Warning",
            Self::Permission => "Permission",
            Self::Info => "Info",
        };
        f.write_str(name)
    }
}

impl FromStr for ConditionCategory {
    type Err = ConditionError;

    /// Parse a category name, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConditionError::invalid_argument(format!("unknown condition category: {s}")))
    }
}

/// Named group of condition types, used to tag types for selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionTypeSet(String);

impl ConditionTypeSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConditionTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConditionTypeSet {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_category() {
        assert_eq!("warning".parse::<ConditionCategory>().unwrap(), ConditionCategory::Warning);
        assert_eq!("Info".parse::<ConditionCategory>().unwrap(), ConditionCategory::Info);
        assert!("fatal".parse::<ConditionCategory>().is_err());
    }

    #[test]
    fn test_category_serializes_by_name() {
        let json = serde_json::to_string(&ConditionCategory::Permission).unwrap();
        assert_eq!(json, "\"Permission\"");
    }
}
