//! Per-attribute reconciliation policy model.
//!
//! A task declares a default policy plus optional per-attribute overrides;
//! together with the conditions they form the [`SyncOptions`] the
//! reconciliation engine evaluates for every entry pair.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// How the resolved value of an attribute is computed from the source and
/// destination values.
///
/// `Keep` and `Default` behave identically; both names are preserved so
/// existing task configurations keep working unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Policy {
    /// The source always wins, even when its value is empty (an empty
    /// source value removes the attribute at the destination).
    Force,
    /// Union of both sides; a destination value is never dropped.
    Merge,
    /// The destination wins once it holds a value; otherwise the source
    /// value is taken (behaves like `Force` on first creation).
    Keep,
    /// Alias of `Keep`, kept as a distinct configuration name.
    Default,
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Policy::Force => write!(f, "FORCE"),
            Policy::Merge => write!(f, "MERGE"),
            Policy::Keep => write!(f, "KEEP"),
            Policy::Default => write!(f, "DEFAULT"),
        }
    }
}

impl std::str::FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FORCE" => Ok(Policy::Force),
            "MERGE" => Ok(Policy::Merge),
            "KEEP" => Ok(Policy::Keep),
            "DEFAULT" => Ok(Policy::Default),
            _ => Err(format!("unknown policy kind: {s}")),
        }
    }
}

/// Per-attribute override of the task-wide defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributePolicy {
    /// Policy for this attribute; falls back to the task default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<Policy>,

    /// Delimiter used to split a flattened source value for this attribute;
    /// falls back to the task default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,

    /// Value-transform pipeline applied to each source value before the
    /// policy (see the `transform` module for the step syntax).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
}

/// Boolean gates controlling which operations a task may perform.
///
/// An absent `create` or `update` condition means "always"; an absent
/// `delete` condition means "never" — destructive actions require explicit
/// opt-in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conditions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<String>,
    /// Optional gate on pivot changes; evaluated the same way but reserved
    /// for services that support renaming entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_id: Option<String>,
}

/// The complete reconciliation policy for one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Policy applied to attributes without an explicit override.
    #[serde(default = "default_policy")]
    pub default_policy: Policy,

    /// Delimiter used to split flattened source values.
    #[serde(default = "default_delimiter")]
    pub default_delimiter: String,

    /// Operation gates.
    #[serde(default)]
    pub conditions: Conditions,

    /// Per-attribute overrides, keyed by attribute name.
    #[serde(default)]
    pub attributes: HashMap<String, AttributePolicy>,
}

fn default_policy() -> Policy {
    Policy::Force
}

fn default_delimiter() -> String {
    ";".to_string()
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            default_policy: default_policy(),
            default_delimiter: default_delimiter(),
            conditions: Conditions::default(),
            attributes: HashMap::new(),
        }
    }
}

impl SyncOptions {
    /// The policy in effect for an attribute.
    pub fn effective_policy(&self, attribute: &str) -> Policy {
        self.attributes
            .get(attribute)
            .and_then(|p| p.policy)
            .unwrap_or(self.default_policy)
    }

    /// The delimiter in effect for an attribute.
    pub fn effective_delimiter(&self, attribute: &str) -> &str {
        self.attributes
            .get(attribute)
            .and_then(|p| p.delimiter.as_deref())
            .unwrap_or(&self.default_delimiter)
    }

    /// The transform pipeline declared for an attribute, if any.
    pub fn transform_for(&self, attribute: &str) -> Option<&str> {
        self.attributes
            .get(attribute)
            .and_then(|p| p.transform.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parse_and_display() {
        assert_eq!("FORCE".parse::<Policy>().unwrap(), Policy::Force);
        assert_eq!("merge".parse::<Policy>().unwrap(), Policy::Merge);
        assert_eq!(Policy::Keep.to_string(), "KEEP");
        assert_eq!(Policy::Default.to_string(), "DEFAULT");
        assert!("UPSERT".parse::<Policy>().is_err());
    }

    #[test]
    fn test_sync_options_defaults() {
        let options: SyncOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.default_policy, Policy::Force);
        assert_eq!(options.default_delimiter, ";");
        assert!(options.conditions.delete.is_none());
    }

    #[test]
    fn test_effective_policy_override() {
        let json = r#"{
            "default_policy": "MERGE",
            "attributes": {
                "mail": { "policy": "FORCE", "delimiter": "," }
            }
        }"#;
        let options: SyncOptions = serde_json::from_str(json).unwrap();

        assert_eq!(options.effective_policy("mail"), Policy::Force);
        assert_eq!(options.effective_policy("cn"), Policy::Merge);
        assert_eq!(options.effective_delimiter("mail"), ",");
        assert_eq!(options.effective_delimiter("cn"), ";");
    }

    #[test]
    fn test_unknown_policy_kind_rejected_at_parse() {
        let json = r#"{ "default_policy": "OVERWRITE" }"#;
        assert!(serde_json::from_str::<SyncOptions>(json).is_err());
    }
}
