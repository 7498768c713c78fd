//! Reconciliation plan types
//!
//! The plan is the reconciliation engine's verdict for one entry pair: the
//! operation to perform at the destination and, for writes, the exact
//! attribute state to converge to.

use serde::{Deserialize, Serialize};

use crate::entry::{Entry, EntryKey};

/// Operation to apply at the destination for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanOperation {
    /// The entry is new at the destination.
    Create,
    /// The destination entry differs from the resolved target state.
    Update,
    /// The entry no longer exists at the source and the delete gate allows it.
    Delete,
    /// Nothing to do; source and destination already converge.
    None,
}

impl std::fmt::Display for PlanOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanOperation::Create => write!(f, "create"),
            PlanOperation::Update => write!(f, "update"),
            PlanOperation::Delete => write!(f, "delete"),
            PlanOperation::None => write!(f, "none"),
        }
    }
}

/// The computed outcome of reconciling one source/destination entry pair.
///
/// For `Create` and `Update` the plan carries the full resolved attribute
/// set. An attribute mapped to an empty value list instructs the destination
/// to remove that attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationPlan {
    /// Pivot key of the destination entry the plan applies to.
    pub key: EntryKey,
    /// The operation to perform.
    pub operation: PlanOperation,
    /// Resolved target attributes, present for `Create` and `Update`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Entry>,
}

impl ReconciliationPlan {
    /// Plan the creation of a new destination entry.
    pub fn create(key: EntryKey, attributes: Entry) -> Self {
        Self {
            key,
            operation: PlanOperation::Create,
            attributes: Some(attributes),
        }
    }

    /// Plan an update converging the destination to the resolved state.
    pub fn update(key: EntryKey, attributes: Entry) -> Self {
        Self {
            key,
            operation: PlanOperation::Update,
            attributes: Some(attributes),
        }
    }

    /// Plan the deletion of the destination entry.
    pub fn delete(key: EntryKey) -> Self {
        Self {
            key,
            operation: PlanOperation::Delete,
            attributes: None,
        }
    }

    /// Plan no change.
    pub fn none(key: EntryKey) -> Self {
        Self {
            key,
            operation: PlanOperation::None,
            attributes: None,
        }
    }

    /// Whether applying this plan writes to the destination.
    pub fn is_write(&self) -> bool {
        self.operation != PlanOperation::None
    }

    /// Whether this plan leaves the destination untouched.
    pub fn is_none(&self) -> bool {
        self.operation == PlanOperation::None
    }
}
