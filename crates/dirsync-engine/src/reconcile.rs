//! Reconciliation engine.
//!
//! Pure decision logic: given the source and destination views of one entry
//! and the task's policy set, compute the [`ReconciliationPlan`] converging
//! the destination. No I/O happens here; the orchestrator fetches the pair
//! and applies the verdict. Safe for concurrent calls on the same options.

use std::collections::HashSet;

use dirsync_connector::{CustomLogic, Entry, EntryKey, ReconciliationPlan};
use thiserror::Error;

use crate::condition::{self, ConditionError};
use crate::policy::{Policy, SyncOptions};
use crate::transform::{self, TransformError};

/// Failure reconciling one entry pair. Fails that entry only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    /// A condition expression could not be evaluated.
    #[error(transparent)]
    Condition(#[from] ConditionError),

    /// A transform pipeline failed for an attribute.
    #[error("transform of attribute '{attribute}' failed")]
    Transform {
        attribute: String,
        #[source]
        source: TransformError,
    },
}

/// Inputs shared by every reconciliation within one task pass.
#[derive(Clone, Copy)]
pub struct ReconcileContext<'a> {
    pub options: &'a SyncOptions,
    pub custom_logic: Option<&'a dyn CustomLogic>,
}

impl<'a> ReconcileContext<'a> {
    pub fn new(options: &'a SyncOptions) -> Self {
        Self {
            options,
            custom_logic: None,
        }
    }

    #[must_use]
    pub fn with_custom_logic(mut self, custom_logic: &'a dyn CustomLogic) -> Self {
        self.custom_logic = Some(custom_logic);
        self
    }
}

/// Compute the plan for one source/destination entry pair.
pub fn reconcile(
    source: Option<&Entry>,
    destination: Option<&Entry>,
    key: EntryKey,
    ctx: ReconcileContext<'_>,
) -> Result<ReconciliationPlan, ReconcileError> {
    let conditions = &ctx.options.conditions;
    match (source, destination) {
        (None, None) => Ok(ReconciliationPlan::none(key)),

        // Gone at the source. Deletion is opt-in: an absent delete
        // condition means never.
        (None, Some(dst)) => {
            let allowed = match conditions.delete.as_deref() {
                Some(expression) => condition::evaluate(expression, None, Some(dst))?,
                None => false,
            };
            if allowed {
                Ok(ReconciliationPlan::delete(key))
            } else {
                Ok(ReconciliationPlan::none(key))
            }
        }

        // New at the destination.
        (Some(src), None) => {
            let allowed = match conditions.create.as_deref() {
                Some(expression) => condition::evaluate(expression, Some(src), None)?,
                None => true,
            };
            if !allowed {
                return Ok(ReconciliationPlan::none(key));
            }
            let mut target = resolve_target(src, None, ctx)?;
            // Removals are meaningless on a create.
            let empty: Vec<String> = target
                .names()
                .filter(|n| !target.has(n))
                .map(str::to_string)
                .collect();
            for name in empty {
                target.remove(&name);
            }
            Ok(ReconciliationPlan::create(key, target))
        }

        // Present on both sides.
        (Some(src), Some(dst)) => {
            let allowed = match conditions.update.as_deref() {
                Some(expression) => condition::evaluate(expression, Some(src), Some(dst))?,
                None => true,
            };
            if !allowed {
                return Ok(ReconciliationPlan::none(key));
            }
            let target = resolve_target(src, Some(dst), ctx)?;
            if differs(&target, dst) {
                Ok(ReconciliationPlan::update(key, target))
            } else {
                Ok(ReconciliationPlan::none(key))
            }
        }
    }
}

/// Resolve the target attribute state for a source entry.
///
/// Covers every attribute the source carries (after the custom-logic
/// overlay) plus every attribute with an explicit policy override, so a
/// MERGE or KEEP declaration still applies when the source drops the
/// attribute entirely.
fn resolve_target(
    source: &Entry,
    destination: Option<&Entry>,
    ctx: ReconcileContext<'_>,
) -> Result<Entry, ReconcileError> {
    let mut names: HashSet<&str> = source.names().collect();
    names.extend(ctx.options.attributes.keys().map(String::as_str));

    let mut target = Entry::new();
    for name in names {
        let values = resolve_values(name, source, ctx)?;
        let resolved = apply_policy(
            ctx.options.effective_policy(name),
            values,
            destination.and_then(|d| d.get(name)),
        );
        target.set(name, resolved);
    }
    Ok(target)
}

/// Source-side value list for one attribute: custom logic overlay, then
/// delimiter splitting, then the transform pipeline.
fn resolve_values(
    name: &str,
    source: &Entry,
    ctx: ReconcileContext<'_>,
) -> Result<Vec<String>, ReconcileError> {
    let computed = ctx
        .custom_logic
        .and_then(|logic| logic.compute_attribute(name, source));
    let mut values = match computed {
        Some(values) => values,
        None => source.get(name).map(<[String]>::to_vec).unwrap_or_default(),
    };

    let delimiter = ctx.options.effective_delimiter(name);
    if values.len() == 1 && values[0].contains(delimiter) {
        values = values[0]
            .split(delimiter)
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
    }

    if let Some(expression) = ctx.options.transform_for(name) {
        values = transform::apply(expression, values).map_err(|source| {
            ReconcileError::Transform {
                attribute: name.to_string(),
                source,
            }
        })?;
    }
    Ok(values)
}

/// Combine the source-side values with the destination's under a policy.
fn apply_policy(
    policy: Policy,
    source_values: Vec<String>,
    destination_values: Option<&[String]>,
) -> Vec<String> {
    match policy {
        // Source always wins; an empty list removes the attribute.
        Policy::Force => source_values,

        // Union keeping destination order; never drops a destination value.
        Policy::Merge => {
            let mut merged: Vec<String> = destination_values.map(<[String]>::to_vec).unwrap_or_default();
            for value in source_values {
                if !merged.contains(&value) {
                    merged.push(value);
                }
            }
            merged
        }

        // Destination wins once it holds anything.
        Policy::Keep | Policy::Default => match destination_values {
            Some(values) if !values.is_empty() => values.to_vec(),
            _ => source_values,
        },
    }
}

/// Whether the target state differs from the destination entry.
///
/// Only the managed attributes (those the target resolves) are compared; a
/// destination-only attribute the source never supplies, such as an
/// operational attribute, is left alone and never forces an update. Values
/// compare as unordered multisets and an empty list is equivalent to an
/// absent attribute, so a converged pair always reconciles to no-op.
fn differs(target: &Entry, destination: &Entry) -> bool {
    target.names().any(|name| {
        let mut left: Vec<&str> = target
            .get(name)
            .map(|v| v.iter().map(String::as_str).collect())
            .unwrap_or_default();
        let mut right: Vec<&str> = destination
            .get(name)
            .map(|v| v.iter().map(String::as_str).collect())
            .unwrap_or_default();
        left.sort_unstable();
        right.sort_unstable();
        left != right
    })
}
