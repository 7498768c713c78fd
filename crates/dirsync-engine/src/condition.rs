//! Condition expression evaluation.
//!
//! Conditions gate the create/update/delete operations per entry pair. The
//! language is deliberately small and deterministic:
//!
//! - `true` / `false` literals
//! - `src.<attr>` / `dst.<attr>` — truthy when the attribute holds at least
//!   one non-empty value on that side
//! - `<operand> == <literal>` / `<operand> != <literal>` — compares the
//!   first value of the attribute; literals may be single- or double-quoted
//! - `&&` and `||` combinators, `&&` binding tighter
//!
//! Expressions are parsed once at configuration load (`validate`) and again
//! at evaluation; a malformed expression at evaluation time fails only the
//! entry being reconciled.

use dirsync_connector::Entry;
use thiserror::Error;

/// Error raised for a malformed or unevaluable condition expression.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid condition '{expression}': {message}")]
pub struct ConditionError {
    pub expression: String,
    pub message: String,
}

impl ConditionError {
    fn new(expression: &str, message: impl Into<String>) -> Self {
        Self {
            expression: expression.to_string(),
            message: message.into(),
        }
    }
}

/// Check that an expression parses, without evaluating it.
pub fn validate(expression: &str) -> Result<(), ConditionError> {
    evaluate(expression, None, None).map(|_| ())
}

/// Evaluate a condition against a source/destination entry pair.
///
/// An absent side makes its attribute references evaluate as absent values,
/// not as errors: `dst.uid` is simply falsy while reconciling a create.
pub fn evaluate(
    expression: &str,
    source: Option<&Entry>,
    destination: Option<&Entry>,
) -> Result<bool, ConditionError> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Err(ConditionError::new(expression, "empty expression"));
    }

    // || of && groups; no parentheses. Every term is evaluated even once
    // the result is decided, so a malformed later group never hides behind
    // a true earlier one and `validate` sees the whole expression.
    let mut result = false;
    for group in expression.split("||") {
        let mut all = true;
        for term in group.split("&&") {
            if !evaluate_term(expression, term.trim(), source, destination)? {
                all = false;
            }
        }
        if all {
            result = true;
        }
    }
    Ok(result)
}

fn evaluate_term(
    full: &str,
    term: &str,
    source: Option<&Entry>,
    destination: Option<&Entry>,
) -> Result<bool, ConditionError> {
    if term.is_empty() {
        return Err(ConditionError::new(full, "empty term"));
    }

    if let Some((lhs, rhs)) = term.split_once("!=") {
        let actual = operand_value(full, lhs.trim(), source, destination)?;
        return Ok(actual.as_deref() != Some(literal(rhs.trim())));
    }
    if let Some((lhs, rhs)) = term.split_once("==") {
        let actual = operand_value(full, lhs.trim(), source, destination)?;
        return Ok(actual.as_deref() == Some(literal(rhs.trim())));
    }

    match term {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => {
            // Bare operand: attribute presence.
            let value = operand_value(full, term, source, destination)?;
            Ok(value.is_some_and(|v| !v.is_empty()))
        }
    }
}

/// Resolve `src.<attr>` / `dst.<attr>` to the attribute's first value.
fn operand_value(
    full: &str,
    operand: &str,
    source: Option<&Entry>,
    destination: Option<&Entry>,
) -> Result<Option<String>, ConditionError> {
    let (side, attribute) = operand
        .split_once('.')
        .ok_or_else(|| ConditionError::new(full, format!("expected src.<attr> or dst.<attr>, got '{operand}'")))?;

    if attribute.is_empty() {
        return Err(ConditionError::new(full, "empty attribute reference"));
    }

    let entry = match side {
        "src" => source,
        "dst" => destination,
        _ => {
            return Err(ConditionError::new(
                full,
                format!("unknown scope '{side}' (expected 'src' or 'dst')"),
            ))
        }
    };

    Ok(entry.and_then(|e| e.first(attribute)).map(str::to_string))
}

/// Strip optional single or double quotes from a literal.
fn literal(raw: &str) -> &str {
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(raw)
}
