//! Value transform pipelines.
//!
//! An attribute policy may declare a transform expression applied to each
//! source value before the reconciliation policy. The expression is a pipe
//! of steps, e.g. `trim | lowercase | suffix:@example.com`.
//!
//! Steps: `lowercase`, `uppercase`, `trim`, `prefix:<s>`, `suffix:<s>`,
//! `replace:<from>:<to>`. Unknown steps are rejected at configuration load.

use thiserror::Error;

/// Error raised for an unknown or malformed transform step.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid transform step '{step}': {message}")]
pub struct TransformError {
    pub step: String,
    pub message: String,
}

impl TransformError {
    fn new(step: &str, message: impl Into<String>) -> Self {
        Self {
            step: step.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
enum Step {
    Lowercase,
    Uppercase,
    Trim,
    Prefix(String),
    Suffix(String),
    Replace { from: String, to: String },
}

fn parse(expression: &str) -> Result<Vec<Step>, TransformError> {
    expression
        .split('|')
        .map(str::trim)
        .map(|step| match step {
            "lowercase" => Ok(Step::Lowercase),
            "uppercase" => Ok(Step::Uppercase),
            "trim" => Ok(Step::Trim),
            _ => {
                if let Some(arg) = step.strip_prefix("prefix:") {
                    Ok(Step::Prefix(arg.to_string()))
                } else if let Some(arg) = step.strip_prefix("suffix:") {
                    Ok(Step::Suffix(arg.to_string()))
                } else if let Some(args) = step.strip_prefix("replace:") {
                    let (from, to) = args
                        .split_once(':')
                        .ok_or_else(|| TransformError::new(step, "expected replace:<from>:<to>"))?;
                    if from.is_empty() {
                        return Err(TransformError::new(step, "empty search string"));
                    }
                    Ok(Step::Replace {
                        from: from.to_string(),
                        to: to.to_string(),
                    })
                } else {
                    Err(TransformError::new(step, "unknown step"))
                }
            }
        })
        .collect()
}

/// Check that a transform expression parses, without applying it.
pub fn validate(expression: &str) -> Result<(), TransformError> {
    parse(expression).map(|_| ())
}

/// Apply a transform expression to every value in the list.
pub fn apply(expression: &str, values: Vec<String>) -> Result<Vec<String>, TransformError> {
    let steps = parse(expression)?;
    Ok(values
        .into_iter()
        .map(|mut value| {
            for step in &steps {
                value = match step {
                    Step::Lowercase => value.to_lowercase(),
                    Step::Uppercase => value.to_uppercase(),
                    Step::Trim => value.trim().to_string(),
                    Step::Prefix(p) => format!("{p}{value}"),
                    Step::Suffix(s) => format!("{value}{s}"),
                    Step::Replace { from, to } => value.replace(from.as_str(), to),
                };
            }
            value
        })
        .collect())
}
