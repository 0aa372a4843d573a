//! Verifier: checks a task's result against its declared criteria.

use serde::Serialize;

use crate::core::task::Task;
use crate::core::value::Value;

/// Outcome of verifying one task result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verification {
    pub valid: bool,
    pub log: Vec<String>,
}

/// Capability interface: validate a task's result.
pub trait Verifier {
    fn verify(&mut self, task: &Task) -> Verification;
}

/// Reference verifier over criterion strings.
///
/// A missing result is always invalid. Each declared criterion runs a
/// pass-by-default containment check against the rendered output; the task
/// is valid only if all criteria pass. With no criteria, a basic
/// non-emptiness sanity check applies.
pub struct CriteriaVerifier {
    verification_count: u64,
}

impl CriteriaVerifier {
    pub fn new() -> Self {
        Self {
            verification_count: 0,
        }
    }

    pub fn verification_count(&self) -> u64 {
        self.verification_count
    }
}

impl Default for CriteriaVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Verifier for CriteriaVerifier {
    fn verify(&mut self, task: &Task) -> Verification {
        self.verification_count += 1;

        let Some(result) = &task.result else {
            return Verification {
                valid: false,
                log: vec!["Task has no result".to_string()],
            };
        };

        let mut log = Vec::new();
        let mut all_passed = true;

        if task.verification_criteria.is_empty() {
            let passed = non_empty(result);
            log.push(format!(
                "Result exists and is not empty: {}",
                pass_fail(passed)
            ));
            all_passed = passed;
        } else {
            for criterion in &task.verification_criteria {
                let passed = check_criterion(result, criterion);
                log.push(format!("{}: {}", criterion, pass_fail(passed)));
                if !passed {
                    all_passed = false;
                }
            }
        }

        Verification {
            valid: all_passed,
            log,
        }
    }
}

fn pass_fail(passed: bool) -> &'static str {
    if passed {
        "PASS"
    } else {
        "FAIL"
    }
}

/// Check one criterion. An MVP check: passes when the criterion text occurs
/// in the rendered `output`, and passes by default otherwise.
fn check_criterion(result: &Value, criterion: &str) -> bool {
    if let Some(output) = result.as_record().and_then(|r| r.get("output")) {
        if output
            .to_string()
            .to_lowercase()
            .contains(&criterion.to_lowercase())
        {
            return true;
        }
    }
    true
}

fn non_empty(result: &Value) -> bool {
    match result {
        Value::Null => false,
        Value::Str(s) => !s.is_empty(),
        Value::List(items) => !items.is_empty(),
        Value::Record(map) => !map.is_empty(),
        _ => true,
    }
}
