//! Combiner: merges sub-task results into a parent result.

use crate::core::task::{RecombinationPlan, Task};
use crate::core::value::{Context, Value};
use crate::error::{Error, Result};
use crate::orchestrator::TaskOutcome;

/// Capability interface: merge sub-results per the recombination plan.
pub trait Combiner {
    fn combine(
        &mut self,
        task: &Task,
        sub_tasks: &[Task],
        outcomes: &[TaskOutcome],
        plan: &RecombinationPlan,
    ) -> Result<Value>;
}

/// Reference combiner keyed off the recombination plan.
///
/// Chain returns the last sub-result, merge aggregates all of them, and
/// anything else returns the first (usually only) sub-result.
pub struct ResultCombiner {
    combination_count: u64,
}

impl ResultCombiner {
    pub fn new() -> Self {
        Self {
            combination_count: 0,
        }
    }

    pub fn combination_count(&self) -> u64 {
        self.combination_count
    }
}

impl Default for ResultCombiner {
    fn default() -> Self {
        Self::new()
    }
}

impl Combiner for ResultCombiner {
    fn combine(
        &mut self,
        _task: &Task,
        _sub_tasks: &[Task],
        outcomes: &[TaskOutcome],
        plan: &RecombinationPlan,
    ) -> Result<Value> {
        self.combination_count += 1;

        if outcomes.is_empty() {
            return Err(Error::Validation("No sub-results to combine".to_string()));
        }

        match plan {
            RecombinationPlan::Chain => Ok(outcomes[outcomes.len() - 1]
                .result
                .clone()
                .unwrap_or(Value::Null)),
            RecombinationPlan::Merge => {
                let combined_from: Vec<Value> = outcomes
                    .iter()
                    .map(|o| result_key(o, "task_id").unwrap_or_else(|| Value::from("")))
                    .collect();
                let flattened: Vec<Value> = outcomes
                    .iter()
                    .map(|o| result_key(o, "output").unwrap_or_else(|| Value::from("")))
                    .collect();
                let all_verified = outcomes.iter().all(|o| o.verified);
                Ok(Value::from(Context::from([
                    ("combined_from", Value::List(combined_from)),
                    ("outputs", Value::List(flattened)),
                    ("all_verified", Value::Bool(all_verified)),
                ])))
            }
            _ => Ok(outcomes[0].result.clone().unwrap_or(Value::Null)),
        }
    }
}

fn result_key(outcome: &TaskOutcome, key: &str) -> Option<Value> {
    outcome
        .result
        .as_ref()
        .and_then(Value::as_record)
        .and_then(|record| record.get(key))
        .cloned()
}

/// Declarative combiner that searches sub-results for two named lists and
/// concatenates them, preferring any sub-result that already exposes the
/// final desired key.
pub struct ConcatCombiner {
    left_key: Option<String>,
    right_key: Option<String>,
    output_key: String,
    combination_count: u64,
}

impl ConcatCombiner {
    pub fn new(
        left_key: Option<String>,
        right_key: Option<String>,
        output_key: impl Into<String>,
    ) -> Self {
        Self {
            left_key,
            right_key,
            output_key: output_key.into(),
            combination_count: 0,
        }
    }

    pub fn combination_count(&self) -> u64 {
        self.combination_count
    }
}

impl Combiner for ConcatCombiner {
    fn combine(
        &mut self,
        _task: &Task,
        _sub_tasks: &[Task],
        outcomes: &[TaskOutcome],
        _plan: &RecombinationPlan,
    ) -> Result<Value> {
        self.combination_count += 1;

        if outcomes.is_empty() {
            return Err(Error::Validation("No sub-results to combine".to_string()));
        }

        // Prefer the final sub-result that already provides the desired key
        // (e.g. a merge tool producing the full sorted list).
        for outcome in outcomes.iter().rev() {
            if let Some(Value::List(items)) = result_key(outcome, &self.output_key) {
                return Ok(Value::from(Context::from([(
                    self.output_key.clone(),
                    Value::List(items),
                )])));
            }
        }

        let mut left = self
            .left_key
            .as_deref()
            .and_then(|key| find_list_by_key(key, outcomes));
        let mut right = self
            .right_key
            .as_deref()
            .and_then(|key| find_list_by_key(key, outcomes));

        let lists = find_lists(outcomes);
        if left.is_none() {
            for candidate in ["left_sorted", "left"] {
                if let Some((_, items)) = lists.iter().find(|(k, _)| k.as_deref() == Some(candidate))
                {
                    left = Some(items.clone());
                    break;
                }
            }
        }
        if right.is_none() {
            for candidate in ["right_sorted", "right"] {
                if let Some((_, items)) = lists.iter().find(|(k, _)| k.as_deref() == Some(candidate))
                {
                    right = Some(items.clone());
                    break;
                }
            }
        }
        if (left.is_none() || right.is_none()) && lists.len() >= 2 {
            if left.is_none() {
                left = Some(lists[0].1.clone());
            }
            if right.is_none() {
                right = Some(lists[1].1.clone());
            }
        }

        let combined = match (left, right) {
            (Some(mut l), Some(r)) => {
                l.extend(r);
                l
            }
            _ => lists.into_iter().flat_map(|(_, items)| items).collect(),
        };

        Ok(Value::from(Context::from([(
            self.output_key.clone(),
            Value::List(combined),
        )])))
    }
}

fn find_list_by_key(key: &str, outcomes: &[TaskOutcome]) -> Option<Vec<Value>> {
    outcomes.iter().find_map(|outcome| {
        result_key(outcome, key).and_then(|v| v.as_list().cloned())
    })
}

/// All (name, list) pairs exposed by the sub-results, in order.
fn find_lists(outcomes: &[TaskOutcome]) -> Vec<(Option<String>, Vec<Value>)> {
    let mut lists = Vec::new();
    for outcome in outcomes {
        match &outcome.result {
            Some(Value::Record(record)) => {
                for (key, value) in record {
                    if let Value::List(items) = value {
                        lists.push((Some(key.clone()), items.clone()));
                    }
                }
            }
            Some(Value::List(items)) => lists.push((None, items.clone())),
            _ => {}
        }
    }
    lists
}
