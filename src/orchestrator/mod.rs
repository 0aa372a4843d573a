//! Meta-orchestrator: recursive task decomposition, execution, verification,
//! and recombination.
//!
//! The orchestrator wires four swappable capabilities (decomposer, executor,
//! verifier, combiner) into one recursive `solve` driver. Sequential,
//! parallel, and hierarchical strategies are AND-combinations with
//! early-abort on the first verification failure; the choice strategy is an
//! ordered OR over alternative sub-plans. Every error raised by a capability
//! is caught here and converted into a failed, unverified report; nothing
//! propagates out of `solve`.

pub mod combine;
pub mod decompose;
pub mod execute;
pub mod plan;
pub mod verify;

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use combine::{Combiner, ConcatCombiner, ResultCombiner};
pub use decompose::{Decomposer, DecompositionRecord, RuleBasedDecomposer};
pub use execute::{Executor, ToolTaskExecutor};
pub use plan::{Plan, PlanDecomposer};
pub use verify::{CriteriaVerifier, Verification, Verifier};

use crate::config::DEFAULT_MAX_DEPTH;
use crate::core::task::{DecompositionResult, Strategy, Task, TaskStatus};
use crate::core::value::{Context, Value};
use crate::guard;
use crate::olog_debug;
use crate::tools::ToolRegistry;

/// Unique identifier for one orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One timestamped message in the orchestrator-owned execution log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Outcome of solving one task (root or nested).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutcome {
    pub result: Option<Value>,
    pub verified: bool,
    pub verification: Option<Verification>,
    pub error: Option<String>,
}

impl TaskOutcome {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            result: None,
            verified: false,
            verification: None,
            error: Some(error.into()),
        }
    }
}

/// Full report returned by `solve`: the outcome, the mutated execution tree,
/// and the complete execution log.
#[derive(Debug, Serialize)]
pub struct SolveReport {
    pub result: Option<Value>,
    pub verified: bool,
    pub execution_tree: Task,
    pub logs: Vec<LogEntry>,
    pub verification: Option<Verification>,
    pub error: Option<String>,
    /// How many atomic executions this orchestrator has performed so far.
    pub atomic_executions: u64,
}

/// The recursive driver.
pub struct Orchestrator {
    decomposer: Box<dyn Decomposer>,
    executor: Box<dyn Executor>,
    verifier: Box<dyn Verifier>,
    combiner: Box<dyn Combiner>,
    max_depth: usize,
    run_id: RunId,
    execution_log: Vec<LogEntry>,
    atomic_executions: u64,
}

impl Orchestrator {
    pub fn new(
        decomposer: Box<dyn Decomposer>,
        executor: Box<dyn Executor>,
        verifier: Box<dyn Verifier>,
        combiner: Box<dyn Combiner>,
    ) -> Self {
        Self {
            decomposer,
            executor,
            verifier,
            combiner,
            max_depth: DEFAULT_MAX_DEPTH,
            run_id: RunId::new(),
            execution_log: Vec::new(),
            atomic_executions: 0,
        }
    }

    /// Orchestrator with the reference capability stack over a registry.
    pub fn with_reference_stack(registry: Arc<ToolRegistry>) -> Self {
        Self::new(
            Box::new(RuleBasedDecomposer::new()),
            Box::new(ToolTaskExecutor::new(registry)),
            Box::new(CriteriaVerifier::new()),
            Box::new(ResultCombiner::new()),
        )
    }

    /// Cap on decomposition depth. Reaching the cap fails closed: the task
    /// is failed rather than decomposed further. Atomic tasks still execute
    /// at any depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn execution_log(&self) -> &[LogEntry] {
        &self.execution_log
    }

    pub fn atomic_executions(&self) -> u64 {
        self.atomic_executions
    }

    /// Solve a task: decompose, execute, verify, recombine.
    pub fn solve(&mut self, task: Task) -> SolveReport {
        let mut task = task;
        self.log(format!(
            "[meta] run {} solving root task {}",
            self.run_id.short(),
            task.id
        ));
        let outcome = self.solve_task(&mut task, 0);
        SolveReport {
            result: outcome.result,
            verified: outcome.verified,
            execution_tree: task,
            logs: self.execution_log.clone(),
            verification: outcome.verification,
            error: outcome.error,
            atomic_executions: self.atomic_executions,
        }
    }

    fn solve_task(&mut self, task: &mut Task, depth: usize) -> TaskOutcome {
        let short_desc: String = task.description.chars().take(60).collect();
        self.log(format!(
            "{}[meta] solving task: {} - {}",
            indent(depth),
            task.id,
            short_desc
        ));

        // Base case: atomic tasks never reach the decomposer.
        if task.is_atomic {
            self.log(format!(
                "{}[meta] task is atomic, executing directly",
                indent(depth)
            ));
            return self.execute_atomic(task, depth);
        }

        if depth >= self.max_depth {
            self.log(format!(
                "{}[meta] maximum decomposition depth {} reached, failing closed",
                indent(depth),
                self.max_depth
            ));
            task.fail();
            return TaskOutcome::failure(format!(
                "Maximum decomposition depth {} exceeded at task {}",
                self.max_depth, task.id
            ));
        }

        let decomposition = match self
            .decomposer
            .decompose(task, depth)
            .and_then(|decomposition| decomposition.validate().map(|_| decomposition))
        {
            Ok(decomposition) => decomposition,
            Err(e) => {
                self.log(format!("{}[meta] error: {}", indent(depth), e));
                task.fail();
                return TaskOutcome::failure(e.to_string());
            }
        };

        if decomposition.strategy == Strategy::Choice && !decomposition.alternatives.is_empty() {
            return self.solve_choice(task, decomposition, depth);
        }

        if decomposition.sub_tasks.is_empty() {
            if task.result.is_some() {
                // Return shortcut: the decomposer produced the result itself.
                self.log(format!(
                    "{}[meta] decomposer pre-populated the result, skipping execution",
                    indent(depth)
                ));
                return self.verify_completed(task, depth);
            }
            self.log(format!(
                "{}[meta] no sub-tasks generated, executing as atomic",
                indent(depth)
            ));
            return self.execute_atomic(task, depth);
        }

        self.log(format!(
            "{}[meta] decomposed into {} sub-tasks",
            indent(depth),
            decomposition.sub_tasks.len()
        ));
        self.log(format!(
            "{}[meta] strategy: {}",
            indent(depth),
            decomposition.strategy
        ));

        task.sub_tasks = decomposition.sub_tasks;
        let total = task.sub_tasks.len();
        let mut context = task.inputs.clone();
        let mut outcomes: Vec<TaskOutcome> = Vec::new();

        for i in 0..total {
            let skipped = {
                let sub = &task.sub_tasks[i];
                !sub.guards.is_empty()
                    && !sub.guards.iter().any(|g| guard::evaluate(g, &context))
            };
            if skipped {
                self.log(format!(
                    "{}[meta] skipping sub-task {} (no guard holds)",
                    indent(depth),
                    task.sub_tasks[i].id
                ));
                continue;
            }

            self.log(format!(
                "{}[meta] solving sub-task {}/{}",
                indent(depth),
                i + 1,
                total
            ));
            task.sub_tasks[i].inputs = resolve_inputs(&task.sub_tasks[i].inputs, &context);
            let outcome = self.solve_task(&mut task.sub_tasks[i], depth + 1);

            // Early termination: a failed sub-task aborts its siblings.
            if !outcome.verified {
                let failed_id = task.sub_tasks[i].id.clone();
                self.log(format!(
                    "{}[meta] sub-task {}/{} failed verification, aborting",
                    indent(depth),
                    i + 1,
                    total
                ));
                return TaskOutcome::failure(format!("Sub-task {failed_id} failed"));
            }

            if let Some(result) = outcome.result.clone() {
                merge_sub_result(&mut context, &task.sub_tasks[i], &result);
            }
            outcomes.push(outcome);
        }

        self.log(format!(
            "{}[meta] recombining {} sub-results",
            indent(depth),
            outcomes.len()
        ));
        let combined =
            match self
                .combiner
                .combine(task, &task.sub_tasks, &outcomes, &decomposition.plan)
            {
                Ok(combined) => combined,
                Err(e) => {
                    self.log(format!("{}[meta] error: {}", indent(depth), e));
                    task.fail();
                    return TaskOutcome::failure(e.to_string());
                }
            };

        task.result = Some(combined);
        self.verify_completed(task, depth)
    }

    /// Ordered-fallback (OR) semantics: try each alternative sub-plan in
    /// list order and accept the first whose combination verifies.
    fn solve_choice(
        &mut self,
        task: &mut Task,
        decomposition: DecompositionResult,
        depth: usize,
    ) -> TaskOutcome {
        let total = decomposition.alternatives.len();
        self.log(format!(
            "{}[meta] choice strategy with {} alternatives",
            indent(depth),
            total
        ));

        'alternatives: for (index, alternative) in decomposition.alternatives.iter().enumerate() {
            self.log(format!(
                "{}[meta] trying alternative {}/{}",
                indent(depth),
                index + 1,
                total
            ));
            let mut alt_tasks = alternative.clone();
            let mut context = task.inputs.clone();
            let mut outcomes: Vec<TaskOutcome> = Vec::new();

            for sub in alt_tasks.iter_mut() {
                sub.inputs = resolve_inputs(&sub.inputs, &context);
                let outcome = self.solve_task(sub, depth + 1);
                if !outcome.verified {
                    self.log(format!(
                        "{}[meta] alternative {} abandoned: sub-task {} failed verification",
                        indent(depth),
                        index + 1,
                        sub.id
                    ));
                    continue 'alternatives;
                }
                if let Some(result) = outcome.result.clone() {
                    merge_sub_result(&mut context, sub, &result);
                }
                outcomes.push(outcome);
            }

            let combined = match self.combiner.combine(
                task,
                &alt_tasks,
                &outcomes,
                &decomposition.plan,
            ) {
                Ok(combined) => combined,
                Err(e) => {
                    self.log(format!(
                        "{}[meta] alternative {} combination failed: {}",
                        indent(depth),
                        index + 1,
                        e
                    ));
                    continue;
                }
            };

            task.result = Some(combined);
            task.status = TaskStatus::Completed;
            let verification = self.verifier.verify(task);
            task.verification_log = verification.log.clone();
            if verification.valid {
                task.mark_verified();
                task.sub_tasks = alt_tasks;
                self.log(format!(
                    "{}[meta] alternative {} verified, accepting",
                    indent(depth),
                    index + 1
                ));
                return TaskOutcome {
                    result: task.result.clone(),
                    verified: true,
                    verification: Some(verification),
                    error: None,
                };
            }
            self.log(format!(
                "{}[meta] alternative {} combined result failed verification",
                indent(depth),
                index + 1
            ));
        }

        self.log(format!(
            "{}[meta] all choice alternatives failed",
            indent(depth)
        ));
        task.result = None;
        task.fail();
        TaskOutcome::failure("All choice alternatives failed")
    }

    /// Execute one atomic task: pending -> executing -> completed/failed,
    /// then verification on success.
    fn execute_atomic(&mut self, task: &mut Task, depth: usize) -> TaskOutcome {
        self.log(format!(
            "{}[exec] executing atomic task: {}",
            indent(depth),
            task.id
        ));
        self.atomic_executions += 1;
        task.start();
        let started = Instant::now();

        match self.executor.execute(task) {
            Ok(result) => {
                task.execution_time = started.elapsed();
                task.complete(result.clone());
                let verification = self.verifier.verify(task);
                task.verification_log = verification.log.clone();
                let verified = verification.valid;
                if verified {
                    task.mark_verified();
                    self.log(format!(
                        "{}[exec] task {} verified successfully",
                        indent(depth),
                        task.id
                    ));
                } else {
                    self.log(format!(
                        "{}[exec] task {} verification failed",
                        indent(depth),
                        task.id
                    ));
                }
                TaskOutcome {
                    result: Some(result),
                    verified,
                    verification: Some(verification),
                    error: None,
                }
            }
            Err(e) => {
                task.execution_time = started.elapsed();
                task.fail();
                self.log(format!(
                    "{}[exec] task {} failed: {}",
                    indent(depth),
                    task.id,
                    e
                ));
                TaskOutcome::failure(e.to_string())
            }
        }
    }

    /// Verify a task whose result is already in place.
    fn verify_completed(&mut self, task: &mut Task, depth: usize) -> TaskOutcome {
        task.status = TaskStatus::Completed;
        let verification = self.verifier.verify(task);
        task.verification_log = verification.log.clone();
        if verification.valid {
            task.mark_verified();
        }
        self.log(format!(
            "{}[meta] task {} completed, verified={}",
            indent(depth),
            task.id,
            verification.valid
        ));
        TaskOutcome {
            result: task.result.clone(),
            verified: verification.valid,
            verification: Some(verification),
            error: None,
        }
    }

    fn log(&mut self, message: String) {
        olog_debug!("{}", message);
        self.execution_log.push(LogEntry {
            timestamp: Utc::now(),
            message,
        });
    }
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

/// Resolve input indirection against a running context: a string value
/// naming a context key is substituted with the resolved value, and a null
/// value whose own key exists in the context is pulled by matching name.
fn resolve_inputs(inputs: &Context, context: &Context) -> Context {
    let mut resolved = Context::new();
    for (key, value) in inputs.iter() {
        match value {
            Value::Str(name) if context.contains(name) => {
                resolved.insert(
                    key.clone(),
                    context.get(name).cloned().unwrap_or(Value::Null),
                );
            }
            Value::Null if context.contains(key) => {
                resolved.insert(key.clone(), context.get(key).cloned().unwrap_or(Value::Null));
            }
            other => resolved.insert(key.clone(), other.clone()),
        }
    }
    resolved
}

/// Merge a verified sub-task's raw result keys plus its declared output
/// mapping (parent key <- child result key) into the running context.
fn merge_sub_result(context: &mut Context, sub_task: &Task, result: &Value) {
    context.merge_value(result);
    if let Some(record) = result.as_record() {
        for (parent_key, child_key) in &sub_task.outputs {
            if let Some(value) = record.get(child_key) {
                context.insert(parent_key.clone(), value.clone());
            }
        }
    }
}
