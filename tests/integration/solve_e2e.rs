//! End-to-end meta-orchestrator tests, including the sorting plan.

use orchid::orchestrator::{CriteriaVerifier, Orchestrator, Plan, ToolTaskExecutor};
use orchid::{Context, TaskStatus, Value};

use crate::fixtures;

fn sorting_orchestrator() -> (Plan, Orchestrator) {
    let plan = Plan::load(fixtures::SORTING_PLAN).unwrap();
    let orchestrator = Orchestrator::new(
        Box::new(plan.decomposer()),
        Box::new(ToolTaskExecutor::new(fixtures::test_registry())),
        Box::new(CriteriaVerifier::new()),
        plan.combiner(),
    );
    (plan, orchestrator)
}

#[test]
fn test_sorting_pair_via_choice() {
    let (plan, mut orchestrator) = sorting_orchestrator();
    let root = plan
        .root_task()
        .with_inputs(Context::from([("numbers", vec![2, 1])]));

    let report = orchestrator.solve(root);

    assert!(report.verified);
    assert_eq!(fixtures::sorted_numbers(&report), Some(vec![1, 2]));
    // The first alternative's single compare settles it.
    assert_eq!(report.atomic_executions, 1);
}

#[test]
fn test_sorting_three_elements_recurses() {
    let (plan, mut orchestrator) = sorting_orchestrator();
    let root = plan
        .root_task()
        .with_inputs(Context::from([("numbers", vec![3, 1, 2])]));

    let report = orchestrator.solve(root);

    assert!(report.verified);
    assert_eq!(fixtures::sorted_numbers(&report), Some(vec![1, 2, 3]));
    // split + compare of the right half + join, at least.
    assert!(report.atomic_executions >= 2);
}

#[test]
fn test_sorting_eight_elements_bounds_atomic_executions() {
    let (plan, mut orchestrator) = sorting_orchestrator();
    let root = plan
        .root_task()
        .with_inputs(Context::from([("numbers", vec![8, 7, 6, 5, 4, 3, 2, 1])]));

    let report = orchestrator.solve(root);

    assert!(report.verified);
    assert_eq!(
        fixtures::sorted_numbers(&report),
        Some(vec![1, 2, 3, 4, 5, 6, 7, 8])
    );
    // Divide-and-conquer bound for n=8.
    assert!(
        report.atomic_executions <= 15,
        "too many atomic executions: {}",
        report.atomic_executions
    );
}

#[test]
fn test_sorting_empty_and_single_lists_return_immediately() {
    let (plan, mut orchestrator) = sorting_orchestrator();
    let root = plan
        .root_task()
        .with_inputs(Context::from([("numbers", Value::List(vec![]))]));
    let report = orchestrator.solve(root);
    assert!(report.verified);
    assert_eq!(fixtures::sorted_numbers(&report), Some(vec![]));
    assert_eq!(report.atomic_executions, 0);

    let (plan, mut orchestrator) = sorting_orchestrator();
    let root = plan
        .root_task()
        .with_inputs(Context::from([("numbers", vec![9])]));
    let report = orchestrator.solve(root);
    assert!(report.verified);
    assert_eq!(fixtures::sorted_numbers(&report), Some(vec![9]));
    assert_eq!(report.atomic_executions, 0);
}

#[test]
fn test_rule_based_conjunction_end_to_end() {
    let mut orchestrator = Orchestrator::with_reference_stack(fixtures::test_registry());
    let root = orchid::Task::new(
        "conj-1",
        "Fetch user data and validate email and check permissions",
    )
    .with_inputs(Context::from([("source", "database")]));

    let report = orchestrator.solve(root);

    assert!(report.verified);
    assert_eq!(report.atomic_executions, 3);

    let tree = &report.execution_tree;
    assert_eq!(tree.sub_tasks.len(), 3);
    assert!(tree
        .sub_tasks
        .iter()
        .all(|st| st.parent_id.as_deref() == Some("conj-1")));
    assert!(tree
        .sub_tasks
        .iter()
        .all(|st| st.status == TaskStatus::Verified));
    assert_eq!(tree.status, TaskStatus::Verified);

    // Chain plan: the parent result is the last segment's placeholder.
    let record = report.result.unwrap();
    assert_eq!(
        record.as_record().unwrap().get("task_id"),
        Some(&Value::from("conj-1.3"))
    );
}

#[test]
fn test_atomic_task_with_reference_stack() {
    let mut orchestrator = Orchestrator::with_reference_stack(fixtures::test_registry());
    let root = orchid::Task::new("atomic-1", "Simple atomic task")
        .atomic()
        .with_inputs(Context::from([("value", 10)]));

    let report = orchestrator.solve(root);

    assert!(report.verified);
    assert_eq!(report.execution_tree.status, TaskStatus::Verified);
    assert!(report.logs.iter().any(|l| l.message.contains("atomic")));
}

#[test]
fn test_solve_report_serializes() {
    let (plan, mut orchestrator) = sorting_orchestrator();
    let root = plan
        .root_task()
        .with_inputs(Context::from([("numbers", vec![2, 1])]));

    let report = orchestrator.solve(root);
    let json = serde_json::to_string(&report).unwrap();

    assert!(json.contains("sorted_numbers"));
    assert!(json.contains("execution_tree"));
    assert!(json.contains("logs"));
}
