//! Shared fixtures for integration tests.

use std::sync::Arc;

use orchid::orchestrator::SolveReport;
use orchid::{Context, ToolRegistry, Value};

/// The demo plan and workflow files shipped with the crate.
pub const SORTING_PLAN: &str = include_str!("../../workflows/sorting.yaml");
pub const ORDER_REFUND_WORKFLOW: &str = include_str!("../../workflows/order_refund.yaml");

/// Builtins plus the arithmetic test tools.
pub fn test_registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::with_builtins();

    // kwargs-style: no declared parameters, first arg wins.
    registry.register("test.double", &[], |args| {
        let n = args
            .iter()
            .next()
            .and_then(|(_, v)| v.as_i64())
            .unwrap_or(0);
        Ok(Value::from(Context::from([("result", n * 2)])))
    });

    registry.register("test.add", &["a", "b"], |args| {
        let a = args.get("a").and_then(Value::as_f64).unwrap_or(0.0);
        let b = args.get("b").and_then(Value::as_f64).unwrap_or(0.0);
        Ok(Value::from(Context::from([("sum", Value::Float(a + b))])))
    });

    registry.register("test.validate", &["value"], |args| {
        let n = args.get("value").and_then(Value::as_i64).unwrap_or(0);
        Ok(Value::from(Context::from([
            ("is_valid", Value::Bool(n > 0)),
            ("value", Value::Int(n)),
        ])))
    });

    Arc::new(registry)
}

/// Pull the sorted list out of a solve report, wherever it landed.
pub fn sorted_numbers(report: &SolveReport) -> Option<Vec<i64>> {
    let from_value = |value: &Value| {
        value
            .as_record()?
            .get("sorted_numbers")?
            .as_list()
            .map(|items| items.iter().filter_map(Value::as_i64).collect())
    };

    report
        .result
        .as_ref()
        .and_then(from_value)
        .or_else(|| report.execution_tree.result.as_ref().and_then(from_value))
}
