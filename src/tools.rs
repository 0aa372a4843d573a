//! Name-indexed tool registry invoked by atomic steps and tool nodes.
//!
//! The registry is an owned instance, not process-global: whoever builds an
//! executor decides which tools exist. Each tool declares its parameter
//! names; `invoke` maps caller-provided context keys onto them, falling back
//! to fuzzy matching (suffix/prefix/underscore-insensitive) when the exact
//! name is absent.

use std::collections::HashMap;

use crate::core::value::{Context, Value};
use crate::error::{Error, Result};

type ToolFn = Box<dyn Fn(&Context) -> Result<Value> + Send + Sync>;

struct Tool {
    params: Vec<String>,
    func: ToolFn,
}

/// Registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Tool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool under `name` with its declared parameter names.
    pub fn register(
        &mut self,
        name: &str,
        params: &[&str],
        func: impl Fn(&Context) -> Result<Value> + Send + Sync + 'static,
    ) {
        self.tools.insert(
            name.to_string(),
            Tool {
                params: params.iter().map(|p| p.to_string()).collect(),
                func: Box::new(func),
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List all registered tool names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Invoke a tool by name, mapping `args` onto its declared parameters.
    ///
    /// Each parameter is filled from the exact-named arg when present,
    /// otherwise from the first fuzzy match. Parameters with no match are
    /// simply absent; the tool decides whether that is an error. A tool that
    /// declares no parameters receives the args unchanged (kwargs-style).
    pub fn invoke(&self, name: &str, args: &Context) -> Result<Value> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| Error::ToolNotFound(name.to_string()))?;

        if tool.params.is_empty() {
            return (tool.func)(args);
        }

        let mut call = Context::new();
        for param in &tool.params {
            if let Some(value) = args.get(param) {
                call.insert(param.clone(), value.clone());
            } else if let Some((_, value)) = fuzzy_lookup(args, param) {
                call.insert(param.clone(), value.clone());
            }
        }
        (tool.func)(&call)
    }

    /// Registry pre-loaded with the reference tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register("orders.get", &["order_id", "customer_id"], |args| {
            let order_id = require("orders.get", args, "order_id")?.clone();
            let customer_id = require("orders.get", args, "customer_id")?.clone();
            let order = Context::from([("id", order_id), ("status", Value::from("completed"))]);
            let account = Context::from([
                ("id", customer_id),
                ("email", Value::from("customer@example.com")),
            ]);
            Ok(Value::from(Context::from([
                ("order", Value::from(order)),
                ("account", Value::from(account)),
            ])))
        });

        registry.register(
            "payments.refund",
            &["order", "payment_method", "price"],
            |args| {
                let order = require("payments.refund", args, "order")?;
                let order_id = order
                    .as_record()
                    .and_then(|r| r.get("id"))
                    .cloned()
                    .unwrap_or(Value::Null);
                let receipt = Context::from([
                    ("status", Value::from("ok")),
                    (
                        "amount",
                        require("payments.refund", args, "price")?.clone(),
                    ),
                    (
                        "method",
                        require("payments.refund", args, "payment_method")?.clone(),
                    ),
                    ("order_id", order_id),
                ]);
                Ok(Value::from(Context::from([(
                    "refund_receipt",
                    Value::from(receipt),
                )])))
            },
        );

        registry.register(
            "notifications.email",
            &["email", "refund_receipt", "template"],
            |args| {
                let receipt = require("notifications.email", args, "refund_receipt")?;
                let order_id = receipt
                    .as_record()
                    .and_then(|r| r.get("order_id"))
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                Ok(Value::from(Context::from([(
                    "email_id",
                    Value::from(format!("email-{order_id}")),
                )])))
            },
        );

        registry.register(
            "audit.write",
            &["order_id", "refund_receipt", "email_id"],
            |args| {
                let order_id = require("audit.write", args, "order_id")?;
                Ok(Value::from(Context::from([(
                    "audit_id",
                    Value::from(format!("audit-{order_id}")),
                )])))
            },
        );

        registry.register("list.split", &["numbers"], |args| {
            let numbers = require_list("list.split", args, "numbers")?;
            let mid = numbers.len() / 2;
            let (left, right) = numbers.split_at(mid);
            Ok(Value::from(Context::from([
                ("left", Value::List(left.to_vec())),
                ("right", Value::List(right.to_vec())),
            ])))
        });

        registry.register("list.compare", &["numbers"], |args| {
            let mut numbers = require_list("list.compare", args, "numbers")?.clone();
            numbers.sort_by(compare_numeric);
            Ok(Value::from(Context::from([(
                "sorted_numbers",
                Value::List(numbers),
            )])))
        });

        registry.register("list.join", &["left", "right"], |args| {
            let left = require_list("list.join", args, "left")?;
            let right = require_list("list.join", args, "right")?;
            Ok(Value::from(Context::from([(
                "sorted_numbers",
                Value::List(merge_sorted(left, right)),
            )])))
        });

        registry
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list())
            .finish()
    }
}

fn require<'a>(tool: &str, args: &'a Context, param: &str) -> Result<&'a Value> {
    args.get(param).ok_or_else(|| Error::MissingParameter {
        tool: tool.to_string(),
        param: param.to_string(),
    })
}

fn require_list<'a>(tool: &str, args: &'a Context, param: &str) -> Result<&'a Vec<Value>> {
    require(tool, args, param)?
        .as_list()
        .ok_or_else(|| Error::Validation(format!("{tool}: parameter '{param}' must be a list")))
}

/// Find the first context entry that fuzzily matches a parameter name.
fn fuzzy_lookup<'a>(args: &'a Context, param: &str) -> Option<(&'a String, &'a Value)> {
    args.iter().find(|(key, _)| {
        key.ends_with(param) || param.ends_with(key.as_str()) || normalize(key) == normalize(param)
    })
}

fn normalize(name: &str) -> String {
    name.to_lowercase().replace('_', "")
}

fn compare_numeric(a: &Value, b: &Value) -> std::cmp::Ordering {
    let x = a.as_f64().unwrap_or(0.0);
    let y = b.as_f64().unwrap_or(0.0);
    x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal)
}

/// Merge two ascending lists into one ascending list.
fn merge_sorted(left: &[Value], right: &[Value]) -> Vec<Value> {
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        if compare_numeric(&left[i], &right[j]) != std::cmp::Ordering::Greater {
            merged.push(left[i].clone());
            i += 1;
        } else {
            merged.push(right[j].clone());
            j += 1;
        }
    }
    merged.extend_from_slice(&left[i..]);
    merged.extend_from_slice(&right[j..]);
    merged
}
