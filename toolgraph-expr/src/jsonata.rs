//! The JSONata-like sublanguage: a thin wrapper over `jsonata-rs` that adds
//! four history-access functions, bound fresh for every evaluation.

use crate::history::HistoryView;
use bumpalo::Bump;
use jsonata_rs::JsonAta;
use serde_json::Value;
use std::rc::Rc;
use toolgraph_types::ExpressionError;
use toolgraph_types::NodeId;

/// Evaluates one JSONata-like expression against a context, with the four
/// history-access functions bound for the duration of the call.
///
/// A fresh arena and a fresh `JsonAta` instance are created per call, and
/// the four history functions are registered as closures that each hold
/// their own clone of `history` — this is what "registered fresh for every
/// evaluation, via closures over (history, current-execution-index)" means
/// in practice: no global or thread-local registration, no state that
/// outlives this call.
///
/// `history` is an `Rc` rather than a plain reference because the
/// underlying `jsonata-rs` function registration requires owned, callable
/// closures; the engine evaluates expressions on a single logical thread
/// per invocation, so `Rc` (not `Arc`) is the right fit.
pub fn evaluate(
    node: &NodeId,
    expr: &str,
    context: &Value,
    history: Rc<dyn HistoryView>,
    current_index: u64,
) -> Result<Value, ExpressionError> {
    let arena = Bump::new();
    let mut jsonata = JsonAta::new(expr, &arena).map_err(|e| ExpressionError {
        node: node.clone(),
        message: format!("syntax error: {e}"),
    })?;

    register_history_functions(&mut jsonata, history, current_index);

    let context_str = serde_json::to_string(context).map_err(|e| ExpressionError {
        node: node.clone(),
        message: format!("context not representable as JSON: {e}"),
    })?;

    let result = jsonata
        .evaluate(Some(&context_str), None)
        .map_err(|e| ExpressionError { node: node.clone(), message: e.to_string() })?;

    let result_str = result.serialize(false);
    serde_json::from_str(&result_str).map_err(|e| ExpressionError {
        node: node.clone(),
        message: format!("result not valid JSON: {e}"),
    })
}

/// Parses `expr` with no history bound, to validate JSONata syntax ahead
/// of execution (spec §4.A static validation).
pub fn check_syntax(expr: &str) -> Result<(), String> {
    let arena = Bump::new();
    JsonAta::new(expr, &arena).map(|_| ()).map_err(|e| e.to_string())
}

fn register_history_functions(
    jsonata: &mut JsonAta<'_>,
    history: Rc<dyn HistoryView>,
    current_index: u64,
) {
    let h = Rc::clone(&history);
    jsonata.register_function("previousNode", 1, move |_ctx, args| {
        let offset = args.first().and_then(|v| v.as_u64()).unwrap_or(1);
        match h.previous_output(current_index, offset) {
            Some(v) => jsonata_rs::json_to_value(&v),
            None => jsonata_rs::Value::Null,
        }
    });

    let h = Rc::clone(&history);
    jsonata.register_function("executionCount", 1, move |_ctx, args| {
        let name = args.first().and_then(|v| v.as_str()).unwrap_or_default();
        jsonata_rs::Value::from(h.execution_count(name))
    });

    let h = Rc::clone(&history);
    jsonata.register_function("nodeExecution", 2, move |_ctx, args| {
        let name = args.first().and_then(|v| v.as_str()).unwrap_or_default();
        let index = args.get(1).and_then(|v| v.as_i64()).unwrap_or(0);
        match h.nth_execution(name, index) {
            Some(v) => jsonata_rs::json_to_value(&v),
            None => jsonata_rs::Value::Null,
        }
    });

    jsonata.register_function("nodeExecutions", 1, move |_ctx, args| {
        let name = args.first().and_then(|v| v.as_str()).unwrap_or_default();
        let outputs = history.all_executions(name);
        jsonata_rs::Value::Array(outputs.iter().map(jsonata_rs::json_to_value).collect())
    });
}
