//! Integration tests for model text → tool call → execution → formatted result.

mod common;

use common::{CallCounter, assistant_registry, load_model_output};
use orbit_core::{ExecutorConfig, ToolExecutor, format_tool_result};
use orbit_types::{FormattedToolOutput, ToolResult};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

fn executor() -> (ToolExecutor, CallCounter) {
    let calls = CallCounter::default();
    (ToolExecutor::new(assistant_registry(calls.clone())), calls)
}

#[test]
fn test_parser_knows_registered_tools() {
    let (executor, _) = executor();
    let known: Vec<_> = executor.parser().known_tools().collect();
    assert_eq!(
        known,
        vec!["browser_open", "capture_screen", "memory_store", "web_search"]
    );
}

#[test]
fn test_fenced_call_parses() {
    let (executor, _) = executor();
    let call = executor
        .parser()
        .parse(&load_model_output("fenced_call"))
        .expect("tool call");
    assert_eq!(call.tool, "web_search");
    assert_eq!(json!(call.args), json!({"q": "high tide brighton"}));
    assert!(call.is_valid());
}

#[test]
fn test_truncated_call_recovers() {
    let (executor, _) = executor();
    let call = executor
        .parser()
        .parse(&load_model_output("truncated_call"))
        .expect("auto-closed tool call");
    assert_eq!(call.tool, "memory_store");
    assert_eq!(
        json!(call.args),
        json!({"text": "likes {curly} braces", "tags": ["prefs", "style"]})
    );
}

#[test]
fn test_unrelated_json_is_skipped() {
    let (executor, _) = executor();
    let call = executor
        .parser()
        .parse(&load_model_output("unrelated_json"))
        .expect("tool call after unrelated json");
    assert_eq!(call.tool, "capture_screen");
    assert_eq!(json!(call.args), json!({"display": 1}));
}

#[tokio::test]
async fn test_end_to_end_search() {
    let (executor, calls) = executor();
    let invocation = executor
        .run_from_text(&load_model_output("fenced_call"), None)
        .await
        .unwrap();

    assert_eq!(calls.count(), 1);
    assert_eq!(
        invocation.output,
        FormattedToolOutput::Text("[web_search result]\nTop result for high tide brighton: tides.example".into())
    );
}

#[tokio::test]
async fn test_end_to_end_vision() {
    let (executor, _) = executor();
    let invocation = executor
        .run_from_text(&load_model_output("unrelated_json"), None)
        .await
        .unwrap();

    assert_eq!(
        invocation.output.image_data_url(),
        Some("data:image/png;base64,iVBORw0KGgo=")
    );
    assert_eq!(invocation.output.text(), "[capture_screen result]\nCaptured display");

    let wire = serde_json::to_value(&invocation.output).unwrap();
    assert_eq!(
        wire,
        json!({
            "text": "[capture_screen result]\nCaptured display",
            "imageDataUrl": "data:image/png;base64,iVBORw0KGgo="
        })
    );
}

#[tokio::test]
async fn test_unknown_tool_is_reported_back() {
    let (executor, calls) = executor();
    let invocation = executor
        .run_from_text(&load_model_output("unknown_tool"), None)
        .await
        .unwrap();

    assert!(!invocation.call.is_valid());
    assert_eq!(calls.count(), 0);
    assert_eq!(
        invocation.output.text(),
        "order_pizza failed: Unknown tool \"order_pizza\". Available tools: browser_open, capture_screen, memory_store, web_search"
    );
}

#[tokio::test]
async fn test_execute_unknown_tool_directly() {
    let (executor, calls) = executor();
    let result = executor
        .execute("unknown_tool", serde_json::Map::new(), None)
        .await;
    assert_eq!(result, ToolResult::failure("Unknown tool: unknown_tool"));
    assert_eq!(calls.count(), 0);
}

#[tokio::test]
async fn test_missing_required_argument() {
    let (executor, calls) = executor();
    let invocation = executor
        .run_from_text(r#"{"tool":"web_search","args":{}}"#, None)
        .await
        .unwrap();
    assert_eq!(calls.count(), 0);
    assert_eq!(
        invocation.output.text(),
        "web_search failed: Invalid arguments for web_search: missing required argument 'q'"
    );
}

#[tokio::test(start_paused = true)]
async fn test_browser_tool_gets_long_timeout() {
    let (executor, _) = executor();
    let started = tokio::time::Instant::now();
    let invocation = executor
        .run_from_text(r#"{"tool":"browser_open","args":{"url":"https://example.com"}}"#, None)
        .await
        .unwrap();

    assert_eq!(started.elapsed(), Duration::from_secs(60));
    assert_eq!(
        invocation.output.text(),
        "browser_open failed: browser_open timed out after 60000 ms"
    );
}

#[tokio::test(start_paused = true)]
async fn test_timeout_override_applies_to_parsed_call() {
    let (executor, _) = executor();
    let started = tokio::time::Instant::now();
    let invocation = executor
        .run_from_text(
            r#"Opening it now. {"tool":"browser_open","args":{"url":"https://example.com"}}"#,
            Some(Duration::from_millis(750)),
        )
        .await
        .unwrap();

    assert_eq!(started.elapsed(), Duration::from_millis(750));
    assert_eq!(
        invocation.output.text(),
        "browser_open failed: browser_open timed out after 750 ms"
    );
}

#[tokio::test(start_paused = true)]
async fn test_configured_timeouts() {
    let calls = CallCounter::default();
    let config = ExecutorConfig {
        browser_timeout_ms: 2_500,
        ..ExecutorConfig::default()
    };
    let executor = ToolExecutor::with_config(assistant_registry(calls), config);

    let started = tokio::time::Instant::now();
    let mut args = serde_json::Map::new();
    args.insert("url".into(), json!("https://example.com"));
    let result = executor.execute("browser_open", args, None).await;
    assert!(!result.success);
    assert_eq!(started.elapsed(), Duration::from_millis(2_500));
}

#[test]
fn test_formatted_failure_is_short() {
    let reason = format!("upstream said: {}", "no ".repeat(500));
    let output = format_tool_result("web_search", &ToolResult::failure(reason));
    assert!(output.text().chars().count() < 450);
    assert!(output.text().ends_with("…(truncated)…"));
}
