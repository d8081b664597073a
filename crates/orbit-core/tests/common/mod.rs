//! Common test utilities for integration tests.

#![allow(dead_code)]

use orbit_core::{ToolError, ToolOutput, ToolRegistry, ToolSpec};
use orbit_core::{ParamKind, ParamSpec, ToolCategory};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Separator between chunks in terminal capture fixtures.
const CHUNK_SEPARATOR: &str = "\n---8<---\n";

fn fixture_path(dir: &str, name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(dir)
        .join(format!("{}.txt", name))
}

fn read_fixture(dir: &str, name: &str) -> String {
    let path = fixture_path(dir, name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e))
}

/// Load a model response fixture.
pub fn load_model_output(name: &str) -> String {
    read_fixture("model_output", name)
}

/// Load a terminal capture as the chunks the process emitted.
///
/// Captures are stored with `\x1b` and `\x07` spelled out so the files stay
/// printable.
pub fn load_terminal_chunks(name: &str) -> Vec<String> {
    read_fixture("terminal", name)
        .split(CHUNK_SEPARATOR)
        .map(|chunk| chunk.replace("\\x1b", "\x1b").replace("\\x07", "\x07"))
        .collect()
}

/// Handler invocation counter shared with registered tools.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// The tools an assistant overlay typically exposes, backed by canned output.
pub fn assistant_registry(calls: CallCounter) -> ToolRegistry {
    let search_calls = calls.clone();
    let memory_calls = calls.clone();
    let screen_calls = calls;

    ToolRegistry::builder()
        .register_fn(
            ToolSpec::new("web_search")
                .description("Search the web")
                .param(ParamSpec::required("q", ParamKind::String)),
            move |args| {
                let calls = search_calls.clone();
                async move {
                    calls.hit();
                    let q = args.get("q").and_then(|v| v.as_str()).unwrap_or_default();
                    Ok::<_, ToolError>(ToolOutput::text(format!("Top result for {}: tides.example", q)))
                }
            },
        )
        .register_fn(
            ToolSpec::new("memory_store")
                .param(ParamSpec::required("text", ParamKind::String))
                .param(ParamSpec::optional("tags", ParamKind::Array)),
            move |args| {
                let calls = memory_calls.clone();
                async move {
                    calls.hit();
                    let tags = args.get("tags").and_then(|v| v.as_array()).map_or(0, Vec::len);
                    Ok::<_, ToolError>(ToolOutput::text(format!("Stored with {} tag(s)", tags)))
                }
            },
        )
        .register_fn(
            ToolSpec::new("capture_screen").param(ParamSpec::optional("display", ParamKind::Integer)),
            move |_| {
                let calls = screen_calls.clone();
                async move {
                    calls.hit();
                    Ok::<_, ToolError>(
                        ToolOutput::text("Captured display").with_image("data:image/png;base64,iVBORw0KGgo="),
                    )
                }
            },
        )
        .register_fn(
            ToolSpec::new("browser_open")
                .category(ToolCategory::Browser)
                .param(ParamSpec::required("url", ParamKind::String)),
            |_| async {
                std::future::pending::<()>().await;
                Ok::<_, ToolError>(ToolOutput::default())
            },
        )
        .build()
        .expect("valid registry")
}
