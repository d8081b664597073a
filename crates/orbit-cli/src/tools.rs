//! Built-in tools available to `orbit run`.

use orbit_core::{OrbitError, ParamKind, ParamSpec, ToolError, ToolOutput, ToolRegistry, ToolSpec};
use orbit_types::ToolArgs;

/// Default cap for `read_file` when `max_chars` is not given.
const READ_FILE_MAX_CHARS: usize = 8_000;

pub fn builtin_registry() -> Result<ToolRegistry, OrbitError> {
    ToolRegistry::builder()
        .register_fn(
            ToolSpec::new("echo")
                .description("Return the given text unchanged")
                .param(ParamSpec::required("text", ParamKind::String)),
            |args| async move { str_arg(&args, "text").map(ToolOutput::text) },
        )
        .register_fn(
            ToolSpec::new("read_file")
                .description("Read a UTF-8 text file")
                .param(ParamSpec::required("path", ParamKind::String))
                .param(ParamSpec::optional("max_chars", ParamKind::Integer)),
            |args| async move { read_file(args).await },
        )
        .register_fn(
            ToolSpec::new("list_dir")
                .description("List the entries of a directory")
                .param(ParamSpec::required("path", ParamKind::String)),
            |args| async move { list_dir(args).await },
        )
        .build()
}

fn str_arg(args: &ToolArgs, name: &str) -> Result<String, ToolError> {
    args.get(name)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ToolError::new(format!("'{}' must be a string", name)))
}

async fn read_file(args: ToolArgs) -> Result<ToolOutput, ToolError> {
    let path = str_arg(&args, "path")?;
    let max_chars = args
        .get("max_chars")
        .and_then(|v| v.as_u64())
        .map_or(READ_FILE_MAX_CHARS, |n| n as usize);

    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| ToolError::new(format!("cannot read {}: {}", path, e)))?;

    let mut text: String = content.chars().take(max_chars).collect();
    if text.len() < content.len() {
        text.push_str("\n…");
    }
    Ok(ToolOutput::text(text))
}

async fn list_dir(args: ToolArgs) -> Result<ToolOutput, ToolError> {
    let path = str_arg(&args, "path")?;
    let mut entries = tokio::fs::read_dir(&path)
        .await
        .map_err(|e| ToolError::new(format!("cannot list {}: {}", path, e)))?;

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ToolError::new(format!("cannot list {}: {}", path, e)))?
    {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
            name.push('/');
        }
        names.push(name);
    }
    names.sort();
    Ok(ToolOutput::text(names.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_core::ToolExecutor;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn args(value: serde_json::Value) -> ToolArgs {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("args must be an object"),
        }
    }

    #[test]
    fn test_builtin_names() {
        let registry = builtin_registry().unwrap();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, vec!["echo", "list_dir", "read_file"]);
    }

    #[tokio::test]
    async fn test_echo() {
        let executor = ToolExecutor::new(builtin_registry().unwrap());
        let result = executor
            .execute("echo", args(json!({"text": "hi there"})), None)
            .await;
        assert!(result.success);
        assert_eq!(result.result.as_deref(), Some("hi there"));
    }

    #[tokio::test]
    async fn test_read_file_caps_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "abcdefghij").unwrap();

        let executor = ToolExecutor::new(builtin_registry().unwrap());
        let result = executor
            .execute(
                "read_file",
                args(json!({"path": path.to_string_lossy(), "max_chars": 4})),
                None,
            )
            .await;
        assert_eq!(result.result.as_deref(), Some("abcd\n…"));
    }

    #[tokio::test]
    async fn test_read_missing_file_fails() {
        let executor = ToolExecutor::new(builtin_registry().unwrap());
        let result = executor
            .execute("read_file", args(json!({"path": "/nonexistent/orbit.txt"})), None)
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("cannot read /nonexistent/orbit.txt"));
    }

    #[tokio::test]
    async fn test_list_dir_marks_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "").unwrap();

        let executor = ToolExecutor::new(builtin_registry().unwrap());
        let result = executor
            .execute("list_dir", args(json!({"path": dir.path().to_string_lossy()})), None)
            .await;
        assert_eq!(result.result.as_deref(), Some("Cargo.toml\nsrc/"));
    }
}
