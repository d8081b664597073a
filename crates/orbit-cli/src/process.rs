//! Child-process bridge: run a command and stream its output into the
//! status loop as [`ProcessEvent`]s.

use anyhow::{Context, Result};
use orbit_core::ActivityInput;
use orbit_types::{ProcessEvent, ProcessEventKind};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const READ_CHUNK_BYTES: usize = 4096;

/// Decodes a byte stream as UTF-8 without splitting multi-byte characters
/// across chunks.
#[derive(Debug, Default)]
pub struct Utf8Chunker {
    pending: Vec<u8>,
}

impl Utf8Chunker {
    /// Decode everything complete so far. Invalid bytes become U+FFFD; an
    /// incomplete trailing character waits for the next push.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// Flush whatever is left at end of stream.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

/// Spawn `program` and forward its output to `inputs` until it exits.
///
/// Sends `start` first and `exit` last. The child is killed if this future
/// is dropped.
pub async fn run_command(
    program: &str,
    args: &[String],
    inputs: mpsc::Sender<ActivityInput>,
) -> Result<Option<i32>> {
    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    info!(target: "orbit::process", "Spawning {} {:?}", program, args);
    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn {}", program))?;

    let stdout = child.stdout.take().context("stdout was not captured")?;
    let stderr = child.stderr.take().context("stderr was not captured")?;

    inputs.send(ProcessEvent::start().into()).await?;

    let stdout_task = tokio::spawn(forward(stdout, ProcessEventKind::Stdout, inputs.clone()));
    let stderr_task = tokio::spawn(forward(stderr, ProcessEventKind::Stderr, inputs.clone()));

    let status = child.wait().await.context("Failed to wait for child")?;
    // Drain both pipes before reporting the exit.
    join_readers([stdout_task, stderr_task]).await;

    let code = status.code();
    info!(target: "orbit::process", "{} exited with code {:?}", program, code);
    inputs.send(ProcessEvent::exit(code).into()).await?;
    Ok(code)
}

/// Wait for the output readers, logging any that panicked or were
/// cancelled. Returns how many failed.
async fn join_readers<I>(tasks: I) -> usize
where
    I: IntoIterator<Item = JoinHandle<()>>,
{
    let mut failed = 0;
    for task in tasks {
        if let Err(e) = task.await {
            warn!(target: "orbit::process", "Output reader failed: {}", e);
            failed += 1;
        }
    }
    failed
}

async fn forward<R>(mut reader: R, kind: ProcessEventKind, inputs: mpsc::Sender<ActivityInput>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_BYTES];
    let mut chunker = Utf8Chunker::default();

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let text = chunker.push(&buf[..n]);
                if text.is_empty() {
                    continue;
                }
                if inputs.send(event(kind, text).into()).await.is_err() {
                    debug!(target: "orbit::process", "Status loop gone, stop reading {:?}", kind);
                    return;
                }
            }
            Err(e) => {
                warn!(target: "orbit::process", "Read error on {:?}: {}", kind, e);
                break;
            }
        }
    }

    let rest = chunker.finish();
    if !rest.is_empty() {
        let _ = inputs.send(event(kind, rest).into()).await;
    }
}

fn event(kind: ProcessEventKind, text: String) -> ProcessEvent {
    ProcessEvent { kind, text }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multibyte_split_across_reads() {
        let mut chunker = Utf8Chunker::default();
        let bytes = "⏺ Read".as_bytes();
        assert_eq!(chunker.push(&bytes[..2]), "");
        assert_eq!(chunker.push(&bytes[2..4]), "⏺ ");
        assert_eq!(chunker.push(&bytes[4..]), "Read");
        assert_eq!(chunker.finish(), "");
    }

    #[test]
    fn test_invalid_bytes_replaced() {
        let mut chunker = Utf8Chunker::default();
        assert_eq!(chunker.push(b"ok\xffgo"), "ok\u{fffd}go");
    }

    #[test]
    fn test_truncated_tail_flushed_on_finish() {
        let mut chunker = Utf8Chunker::default();
        assert_eq!(chunker.push(&"é".as_bytes()[..1]), "");
        assert_eq!(chunker.finish(), "\u{fffd}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command_streams_events() {
        let (tx, mut rx) = mpsc::channel(64);
        let args = vec!["-c".to_string(), "printf 'hello'; printf 'oops' >&2; exit 3".to_string()];
        let code = run_command("sh", &args, tx).await.unwrap();
        assert_eq!(code, Some(3));

        let mut events = Vec::new();
        while let Some(ActivityInput::Process(event)) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(events.first(), Some(&ProcessEvent::start()));
        assert_eq!(events.last(), Some(&ProcessEvent::exit(Some(3))));
        let stdout: String = events
            .iter()
            .filter(|e| e.kind == ProcessEventKind::Stdout)
            .map(|e| e.text.as_str())
            .collect();
        let stderr: String = events
            .iter()
            .filter(|e| e.kind == ProcessEventKind::Stderr)
            .map(|e| e.text.as_str())
            .collect();
        assert_eq!(stdout, "hello");
        assert_eq!(stderr, "oops");
    }

    #[tokio::test]
    async fn test_failed_reader_is_counted_not_fatal() {
        let ok = tokio::spawn(async {});
        let panicked: JoinHandle<()> = tokio::spawn(async { panic!("reader blew up") });
        assert_eq!(join_readers([ok, panicked]).await, 1);
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let (tx, _rx) = mpsc::channel(4);
        let err = run_command("orbit-no-such-program", &[], tx).await.unwrap_err();
        assert!(err.to_string().contains("Failed to spawn"));
    }
}
