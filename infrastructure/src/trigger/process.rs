//! Shared subprocess runner for CLI triggers.
//!
//! Every agent CLI is driven the same way: spawn it with piped output, read
//! stdout line by line while a separate task drains stderr, and bound the
//! whole run by a timeout. Stderr is scanned for kind-specific signatures:
//! a fatal one aborts the run at once, a transient one starts a shorter
//! grace timer that fresh stdout output cancels.
//!
//! Every child is spawned into its own process group and registered in a
//! [`ProcessRegistry`] until it exits, so [`ProcessRegistry::terminate_all`]
//! can reach processes whose run was never awaited.

use council_domain::{FailureKind, TriggerResult};
use std::collections::HashSet;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Notify, mpsc};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Stderr kept for error reports
const MAX_STDERR_BYTES: usize = 64 * 1024;

/// Longest argument shown verbatim in command descriptions
const MAX_DISPLAY_ARG: usize = 80;

/// Timing knobs shared by every trigger invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSettings {
    /// Hard bound on one invocation
    pub timeout: Duration,
    /// Wait between SIGTERM and SIGKILL
    pub grace: Duration,
    /// How long a transient stderr condition may persist before aborting
    pub transient_grace: Duration,
    /// Per-step bound used by `close()`
    pub close_step_timeout: Duration,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            grace: Duration::from_secs(5),
            transient_grace: Duration::from_secs(60),
            close_step_timeout: Duration::from_secs(3),
        }
    }
}

/// Known stderr signatures for one CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrPatterns {
    pub fatal: &'static [&'static str],
    pub transient: &'static [&'static str],
}

impl StderrPatterns {
    pub(crate) fn classify(&self, line: &str) -> Option<StderrSignal> {
        let lower = line.to_lowercase();
        if let Some(p) = self.fatal.iter().find(|p| lower.contains(&p.to_lowercase())) {
            return Some(StderrSignal::Fatal(p.to_string()));
        }
        self.transient
            .iter()
            .find(|p| lower.contains(&p.to_lowercase()))
            .map(|p| StderrSignal::Transient(p.to_string()))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum StderrSignal {
    Fatal(String),
    Transient(String),
}

/// Program plus arguments for one run
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Command line for logs, with long arguments (the prompt) elided.
    pub fn describe(&self) -> String {
        let mut out = self.program.clone();
        for arg in &self.args {
            out.push(' ');
            if arg.len() > MAX_DISPLAY_ARG || arg.contains('\n') {
                out.push_str(&format!("<{} bytes>", arg.len()));
            } else {
                out.push_str(arg);
            }
        }
        out
    }
}

/// Why a run ended before the program exited on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Abort {
    Timeout(Duration),
    Fatal(String),
    /// A transient condition outlived its grace period
    Transient(String),
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessExit {
    /// Exit code, `None` when terminated by a signal
    Exited(Option<i32>),
    Aborted(Abort),
}

#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub exit: ProcessExit,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ProcessOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit == ProcessExit::Exited(Some(0))
    }

    /// Map the run onto a trigger result carrying `output`.
    pub fn into_result(self, output: String) -> TriggerResult {
        let result = match &self.exit {
            ProcessExit::Exited(Some(0)) => return TriggerResult::success(output),
            ProcessExit::Exited(code) => {
                let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                TriggerResult::failure(
                    FailureKind::ProcessFailed,
                    format!("exited with status {code}: {}", stderr_tail(&self.stderr)),
                )
            }
            ProcessExit::Aborted(Abort::Timeout(limit)) => TriggerResult::failure(
                FailureKind::Timeout,
                format!("timed out after {}s", limit.as_secs_f64()),
            ),
            ProcessExit::Aborted(Abort::Fatal(pattern)) => TriggerResult::failure(
                FailureKind::FatalPattern,
                format!("aborted on stderr: {pattern}"),
            ),
            ProcessExit::Aborted(Abort::Transient(pattern)) => TriggerResult::failure(
                FailureKind::FatalPattern,
                format!("transient condition did not clear: {pattern}"),
            ),
        };
        result.with_output(output)
    }
}

fn stderr_tail(stderr: &str) -> &str {
    let trimmed = stderr.trim();
    match trimmed.char_indices().rev().nth(499) {
        Some((idx, _)) => &trimmed[idx..],
        None => trimmed,
    }
}

/// Why a program could not be started
#[derive(Error, Debug)]
pub enum LaunchError {
    /// Not on `PATH` / no such file
    #[error("program not found: {0}")]
    Missing(String),
    /// Exists but cannot be executed
    #[error("permission denied: {0}")]
    Denied(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Live child processes of one trigger instance
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    pids: Mutex<HashSet<u32>>,
    changed: Notify,
}

impl ProcessRegistry {
    pub fn len(&self) -> usize {
        self.pids.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn register(self: &Arc<Self>, pid: u32) -> Registration {
        self.pids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(pid);
        Registration {
            registry: Arc::clone(self),
            pid,
        }
    }

    fn snapshot(&self) -> Vec<u32> {
        self.pids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .copied()
            .collect()
    }

    async fn wait_empty(&self, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        loop {
            let notified = self.changed.notified();
            if self.is_empty() {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.is_empty();
            }
        }
    }

    /// Terminate, wait, kill, wait: every step bounded by `step`.
    pub async fn terminate_all(&self, step: Duration) {
        let pids = self.snapshot();
        if pids.is_empty() {
            return;
        }
        debug!("Terminating {} agent process(es)", pids.len());
        for pid in &pids {
            signal_group(*pid, Signal::Term);
        }
        if self.wait_empty(step).await {
            return;
        }

        let stubborn = self.snapshot();
        warn!("Killing {} agent process(es) that ignored SIGTERM", stubborn.len());
        for pid in &stubborn {
            signal_group(*pid, Signal::Kill);
        }
        if !self.wait_empty(step).await {
            warn!("{} agent process(es) still running after kill", self.len());
        }
    }
}

/// Removes a pid from its registry when the run ends or is dropped
struct Registration {
    registry: Arc<ProcessRegistry>,
    pid: u32,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry
            .pids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.pid);
        self.registry.changed.notify_waiters();
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Term,
    Kill,
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: Signal) {
    let signal = match signal {
        Signal::Term => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // Negative pid addresses the process group created at spawn
    let rc = unsafe { libc::kill(-pid, signal) };
    if rc != 0 {
        trace!("kill(-{}, {}) failed: {}", pid, signal, std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: u32, _signal: Signal) {}

/// Spawns agent programs and supervises one run at a time per call.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    settings: TriggerSettings,
    registry: Arc<ProcessRegistry>,
}

impl ProcessRunner {
    pub fn new(settings: TriggerSettings) -> Self {
        Self {
            settings,
            registry: Arc::new(ProcessRegistry::default()),
        }
    }

    pub fn settings(&self) -> &TriggerSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    /// Run `spec` to completion, handing each stdout line to `on_line`.
    pub async fn run<F>(
        &self,
        spec: &ProcessSpec,
        patterns: StderrPatterns,
        mut on_line: F,
    ) -> Result<ProcessOutcome, LaunchError>
    where
        F: FnMut(&str) + Send,
    {
        let started = Instant::now();
        let mut child = self.spawn(spec)?;
        let Some(pid) = child.id() else {
            return Err(LaunchError::Io(std::io::Error::other(
                "process exited before it could be tracked",
            )));
        };
        let _registration = self.registry.register(pid);
        debug!(pid, "Spawned {}", spec.describe());

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(LaunchError::Io(std::io::Error::other(
                "failed to capture agent output",
            )));
        };

        let (signal_tx, mut signals) = mpsc::unbounded_channel();
        let drain = tokio::spawn(drain_stderr(stderr, patterns, signal_tx));

        let deadline = started + self.settings.timeout;
        let mut transient: Option<(String, Instant)> = None;
        let mut reader = BufReader::new(stdout);
        // Partial reads accumulate here across select iterations
        let mut buf = Vec::new();
        let mut stdout_open = true;
        let mut signals_open = true;

        let exit = loop {
            let wake_at = transient
                .as_ref()
                .map_or(deadline, |(_, until)| (*until).min(deadline));

            tokio::select! {
                read = reader.read_until(b'\n', &mut buf), if stdout_open => match read {
                    Ok(0) => stdout_open = false,
                    Ok(_) => {
                        if let Some((pattern, _)) = transient.take() {
                            debug!(pid, "Output resumed; transient '{}' cleared", pattern);
                        }
                        let line = decode_line(&buf);
                        on_line(&line);
                        buf.clear();
                    }
                    Err(e) => {
                        debug!(pid, "Stopped reading stdout: {}", e);
                        stdout_open = false;
                    }
                },
                signal = signals.recv(), if signals_open => match signal {
                    Some(StderrSignal::Fatal(pattern)) => {
                        warn!(pid, "Fatal stderr pattern '{}'; aborting", pattern);
                        break ProcessExit::Aborted(Abort::Fatal(pattern));
                    }
                    Some(StderrSignal::Transient(pattern)) => {
                        if transient.is_none() {
                            debug!(pid, "Transient stderr pattern '{}'", pattern);
                            transient = Some((pattern, Instant::now() + self.settings.transient_grace));
                        }
                    }
                    None => signals_open = false,
                },
                status = child.wait(), if !stdout_open => {
                    break match status {
                        Ok(status) => ProcessExit::Exited(status.code()),
                        Err(e) => {
                            debug!(pid, "wait failed: {}", e);
                            ProcessExit::Exited(None)
                        }
                    };
                }
                _ = tokio::time::sleep_until(wake_at) => {
                    break match transient.take() {
                        Some((pattern, until)) if until <= deadline => {
                            warn!(pid, "Transient '{}' persisted; aborting", pattern);
                            ProcessExit::Aborted(Abort::Transient(pattern))
                        }
                        _ => {
                            warn!(pid, "Timed out after {:?}", self.settings.timeout);
                            ProcessExit::Aborted(Abort::Timeout(self.settings.timeout))
                        }
                    };
                }
            }
        };

        if matches!(exit, ProcessExit::Aborted(_)) {
            self.terminate(&mut child, pid).await;
        }

        let stderr = match tokio::time::timeout(self.settings.close_step_timeout, drain).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                debug!(pid, "stderr drain task failed: {}", e);
                String::new()
            }
            Err(_) => {
                debug!(pid, "stderr still open after exit; giving up on it");
                String::new()
            }
        };

        Ok(ProcessOutcome {
            exit,
            stderr,
            elapsed: started.elapsed(),
        })
    }

    fn spawn(&self, spec: &ProcessSpec) -> Result<Child, LaunchError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        // Linux: have the kernel SIGTERM the child if we die without cleanup
        #[cfg(target_os = "linux")]
        unsafe {
            cmd.pre_exec(|| {
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                Ok(())
            });
        }

        cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LaunchError::Missing(spec.program.clone()),
            std::io::ErrorKind::PermissionDenied => {
                LaunchError::Denied(format!("{}: {}", spec.program, e))
            }
            _ => LaunchError::Io(e),
        })
    }

    /// SIGTERM, wait out the grace period, then SIGKILL.
    async fn terminate(&self, child: &mut Child, pid: u32) {
        signal_group(pid, Signal::Term);
        #[cfg(not(unix))]
        let _ = child.start_kill();

        if tokio::time::timeout(self.settings.grace, child.wait())
            .await
            .is_ok()
        {
            return;
        }
        debug!(pid, "Still alive after {:?}; killing", self.settings.grace);
        signal_group(pid, Signal::Kill);
        if let Err(e) = child.kill().await {
            debug!(pid, "kill failed: {}", e);
        }
    }
}

async fn drain_stderr<R>(
    stderr: R,
    patterns: StderrPatterns,
    signals: mpsc::UnboundedSender<StderrSignal>,
) -> String
where
    R: AsyncRead + Unpin,
{
    let mut collected = String::new();
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = decode_line(&buf);
                trace!("stderr: {}", line);
                if let Some(signal) = patterns.classify(&line) {
                    // The reader may already be gone
                    let _ = signals.send(signal);
                }
                if collected.len() < MAX_STDERR_BYTES {
                    collected.push_str(&line);
                    collected.push('\n');
                }
            }
            Err(e) => {
                trace!("stderr read failed: {}", e);
                break;
            }
        }
    }
    collected
}

/// One output line without its terminator; invalid UTF-8 is replaced.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn settings(timeout_ms: u64) -> TriggerSettings {
        TriggerSettings {
            timeout: Duration::from_millis(timeout_ms),
            grace: Duration::from_millis(200),
            transient_grace: Duration::from_millis(300),
            close_step_timeout: Duration::from_secs(2),
        }
    }

    fn sh(script: &str) -> ProcessSpec {
        ProcessSpec::new("sh", vec!["-c".into(), script.into()])
    }

    const PATTERNS: StderrPatterns = StderrPatterns {
        fatal: &["quota exhausted"],
        transient: &["overloaded"],
    };

    #[tokio::test]
    async fn test_reads_stdout_lines() {
        let runner = ProcessRunner::new(settings(5_000));
        let mut lines = Vec::new();
        let outcome = runner
            .run(&sh("printf 'one\\ntwo\\n'; echo warn >&2"), PATTERNS, |l| {
                lines.push(l.to_string())
            })
            .await
            .unwrap();

        assert!(outcome.succeeded());
        assert_eq!(lines, vec!["one", "two"]);
        assert_eq!(outcome.stderr, "warn\n");
        assert!(runner.registry().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_does_not_end_stream() {
        let runner = ProcessRunner::new(settings(5_000));
        let mut lines = Vec::new();
        let script = r#"echo first; printf 'bad \377\376 bytes\n'; echo '{"type":"result","result":"done"}'"#;
        let outcome = runner
            .run(&sh(script), PATTERNS, |l| lines.push(l.to_string()))
            .await
            .unwrap();

        assert!(outcome.succeeded());
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "first");
        assert!(lines[1].starts_with("bad ") && lines[1].ends_with(" bytes"));
        assert_eq!(lines[2], r#"{"type":"result","result":"done"}"#);
    }

    #[test]
    fn test_decode_line_strips_terminators() {
        assert_eq!(decode_line(b"abc\r\n"), "abc");
        assert_eq!(decode_line(b"tail"), "tail");
        assert_eq!(decode_line(b"x\xff\n"), "x\u{fffd}");
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr() {
        let runner = ProcessRunner::new(settings(5_000));
        let outcome = runner
            .run(&sh("echo partial; echo boom >&2; exit 3"), PATTERNS, |_| {})
            .await
            .unwrap();

        assert_eq!(outcome.exit, ProcessExit::Exited(Some(3)));
        let result = outcome.into_result("partial".into());
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::ProcessFailed));
        assert!(result.error.unwrap().contains("boom"));
        assert_eq!(result.output, "partial");
    }

    #[tokio::test]
    async fn test_timeout_terminates_process() {
        let runner = ProcessRunner::new(settings(300));
        let started = std::time::Instant::now();
        let outcome = runner.run(&sh("sleep 30"), PATTERNS, |_| {}).await.unwrap();

        assert_eq!(
            outcome.exit,
            ProcessExit::Aborted(Abort::Timeout(Duration::from_millis(300)))
        );
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(outcome.into_result(String::new()).failure, Some(FailureKind::Timeout));
    }

    #[tokio::test]
    async fn test_fatal_pattern_aborts_early() {
        let runner = ProcessRunner::new(settings(20_000));
        let started = std::time::Instant::now();
        let outcome = runner
            .run(&sh("echo 'Error: Quota Exhausted for today' >&2; sleep 30"), PATTERNS, |_| {})
            .await
            .unwrap();

        assert_eq!(
            outcome.exit,
            ProcessExit::Aborted(Abort::Fatal("quota exhausted".into()))
        );
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_transient_pattern_gets_grace_period() {
        let runner = ProcessRunner::new(settings(20_000));
        let outcome = runner
            .run(&sh("echo 'model overloaded, retrying' >&2; sleep 30"), PATTERNS, |_| {})
            .await
            .unwrap();

        assert_eq!(
            outcome.exit,
            ProcessExit::Aborted(Abort::Transient("overloaded".into()))
        );
    }

    #[tokio::test]
    async fn test_transient_cleared_by_output() {
        let runner = ProcessRunner::new(settings(20_000));
        let script = "echo 'overloaded' >&2; sleep 0.1; echo back; sleep 0.5; echo done";
        let mut lines = Vec::new();
        let outcome = runner
            .run(&sh(script), PATTERNS, |l| lines.push(l.to_string()))
            .await
            .unwrap();

        assert!(outcome.succeeded());
        assert_eq!(lines, vec!["back", "done"]);
    }

    #[tokio::test]
    async fn test_large_stderr_does_not_block() {
        let runner = ProcessRunner::new(settings(10_000));
        let script = "head -c 300000 /dev/zero | tr '\\0' 'x' >&2; echo done";
        let mut lines = Vec::new();
        let outcome = runner
            .run(&sh(script), PATTERNS, |l| lines.push(l.to_string()))
            .await
            .unwrap();

        assert!(outcome.succeeded());
        assert_eq!(lines, vec!["done"]);
        assert!(outcome.stderr.len() >= MAX_STDERR_BYTES);
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = ProcessRunner::new(settings(1_000));
        let spec = ProcessSpec::new("council-test-no-such-program", vec![]);
        let err = runner.run(&spec, PATTERNS, |_| {}).await.unwrap_err();
        assert!(matches!(err, LaunchError::Missing(p) if p == "council-test-no-such-program"));
    }

    #[tokio::test]
    async fn test_terminate_all_reaches_running_process() {
        let runner = ProcessRunner::new(settings(60_000));
        let background = runner.clone();
        let handle = tokio::spawn(async move {
            background.run(&sh("sleep 30"), PATTERNS, |_| {}).await
        });

        for _ in 0..100 {
            if !runner.registry().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(runner.registry().len(), 1);

        runner.registry().terminate_all(Duration::from_secs(2)).await;
        let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(!outcome.succeeded());
        assert!(runner.registry().is_empty());
    }

    #[test]
    fn test_describe_elides_prompt() {
        let spec = ProcessSpec::new(
            "claude",
            vec!["-p".into(), "line one\nline two".into()],
        );
        assert_eq!(spec.describe(), "claude -p <17 bytes>");
    }
}
