//! Strategy execution in a child Python process.
//!
//! Each call gets a fresh temp directory holding the strategy source and a
//! small harness script. The harness reads the series as JSON on stdin, calls
//! the entry function once per prefix past warm-up and prints a JSON array
//! with one element per point: `null`, a string, or `{"error": "..."}`.
//! Anything the strategy prints goes to stderr so it cannot corrupt that
//! array.
//!
//! On unix the interpreter leads its own process group. The group is killed
//! when the run ends or overruns, so processes the strategy starts die with
//! it. Pipe output is collected under the same wall-clock deadline.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::error::ExecutionFailure;
use crate::domain::signal::StepOutcome;
use crate::ports::executor_port::{ExecutionRequest, StrategyExecutor};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Minimum wait for pipe threads once the child has exited.
const PIPE_GRACE: Duration = Duration::from_millis(200);

const HARNESS: &str = r#"import json
import signal
import sys


def _main():
    request = json.load(sys.stdin)
    entry = request["entry"]
    warmup = request["warmup"]
    step_timeout = request["step_timeout"]
    prices = request["prices"]
    timestamps = request["timestamps"]

    out = sys.stdout
    sys.stdout = sys.stderr

    namespace = {"__name__": "strategy"}
    try:
        import numpy
        namespace["np"] = numpy
    except ImportError:
        pass

    with open(sys.argv[1], encoding="utf-8") as f:
        source = f.read()
    exec(compile(source, "strategy.py", "exec"), namespace)

    func = namespace.get(entry)
    if not callable(func):
        print(f"entry function '{entry}' is not defined", file=sys.stderr)
        sys.exit(2)

    use_timer = hasattr(signal, "setitimer")
    if use_timer:
        def _expired(signum, frame):
            raise TimeoutError(f"step exceeded {step_timeout}s")
        signal.signal(signal.SIGALRM, _expired)

    results = []
    for i in range(len(prices)):
        if i < warmup:
            results.append(None)
            continue
        try:
            if use_timer:
                signal.setitimer(signal.ITIMER_REAL, step_timeout)
            try:
                value = func(prices[: i + 1], timestamps[: i + 1])
            finally:
                if use_timer:
                    signal.setitimer(signal.ITIMER_REAL, 0)
        except Exception as e:
            results.append({"error": f"{type(e).__name__}: {e}"})
            continue
        results.append(value if isinstance(value, str) else None)

    json.dump(results, out)
    out.flush()


_main()
"#;

#[derive(Debug, Clone, PartialEq)]
pub struct SandboxConfig {
    pub interpreter: String,
    /// Passed before the harness path.
    pub interpreter_args: Vec<String>,
    pub entry_function: String,
    /// Wall-clock budget for one whole run.
    pub timeout_secs: u64,
    /// Budget for a single strategy call, enforced inside the harness.
    pub step_timeout_secs: f64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        SandboxConfig {
            interpreter: "python3".to_string(),
            interpreter_args: vec!["-I".to_string()],
            entry_function: "strategy".to_string(),
            timeout_secs: 120,
            step_timeout_secs: 2.0,
        }
    }
}

#[derive(Serialize)]
struct HarnessInput<'a> {
    entry: &'a str,
    warmup: usize,
    step_timeout: f64,
    prices: Vec<f64>,
    timestamps: Vec<NaiveDate>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStep {
    Failed { error: String },
    Value(Option<String>),
}

/// Parse the harness's stdout into per-step outcomes.
pub fn parse_output(stdout: &[u8]) -> Result<Vec<StepOutcome>, ExecutionFailure> {
    let raw: Vec<RawStep> =
        serde_json::from_slice(stdout).map_err(|e| ExecutionFailure::MalformedOutput {
            reason: e.to_string(),
        })?;
    Ok(raw
        .into_iter()
        .map(|step| match step {
            RawStep::Failed { error } => StepOutcome::StepError(error),
            RawStep::Value(token) => StepOutcome::from(token.as_deref()),
        })
        .collect())
}

fn io_failure(e: impl ToString) -> ExecutionFailure {
    ExecutionFailure::Io {
        reason: e.to_string(),
    }
}

fn read_pipe(pipe: Option<impl Read>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf)?;
    }
    Ok(buf)
}

/// Run `f` on its own thread; the result arrives on the returned channel.
fn spawn_io<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> Receiver<T> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx
}

/// SIGKILL the child's process group. The child was spawned with
/// `process_group(0)`, so the group id is its pid.
#[cfg(unix)]
fn kill_process_group(child: &Child) {
    if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: kill(2) takes no pointers. An empty group yields ESRCH.
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

pub struct SubprocessExecutor {
    config: SandboxConfig,
}

impl SubprocessExecutor {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    fn spawn(&self, workdir: &Path) -> Result<Child, ExecutionFailure> {
        let mut command = Command::new(&self.config.interpreter);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        command
            .args(&self.config.interpreter_args)
            .arg(workdir.join("harness.py"))
            .arg(workdir.join("strategy.py"))
            .current_dir(workdir)
            .env_clear()
            .envs(std::env::var_os("PATH").map(|p| ("PATH", p)))
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExecutionFailure::Spawn {
                reason: format!("{}: {e}", self.config.interpreter),
            })
    }

    fn timeout(&self) -> ExecutionFailure {
        ExecutionFailure::Timeout {
            seconds: self.config.timeout_secs,
        }
    }

    /// Wait for the child, then kill whatever is left in its group.
    fn wait_with_deadline(
        &self,
        child: &mut Child,
        deadline: Instant,
    ) -> Result<ExitStatus, ExecutionFailure> {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    kill_process_group(child);
                    return Ok(status);
                }
                Ok(None) if Instant::now() >= deadline => {
                    kill_process_group(child);
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(self.timeout());
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    kill_process_group(child);
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(io_failure(e));
                }
            }
        }
    }

    /// Receive a pipe thread's result, giving up at `deadline`.
    fn receive<T>(&self, rx: &Receiver<T>, deadline: Instant) -> Result<T, ExecutionFailure> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        rx.recv_timeout(remaining.max(PIPE_GRACE)).map_err(|e| match e {
            RecvTimeoutError::Timeout => self.timeout(),
            RecvTimeoutError::Disconnected => io_failure("pipe thread stopped"),
        })
    }
}

impl StrategyExecutor for SubprocessExecutor {
    fn execute(
        &self,
        request: ExecutionRequest<'_>,
    ) -> Result<Vec<StepOutcome>, ExecutionFailure> {
        let workdir = tempfile::Builder::new()
            .prefix("zkquant-")
            .tempdir()
            .map_err(io_failure)?;
        std::fs::write(workdir.path().join("harness.py"), HARNESS).map_err(io_failure)?;
        std::fs::write(workdir.path().join("strategy.py"), request.source).map_err(io_failure)?;

        let payload = serde_json::to_vec(&HarnessInput {
            entry: &self.config.entry_function,
            warmup: request.warmup,
            step_timeout: self.config.step_timeout_secs,
            prices: request.series.prices(),
            timestamps: request.series.timestamps(),
        })
        .map_err(io_failure)?;

        let deadline = Instant::now() + Duration::from_secs(self.config.timeout_secs);
        let mut child = self.spawn(workdir.path())?;
        tracing::debug!(
            pid = child.id(),
            points = request.series.len(),
            "strategy process started"
        );

        // stdin, stdout and stderr must all be serviced concurrently.
        let stdin = child.stdin.take();
        let writer = spawn_io(move || -> std::io::Result<()> {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&payload)?;
            }
            Ok(())
        });
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_reader = spawn_io(move || read_pipe(stdout));
        let err_reader = spawn_io(move || read_pipe(stderr));

        let status = self.wait_with_deadline(&mut child, deadline)?;

        let written = self.receive(&writer, deadline)?;
        let stdout = self.receive(&out_reader, deadline)?.map_err(io_failure)?;
        let stderr = self.receive(&err_reader, deadline)?.map_err(io_failure)?;

        if !status.success() {
            return Err(ExecutionFailure::NonZeroExit {
                code: status.code(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        written.map_err(io_failure)?;

        if !stderr.is_empty() {
            tracing::debug!(
                stderr = %String::from_utf8_lossy(&stderr).trim(),
                "strategy process stderr"
            );
        }
        parse_output(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::{self, MarketSeries};
    use crate::domain::signal::Signal;

    fn request<'a>(
        source: &'a str,
        series: &'a MarketSeries,
        warmup: usize,
    ) -> ExecutionRequest<'a> {
        ExecutionRequest {
            source,
            series,
            warmup,
        }
    }

    /// Runs `script` with `sh -c` in place of the harness.
    fn shell(script: &str, timeout_secs: u64) -> SubprocessExecutor {
        SubprocessExecutor::new(SandboxConfig {
            interpreter: "sh".to_string(),
            interpreter_args: vec!["-c".to_string(), script.to_string(), "sh".to_string()],
            timeout_secs,
            ..SandboxConfig::default()
        })
    }

    #[test]
    fn parses_mixed_output() {
        let outcomes = parse_output(br#"[null, "buy", "sell", "hold", {"error": "ValueError: x"}]"#)
            .unwrap();
        assert_eq!(
            outcomes,
            vec![
                StepOutcome::NoSignal,
                StepOutcome::Signal(Signal::Buy),
                StepOutcome::Signal(Signal::Sell),
                StepOutcome::NoSignal,
                StepOutcome::StepError("ValueError: x".to_string()),
            ]
        );
    }

    #[test]
    fn non_array_output_is_malformed() {
        assert!(matches!(
            parse_output(b"buy buy sell"),
            Err(ExecutionFailure::MalformedOutput { .. })
        ));
        assert!(matches!(
            parse_output(b"[1, 2]"),
            Err(ExecutionFailure::MalformedOutput { .. })
        ));
    }

    #[test]
    fn missing_interpreter_is_spawn_failure() {
        let executor = SubprocessExecutor::new(SandboxConfig {
            interpreter: "/nonexistent/zkquant-python".to_string(),
            ..SandboxConfig::default()
        });
        let series = market::generate(1, 60).unwrap();
        let err = executor.execute(request("", &series, 50)).unwrap_err();
        assert!(matches!(err, ExecutionFailure::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn reads_stdout_of_child() {
        let executor = shell(
            r#"cat >/dev/null; printf '%s' '["buy", null, {"error": "boom"}]'"#,
            10,
        );
        let series = market::generate(1, 3).unwrap();
        let outcomes = executor.execute(request("", &series, 0)).unwrap();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0], StepOutcome::Signal(Signal::Buy));
        assert!(outcomes[2].is_error());
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_carries_stderr() {
        let executor = shell("cat >/dev/null; echo 'SyntaxError: bad' >&2; exit 3", 10);
        let series = market::generate(1, 3).unwrap();
        match executor.execute(request("", &series, 0)).unwrap_err() {
            ExecutionFailure::NonZeroExit { code, stderr } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "SyntaxError: bad");
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn overrunning_child_is_killed() {
        let executor = shell("exec sleep 30", 1);
        let series = market::generate(1, 3).unwrap();
        let started = Instant::now();
        let err = executor.execute(request("", &series, 0)).unwrap_err();
        assert_eq!(err, ExecutionFailure::Timeout { seconds: 1 });
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn background_process_cannot_hold_the_run_open() {
        let executor = shell("cat >/dev/null; (sleep 30 &); printf '[null,null,null]'", 1);
        let series = market::generate(1, 3).unwrap();
        let started = Instant::now();
        let outcomes = executor.execute(request("", &series, 0)).unwrap();
        assert_eq!(outcomes, vec![StepOutcome::NoSignal; 3]);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn overrun_with_background_process_still_times_out() {
        let executor = shell("cat >/dev/null; sleep 30 & wait", 1);
        let series = market::generate(1, 3).unwrap();
        let started = Instant::now();
        let err = executor.execute(request("", &series, 0)).unwrap_err();
        assert_eq!(err, ExecutionFailure::Timeout { seconds: 1 });
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    #[ignore = "requires python3"]
    fn python_child_process_is_killed_with_the_run() {
        let source = r#"
import subprocess

subprocess.Popen(["sleep", "30"])

def strategy(prices, timestamps):
    return None
"#;
        let executor = SubprocessExecutor::new(SandboxConfig {
            timeout_secs: 5,
            ..SandboxConfig::default()
        });
        let series = market::generate(7, 55).unwrap();
        let started = Instant::now();
        let outcomes = executor.execute(request(source, &series, 50)).unwrap();
        assert_eq!(outcomes.len(), 55);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    #[ignore = "requires python3"]
    fn python_strategy_runs_past_warmup() {
        let source = r#"
def strategy(prices, timestamps):
    if len(prices) % 2 == 0:
        return "buy"
    return "sell"
"#;
        let executor = SubprocessExecutor::new(SandboxConfig::default());
        let series = market::generate(7, 60).unwrap();
        let outcomes = executor.execute(request(source, &series, 50)).unwrap();
        assert_eq!(outcomes.len(), 60);
        assert!(outcomes[..50].iter().all(|o| *o == StepOutcome::NoSignal));
        assert_eq!(outcomes[50], StepOutcome::Signal(Signal::Sell));
        assert_eq!(outcomes[51], StepOutcome::Signal(Signal::Buy));
    }

    #[test]
    #[ignore = "requires python3"]
    fn python_exceptions_and_prints_are_contained() {
        let source = r#"
def strategy(prices, timestamps):
    print("debug output")
    if len(prices) == 52:
        raise ValueError("bad step")
    return 42
"#;
        let executor = SubprocessExecutor::new(SandboxConfig::default());
        let series = market::generate(7, 55).unwrap();
        let outcomes = executor.execute(request(source, &series, 50)).unwrap();
        assert_eq!(outcomes.len(), 55);
        assert_eq!(outcomes[50], StepOutcome::NoSignal);
        assert!(matches!(&outcomes[51], StepOutcome::StepError(e) if e.contains("ValueError")));
    }

    #[test]
    #[ignore = "requires python3"]
    fn python_missing_entry_function_fails_run() {
        let executor = SubprocessExecutor::new(SandboxConfig::default());
        let series = market::generate(7, 55).unwrap();
        let err = executor
            .execute(request("def other(p, t):\n    return 'buy'\n", &series, 50))
            .unwrap_err();
        assert!(matches!(err, ExecutionFailure::NonZeroExit { code: Some(2), .. }));
    }

    #[test]
    #[ignore = "requires python3"]
    fn python_slow_step_is_a_step_error() {
        let source = r#"
import time

def strategy(prices, timestamps):
    if len(prices) == 51:
        time.sleep(5)
    return "buy"
"#;
        let executor = SubprocessExecutor::new(SandboxConfig {
            step_timeout_secs: 0.2,
            ..SandboxConfig::default()
        });
        let series = market::generate(7, 53).unwrap();
        let outcomes = executor.execute(request(source, &series, 50)).unwrap();
        assert_eq!(outcomes[50], StepOutcome::StepError("TimeoutError: step exceeded 0.2s".into()));
        assert_eq!(outcomes[51], StepOutcome::Signal(Signal::Buy));
    }
}
