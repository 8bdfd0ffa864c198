//! Process invocation through a persistent PowerShell session
//!
//! Starting PowerShell and importing DSC modules is slow, so one interpreter
//! is kept alive and fed scripts over stdin. [`SessionHandle`] owns that
//! interpreter:
//! - created lazily on the first [`Invoker::execute`] call
//! - reused for every later call
//! - guarded by a mutex, so concurrent callers never interleave a script
//!   submission with another call's output capture
//! - torn down by [`SessionHandle::shutdown`] or when the handle is dropped
//!
//! If the interpreter dies, the call fails and the next call starts a fresh
//! interpreter.
//!
//! No timeout is applied: a hung script blocks the caller until it returns.

use crate::error::{Error, Result};
use crate::render::ps_quote;
use crate::types::ExecutionOutput;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tempfile::TempDir;

/// How long to wait for the stderr marker once stdout has completed
const STDERR_SETTLE: Duration = Duration::from_secs(2);

/// Runs a script and returns its captured output
pub trait Invoker: Send + Sync {
    /// Execute a script, blocking until it completes
    fn execute(&self, script: &str) -> Result<ExecutionOutput>;
}

/// How to start the interpreter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerShellConfig {
    /// Interpreter executable
    pub path: PathBuf,
    /// Arguments; must make the interpreter read commands from stdin
    pub args: Vec<String>,
    /// Log every submitted script and captured stderr
    pub debug: bool,
}

impl PowerShellConfig {
    /// Default interpreter arguments
    pub fn default_args() -> Vec<String> {
        [
            "-NoProfile",
            "-NonInteractive",
            "-NoLogo",
            "-ExecutionPolicy",
            "Bypass",
            "-Command",
            "-",
        ]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
    }
}

impl Default for PowerShellConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("pwsh"),
            args: Self::default_args(),
            debug: false,
        }
    }
}

/// stderr collected by the reader thread
#[derive(Default)]
struct StderrBuffer {
    text: String,
    closed: bool,
}

type SharedStderr = Arc<(Mutex<StderrBuffer>, Condvar)>;

/// A live interpreter process
struct PowerShellSession {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr: SharedStderr,
    stderr_reader: Option<JoinHandle<()>>,
    scratch: TempDir,
    calls: u64,
    debug: bool,
}

impl PowerShellSession {
    fn spawn(config: &PowerShellConfig) -> Result<Self> {
        log::debug!(
            "Starting PowerShell session: {} {}",
            config.path.display(),
            config.args.join(" ")
        );

        let scratch = tempfile::Builder::new()
            .prefix("dscbridge-")
            .tempdir()
            .map_err(|e| Error::session("failed to create script directory", Some(e)))?;

        let mut child = Command::new(&config.path)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::session(
                    format!("failed to start {}", config.path.display()),
                    Some(e),
                )
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::session("interpreter stdin unavailable", None))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::session("interpreter stdout unavailable", None))?;
        let stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| Error::session("interpreter stderr unavailable", None))?;

        // stderr is drained continuously so a chatty script cannot fill the pipe
        let stderr: SharedStderr = Arc::default();
        let sink = Arc::clone(&stderr);
        let stderr_reader = std::thread::spawn(move || {
            let mut reader = BufReader::new(stderr_pipe);
            let mut line = Vec::new();
            loop {
                line.clear();
                let done = matches!(reader.read_until(b'\n', &mut line), Ok(0) | Err(_));
                let (lock, ready) = &*sink;
                let mut buffer = lock.lock().unwrap_or_else(PoisonError::into_inner);
                if done {
                    buffer.closed = true;
                } else {
                    buffer.text.push_str(&String::from_utf8_lossy(&line));
                }
                ready.notify_all();
                if done {
                    break;
                }
            }
        });

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr,
            stderr_reader: Some(stderr_reader),
            scratch,
            calls: 0,
            debug: config.debug,
        })
    }

    fn run(&mut self, script: &str) -> Result<ExecutionOutput> {
        self.calls += 1;
        let script_path = self.scratch.path().join(format!("invoke-{}.ps1", self.calls));
        std::fs::write(&script_path, script).map_err(|e| Error::io(&script_path, e))?;

        let marker = format!("__dscbridge_done_{}_{}__", std::process::id(), self.calls);
        if self.debug {
            log::debug!("Submitting {} ({} bytes)", script_path.display(), script.len());
        }

        // The stderr marker goes first, so it is already in the pipe once the
        // stdout marker has been read.
        let quoted_marker = ps_quote(&marker);
        let command = format!(
            "& {}\n[Console]::Error.WriteLine({quoted_marker}); [Console]::Error.Flush(); \
             [Console]::Out.WriteLine({quoted_marker}); [Console]::Out.Flush()\n",
            ps_quote(&script_path.to_string_lossy()),
        );
        self.stdin
            .write_all(command.as_bytes())
            .and_then(|()| self.stdin.flush())
            .map_err(|e| Error::session("failed to submit script", Some(e)))?;

        let mut stdout = String::new();
        loop {
            let mut line = String::new();
            let read = self
                .stdout
                .read_line(&mut line)
                .map_err(|e| Error::session("failed to read interpreter output", Some(e)))?;
            if read == 0 {
                return Err(Error::session("interpreter exited before the script completed", None));
            }
            if line.trim_end() == marker {
                break;
            }
            stdout.push_str(&line);
        }

        if let Err(e) = std::fs::remove_file(&script_path) {
            log::debug!("Could not remove {}: {e}", script_path.display());
        }

        let stderr = self.take_stderr(&marker);
        if self.debug && !stderr.trim().is_empty() {
            log::debug!("Interpreter stderr:\n{}", stderr.trim_end());
        }

        Ok(ExecutionOutput {
            stdout: (!stdout.trim().is_empty()).then_some(stdout),
            stderr: (!stderr.trim().is_empty()).then_some(stderr),
        })
    }
}

impl PowerShellSession {
    /// stderr written by the current call, up to its marker line
    ///
    /// Anything after the marker stays buffered for the next call. If the
    /// marker does not show up in time, everything buffered so far is taken.
    fn take_stderr(&self, marker: &str) -> String {
        let (lock, ready) = &*self.stderr;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut buffer, _) = ready
            .wait_timeout_while(guard, STDERR_SETTLE, |b| {
                !b.closed && !b.text.contains(marker)
            })
            .unwrap_or_else(PoisonError::into_inner);

        take_through_marker(&mut buffer.text, marker)
    }
}

/// Remove and return the text before the marker line, dropping the marker
/// line itself. Without a marker the whole buffer is taken.
fn take_through_marker(text: &mut String, marker: &str) -> String {
    let Some(start) = text.find(marker) else {
        return std::mem::take(text);
    };
    let rest_start = text[start..]
        .find('\n')
        .map_or(text.len(), |end| start + end + 1);
    let rest = text.split_off(rest_start);
    text.truncate(start);
    std::mem::replace(text, rest)
}

impl Drop for PowerShellSession {
    fn drop(&mut self) {
        let _ = self.stdin.write_all(b"exit\n");
        let _ = self.stdin.flush();
        if self.child.try_wait().ok().flatten().is_none() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
        if let Some(reader) = self.stderr_reader.take() {
            let _ = reader.join();
        }
        log::debug!("PowerShell session closed after {} call(s)", self.calls);
    }
}

static GLOBAL_SESSION: OnceLock<Arc<SessionHandle>> = OnceLock::new();

/// Owned, lazily started, thread-safe handle to one interpreter
pub struct SessionHandle {
    config: PowerShellConfig,
    session: Mutex<Option<PowerShellSession>>,
}

impl SessionHandle {
    /// Create a handle; the interpreter starts on first use
    pub fn new(config: PowerShellConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }

    /// The process-wide handle
    ///
    /// The config only applies to the first call; later calls return the
    /// existing handle unchanged.
    pub fn global(config: PowerShellConfig) -> Arc<Self> {
        Arc::clone(GLOBAL_SESSION.get_or_init(|| Arc::new(Self::new(config))))
    }

    /// Whether an interpreter is currently running
    pub fn is_running(&self) -> bool {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Stop the interpreter; the next call starts a new one
    pub fn shutdown(&self) {
        let session = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(session);
    }
}

impl Invoker for SessionHandle {
    fn execute(&self, script: &str) -> Result<ExecutionOutput> {
        let mut guard = self.session.lock().unwrap_or_else(PoisonError::into_inner);

        if guard.is_none() {
            *guard = Some(PowerShellSession::spawn(&self.config)?);
        }
        let Some(session) = guard.as_mut() else {
            return Err(Error::session("interpreter unavailable", None));
        };

        let result = session.run(script);
        if let Err(Error::Session { .. }) = &result {
            // A session that failed mid-call is out of sync with its pipes
            *guard = None;
        }
        result
    }
}

/// A canned response for [`MockInvoker`]
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return this output
    Output(ExecutionOutput),
    /// Fail with a session error
    Fail(String),
}

/// Invoker for testing without PowerShell
///
/// Responses are returned in the order they were queued; once the queue is
/// empty every call returns output with no stdout. Submitted scripts are
/// recorded.
#[derive(Debug, Default)]
pub struct MockInvoker {
    responses: Mutex<VecDeque<MockResponse>>,
    scripts: Mutex<Vec<String>>,
}

impl MockInvoker {
    /// Create a mock with no queued responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response whose stdout is the given text
    pub fn push_stdout(&self, stdout: impl Into<String>) -> &Self {
        self.push(MockResponse::Output(ExecutionOutput::stdout(stdout)))
    }

    /// Queue a response with no stdout
    pub fn push_empty(&self) -> &Self {
        self.push(MockResponse::Output(ExecutionOutput::default()))
    }

    /// Queue a session failure
    pub fn push_failure(&self, message: impl Into<String>) -> &Self {
        self.push(MockResponse::Fail(message.into()))
    }

    /// Queue any response
    pub fn push(&self, response: MockResponse) -> &Self {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
        self
    }

    /// Scripts submitted so far
    pub fn scripts(&self) -> Vec<String> {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Invoker for MockInvoker {
    fn execute(&self, script: &str) -> Result<ExecutionOutput> {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(script.to_string());

        let response = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match response {
            Some(MockResponse::Output(output)) => Ok(output),
            Some(MockResponse::Fail(message)) => Err(Error::session(message, None)),
            None => Ok(ExecutionOutput::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PowerShellConfig::default();
        assert_eq!(config.path, PathBuf::from("pwsh"));
        assert_eq!(config.args.last().map(String::as_str), Some("-"));
        assert!(!config.debug);
    }

    #[test]
    fn test_handle_is_lazy() {
        let handle = SessionHandle::new(PowerShellConfig::default());
        assert!(!handle.is_running());
        handle.shutdown();
        assert!(!handle.is_running());
    }

    #[test]
    fn test_take_through_marker() {
        let mut text = "warning: one\n__m1__\nlate for next call\n".to_string();
        assert_eq!(take_through_marker(&mut text, "__m1__"), "warning: one\n");
        assert_eq!(text, "late for next call\n");

        let mut text = "__m2__\r\n".to_string();
        assert_eq!(take_through_marker(&mut text, "__m2__"), "");
        assert!(text.is_empty());

        let mut text = "no marker yet".to_string();
        assert_eq!(take_through_marker(&mut text, "__m3__"), "no marker yet");
        assert!(text.is_empty());
    }

    #[test]
    fn test_missing_interpreter_is_session_error() {
        let handle = SessionHandle::new(PowerShellConfig {
            path: PathBuf::from("/nonexistent/dscbridge-test/pwsh"),
            ..Default::default()
        });
        let err = handle.execute("Get-Date").unwrap_err();
        assert!(matches!(err, Error::Session { .. }));
        assert!(!handle.is_running());
    }

    #[cfg(unix)]
    #[test]
    fn test_session_round_trip_with_sh() {
        // A shell loop that speaks the same stdin protocol: the script line
        // prints the script file to stdout and stderr, the marker line echoes
        // the marker to stderr and then stdout.
        let handle = SessionHandle::new(PowerShellConfig {
            path: PathBuf::from("sh"),
            args: vec![
                "-c".to_string(),
                r#"while IFS= read -r line; do
                     case "$line" in
                       "& "*) eval "cat ${line#& }"; echo; eval "cat ${line#& }" >&2; echo >&2 ;;
                       "[Console]"*)
                         m=$(printf '%s\n' "$line" | sed "s/.*WriteLine('\([^']*\)').*/\1/")
                         echo "$m" >&2; echo "$m" ;;
                       exit) exit 0 ;;
                     esac
                   done"#
                    .to_string(),
            ],
            debug: true,
        });

        let output = handle.execute("{\"path\":\"/etc/foo\"}").unwrap();
        assert_eq!(output.stdout_text(), Some("{\"path\":\"/etc/foo\"}"));
        assert!(handle.is_running());

        // Each call sees only its own stderr
        for script in ["first", "second"] {
            let output = handle.execute(script).unwrap();
            assert_eq!(output.stdout_text(), Some(script));
            assert_eq!(output.stderr.as_deref().map(str::trim), Some(script));
        }

        let output = handle.execute("").unwrap();
        assert_eq!(output.stdout, None);
        assert_eq!(output.stderr, None);

        handle.shutdown();
        assert!(!handle.is_running());
    }

    #[test]
    fn test_mock_invoker_queue() {
        let mock = MockInvoker::new();
        mock.push_stdout("{}").push_empty().push_failure("boom");

        assert_eq!(mock.execute("a").unwrap().stdout_text(), Some("{}"));
        assert_eq!(mock.execute("b").unwrap().stdout, None);
        assert!(matches!(mock.execute("c"), Err(Error::Session { .. })));
        assert_eq!(mock.execute("d").unwrap(), ExecutionOutput::default());
        assert_eq!(mock.scripts(), vec!["a", "b", "c", "d"]);
    }
}
