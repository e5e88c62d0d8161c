//! Application running as a child process.
//!
//! The child is spawned with piped stdin/stdout and spoken to with the
//! line protocol. A reader thread forwards stdout lines over a channel;
//! every wait on that channel is bounded by a deadline.

use std::collections::BTreeSet;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use super::AppConnection;
use super::protocol::{Request, Response, send};
use super::types::{AppError, AppResult, ApplyReport, InputAssignment, LateReply, LaunchOptions, ValueReport};
use crate::config::{ENV_SEED, ENV_TEST_MODE};

/// How long a child gets to exit after `shutdown` before it is killed
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// Configuration for launching an application process
#[derive(Debug, Clone, Default)]
pub struct ProcessConfig {
    /// Path to the application binary
    pub command: PathBuf,
    pub args: Vec<String>,
    /// Extra environment for the child
    pub envs: Vec<(String, String)>,
    pub working_dir: Option<PathBuf>,
}

impl ProcessConfig {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

pub struct ProcessApp {
    config: ProcessConfig,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    rx: Option<Receiver<String>>,
    next_id: u64,
    /// Requests whose replies nobody waits for
    abandoned: BTreeSet<u64>,
    /// Problems found in abandoned replies, until the driver takes them
    late: Vec<LateReply>,
    request_timeout: Duration,
}

impl ProcessApp {
    pub fn new(config: ProcessConfig) -> Self {
        Self {
            config,
            child: None,
            stdin: None,
            rx: None,
            next_id: 0,
            abandoned: BTreeSet::new(),
            late: Vec::new(),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn for_binary(path: impl Into<PathBuf>) -> Self {
        Self::new(ProcessConfig::new(path))
    }

    pub fn command(&self) -> &Path {
        &self.config.command
    }

    fn request(&mut self, request: &Request) -> AppResult<()> {
        let stdin = self.stdin.as_mut().ok_or(AppError::NotStarted)?;
        send(stdin, request).map_err(|err| match err {
            AppError::Io(e) if e.kind() == std::io::ErrorKind::BrokenPipe => AppError::Closed,
            other => other,
        })
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Receive the next protocol message before the deadline
    fn recv_until(&self, deadline: Instant, waited_from: Instant) -> AppResult<Response> {
        let rx = self.rx.as_ref().ok_or(AppError::NotStarted)?;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(AppError::Timeout {
                    waited: waited_from.elapsed(),
                });
            }
            match rx.recv_timeout(remaining) {
                Ok(line) => match serde_json::from_str::<Response>(&line) {
                    Ok(response) => return Ok(response),
                    Err(_) => {
                        tracing::debug!(line = %line, "ignoring non-protocol output from application");
                    }
                },
                Err(RecvTimeoutError::Timeout) => {
                    return Err(AppError::Timeout {
                        waited: waited_from.elapsed(),
                    });
                }
                Err(RecvTimeoutError::Disconnected) => return Err(AppError::Closed),
            }
        }
    }

    /// Wait for the reply to `id`, keeping what matters from replies to abandoned requests
    fn await_reply(&mut self, id: u64, timeout: Duration) -> AppResult<Response> {
        let started = Instant::now();
        let deadline = started + timeout;
        loop {
            let response = match self.recv_until(deadline, started) {
                Ok(response) => response,
                Err(AppError::Timeout { waited }) => {
                    // The reply may still arrive; make sure it is skipped later
                    self.abandoned.insert(id);
                    return Err(AppError::Timeout { waited });
                }
                Err(err) => return Err(err),
            };

            match response.id() {
                Some(reply_id) if reply_id == id => {
                    return match response {
                        Response::Error { message, .. } => Err(AppError::Rejected(message)),
                        other => Ok(other),
                    };
                }
                Some(reply_id) if self.abandoned.remove(&reply_id) => self.keep_late_reply(reply_id, response),
                None => {
                    if let Response::Error { message, .. } = response {
                        return Err(AppError::Protocol(message));
                    }
                }
                Some(reply_id) => {
                    tracing::debug!(request = reply_id, "discarding reply to unknown request");
                }
            }
        }
    }

    fn keep_late_reply(&mut self, id: u64, response: Response) {
        match response {
            Response::Applied { unbound, .. } if !unbound.is_empty() => {
                tracing::warn!(request = id, names = ?unbound, "inputs without binding were not applied");
                self.late.push(LateReply::Unbound(unbound));
            }
            Response::Error { message, .. } => {
                tracing::warn!(request = id, error = %message, "batch sent without waiting failed");
                self.late.push(LateReply::Failed(message));
            }
            _ => {}
        }
    }

    fn wait_ready(&mut self, timeout: Duration) -> AppResult<()> {
        let started = Instant::now();
        let deadline = started + timeout;
        loop {
            match self.recv_until(deadline, started)? {
                Response::Ready => return Ok(()),
                other => tracing::debug!(message = ?other, "message before ready"),
            }
        }
    }

    fn kill_child(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn spawn_reader(stdout: impl Read + Send + 'static) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let reader = BufReader::new(stdout);
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    });
    rx
}

/// Give the child `grace` to exit, then kill it. The child is reaped on
/// every path. Returns whether it exited on its own.
fn stop_child(mut child: Child, grace: Duration) -> AppResult<bool> {
    let started = Instant::now();
    while started.elapsed() < grace {
        match child.try_wait() {
            Ok(Some(_)) => return Ok(true),
            Ok(None) => thread::sleep(Duration::from_millis(20)),
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(err.into());
            }
        }
    }
    let _ = child.kill();
    child.wait()?;
    Ok(false)
}

impl AppConnection for ProcessApp {
    fn start(&mut self, options: &LaunchOptions) -> AppResult<()> {
        if self.child.is_some() {
            return Err(AppError::Launch("application already started".to_string()));
        }

        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        for (key, value) in &self.config.envs {
            cmd.env(key, value);
        }
        if options.test_mode {
            cmd.env(ENV_TEST_MODE, "1");
        }
        match options.seed {
            Some(seed) => cmd.env(ENV_SEED, seed.to_string()),
            None => cmd.env_remove(ENV_SEED),
        };
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            AppError::Launch(format!("failed to spawn '{}': {}", self.config.command.display(), e))
        })?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let (Some(stdin), Some(stdout)) = (stdin, stdout) else {
            let _ = child.kill();
            return Err(AppError::Launch("child stdio was not captured".to_string()));
        };

        self.rx = Some(spawn_reader(stdout));
        self.stdin = Some(stdin);
        self.child = Some(child);
        self.request_timeout = options.request_timeout;

        if let Err(err) = self.wait_ready(options.load_timeout) {
            self.kill_child();
            self.stdin = None;
            self.rx = None;
            return Err(match err {
                AppError::Timeout { waited } => {
                    AppError::Launch(format!("application did not report ready within {:?}", waited))
                }
                AppError::Closed => AppError::Launch("application exited during startup".to_string()),
                other => other,
            });
        }

        tracing::info!(command = %self.config.command.display(), seed = ?options.seed, "application process ready");
        Ok(())
    }

    fn apply_inputs(&mut self, inputs: &[InputAssignment], wait: Option<Duration>) -> AppResult<ApplyReport> {
        let id = self.allocate_id();
        self.request(&Request::SetInputs {
            id,
            inputs: inputs.to_vec(),
        })?;

        let Some(timeout) = wait else {
            self.abandoned.insert(id);
            return Ok(ApplyReport::default());
        };

        match self.await_reply(id, timeout)? {
            Response::Applied { values, unbound, .. } => Ok(ApplyReport {
                values: Some(values),
                unbound,
            }),
            other => Err(AppError::Protocol(format!("unexpected reply to set_inputs: {:?}", other))),
        }
    }

    fn values(&mut self) -> AppResult<ValueReport> {
        let id = self.allocate_id();
        self.request(&Request::GetValues { id })?;
        match self.await_reply(id, self.request_timeout)? {
            Response::Values { values, .. } => Ok(values),
            other => Err(AppError::Protocol(format!("unexpected reply to get_values: {:?}", other))),
        }
    }

    fn take_late_replies(&mut self) -> Vec<LateReply> {
        std::mem::take(&mut self.late)
    }

    fn source_type(&self) -> &str {
        "process"
    }

    fn close(&mut self) -> AppResult<()> {
        if let Some(mut stdin) = self.stdin.take() {
            let _ = send(&mut stdin, &Request::Shutdown);
        }
        self.rx = None;

        let Some(child) = self.child.take() else {
            return Ok(());
        };
        if !stop_child(child, EXIT_GRACE)? {
            tracing::warn!(command = %self.config.command.display(), "application did not exit after shutdown, killed");
        }
        Ok(())
    }
}

impl Drop for ProcessApp {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_config_builder() {
        let config = ProcessConfig::new("/bin/app")
            .arg("--verbose")
            .args(["a", "b"])
            .env("KEY", "VALUE")
            .working_dir("/tmp");
        assert_eq!(config.command, PathBuf::from("/bin/app"));
        assert_eq!(config.args, vec!["--verbose", "a", "b"]);
        assert_eq!(config.envs, vec![("KEY".to_string(), "VALUE".to_string())]);
        assert_eq!(config.working_dir, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn test_missing_binary_fails_to_launch() {
        let mut app = ProcessApp::for_binary("/definitely/not/a/binary");
        assert_eq!(app.command(), Path::new("/definitely/not/a/binary"));
        let err = app.start(&LaunchOptions::default()).unwrap_err();
        assert!(matches!(err, AppError::Launch(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_child_kills_after_grace() {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id();
        let started = Instant::now();

        let exited_alone = stop_child(child, Duration::from_millis(100)).unwrap();

        assert!(!exited_alone);
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!Path::new(&format!("/proc/{}", pid)).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_child_sees_clean_exit() {
        let child = Command::new("true").spawn().unwrap();
        assert!(stop_child(child, Duration::from_secs(5)).unwrap());
    }

    #[test]
    fn test_abandoned_replies_are_kept_until_taken() {
        let mut app = ProcessApp::for_binary("/definitely/not/a/binary");
        app.keep_late_reply(
            1,
            Response::Error {
                id: Some(1),
                message: "observer of 'add' failed".to_string(),
            },
        );
        app.keep_late_reply(
            2,
            Response::Applied {
                id: 2,
                values: ValueReport::default(),
                unbound: vec!["slider".to_string()],
            },
        );
        app.keep_late_reply(
            3,
            Response::Applied {
                id: 3,
                values: ValueReport::default(),
                unbound: Vec::new(),
            },
        );

        assert_eq!(
            app.take_late_replies(),
            vec![
                LateReply::Failed("observer of 'add' failed".to_string()),
                LateReply::Unbound(vec!["slider".to_string()]),
            ]
        );
        assert!(app.take_late_replies().is_empty());
    }

    #[test]
    fn test_requests_before_start_fail() {
        let mut app = ProcessApp::for_binary("/definitely/not/a/binary");
        assert!(matches!(app.values(), Err(AppError::NotStarted)));
    }
}
