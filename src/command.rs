//! Synchronous external-process sessions.
//!
//! Graded submissions are often compiled programs: the harness runs
//! them, feeds scripted stdin, and grades the captured streams. Sessions
//! block until the child exits (or the caller's deadline fires), and
//! both output pipes are drained while waiting so a chatty child can
//! never fill a pipe buffer and hang the run. A deadline bounds the
//! whole session even when the child leaves forked processes behind
//! still holding the pipes.

use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::errors::CommandError;

/// Captured outcome of one finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code, -1 when the child was killed by a signal.
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout split on newline runs; empty lines are dropped.
    pub fn stdout_lines(&self) -> Vec<&str> {
        split_lines(&self.stdout)
    }

    /// Stderr split on newline runs; empty lines are dropped.
    pub fn stderr_lines(&self) -> Vec<&str> {
        split_lines(&self.stderr)
    }

    /// Print the child's streams to stdout, stderr marked off below.
    pub fn dump(&self) {
        print!("{}", self.stdout);
        if !self.stderr.is_empty() {
            println!("--- stderr ---");
            print!("{}", self.stderr);
        }
    }
}

fn split_lines(text: &str) -> Vec<&str> {
    text.split(['\r', '\n']).filter(|l| !l.is_empty()).collect()
}

/// Builder for one run of an external command.
#[derive(Debug, Clone)]
pub struct CommandSession {
    command: Vec<String>,
    stdin: Option<String>,
    timeout: Option<Duration>,
    echo_output: bool,
}

impl CommandSession {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            command: vec![program.into()],
            stdin: None,
            timeout: None,
            echo_output: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.command.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command.extend(args.into_iter().map(Into::into));
        self
    }

    /// Text to feed the child's stdin. The pipe closes once it is
    /// written, so line-reading children see end of input.
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Deadline for the whole run, output draining included. Without one
    /// the session waits indefinitely.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Echo the child's streams to stdout after the run.
    pub fn echo_output(mut self, echo: bool) -> Self {
        self.echo_output = echo;
        self
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn run(&self) -> Result<CommandResult, CommandError> {
        let result = run_command(&self.command, self.stdin.as_deref(), self.timeout)?;
        if self.echo_output {
            result.dump();
        }
        Ok(result)
    }
}

/// One-shot run of a command line, optionally feeding stdin.
pub fn execute(command: &[String], input: Option<&str>) -> Result<CommandResult, CommandError> {
    run_command(command, input, None)
}

fn run_command(
    command: &[String],
    input: Option<&str>,
    timeout: Option<Duration>,
) -> Result<CommandResult, CommandError> {
    let (program, args) = command.split_first().ok_or(CommandError::EmptyCommand)?;
    // Not named `display`: the tracing macros import `field::display`
    // into their expansion, which shadows a local of the same name.
    let command_line = command.join(" ");
    debug!(command = %command_line, "spawning child process");

    let mut child = Command::new(program)
        .args(args)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| CommandError::Spawn {
            command: command_line.clone(),
            source,
        })?;

    if let Some(input) = input
        && let Some(mut stdin) = child.stdin.take()
    {
        if let Err(source) = stdin.write_all(input.as_bytes()) {
            // Reap before surfacing the error or the child leaks.
            let _ = child.kill();
            let _ = child.wait();
            return Err(CommandError::Stdin(source));
        }
        // Dropping the handle closes the pipe.
    }

    match timeout {
        None => {
            let output = child.wait_with_output().map_err(CommandError::Output)?;
            Ok(CommandResult {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code().unwrap_or(-1),
            })
        }
        Some(timeout) => wait_with_deadline(&mut child, timeout, &command_line),
    }
}

fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
    command_line: &str,
) -> Result<CommandResult, CommandError> {
    let stdout_drain = spawn_drain(child.stdout.take());
    let stderr_drain = spawn_drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let timed_out = || CommandError::TimedOut {
        command: command_line.to_string(),
        timeout,
    };

    let status = loop {
        match child.try_wait().map_err(CommandError::Output)? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                // The drains stay parked until every holder of the pipe
                // write-ends exits, so a forked grandchild would turn a
                // join here into an unbounded wait. Leave them to finish
                // at pipe EOF on their own.
                return Err(timed_out());
            }
            None => thread::sleep(Duration::from_millis(10)),
        }
    };

    // An exited child can leave forked processes holding the pipes open;
    // the remaining deadline bounds the drain as well.
    let stdout = recv_until(&stdout_drain, deadline).ok_or_else(timed_out)?;
    let stderr = recv_until(&stderr_drain, deadline).ok_or_else(timed_out)?;

    Ok(CommandResult {
        stdout,
        stderr,
        exit_code: status.code().unwrap_or(-1),
    })
}

fn recv_until(drain: &mpsc::Receiver<String>, deadline: Instant) -> Option<String> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    drain.recv_timeout(remaining).ok()
}

fn spawn_drain<R: Read + Send + 'static>(source: Option<R>) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut bytes = Vec::new();
        if let Some(mut source) = source {
            let _ = source.read_to_end(&mut bytes);
        }
        let _ = tx.send(String::from_utf8_lossy(&bytes).into_owned());
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSession {
        CommandSession::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn captures_stdout_and_exit_code() {
        let result = CommandSession::new("echo").arg("hello").run().unwrap();
        assert_eq!(result.stdout, "hello\n");
        assert_eq!(result.exit_code, 0);
        assert!(result.success());
    }

    #[test]
    fn non_zero_exits_are_reported_not_errors() {
        let result = sh("exit 3").run().unwrap();
        assert_eq!(result.exit_code, 3);
        assert!(!result.success());
    }

    #[test]
    fn stderr_is_captured_separately() {
        let result = sh("echo out; echo err >&2").run().unwrap();
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
    }

    #[test]
    fn stdin_is_fed_and_closed() {
        let result = CommandSession::new("cat").stdin("scripted input").run().unwrap();
        assert_eq!(result.stdout, "scripted input");
    }

    #[test]
    fn line_helpers_drop_empty_lines() {
        let result = sh(r#"printf 'a\nb\n\nc\n'"#).run().unwrap();
        assert_eq!(result.stdout_lines(), vec!["a", "b", "c"]);
    }

    #[test]
    fn timeout_kills_slow_children() {
        let started = Instant::now();
        let err = sh("sleep 30")
            .timeout(Duration::from_millis(100))
            .run()
            .unwrap_err();
        assert!(matches!(err, CommandError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn fast_children_beat_the_deadline() {
        let result = CommandSession::new("echo")
            .arg("quick")
            .timeout(Duration::from_secs(30))
            .run()
            .unwrap();
        assert_eq!(result.stdout, "quick\n");
    }

    #[test]
    fn chatty_children_do_not_deadlock_under_a_deadline() {
        // Well past the 64K pipe buffer.
        let result = sh("head -c 200000 /dev/zero")
            .timeout(Duration::from_secs(30))
            .run()
            .unwrap();
        assert_eq!(result.stdout.chars().count(), 200000);
    }

    #[test]
    fn timeout_is_not_extended_by_surviving_grandchildren() {
        // The backgrounded sleep outlives the killed shell while holding
        // the pipe write-ends.
        let started = Instant::now();
        let err = sh("sleep 30 & wait")
            .timeout(Duration::from_millis(100))
            .run()
            .unwrap_err();
        assert!(matches!(err, CommandError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn exited_children_with_held_pipes_still_hit_the_deadline() {
        // The shell exits at once; its backgrounded sleep keeps the pipe
        // write-ends open well past the deadline.
        let started = Instant::now();
        let err = sh("sleep 30 &")
            .timeout(Duration::from_millis(200))
            .run()
            .unwrap_err();
        assert!(matches!(err, CommandError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn empty_command_lines_are_rejected() {
        let err = execute(&[], None).unwrap_err();
        assert!(matches!(err, CommandError::EmptyCommand));
    }

    #[test]
    fn missing_programs_surface_spawn_errors() {
        let err = CommandSession::new("definitely-not-a-real-binary-7f3a")
            .run()
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[test]
    fn execute_helper_runs_a_plain_command_line() {
        let command = vec!["echo".to_string(), "one-shot".to_string()];
        let result = execute(&command, None).unwrap();
        assert_eq!(result.stdout, "one-shot\n");
    }
}
