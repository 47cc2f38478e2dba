//! External process execution with concurrent capture of stdout and stderr.
//!
//! [`execute`] runs a shell command line and drains both child pipes from a
//! single thread.  Each pipe is a small state machine ([`StreamState`]) fed
//! by non-blocking reads ([`PollRead`]); when neither pipe has anything to
//! offer the loop parks on a bounded readiness wait instead of spinning, so a
//! child that fills one pipe while the other is idle can never deadlock.
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use anyhow::{Context as _, Result, bail};

use crate::error::ExecError;

/// Upper bound for a single readiness wait, in milliseconds.
#[cfg(unix)]
const POLL_TIMEOUT_MS: u16 = 100;

/// Size of the scratch buffer used for each non-blocking read.
const CHUNK_SIZE: usize = 8192;

/// Exit code a POSIX shell reports when the command could not be found.
const COMMAND_NOT_FOUND: i32 = 127;

/// Result of a command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Whether the child exited successfully.
    pub success: bool,
    /// Raw exit code; `None` when the child was terminated by a signal.
    pub code: Option<i32>,
    /// Everything the child wrote to standard output.
    pub stdout: Vec<u8>,
    /// Everything the child wrote to standard error.
    pub stderr: Vec<u8>,
}

impl CommandResult {
    /// Standard output decoded lossily as UTF-8.
    #[must_use]
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Standard error decoded lossily as UTF-8.
    #[must_use]
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// `true` when the shell reported that the command does not exist.
    #[must_use]
    pub const fn command_not_found(&self) -> bool {
        matches!(self.code, Some(COMMAND_NOT_FOUND))
    }
}

/// Abstraction over process execution so resources can be unit-tested.
#[cfg_attr(test, mockall::automock)]
pub trait Executor: Send + Sync {
    /// Run `command_line` through the shell and capture both streams.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] if the child cannot be spawned or its streams
    /// cannot be read.  A non-zero exit is reported in the result.
    fn execute(
        &self,
        command_line: &str,
        verbose: bool,
        silent: bool,
    ) -> std::result::Result<CommandResult, ExecError>;

    /// Check if a program is available on `PATH`.
    fn which(&self, program: &str) -> bool;

    /// Resolve the target of the symlink at `path` with `readlink`.
    ///
    /// # Errors
    ///
    /// Returns an error if `readlink` cannot be run or reports failure
    /// (e.g. `path` is not a symlink).
    fn read_link(&self, path: &Path) -> Result<PathBuf> {
        let command = format!("readlink {}", shell_quote(path));
        let result = self.execute(&command, false, true)?;
        if !result.success {
            bail!(
                "readlink {} failed (exit {}): {}",
                path.display(),
                result.code.unwrap_or(-1),
                result.stderr_str().trim()
            );
        }
        let mut target = result.stdout;
        if target.last() == Some(&b'\n') {
            target.pop();
        }
        bytes_to_path(target)
    }
}

/// Production [`Executor`] that spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn execute(
        &self,
        command_line: &str,
        verbose: bool,
        silent: bool,
    ) -> std::result::Result<CommandResult, ExecError> {
        execute(command_line, verbose, silent)
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

#[cfg(unix)]
#[allow(clippy::unnecessary_wraps)]
fn bytes_to_path(bytes: Vec<u8>) -> Result<PathBuf> {
    use std::os::unix::ffi::OsStringExt as _;
    Ok(PathBuf::from(std::ffi::OsString::from_vec(bytes)))
}

#[cfg(not(unix))]
fn bytes_to_path(bytes: Vec<u8>) -> Result<PathBuf> {
    let s = String::from_utf8(bytes).context("readlink output is not UTF-8")?;
    Ok(PathBuf::from(s))
}

/// Quote `path` for safe interpolation into a POSIX shell command line.
#[must_use]
pub fn shell_quote(path: &Path) -> String {
    let raw = path.to_string_lossy();
    format!("'{}'", raw.replace('\'', r"'\''"))
}

/// Run `command_line` through the shell, draining stdout and stderr
/// concurrently.
///
/// With `verbose` the command line is logged before spawning.  Unless
/// `silent`, output is forwarded to this process's stdout/stderr as it
/// arrives while also being captured.
///
/// # Errors
///
/// Returns [`ExecError::Spawn`] if the shell cannot be started and
/// [`ExecError::Io`] if reading the pipes or waiting for the child fails.
pub fn execute(
    command_line: &str,
    verbose: bool,
    silent: bool,
) -> std::result::Result<CommandResult, ExecError> {
    if verbose {
        tracing::info!(target: "dotsync::exec", "{command_line}");
    }

    let mut child = shell_command(command_line)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExecError::Spawn {
            command: command_line.to_string(),
            source,
        })?;

    let io_err = |source| ExecError::Io {
        command: command_line.to_string(),
        source,
    };

    let (stdout, stderr) = match drain(&mut child, silent) {
        Ok(buffers) => buffers,
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(io_err(e));
        }
    };
    let status = child.wait().map_err(io_err)?;

    tracing::debug!(
        "exit {} from: {command_line}",
        status.code().map_or_else(|| "signal".to_string(), |c| c.to_string())
    );

    Ok(CommandResult {
        success: status.success(),
        code: status.code(),
        stdout,
        stderr,
    })
}

fn shell_command(command_line: &str) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command_line);
        cmd
    }
    #[cfg(not(windows))]
    {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command_line);
        cmd
    }
}

/// Lifecycle of one child output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// The pipe may still produce data.
    Open,
    /// End-of-stream was observed.
    Closed,
}

/// Outcome of a single non-blocking read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollRead {
    /// This many bytes were appended to the stream buffer.
    Data(usize),
    /// Nothing available right now.
    WouldBlock,
    /// The stream reached end-of-stream on this read.
    Closed,
}

/// Which live channel a stream is echoed to.
#[derive(Debug, Clone, Copy)]
enum Channel {
    Stdout,
    Stderr,
}

/// One captured child stream.
#[derive(Debug)]
struct Stream<R> {
    reader: Option<R>,
    state: StreamState,
    buf: Vec<u8>,
    channel: Channel,
}

impl<R> Stream<R> {
    fn is_open(&self) -> bool {
        self.state == StreamState::Open
    }
}

impl<R: Read> Stream<R> {
    fn new(reader: Option<R>, channel: Channel) -> Self {
        let state = if reader.is_some() {
            StreamState::Open
        } else {
            StreamState::Closed
        };
        Self {
            reader,
            state,
            buf: Vec::new(),
            channel,
        }
    }

    /// Attempt one read, appending whatever is available to the buffer.
    fn poll_read(&mut self, chunk: &mut [u8]) -> io::Result<PollRead> {
        let Some(reader) = self.reader.as_mut() else {
            self.state = StreamState::Closed;
            return Ok(PollRead::Closed);
        };
        match reader.read(chunk) {
            Ok(0) => {
                self.state = StreamState::Closed;
                self.reader = None;
                Ok(PollRead::Closed)
            }
            Ok(n) => {
                self.buf.extend_from_slice(chunk.get(..n).unwrap_or_default());
                Ok(PollRead::Data(n))
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(PollRead::WouldBlock)
            }
            Err(e) => Err(e),
        }
    }

    /// Forward the last `n` captured bytes to the matching live channel.
    fn echo_tail(&self, n: usize) -> io::Result<()> {
        let start = self.buf.len().saturating_sub(n);
        let bytes = self.buf.get(start..).unwrap_or_default();
        match self.channel {
            Channel::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(bytes)?;
                out.flush()
            }
            Channel::Stderr => {
                let mut err = io::stderr().lock();
                err.write_all(bytes)?;
                err.flush()
            }
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Read both child pipes until each reports end-of-stream.
#[cfg(unix)]
fn drain(child: &mut Child, silent: bool) -> io::Result<(Vec<u8>, Vec<u8>)> {
    use std::os::fd::AsFd as _;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    if let Some(ref s) = stdout {
        set_nonblocking(s.as_fd())?;
    }
    if let Some(ref s) = stderr {
        set_nonblocking(s.as_fd())?;
    }

    let mut out = Stream::new(stdout, Channel::Stdout);
    let mut err = Stream::new(stderr, Channel::Stderr);
    let mut chunk = vec![0u8; CHUNK_SIZE];

    while out.is_open() || err.is_open() {
        let mut progressed = false;

        if out.is_open() {
            match out.poll_read(&mut chunk)? {
                PollRead::Data(n) => {
                    progressed = true;
                    if !silent {
                        out.echo_tail(n)?;
                    }
                }
                PollRead::Closed => progressed = true,
                PollRead::WouldBlock => {}
            }
        }
        if err.is_open() {
            match err.poll_read(&mut chunk)? {
                PollRead::Data(n) => {
                    progressed = true;
                    if !silent {
                        err.echo_tail(n)?;
                    }
                }
                PollRead::Closed => progressed = true,
                PollRead::WouldBlock => {}
            }
        }

        if !progressed {
            wait_readable(&out, &err)?;
        }
    }

    Ok((out.into_bytes(), err.into_bytes()))
}

/// Block until one of the still-open streams is readable, or the bounded
/// timeout elapses.
#[cfg(unix)]
fn wait_readable<O, E>(out: &Stream<O>, err: &Stream<E>) -> io::Result<()>
where
    O: std::os::fd::AsFd,
    E: std::os::fd::AsFd,
{
    use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

    let mut fds: Vec<PollFd<'_>> = Vec::with_capacity(2);
    if let Some(r) = out.reader.as_ref().filter(|_| out.is_open()) {
        fds.push(PollFd::new(r.as_fd(), PollFlags::POLLIN));
    }
    if let Some(r) = err.reader.as_ref().filter(|_| err.is_open()) {
        fds.push(PollFd::new(r.as_fd(), PollFlags::POLLIN));
    }
    if fds.is_empty() {
        return Ok(());
    }
    match poll(&mut fds, PollTimeout::from(POLL_TIMEOUT_MS)) {
        Ok(_) | Err(nix::errno::Errno::EINTR) => Ok(()),
        Err(e) => Err(io::Error::from(e)),
    }
}

#[cfg(unix)]
fn set_nonblocking(fd: std::os::fd::BorrowedFd<'_>) -> io::Result<()> {
    use nix::fcntl::{FcntlArg, OFlag, fcntl};
    use std::os::fd::AsRawFd as _;

    let raw = fd.as_raw_fd();
    let flags = OFlag::from_bits_truncate(fcntl(raw, FcntlArg::F_GETFL)?);
    fcntl(raw, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}

/// Fallback for platforms without `poll(2)`: let the standard library drain
/// both pipes, then echo the captured output.
#[cfg(not(unix))]
fn drain(child: &mut Child, silent: bool) -> io::Result<(Vec<u8>, Vec<u8>)> {
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let err_handle = std::thread::spawn(move || -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(s) = stderr.as_mut() {
            s.read_to_end(&mut buf)?;
        }
        Ok(buf)
    });
    let mut out_buf = Vec::new();
    if let Some(s) = stdout.as_mut() {
        s.read_to_end(&mut out_buf)?;
    }
    let err_buf = err_handle
        .join()
        .map_err(|_| io::Error::other("stderr reader panicked"))??;
    if !silent {
        io::stdout().write_all(&out_buf)?;
        io::stderr().write_all(&err_buf)?;
    }
    Ok((out_buf, err_buf))
}

/// Run a command line and fail unless it exits successfully.
///
/// # Errors
///
/// Returns an error if the command cannot be spawned or exits non-zero.
pub fn run_checked(
    executor: &dyn Executor,
    command_line: &str,
    verbose: bool,
    silent: bool,
) -> Result<CommandResult> {
    let result = executor
        .execute(command_line, verbose, silent)
        .with_context(|| format!("failed to execute: {command_line}"))?;
    if result.command_not_found() {
        bail!("{command_line}: command not found");
    }
    if !result.success {
        bail!(
            "{command_line} failed (exit {}): {}",
            result.code.unwrap_or(-1),
            result.stderr_str().trim()
        );
    }
    Ok(result)
}

#[cfg(all(test, unix))]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn execute_captures_stdout() {
        let result = execute("echo hello", false, true).unwrap();
        assert!(result.success, "echo command should succeed");
        assert_eq!(result.code, Some(0));
        assert_eq!(result.stdout, b"hello\n");
        assert!(result.stderr.is_empty());
    }

    #[test]
    fn execute_separates_streams() {
        let result = execute("printf out; printf err >&2", false, true).unwrap();
        assert_eq!(result.stdout, b"out");
        assert_eq!(result.stderr, b"err");
    }

    #[test]
    fn execute_reports_non_zero_exit_without_error() {
        let result = execute("exit 3", false, true).unwrap();
        assert!(!result.success);
        assert_eq!(result.code, Some(3));
        assert!(!result.command_not_found());
    }

    #[test]
    fn execute_flags_missing_command() {
        let result = execute("this-program-does-not-exist-12345", false, true).unwrap();
        assert!(!result.success);
        assert!(result.command_not_found());
    }

    #[test]
    fn execute_drains_both_streams_past_pipe_capacity() {
        // Both writers run at once, each producing far more than a pipe
        // buffer holds.
        let cmd = "head -c 300000 /dev/zero | tr '\\0' o & \
                   head -c 300000 /dev/zero | tr '\\0' e >&2; wait";
        let result = execute(cmd, false, true).unwrap();
        assert!(result.success);
        assert_eq!(result.stdout.len(), 300_000);
        assert_eq!(result.stderr.len(), 300_000);
        assert!(result.stdout.iter().all(|&b| b == b'o'));
        assert!(result.stderr.iter().all(|&b| b == b'e'));
    }

    #[test]
    fn execute_handles_stderr_closing_first() {
        let result = execute("exec 2>&-; sleep 0.2; echo late", false, true).unwrap();
        assert!(result.success);
        assert_eq!(result.stdout_str(), "late\n");
    }

    #[test]
    fn stream_state_machine_transitions_to_closed() {
        let mut stream = Stream::new(Some(&b"abc"[..]), Channel::Stdout);
        let mut chunk = [0u8; 2];
        assert_eq!(stream.poll_read(&mut chunk).unwrap(), PollRead::Data(2));
        assert_eq!(stream.poll_read(&mut chunk).unwrap(), PollRead::Data(1));
        assert!(stream.is_open());
        assert_eq!(stream.poll_read(&mut chunk).unwrap(), PollRead::Closed);
        assert_eq!(stream.state, StreamState::Closed);
        assert_eq!(stream.into_bytes(), b"abc");
    }

    #[test]
    fn wait_readable_parks_on_idle_pipe_and_wakes_on_data() {
        let (reader, mut writer) = std::io::pipe().unwrap();
        let out = Stream::new(Some(reader), Channel::Stdout);
        let err: Stream<std::io::PipeReader> = Stream::new(None, Channel::Stderr);
        assert!(out.is_open());
        assert!(!err.is_open());

        let started = std::time::Instant::now();
        wait_readable(&out, &err).unwrap();
        assert!(started.elapsed() >= std::time::Duration::from_millis(50));

        writer.write_all(b"x").unwrap();
        let started = std::time::Instant::now();
        wait_readable(&out, &err).unwrap();
        assert!(started.elapsed() < std::time::Duration::from_millis(50));
    }

    #[test]
    fn wait_readable_returns_when_both_streams_closed() {
        let out: Stream<std::io::PipeReader> = Stream::new(None, Channel::Stdout);
        let err: Stream<std::io::PipeReader> = Stream::new(None, Channel::Stderr);
        wait_readable(&out, &err).unwrap();
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote(Path::new("/tmp/a b")), "'/tmp/a b'");
        assert_eq!(shell_quote(Path::new("it's")), r"'it'\''s'");
    }

    #[test]
    fn read_link_resolves_symlink_target() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("link name");
        std::os::unix::fs::symlink("/some/where", &link).unwrap();
        let target = SystemExecutor.read_link(&link).unwrap();
        assert_eq!(target, PathBuf::from("/some/where"));
    }

    #[test]
    fn read_link_fails_for_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, "x").unwrap();
        assert!(SystemExecutor.read_link(&file).is_err());
    }

    #[test]
    fn run_checked_bails_on_failure() {
        let err = run_checked(&SystemExecutor, "false", false, true).unwrap_err();
        assert!(err.to_string().contains("failed"));
    }

    #[test]
    fn which_finds_known_program() {
        assert!(SystemExecutor.which("sh"));
        assert!(!SystemExecutor.which("this-program-does-not-exist-12345"));
    }
}
