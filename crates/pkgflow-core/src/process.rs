use std::fmt;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Exit code reported when a job ended without a real process exit status
/// (resolution failure, spawn failure, killed by a signal).
pub const NO_EXIT_CODE: i32 = -1;

/// Return the platform-appropriate shell executable and flag for running commands.
///
/// On Windows, returns `("cmd", "/C")` to invoke `cmd.exe /C <command>`.
/// On Unix-like systems, returns `("sh", "-c")` to invoke `sh -c <command>`.
pub fn shell_command() -> (&'static str, &'static str) {
    if cfg!(target_os = "windows") {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    }
}

/// A concrete external command: program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<P, I, S>(program: P, args: I) -> Self
    where
        P: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Run `script` through the platform shell.
    pub fn shell(script: impl Into<String>) -> Self {
        let (shell, flag) = shell_command();
        Self::new(shell, [flag.to_string(), script.into()])
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        write!(f, "{}", shell_words::join(words))
    }
}

/// Output and termination of a spawned process.
///
/// A handle yields zero or more `Output` events followed by exactly one
/// `Exited` or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Output { line: String, is_stderr: bool },
    /// The process exited; `None` when it was terminated by a signal.
    Exited(Option<i32>),
    /// Waiting on the process failed after it was spawned.
    Failed(String),
}

/// Live handle to a spawned process.
pub type ProcessHandle = UnboundedReceiver<ProcessEvent>;

/// Process spawning facility used by jobs.
pub trait Spawner: Send + Sync {
    /// Start `invocation` and return a handle streaming its output.
    ///
    /// Must be called from within a Tokio runtime. An `Err` means the
    /// process could not be started at all.
    fn spawn(&self, invocation: &Invocation) -> std::io::Result<ProcessHandle>;
}

/// Spawns real OS processes with `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSpawner;

impl Spawner for TokioSpawner {
    fn spawn(&self, invocation: &Invocation) -> std::io::Result<ProcessHandle> {
        let mut child = tokio::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // safety: we set Stdio::piped() above so these are always Some
        let stdout = child.stdout.take().expect("stdout piped");
        let stderr = child.stderr.take().expect("stderr piped");

        let (tx, rx) = mpsc::unbounded_channel();

        let stdout_task = tokio::spawn(stream_lines(stdout, false, tx.clone()));
        let stderr_task = tokio::spawn(stream_lines(stderr, true, tx.clone()));

        tokio::spawn(async move {
            let status = child.wait().await;

            // Ensure streaming tasks finish before the exit is reported.
            let _ = stdout_task.await;
            let _ = stderr_task.await;

            let event = match status {
                Ok(s) => ProcessEvent::Exited(s.code()),
                Err(e) => ProcessEvent::Failed(e.to_string()),
            };
            let _ = tx.send(event);
        });

        Ok(rx)
    }
}

/// Forward lines from a child pipe until EOF or until the receiver is gone.
///
/// Lines are split on raw bytes and decoded lossily, so output that is not
/// valid UTF-8 never cuts the stream short.
async fn stream_lines<R>(reader: R, is_stderr: bool, tx: UnboundedSender<ProcessEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = decode_line(&buf);
                if tx.send(ProcessEvent::Output { line, is_stderr }).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, is_stderr, "reading child output failed");
                break;
            }
        }
    }
}

/// Decode one raw line, dropping the `\n` or `\r\n` terminator.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Reports what would run without executing anything. Every invocation
/// "succeeds" with exit code 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunSpawner;

impl Spawner for DryRunSpawner {
    fn spawn(&self, invocation: &Invocation) -> std::io::Result<ProcessHandle> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(ProcessEvent::Output {
            line: format!("would run: {}", invocation),
            is_stderr: false,
        });
        let _ = tx.send(ProcessEvent::Exited(Some(0)));
        Ok(rx)
    }
}
