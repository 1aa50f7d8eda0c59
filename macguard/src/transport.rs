use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Result of one remote command: success flag plus combined output.
///
/// Failures (non-zero exit, timeout, spawn error, unreachable host) are all
/// reported as `ok = false` with a descriptive output string; nothing
/// escapes this boundary as a panic or error value.
#[derive(Debug, Clone)]
pub struct CmdOutcome {
    pub ok: bool,
    pub output: String,
}

impl CmdOutcome {
    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            ok: false,
            output: output.into(),
        }
    }
}

/// Executes commands against the remote firewall appliance.
///
/// The reconciler talks to the appliance only through this trait, so tests
/// can substitute a scripted fake and the orchestration never touches
/// process or network APIs directly.
pub trait Transport {
    /// Run a shell command on the appliance, bounded by the transport timeout.
    fn run(&self, command: &str) -> CmdOutcome;

    /// Transfer a buffer to `remote_path` on the appliance.
    fn push_file(&self, bytes: &[u8], remote_path: &str) -> bool;
}

/// SSH/SCP transport using a pre-provisioned key file.
#[derive(Debug, Clone)]
pub struct SshTransport {
    host: String,
    user: String,
    key_path: PathBuf,
    timeout: Duration,
}

impl SshTransport {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        key_path: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            key_path: key_path.into(),
            timeout,
        }
    }

    fn target(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Spawn `program` with piped output and wait until exit or deadline.
    ///
    /// Output is drained on separate threads while the main thread polls the
    /// child, so a command producing more than a pipe buffer of output (a
    /// full config fetch does) cannot deadlock. On deadline the child is
    /// killed and the outcome is a timeout failure.
    fn execute(&self, program: &str, args: &[String]) -> CmdOutcome {
        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(err) => return CmdOutcome::failure(format!("failed to spawn {program}: {err}")),
        };

        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let status = match wait_with_deadline(&mut child, self.timeout) {
            Some(status) => status,
            None => {
                return CmdOutcome::failure(format!(
                    "{program} timed out after {}s",
                    self.timeout.as_secs()
                ));
            }
        };

        let mut output = stdout.join().unwrap_or_default();
        let err_text = stderr.join().unwrap_or_default();
        if !status.success() && output.trim().is_empty() {
            output = err_text;
        }

        CmdOutcome {
            ok: status.success(),
            output: output.trim().to_string(),
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut reader) = source {
            let _ = reader.read_to_string(&mut text);
        }
        text
    })
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> Option<std::process::ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return None;
                }
                thread::sleep(Duration::from_millis(50));
            }
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
        }
    }
}

impl Transport for SshTransport {
    fn run(&self, command: &str) -> CmdOutcome {
        let args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-i".to_string(),
            self.key_path.display().to_string(),
            self.target(),
            command.to_string(),
        ];
        self.execute("ssh", &args)
    }

    fn push_file(&self, bytes: &[u8], remote_path: &str) -> bool {
        let mut staged = match tempfile::NamedTempFile::new() {
            Ok(file) => file,
            Err(_) => return false,
        };
        if staged.write_all(bytes).is_err() || staged.flush().is_err() {
            return false;
        }

        let args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-i".to_string(),
            self.key_path.display().to_string(),
            staged.path().display().to_string(),
            format!("{}:{}", self.target(), remote_path),
        ];
        self.execute("scp", &args).ok
    }
}
