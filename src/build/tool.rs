// src/build/tool.rs

//! Build-tool invocation
//!
//! Every command the orchestrator runs goes through [`BuildTool`]. The
//! production implementation spawns processes; tests substitute a scripted
//! tool that records invocations instead.

use crate::error::Result;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// How long to keep reading pipes after a timed-out phase was killed
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// One command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub argv: Vec<String>,
    pub workdir: PathBuf,
    /// Complete environment of the child; nothing is inherited
    pub env: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
}

impl Invocation {
    /// Command line as one string, for logs
    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}

/// Result of running an [`Invocation`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code; `None` if the process was killed by a signal or timed out
    pub exit_code: Option<i32>,
    /// Interleaved stdout then stderr
    pub output: String,
    pub timed_out: bool,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Runs build commands
pub trait BuildTool: Send + Sync {
    /// Run one invocation to completion
    ///
    /// A non-zero exit or a timeout is reported through [`ToolOutput`];
    /// `Err` is reserved for failing to run the command at all.
    fn invoke(&self, invocation: &Invocation) -> Result<ToolOutput>;
}

/// Runs invocations as child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessTool;

impl BuildTool for ProcessTool {
    fn invoke(&self, invocation: &Invocation) -> Result<ToolOutput> {
        let (program, args) = invocation.argv.split_first().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command line")
        })?;
        debug!(
            "Running {} in {}",
            invocation.command_line(),
            invocation.workdir.display()
        );

        let mut child = Command::new(program)
            .args(args)
            .current_dir(&invocation.workdir)
            .env_clear()
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .spawn()?;

        // Drain both pipes concurrently so a chatty build cannot fill one and stall
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let (exit_code, timed_out) = match invocation.timeout {
            Some(limit) => match child.wait_timeout(limit)? {
                Some(status) => (status.code(), false),
                None => {
                    warn!(
                        "{} timed out after {} seconds",
                        invocation.command_line(),
                        limit.as_secs()
                    );
                    kill_group(&mut child);
                    (None, true)
                }
            },
            None => (child.wait()?.code(), false),
        };

        // A descendant that left the group may still hold the pipes open
        let mut output = String::new();
        for reader in [stdout, stderr].into_iter().flatten() {
            let text = if timed_out {
                reader.recv_timeout(DRAIN_GRACE).ok()
            } else {
                reader.recv().ok()
            };
            if let Some(text) = text {
                output.push_str(&text);
            }
        }

        Ok(ToolOutput {
            exit_code,
            output,
            timed_out,
        })
    }
}

/// SIGKILL the child's process group, then reap the child
fn kill_group(child: &mut Child) {
    let group = Pid::from_raw(child.id() as i32);
    if let Err(e) = signal::killpg(group, Signal::SIGKILL) {
        debug!("killpg {} failed: {}", group, e);
        let _ = child.kill();
    }
    let _ = child.wait();
}

fn drain(mut pipe: impl Read + Send + 'static) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}
