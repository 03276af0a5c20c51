//! Optional external statistical script.
//!
//! The runner invokes `<r_script_path> <r_script_file>` and reports success,
//! failure, timeout or unavailability. Output is surfaced as text and never
//! interpreted.

use std::{
    io::Read,
    path::PathBuf,
    process::{Child, Command, ExitStatus, Stdio},
    sync::mpsc::{self, Receiver},
    thread,
    time::{Duration, Instant},
};

use log::{debug, info};

use crate::{capabilities::Capabilities, config::Config, error::ExternalToolError};

pub const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOutput {
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct ScriptRunner {
    program: String,
    script: PathBuf,
    timeout: Duration,
}

impl ScriptRunner {
    /// Fails with [`ExternalToolError::Unavailable`] when the interpreter was
    /// not found by the capability probe or the script file does not exist.
    pub fn new(config: &Config, capabilities: &Capabilities) -> Result<Self, ExternalToolError> {
        if let Err(err) = &capabilities.external_runner {
            return Err(err.clone());
        }
        if !config.r_script_file.is_file() {
            return Err(ExternalToolError::Unavailable {
                reason: format!("script not found: {:?}", config.r_script_file),
            });
        }
        Ok(Self {
            program: config.r_script_path.clone(),
            script: config.r_script_file.clone(),
            timeout: config.r_timeout(),
        })
    }

    pub fn run(&self) -> Result<RunnerOutput, ExternalToolError> {
        info!("Running {} {:?}", self.program, self.script);
        let mut command = Command::new(&self.program);
        command.arg(&self.script);
        let output = run_with_timeout(command, self.timeout)?;
        info!(
            "External script finished in {:.1}s",
            output.elapsed.as_secs_f64()
        );
        Ok(output)
    }
}

/// Runs `<program> --version` and extracts the version number it reports.
pub fn probe_version(program: &str, timeout: Duration) -> Result<String, ExternalToolError> {
    let mut command = Command::new(program);
    command.arg("--version");
    let output = run_with_timeout(command, timeout)?;
    // Rscript prints its banner on stderr in older releases
    let banner = format!("{}\n{}", output.stdout, output.stderr);
    let version = parse_version(&banner).unwrap_or_else(|| {
        banner
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("unknown")
            .to_string()
    });
    debug!("{program} reports version {version}");
    Ok(version)
}

fn parse_version(banner: &str) -> Option<String> {
    banner
        .split_whitespace()
        .find(|token| {
            token.chars().next().is_some_and(|c| c.is_ascii_digit()) && token.contains('.')
        })
        .map(|token| token.trim_end_matches([',', ';']).to_string())
}

pub fn run_with_timeout(
    mut command: Command,
    timeout: Duration,
) -> Result<RunnerOutput, ExternalToolError> {
    let started = Instant::now();
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| ExternalToolError::Unavailable {
            reason: format!("{:?}: {err}", command.get_program()),
        })?;

    let deadline = started + timeout;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let Some(status) = wait_until(&mut child, deadline)? else {
        // Readers may be blocked on pipes inherited by a surviving grandchild;
        // they are left to finish on their own.
        return Err(ExternalToolError::Timeout { timeout });
    };
    let stdout = collect(stdout, deadline);
    let stderr = collect(stderr, deadline);
    let elapsed = started.elapsed();

    match status {
        status if status.success() => Ok(RunnerOutput {
            stdout,
            stderr,
            elapsed,
        }),
        status => Err(ExternalToolError::Failure {
            status: describe_status(status),
            stderr: stderr.trim().to_string(),
        }),
    }
}

/// `None` means the deadline passed and the child was killed.
fn wait_until(child: &mut Child, deadline: Instant) -> Result<Option<ExitStatus>, ExternalToolError> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(None);
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(err) => {
                let _ = child.kill();
                return Err(ExternalToolError::Failure {
                    status: "unknown".to_string(),
                    stderr: err.to_string(),
                });
            }
        }
    }
}

fn drain<R>(pipe: Option<R>) -> Option<Receiver<String>>
where
    R: Read + Send + 'static,
{
    pipe.map(|mut pipe| {
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = pipe.read_to_end(&mut buffer);
            let _ = sender.send(String::from_utf8_lossy(&buffer).into_owned());
        });
        receiver
    })
}

/// Waits for a reader until `deadline`; output still pending by then is dropped.
fn collect(receiver: Option<Receiver<String>>, deadline: Instant) -> String {
    receiver
        .and_then(|receiver| {
            let remaining = deadline.saturating_duration_since(Instant::now());
            receiver.recv_timeout(remaining).ok()
        })
        .unwrap_or_default()
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}
