use regex::Regex;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, OnceLock};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::Notify;
use tracing::{debug, error, info, trace, warn};

use super::progress::{LogLevel, SessionListener};
use crate::account::Account;
use crate::error::{LauncherError, LauncherResult};

const OUT_OF_MEMORY_PHRASES: [&str; 2] = [
    "Could not reserve enough space for",
    "There is insufficient memory for the Java Runtime Environment to continue",
];

static LEVEL_TAG: OnceLock<Option<Regex>> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub work_dir: PathBuf,
    pub env: Vec<(String, String)>,
}

/// Strips account secrets from game output.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    secrets: Vec<(String, &'static str)>,
}

impl Redactor {
    pub fn new(account: &dyn Account) -> Self {
        let uuid = account.uuid();
        let mut secrets = vec![
            (account.access_token().to_string(), "<ACCESS TOKEN>"),
            (uuid.hyphenated().to_string(), "<PROFILE ID>"),
            (uuid.simple().to_string(), "<PROFILE ID>"),
            (account.username().to_string(), "<PLAYER NAME>"),
        ];
        // The offline token is a bare dash.
        secrets.retain(|(secret, _)| secret.len() > 1);
        secrets.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { secrets }
    }

    pub fn redact(&self, line: &str) -> String {
        let mut out = line.to_string();
        for (secret, mask) in &self.secrets {
            if out.contains(secret.as_str()) {
                out = out.replace(secret.as_str(), mask);
            }
        }
        out
    }
}

pub fn classify_line(line: &str) -> LogLevel {
    let tag = LEVEL_TAG.get_or_init(|| {
        Regex::new(r"\[[^\]]*/(TRACE|DEBUG|INFO|WARN|WARNING|ERROR|FATAL|SEVERE)\]").ok()
    });
    if let Some(captures) = tag.as_ref().and_then(|re| re.captures(line)) {
        return match &captures[1] {
            "TRACE" => LogLevel::Trace,
            "DEBUG" => LogLevel::Debug,
            "INFO" => LogLevel::Info,
            "WARN" | "WARNING" => LogLevel::Warn,
            _ => LogLevel::Error,
        };
    }
    if line.contains("[SEVERE]") {
        LogLevel::Error
    } else if line.contains("[WARNING]") {
        LogLevel::Warn
    } else if line.contains("Exception") || line.starts_with("\tat ") {
        LogLevel::Error
    } else {
        LogLevel::Info
    }
}

pub fn indicates_insufficient_memory(line: &str) -> bool {
    OUT_OF_MEMORY_PHRASES
        .iter()
        .any(|phrase| line.contains(phrase))
}

/// Requests termination of a running game. A stop issued before the process
/// is waited on is remembered.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<Notify>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.notify_one();
    }
}

pub struct ProcessSupervisor {
    listener: Arc<dyn SessionListener>,
    redactor: Arc<Redactor>,
    stop: StopHandle,
}

impl ProcessSupervisor {
    pub fn new(listener: Arc<dyn SessionListener>, redactor: Redactor) -> Self {
        Self {
            listener,
            redactor: Arc::new(redactor),
            stop: StopHandle::default(),
        }
    }

    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Runs the command to completion and returns its exit code, `-1` when
    /// the process was ended by a signal.
    pub async fn launch(&self, command: &LaunchCommand) -> LauncherResult<i32> {
        let program = command.program.to_string_lossy().to_string();
        info!(program = %program, work_dir = %command.work_dir.display(), "spawning game process");

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .envs(command.env.iter().map(|(key, value)| (key.as_str(), value.as_str())))
            .current_dir(&command.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LauncherError::ProcessLaunch {
                program: program.clone(),
                source,
            })?;
        debug!(pid = ?child.id(), "game process started");

        let mut drains = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            drains.push(self.spawn_drain(stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            drains.push(self.spawn_drain(stderr));
        }

        let status = tokio::select! {
            status = child.wait() => status,
            _ = self.stop.0.notified() => {
                info!("stopping game process");
                if let Err(err) = child.start_kill() {
                    warn!(error = %err, "failed to signal game process");
                }
                child.wait().await
            }
        }
        .map_err(|source| LauncherError::ProcessLaunch { program, source })?;

        for drain in drains {
            if let Err(err) = drain.await {
                warn!(error = %err, "game output reader panicked");
            }
        }

        let code = status.code().unwrap_or(-1);
        info!(code, "game process exited");
        Ok(code)
    }

    fn spawn_drain<R>(&self, reader: R) -> tokio::task::JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let listener = self.listener.clone();
        let redactor = self.redactor.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).split(b'\n');
            loop {
                let raw = match lines.next_segment().await {
                    Ok(Some(raw)) => raw,
                    Ok(None) => break,
                    Err(err) => {
                        warn!(error = %err, "failed to read game output");
                        break;
                    }
                };
                let text = String::from_utf8_lossy(&raw);
                let text = text.trim_end_matches('\r');
                if text.trim().is_empty() {
                    continue;
                }
                handle_line(listener.as_ref(), &redactor, text);
            }
        })
    }
}

fn handle_line(listener: &dyn SessionListener, redactor: &Redactor, line: &str) {
    let line = redactor.redact(line);
    let level = classify_line(&line);
    match level {
        LogLevel::Trace => trace!(target: "minecraft", "{line}"),
        LogLevel::Debug => debug!(target: "minecraft", "{line}"),
        LogLevel::Info => info!(target: "minecraft", "{line}"),
        LogLevel::Warn => warn!(target: "minecraft", "{line}"),
        LogLevel::Error => error!(target: "minecraft", "{line}"),
    }
    listener.on_log(level, &line);
    if indicates_insufficient_memory(&line) {
        listener.on_insufficient_memory();
    }
}
