use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Coarse pipeline steps reported through [`SessionListener::on_stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Authenticating,
    ResolvingVersion,
    DownloadingClient,
    DownloadingLibraries,
    ExtractingNatives,
    DownloadingAssets,
    DownloadingJava,
    BuildingArguments,
    ApplyingJarMods,
    Launching,
    Running,
    Finished,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Authenticating => "Authenticating",
            Stage::ResolvingVersion => "Resolving version",
            Stage::DownloadingClient => "Downloading client",
            Stage::DownloadingLibraries => "Downloading libraries",
            Stage::ExtractingNatives => "Extracting natives",
            Stage::DownloadingAssets => "Downloading assets",
            Stage::DownloadingJava => "Downloading Java runtime",
            Stage::BuildingArguments => "Building arguments",
            Stage::ApplyingJarMods => "Applying jar mods",
            Stage::Launching => "Launching",
            Stage::Running => "Running",
            Stage::Finished => "Finished",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Outbound notifications of one launch session. All methods default to no-ops.
///
/// Callbacks arrive on whatever task drives the pipeline; marshaling onto a
/// UI thread is the caller's job.
pub trait SessionListener: Send + Sync {
    fn on_progress(&self, _total: u64, _done: u64, _finished: bool, _label: &str) {}

    fn on_stage(&self, _stage: Stage) {}

    fn on_log(&self, _level: LogLevel, _line: &str) {}

    fn on_insufficient_memory(&self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl SessionListener for NoopListener {}

/// Byte counters shared by every transfer of one batch.
pub struct ProgressTracker<'a> {
    listener: &'a dyn SessionListener,
    label: String,
    total: AtomicU64,
    done: AtomicU64,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(listener: &'a dyn SessionListener, label: impl Into<String>, total: u64) -> Self {
        Self {
            listener,
            label: label.into(),
            total: AtomicU64::new(total),
            done: AtomicU64::new(0),
        }
    }

    /// Accounts for bytes whose size was not known up front.
    pub fn grow(&self, bytes: u64) {
        self.total.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn advance(&self, bytes: u64) {
        let done = self.done.fetch_add(bytes, Ordering::Relaxed) + bytes;
        let total = self.total.load(Ordering::Relaxed).max(done);
        self.listener.on_progress(total, done, false, &self.label);
    }

    pub fn finish(&self) {
        let done = self.done.load(Ordering::Relaxed);
        let total = self.total.load(Ordering::Relaxed).max(done);
        self.listener.on_progress(total, done, true, &self.label);
    }
}
