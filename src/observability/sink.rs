//! Progress reporting and human-in-the-loop gating.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;

/// Destination for progress lines and permission requests.
///
/// Implementations must tolerate concurrent calls from independent runs;
/// reporting is fire-and-forget.
#[async_trait]
pub trait InteractionSink: Send + Sync {
    /// Report an informational progress line.
    fn info(&self, message: &str);

    /// Report a recoverable problem (retries, skipped tool calls).
    fn warn(&self, message: &str);

    /// Report a failure.
    fn error(&self, message: &str);

    /// Ask a human whether a risky action may proceed.
    async fn request_permission(&self, message: &str) -> bool;

    /// Report that a run started working on `goal`.
    fn run_started(&self, run_id: &str, goal: &str) {
        self.info(&format!("Run {} started: {}", run_id, goal));
    }

    /// Report a state transition made by `step`.
    fn transition(&self, step: &str, from: &str, trigger: &str, to: &str, note: &str) {
        self.info(&format!("[{}] {} -> {} ({}): {}", step, from, to, trigger, note));
    }

    /// Report that a run ended without failing (completed or cancelled).
    fn run_finished(&self, summary: &str) {
        self.info(summary);
    }
}

/// Agent interaction modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentMode {
    /// Confirm before actions
    #[default]
    Confirm,
    /// Execute without confirmation (YOLO mode)
    Yolo,
    /// Human-in-the-loop mode
    Human,
}

impl AgentMode {
    /// Answer given to a permission request when no human is attached.
    pub fn auto_approves(&self) -> bool {
        matches!(self, AgentMode::Yolo)
    }
}

impl std::fmt::Display for AgentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentMode::Confirm => write!(f, "confirm"),
            AgentMode::Yolo => write!(f, "yolo"),
            AgentMode::Human => write!(f, "human"),
        }
    }
}

impl std::str::FromStr for AgentMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "confirm" => Ok(AgentMode::Confirm),
            "yolo" => Ok(AgentMode::Yolo),
            "human" => Ok(AgentMode::Human),
            _ => Err(anyhow::anyhow!("Invalid agent mode: {}", s)),
        }
    }
}

/// Sink that forwards everything to `tracing`.
///
/// Permission requests are answered from the configured [`AgentMode`].
#[derive(Debug, Clone, Default)]
pub struct TracingSink {
    mode: AgentMode,
}

impl TracingSink {
    /// Create a sink answering permission requests according to `mode`.
    pub fn new(mode: AgentMode) -> Self {
        Self { mode }
    }

    /// Mode used to answer permission requests.
    pub fn mode(&self) -> AgentMode {
        self.mode
    }
}

#[async_trait]
impl InteractionSink for TracingSink {
    fn info(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }

    async fn request_permission(&self, message: &str) -> bool {
        let approved = self.mode.auto_approves();
        tracing::info!(mode = %self.mode, approved, "permission requested: {}", message);
        approved
    }
}

/// Severity of a recorded sink line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkLevel {
    /// Informational
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

/// One line captured by a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkEntry {
    /// Severity
    pub level: SinkLevel,
    /// Message text
    pub message: String,
}

/// Sink that keeps every line in memory.
///
/// Useful for callers that want the log history of a run for diagnosis, and
/// for tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<SinkEntry>>,
    permission_requests: Mutex<Vec<String>>,
    grant_permission: bool,
}

impl RecordingSink {
    /// Create a sink that denies every permission request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink that answers every permission request with `grant`.
    pub fn with_permission(grant: bool) -> Self {
        Self {
            grant_permission: grant,
            ..Self::default()
        }
    }

    /// All recorded lines, oldest first.
    pub fn entries(&self) -> Vec<SinkEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Recorded lines at the given level.
    pub fn messages(&self, level: SinkLevel) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == level)
            .map(|e| e.message)
            .collect()
    }

    /// Permission prompts received so far.
    pub fn permission_requests(&self) -> Vec<String> {
        self.permission_requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn record(&self, level: SinkLevel, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(SinkEntry {
                level,
                message: message.to_string(),
            });
        }
    }
}

#[async_trait]
impl InteractionSink for RecordingSink {
    fn info(&self, message: &str) {
        self.record(SinkLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.record(SinkLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.record(SinkLevel::Error, message);
    }

    async fn request_permission(&self, message: &str) -> bool {
        if let Ok(mut requests) = self.permission_requests.lock() {
            requests.push(message.to_string());
        }
        self.grant_permission
    }
}
