//! Markdown session log for workflow runs.

use super::sink::{AgentMode, InteractionSink};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const LEVELS: [&str; 4] = ["DEBUG", "INFO", "WARN", "ERROR"];

/// Logger for workflow runs and their state transitions.
///
/// This logger creates markdown-formatted log files and doubles as an
/// [`InteractionSink`], so it can be handed straight to the invoker and the
/// state machine.
#[derive(Debug)]
pub struct Logger {
    log_file: PathBuf,
    log_level: String,
    mode: AgentMode,
    write_lock: Mutex<()>,
}

impl Logger {
    /// Initialize logger.
    ///
    /// # Arguments
    /// * `log_file` - Path to log file. If None, creates a timestamped file in temp directory.
    /// * `log_level` - Logging level (defaults to "INFO").
    pub fn new(log_file: Option<&Path>, log_level: Option<&str>) -> Result<Self> {
        let log_file = match log_file {
            Some(p) => p.to_path_buf(),
            None => {
                let mut dir = std::env::temp_dir();
                dir.push("codeloop-logs");
                std::fs::create_dir_all(&dir).with_context(|| {
                    format!("Failed to create log directory: {}", dir.display())
                })?;
                let filename = format!(
                    "run_{}_{}.md",
                    Utc::now().timestamp_millis(),
                    std::process::id()
                );
                dir.join(filename)
            }
        };

        let log_level = log_level.unwrap_or("INFO").to_uppercase();

        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }

        let logger = Self {
            log_file,
            log_level,
            mode: AgentMode::default(),
            write_lock: Mutex::new(()),
        };

        if !logger.log_file.exists() {
            logger.initialize_log_file()?;
        }

        Ok(logger)
    }

    /// Set the mode used to answer permission requests.
    pub fn with_mode(mut self, mode: AgentMode) -> Self {
        self.mode = mode;
        self
    }

    /// Initialize the log file with header.
    fn initialize_log_file(&self) -> Result<()> {
        let mut file = File::create(&self.log_file)
            .with_context(|| format!("Failed to create log file: {}", self.log_file.display()))?;

        let now: DateTime<Utc> = Utc::now();

        writeln!(file, "# Workflow Run Log\n")?;
        writeln!(file, "Log started: {}\n", now.to_rfc3339())?;
        writeln!(file, "---\n")?;

        Ok(())
    }

    /// Append content to log file.
    fn append_to_log(&self, content: &str) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("log writer lock poisoned"))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .with_context(|| format!("Failed to open log file: {}", self.log_file.display()))?;

        write!(file, "{}", content).with_context(|| "Failed to write to log file")?;

        Ok(())
    }

    /// Whether entries at `level` pass the configured threshold.
    pub fn enabled(&self, level: &str) -> bool {
        let rank = |l: &str| LEVELS.iter().position(|x| x.eq_ignore_ascii_case(l));
        match (rank(level), rank(&self.log_level)) {
            (Some(wanted), Some(threshold)) => wanted >= threshold,
            _ => true,
        }
    }

    /// Log run start.
    ///
    /// # Arguments
    /// * `run_id` - Identifier of the run.
    /// * `goal` - Task goal given by the caller.
    /// * `config` - Configuration values worth recording.
    pub fn log_run_start(
        &self,
        run_id: &str,
        goal: &str,
        config: &HashMap<String, serde_json::Value>,
    ) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "## Run Started - {}\n\n**Run:** {}\n**Goal:** {}\n**Mode:** {}\n**Config:** {}\n\n",
            now.to_rfc3339(),
            run_id,
            goal,
            self.mode,
            serde_json::to_string_pretty(config).unwrap_or_default()
        );

        self.append_to_log(&content)?;
        tracing::info!(run_id, "run started");
        Ok(())
    }

    /// Log a state transition.
    ///
    /// # Arguments
    /// * `step` - Step that emitted the trigger.
    /// * `from` - State the run left.
    /// * `trigger` - Trigger emitted by the step.
    /// * `to` - State the run entered.
    /// * `note` - Human-readable note returned by the step.
    pub fn log_transition(
        &self,
        step: &str,
        from: &str,
        trigger: &str,
        to: &str,
        note: &str,
    ) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "### Transition - {}\n\n**Step:** {}\n**From:** {}\n**Trigger:** {}\n**To:** {}\n**Note:** {}\n\n",
            now.to_rfc3339(),
            step,
            from,
            trigger,
            to,
            note
        );

        self.append_to_log(&content)?;
        tracing::info!(step, from, trigger, to, "state transition");
        Ok(())
    }

    /// Log error with context.
    ///
    /// # Arguments
    /// * `error` - Error message.
    /// * `context` - Additional context information.
    pub fn log_error(
        &self,
        error: &str,
        context: Option<&HashMap<String, serde_json::Value>>,
    ) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let mut content = format!(
            "### Error - {}\n\n**Error:** {}\n\n",
            now.to_rfc3339(),
            error
        );

        if let Some(ctx) = context {
            content.push_str(&format!(
                "**Context:** {}\n\n",
                serde_json::to_string_pretty(ctx).unwrap_or_default()
            ));
        }

        self.append_to_log(&content)?;
        tracing::error!("{}", error);
        Ok(())
    }

    /// Log run completion.
    ///
    /// # Arguments
    /// * `reason` - Reason for completion.
    pub fn log_completion(&self, reason: &str) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "### Run Completed - {}\n\n**Reason:** {}\n\n---\n\n",
            now.to_rfc3339(),
            reason
        );

        self.append_to_log(&content)?;
        tracing::info!("run completed: {}", reason);
        Ok(())
    }

    /// Log custom content.
    ///
    /// # Arguments
    /// * `title` - Log entry title.
    /// * `content` - Log content.
    /// * `level` - Log level.
    pub fn log_custom(&self, title: &str, content: &str, level: Option<&str>) -> Result<()> {
        let level = level.unwrap_or("INFO");
        if !self.enabled(level) {
            return Ok(());
        }

        let now: DateTime<Utc> = Utc::now();
        let log_content = format!("### {} - {}\n\n{}\n\n", title, now.to_rfc3339(), content);

        self.append_to_log(&log_content)?;

        match level {
            "ERROR" => tracing::error!("{}: {}", title, content),
            "WARN" => tracing::warn!("{}: {}", title, content),
            _ => tracing::info!("{}: {}", title, content),
        }

        Ok(())
    }

    /// Get the log file path.
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Get the log level.
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Mode used to answer permission requests.
    pub fn mode(&self) -> AgentMode {
        self.mode
    }
}

#[async_trait]
impl InteractionSink for Logger {
    fn info(&self, message: &str) {
        if let Err(e) = self.log_custom("Info", message, Some("INFO")) {
            tracing::warn!("failed to write log entry: {}", e);
        }
    }

    fn warn(&self, message: &str) {
        if let Err(e) = self.log_custom("Warning", message, Some("WARN")) {
            tracing::warn!("failed to write log entry: {}", e);
        }
    }

    fn error(&self, message: &str) {
        if let Err(e) = self.log_error(message, None) {
            tracing::warn!("failed to write log entry: {}", e);
        }
    }

    fn run_started(&self, run_id: &str, goal: &str) {
        if let Err(e) = self.log_run_start(run_id, goal, &HashMap::new()) {
            tracing::warn!("failed to write log entry: {}", e);
        }
    }

    fn transition(&self, step: &str, from: &str, trigger: &str, to: &str, note: &str) {
        if let Err(e) = self.log_transition(step, from, trigger, to, note) {
            tracing::warn!("failed to write log entry: {}", e);
        }
    }

    fn run_finished(&self, summary: &str) {
        if let Err(e) = self.log_completion(summary) {
            tracing::warn!("failed to write log entry: {}", e);
        }
    }

    async fn request_permission(&self, message: &str) -> bool {
        let approved = self.mode.auto_approves();
        let verdict = if approved { "approved" } else { "denied" };
        if let Err(e) = self.log_custom(
            "Permission Request",
            &format!("{}\n\n**Answer:** {} ({} mode)", message, verdict, self.mode),
            Some("INFO"),
        ) {
            tracing::warn!("failed to write log entry: {}", e);
        }
        approved
    }
}
