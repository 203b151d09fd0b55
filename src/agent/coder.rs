//! Coding step: turn the goal, design artifacts and review feedback into
//! full file contents.

use crate::orchestration::{AgentExecutionResult, AgentStep, WorkflowContext, WorkflowState, WorkflowTrigger};
use crate::provider::{ChatRequest, GenerateConfig, ResilientInvoker};
use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, OnceLock};

/// Message used when the model reply contains no file block
pub const INVALID_OUTPUT: &str = "invalid code output";

// `body` carries its trailing line break and is empty for an empty block.
const FILE_BLOCK_PATTERN: &str =
    r"(?m)^[#*\s]*File:\**[ \t]*(?P<path>[^\r\n]+?)[ \t]*\r?\n```[^\r\n]*\r?\n(?P<body>(?s:.*?\r?\n)??)```[ \t]*\r?$";

fn file_block_regex() -> Option<&'static Regex> {
    static FILE_BLOCK: OnceLock<Option<Regex>> = OnceLock::new();
    FILE_BLOCK
        .get_or_init(|| Regex::new(FILE_BLOCK_PATTERN).ok())
        .as_ref()
}

/// Extract `(path, content)` pairs from a reply made of
/// `File: <path>` lines each followed by a fenced code block.
///
/// Pairs come back in reply order; a path may appear more than once.
pub fn parse_file_blocks(reply: &str) -> Vec<(String, String)> {
    let Some(re) = file_block_regex() else {
        return Vec::new();
    };

    re.captures_iter(reply)
        .filter_map(|caps| {
            let path = caps
                .name("path")?
                .as_str()
                .trim_matches(|c: char| c == '`' || c == '*' || c.is_whitespace());
            if path.is_empty() {
                return None;
            }
            let body = caps.name("body").map(|m| m.as_str()).unwrap_or_default();
            let body = body.strip_suffix('\n').unwrap_or(body);
            let body = body.strip_suffix('\r').unwrap_or(body);
            Some((path.to_string(), body.to_string()))
        })
        .collect()
}

/// Asks the model for complete files and stages them as pending changes.
///
/// Each returned file replaces any earlier proposal for the same path.
pub struct CoderStep {
    invoker: Arc<ResilientInvoker>,
    language: Option<String>,
    config: GenerateConfig,
}

impl CoderStep {
    /// Coder calling the model through `invoker`
    pub fn new(invoker: Arc<ResilientInvoker>) -> Self {
        Self {
            invoker,
            language: None,
            config: GenerateConfig::default(),
        }
    }

    /// Generation settings for the coding call
    pub fn with_config(mut self, config: GenerateConfig) -> Self {
        self.config = config;
        self
    }

    /// Target language named in the system prompt, e.g. "C#"
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    fn system_prompt(&self) -> String {
        let developer = match &self.language {
            Some(language) => format!("an expert {} developer", language),
            None => "an expert developer".to_string(),
        };
        format!(
            "You are {}. Reply with complete files only, never diffs. For every file write a \
             line `File: <relative path>` followed by a fenced code block holding the entire \
             file content.",
            developer
        )
    }

    /// Goal, then every artifact, then every review comment so far.
    pub fn build_prompt(context: &WorkflowContext) -> String {
        let memory = context.memory();
        let mut prompt = format!("Task: {}\n", context.task_goal());

        if !memory.artifacts().is_empty() {
            prompt.push_str("\n## Design artifacts\n");
            for (name, value) in memory.artifacts() {
                prompt.push_str(&format!("\n### {}\n{}\n", name, value));
            }
        }

        if !memory.review_comments().is_empty() {
            prompt.push_str("\n## Review feedback to address\n");
            for (i, comment) in memory.review_comments().iter().enumerate() {
                prompt.push_str(&format!("\n### Review {}\n{}\n", i + 1, comment));
            }
            if !memory.pending_changes().is_empty() {
                let paths: Vec<&str> = memory.pending_changes().keys().map(String::as_str).collect();
                prompt.push_str(&format!(
                    "\nResend the full corrected content of: {}\n",
                    paths.join(", ")
                ));
            }
        }

        prompt
    }
}

#[async_trait]
impl AgentStep for CoderStep {
    fn name(&self) -> &str {
        "coder"
    }

    fn description(&self) -> &str {
        "Writes complete files for the goal"
    }

    fn target_state(&self) -> WorkflowState {
        WorkflowState::Coding
    }

    async fn execute(&self, context: &mut WorkflowContext) -> Result<AgentExecutionResult> {
        let system = self.system_prompt();
        let request = ChatRequest::prompt(Self::build_prompt(context), Some(&system))
            .with_config(self.config.clone());
        let cancel = context.cancellation_token().clone();

        let metered = self.invoker.invoke_metered(&request, None, &cancel).await;
        context.record_usage(metered.usage);
        let reply = match metered.outcome {
            Ok(text) => text,
            Err(e) => return Ok(AgentExecutionResult::error(format!("code generation failed: {}", e))),
        };

        let files = parse_file_blocks(&reply);
        if files.is_empty() {
            tracing::warn!(reply_len = reply.len(), "coder reply had no file blocks");
            return Ok(AgentExecutionResult::error(INVALID_OUTPUT));
        }

        let count = files.len();
        for (path, content) in files {
            context.memory_mut().stage_change(path, content);
        }

        Ok(AgentExecutionResult::advance(
            WorkflowTrigger::CodeGenerated,
            format!("proposed {} file(s)", count),
        ))
    }
}
