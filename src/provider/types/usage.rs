//! Token and cost accounting for model calls.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

const MICROS_PER_USD: f64 = 1_000_000.0;

/// Token counts reported by one model call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the request
    pub prompt_tokens: u64,
    /// Tokens generated
    pub completion_tokens: u64,
}

impl TokenUsage {
    /// Create a usage report
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    /// Prompt plus completion tokens
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Accumulated usage and cost over any number of model calls.
///
/// Cost is kept in integer micro-dollars so that accumulation is exact and
/// independent of call order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLedger {
    /// Number of model calls recorded
    pub calls: u64,
    /// Summed prompt tokens
    pub prompt_tokens: u64,
    /// Summed completion tokens
    pub completion_tokens: u64,
    /// Summed cost in micro-dollars
    pub cost_micros: u64,
}

impl UsageLedger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one model call with whatever usage and cost it reported
    pub fn record(&mut self, usage: Option<TokenUsage>, cost_usd: Option<f64>) {
        self.calls += 1;
        if let Some(usage) = usage {
            self.prompt_tokens += usage.prompt_tokens;
            self.completion_tokens += usage.completion_tokens;
        }
        if let Some(cost) = cost_usd {
            self.cost_micros += usd_to_micros(cost);
        }
    }

    /// Summed prompt and completion tokens
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    /// Summed cost in dollars
    pub fn cost_usd(&self) -> f64 {
        self.cost_micros as f64 / MICROS_PER_USD
    }
}

fn usd_to_micros(cost: f64) -> u64 {
    if cost.is_finite() && cost > 0.0 {
        (cost * MICROS_PER_USD).round() as u64
    } else {
        0
    }
}

impl Add for UsageLedger {
    type Output = UsageLedger;

    fn add(self, rhs: UsageLedger) -> UsageLedger {
        UsageLedger {
            calls: self.calls + rhs.calls,
            prompt_tokens: self.prompt_tokens + rhs.prompt_tokens,
            completion_tokens: self.completion_tokens + rhs.completion_tokens,
            cost_micros: self.cost_micros + rhs.cost_micros,
        }
    }
}

impl AddAssign for UsageLedger {
    fn add_assign(&mut self, rhs: UsageLedger) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for UsageLedger {
    fn sum<I: Iterator<Item = UsageLedger>>(iter: I) -> Self {
        iter.fold(UsageLedger::default(), |acc, l| acc + l)
    }
}

/// Successful outcome of a resilient invocation
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResult {
    /// Non-empty text returned by the model
    pub text: String,
    /// Usage and cost of every call made for this invocation, failed attempts included
    pub usage: UsageLedger,
}
