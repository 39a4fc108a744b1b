//! Per-user daily token quota
//!
//! Only the HTTP layer charges usage. The orchestrator knows nothing
//! about quotas.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::UsageConfig;

/// Usage figures for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub daily_used: u64,
    pub daily_limit: u64,
    pub daily_remaining: u64,
    pub total_used: u64,
    pub tokens_per_char: u64,
}

#[async_trait]
pub trait UsageMeter: Send + Sync {
    /// Tokens the user may still spend today
    async fn remaining(&self, user_id: &str) -> u64;

    /// Charge tokens against today's quota
    async fn record(&self, user_id: &str, tokens: u64);

    async fn stats(&self, user_id: &str) -> UsageStats;

    /// Charge for a piece of text
    fn estimate_tokens(&self, text: &str) -> u64;
}

/// Characters times the per-character rate
pub fn estimate_tokens(text: &str, tokens_per_char: u64) -> u64 {
    (text.chars().count() as u64).saturating_mul(tokens_per_char)
}

#[derive(Debug, Default)]
struct Ledger {
    daily: HashMap<(String, NaiveDate), u64>,
    total: HashMap<String, u64>,
}

/// Process-local meter; counters reset when the process restarts
#[derive(Debug)]
pub struct InMemoryUsageMeter {
    daily_limit: u64,
    tokens_per_char: u64,
    ledger: Mutex<Ledger>,
}

impl InMemoryUsageMeter {
    pub fn new(daily_limit: u64, tokens_per_char: u64) -> Self {
        debug!(daily_limit, tokens_per_char, "InMemoryUsageMeter::new: called");
        Self {
            daily_limit,
            tokens_per_char,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    pub fn from_config(config: &UsageConfig) -> Self {
        Self::new(config.daily_limit, config.tokens_per_char)
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    async fn used_on(&self, user_id: &str, day: NaiveDate) -> u64 {
        let ledger = self.ledger.lock().await;
        ledger.daily.get(&(user_id.to_string(), day)).copied().unwrap_or(0)
    }

    async fn record_on(&self, user_id: &str, day: NaiveDate, tokens: u64) {
        debug!(%user_id, %day, tokens, "InMemoryUsageMeter::record_on: called");
        let mut ledger = self.ledger.lock().await;
        let daily = ledger.daily.entry((user_id.to_string(), day)).or_insert(0);
        *daily = daily.saturating_add(tokens);
        let total = ledger.total.entry(user_id.to_string()).or_insert(0);
        *total = total.saturating_add(tokens);
    }
}

#[async_trait]
impl UsageMeter for InMemoryUsageMeter {
    async fn remaining(&self, user_id: &str) -> u64 {
        let used = self.used_on(user_id, Self::today()).await;
        self.daily_limit.saturating_sub(used)
    }

    async fn record(&self, user_id: &str, tokens: u64) {
        self.record_on(user_id, Self::today(), tokens).await;
    }

    async fn stats(&self, user_id: &str) -> UsageStats {
        let daily_used = self.used_on(user_id, Self::today()).await;
        let total_used = self.ledger.lock().await.total.get(user_id).copied().unwrap_or(0);
        UsageStats {
            daily_used,
            daily_limit: self.daily_limit,
            daily_remaining: self.daily_limit.saturating_sub(daily_used),
            total_used,
            tokens_per_char: self.tokens_per_char,
        }
    }

    fn estimate_tokens(&self, text: &str) -> u64 {
        estimate_tokens(text, self.tokens_per_char)
    }
}
