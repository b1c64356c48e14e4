//! MCP Rate Limiting
//!
//! Per-principal call budgets over fixed one-minute windows. The principal
//! is the user id for authenticated connections and the connection id for
//! anonymous ones.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::registry::ToolCategory;

const WINDOW: Duration = Duration::from_secs(60);
const STALE_AFTER: Duration = Duration::from_secs(300);

/// Rate limit configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub read_per_minute: u32,
    pub write_per_minute: u32,
    pub generate_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            read_per_minute: 120,
            write_per_minute: 30,
            generate_per_minute: 10,
        }
    }
}

impl RateLimitConfig {
    fn limit_for(&self, category: ToolCategory) -> u32 {
        match category {
            ToolCategory::Read => self.read_per_minute,
            ToolCategory::Write => self.write_per_minute,
            ToolCategory::Generate => self.generate_per_minute,
        }
    }
}

/// Usage counters for one principal in the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Usage {
    pub read: u32,
    pub write: u32,
    pub generate: u32,
}

impl Usage {
    fn counter_mut(&mut self, category: ToolCategory) -> &mut u32 {
        match category {
            ToolCategory::Read => &mut self.read,
            ToolCategory::Write => &mut self.write,
            ToolCategory::Generate => &mut self.generate,
        }
    }
}

#[derive(Debug)]
struct WindowState {
    usage: Usage,
    window_start: Instant,
}

impl WindowState {
    fn new() -> Self {
        Self {
            usage: Usage::default(),
            window_start: Instant::now(),
        }
    }

    fn reset_if_expired(&mut self) {
        if self.window_start.elapsed() > WINDOW {
            self.usage = Usage::default();
            self.window_start = Instant::now();
        }
    }
}

/// Rate limiter for MCP requests
pub struct McpRateLimiter {
    config: RateLimitConfig,
    states: Mutex<HashMap<String, WindowState>>,
}

impl McpRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Check if a request is allowed and record it if so.
    /// Returns `Err(retry_after_secs)` when the budget is exhausted.
    pub fn check_and_record(&self, key: &str, category: ToolCategory) -> Result<(), u32> {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let state = states
            .entry(key.to_string())
            .or_insert_with(WindowState::new);

        state.reset_if_expired();

        let limit = self.config.limit_for(category);
        let current = state.usage.counter_mut(category);
        if *current >= limit {
            let elapsed = state.window_start.elapsed().as_secs();
            let retry_after = WINDOW.as_secs().saturating_sub(elapsed) as u32;
            return Err(retry_after.max(1));
        }

        *current += 1;
        Ok(())
    }

    /// Current usage for a principal
    pub fn usage(&self, key: &str) -> Option<Usage> {
        let states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        states.get(key).map(|s| s.usage)
    }

    /// Drop principals that have been idle for a while. Returns how many were removed.
    pub fn cleanup_stale_entries(&self) -> usize {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let before = states.len();
        states.retain(|_, state| state.window_start.elapsed() < STALE_AFTER);
        before - states.len()
    }
}

impl Default for McpRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
