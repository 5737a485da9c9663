use serde::{Deserialize, Serialize};

/// Tuning for the overlay detection-and-dismissal engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Maximum detect/click iterations per run
    #[serde(default = "default_max_overlays")]
    pub max_overlays: u32,

    /// Per-click timeout in milliseconds
    #[serde(default = "default_click_timeout_ms")]
    pub click_timeout_ms: u64,

    /// Safety-predicate evaluation timeout in milliseconds
    #[serde(default = "default_predicate_timeout_ms")]
    pub predicate_timeout_ms: u64,

    /// Settle time after a click before the URL is compared, milliseconds
    #[serde(default = "default_post_click_wait_ms")]
    pub post_click_wait_ms: u64,

    /// Wall-clock budget for the whole dialog expansion, milliseconds
    #[serde(default = "default_expansion_budget_ms")]
    pub expansion_budget_ms: u64,

    /// Budget for a single expansion step, milliseconds
    #[serde(default = "default_step_budget_ms")]
    pub step_budget_ms: u64,

    /// Extra close/back attempts beyond the expected expansion step count
    #[serde(default = "default_close_extra_attempts")]
    pub close_extra_attempts: u32,

    /// Override for the strategy cache directory
    pub cache_dir: Option<String>,
}

fn default_max_overlays() -> u32 {
    5
}

fn default_click_timeout_ms() -> u64 {
    3_000
}

fn default_predicate_timeout_ms() -> u64 {
    1_500
}

fn default_post_click_wait_ms() -> u64 {
    800
}

fn default_expansion_budget_ms() -> u64 {
    10_000
}

fn default_step_budget_ms() -> u64 {
    2_000
}

fn default_close_extra_attempts() -> u32 {
    3
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            max_overlays: default_max_overlays(),
            click_timeout_ms: default_click_timeout_ms(),
            predicate_timeout_ms: default_predicate_timeout_ms(),
            post_click_wait_ms: default_post_click_wait_ms(),
            expansion_budget_ms: default_expansion_budget_ms(),
            step_budget_ms: default_step_budget_ms(),
            close_extra_attempts: default_close_extra_attempts(),
            cache_dir: None,
        }
    }
}
