//! Environment-driven settings.
//!
//! Loaded with `dotenv` the way `main.rs` calls `dotenv::dotenv().ok()`
//! before reading any variable.

use std::env;

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub run_once_timeout_ms: u64,
    pub max_multi_act_steps: u32,
    pub heartbeat_enabled: bool,
    pub heartbeat_interval_ms: u64,
    pub obs_ui_enabled: bool,
    pub obs_ui_data_dir: String,
    pub obs_ui_max_runs: usize,
    pub obs_ui_max_events: usize,
    pub obs_ui_bind_localhost: bool,
    pub file_workspace_root: String,
    pub risky_workspace_mode: bool,
    pub risky_workspace_root: Option<String>,
    pub port: u16,
}

impl Settings {
    /// Load from the process environment (call `dotenv::dotenv().ok()` first).
    pub fn from_env() -> anyhow::Result<Self> {
        let port = match env::var("PORT") {
            Ok(v) => {
                let parsed: u32 = v
                    .parse()
                    .map_err(|_| anyhow::anyhow!("Invalid PORT: not an integer"))?;
                if parsed < 1 || parsed > 65535 {
                    anyhow::bail!("Invalid PORT: must be in [1, 65535]");
                }
                parsed as u16
            }
            Err(_) => 8080,
        };

        let max_multi_act_steps = env::var("MAX_MULTI_ACT_STEPS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10)
            .min(50);

        let file_workspace_root = env::var("FILE_WORKSPACE_ROOT")
            .or_else(|_| env::var("CODEX_CWD"))
            .unwrap_or_else(|_| ".".to_string());

        Ok(Self {
            api_key: env::var("API_KEY").ok(),
            run_once_timeout_ms: env::var("RUN_ONCE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(600_000),
            max_multi_act_steps,
            heartbeat_enabled: env_bool("HEARTBEAT_ENABLED", false),
            heartbeat_interval_ms: env::var("HEARTBEAT_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30_000),
            obs_ui_enabled: env_bool("OBS_UI_ENABLED", false),
            obs_ui_data_dir: env::var("OBS_UI_DATA_DIR").unwrap_or_else(|_| "obs_data".to_string()),
            obs_ui_max_runs: env::var("OBS_UI_MAX_RUNS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            obs_ui_max_events: env::var("OBS_UI_MAX_EVENTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            obs_ui_bind_localhost: env_bool("OBS_UI_BIND_LOCALHOST", true),
            file_workspace_root,
            risky_workspace_mode: env_bool("RISKY_WORKSPACE_MODE", false),
            risky_workspace_root: env::var("RISKY_WORKSPACE_ROOT").ok(),
            port,
        })
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}
