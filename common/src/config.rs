use std::{env, path::PathBuf, time::Duration};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5001";
const DEFAULT_POLL_SECS: u64 = 30;
const DEFAULT_TOAST_SECS: u64 = 5;
const DEFAULT_OUTPUT: &str = "dashboard.html";
const DEFAULT_REPORTS_DIR: &str = "reports";

/// Configuración común a admin y client, leída del entorno.
/// - Local: default http://localhost:5001
/// - En Docker: VSIS_URL=http://vsis:5001
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub base_url: String,
    pub push_url: String,
    pub poll_interval: Duration,
    pub toast_ttl: Duration,
    pub output: PathBuf,
    pub reports_dir: PathBuf,
}

impl DashboardConfig {
    /// Lee `.env` si existe y después las variables `VSIS_*`.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let base_url = base_url();
        let push_url = env::var("VSIS_PUSH_URL").unwrap_or_else(|_| push_url_for(&base_url));

        Self {
            push_url,
            base_url,
            poll_interval: Duration::from_secs(secs_var("VSIS_POLL_SECS", DEFAULT_POLL_SECS)),
            toast_ttl: Duration::from_secs(secs_var("VSIS_TOAST_SECS", DEFAULT_TOAST_SECS)),
            output: env::var("VSIS_OUTPUT")
                .unwrap_or_else(|_| DEFAULT_OUTPUT.to_string())
                .into(),
            reports_dir: env::var("VSIS_REPORTS_DIR")
                .unwrap_or_else(|_| DEFAULT_REPORTS_DIR.to_string())
                .into(),
        }
    }
}

fn base_url() -> String {
    env::var("VSIS_URL")
        .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
        .trim_end_matches('/')
        .to_string()
}

fn secs_var(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|s| *s > 0)
        .unwrap_or(default)
}

const SOCKET_IO_PATH: &str = "/socket.io/?EIO=4&transport=websocket";

/// http(s)://host -> ws(s)://host/socket.io/?EIO=4&transport=websocket
pub fn push_url_for(base_url: &str) -> String {
    let ws = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base_url.to_string()
    };
    format!("{}{}", ws.trim_end_matches('/'), SOCKET_IO_PATH)
}
