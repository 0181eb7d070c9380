use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::Language, errors::Error, Result};

/// Typed runtime configuration, loaded from the environment (with `.env`
/// support for local runs).
#[derive(Clone, Debug)]
pub struct Config {
    // Transport
    pub telegram_bot_token: String,

    // Identity routing
    /// Fixed lowercase token expected in deep links (`start_<vertical>_<id>`).
    pub vertical: String,

    // Conversation defaults
    pub default_language: Language,

    // Cache lifetimes
    pub context_ttl: Duration,
    pub nudge_ttl: Duration,
    /// How long a user may stall mid-conversation before the nudge fires.
    pub nudge_delay: Duration,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,

    // Flood limiting
    pub flood_enabled: bool,
    pub flood_requests: u32,
    pub flood_window: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let vertical = env_str("LQB_VERTICAL")
            .and_then(non_empty)
            .unwrap_or_else(|| "realty".to_string())
            .to_lowercase();

        let default_language = match env_str("DEFAULT_LANGUAGE") {
            Some(code) if !code.trim().is_empty() => Language::from_code(&code)
                .ok_or_else(|| Error::Config(format!("unsupported DEFAULT_LANGUAGE: {code}")))?,
            _ => Language::En,
        };

        let context_ttl =
            Duration::from_secs(env_u64("CONTEXT_TTL_HOURS").unwrap_or(24) * 3600);
        let nudge_ttl = Duration::from_secs(env_u64("NUDGE_TTL_MINUTES").unwrap_or(10) * 60);
        let nudge_delay =
            Duration::from_secs(env_u64("NUDGE_DELAY_MINUTES").unwrap_or(10) * 60);

        let audit_log_path = PathBuf::from(
            env_str("AUDIT_LOG_PATH").unwrap_or("/tmp/lqb-audit.log".to_string()),
        );
        let audit_log_json = env_bool("AUDIT_LOG_JSON").unwrap_or(false);

        let flood_enabled = env_bool("FLOOD_LIMIT_ENABLED").unwrap_or(true);
        let flood_requests = env_u64("FLOOD_LIMIT_REQUESTS").unwrap_or(20) as u32;
        let flood_window = Duration::from_secs(env_u64("FLOOD_LIMIT_WINDOW").unwrap_or(60));

        Ok(Self {
            telegram_bot_token,
            vertical,
            default_language,
            context_ttl,
            nudge_ttl,
            nudge_delay,
            audit_log_path,
            audit_log_json,
            flood_enabled,
            flood_requests,
            flood_window,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() || env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}
