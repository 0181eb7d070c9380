use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{domain::LeadKey, errors::Error, Result};

// ============== Timestamp Helpers ==============

/// RFC3339 timestamp in UTC (for logs/telemetry).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

// ============== Audit Logging ==============

const AUDIT_MAX_TEXT: usize = 500;

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,

    /// Tenant of a deep link that lost to an existing binding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored_tenant: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl AuditEvent {
    fn base(event: &str) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: event.to_string(),
            tenant_id: None,
            user: None,
            state: None,
            score: None,
            content: None,
            reply: None,
            ignored_tenant: None,
            error: None,
            context: None,
        }
    }

    pub fn message(key: &LeadKey, state: &str, score: u8, content: &str, reply: &str) -> Self {
        Self {
            tenant_id: Some(key.tenant.to_string()),
            user: Some(key.user.to_string()),
            state: Some(state.to_string()),
            score: Some(score),
            content: Some(content.to_string()),
            reply: Some(reply.to_string()),
            ..Self::base("message")
        }
    }

    pub fn identity_conflict(key: &LeadKey, ignored_tenant: &str) -> Self {
        Self {
            tenant_id: Some(key.tenant.to_string()),
            user: Some(key.user.to_string()),
            ignored_tenant: Some(ignored_tenant.to_string()),
            ..Self::base("identity_conflict")
        }
    }

    pub fn unresolved(identifier: &str, content: &str) -> Self {
        Self {
            user: Some(identifier.to_string()),
            content: Some(content.to_string()),
            ..Self::base("unresolved_identity")
        }
    }

    pub fn flood_dropped(identifier: &str) -> Self {
        Self {
            user: Some(identifier.to_string()),
            ..Self::base("flood_dropped")
        }
    }

    pub fn nudge(key: &LeadKey) -> Self {
        Self {
            tenant_id: Some(key.tenant.to_string()),
            user: Some(key.user.to_string()),
            ..Self::base("nudge")
        }
    }

    pub fn handoff(key: &LeadKey, state: &str, note: Option<&str>) -> Self {
        Self {
            tenant_id: Some(key.tenant.to_string()),
            user: Some(key.user.to_string()),
            state: Some(state.to_string()),
            content: note.map(|s| s.to_string()),
            ..Self::base("handoff")
        }
    }

    pub fn error(identifier: &str, error: &str, context: Option<&str>) -> Self {
        Self {
            user: Some(identifier.to_string()),
            error: Some(error.to_string()),
            context: context.map(|s| s.to_string()),
            ..Self::base("error")
        }
    }
}

/// Append-only audit trail. JSON lines or a plain readable format.
#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        // Inbound/outbound payloads can be large; cap them.
        if let Some(s) = &event.content {
            event.content = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }
        if let Some(s) = &event.reply {
            event.reply = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        let value = serde_json::to_value(&event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::EngineFault(
                "audit event is not a JSON object".to_string(),
            ));
        };

        let mut out = String::new();
        out.push('\n');
        out.push_str(&"=".repeat(60));
        for (k, v) in obj {
            out.push('\n');
            out.push_str(k);
            out.push_str(": ");
            match v {
                serde_json::Value::String(s) => out.push_str(s),
                other => out.push_str(&other.to_string()),
            }
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TenantId, UserKey};

    fn tmp_file(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}.log"))
    }

    fn key() -> LeadKey {
        LeadKey::new(
            TenantId("42".to_string()),
            UserKey::normalize("111").unwrap(),
        )
    }

    #[test]
    fn truncate_text_adds_ellipsis() {
        let s = "a".repeat(AUDIT_MAX_TEXT + 10);
        let t = truncate_text(&s, AUDIT_MAX_TEXT);
        assert!(t.ends_with("..."));
    }

    #[test]
    fn message_event_truncates_long_content() {
        let log = AuditLogger::new(tmp_file("lqb-audit-test"), true);
        let content = "x".repeat(AUDIT_MAX_TEXT + 50);
        log.write(AuditEvent::message(&key(), "SLOT_FILLING", 30, &content, "ok"))
            .unwrap();

        let written = std::fs::read_to_string(log.path()).unwrap();
        assert!(written.contains("..."));
        assert!(written.contains("SLOT_FILLING"));
    }

    #[test]
    fn conflict_event_records_both_tenants() {
        let log = AuditLogger::new(tmp_file("lqb-audit-conflict"), true);
        log.write(AuditEvent::identity_conflict(&key(), "99"))
            .unwrap();

        let written = std::fs::read_to_string(log.path()).unwrap();
        assert!(written.contains("identity_conflict"));
        assert!(written.contains("\"tenant_id\":\"42\""));
        assert!(written.contains("\"ignored_tenant\":\"99\""));
    }
}
