//! Ambient context interpolated into the system instruction.

use chrono::Local;

/// Opaque descriptive strings about where the user is talking from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbientContext {
    pub platform: String,
    pub client: String,
    pub local_time: String,
    pub timezone: String,
}

pub trait ContextProvider: Send + Sync {
    /// Snapshot taken once per attempt.
    fn ambient(&self) -> AmbientContext;
}

/// Reads the host: OS and architecture, terminal, local clock, `TZ`.
#[derive(Debug, Clone, Default)]
pub struct SystemContext;

impl ContextProvider for SystemContext {
    fn ambient(&self) -> AmbientContext {
        let now = Local::now();
        let terminal = std::env::var("TERM").unwrap_or_else(|_| "unknown terminal".to_string());
        let timezone = std::env::var("TZ")
            .ok()
            .filter(|tz| !tz.is_empty())
            .unwrap_or_else(|| format!("UTC{}", now.format("%:z")));
        AmbientContext {
            platform: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            client: format!("{} {} ({terminal})", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            local_time: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            timezone,
        }
    }
}

/// Always returns the same context. Used in tests.
#[derive(Debug, Clone)]
pub struct FixedContext(pub AmbientContext);

impl ContextProvider for FixedContext {
    fn ambient(&self) -> AmbientContext {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_context_fills_every_field() {
        let ctx = SystemContext.ambient();
        assert!(ctx.platform.contains(std::env::consts::OS));
        assert!(ctx.client.starts_with("smriti "));
        assert_eq!(ctx.local_time.len(), "2025-01-01 00:00:00".len());
        assert!(!ctx.timezone.is_empty());
    }
}
