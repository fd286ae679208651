use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub sse_keepalive_secs: u64,
    pub event_buffer: usize,
    /// Cap on elicitations per field. `None` keeps reprompting until the
    /// actor supplies a valid value or cancels.
    pub max_attempts: Option<u32>,
    /// Sessions with nothing pending and no activity for this long are
    /// closed by the idle sweep.
    pub session_idle_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            sse_keepalive_secs: 30,
            event_buffer: 64,
            max_attempts: None,
            session_idle_secs: 30 * 60,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            sse_keepalive_secs: env::var("SSE_KEEPALIVE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.sse_keepalive_secs),
            event_buffer: env::var("EVENT_BUFFER")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.event_buffer),
            max_attempts: env::var("BOOKING_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0),
            session_idle_secs: env::var("SESSION_IDLE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.session_idle_secs),
        }
    }
}
