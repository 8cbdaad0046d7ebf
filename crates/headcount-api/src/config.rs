//! API configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;

/// API server configuration, read from `API_*` variables.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    /// Dashboard origins allowed to drive the cameras; `*` allows any.
    pub allowed_origins: Vec<String>,
    /// Bound for start requests, which wait until the camera source is open.
    /// RTSP handshakes and ffprobe on a cold stream can take several seconds.
    pub start_timeout: Duration,
    /// Bound for stop, status and health. Stop waits for the frame loop to
    /// finish the frame in flight.
    pub request_timeout: Duration,
    /// A start body is a line and a few polygons.
    pub max_body_size: usize,
    /// development/production
    pub environment: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            allowed_origins: vec!["*".to_string()],
            start_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(15),
            max_body_size: 64 * 1024,
            environment: "development".to_string(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables; unset or unparsable values
    /// keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = env_or("API_HOST", defaults.bind_addr.ip());
        let port = env_or("API_PORT", defaults.bind_addr.port());

        Self {
            bind_addr: SocketAddr::new(host, port),
            allowed_origins: std::env::var("API_CORS_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or(defaults.allowed_origins),
            start_timeout: Duration::from_secs(env_or(
                "API_START_TIMEOUT",
                defaults.start_timeout.as_secs(),
            )),
            request_timeout: Duration::from_secs(env_or(
                "API_REQUEST_TIMEOUT",
                defaults.request_timeout.as_secs(),
            )),
            max_body_size: env_or("API_MAX_BODY_SIZE", defaults.max_body_size),
            environment: std::env::var("API_ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
