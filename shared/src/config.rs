use crate::TtlMs;
use tracing::warn;

/// Node configuration, loaded from `KEYGRID_*` environment variables.
pub struct Config {
    pub host: String,
    pub http_port: u16,
    pub peer_port: u16,
    pub region: String,
    pub peers: Vec<String>,
    pub data_dir: String,
    pub positive_ttl: TtlMs,
    pub negative_ttl: TtlMs,
    pub propagation: PropagationConfig,
}

/// Retry policy for the invalidation fan-out. `deadline_ms` is the externally
/// promised staleness window: a peer that cannot be reached within it falls
/// back to TTL expiry.
#[derive(Clone, Copy, Debug)]
pub struct PropagationConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub deadline_ms: u64,
}

impl Config {
    const DEFAULT_REGION: &str = "local";
    const DEFAULT_DATA_DIR: &str = "./data";
    const DEFAULT_POSITIVE_TTL_MS: u64 = 60_000;
    const DEFAULT_NEGATIVE_TTL_MS: u64 = 10_000;
    const DEFAULT_PROPAGATION_DEADLINE_MS: u64 = 30_000;
    const DEFAULT_PROPAGATION_MAX_ATTEMPTS: u32 = 5;
    const DEFAULT_PROPAGATION_BACKOFF_MS: u64 = 250;

    pub fn from_env() -> Self {
        let host = std::env::var("KEYGRID_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let http_port = parse_var("KEYGRID_HTTP_PORT", 8080u16);
        let peer_port = parse_var("KEYGRID_PEER_PORT", 5500u16);

        let region = std::env::var("KEYGRID_REGION").unwrap_or_else(|_| {
            warn!("KEYGRID_REGION not set, defaulting to '{}'", Self::DEFAULT_REGION);
            Self::DEFAULT_REGION.to_string()
        });

        let peers = std::env::var("KEYGRID_PEERS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let positive_ttl = TtlMs(parse_var(
            "KEYGRID_POSITIVE_TTL_MS",
            Self::DEFAULT_POSITIVE_TTL_MS,
        ));
        let negative_ttl = TtlMs(parse_var(
            "KEYGRID_NEGATIVE_TTL_MS",
            Self::DEFAULT_NEGATIVE_TTL_MS,
        ));

        Self {
            host,
            http_port,
            peer_port,
            region,
            peers,
            data_dir: std::env::var("KEYGRID_DATA_DIR")
                .unwrap_or_else(|_| Self::DEFAULT_DATA_DIR.to_string()),
            positive_ttl,
            negative_ttl,
            propagation: PropagationConfig {
                max_attempts: parse_var(
                    "KEYGRID_PROPAGATION_MAX_ATTEMPTS",
                    Self::DEFAULT_PROPAGATION_MAX_ATTEMPTS,
                ),
                initial_backoff_ms: parse_var(
                    "KEYGRID_PROPAGATION_BACKOFF_MS",
                    Self::DEFAULT_PROPAGATION_BACKOFF_MS,
                ),
                deadline_ms: parse_var(
                    "KEYGRID_PROPAGATION_DEADLINE_MS",
                    Self::DEFAULT_PROPAGATION_DEADLINE_MS,
                ),
            },
        }
    }
}

fn parse_var<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.parse::<T>().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default", name, raw);
            default
        }),
        Err(_) => default,
    }
}
