use quillpost_common::{
    query::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PaginationConfig},
    snowflake::{ProcessId, WorkerId},
    util::PositiveDuration,
};
use serde::Deserialize;
use std::{
    net::{IpAddr, Ipv4Addr},
    path::PathBuf,
};

pub const DEFAULT_FEED_LIMIT: u32 = 5;
pub const DEFAULT_AUTH_TOKEN_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;
pub const DEFAULT_MEDIA_MAX_BYTES: usize = 5 * 1024 * 1024;

/// Process environment, read once at startup through `envy`.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct Env {
    #[serde(default = "default_server_address")]
    pub server_address: IpAddr,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    /// Without a database url everything is kept in memory.
    pub database_url: Option<String>,
    #[serde(default)]
    pub worker_id: WorkerId,
    #[serde(default)]
    pub process_id: ProcessId,
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "max_page_size")]
    pub max_page_size: u32,
    #[serde(default = "default_feed_limit")]
    pub feed_limit: u32,
    /// `0` keeps tokens valid until logout.
    #[serde(default = "default_auth_token_ttl_seconds")]
    pub auth_token_ttl_seconds: i64,
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,
    #[serde(default = "default_media_base_url")]
    pub media_base_url: String,
    #[serde(default = "default_media_max_bytes")]
    pub media_max_bytes: usize,
}

fn default_server_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_server_port() -> u16 {
    5000
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn max_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_feed_limit() -> u32 {
    DEFAULT_FEED_LIMIT
}

fn default_auth_token_ttl_seconds() -> i64 {
    DEFAULT_AUTH_TOKEN_TTL_SECONDS
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_media_base_url() -> String {
    "/uploads".to_owned()
}

fn default_media_max_bytes() -> usize {
    DEFAULT_MEDIA_MAX_BYTES
}

/// The request-facing part of the configuration, shared through the server state.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct ApiConfig {
    pub pagination: PaginationConfig,
    pub feed_limit: u32,
    pub token_ttl: Option<PositiveDuration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            pagination: PaginationConfig::default(),
            feed_limit: DEFAULT_FEED_LIMIT,
            token_ttl: PositiveDuration::from_seconds(DEFAULT_AUTH_TOKEN_TTL_SECONDS),
        }
    }
}

impl From<&Env> for ApiConfig {
    fn from(env: &Env) -> Self {
        Self {
            pagination: PaginationConfig::new(env.default_page_size, env.max_page_size),
            feed_limit: env.feed_limit.max(1),
            token_ttl: PositiveDuration::from_seconds(env.auth_token_ttl_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{ApiConfig, DEFAULT_MEDIA_MAX_BYTES, Env};
    use std::net::{IpAddr, Ipv4Addr};

    fn env(vars: &[(&str, &str)]) -> Env {
        envy::from_iter(
            vars.iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned())),
        )
        .unwrap()
    }

    #[test]
    fn defaults() {
        let env = env(&[]);
        assert_eq!(env.server_address, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(env.database_url, None);
        assert_eq!(env.worker_id.get(), 0);
        assert_eq!(env.media_base_url, "/uploads");
        assert_eq!(env.media_max_bytes, DEFAULT_MEDIA_MAX_BYTES);

        assert_eq!(ApiConfig::from(&env), ApiConfig::default());
    }

    #[test]
    fn overrides() {
        let env = env(&[
            ("SERVER_PORT", "8080"),
            ("WORKER_ID", "3"),
            ("DEFAULT_PAGE_SIZE", "10"),
            ("MAX_PAGE_SIZE", "20"),
            ("AUTH_TOKEN_TTL_SECONDS", "0"),
        ]);
        assert_eq!(env.server_port, 8080);
        assert_eq!(env.worker_id.get(), 3);

        let config = ApiConfig::from(&env);
        assert_eq!(config.pagination.default_page_size, 10);
        assert_eq!(config.pagination.max_page_size, 20);
        assert_eq!(config.token_ttl, None);
    }

    #[test]
    fn invalid_worker_id_is_rejected() {
        let result = envy::from_iter::<_, Env>([("WORKER_ID".to_owned(), "99".to_owned())]);
        assert!(result.is_err());
    }
}
