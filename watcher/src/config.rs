use crate::api::{Destination, Window};
use secrecy::SecretString;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Startup settings, read-only once built.
#[derive(Debug, Clone)]
pub struct Config {
    pub destination: Destination,
    pub branch: String,
    pub window: Window,
    /// `login:secret` pair sent as HTTP Basic credentials.
    pub auth: Option<SecretString>,
    pub api_url: String,
    pub update_interval: Duration,
    pub render_interval: Duration,
    pub size_top_table: usize,
    /// Open items older than this many days count as stale.
    pub stale_days: i64,
    pub throttle_interval: Duration,
    pub attempts: u32,
    pub retry_interval: Duration,
}

impl Config {
    pub fn new(destination: Destination) -> Self {
        Config {
            destination,
            branch: "master".to_string(),
            window: Window::default(),
            auth: None,
            api_url: DEFAULT_API_URL.to_string(),
            update_interval: Duration::from_secs(600),
            render_interval: Duration::from_millis(300),
            size_top_table: 30,
            stale_days: 30,
            throttle_interval: Duration::from_millis(300),
            attempts: 10,
            retry_interval: Duration::from_secs(60),
        }
    }
}
