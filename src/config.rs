/// Configuration from environment variables
///
/// Controls the Bitcoin network, the explorer API endpoint, the UTXO page size
/// and the retry/poll timing of send operations. Defaults to testnet.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::network::NetworkParams;
use crate::retry::{PollPolicy, RetryPolicy};

/// Default number of unspent outputs requested per listing
pub const DEFAULT_UTXO_LIMIT: u32 = 1000;

#[derive(Clone, Debug)]
pub struct SwapConfig {
    /// Network parameters (address encoding, key policy)
    pub network: NetworkParams,
    /// blockchain.info API base URL, if the network has one
    pub api_url: Option<String>,
    /// Page size for unspent output listings
    pub utxo_limit: u32,
    /// Backoff for chain queries and broadcasts
    pub retry: RetryPolicy,
    /// Postcondition polling budget
    pub poll: PollPolicy,
}

impl SwapConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `BITCOIN_NETWORK`: "testnet" (default), "mainnet" or "regtest"
    /// - `BLOCKCHAIN_INFO_URL`: API endpoint override (required for regtest)
    /// - `UTXO_LIMIT`: unspent outputs per listing (default 1000)
    /// - `RETRY_INITIAL_MS`: first backoff interval (default 1000)
    /// - `RETRY_GROWTH`: backoff growth factor (default 1.6)
    /// - `POLL_INTERVAL_SECS`: postcondition poll interval (default 5)
    /// - `POLL_ATTEMPTS`: polls per broadcast (default 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let network_str = env::var("BITCOIN_NETWORK").unwrap_or_default();
        let network = match NetworkParams::from_name(&network_str) {
            Ok(params) => {
                log::info!("Using {} network", params.name);
                params
            }
            Err(e) => {
                log::warn!("{}, defaulting to testnet", e);
                NetworkParams::testnet()
            }
        };

        let api_url = env::var("BLOCKCHAIN_INFO_URL")
            .ok()
            .or_else(|| network.api_url.map(str::to_string));
        match &api_url {
            Some(url) => log::info!("Explorer API: {}", url),
            None => log::warn!("No explorer API configured for {}", network.name),
        }

        let retry = RetryPolicy {
            initial_interval: Duration::from_millis(env_or(
                "RETRY_INITIAL_MS",
                defaults.retry.initial_interval.as_millis() as u64,
            )),
            growth_factor: env_or("RETRY_GROWTH", defaults.retry.growth_factor),
        };

        let poll = PollPolicy {
            interval: Duration::from_secs(env_or(
                "POLL_INTERVAL_SECS",
                defaults.poll.interval.as_secs(),
            )),
            attempts: env_or("POLL_ATTEMPTS", defaults.poll.attempts),
        };

        Self {
            network,
            api_url,
            utxo_limit: env_or("UTXO_LIMIT", DEFAULT_UTXO_LIMIT),
            retry,
            poll,
        }
    }

    /// Default configuration for the given network
    pub fn for_network(network: NetworkParams) -> Self {
        Self {
            api_url: network.api_url.map(str::to_string),
            network,
            ..Default::default()
        }
    }
}

impl Default for SwapConfig {
    /// Default configuration (testnet)
    fn default() -> Self {
        let network = NetworkParams::testnet();
        Self {
            api_url: network.api_url.map(str::to_string),
            network,
            utxo_limit: DEFAULT_UTXO_LIMIT,
            retry: RetryPolicy::default(),
            poll: PollPolicy::default(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Ignoring invalid {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}
