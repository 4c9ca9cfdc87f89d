//! Bitcoin network parameters
//!
//! Besides the `bitcoin::Network` itself, a network decides how an account
//! serializes its public key (and therefore which P2PKH address it owns) and
//! where transactions can be viewed.

use bitcoin::Network;

use crate::error::BtcSwapError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkParams {
    /// Canonical network name ("mainnet", "testnet3", "regtest")
    pub name: &'static str,
    /// Network type for the bitcoin crate
    pub network: Network,
    /// Serialize public keys in compressed (33 byte) form
    pub compressed_keys: bool,
    /// Block explorer base URL used by `format_transaction_view`
    pub explorer_url: Option<&'static str>,
    /// Default blockchain.info API endpoint
    pub api_url: Option<&'static str>,
}

impl NetworkParams {
    pub fn mainnet() -> Self {
        Self {
            name: "mainnet",
            network: Network::Bitcoin,
            compressed_keys: true,
            explorer_url: Some("https://www.blockchain.com/btc"),
            api_url: Some("https://blockchain.info"),
        }
    }

    pub fn testnet() -> Self {
        Self {
            name: "testnet3",
            network: Network::Testnet,
            compressed_keys: false,
            explorer_url: Some("https://testnet.blockchain.info"),
            api_url: Some("https://testnet.blockchain.info"),
        }
    }

    /// Local development network. No public explorer or API.
    pub fn regtest() -> Self {
        Self {
            name: "regtest",
            network: Network::Regtest,
            compressed_keys: true,
            explorer_url: None,
            api_url: None,
        }
    }

    /// Resolve a network by name (case insensitive, empty means testnet)
    pub fn from_name(name: &str) -> Result<Self, BtcSwapError> {
        match name.to_lowercase().as_str() {
            "mainnet" | "bitcoin" => Ok(Self::mainnet()),
            "testnet" | "testnet3" | "" => Ok(Self::testnet()),
            "regtest" => Ok(Self::regtest()),
            other => Err(BtcSwapError::UnsupportedNetwork(other.to_string())),
        }
    }

    /// Format a message with a link to the transaction
    pub fn format_transaction_view(&self, msg: &str, txid: &str) -> String {
        match self.explorer_url {
            Some(url) => format!("{}, transaction can be viewed at {}/tx/{}", msg, url, txid),
            None => format!("{}, transaction id {}", msg, txid),
        }
    }
}
