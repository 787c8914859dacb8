// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup. Every trust
//! setting exists once per [`Network`]; nothing is looked up globally.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory holding `mint.redb` | unset: in-memory storage |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `MINT_CHALLENGE_VALIDITY_SECS` | Challenge validity window | `300` |
//! | `MINT_{TEST,LIVE}_SIGNING_KEY` | Hex secp256k1 secret of this mint | ephemeral key |
//! | `MINT_{TEST,LIVE}_TRUSTED_MINTS` | Comma-separated peer mint addresses | empty |
//! | `MINT_{TEST,LIVE}_EMAIL_VERIFIERS` | Comma-separated verifier addresses | empty |
//! | `MINT_{TEST,LIVE}_KNOWN_ACCOUNTS` | Comma-separated account addresses | empty |
//! | `MINT_PEERS` | `address=base_url` pairs, comma-separated | empty |
//! | `MINT_PROPAGATION_QUEUE` | Propagation queue capacity | `256` |

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::challenge::DEFAULT_CHALLENGE_VALIDITY;
use crate::auth::keys::{self, Keypair};
use crate::logging::LogFormat;
use crate::network::Network;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const CHALLENGE_VALIDITY_ENV: &str = "MINT_CHALLENGE_VALIDITY_SECS";
pub const PEERS_ENV: &str = "MINT_PEERS";
pub const PROPAGATION_QUEUE_ENV: &str = "MINT_PROPAGATION_QUEUE";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_PROPAGATION_QUEUE: usize = 256;

/// Name of the database file inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "mint.redb";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is invalid: {reason}")]
    Invalid { var: String, reason: String },
}

impl ConfigError {
    fn invalid(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var: var.into(),
            reason: reason.into(),
        }
    }
}

/// Trust anchors and identity of this mint on one network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub network: Network,
    pub keypair: Keypair,
    /// Mint keys whose challenges are accepted. Always includes our own.
    pub trusted_mints: Vec<String>,
    /// Verifiers allowed to attest email facts.
    pub email_verifiers: Vec<String>,
    /// Accounts known to exist on the network.
    pub known_accounts: Vec<String>,
}

impl NetworkConfig {
    pub fn new(network: Network, keypair: Keypair) -> Self {
        let trusted_mints = vec![keypair.address().to_string()];
        Self {
            network,
            keypair,
            trusted_mints,
            email_verifiers: Vec::new(),
            known_accounts: Vec::new(),
        }
    }

    pub fn address(&self) -> &str {
        self.keypair.address()
    }

    pub fn with_trusted_mint(mut self, address: impl Into<String>) -> Self {
        push_unique(&mut self.trusted_mints, address.into());
        self
    }

    pub fn with_email_verifier(mut self, address: impl Into<String>) -> Self {
        push_unique(&mut self.email_verifiers, address.into());
        self
    }

    pub fn with_known_account(mut self, address: impl Into<String>) -> Self {
        push_unique(&mut self.known_accounts, address.into());
        self
    }

    fn from_lookup(
        network: Network,
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let prefix = format!("MINT_{}", network.as_str().to_ascii_uppercase());

        let key_var = format!("{prefix}_SIGNING_KEY");
        let keypair = match lookup(&key_var) {
            Some(secret) => Keypair::from_secret_hex(&secret)
                .map_err(|e| ConfigError::invalid(&key_var, e.to_string()))?,
            None => {
                let keypair = Keypair::generate();
                tracing::warn!(
                    %network,
                    address = %keypair.address(),
                    "{key_var} not set, using an ephemeral signing key"
                );
                keypair
            }
        };

        let mut config = Self::new(network, keypair);
        for mint in address_list(lookup, &format!("{prefix}_TRUSTED_MINTS"))? {
            push_unique(&mut config.trusted_mints, mint);
        }
        config.email_verifiers = address_list(lookup, &format!("{prefix}_EMAIL_VERIFIERS"))?;
        config.known_accounts = address_list(lookup, &format!("{prefix}_KNOWN_ACCOUNTS"))?;
        Ok(config)
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Parse a comma-separated list of addresses into canonical form.
fn address_list(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
) -> Result<Vec<String>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(Vec::new());
    };
    let mut addresses = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let address = keys::canonical_address(item)
            .map_err(|e| ConfigError::invalid(var, format!("{item}: {e}")))?;
        push_unique(&mut addresses, address);
    }
    Ok(addresses)
}

/// Whole-process configuration.
#[derive(Debug, Clone)]
pub struct MintConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: Option<PathBuf>,
    pub log_format: LogFormat,
    pub challenge_validity: Duration,
    pub propagation_queue: usize,
    /// Owner mint address → base URL of its HTTP API.
    pub peers: HashMap<String, String>,
    test: NetworkConfig,
    live: NetworkConfig,
}

impl MintConfig {
    /// Defaults with the given per-network identities.
    pub fn new(test: NetworkConfig, live: NetworkConfig) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            data_dir: None,
            log_format: LogFormat::default(),
            challenge_validity: DEFAULT_CHALLENGE_VALIDITY,
            propagation_queue: DEFAULT_PROPAGATION_QUEUE,
            peers: HashMap::new(),
            test,
            live,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let test = NetworkConfig::from_lookup(Network::Test, &lookup)?;
        let live = NetworkConfig::from_lookup(Network::Live, &lookup)?;
        let mut config = Self::new(test, live);

        if let Some(host) = lookup(HOST_ENV) {
            config.host = host;
        }
        if let Some(port) = lookup(PORT_ENV) {
            config.port = port
                .parse()
                .map_err(|_| ConfigError::invalid(PORT_ENV, format!("{port:?} is not a port")))?;
        }
        config.data_dir = lookup(DATA_DIR_ENV)
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);
        if let Some(format) = lookup(LOG_FORMAT_ENV) {
            config.log_format = LogFormat::from_str_lossy(&format);
        }
        if let Some(secs) = lookup(CHALLENGE_VALIDITY_ENV) {
            let secs: u64 = secs.parse().map_err(|_| {
                ConfigError::invalid(CHALLENGE_VALIDITY_ENV, format!("{secs:?} is not a number"))
            })?;
            if secs == 0 {
                return Err(ConfigError::invalid(CHALLENGE_VALIDITY_ENV, "must be positive"));
            }
            config.challenge_validity = Duration::from_secs(secs);
        }
        if let Some(size) = lookup(PROPAGATION_QUEUE_ENV) {
            config.propagation_queue = size
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    ConfigError::invalid(PROPAGATION_QUEUE_ENV, format!("{size:?} is not a positive number"))
                })?;
        }
        if let Some(peers) = lookup(PEERS_ENV) {
            config.peers = parse_peers(&peers)?;
        }

        Ok(config)
    }

    pub fn network(&self, network: Network) -> &NetworkConfig {
        match network {
            Network::Test => &self.test,
            Network::Live => &self.live,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn database_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(DATABASE_FILE))
    }
}

fn parse_peers(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut peers = HashMap::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (address, url) = item
            .split_once('=')
            .ok_or_else(|| ConfigError::invalid(PEERS_ENV, format!("{item:?} is not address=url")))?;
        let address = keys::canonical_address(address)
            .map_err(|e| ConfigError::invalid(PEERS_ENV, format!("{address}: {e}")))?;
        let url = url.trim().trim_end_matches('/');
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::invalid(PEERS_ENV, format!("{url:?} is not an http(s) URL")));
        }
        peers.insert(address, url.to_string());
    }
    Ok(peers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn lookup_from(vars: &[(&str, String)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = MintConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.challenge_validity, Duration::from_secs(300));
        assert!(config.database_path().is_none());
        assert_ne!(
            config.network(Network::Test).address(),
            config.network(Network::Live).address()
        );
        // Our own key is always a trust anchor.
        let test = config.network(Network::Test);
        assert_eq!(test.trusted_mints, vec![test.address().to_string()]);
    }

    #[test]
    fn reads_per_network_lists() {
        let peer = Keypair::generate();
        let verifier = Keypair::generate();
        let lookup = lookup_from(&[
            ("MINT_LIVE_SIGNING_KEY", SECRET.to_string()),
            ("MINT_LIVE_TRUSTED_MINTS", format!(" {} ,", peer.address().to_uppercase())),
            ("MINT_TEST_EMAIL_VERIFIERS", verifier.address().to_string()),
            ("MINT_PEERS", format!("{}=http://peer:8080/", peer.address())),
            ("MINT_CHALLENGE_VALIDITY_SECS", "60".to_string()),
            ("DATA_DIR", "/tmp/mint".to_string()),
        ]);
        let config = MintConfig::from_lookup(lookup).unwrap();

        let live = config.network(Network::Live);
        assert_eq!(live.address(), Keypair::from_secret_hex(SECRET).unwrap().address());
        assert_eq!(live.trusted_mints.len(), 2);
        assert!(live.trusted_mints.contains(&peer.address().to_string()));
        assert!(live.email_verifiers.is_empty());

        let test = config.network(Network::Test);
        assert_eq!(test.email_verifiers, vec![verifier.address().to_string()]);
        assert_eq!(test.trusted_mints.len(), 1);

        assert_eq!(config.peers.get(peer.address()).unwrap(), "http://peer:8080");
        assert_eq!(config.challenge_validity, Duration::from_secs(60));
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/tmp/mint/mint.redb")
        );
    }

    #[test]
    fn rejects_malformed_values() {
        for (var, value) in [
            ("PORT", "http"),
            ("MINT_TEST_SIGNING_KEY", "zz"),
            ("MINT_TEST_TRUSTED_MINTS", "not-a-key"),
            ("MINT_PEERS", "no-equals-sign"),
            ("MINT_CHALLENGE_VALIDITY_SECS", "0"),
            ("MINT_PROPAGATION_QUEUE", "0"),
        ] {
            let lookup = lookup_from(&[(var, value.to_string())]);
            let err = MintConfig::from_lookup(lookup).unwrap_err();
            assert!(err.to_string().contains(var), "{var}: {err}");
        }
    }
}
