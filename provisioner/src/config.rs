//! Provisioner configuration.
//!
//! Loaded from `CREDIX_*` environment variables. Addresses are kept as base58
//! strings and parsed on demand.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use credix_proxy_sdk::{
    config::{
        CREDIX_PROGRAM_ID, DEFAULT_GLOBAL_MARKET_SEED, DEX_PROGRAM_ID, GATEWAY_PROGRAM_ID,
        PROXY_PROGRAM_ID,
    },
    ListedMarket, MarketListing, ProxyConfig,
};
use serde::{Deserialize, Serialize};
use solana_commitment_config::CommitmentConfig;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};

use crate::drain::DrainConfig;

/// Configuration for the provisioner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    /// JSON-RPC endpoint.
    pub rpc_url: String,

    /// Path to the payer keypair (JSON array of 64 bytes).
    pub payer_keypair_path: String,

    /// Path to the market's crank authority keypair.
    pub crank_keypair_path: Option<String>,

    /// Directory receiving the prune and crank authority keypairs of newly
    /// listed markets.
    pub market_keys_dir: String,

    /// Proxy program (base58).
    pub proxy_program_id: String,

    /// Venue program (base58).
    pub dex_program_id: String,

    /// Validating program (base58).
    pub credix_program_id: String,

    /// Identity-credential program (base58).
    pub gateway_program_id: String,

    /// Permission network (base58).
    pub gatekeeper_network: Option<String>,

    /// LP token mint (base58). Created by `setup` when unset.
    pub lp_mint: Option<String>,

    /// Base token mint (base58).
    pub base_mint: Option<String>,

    /// Global market seed.
    pub market_seed: String,

    /// Market base lot size.
    pub base_lot_size: u64,

    /// Market quote lot size.
    pub quote_lot_size: u64,

    /// Market fee rate in basis points.
    pub fee_rate_bps: u16,

    /// Commitment level.
    pub commitment: String,

    /// HTTP request timeout in milliseconds.
    pub request_timeout_ms: u64,

    /// Confirmation timeout in milliseconds.
    pub confirm_timeout_ms: u64,

    /// Maximum event-queue drain rounds.
    pub drain_max_rounds: u32,

    /// Events consumed per drain round.
    pub drain_limit: u16,

    /// Pause between drain rounds in milliseconds.
    pub drain_interval_ms: u64,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8899".to_string(),
            payer_keypair_path: "~/.config/solana/id.json".to_string(),
            crank_keypair_path: None,
            market_keys_dir: "market-keys".to_string(),
            proxy_program_id: PROXY_PROGRAM_ID.to_string(),
            dex_program_id: DEX_PROGRAM_ID.to_string(),
            credix_program_id: CREDIX_PROGRAM_ID.to_string(),
            gateway_program_id: GATEWAY_PROGRAM_ID.to_string(),
            gatekeeper_network: None,
            lp_mint: None,
            base_mint: None,
            market_seed: DEFAULT_GLOBAL_MARKET_SEED.to_string(),
            base_lot_size: 10_000,
            quote_lot_size: 10_000,
            fee_rate_bps: 0,
            commitment: "confirmed".to_string(),
            request_timeout_ms: 30_000,
            confirm_timeout_ms: 60_000,
            drain_max_rounds: 32,
            drain_limit: 1,
            drain_interval_ms: 500,
        }
    }
}

fn parse_number<T: std::str::FromStr>(var: &str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber {
            var: var.to_string(),
            value,
        })
}

impl ProvisionerConfig {
    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Loads the configuration from `lookup`, falling back to defaults for
    /// unset variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let strings: [(&str, &mut String); 9] = [
            ("CREDIX_RPC_URL", &mut config.rpc_url),
            ("CREDIX_PAYER_KEYPAIR", &mut config.payer_keypair_path),
            ("CREDIX_MARKET_KEYS_DIR", &mut config.market_keys_dir),
            ("CREDIX_PROXY_PROGRAM_ID", &mut config.proxy_program_id),
            ("CREDIX_DEX_PROGRAM_ID", &mut config.dex_program_id),
            ("CREDIX_PROGRAM_ID", &mut config.credix_program_id),
            ("CREDIX_GATEWAY_PROGRAM_ID", &mut config.gateway_program_id),
            ("CREDIX_MARKET_SEED", &mut config.market_seed),
            ("CREDIX_COMMITMENT", &mut config.commitment),
        ];
        for (var, slot) in strings {
            if let Some(value) = lookup(var) {
                *slot = value;
            }
        }

        config.crank_keypair_path = lookup("CREDIX_CRANK_KEYPAIR");
        config.gatekeeper_network = lookup("CREDIX_GATEKEEPER_NETWORK");
        config.lp_mint = lookup("CREDIX_LP_MINT");
        config.base_mint = lookup("CREDIX_BASE_MINT");

        if let Some(v) = lookup("CREDIX_BASE_LOT_SIZE") {
            config.base_lot_size = parse_number("CREDIX_BASE_LOT_SIZE", v)?;
        }
        if let Some(v) = lookup("CREDIX_QUOTE_LOT_SIZE") {
            config.quote_lot_size = parse_number("CREDIX_QUOTE_LOT_SIZE", v)?;
        }
        if let Some(v) = lookup("CREDIX_FEE_RATE_BPS") {
            config.fee_rate_bps = parse_number("CREDIX_FEE_RATE_BPS", v)?;
        }
        if let Some(v) = lookup("CREDIX_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = parse_number("CREDIX_REQUEST_TIMEOUT_MS", v)?;
        }
        if let Some(v) = lookup("CREDIX_CONFIRM_TIMEOUT_MS") {
            config.confirm_timeout_ms = parse_number("CREDIX_CONFIRM_TIMEOUT_MS", v)?;
        }
        if let Some(v) = lookup("CREDIX_DRAIN_MAX_ROUNDS") {
            config.drain_max_rounds = parse_number("CREDIX_DRAIN_MAX_ROUNDS", v)?;
        }
        if let Some(v) = lookup("CREDIX_DRAIN_LIMIT") {
            config.drain_limit = parse_number("CREDIX_DRAIN_LIMIT", v)?;
        }
        if let Some(v) = lookup("CREDIX_DRAIN_INTERVAL_MS") {
            config.drain_interval_ms = parse_number("CREDIX_DRAIN_INTERVAL_MS", v)?;
        }

        Ok(config)
    }

    /// Sets the RPC endpoint.
    #[must_use]
    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = url.into();
        self
    }

    /// Sets the permission network.
    #[must_use]
    pub fn with_gatekeeper_network(mut self, network: impl Into<String>) -> Self {
        self.gatekeeper_network = Some(network.into());
        self
    }

    /// Sets the LP mint.
    #[must_use]
    pub fn with_lp_mint(mut self, mint: impl Into<String>) -> Self {
        self.lp_mint = Some(mint.into());
        self
    }

    /// Sets the base mint.
    #[must_use]
    pub fn with_base_mint(mut self, mint: impl Into<String>) -> Self {
        self.base_mint = Some(mint.into());
        self
    }

    /// Sets the market lot sizes.
    #[must_use]
    pub fn with_lot_sizes(mut self, base: u64, quote: u64) -> Self {
        self.base_lot_size = base;
        self.quote_lot_size = quote;
        self
    }

    /// Sets the drain bounds.
    #[must_use]
    pub fn with_drain(mut self, max_rounds: u32, interval_ms: u64) -> Self {
        self.drain_max_rounds = max_rounds;
        self.drain_interval_ms = interval_ms;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc_url.is_empty() {
            return Err(ConfigError::MissingValue("CREDIX_RPC_URL"));
        }
        if self.market_seed.is_empty() || self.market_seed.len() > 32 {
            return Err(ConfigError::InvalidMarketSeed(self.market_seed.clone()));
        }
        if self.base_lot_size == 0 || self.quote_lot_size == 0 {
            return Err(ConfigError::InvalidLotSize);
        }
        if self.request_timeout_ms == 0 || self.confirm_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        self.commitment_config()?;
        if self.drain_max_rounds == 0 || self.drain_limit == 0 {
            return Err(ConfigError::InvalidDrainBounds);
        }

        for (label, value) in [
            ("proxy_program_id", Some(&self.proxy_program_id)),
            ("dex_program_id", Some(&self.dex_program_id)),
            ("credix_program_id", Some(&self.credix_program_id)),
            ("gateway_program_id", Some(&self.gateway_program_id)),
            ("gatekeeper_network", self.gatekeeper_network.as_ref()),
            ("lp_mint", self.lp_mint.as_ref()),
            ("base_mint", self.base_mint.as_ref()),
        ] {
            if let Some(value) = value {
                parse_pubkey(label, value)?;
            }
        }

        Ok(())
    }

    /// Parses the commitment level.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCommitment` for an unknown level.
    pub fn commitment_config(&self) -> Result<CommitmentConfig, ConfigError> {
        CommitmentConfig::from_str(&self.commitment)
            .map_err(|_| ConfigError::InvalidCommitment(self.commitment.clone()))
    }

    /// HTTP request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Confirmation timeout.
    #[must_use]
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }

    /// Returns the permission network.
    ///
    /// # Errors
    ///
    /// Returns an error if it is unset or invalid.
    pub fn gatekeeper_network(&self) -> Result<Pubkey, ConfigError> {
        required_pubkey("CREDIX_GATEKEEPER_NETWORK", self.gatekeeper_network.as_deref())
    }

    /// Returns the LP mint.
    ///
    /// # Errors
    ///
    /// Returns an error if it is unset or invalid.
    pub fn lp_mint(&self) -> Result<Pubkey, ConfigError> {
        required_pubkey("CREDIX_LP_MINT", self.lp_mint.as_deref())
    }

    /// Returns the base mint.
    ///
    /// # Errors
    ///
    /// Returns an error if it is unset or invalid.
    pub fn base_mint(&self) -> Result<Pubkey, ConfigError> {
        required_pubkey("CREDIX_BASE_MINT", self.base_mint.as_deref())
    }

    /// Builds the proxy configuration around `lp_mint`.
    ///
    /// # Errors
    ///
    /// Returns an error if an address is unset or invalid.
    pub fn proxy_config(&self, lp_mint: Pubkey) -> Result<ProxyConfig, ConfigError> {
        Ok(ProxyConfig::new(self.gatekeeper_network()?, lp_mint)
            .with_proxy_program(parse_pubkey("proxy_program_id", &self.proxy_program_id)?)
            .with_dex_program(parse_pubkey("dex_program_id", &self.dex_program_id)?)
            .with_credix_program(parse_pubkey("credix_program_id", &self.credix_program_id)?)
            .with_gateway_program(parse_pubkey("gateway_program_id", &self.gateway_program_id)?)
            .with_global_market_seed(self.market_seed.clone()))
    }

    /// Listing parameters for an LP/base market.
    #[must_use]
    pub fn listing(&self, lp_mint: Pubkey, base_mint: Pubkey) -> MarketListing {
        MarketListing::new(lp_mint, base_mint, self.base_lot_size, self.quote_lot_size)
            .with_fee_rate_bps(self.fee_rate_bps)
    }

    /// Drain loop settings.
    #[must_use]
    pub fn drain_config(&self) -> DrainConfig {
        DrainConfig {
            max_rounds: self.drain_max_rounds,
            limit_per_round: self.drain_limit,
            interval: Duration::from_millis(self.drain_interval_ms),
        }
    }

    /// Loads the payer keypair.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a keypair.
    pub fn load_payer(&self) -> Result<Keypair, ConfigError> {
        load_keypair(&self.payer_keypair_path)
    }

    /// Loads the crank authority keypair.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is unset, unreadable or not a keypair.
    pub fn load_crank_authority(&self) -> Result<Keypair, ConfigError> {
        let path = self
            .crank_keypair_path
            .as_deref()
            .ok_or(ConfigError::MissingValue("CREDIX_CRANK_KEYPAIR"))?;
        load_keypair(path)
    }

    /// Saves the prune and crank authorities of `market` under
    /// `market_keys_dir` as `<market>-prune.json` and `<market>-crank.json`.
    ///
    /// Returns the prune and crank keypair paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or a file cannot be written.
    pub fn save_market_authorities(
        &self,
        market: &ListedMarket,
    ) -> Result<(PathBuf, PathBuf), ConfigError> {
        let dir = PathBuf::from(expand_home(&self.market_keys_dir));
        std::fs::create_dir_all(&dir).map_err(|e| ConfigError::Keypair {
            path: dir.to_string_lossy().into_owned(),
            reason: e.to_string(),
        })?;

        let prune = dir.join(format!("{}-prune.json", market.market));
        let crank = dir.join(format!("{}-crank.json", market.market));
        write_keypair(&prune, &market.prune_authority)?;
        write_keypair(&crank, &market.crank_authority)?;
        Ok((prune, crank))
    }
}

/// Loads a keypair file, expanding a leading `~/`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a keypair.
pub fn load_keypair(path: &str) -> Result<Keypair, ConfigError> {
    let path = expand_home(path);
    let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Keypair {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    parse_keypair(&text).map_err(|reason| ConfigError::Keypair { path, reason })
}

/// Writes `keypair` to `path` as a JSON array of 64 bytes, refusing to
/// overwrite an existing file.
///
/// # Errors
///
/// Returns an error if the file exists or cannot be written.
pub fn write_keypair(path: &Path, keypair: &Keypair) -> Result<(), ConfigError> {
    let failed = |reason: String| ConfigError::Keypair {
        path: path.to_string_lossy().into_owned(),
        reason,
    };
    let text = serde_json::to_string(&keypair.to_bytes().to_vec())
        .map_err(|e| failed(e.to_string()))?;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| failed(e.to_string()))?;
    std::io::Write::write_all(&mut file, text.as_bytes()).map_err(|e| failed(e.to_string()))?;
    tracing::debug!(path = %path.display(), pubkey = %keypair.pubkey(), "Keypair written");
    Ok(())
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => Path::new(&home).join(rest).to_string_lossy().into_owned(),
        _ => path.to_string(),
    }
}

/// Parses a keypair stored as a JSON array of 64 bytes.
///
/// # Errors
///
/// Returns a description of the failure.
pub fn parse_keypair(text: &str) -> Result<Keypair, String> {
    let bytes: Vec<u8> = serde_json::from_str(text).map_err(|e| e.to_string())?;
    if bytes.len() != 64 {
        return Err(format!("expected 64 bytes, found {}", bytes.len()));
    }
    Keypair::try_from(bytes.as_slice()).map_err(|e| e.to_string())
}

/// Parses a base58 address.
///
/// # Errors
///
/// Returns `InvalidAddress` if the value is not 32 base58-encoded bytes.
pub fn parse_pubkey(label: &str, value: &str) -> Result<Pubkey, ConfigError> {
    let invalid = || ConfigError::InvalidAddress {
        field: label.to_string(),
        value: value.to_string(),
    };
    let bytes = bs58::decode(value.trim()).into_vec().map_err(|_| invalid())?;
    let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| invalid())?;
    Ok(Pubkey::new_from_array(arr))
}

fn required_pubkey(var: &'static str, value: Option<&str>) -> Result<Pubkey, ConfigError> {
    let value = value.ok_or(ConfigError::MissingValue(var))?;
    parse_pubkey(var, value)
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required value is unset.
    #[error("{0} is not set")]
    MissingValue(&'static str),

    /// Invalid base58 address.
    #[error("invalid address for {field}: {value}")]
    InvalidAddress {
        /// Field or variable name.
        field: String,
        /// Offending value.
        value: String,
    },

    /// Numeric variable does not parse.
    #[error("{var} must be a number, got '{value}'")]
    InvalidNumber {
        /// Variable name.
        var: String,
        /// Offending value.
        value: String,
    },

    /// Market seed empty or too long.
    #[error("market seed must be 1..=32 bytes: '{0}'")]
    InvalidMarketSeed(String),

    /// Lot size of zero.
    #[error("lot sizes must be > 0")]
    InvalidLotSize,

    /// Zero request or confirmation timeout.
    #[error("request_timeout_ms and confirm_timeout_ms must be > 0")]
    InvalidTimeout,

    /// Unknown commitment level.
    #[error("unknown commitment level '{0}'")]
    InvalidCommitment(String),

    /// Zero drain bounds.
    #[error("drain_max_rounds and drain_limit must be > 0")]
    InvalidDrainBounds,

    /// Keypair file unreadable or malformed.
    #[error("keypair {path}: {reason}")]
    Keypair {
        /// File path.
        path: String,
        /// Failure description.
        reason: String,
    },
}
