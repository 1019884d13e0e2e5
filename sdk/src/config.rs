//! Proxy configuration.
//!
//! Every identifier the proxy needs (program ids, permission network, LP mint,
//! market seed) travels in one explicit [`ProxyConfig`] value passed to each
//! component constructor.

use std::str::FromStr;

use solana_sdk::pubkey::Pubkey;

use crate::error::ProxyError;

/// Deployed permissioned market proxy program.
pub const PROXY_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("iPRL869bGrTiJZP6GW2ysPYXV9PMKSMAr6CYhRJx3zq");

/// Order-book venue program.
pub const DEX_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin");

/// Credix validating program.
pub const CREDIX_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("8HE5gUxtvXEpHFjaJW3SNcZe2vXEusKWcWJWoF8aJQ8");

/// Identity-credential (gateway) program.
pub const GATEWAY_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("gatem74V238djXdzWnJf94Wo1DcnuGkfijbf3AuBhfs");

/// Default global market seed.
pub const DEFAULT_GLOBAL_MARKET_SEED: &str = "credix-market";

/// Configuration shared by the augmenter, the bootstrapper and the provisioner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Permissioned market proxy program.
    pub proxy_program_id: Pubkey,
    /// Order-book venue program.
    pub dex_program_id: Pubkey,
    /// Validating program owning the market state and passes.
    pub credix_program_id: Pubkey,
    /// Identity-credential program.
    pub gateway_program_id: Pubkey,
    /// Permission network the credentials are issued under.
    pub gatekeeper_network: Pubkey,
    /// LP token mint traded on the market.
    pub lp_token_mint: Pubkey,
    /// Seed of the global market state.
    pub global_market_seed: String,
}

impl ProxyConfig {
    /// Creates a configuration with the deployed program ids and default seed.
    #[must_use]
    pub fn new(gatekeeper_network: Pubkey, lp_token_mint: Pubkey) -> Self {
        Self {
            proxy_program_id: PROXY_PROGRAM_ID,
            dex_program_id: DEX_PROGRAM_ID,
            credix_program_id: CREDIX_PROGRAM_ID,
            gateway_program_id: GATEWAY_PROGRAM_ID,
            gatekeeper_network,
            lp_token_mint,
            global_market_seed: DEFAULT_GLOBAL_MARKET_SEED.to_string(),
        }
    }

    /// Sets the proxy program id.
    #[must_use]
    pub fn with_proxy_program(mut self, program_id: Pubkey) -> Self {
        self.proxy_program_id = program_id;
        self
    }

    /// Sets the venue program id.
    #[must_use]
    pub fn with_dex_program(mut self, program_id: Pubkey) -> Self {
        self.dex_program_id = program_id;
        self
    }

    /// Sets the validating program id.
    #[must_use]
    pub fn with_credix_program(mut self, program_id: Pubkey) -> Self {
        self.credix_program_id = program_id;
        self
    }

    /// Sets the identity-credential program id.
    #[must_use]
    pub fn with_gateway_program(mut self, program_id: Pubkey) -> Self {
        self.gateway_program_id = program_id;
        self
    }

    /// Sets the global market seed.
    #[must_use]
    pub fn with_global_market_seed(mut self, seed: impl Into<String>) -> Self {
        self.global_market_seed = seed.into();
        self
    }

    /// Sets the LP token mint.
    #[must_use]
    pub fn with_lp_token_mint(mut self, mint: Pubkey) -> Self {
        self.lp_token_mint = mint;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSeedInput` if the seed is empty or longer than a seed
    /// may be, or if the LP mint or permission network is unset.
    pub fn validate(&self) -> Result<(), ProxyError> {
        if self.global_market_seed.is_empty() {
            return Err(ProxyError::InvalidSeedInput(
                "global market seed is empty".to_string(),
            ));
        }
        if self.global_market_seed.len() > crate::pda::MAX_SEED_LEN {
            return Err(ProxyError::InvalidSeedInput(format!(
                "global market seed exceeds {} bytes",
                crate::pda::MAX_SEED_LEN
            )));
        }
        if self.lp_token_mint == Pubkey::default() {
            return Err(ProxyError::InvalidSeedInput(
                "lp token mint not set".to_string(),
            ));
        }
        if self.gatekeeper_network == Pubkey::default() {
            return Err(ProxyError::InvalidSeedInput(
                "gatekeeper network not set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parses a base58 address, reporting failures as `InvalidSeedInput`.
///
/// # Errors
///
/// Returns `InvalidSeedInput` naming `label` if `value` is not a valid address.
pub fn parse_address(label: &str, value: &str) -> Result<Pubkey, ProxyError> {
    Pubkey::from_str(value.trim())
        .map_err(|e| ProxyError::InvalidSeedInput(format!("{label} '{value}': {e}")))
}
