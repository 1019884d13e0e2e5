//! Validating program instruction builders.
//!
//! The validating program dispatches on an 8-byte discriminator,
//! `sha256("global:<instruction>")[..8]`, followed by borsh arguments.

use borsh::BorshSerialize;
use sha2::{Digest, Sha256};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    sysvar,
};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::pda::{derive_associated_token_address, CredixPdas};

use super::system::SYSTEM_PROGRAM_ID;
use super::token::{ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID};

/// Computes the 8-byte discriminator of a validating program instruction.
#[must_use]
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    sighash("global", name)
}

/// Computes the 8-byte discriminator of a validating program account type.
#[must_use]
pub fn account_discriminator(name: &str) -> [u8; 8] {
    sighash("account", name)
}

fn sighash(namespace: &str, name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("{namespace}:{name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

fn encode<T: BorshSerialize>(name: &str, args: &T) -> Result<Vec<u8>, ProxyError> {
    let mut data = instruction_discriminator(name).to_vec();
    args.serialize(&mut data)
        .map_err(|e| ProxyError::Serialization(e.to_string()))?;
    Ok(data)
}

#[derive(Debug, Clone, BorshSerialize)]
struct InitializeMarketArgs {
    signing_authority_bump: u8,
    global_market_state_bump: u8,
    global_market_seed: String,
}

/// Builds the validating program's InitializeMarket instruction.
///
/// Creates the global market state, the LP mint (`config.lp_token_mint`, which
/// must sign) and the pool's base token account.
///
/// # Errors
///
/// Propagates derivation and serialization failures.
pub fn initialize_market(
    config: &ProxyConfig,
    owner: &Pubkey,
    base_mint: &Pubkey,
) -> Result<Instruction, ProxyError> {
    let pdas = CredixPdas::derive(config)?;
    let pool_token_account = derive_associated_token_address(&pdas.signing_authority, base_mint)?;

    let data = encode(
        "initialize_market",
        &InitializeMarketArgs {
            signing_authority_bump: pdas.signing_authority_bump,
            global_market_state_bump: pdas.global_market_state_bump,
            global_market_seed: config.global_market_seed.clone(),
        },
    )?;

    Ok(Instruction {
        program_id: config.credix_program_id,
        accounts: vec![
            AccountMeta::new(*owner, true),
            AccountMeta::new_readonly(config.gatekeeper_network, false),
            AccountMeta::new(pdas.global_market_state, false),
            AccountMeta::new_readonly(pdas.signing_authority, false),
            AccountMeta::new(pool_token_account, false),
            AccountMeta::new(config.lp_token_mint, true),
            AccountMeta::new_readonly(*base_mint, false),
            AccountMeta::new_readonly(ASSOCIATED_TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(sysvar::rent::ID, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
        ],
        data,
    })
}

#[derive(Debug, Clone, BorshSerialize)]
struct CreateCredixPassArgs {
    pass_bump: u8,
    is_underwriter: bool,
    is_borrower: bool,
}

/// Pass roles granted on creation or update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassRoles {
    /// May deposit into the pool.
    pub is_underwriter: bool,
    /// May borrow from the pool.
    pub is_borrower: bool,
}

/// Builds the CreateCredixPass instruction for `participant`.
///
/// # Errors
///
/// Propagates derivation and serialization failures.
pub fn create_credix_pass(
    config: &ProxyConfig,
    owner: &Pubkey,
    participant: &Pubkey,
    roles: PassRoles,
) -> Result<Instruction, ProxyError> {
    let pdas = CredixPdas::derive(config)?;
    let (credix_pass, pass_bump) = pdas.credix_pass(config, participant)?;

    let data = encode(
        "create_credix_pass",
        &CreateCredixPassArgs {
            pass_bump,
            is_underwriter: roles.is_underwriter,
            is_borrower: roles.is_borrower,
        },
    )?;

    Ok(Instruction {
        program_id: config.credix_program_id,
        accounts: vec![
            AccountMeta::new(*owner, true),
            AccountMeta::new_readonly(*participant, false),
            AccountMeta::new(credix_pass, false),
            AccountMeta::new_readonly(pdas.global_market_state, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new_readonly(sysvar::rent::ID, false),
        ],
        data,
    })
}

#[derive(Debug, Clone, BorshSerialize)]
struct UpdateCredixPassArgs {
    is_active: bool,
    is_underwriter: bool,
    is_borrower: bool,
}

/// Builds the UpdateCredixPass instruction for `participant`.
///
/// # Errors
///
/// Propagates derivation and serialization failures.
pub fn update_credix_pass(
    config: &ProxyConfig,
    owner: &Pubkey,
    participant: &Pubkey,
    is_active: bool,
    roles: PassRoles,
) -> Result<Instruction, ProxyError> {
    let pdas = CredixPdas::derive(config)?;
    let (credix_pass, _) = pdas.credix_pass(config, participant)?;

    let data = encode(
        "update_credix_pass",
        &UpdateCredixPassArgs {
            is_active,
            is_underwriter: roles.is_underwriter,
            is_borrower: roles.is_borrower,
        },
    )?;

    Ok(Instruction {
        program_id: config.credix_program_id,
        accounts: vec![
            AccountMeta::new_readonly(*owner, true),
            AccountMeta::new_readonly(*participant, false),
            AccountMeta::new(credix_pass, false),
            AccountMeta::new_readonly(pdas.global_market_state, false),
        ],
        data,
    })
}

#[derive(Debug, Clone, BorshSerialize)]
struct DepositFundsArgs {
    amount: u64,
}

/// Builder for the DepositFunds instruction.
#[derive(Debug, Clone)]
pub struct DepositFundsBuilder {
    config: ProxyConfig,
    investor: Option<Pubkey>,
    base_mint: Option<Pubkey>,
    amount: Option<u64>,
}

impl DepositFundsBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            investor: None,
            base_mint: None,
            amount: None,
        }
    }

    /// Sets the investor.
    #[must_use]
    pub fn investor(mut self, investor: Pubkey) -> Self {
        self.investor = Some(investor);
        self
    }

    /// Sets the pool's base mint.
    #[must_use]
    pub fn base_mint(mut self, base_mint: Pubkey) -> Self {
        self.base_mint = Some(base_mint);
        self
    }

    /// Sets the amount of base tokens to deposit.
    #[must_use]
    pub fn amount(mut self, amount: u64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Builds the instruction.
    ///
    /// # Errors
    ///
    /// Returns an error if any required field is not set or derivation fails.
    pub fn build(self) -> Result<Instruction, ProxyError> {
        let investor = self
            .investor
            .ok_or_else(|| ProxyError::InvalidSeedInput("investor not set".to_string()))?;
        let base_mint = self
            .base_mint
            .ok_or_else(|| ProxyError::InvalidSeedInput("base_mint not set".to_string()))?;
        let amount = self
            .amount
            .ok_or_else(|| ProxyError::Serialization("amount not set".to_string()))?;

        let config = &self.config;
        let pdas = CredixPdas::derive(config)?;
        let (credix_pass, _) = pdas.credix_pass(config, &investor)?;
        let gateway_token = pdas.gateway_token(config, &investor)?;
        let investor_token_account = derive_associated_token_address(&investor, &base_mint)?;
        let pool_token_account =
            derive_associated_token_address(&pdas.signing_authority, &base_mint)?;
        let investor_lp_token_account =
            derive_associated_token_address(&investor, &config.lp_token_mint)?;

        Ok(Instruction {
            program_id: config.credix_program_id,
            accounts: vec![
                AccountMeta::new(investor, true),
                AccountMeta::new_readonly(gateway_token, false),
                AccountMeta::new(pdas.global_market_state, false),
                AccountMeta::new_readonly(pdas.signing_authority, false),
                AccountMeta::new(investor_token_account, false),
                AccountMeta::new(pool_token_account, false),
                AccountMeta::new(config.lp_token_mint, false),
                AccountMeta::new(investor_lp_token_account, false),
                AccountMeta::new_readonly(credix_pass, false),
                AccountMeta::new_readonly(base_mint, false),
                AccountMeta::new_readonly(ASSOCIATED_TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(sysvar::rent::ID, false),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            ],
            data: encode("deposit_funds", &DepositFundsArgs { amount })?,
        })
    }
}
