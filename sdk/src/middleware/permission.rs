//! Permission account injection.
//!
//! Every proxied action carries the same 13 accounts in the same order. Only
//! the signer and writable flags differ by action, and those come from
//! [`ActionKind::account_flags`], a fixed lookup.

use solana_sdk::{instruction::AccountMeta, pubkey::Pubkey, sysvar};

use super::{ActionKind, AugmentContext, Middleware};
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::instructions::{ASSOCIATED_TOKEN_PROGRAM_ID, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID};
use crate::pda::{derive_associated_token_address, derive_credix_pass, derive_gateway_token};

/// Positions of the injected accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InjectedSlot {
    /// Acting participant.
    Participant,
    /// Participant's LP token account.
    ParticipantLpTokenAccount,
    /// Proxy permission authority.
    PermissionAuthority,
    /// Validating program signing authority.
    SigningAuthority,
    /// LP token mint.
    LpMint,
    /// Global market state.
    GlobalMarketState,
    /// Participant's pass.
    CredixPass,
    /// Token program.
    TokenProgram,
    /// Validating program.
    CredixProgram,
    /// Associated token program.
    AssociatedTokenProgram,
    /// System program.
    SystemProgram,
    /// Rent sysvar.
    Rent,
    /// Participant's identity credential.
    GatewayToken,
}

/// Injected accounts in wire order.
pub const INJECTED_SLOTS: [InjectedSlot; 13] = [
    InjectedSlot::Participant,
    InjectedSlot::ParticipantLpTokenAccount,
    InjectedSlot::PermissionAuthority,
    InjectedSlot::SigningAuthority,
    InjectedSlot::LpMint,
    InjectedSlot::GlobalMarketState,
    InjectedSlot::CredixPass,
    InjectedSlot::TokenProgram,
    InjectedSlot::CredixProgram,
    InjectedSlot::AssociatedTokenProgram,
    InjectedSlot::SystemProgram,
    InjectedSlot::Rent,
    InjectedSlot::GatewayToken,
];

/// Signer and writable flags of one injected account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountFlags {
    /// Account must sign.
    pub is_signer: bool,
    /// Account is written.
    pub is_writable: bool,
}

impl AccountFlags {
    const SIGNER: Self = Self { is_signer: true, is_writable: false };
    const WRITABLE: Self = Self { is_signer: false, is_writable: true };
    const READONLY: Self = Self { is_signer: false, is_writable: false };

    fn meta(self, pubkey: Pubkey) -> AccountMeta {
        if self.is_writable {
            AccountMeta::new(pubkey, self.is_signer)
        } else {
            AccountMeta::new_readonly(pubkey, self.is_signer)
        }
    }
}

impl ActionKind {
    /// Flags of `slot` for this action.
    ///
    /// Derived authorities are never signers here; the proxy signs for them
    /// on-chain.
    #[must_use]
    pub const fn account_flags(self, slot: InjectedSlot) -> AccountFlags {
        match slot {
            InjectedSlot::Participant => AccountFlags::SIGNER,
            InjectedSlot::ParticipantLpTokenAccount
            | InjectedSlot::LpMint
            | InjectedSlot::CredixPass => {
                if self.freezes_lp_tokens() {
                    AccountFlags::WRITABLE
                } else {
                    AccountFlags::READONLY
                }
            }
            _ => AccountFlags::READONLY,
        }
    }
}

/// Injects the permission accounts and the authority bump prefix.
#[derive(Debug, Clone)]
pub struct PermissionMiddleware {
    config: ProxyConfig,
}

impl PermissionMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub fn new(config: ProxyConfig) -> Self {
        Self { config }
    }
}

impl Middleware for PermissionMiddleware {
    fn name(&self) -> &'static str {
        "permission"
    }

    fn process(&self, ctx: &mut AugmentContext<'_>) -> Result<(), ProxyError> {
        if self.config.lp_token_mint == Pubkey::default() {
            return Err(ProxyError::InvalidSeedInput(
                "lp token mint not set".to_string(),
            ));
        }
        let authorities = ctx.authorities.as_ref().ok_or_else(|| {
            ProxyError::InvalidSeedInput("authorities must be resolved first".to_string())
        })?;

        let lp_token_account =
            derive_associated_token_address(&ctx.participant, &self.config.lp_token_mint)?;
        let (credix_pass, _) = derive_credix_pass(
            &self.config.credix_program_id,
            &authorities.global_market_state,
            &ctx.participant,
        )?;
        let (gateway_token, _) = derive_gateway_token(
            &self.config.gateway_program_id,
            &ctx.participant,
            &self.config.gatekeeper_network,
        )?;

        let injected: Vec<AccountMeta> = INJECTED_SLOTS
            .iter()
            .map(|slot| {
                let pubkey = match slot {
                    InjectedSlot::Participant => ctx.participant,
                    InjectedSlot::ParticipantLpTokenAccount => lp_token_account,
                    InjectedSlot::PermissionAuthority => authorities.permission_authority,
                    InjectedSlot::SigningAuthority => authorities.signing_authority,
                    InjectedSlot::LpMint => self.config.lp_token_mint,
                    InjectedSlot::GlobalMarketState => authorities.global_market_state,
                    InjectedSlot::CredixPass => credix_pass,
                    InjectedSlot::TokenProgram => TOKEN_PROGRAM_ID,
                    InjectedSlot::CredixProgram => self.config.credix_program_id,
                    InjectedSlot::AssociatedTokenProgram => ASSOCIATED_TOKEN_PROGRAM_ID,
                    InjectedSlot::SystemProgram => SYSTEM_PROGRAM_ID,
                    InjectedSlot::Rent => sysvar::rent::ID,
                    InjectedSlot::GatewayToken => gateway_token,
                };
                ctx.action.account_flags(*slot).meta(pubkey)
            })
            .collect();

        let bump = authorities.permission_authority_bump;
        ctx.injected = injected;
        ctx.prefix = vec![bump];
        Ok(())
    }
}
