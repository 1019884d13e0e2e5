//! Instruction augmentation pipeline.
//!
//! A venue instruction travels through a fixed chain of middlewares before it
//! is submitted to the proxy program:
//!
//! 1. [`AuthorityMiddleware`] resolves the deployment and market authorities.
//! 2. [`ReferralMiddleware`] passes the instruction through unchanged.
//! 3. [`PermissionMiddleware`] injects the permission accounts and the
//!    one-byte authority bump prefix.
//! 4. [`LoggerMiddleware`] observes the result.
//!
//! [`MarketProxy`] owns the chain and turns the accumulated context into an
//! [`AugmentedInstruction`] targeting the proxy program.
//!
//! # Example
//!
//! ```rust,ignore
//! use credix_proxy_sdk::middleware::{ActionKind, MarketProxy};
//! use credix_proxy_sdk::ProxyConfig;
//!
//! let proxy = MarketProxy::new(ProxyConfig::new(network, lp_mint))?;
//! let augmented = proxy.augment(ActionKind::NewOrder, &participant, &market, &venue_ix)?;
//! ```

mod authority;
mod logger;
mod permission;
mod referral;

pub use authority::AuthorityMiddleware;
pub use logger::LoggerMiddleware;
pub use permission::{AccountFlags, InjectedSlot, PermissionMiddleware, INJECTED_SLOTS};
pub use referral::ReferralMiddleware;

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::instructions::dex::decode_tag;

/// Number of accounts prepended to every proxied instruction.
pub const INJECTED_ACCOUNT_COUNT: usize = 13;

/// Trading actions the proxy forwards to the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Create the participant's open orders account.
    InitOpenOrders,
    /// Place an order.
    NewOrder,
    /// Cancel an order by order id.
    CancelOrder,
    /// Cancel an order by client id.
    CancelOrderByClientId,
    /// Settle free balances back to the participant.
    SettleFunds,
    /// Close the open orders account.
    CloseOpenOrders,
    /// Prune all orders of an open orders account.
    Prune,
}

impl ActionKind {
    /// Every action, in venue tag order.
    pub const ALL: [Self; 7] = [
        Self::SettleFunds,
        Self::NewOrder,
        Self::CancelOrder,
        Self::CancelOrderByClientId,
        Self::CloseOpenOrders,
        Self::InitOpenOrders,
        Self::Prune,
    ];

    /// Venue instruction tag for this action.
    #[must_use]
    pub const fn dex_tag(self) -> u32 {
        match self {
            Self::SettleFunds => 5,
            Self::NewOrder => 10,
            Self::CancelOrder => 11,
            Self::CancelOrderByClientId => 12,
            Self::CloseOpenOrders => 14,
            Self::InitOpenOrders => 15,
            Self::Prune => 16,
        }
    }

    /// Maps a venue instruction tag to an action.
    #[must_use]
    pub fn from_dex_tag(tag: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.dex_tag() == tag)
    }

    /// Classifies a venue instruction by its tag.
    #[must_use]
    pub fn from_instruction(instruction: &Instruction) -> Option<Self> {
        decode_tag(&instruction.data).and_then(Self::from_dex_tag)
    }

    /// Returns true if the validating program freezes and thaws the
    /// participant's LP tokens around the venue call.
    #[must_use]
    pub const fn freezes_lp_tokens(self) -> bool {
        !matches!(self, Self::Prune)
    }

    /// Stable name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InitOpenOrders => "init_open_orders",
            Self::NewOrder => "new_order",
            Self::CancelOrder => "cancel_order",
            Self::CancelOrderByClientId => "cancel_order_by_client_id",
            Self::SettleFunds => "settle_funds",
            Self::CloseOpenOrders => "close_open_orders",
            Self::Prune => "prune",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorities resolved for one augmentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAuthorities {
    /// Global market state.
    pub global_market_state: Pubkey,
    /// Signing authority of the validating program.
    pub signing_authority: Pubkey,
    /// Proxy permission authority.
    pub permission_authority: Pubkey,
    /// Bump of the permission authority; the data prefix.
    pub permission_authority_bump: u8,
    /// Venue market authority held by the proxy.
    pub market_authority: Pubkey,
    /// Participant's proxy-owned open orders account.
    pub open_orders: Pubkey,
}

/// State threaded through the middleware chain.
#[derive(Debug, Clone)]
pub struct AugmentContext<'a> {
    /// Action being proxied.
    pub action: ActionKind,
    /// Acting participant.
    pub participant: Pubkey,
    /// Venue market.
    pub market: Pubkey,
    /// Caller-supplied venue instruction. Never mutated.
    pub instruction: &'a Instruction,
    /// Accounts to prepend, in order.
    pub injected: Vec<AccountMeta>,
    /// Bytes to prepend to the instruction data.
    pub prefix: Vec<u8>,
    /// Filled by [`AuthorityMiddleware`].
    pub authorities: Option<ResolvedAuthorities>,
}

impl<'a> AugmentContext<'a> {
    /// Creates an empty context for `instruction`.
    #[must_use]
    pub fn new(
        action: ActionKind,
        participant: Pubkey,
        market: Pubkey,
        instruction: &'a Instruction,
    ) -> Self {
        Self {
            action,
            participant,
            market,
            instruction,
            injected: Vec::with_capacity(INJECTED_ACCOUNT_COUNT),
            prefix: Vec::with_capacity(1),
            authorities: None,
        }
    }
}

/// One stage of the augmentation pipeline.
pub trait Middleware: Send + Sync {
    /// Middleware name, for logs.
    fn name(&self) -> &'static str;

    /// Processes the context in place.
    ///
    /// # Errors
    ///
    /// Returns an error if an address cannot be derived; the pipeline stops
    /// at the first failure.
    fn process(&self, ctx: &mut AugmentContext<'_>) -> Result<(), ProxyError>;
}

/// Ordered middleware chain.
pub struct MiddlewareManager {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl MiddlewareManager {
    /// Builds the canonical chain: authority, referral, permission, logger.
    #[must_use]
    pub fn standard(config: &ProxyConfig) -> Self {
        Self {
            middlewares: vec![
                Box::new(AuthorityMiddleware::new(config.clone())),
                Box::new(ReferralMiddleware),
                Box::new(PermissionMiddleware::new(config.clone())),
                Box::new(LoggerMiddleware),
            ],
        }
    }

    /// Names of the middlewares in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    /// Runs every middleware in order.
    ///
    /// # Errors
    ///
    /// Returns the first middleware error.
    pub fn apply(&self, ctx: &mut AugmentContext<'_>) -> Result<(), ProxyError> {
        for middleware in &self.middlewares {
            middleware.process(ctx)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for MiddlewareManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareManager")
            .field("middlewares", &self.names())
            .finish()
    }
}

/// Result of augmenting a venue instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentedInstruction {
    /// Action that was proxied.
    pub action: ActionKind,
    /// Instruction targeting the proxy program.
    pub instruction: Instruction,
    /// Authorities resolved during augmentation.
    pub authorities: ResolvedAuthorities,
}

impl AugmentedInstruction {
    /// Number of accounts prepended to the venue accounts.
    #[must_use]
    pub fn injected_count(&self) -> usize {
        INJECTED_ACCOUNT_COUNT
    }

    /// The caller's venue accounts, as forwarded.
    #[must_use]
    pub fn forwarded_accounts(&self) -> &[AccountMeta] {
        self.instruction
            .accounts
            .get(INJECTED_ACCOUNT_COUNT..)
            .unwrap_or_default()
    }
}

/// Client-side proxy for a permissioned market.
#[derive(Debug)]
pub struct MarketProxy {
    config: ProxyConfig,
    pipeline: MiddlewareManager,
}

impl MarketProxy {
    /// Creates a proxy with the canonical middleware chain.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSeedInput` if the configuration is invalid.
    pub fn new(config: ProxyConfig) -> Result<Self, ProxyError> {
        config.validate()?;
        let pipeline = MiddlewareManager::standard(&config);
        Ok(Self { config, pipeline })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Returns the middleware chain.
    #[must_use]
    pub fn pipeline(&self) -> &MiddlewareManager {
        &self.pipeline
    }

    /// Rewrites a venue instruction into a proxy instruction.
    ///
    /// The result carries the 13 permission accounts followed by the caller's
    /// accounts with their order and flags untouched, and the permission
    /// authority bump followed by the caller's data.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSeedInput` if the instruction does not target the
    /// configured venue, its tag is not `action`'s, or the participant is
    /// unset. Propagates derivation failures. Nothing is returned on partial
    /// failure.
    pub fn augment(
        &self,
        action: ActionKind,
        participant: &Pubkey,
        market: &Pubkey,
        instruction: &Instruction,
    ) -> Result<AugmentedInstruction, ProxyError> {
        if instruction.program_id != self.config.dex_program_id {
            return Err(ProxyError::InvalidSeedInput(format!(
                "instruction targets {}, expected venue {}",
                instruction.program_id, self.config.dex_program_id
            )));
        }
        match ActionKind::from_instruction(instruction) {
            Some(tagged) if tagged == action => {}
            Some(tagged) => {
                return Err(ProxyError::InvalidSeedInput(format!(
                    "{action} requested for a {tagged} instruction"
                )));
            }
            None => {
                return Err(ProxyError::InvalidSeedInput(format!(
                    "{action} requested for an instruction without a proxied venue tag"
                )));
            }
        }
        if *participant == Pubkey::default() {
            return Err(ProxyError::InvalidSeedInput(
                "participant not set".to_string(),
            ));
        }
        if *market == Pubkey::default() {
            return Err(ProxyError::InvalidSeedInput("market not set".to_string()));
        }

        let mut ctx = AugmentContext::new(action, *participant, *market, instruction);
        self.pipeline.apply(&mut ctx)?;

        let authorities = ctx.authorities.ok_or_else(|| {
            ProxyError::InvalidSeedInput("authorities were not resolved".to_string())
        })?;

        let mut accounts = ctx.injected;
        accounts.extend(instruction.accounts.iter().cloned());

        let mut data = ctx.prefix;
        data.extend_from_slice(&instruction.data);

        Ok(AugmentedInstruction {
            action,
            instruction: Instruction {
                program_id: self.config.proxy_program_id,
                accounts,
                data,
            },
            authorities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::dex::DexTag;
    use crate::pda::{derive_credix_pass, derive_permission_authority, CredixPdas};

    fn test_config() -> ProxyConfig {
        ProxyConfig::new(Pubkey::new_unique(), Pubkey::new_unique())
    }

    fn venue_instruction(config: &ProxyConfig, action: ActionKind, accounts: usize) -> Instruction {
        let mut data = vec![0u8];
        data.extend_from_slice(&action.dex_tag().to_le_bytes());
        data.extend_from_slice(&[7, 7, 7]);
        Instruction {
            program_id: config.dex_program_id,
            accounts: (0..accounts)
                .map(|i| {
                    if i % 2 == 0 {
                        AccountMeta::new(Pubkey::new_unique(), i == 0)
                    } else {
                        AccountMeta::new_readonly(Pubkey::new_unique(), false)
                    }
                })
                .collect(),
            data,
        }
    }

    #[test]
    fn test_pipeline_order() {
        let proxy = MarketProxy::new(test_config()).expect("proxy");
        assert_eq!(
            proxy.pipeline().names(),
            vec!["authority", "referral", "permission", "logger"]
        );
    }

    #[test]
    fn test_augment_preserves_tail_for_every_action() {
        let config = test_config();
        let proxy = MarketProxy::new(config.clone()).expect("proxy");
        let participant = Pubkey::new_unique();
        let market = Pubkey::new_unique();
        let (_, bump) = derive_permission_authority(&config.proxy_program_id).expect("authority");

        for action in ActionKind::ALL {
            for n in [0, 1, 5, 12] {
                let ix = venue_instruction(&config, action, n);
                let augmented = proxy
                    .augment(action, &participant, &market, &ix)
                    .expect("augment");

                assert_eq!(augmented.instruction.program_id, config.proxy_program_id);
                assert_eq!(augmented.instruction.accounts.len(), INJECTED_ACCOUNT_COUNT + n);
                assert_eq!(augmented.forwarded_accounts(), ix.accounts.as_slice());
                assert_eq!(augmented.instruction.data[0], bump);
                assert_eq!(&augmented.instruction.data[1..], ix.data.as_slice());
            }
        }
    }

    #[test]
    fn test_injected_order() {
        let config = test_config();
        let proxy = MarketProxy::new(config.clone()).expect("proxy");
        let participant = Pubkey::new_unique();
        let market = Pubkey::new_unique();
        let ix = venue_instruction(&config, ActionKind::NewOrder, 3);

        let augmented = proxy
            .augment(ActionKind::NewOrder, &participant, &market, &ix)
            .expect("augment");
        let pdas = CredixPdas::derive(&config).expect("pdas");
        let (pass, _) = derive_credix_pass(
            &config.credix_program_id,
            &pdas.global_market_state,
            &participant,
        )
        .expect("pass");
        let keys: Vec<Pubkey> = augmented.instruction.accounts[..INJECTED_ACCOUNT_COUNT]
            .iter()
            .map(|meta| meta.pubkey)
            .collect();

        assert_eq!(keys[0], participant);
        assert_eq!(keys[2], pdas.permission_authority);
        assert_eq!(keys[3], pdas.signing_authority);
        assert_eq!(keys[4], config.lp_token_mint);
        assert_eq!(keys[5], pdas.global_market_state);
        assert_eq!(keys[6], pass);
        assert_eq!(keys[8], config.credix_program_id);
        assert_eq!(augmented.authorities.global_market_state, pdas.global_market_state);
    }

    #[test]
    fn test_augment_is_deterministic() {
        let config = test_config();
        let proxy = MarketProxy::new(config.clone()).expect("proxy");
        let participant = Pubkey::new_unique();
        let market = Pubkey::new_unique();
        let ix = venue_instruction(&config, ActionKind::SettleFunds, 4);

        let first = proxy
            .augment(ActionKind::SettleFunds, &participant, &market, &ix)
            .expect("augment");
        let second = proxy
            .augment(ActionKind::SettleFunds, &participant, &market, &ix)
            .expect("augment");
        assert_eq!(first, second);
    }

    #[test]
    fn test_augment_rejects_wrong_program() {
        let config = test_config();
        let proxy = MarketProxy::new(config.clone()).expect("proxy");
        let mut ix = venue_instruction(&config, ActionKind::NewOrder, 2);
        ix.program_id = Pubkey::new_unique();

        let result = proxy.augment(
            ActionKind::NewOrder,
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &ix,
        );
        assert!(matches!(result, Err(ProxyError::InvalidSeedInput(_))));
    }

    #[test]
    fn test_augment_rejects_mismatched_action() {
        let config = test_config();
        let proxy = MarketProxy::new(config.clone()).expect("proxy");
        let ix = venue_instruction(&config, ActionKind::NewOrder, 2);

        let result = proxy.augment(
            ActionKind::Prune,
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &ix,
        );
        match result {
            Err(ProxyError::InvalidSeedInput(msg)) => {
                assert_eq!(msg, "prune requested for a new_order instruction");
            }
            other => panic!("expected InvalidSeedInput, got {other:?}"),
        }
    }

    #[test]
    fn test_augment_rejects_untagged_instruction() {
        let config = test_config();
        let proxy = MarketProxy::new(config.clone()).expect("proxy");
        let participant = Pubkey::new_unique();
        let market = Pubkey::new_unique();

        let mut empty = venue_instruction(&config, ActionKind::NewOrder, 2);
        empty.data.clear();
        let mut unproxied = venue_instruction(&config, ActionKind::NewOrder, 2);
        let crank_tag = DexTag::ConsumeEventsPermissioned as u32;
        unproxied.data[1..5].copy_from_slice(&crank_tag.to_le_bytes());

        for ix in [empty, unproxied] {
            let result = proxy.augment(ActionKind::NewOrder, &participant, &market, &ix);
            assert!(matches!(result, Err(ProxyError::InvalidSeedInput(_))));
        }
    }

    #[test]
    fn test_augment_rejects_default_participant() {
        let config = test_config();
        let proxy = MarketProxy::new(config.clone()).expect("proxy");
        let ix = venue_instruction(&config, ActionKind::NewOrder, 2);

        let result = proxy.augment(
            ActionKind::NewOrder,
            &Pubkey::default(),
            &Pubkey::new_unique(),
            &ix,
        );
        assert!(matches!(result, Err(ProxyError::InvalidSeedInput(_))));
        assert!(result.err().is_some_and(|e| e.is_local()));
    }

    #[test]
    fn test_proxy_rejects_missing_lp_mint() {
        let config = test_config().with_lp_token_mint(Pubkey::default());
        assert!(matches!(
            MarketProxy::new(config),
            Err(ProxyError::InvalidSeedInput(_))
        ));
    }

    #[test]
    fn test_action_tags() {
        for action in ActionKind::ALL {
            assert_eq!(ActionKind::from_dex_tag(action.dex_tag()), Some(action));
        }
        assert_eq!(ActionKind::from_dex_tag(0), None);

        let config = test_config();
        let ix = venue_instruction(&config, ActionKind::CancelOrderByClientId, 1);
        assert_eq!(
            ActionKind::from_instruction(&ix),
            Some(ActionKind::CancelOrderByClientId)
        );
        assert_eq!(ActionKind::Prune.to_string(), "prune");
    }
}
