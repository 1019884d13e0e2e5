//! Market bootstrap planning.
//!
//! Listing a permissioned market takes three transactions that must land in
//! order:
//!
//! 1. [`BootstrapStep::VaultCreation`] allocates and initializes the base and
//!    quote vaults, owned by the venue's vault owner.
//! 2. [`BootstrapStep::BookCreation`] allocates the market, the request and
//!    event queues and both order trees, owned by the venue.
//! 3. [`BootstrapStep::MarketInit`] initializes the market with the proxy's
//!    market authority and a fresh prune/crank authority pair.
//!
//! [`MarketBootstrapper`] builds each stage and refuses to hand out a stage
//! before its predecessor has been marked complete. Submission is left to the
//! caller.

use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::instructions::dex::DEFAULT_QUOTE_DUST_THRESHOLD;
use crate::instructions::{
    create_account, initialize_account, InitializeMarketBuilder, InitializeMarketParams,
    TOKEN_PROGRAM_ID,
};
use crate::pda::{derive_market_authority, derive_vault_owner};
use crate::state::{self, MarketStateView};

/// Token account span.
pub const TOKEN_ACCOUNT_SPAN: u64 = state::TOKEN_ACCOUNT_SPAN as u64;

/// Market state span (v3 layout).
pub const MARKET_STATE_SPAN: u64 = state::MARKET_STATE_SPAN as u64;

/// Request queue span: header plus capacity.
pub const REQUEST_QUEUE_SPAN: u64 = 5120 + 12;

/// Event queue span: header plus capacity.
pub const EVENT_QUEUE_SPAN: u64 = 262_144 + 12;

/// Bid or ask tree span: header plus capacity.
pub const ORDER_BOOK_SPAN: u64 = 65_536 + 12;

/// Steps of a market bootstrap, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BootstrapStep {
    /// Base and quote vault creation.
    VaultCreation,
    /// Market, queue and tree creation.
    BookCreation,
    /// Venue market initialization.
    MarketInit,
}

impl BootstrapStep {
    /// Every step, in order.
    pub const ALL: [Self; 3] = [Self::VaultCreation, Self::BookCreation, Self::MarketInit];

    /// Step following this one.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::VaultCreation => Some(Self::BookCreation),
            Self::BookCreation => Some(Self::MarketInit),
            Self::MarketInit => None,
        }
    }

    /// Stable name used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VaultCreation => "vault_creation",
            Self::BookCreation => "book_creation",
            Self::MarketInit => "market_init",
        }
    }
}

impl std::fmt::Display for BootstrapStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rent-exempt balances for every span a bootstrap allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RentSchedule {
    /// Lamports for a token account.
    pub token_account: u64,
    /// Lamports for the market state.
    pub market_state: u64,
    /// Lamports for the request queue.
    pub request_queue: u64,
    /// Lamports for the event queue.
    pub event_queue: u64,
    /// Lamports for one order tree.
    pub order_book: u64,
}

impl RentSchedule {
    /// Builds a schedule by asking `rent` for each span.
    pub fn from_fn(mut rent: impl FnMut(u64) -> u64) -> Self {
        Self {
            token_account: rent(TOKEN_ACCOUNT_SPAN),
            market_state: rent(MARKET_STATE_SPAN),
            request_queue: rent(REQUEST_QUEUE_SPAN),
            event_queue: rent(EVENT_QUEUE_SPAN),
            order_book: rent(ORDER_BOOK_SPAN),
        }
    }

    /// Total lamports a bootstrap funds.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.token_account
            .saturating_mul(2)
            .saturating_add(self.market_state)
            .saturating_add(self.request_queue)
            .saturating_add(self.event_queue)
            .saturating_add(self.order_book.saturating_mul(2))
    }
}

/// Listing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketListing {
    /// Base mint.
    pub base_mint: Pubkey,
    /// Quote mint.
    pub quote_mint: Pubkey,
    /// Base lot size.
    pub base_lot_size: u64,
    /// Quote lot size.
    pub quote_lot_size: u64,
    /// Fee rate in basis points.
    pub fee_rate_bps: u16,
    /// Quote dust threshold.
    pub quote_dust_threshold: u64,
}

impl MarketListing {
    /// Creates a listing with the given mints and lot sizes, no fee and the
    /// default dust threshold.
    #[must_use]
    pub fn new(
        base_mint: Pubkey,
        quote_mint: Pubkey,
        base_lot_size: u64,
        quote_lot_size: u64,
    ) -> Self {
        Self {
            base_mint,
            quote_mint,
            base_lot_size,
            quote_lot_size,
            fee_rate_bps: 0,
            quote_dust_threshold: DEFAULT_QUOTE_DUST_THRESHOLD,
        }
    }

    /// Sets the fee rate.
    #[must_use]
    pub fn with_fee_rate_bps(mut self, fee_rate_bps: u16) -> Self {
        self.fee_rate_bps = fee_rate_bps;
        self
    }

    /// Sets the quote dust threshold.
    #[must_use]
    pub fn with_quote_dust_threshold(mut self, threshold: u64) -> Self {
        self.quote_dust_threshold = threshold;
        self
    }

    fn validate(&self) -> Result<(), ProxyError> {
        if self.base_mint == Pubkey::default() || self.quote_mint == Pubkey::default() {
            return Err(ProxyError::InvalidSeedInput(
                "listing mints must be set".to_string(),
            ));
        }
        if self.base_mint == self.quote_mint {
            return Err(ProxyError::InvalidSeedInput(
                "base and quote mints must differ".to_string(),
            ));
        }
        if self.base_lot_size == 0 || self.quote_lot_size == 0 {
            return Err(ProxyError::InvalidSeedInput(
                "lot sizes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Run-scoped keypairs of a bootstrap. Generated fresh for every run.
#[derive(Debug)]
pub struct MarketKeys {
    /// Market account.
    pub market: Keypair,
    /// Request queue.
    pub request_queue: Keypair,
    /// Event queue.
    pub event_queue: Keypair,
    /// Bid tree.
    pub bids: Keypair,
    /// Ask tree.
    pub asks: Keypair,
    /// Base vault.
    pub base_vault: Keypair,
    /// Quote vault.
    pub quote_vault: Keypair,
    /// Prune authority.
    pub prune_authority: Keypair,
    /// Crank authority.
    pub crank_authority: Keypair,
}

impl MarketKeys {
    /// Generates a fresh set of keypairs.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            market: Keypair::new(),
            request_queue: Keypair::new(),
            event_queue: Keypair::new(),
            bids: Keypair::new(),
            asks: Keypair::new(),
            base_vault: Keypair::new(),
            quote_vault: Keypair::new(),
            prune_authority: Keypair::new(),
            crank_authority: Keypair::new(),
        }
    }
}

/// Instructions and signers of one bootstrap transaction.
#[derive(Debug)]
pub struct BootstrapStage<'a> {
    /// Step this stage performs.
    pub step: BootstrapStep,
    /// Instructions, in order.
    pub instructions: Vec<Instruction>,
    /// Signers besides the fee payer.
    pub signers: Vec<&'a Keypair>,
}

/// A listed market.
#[derive(Debug)]
pub struct ListedMarket {
    /// Market account.
    pub market: Pubkey,
    /// Owner of both vaults.
    pub vault_owner: Pubkey,
    /// Nonce of the vault owner derivation.
    pub vault_signer_nonce: u64,
    /// Proxy market authority recorded in the market.
    pub market_authority: Pubkey,
    /// Request queue.
    pub request_queue: Pubkey,
    /// Event queue.
    pub event_queue: Pubkey,
    /// Bid tree.
    pub bids: Pubkey,
    /// Ask tree.
    pub asks: Pubkey,
    /// Base vault.
    pub base_vault: Pubkey,
    /// Quote vault.
    pub quote_vault: Pubkey,
    /// Base mint.
    pub base_mint: Pubkey,
    /// Quote mint.
    pub quote_mint: Pubkey,
    /// Prune authority.
    pub prune_authority: Keypair,
    /// Crank authority.
    pub crank_authority: Keypair,
}

/// Plans and sequences the bootstrap of one market.
#[derive(Debug)]
pub struct MarketBootstrapper {
    config: ProxyConfig,
    payer: Pubkey,
    listing: MarketListing,
    rent: RentSchedule,
    keys: MarketKeys,
    vault_owner: Pubkey,
    vault_signer_nonce: u64,
    market_authority: Pubkey,
    completed: Option<BootstrapStep>,
}

impl MarketBootstrapper {
    /// Creates a bootstrapper with freshly generated account keys.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSeedInput` for an invalid listing and propagates
    /// derivation failures.
    pub fn new(
        config: ProxyConfig,
        payer: Pubkey,
        listing: MarketListing,
        rent: RentSchedule,
    ) -> Result<Self, ProxyError> {
        Self::with_keys(config, payer, listing, rent, MarketKeys::generate())
    }

    /// Creates a bootstrapper with caller-supplied account keys.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSeedInput` for an invalid listing and propagates
    /// derivation failures.
    pub fn with_keys(
        config: ProxyConfig,
        payer: Pubkey,
        listing: MarketListing,
        rent: RentSchedule,
        keys: MarketKeys,
    ) -> Result<Self, ProxyError> {
        listing.validate()?;
        if payer == Pubkey::default() {
            return Err(ProxyError::InvalidSeedInput("payer not set".to_string()));
        }

        let market = keys.market.pubkey();
        let (vault_owner, vault_signer_nonce) =
            derive_vault_owner(&market, &config.dex_program_id)?;
        let (market_authority, _) =
            derive_market_authority(&config.proxy_program_id, &config.dex_program_id, &market)?;

        Ok(Self {
            config,
            payer,
            listing,
            rent,
            keys,
            vault_owner,
            vault_signer_nonce,
            market_authority,
            completed: None,
        })
    }

    /// Market address.
    #[must_use]
    pub fn market(&self) -> Pubkey {
        self.keys.market.pubkey()
    }

    /// Vault owner and its nonce.
    #[must_use]
    pub fn vault_owner(&self) -> (Pubkey, u64) {
        (self.vault_owner, self.vault_signer_nonce)
    }

    /// Proxy market authority.
    #[must_use]
    pub fn market_authority(&self) -> Pubkey {
        self.market_authority
    }

    /// Listing parameters.
    #[must_use]
    pub fn listing(&self) -> &MarketListing {
        &self.listing
    }

    /// Step that must run next, or `None` once the market is initialized.
    #[must_use]
    pub fn next_step(&self) -> Option<BootstrapStep> {
        match self.completed {
            None => Some(BootstrapStep::VaultCreation),
            Some(step) => step.next(),
        }
    }

    /// Returns true once every step is complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed == Some(BootstrapStep::MarketInit)
    }

    fn ensure_next(&self, attempted: BootstrapStep) -> Result<(), ProxyError> {
        match self.next_step() {
            Some(expected) if expected == attempted => Ok(()),
            Some(expected) => Err(ProxyError::BootstrapOrder {
                expected: expected.to_string(),
                attempted: attempted.to_string(),
            }),
            None => Err(ProxyError::BootstrapOrder {
                expected: "none".to_string(),
                attempted: attempted.to_string(),
            }),
        }
    }

    /// Builds the stage for `step`.
    ///
    /// # Errors
    ///
    /// Returns `BootstrapOrder` if `step` is not the next step, and
    /// propagates instruction encoding failures.
    pub fn stage(&self, step: BootstrapStep) -> Result<BootstrapStage<'_>, ProxyError> {
        self.ensure_next(step)?;
        match step {
            BootstrapStep::VaultCreation => Ok(self.vault_creation()),
            BootstrapStep::BookCreation => Ok(self.book_creation()),
            BootstrapStep::MarketInit => self.market_init(),
        }
    }

    /// Records that `step` has been confirmed.
    ///
    /// # Errors
    ///
    /// Returns `BootstrapOrder` if `step` is not the next step.
    pub fn complete(&mut self, step: BootstrapStep) -> Result<(), ProxyError> {
        self.ensure_next(step)?;
        self.completed = Some(step);
        Ok(())
    }

    fn vault_creation(&self) -> BootstrapStage<'_> {
        let base_vault = self.keys.base_vault.pubkey();
        let quote_vault = self.keys.quote_vault.pubkey();

        let instructions = vec![
            create_account(
                &self.payer,
                &base_vault,
                self.rent.token_account,
                TOKEN_ACCOUNT_SPAN,
                &TOKEN_PROGRAM_ID,
            ),
            create_account(
                &self.payer,
                &quote_vault,
                self.rent.token_account,
                TOKEN_ACCOUNT_SPAN,
                &TOKEN_PROGRAM_ID,
            ),
            initialize_account(&base_vault, &self.listing.base_mint, &self.vault_owner),
            initialize_account(&quote_vault, &self.listing.quote_mint, &self.vault_owner),
        ];

        BootstrapStage {
            step: BootstrapStep::VaultCreation,
            instructions,
            signers: vec![&self.keys.base_vault, &self.keys.quote_vault],
        }
    }

    fn book_creation(&self) -> BootstrapStage<'_> {
        let dex = &self.config.dex_program_id;
        let accounts = [
            (&self.keys.market, self.rent.market_state, MARKET_STATE_SPAN),
            (&self.keys.request_queue, self.rent.request_queue, REQUEST_QUEUE_SPAN),
            (&self.keys.event_queue, self.rent.event_queue, EVENT_QUEUE_SPAN),
            (&self.keys.bids, self.rent.order_book, ORDER_BOOK_SPAN),
            (&self.keys.asks, self.rent.order_book, ORDER_BOOK_SPAN),
        ];

        let instructions = accounts
            .iter()
            .map(|(keypair, lamports, span)| {
                create_account(&self.payer, &keypair.pubkey(), *lamports, *span, dex)
            })
            .collect();

        BootstrapStage {
            step: BootstrapStep::BookCreation,
            instructions,
            signers: accounts.iter().map(|(keypair, _, _)| *keypair).collect(),
        }
    }

    fn market_init(&self) -> Result<BootstrapStage<'_>, ProxyError> {
        let ix = InitializeMarketBuilder::new(self.config.dex_program_id)
            .market(self.keys.market.pubkey())
            .request_queue(self.keys.request_queue.pubkey())
            .event_queue(self.keys.event_queue.pubkey())
            .book(self.keys.bids.pubkey(), self.keys.asks.pubkey())
            .vaults(self.keys.base_vault.pubkey(), self.keys.quote_vault.pubkey())
            .mints(self.listing.base_mint, self.listing.quote_mint)
            .authority(self.market_authority)
            .prune_and_crank(
                self.keys.prune_authority.pubkey(),
                self.keys.crank_authority.pubkey(),
            )
            .params(InitializeMarketParams {
                base_lot_size: self.listing.base_lot_size,
                quote_lot_size: self.listing.quote_lot_size,
                fee_rate_bps: self.listing.fee_rate_bps,
                vault_signer_nonce: self.vault_signer_nonce,
                quote_dust_threshold: self.listing.quote_dust_threshold,
            })
            .build()?;

        Ok(BootstrapStage {
            step: BootstrapStep::MarketInit,
            instructions: vec![ix],
            signers: Vec::new(),
        })
    }

    /// Checks that an initialized market records the accounts this run
    /// created.
    ///
    /// # Errors
    ///
    /// Returns `MarketStateMismatch` naming the first differing field.
    pub fn verify(&self, state: &MarketStateView) -> Result<(), ProxyError> {
        let expected = [
            ("own_address", state.own_address, self.keys.market.pubkey()),
            ("base_mint", state.base_mint, self.listing.base_mint),
            ("quote_mint", state.quote_mint, self.listing.quote_mint),
            ("base_vault", state.base_vault, self.keys.base_vault.pubkey()),
            ("quote_vault", state.quote_vault, self.keys.quote_vault.pubkey()),
            ("request_queue", state.request_queue, self.keys.request_queue.pubkey()),
            ("event_queue", state.event_queue, self.keys.event_queue.pubkey()),
            ("bids", state.bids, self.keys.bids.pubkey()),
            ("asks", state.asks, self.keys.asks.pubkey()),
            ("authority", state.authority, self.market_authority),
            ("prune_authority", state.prune_authority, self.keys.prune_authority.pubkey()),
            (
                "consume_events_authority",
                state.consume_events_authority,
                self.keys.crank_authority.pubkey(),
            ),
        ];

        if let Some((field, actual, wanted)) = expected.iter().find(|(_, a, w)| a != w) {
            return Err(ProxyError::MarketStateMismatch(format!(
                "{field} is {actual}, expected {wanted}"
            )));
        }
        if state.vault_signer_nonce != self.vault_signer_nonce {
            return Err(ProxyError::MarketStateMismatch(format!(
                "vault_signer_nonce is {}, expected {}",
                state.vault_signer_nonce, self.vault_signer_nonce
            )));
        }
        Ok(())
    }

    /// Consumes a completed bootstrapper into the listed market.
    ///
    /// # Errors
    ///
    /// Returns `BootstrapOrder` if a step is still pending.
    pub fn finish(self) -> Result<ListedMarket, ProxyError> {
        if let Some(pending) = self.next_step() {
            return Err(ProxyError::BootstrapOrder {
                expected: pending.to_string(),
                attempted: "finish".to_string(),
            });
        }

        Ok(ListedMarket {
            market: self.keys.market.pubkey(),
            vault_owner: self.vault_owner,
            vault_signer_nonce: self.vault_signer_nonce,
            market_authority: self.market_authority,
            request_queue: self.keys.request_queue.pubkey(),
            event_queue: self.keys.event_queue.pubkey(),
            bids: self.keys.bids.pubkey(),
            asks: self.keys.asks.pubkey(),
            base_vault: self.keys.base_vault.pubkey(),
            quote_vault: self.keys.quote_vault.pubkey(),
            base_mint: self.listing.base_mint,
            quote_mint: self.listing.quote_mint,
            prune_authority: self.keys.prune_authority,
            crank_authority: self.keys.crank_authority,
        })
    }
}
