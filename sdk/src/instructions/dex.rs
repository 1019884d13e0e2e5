//! Order-book venue instruction builders.
//!
//! Venue instructions are framed as a version byte followed by a little-endian
//! `u32` tag and a packed body.

use borsh::BorshSerialize;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

use crate::error::ProxyError;

/// Instruction layout version understood by the venue.
pub const DEX_INSTRUCTION_VERSION: u8 = 0;

/// Venue instruction tags used by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DexTag {
    /// InitializeMarket.
    InitializeMarket = 0,
    /// ConsumeEventsPermissioned.
    ConsumeEventsPermissioned = 17,
}

/// Default quote dust threshold for new markets.
pub const DEFAULT_QUOTE_DUST_THRESHOLD: u64 = 100;

fn encode<T: BorshSerialize>(tag: DexTag, body: &T) -> Result<Vec<u8>, ProxyError> {
    let mut data = Vec::with_capacity(64);
    data.push(DEX_INSTRUCTION_VERSION);
    data.extend_from_slice(&(tag as u32).to_le_bytes());
    body.serialize(&mut data)
        .map_err(|e| ProxyError::Serialization(e.to_string()))?;
    Ok(data)
}

/// Parses the tag of a venue instruction.
///
/// Returns `None` if the data is too short or carries an unknown version.
#[must_use]
pub fn decode_tag(data: &[u8]) -> Option<u32> {
    let (version, rest) = data.split_first()?;
    if *version != DEX_INSTRUCTION_VERSION {
        return None;
    }
    let tag: [u8; 4] = rest.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(tag))
}

/// Market parameters encoded in InitializeMarket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize)]
pub struct InitializeMarketParams {
    /// Base lot size in base atoms.
    pub base_lot_size: u64,
    /// Quote lot size in quote atoms.
    pub quote_lot_size: u64,
    /// Taker fee rate in basis points.
    pub fee_rate_bps: u16,
    /// Nonce of the vault owner derivation.
    pub vault_signer_nonce: u64,
    /// Quote dust threshold.
    pub quote_dust_threshold: u64,
}

/// Builder for the venue InitializeMarket instruction.
#[derive(Debug, Clone)]
pub struct InitializeMarketBuilder {
    program_id: Pubkey,
    market: Option<Pubkey>,
    request_queue: Option<Pubkey>,
    event_queue: Option<Pubkey>,
    bids: Option<Pubkey>,
    asks: Option<Pubkey>,
    base_vault: Option<Pubkey>,
    quote_vault: Option<Pubkey>,
    base_mint: Option<Pubkey>,
    quote_mint: Option<Pubkey>,
    authority: Option<Pubkey>,
    prune_authority: Option<Pubkey>,
    crank_authority: Option<Pubkey>,
    params: Option<InitializeMarketParams>,
}

impl InitializeMarketBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            market: None,
            request_queue: None,
            event_queue: None,
            bids: None,
            asks: None,
            base_vault: None,
            quote_vault: None,
            base_mint: None,
            quote_mint: None,
            authority: None,
            prune_authority: None,
            crank_authority: None,
            params: None,
        }
    }

    /// Sets the market account.
    #[must_use]
    pub fn market(mut self, market: Pubkey) -> Self {
        self.market = Some(market);
        self
    }

    /// Sets the request queue.
    #[must_use]
    pub fn request_queue(mut self, request_queue: Pubkey) -> Self {
        self.request_queue = Some(request_queue);
        self
    }

    /// Sets the event queue.
    #[must_use]
    pub fn event_queue(mut self, event_queue: Pubkey) -> Self {
        self.event_queue = Some(event_queue);
        self
    }

    /// Sets the bid and ask trees.
    #[must_use]
    pub fn book(mut self, bids: Pubkey, asks: Pubkey) -> Self {
        self.bids = Some(bids);
        self.asks = Some(asks);
        self
    }

    /// Sets the base and quote vaults.
    #[must_use]
    pub fn vaults(mut self, base_vault: Pubkey, quote_vault: Pubkey) -> Self {
        self.base_vault = Some(base_vault);
        self.quote_vault = Some(quote_vault);
        self
    }

    /// Sets the base and quote mints.
    #[must_use]
    pub fn mints(mut self, base_mint: Pubkey, quote_mint: Pubkey) -> Self {
        self.base_mint = Some(base_mint);
        self.quote_mint = Some(quote_mint);
        self
    }

    /// Sets the market authority.
    #[must_use]
    pub fn authority(mut self, authority: Pubkey) -> Self {
        self.authority = Some(authority);
        self
    }

    /// Sets the prune and crank authorities.
    #[must_use]
    pub fn prune_and_crank(mut self, prune_authority: Pubkey, crank_authority: Pubkey) -> Self {
        self.prune_authority = Some(prune_authority);
        self.crank_authority = Some(crank_authority);
        self
    }

    /// Sets the market parameters.
    #[must_use]
    pub fn params(mut self, params: InitializeMarketParams) -> Self {
        self.params = Some(params);
        self
    }

    /// Builds the instruction.
    ///
    /// # Errors
    ///
    /// Returns an error if any required field is not set.
    pub fn build(self) -> Result<Instruction, ProxyError> {
        let required = |value: Option<Pubkey>, name: &str| {
            value.ok_or_else(|| ProxyError::InvalidSeedInput(format!("{name} not set")))
        };
        let market = required(self.market, "market")?;
        let request_queue = required(self.request_queue, "request_queue")?;
        let event_queue = required(self.event_queue, "event_queue")?;
        let bids = required(self.bids, "bids")?;
        let asks = required(self.asks, "asks")?;
        let base_vault = required(self.base_vault, "base_vault")?;
        let quote_vault = required(self.quote_vault, "quote_vault")?;
        let base_mint = required(self.base_mint, "base_mint")?;
        let quote_mint = required(self.quote_mint, "quote_mint")?;
        let authority = required(self.authority, "authority")?;
        let prune_authority = required(self.prune_authority, "prune_authority")?;
        let crank_authority = required(self.crank_authority, "crank_authority")?;
        let params = self
            .params
            .ok_or_else(|| ProxyError::Serialization("params not set".to_string()))?;

        // Permissioned markets reuse the legacy rent slot for the quote mint.
        let accounts = vec![
            AccountMeta::new(market, false),
            AccountMeta::new(request_queue, false),
            AccountMeta::new(event_queue, false),
            AccountMeta::new(bids, false),
            AccountMeta::new(asks, false),
            AccountMeta::new(base_vault, false),
            AccountMeta::new(quote_vault, false),
            AccountMeta::new_readonly(base_mint, false),
            AccountMeta::new_readonly(quote_mint, false),
            AccountMeta::new_readonly(quote_mint, false),
            AccountMeta::new_readonly(authority, false),
            AccountMeta::new_readonly(prune_authority, false),
            AccountMeta::new_readonly(crank_authority, false),
        ];

        Ok(Instruction {
            program_id: self.program_id,
            accounts,
            data: encode(DexTag::InitializeMarket, &params)?,
        })
    }
}

#[derive(Debug, Clone, BorshSerialize)]
struct ConsumeEventsData {
    limit: u16,
}

/// Builds a permissioned ConsumeEvents instruction.
///
/// `open_orders` lists the open orders accounts referenced by the queued
/// events; the crank authority must sign.
///
/// # Errors
///
/// Returns `InvalidSeedInput` if no open orders account is supplied.
pub fn consume_events_permissioned(
    program_id: &Pubkey,
    open_orders: &[Pubkey],
    market: &Pubkey,
    event_queue: &Pubkey,
    crank_authority: &Pubkey,
    limit: u16,
) -> Result<Instruction, ProxyError> {
    if open_orders.is_empty() {
        return Err(ProxyError::InvalidSeedInput(
            "consume events requires at least one open orders account".to_string(),
        ));
    }

    let mut accounts: Vec<AccountMeta> = open_orders
        .iter()
        .map(|key| AccountMeta::new(*key, false))
        .collect();
    accounts.push(AccountMeta::new(*market, false));
    accounts.push(AccountMeta::new(*event_queue, false));
    accounts.push(AccountMeta::new_readonly(*crank_authority, true));

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: encode(DexTag::ConsumeEventsPermissioned, &ConsumeEventsData { limit })?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_params() -> InitializeMarketParams {
        InitializeMarketParams {
            base_lot_size: 10_000,
            quote_lot_size: 10_000,
            fee_rate_bps: 0,
            vault_signer_nonce: 3,
            quote_dust_threshold: DEFAULT_QUOTE_DUST_THRESHOLD,
        }
    }

    fn full_builder(program_id: Pubkey) -> InitializeMarketBuilder {
        InitializeMarketBuilder::new(program_id)
            .market(Pubkey::new_unique())
            .request_queue(Pubkey::new_unique())
            .event_queue(Pubkey::new_unique())
            .book(Pubkey::new_unique(), Pubkey::new_unique())
            .vaults(Pubkey::new_unique(), Pubkey::new_unique())
            .mints(Pubkey::new_unique(), Pubkey::new_unique())
            .authority(Pubkey::new_unique())
            .prune_and_crank(Pubkey::new_unique(), Pubkey::new_unique())
            .params(test_params())
    }

    #[test]
    fn test_initialize_market_layout() {
        let program_id = Pubkey::new_unique();
        let ix = full_builder(program_id).build().expect("should build instruction");

        assert_eq!(ix.program_id, program_id);
        assert_eq!(ix.accounts.len(), 13);
        assert!(ix.accounts[..7].iter().all(|meta| meta.is_writable));
        assert!(ix.accounts[7..].iter().all(|meta| !meta.is_writable));
        assert!(ix.accounts.iter().all(|meta| !meta.is_signer));
        assert_eq!(ix.accounts[8].pubkey, ix.accounts[9].pubkey);

        // version + tag + 8 + 8 + 2 + 8 + 8
        assert_eq!(ix.data.len(), 39);
        assert_eq!(decode_tag(&ix.data), Some(0));
        assert_eq!(&ix.data[5..13], &10_000u64.to_le_bytes());
        assert_eq!(&ix.data[21..23], &0u16.to_le_bytes());
        assert_eq!(&ix.data[23..31], &3u64.to_le_bytes());
        assert_eq!(&ix.data[31..39], &100u64.to_le_bytes());
    }

    #[test]
    fn test_initialize_market_missing_authority() {
        let result = InitializeMarketBuilder::new(Pubkey::new_unique())
            .market(Pubkey::new_unique())
            .params(test_params())
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_consume_events_permissioned() {
        let program_id = Pubkey::new_unique();
        let open_orders = [Pubkey::new_unique(), Pubkey::new_unique()];
        let market = Pubkey::new_unique();
        let event_queue = Pubkey::new_unique();
        let crank = Pubkey::new_unique();

        let ix = consume_events_permissioned(
            &program_id,
            &open_orders,
            &market,
            &event_queue,
            &crank,
            5,
        )
        .expect("should build instruction");

        assert_eq!(ix.accounts.len(), 5);
        assert_eq!(ix.accounts[2].pubkey, market);
        assert_eq!(ix.accounts[3].pubkey, event_queue);
        assert!(ix.accounts[4].is_signer);
        assert_eq!(decode_tag(&ix.data), Some(17));
        assert_eq!(&ix.data[5..], &5u16.to_le_bytes());
    }

    #[test]
    fn test_consume_events_requires_open_orders() {
        let key = Pubkey::new_unique();
        assert!(consume_events_permissioned(&key, &[], &key, &key, &key, 5).is_err());
    }

    #[test]
    fn test_decode_tag_rejects_unknown_version() {
        assert_eq!(decode_tag(&[1, 0, 0, 0, 0]), None);
        assert_eq!(decode_tag(&[0, 0]), None);
    }
}
