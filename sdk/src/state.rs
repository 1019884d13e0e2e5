//! Read-only views over venue, token and validating program account data.
//!
//! Only the fields the proxy checks are decoded: bootstrap post-conditions,
//! event-queue depth, token balances and pass status.

use solana_sdk::pubkey::Pubkey;

use crate::error::ProxyError;
use crate::instructions::credix::account_discriminator;

/// Head padding written by the venue before every account.
pub const ACCOUNT_HEAD_PADDING: &[u8; 5] = b"serum";

/// Tail padding written by the venue after every account.
pub const ACCOUNT_TAIL_PADDING: &[u8; 7] = b"padding";

/// Venue account flag: initialized.
pub const ACCOUNT_FLAG_INITIALIZED: u64 = 1;
/// Venue account flag: market.
pub const ACCOUNT_FLAG_MARKET: u64 = 1 << 1;
/// Venue account flag: event queue.
pub const ACCOUNT_FLAG_EVENT_QUEUE: u64 = 1 << 4;
/// Venue account flag: permissioned market.
pub const ACCOUNT_FLAG_PERMISSIONED: u64 = 1 << 9;
/// Venue account flag: crank authority required.
pub const ACCOUNT_FLAG_CRANK_AUTHORITY_REQUIRED: u64 = 1 << 10;

/// Size of a market account with authorities (v3 layout).
pub const MARKET_STATE_SPAN: usize = 1476;

/// Size of a token account.
pub const TOKEN_ACCOUNT_SPAN: usize = 165;

/// Offset of the event count inside an event-queue account.
pub const EVENT_QUEUE_COUNT_OFFSET: usize = 21;

fn read_pubkey(data: &[u8], offset: usize) -> Result<Pubkey, ProxyError> {
    let bytes: [u8; 32] = data
        .get(offset..offset + 32)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| {
            ProxyError::Deserialization(format!("pubkey at offset {offset} out of range"))
        })?;
    Ok(Pubkey::new_from_array(bytes))
}

fn read_u64(data: &[u8], offset: usize) -> Result<u64, ProxyError> {
    let bytes: [u8; 8] = data
        .get(offset..offset + 8)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| {
            ProxyError::Deserialization(format!("u64 at offset {offset} out of range"))
        })?;
    Ok(u64::from_le_bytes(bytes))
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32, ProxyError> {
    let bytes: [u8; 4] = data
        .get(offset..offset + 4)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| {
            ProxyError::Deserialization(format!("u32 at offset {offset} out of range"))
        })?;
    Ok(u32::from_le_bytes(bytes))
}

fn write_at(buf: &mut [u8], offset: usize, bytes: &[u8]) {
    if let Some(slot) = buf.get_mut(offset..offset + bytes.len()) {
        slot.copy_from_slice(bytes);
    }
}

/// Byte offsets of the v3 market layout.
mod market_offsets {
    pub const ACCOUNT_FLAGS: usize = 5;
    pub const OWN_ADDRESS: usize = 13;
    pub const VAULT_SIGNER_NONCE: usize = 45;
    pub const BASE_MINT: usize = 53;
    pub const QUOTE_MINT: usize = 85;
    pub const BASE_VAULT: usize = 117;
    pub const QUOTE_VAULT: usize = 165;
    pub const QUOTE_DUST_THRESHOLD: usize = 213;
    pub const REQUEST_QUEUE: usize = 221;
    pub const EVENT_QUEUE: usize = 253;
    pub const BIDS: usize = 285;
    pub const ASKS: usize = 317;
    pub const BASE_LOT_SIZE: usize = 349;
    pub const QUOTE_LOT_SIZE: usize = 357;
    pub const FEE_RATE_BPS: usize = 365;
    pub const AUTHORITY: usize = 381;
    pub const PRUNE_AUTHORITY: usize = 413;
    pub const CONSUME_EVENTS_AUTHORITY: usize = 445;
}

/// Decoded market account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketStateView {
    /// Account flags.
    pub account_flags: u64,
    /// Address the market records for itself.
    pub own_address: Pubkey,
    /// Vault owner derivation nonce.
    pub vault_signer_nonce: u64,
    /// Base mint.
    pub base_mint: Pubkey,
    /// Quote mint.
    pub quote_mint: Pubkey,
    /// Base vault.
    pub base_vault: Pubkey,
    /// Quote vault.
    pub quote_vault: Pubkey,
    /// Quote dust threshold.
    pub quote_dust_threshold: u64,
    /// Request queue.
    pub request_queue: Pubkey,
    /// Event queue.
    pub event_queue: Pubkey,
    /// Bid tree.
    pub bids: Pubkey,
    /// Ask tree.
    pub asks: Pubkey,
    /// Base lot size.
    pub base_lot_size: u64,
    /// Quote lot size.
    pub quote_lot_size: u64,
    /// Fee rate in basis points.
    pub fee_rate_bps: u64,
    /// Market authority.
    pub authority: Pubkey,
    /// Prune authority.
    pub prune_authority: Pubkey,
    /// Consume-events (crank) authority.
    pub consume_events_authority: Pubkey,
}

impl MarketStateView {
    /// Decodes a market account.
    ///
    /// # Errors
    ///
    /// Returns `Deserialization` if the data is shorter than the v3 layout or
    /// lacks the market flag.
    pub fn from_account_data(data: &[u8]) -> Result<Self, ProxyError> {
        use market_offsets as off;

        if data.len() < MARKET_STATE_SPAN {
            return Err(ProxyError::Deserialization(format!(
                "market account is {} bytes, expected {}",
                data.len(),
                MARKET_STATE_SPAN
            )));
        }

        let account_flags = read_u64(data, off::ACCOUNT_FLAGS)?;
        if account_flags & ACCOUNT_FLAG_MARKET == 0 {
            return Err(ProxyError::Deserialization(
                "account is not an initialized market".to_string(),
            ));
        }

        Ok(Self {
            account_flags,
            own_address: read_pubkey(data, off::OWN_ADDRESS)?,
            vault_signer_nonce: read_u64(data, off::VAULT_SIGNER_NONCE)?,
            base_mint: read_pubkey(data, off::BASE_MINT)?,
            quote_mint: read_pubkey(data, off::QUOTE_MINT)?,
            base_vault: read_pubkey(data, off::BASE_VAULT)?,
            quote_vault: read_pubkey(data, off::QUOTE_VAULT)?,
            quote_dust_threshold: read_u64(data, off::QUOTE_DUST_THRESHOLD)?,
            request_queue: read_pubkey(data, off::REQUEST_QUEUE)?,
            event_queue: read_pubkey(data, off::EVENT_QUEUE)?,
            bids: read_pubkey(data, off::BIDS)?,
            asks: read_pubkey(data, off::ASKS)?,
            base_lot_size: read_u64(data, off::BASE_LOT_SIZE)?,
            quote_lot_size: read_u64(data, off::QUOTE_LOT_SIZE)?,
            fee_rate_bps: read_u64(data, off::FEE_RATE_BPS)?,
            authority: read_pubkey(data, off::AUTHORITY)?,
            prune_authority: read_pubkey(data, off::PRUNE_AUTHORITY)?,
            consume_events_authority: read_pubkey(data, off::CONSUME_EVENTS_AUTHORITY)?,
        })
    }

    /// Encodes the view in the v3 layout, zeroing fields the view omits.
    #[must_use]
    pub fn to_account_data(&self) -> Vec<u8> {
        use market_offsets as off;

        let mut buf = vec![0u8; MARKET_STATE_SPAN];
        write_at(&mut buf, 0, ACCOUNT_HEAD_PADDING);
        write_at(&mut buf, off::ACCOUNT_FLAGS, &self.account_flags.to_le_bytes());
        write_at(&mut buf, off::OWN_ADDRESS, self.own_address.as_ref());
        write_at(&mut buf, off::VAULT_SIGNER_NONCE, &self.vault_signer_nonce.to_le_bytes());
        write_at(&mut buf, off::BASE_MINT, self.base_mint.as_ref());
        write_at(&mut buf, off::QUOTE_MINT, self.quote_mint.as_ref());
        write_at(&mut buf, off::BASE_VAULT, self.base_vault.as_ref());
        write_at(&mut buf, off::QUOTE_VAULT, self.quote_vault.as_ref());
        write_at(&mut buf, off::QUOTE_DUST_THRESHOLD, &self.quote_dust_threshold.to_le_bytes());
        write_at(&mut buf, off::REQUEST_QUEUE, self.request_queue.as_ref());
        write_at(&mut buf, off::EVENT_QUEUE, self.event_queue.as_ref());
        write_at(&mut buf, off::BIDS, self.bids.as_ref());
        write_at(&mut buf, off::ASKS, self.asks.as_ref());
        write_at(&mut buf, off::BASE_LOT_SIZE, &self.base_lot_size.to_le_bytes());
        write_at(&mut buf, off::QUOTE_LOT_SIZE, &self.quote_lot_size.to_le_bytes());
        write_at(&mut buf, off::FEE_RATE_BPS, &self.fee_rate_bps.to_le_bytes());
        write_at(&mut buf, off::AUTHORITY, self.authority.as_ref());
        write_at(&mut buf, off::PRUNE_AUTHORITY, self.prune_authority.as_ref());
        write_at(&mut buf, off::CONSUME_EVENTS_AUTHORITY, self.consume_events_authority.as_ref());
        write_at(&mut buf, MARKET_STATE_SPAN - ACCOUNT_TAIL_PADDING.len(), ACCOUNT_TAIL_PADDING);
        buf
    }
}

/// Event-queue header fields the drain loop needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventQueueHeader {
    /// Account flags.
    pub account_flags: u64,
    /// Number of queued events.
    pub count: u32,
}

impl EventQueueHeader {
    /// Decodes the header of an event-queue account.
    ///
    /// # Errors
    ///
    /// Returns `Deserialization` if the header is truncated.
    pub fn from_account_data(data: &[u8]) -> Result<Self, ProxyError> {
        Ok(Self {
            account_flags: read_u64(data, 5)?,
            count: read_u32(data, EVENT_QUEUE_COUNT_OFFSET)?,
        })
    }

    /// Returns true if no events are queued.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Token account fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAccountView {
    /// Mint.
    pub mint: Pubkey,
    /// Owner.
    pub owner: Pubkey,
    /// Balance in atoms.
    pub amount: u64,
}

impl TokenAccountView {
    /// Decodes a token account.
    ///
    /// # Errors
    ///
    /// Returns `Deserialization` if the data is not a token account.
    pub fn from_account_data(data: &[u8]) -> Result<Self, ProxyError> {
        if data.len() != TOKEN_ACCOUNT_SPAN {
            return Err(ProxyError::Deserialization(format!(
                "token account is {} bytes, expected {}",
                data.len(),
                TOKEN_ACCOUNT_SPAN
            )));
        }
        Ok(Self {
            mint: read_pubkey(data, 0)?,
            owner: read_pubkey(data, 32)?,
            amount: read_u64(data, 64)?,
        })
    }
}

/// Pass account fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredixPassView {
    /// Bump of the pass PDA.
    pub bump: u8,
    /// Borrower role.
    pub is_borrower: bool,
    /// Underwriter role.
    pub is_underwriter: bool,
    /// Whether the pass is active.
    pub active: bool,
}

impl CredixPassView {
    /// Decodes a pass account.
    ///
    /// # Errors
    ///
    /// Returns `Deserialization` if the discriminator does not match or the
    /// data is truncated.
    pub fn from_account_data(data: &[u8]) -> Result<Self, ProxyError> {
        let (disc, body) = data
            .split_at_checked(8)
            .ok_or_else(|| ProxyError::Deserialization("pass account truncated".to_string()))?;
        if disc != account_discriminator("CredixPass") {
            return Err(ProxyError::Deserialization(
                "account is not a pass".to_string(),
            ));
        }
        match body {
            [bump, is_borrower, is_underwriter, active, ..] => Ok(Self {
                bump: *bump,
                is_borrower: *is_borrower != 0,
                is_underwriter: *is_underwriter != 0,
                active: *active != 0,
            }),
            _ => Err(ProxyError::Deserialization("pass account truncated".to_string())),
        }
    }

    /// Encodes the pass with its account discriminator.
    #[must_use]
    pub fn to_account_data(&self) -> Vec<u8> {
        let mut data = account_discriminator("CredixPass").to_vec();
        data.extend_from_slice(&[
            self.bump,
            u8::from(self.is_borrower),
            u8::from(self.is_underwriter),
            u8::from(self.active),
        ]);
        data
    }
}
