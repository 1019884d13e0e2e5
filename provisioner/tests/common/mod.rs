//! In-memory ledger shared by the provisioner integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use credix_proxy_provisioner::{LedgerTransport, SubmissionOrchestrator, TransportError};
use credix_proxy_sdk::instructions::credix::{account_discriminator, instruction_discriminator};
use credix_proxy_sdk::instructions::dex::decode_tag;
use credix_proxy_sdk::instructions::proxy::CREATE_SIGNING_PDA_MARKER;
use credix_proxy_sdk::instructions::{SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID};
use credix_proxy_sdk::middleware::{InjectedSlot, INJECTED_SLOTS};
use credix_proxy_sdk::pda::derive_associated_token_address;
use credix_proxy_sdk::state::{
    ACCOUNT_FLAG_CRANK_AUTHORITY_REQUIRED, ACCOUNT_FLAG_EVENT_QUEUE, ACCOUNT_FLAG_INITIALIZED,
    ACCOUNT_FLAG_MARKET, ACCOUNT_FLAG_PERMISSIONED, EVENT_QUEUE_COUNT_OFFSET, TOKEN_ACCOUNT_SPAN,
};
use credix_proxy_sdk::{CredixPassView, MarketStateView, ProxyConfig};
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    transaction::Transaction,
};

/// Base tokens credited to a funded participant.
pub const FUNDED_BASE_AMOUNT: u64 = 500_000_000;

/// Rent the simulated ledger charges for `space` bytes.
pub fn rent_for(space: u64) -> u64 {
    (space + 128) * 6_960
}

/// Instruction seen by the simulated programs.
struct Invocation {
    program_id: Pubkey,
    accounts: Vec<Pubkey>,
    signers: Vec<bool>,
    data: Vec<u8>,
}

impl Invocation {
    fn account(&self, index: usize) -> Result<Pubkey, TransportError> {
        self.accounts
            .get(index)
            .copied()
            .ok_or_else(|| rejected(None, "NotEnoughAccountKeys", &[]))
    }

    fn is_signer(&self, index: usize) -> bool {
        self.signers.get(index).copied().unwrap_or(false)
    }
}

fn rejected(code: Option<u32>, message: &str, logs: &[&str]) -> TransportError {
    TransportError::Rejected {
        custom_code: code,
        message: message.to_string(),
        logs: logs.iter().map(|line| (*line).to_string()).collect(),
    }
}

fn custom(code: u32, logs: &[&str]) -> TransportError {
    rejected(
        Some(code),
        &format!("custom program error: {code:#x}"),
        logs,
    )
}

fn not_found(address: &Pubkey) -> TransportError {
    rejected(None, &format!("AccountNotFound: {address}"), &[])
}

fn token_account_data(mint: &Pubkey, owner: &Pubkey, amount: u64) -> Vec<u8> {
    let mut data = vec![0u8; TOKEN_ACCOUNT_SPAN];
    data[..32].copy_from_slice(mint.as_ref());
    data[32..64].copy_from_slice(owner.as_ref());
    data[64..72].copy_from_slice(&amount.to_le_bytes());
    data
}

fn token_amount(data: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[64..72]);
    u64::from_le_bytes(bytes)
}

fn set_token_amount(data: &mut [u8], amount: u64) {
    data[64..72].copy_from_slice(&amount.to_le_bytes());
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

fn event_count(data: &[u8]) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[EVENT_QUEUE_COUNT_OFFSET..EVENT_QUEUE_COUNT_OFFSET + 4]);
    u32::from_le_bytes(bytes)
}

fn set_event_count(data: &mut [u8], count: u32) {
    data[EVENT_QUEUE_COUNT_OFFSET..EVENT_QUEUE_COUNT_OFFSET + 4]
        .copy_from_slice(&count.to_le_bytes());
}

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<Pubkey, Vec<u8>>,
    confirmed: Vec<Vec<Pubkey>>,
    proxied_tags: Vec<u32>,
    market_authority_override: Option<Pubkey>,
    frozen_event_queues: Vec<Pubkey>,
}

/// Ledger that executes the instructions the provisioner sends.
///
/// Each transaction is applied atomically: a failing instruction leaves the
/// state of every earlier instruction in that transaction unapplied.
pub struct SimulatedLedger {
    config: ProxyConfig,
    state: Mutex<LedgerState>,
    slot: AtomicU8,
}

impl SimulatedLedger {
    /// Creates an empty ledger for the programs named in `config`.
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LedgerState::default()),
            slot: AtomicU8::new(0),
        }
    }

    /// Returns the data of `address`.
    pub fn account(&self, address: &Pubkey) -> Option<Vec<u8>> {
        self.state.lock().expect("lock").accounts.get(address).cloned()
    }

    /// Stores `data` at `address`, replacing any existing account.
    pub fn insert_account(&self, address: Pubkey, data: Vec<u8>) {
        self.state.lock().expect("lock").accounts.insert(address, data);
    }

    /// Credits `owner` with an associated `mint` account holding `amount`.
    pub fn fund_token_account(&self, owner: &Pubkey, mint: &Pubkey, amount: u64) -> Pubkey {
        let address = derive_associated_token_address(owner, mint).expect("ata");
        self.state
            .lock()
            .expect("lock")
            .accounts
            .insert(address, token_account_data(mint, owner, amount));
        address
    }

    /// Returns the balance of the associated `mint` account of `owner`.
    pub fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Option<u64> {
        let address = derive_associated_token_address(owner, mint).expect("ata");
        self.account(&address).map(|data| token_amount(&data))
    }

    /// Sets the number of queued events of `event_queue`.
    pub fn queue_events(&self, event_queue: &Pubkey, count: u32) {
        let mut state = self.state.lock().expect("lock");
        let data = state.accounts.get_mut(event_queue).expect("event queue");
        set_event_count(data, count);
    }

    /// Makes consume-events on `event_queue` succeed without consuming.
    pub fn freeze_event_queue(&self, event_queue: Pubkey) {
        self.state
            .lock()
            .expect("lock")
            .frozen_event_queues
            .push(event_queue);
    }

    /// Makes the next initialized market record `authority` instead of the
    /// one it was given.
    pub fn override_market_authority(&self, authority: Pubkey) {
        self.state.lock().expect("lock").market_authority_override = Some(authority);
    }

    /// Program ids of every confirmed transaction, in submission order.
    pub fn confirmed_programs(&self) -> Vec<Vec<Pubkey>> {
        self.state.lock().expect("lock").confirmed.clone()
    }

    /// Venue tags of the proxied instructions executed so far.
    pub fn proxied_tags(&self) -> Vec<u32> {
        self.state.lock().expect("lock").proxied_tags.clone()
    }

    fn invocations(transaction: &Transaction) -> Result<Vec<Invocation>, TransportError> {
        let message = &transaction.message;
        let signer_count = usize::from(message.header.num_required_signatures);
        let key = |index: u8| {
            message
                .account_keys
                .get(usize::from(index))
                .copied()
                .ok_or_else(|| rejected(None, "invalid account index", &[]))
        };

        message
            .instructions
            .iter()
            .map(|ix| {
                Ok(Invocation {
                    program_id: key(ix.program_id_index)?,
                    accounts: ix.accounts.iter().map(|i| key(*i)).collect::<Result<_, _>>()?,
                    signers: ix
                        .accounts
                        .iter()
                        .map(|i| usize::from(*i) < signer_count)
                        .collect(),
                    data: ix.data.clone(),
                })
            })
            .collect()
    }

    fn execute(&self, state: &mut LedgerState, ix: &Invocation) -> Result<(), TransportError> {
        if ix.program_id == SYSTEM_PROGRAM_ID {
            Self::system(state, ix)
        } else if ix.program_id == TOKEN_PROGRAM_ID {
            Self::token(state, ix)
        } else if ix.program_id == self.config.dex_program_id {
            Self::dex(state, ix)
        } else if ix.program_id == self.config.credix_program_id {
            self.credix(state, ix)
        } else if ix.program_id == self.config.proxy_program_id {
            self.proxy(state, ix)
        } else {
            Err(rejected(
                None,
                "Attempt to load a program that does not exist",
                &[],
            ))
        }
    }

    fn system(state: &mut LedgerState, ix: &Invocation) -> Result<(), TransportError> {
        let target = ix.account(1)?;
        if !ix.is_signer(1) {
            return Err(rejected(None, "missing required signature for instruction", &[]));
        }
        if state.accounts.contains_key(&target) {
            let log = format!("Allocate: account {target} already in use");
            return Err(custom(0, &[log.as_str()]));
        }
        let lamports = read_u64(&ix.data, 4);
        let space = read_u64(&ix.data, 12);
        if lamports < rent_for(space) {
            return Err(rejected(None, "insufficient funds for rent", &[]));
        }
        state.accounts.insert(target, vec![0u8; space as usize]);
        Ok(())
    }

    fn token(state: &mut LedgerState, ix: &Invocation) -> Result<(), TransportError> {
        let account = ix.account(0)?;
        let mint = ix.account(1)?;
        let owner = ix.account(2)?;
        let data = state
            .accounts
            .get_mut(&account)
            .ok_or_else(|| not_found(&account))?;
        if data.len() != TOKEN_ACCOUNT_SPAN {
            return Err(custom(3, &["Program log: Error: InvalidAccountData"]));
        }
        *data = token_account_data(&mint, &owner, 0);
        Ok(())
    }

    fn dex(state: &mut LedgerState, ix: &Invocation) -> Result<(), TransportError> {
        match decode_tag(&ix.data) {
            Some(0) => {
                for index in 0..7 {
                    let address = ix.account(index)?;
                    if !state.accounts.contains_key(&address) {
                        return Err(not_found(&address));
                    }
                }
                let body = &ix.data[5..];
                let market = ix.account(0)?;
                let event_queue = ix.account(2)?;
                let authority = state
                    .market_authority_override
                    .take()
                    .unwrap_or(ix.account(10)?);
                let view = MarketStateView {
                    account_flags: ACCOUNT_FLAG_INITIALIZED
                        | ACCOUNT_FLAG_MARKET
                        | ACCOUNT_FLAG_PERMISSIONED
                        | ACCOUNT_FLAG_CRANK_AUTHORITY_REQUIRED,
                    own_address: market,
                    vault_signer_nonce: read_u64(body, 18),
                    base_mint: ix.account(7)?,
                    quote_mint: ix.account(8)?,
                    base_vault: ix.account(5)?,
                    quote_vault: ix.account(6)?,
                    quote_dust_threshold: read_u64(body, 26),
                    request_queue: ix.account(1)?,
                    event_queue,
                    bids: ix.account(3)?,
                    asks: ix.account(4)?,
                    base_lot_size: read_u64(body, 0),
                    quote_lot_size: read_u64(body, 8),
                    fee_rate_bps: u64::from(u16::from_le_bytes([body[16], body[17]])),
                    authority,
                    prune_authority: ix.account(11)?,
                    consume_events_authority: ix.account(12)?,
                };
                state.accounts.insert(market, view.to_account_data());
                if let Some(queue) = state.accounts.get_mut(&event_queue) {
                    let flags = ACCOUNT_FLAG_INITIALIZED | ACCOUNT_FLAG_EVENT_QUEUE;
                    queue[5..13].copy_from_slice(&flags.to_le_bytes());
                }
                Ok(())
            }
            Some(17) => {
                let count = ix.accounts.len();
                let market = ix.account(count - 3)?;
                let event_queue = ix.account(count - 2)?;
                let crank = ix.account(count - 1)?;
                let market_data = state.accounts.get(&market).ok_or_else(|| not_found(&market))?;
                let view = MarketStateView::from_account_data(market_data)
                    .map_err(|e| rejected(None, &e.to_string(), &[]))?;
                if view.consume_events_authority != crank || !ix.is_signer(count - 1) {
                    return Err(custom(0x1000_0000, &["Program log: invalid crank authority"]));
                }
                let limit = u32::from(u16::from_le_bytes([ix.data[5], ix.data[6]]));
                let frozen = state.frozen_event_queues.contains(&event_queue);
                let queue = state
                    .accounts
                    .get_mut(&event_queue)
                    .ok_or_else(|| not_found(&event_queue))?;
                if !frozen {
                    let remaining = event_count(queue).saturating_sub(limit);
                    set_event_count(queue, remaining);
                }
                Ok(())
            }
            Some(tag) => {
                state.proxied_tags.push(tag);
                Ok(())
            }
            None => Err(rejected(None, "invalid instruction data", &[])),
        }
    }

    fn credix(&self, state: &mut LedgerState, ix: &Invocation) -> Result<(), TransportError> {
        let disc = &ix.data[..8];
        let args = &ix.data[8..];

        if disc == instruction_discriminator("initialize_market") {
            let global_market_state = ix.account(2)?;
            if state.accounts.contains_key(&global_market_state) {
                return Err(custom(
                    0,
                    &[format!("Allocate: account {global_market_state} already in use").as_str()],
                ));
            }
            let signing_authority = ix.account(3)?;
            let pool = ix.account(4)?;
            let lp_mint = ix.account(5)?;
            let base_mint = ix.account(6)?;
            if !ix.is_signer(5) {
                return Err(rejected(None, "missing required signature for instruction", &[]));
            }
            state.accounts.insert(
                global_market_state,
                account_discriminator("GlobalMarketState").to_vec(),
            );
            state.accounts.insert(lp_mint, vec![0u8; 82]);
            state
                .accounts
                .insert(pool, token_account_data(&base_mint, &signing_authority, 0));
            Ok(())
        } else if disc == instruction_discriminator("create_credix_pass") {
            let pass = ix.account(2)?;
            let global_market_state = ix.account(3)?;
            if !state.accounts.contains_key(&global_market_state) {
                return Err(not_found(&global_market_state));
            }
            if state.accounts.contains_key(&pass) {
                let log = format!("Allocate: account {pass} already in use");
                return Err(custom(0, &[log.as_str()]));
            }
            let view = CredixPassView {
                bump: args[0],
                is_underwriter: args[1] != 0,
                is_borrower: args[2] != 0,
                active: true,
            };
            state.accounts.insert(pass, view.to_account_data());
            Ok(())
        } else if disc == instruction_discriminator("update_credix_pass") {
            let pass = ix.account(2)?;
            let data = state.accounts.get_mut(&pass).ok_or_else(|| not_found(&pass))?;
            let mut view = CredixPassView::from_account_data(data)
                .map_err(|e| rejected(None, &e.to_string(), &[]))?;
            view.active = args[0] != 0;
            view.is_underwriter = args[1] != 0;
            view.is_borrower = args[2] != 0;
            *data = view.to_account_data();
            Ok(())
        } else if disc == instruction_discriminator("deposit_funds") {
            self.deposit_funds(state, ix, read_u64(args, 0))
        } else {
            Err(custom(101, &["Program log: Fallback functions are not supported"]))
        }
    }

    fn require_active_pass(state: &LedgerState, pass: &Pubkey) -> Result<(), TransportError> {
        let active = state
            .accounts
            .get(pass)
            .and_then(|data| CredixPassView::from_account_data(data).ok())
            .is_some_and(|view| view.active);
        if active {
            Ok(())
        } else {
            Err(custom(6002, &["Program log: Error: Credix pass is inactive."]))
        }
    }

    fn deposit_funds(
        &self,
        state: &mut LedgerState,
        ix: &Invocation,
        amount: u64,
    ) -> Result<(), TransportError> {
        let investor = ix.account(0)?;
        let investor_tokens = ix.account(4)?;
        let pool = ix.account(5)?;
        let lp_mint = ix.account(6)?;
        let investor_lp = ix.account(7)?;
        Self::require_active_pass(state, &ix.account(8)?)?;

        let balance = state
            .accounts
            .get(&investor_tokens)
            .map_or(0, |data| token_amount(data));
        if amount > balance {
            return Err(custom(6011, &["Program log: Error: Not enough Base tokens."]));
        }
        let pool_balance = state
            .accounts
            .get(&pool)
            .map(|data| token_amount(data))
            .ok_or_else(|| not_found(&pool))?;

        if let Some(data) = state.accounts.get_mut(&investor_tokens) {
            set_token_amount(data, balance - amount);
        }
        if let Some(data) = state.accounts.get_mut(&pool) {
            set_token_amount(data, pool_balance + amount);
        }
        let lp = state
            .accounts
            .entry(investor_lp)
            .or_insert_with(|| token_account_data(&lp_mint, &investor, 0));
        let lp_balance = token_amount(lp);
        set_token_amount(lp, lp_balance + amount);
        Ok(())
    }

    fn proxy(&self, state: &mut LedgerState, ix: &Invocation) -> Result<(), TransportError> {
        if ix.data.first() == Some(&CREATE_SIGNING_PDA_MARKER) && ix.accounts.len() == 4 {
            let pda = ix.account(1)?;
            if state.accounts.contains_key(&pda) {
                let log = format!("Allocate: account {pda} already in use");
                return Err(custom(0, &[log.as_str()]));
            }
            state.accounts.insert(pda, vec![0u8; 8]);
            return Ok(());
        }

        let slot = |wanted: InjectedSlot| {
            INJECTED_SLOTS
                .iter()
                .position(|slot| *slot == wanted)
                .expect("slot")
        };
        let pass = ix.account(slot(InjectedSlot::CredixPass))?;
        Self::require_active_pass(state, &pass)?;

        let forwarded = Invocation {
            program_id: self.config.dex_program_id,
            accounts: ix.accounts[INJECTED_SLOTS.len()..].to_vec(),
            signers: ix.signers[INJECTED_SLOTS.len()..].to_vec(),
            data: ix.data[1..].to_vec(),
        };
        Self::dex(state, &forwarded)
    }
}

#[async_trait]
impl LedgerTransport for SimulatedLedger {
    async fn latest_blockhash(&self) -> Result<Hash, TransportError> {
        let slot = self.slot.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        Ok(Hash::new_from_array([slot; 32]))
    }

    async fn minimum_balance_for_rent_exemption(
        &self,
        space: u64,
    ) -> Result<u64, TransportError> {
        Ok(rent_for(space))
    }

    async fn send_and_confirm(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, TransportError> {
        if !transaction.is_signed() {
            return Err(rejected(None, "signature verification failed", &[]));
        }
        let invocations = Self::invocations(transaction)?;

        let mut state = self.state.lock().expect("lock");
        let mut staged = LedgerState {
            accounts: state.accounts.clone(),
            confirmed: Vec::new(),
            proxied_tags: state.proxied_tags.clone(),
            market_authority_override: state.market_authority_override,
            frozen_event_queues: state.frozen_event_queues.clone(),
        };
        for ix in &invocations {
            self.execute(&mut staged, ix)?;
        }

        state.accounts = staged.accounts;
        state.proxied_tags = staged.proxied_tags;
        state.market_authority_override = staged.market_authority_override;
        state
            .confirmed
            .push(invocations.iter().map(|ix| ix.program_id).collect());
        Ok(transaction.signatures[0])
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.account(address))
    }
}

/// Test deployment: a configuration with fresh program ids and an LP mint
/// keypair matching it.
pub struct Deployment {
    pub config: ProxyConfig,
    pub lp_mint: Keypair,
    pub base_mint: Pubkey,
    pub ledger: Arc<SimulatedLedger>,
    pub orchestrator: SubmissionOrchestrator,
}

impl Deployment {
    /// Creates a deployment whose payer is `payer`.
    pub fn with_payer(payer: Keypair) -> Self {
        use solana_sdk::signature::Signer;

        let lp_mint = Keypair::new();
        let config = ProxyConfig::new(Pubkey::new_unique(), lp_mint.pubkey())
            .with_proxy_program(Pubkey::new_unique())
            .with_dex_program(Pubkey::new_unique())
            .with_credix_program(Pubkey::new_unique())
            .with_gateway_program(Pubkey::new_unique());
        let ledger = Arc::new(SimulatedLedger::new(config.clone()));
        let transport = Arc::clone(&ledger) as Arc<dyn LedgerTransport>;
        let orchestrator = SubmissionOrchestrator::new(transport, payer);

        Self {
            config,
            lp_mint,
            base_mint: Pubkey::new_unique(),
            ledger,
            orchestrator,
        }
    }

    /// Creates a deployment with a fresh payer.
    pub fn new() -> Self {
        Self::with_payer(Keypair::new())
    }
}
