//! Submission orchestrator.
//!
//! Signs and submits one transaction at a time and waits for confirmation
//! before returning, so a caller's next step always sees the previous step's
//! effects. Any failure is classified into [`ProxyError`] and returned; there
//! are no retries.

use std::sync::Arc;

use credix_proxy_sdk::bootstrap::{
    EVENT_QUEUE_SPAN, MARKET_STATE_SPAN, ORDER_BOOK_SPAN, REQUEST_QUEUE_SPAN, TOKEN_ACCOUNT_SPAN,
};
use credix_proxy_sdk::{ProxyError, RentSchedule};
use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use tracing::{debug, info, warn};

use super::metrics::SubmissionMetrics;
use super::transport::LedgerTransport;

/// Sequential transaction submitter.
pub struct SubmissionOrchestrator {
    /// Ledger transport.
    transport: Arc<dyn LedgerTransport>,

    /// Fee payer.
    payer: Keypair,

    /// Metrics.
    metrics: Arc<SubmissionMetrics>,
}

impl SubmissionOrchestrator {
    /// Creates an orchestrator with fresh metrics.
    #[must_use]
    pub fn new(transport: Arc<dyn LedgerTransport>, payer: Keypair) -> Self {
        Self::with_metrics(transport, payer, Arc::new(SubmissionMetrics::new()))
    }

    /// Creates an orchestrator sharing `metrics`.
    #[must_use]
    pub fn with_metrics(
        transport: Arc<dyn LedgerTransport>,
        payer: Keypair,
        metrics: Arc<SubmissionMetrics>,
    ) -> Self {
        Self {
            transport,
            payer,
            metrics,
        }
    }

    /// Returns the fee payer.
    #[must_use]
    pub fn payer(&self) -> &Keypair {
        &self.payer
    }

    /// Returns the fee payer address.
    #[must_use]
    pub fn payer_pubkey(&self) -> Pubkey {
        self.payer.pubkey()
    }

    /// Returns the transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn LedgerTransport> {
        &self.transport
    }

    /// Returns the metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<SubmissionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Signs `instructions` with the payer and `signers`, submits them as one
    /// transaction and waits for confirmation.
    ///
    /// Signers are deduplicated by address and only those the message
    /// requires are used.
    ///
    /// # Errors
    ///
    /// Returns `TransactionRejected` if signing fails and the classified
    /// ledger error if submission fails.
    pub async fn submit(
        &self,
        label: &str,
        instructions: &[Instruction],
        signers: &[&Keypair],
    ) -> Result<Signature, ProxyError> {
        let blockhash = self.transport.latest_blockhash().await?;

        let payer = self.payer.pubkey();
        let mut transaction = Transaction::new_with_payer(instructions, Some(&payer));
        let required_count = usize::from(transaction.message.header.num_required_signatures);
        let required = transaction
            .message
            .account_keys
            .get(..required_count)
            .unwrap_or_default();

        let mut keypairs: Vec<&Keypair> = Vec::with_capacity(signers.len() + 1);
        for keypair in std::iter::once(&self.payer).chain(signers.iter().copied()) {
            let key = keypair.pubkey();
            if required.contains(&key) && !keypairs.iter().any(|k| k.pubkey() == key) {
                keypairs.push(keypair);
            }
        }

        transaction
            .try_sign(keypairs.as_slice(), blockhash)
            .map_err(|e| ProxyError::TransactionRejected(format!("{label}: signing failed: {e}")))?;

        self.metrics.record_submission(instructions.len());
        debug!(
            step = label,
            instructions = instructions.len(),
            signers = keypairs.len(),
            "Submitting transaction"
        );

        match self.transport.send_and_confirm(&transaction).await {
            Ok(signature) => {
                self.metrics.record_confirmed();
                info!(step = label, signature = %signature, "Transaction confirmed");
                Ok(signature)
            }
            Err(e) => {
                self.metrics.record_failure();
                let err = ProxyError::from(e);
                warn!(step = label, error = %err, "Transaction failed");
                Err(err)
            }
        }
    }

    /// Quotes the rent-exempt balance of every bootstrap span.
    ///
    /// # Errors
    ///
    /// Returns the classified transport error.
    pub async fn rent_schedule(&self) -> Result<RentSchedule, ProxyError> {
        Ok(RentSchedule {
            token_account: self.rent_exempt(TOKEN_ACCOUNT_SPAN).await?,
            market_state: self.rent_exempt(MARKET_STATE_SPAN).await?,
            request_queue: self.rent_exempt(REQUEST_QUEUE_SPAN).await?,
            event_queue: self.rent_exempt(EVENT_QUEUE_SPAN).await?,
            order_book: self.rent_exempt(ORDER_BOOK_SPAN).await?,
        })
    }

    async fn rent_exempt(&self, space: u64) -> Result<u64, ProxyError> {
        Ok(self.transport.minimum_balance_for_rent_exemption(space).await?)
    }

    /// Reads the data of `address`.
    ///
    /// # Errors
    ///
    /// Returns the classified transport error.
    pub async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, ProxyError> {
        Ok(self.transport.account_data(address).await?)
    }

    /// Reads the data of `address`, failing if the account does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the account does not exist.
    pub async fn require_account_data(&self, address: &Pubkey) -> Result<Vec<u8>, ProxyError> {
        self.account_data(address)
            .await?
            .ok_or_else(|| ProxyError::AccountNotFound(address.to_string()))
    }
}

impl std::fmt::Debug for SubmissionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionOrchestrator")
            .field("payer", &self.payer.pubkey())
            .finish_non_exhaustive()
    }
}
