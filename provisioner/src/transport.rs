//! Ledger transport abstraction.
//!
//! Everything the provisioner needs from the ledger goes through
//! [`LedgerTransport`]: blockhashes, rent quotes, confirmed submission and
//! account reads. Retry and timeout policy belong to the implementation.

use async_trait::async_trait;
use credix_proxy_sdk::ProxyError;
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// RPC request failed.
    #[error("request failed: {0}")]
    Request(String),

    /// The ledger rejected the transaction.
    #[error("transaction rejected: {message}")]
    Rejected {
        /// Custom program error code, if an instruction failed.
        custom_code: Option<u32>,
        /// Ledger error text.
        message: String,
        /// Program logs.
        logs: Vec<String>,
    },

    /// Malformed response.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl From<TransportError> for ProxyError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Rejected {
                custom_code,
                message,
                logs,
            } => {
                let text = if logs.is_empty() {
                    message
                } else {
                    format!("{message}; logs: {}", logs.join(" | "))
                };
                ProxyError::classify(custom_code, &text)
            }
            TransportError::Deserialization(msg) => ProxyError::Deserialization(msg),
            other => ProxyError::TransactionRejected(other.to_string()),
        }
    }
}

/// Ledger operations used by the provisioner.
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    /// Returns the latest blockhash.
    async fn latest_blockhash(&self) -> Result<Hash, TransportError>;

    /// Returns the rent-exempt balance for an account of `space` bytes.
    async fn minimum_balance_for_rent_exemption(&self, space: u64) -> Result<u64, TransportError>;

    /// Submits a signed transaction and waits until it is confirmed.
    async fn send_and_confirm(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, TransportError>;

    /// Returns the data of `address`, or `None` if the account does not exist.
    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, TransportError>;
}
