//! RPC ledger transport.
//!
//! Wraps the nonblocking [`RpcClient`]. Confirmation is awaited by the client
//! at the configured commitment; failed transactions keep their custom
//! program error code and the preflight simulation logs.

use std::time::Duration;

use async_trait::async_trait;
use solana_commitment_config::CommitmentConfig;
use solana_rpc_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client_api::client_error::{Error as ClientError, ErrorKind as ClientErrorKind};
use solana_rpc_client_api::request::{RpcError, RpcResponseErrorData};
use solana_sdk::{
    hash::Hash,
    instruction::InstructionError,
    pubkey::Pubkey,
    signature::Signature,
    transaction::{Transaction, TransactionError},
};
use tracing::{debug, warn};

use crate::transport::{LedgerTransport, TransportError};

/// Extracts the custom program error code from a transaction error.
#[must_use]
pub fn custom_error_code(err: &TransactionError) -> Option<u32> {
    match err {
        TransactionError::InstructionError(_, InstructionError::Custom(code)) => Some(*code),
        _ => None,
    }
}

fn preflight_logs(kind: &ClientErrorKind) -> Vec<String> {
    match kind {
        ClientErrorKind::RpcError(RpcError::RpcResponseError {
            data: RpcResponseErrorData::SendTransactionPreflightFailure(simulation),
            ..
        }) => simulation.logs.clone().unwrap_or_default(),
        _ => Vec::new(),
    }
}

impl From<ClientError> for TransportError {
    fn from(err: ClientError) -> Self {
        let logs = preflight_logs(err.kind());
        if let Some(tx_err) = err.get_transaction_error() {
            return Self::Rejected {
                custom_code: custom_error_code(&tx_err),
                message: format!("{tx_err:?}: {err}"),
                logs,
            };
        }

        match err.kind() {
            ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_) => Self::Request(err.to_string()),
            ClientErrorKind::SerdeJson(_) => Self::Deserialization(err.to_string()),
            _ => Self::Rejected {
                custom_code: None,
                message: err.to_string(),
                logs,
            },
        }
    }
}

/// [`LedgerTransport`] over the JSON-RPC client.
pub struct RpcTransport {
    client: RpcClient,
}

impl RpcTransport {
    /// Creates a transport for `url`.
    ///
    /// `request_timeout` bounds each HTTP request and `confirm_timeout`
    /// bounds the wait for a submitted transaction to reach `commitment`.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        commitment: CommitmentConfig,
        request_timeout: Duration,
        confirm_timeout: Duration,
    ) -> Self {
        let client = RpcClient::new_with_timeouts_and_commitment(
            url.into(),
            request_timeout,
            commitment,
            confirm_timeout,
        );
        Self { client }
    }

    /// Returns the RPC URL.
    #[must_use]
    pub fn url(&self) -> String {
        self.client.url()
    }

    /// Returns the commitment level.
    #[must_use]
    pub fn commitment(&self) -> CommitmentConfig {
        self.client.commitment()
    }
}

impl std::fmt::Debug for RpcTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcTransport")
            .field("url", &self.client.url())
            .field("commitment", &self.client.commitment().commitment)
            .finish()
    }
}

#[async_trait]
impl LedgerTransport for RpcTransport {
    async fn latest_blockhash(&self) -> Result<Hash, TransportError> {
        Ok(self.client.get_latest_blockhash().await?)
    }

    async fn minimum_balance_for_rent_exemption(
        &self,
        space: u64,
    ) -> Result<u64, TransportError> {
        let space = usize::try_from(space)
            .map_err(|_| TransportError::Request(format!("account span {space} too large")))?;
        Ok(self
            .client
            .get_minimum_balance_for_rent_exemption(space)
            .await?)
    }

    async fn send_and_confirm(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, TransportError> {
        match self.client.send_and_confirm_transaction(transaction).await {
            Ok(signature) => {
                debug!(signature = %signature, "Transaction confirmed by RPC");
                Ok(signature)
            }
            Err(e) => {
                let err = TransportError::from(e);
                warn!(error = %err, "RPC submission failed");
                Err(err)
            }
        }
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, TransportError> {
        let response = self
            .client
            .get_account_with_commitment(address, self.client.commitment())
            .await?;
        Ok(response.value.map(|account| account.data))
    }
}
