//! SDK error types.
//!
//! Provides the error taxonomy shared by address derivation, instruction
//! augmentation, market bootstrap and submission.

/// Custom error code returned by the validating program when the signer is not
/// authorized for the instruction.
pub const UNAUTHORIZED_SIGNER_CODE: u32 = 6001;

/// Custom error code returned by the validating program when the participant's
/// pass is inactive.
pub const CREDIX_PASS_INACTIVE_CODE: u32 = 6002;

/// Custom error code returned by the validating program when the participant
/// lacks base tokens for the requested amount.
pub const NOT_ENOUGH_BASE_TOKENS_CODE: u32 = 6011;

/// Message paired with [`NOT_ENOUGH_BASE_TOKENS_CODE`].
pub const NOT_ENOUGH_BASE_TOKENS_MSG: &str = "Not enough Base tokens.";

/// SDK errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    /// No off-curve address exists for the seed set across the whole bump range.
    #[error("no off-curve address found across the bump range")]
    ExhaustedBumpSpace,

    /// Malformed participant, mint, program id or seed input.
    #[error("invalid seed input: {0}")]
    InvalidSeedInput(String),

    /// The ledger reports the account already exists.
    #[error("account already initialized: {0}")]
    AccountAlreadyInitialized(String),

    /// The participant does not hold enough base tokens.
    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),

    /// The validating program rejected the participant's pass or credential.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Generic ledger or RPC failure.
    #[error("transaction rejected: {0}")]
    TransactionRejected(String),

    /// A referenced account does not exist on the ledger.
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// A bootstrap step was attempted out of order.
    #[error("bootstrap step {attempted} attempted before {expected}")]
    BootstrapOrder {
        /// Step that must run next.
        expected: String,
        /// Step that was attempted.
        attempted: String,
    },

    /// The initialized market does not record the accounts that were created.
    #[error("market state mismatch: {0}")]
    MarketStateMismatch(String),

    /// The event queue was still non-empty after the maximum number of rounds.
    #[error("event queue not drained after {rounds} rounds ({remaining} events left)")]
    DrainExhausted {
        /// Rounds attempted.
        rounds: u32,
        /// Events still queued.
        remaining: u32,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

impl ProxyError {
    /// Classifies a remote ledger failure.
    ///
    /// `custom_code` is the program's custom error code when the failure came
    /// from an instruction; `message` is the ledger's error text including any
    /// program logs.
    #[must_use]
    pub fn classify(custom_code: Option<u32>, message: &str) -> Self {
        let lowered = message.to_ascii_lowercase();
        if lowered.contains("already in use") {
            return Self::AccountAlreadyInitialized(message.to_string());
        }
        if lowered.contains("accountnotfound")
            || lowered.contains("account not found")
            || lowered.contains("could not find account")
        {
            return Self::AccountNotFound(message.to_string());
        }
        match custom_code {
            Some(NOT_ENOUGH_BASE_TOKENS_CODE) => {
                Self::InsufficientBalance(NOT_ENOUGH_BASE_TOKENS_MSG.to_string())
            }
            Some(UNAUTHORIZED_SIGNER_CODE | CREDIX_PASS_INACTIVE_CODE) => {
                Self::PermissionDenied(message.to_string())
            }
            _ => Self::TransactionRejected(message.to_string()),
        }
    }

    /// Returns true if the error was detected locally, before any network call.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(
            self,
            Self::ExhaustedBumpSpace
                | Self::InvalidSeedInput(_)
                | Self::BootstrapOrder { .. }
                | Self::Serialization(_)
        )
    }
}
