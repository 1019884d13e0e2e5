//! Instruction builders for every program the proxy talks to.
//!
//! Covers the system and token programs used to allocate accounts, the
//! order-book venue, the validating program and the proxy's own
//! administrative entrypoint.
//!
//! # Example
//!
//! ```rust,ignore
//! use credix_proxy_sdk::instructions::{DepositFundsBuilder};
//! use credix_proxy_sdk::ProxyConfig;
//! use solana_sdk::pubkey::Pubkey;
//!
//! let config = ProxyConfig::new(Pubkey::new_unique(), Pubkey::new_unique());
//!
//! let ix = DepositFundsBuilder::new(config)
//!     .investor(Pubkey::new_unique())
//!     .base_mint(Pubkey::new_unique())
//!     .amount(500_000_000)
//!     .build()
//!     .expect("should build instruction");
//! ```

pub mod credix;
pub mod dex;
pub mod proxy;
pub mod system;
pub mod token;

pub use credix::{
    create_credix_pass, initialize_market, update_credix_pass, DepositFundsBuilder, PassRoles,
};
pub use dex::{consume_events_permissioned, InitializeMarketBuilder, InitializeMarketParams};
pub use proxy::create_signing_pda;
pub use system::{create_account, SYSTEM_PROGRAM_ID};
pub use token::{initialize_account, ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID};
