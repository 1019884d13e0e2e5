//! Credix Proxy SDK - client-side layer for the Credix permissioned market.
//!
//! Lets a permission-gated participant trade on an unmodified order-book venue
//! by routing every venue instruction through the permissioned market proxy.
//! The crate is pure: it derives addresses and builds instructions but never
//! talks to the network.
//!
//! # Modules
//!
//! - [`pda`] — canonical address derivation and every named address
//! - [`middleware`] — the augmentation pipeline ([`MarketProxy`])
//! - [`bootstrap`] — three-step market listing ([`MarketBootstrapper`])
//! - [`instructions`] — builders for the system, token, venue, validating and
//!   proxy programs
//! - [`state`] — views over venue, token and pass accounts
//!
//! # Example
//!
//! ```rust,ignore
//! use credix_proxy_sdk::{ActionKind, MarketProxy, ProxyConfig};
//!
//! let config = ProxyConfig::new(gatekeeper_network, lp_mint);
//! let proxy = MarketProxy::new(config)?;
//! let augmented = proxy.augment(ActionKind::NewOrder, &participant, &market, &venue_ix)?;
//! ```

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod instructions;
pub mod middleware;
pub mod pda;
pub mod state;

pub use bootstrap::{
    BootstrapStage, BootstrapStep, ListedMarket, MarketBootstrapper, MarketKeys, MarketListing,
    RentSchedule,
};
pub use config::ProxyConfig;
pub use error::ProxyError;
pub use middleware::{ActionKind, AugmentedInstruction, MarketProxy};
pub use pda::{derive, derive_vault_owner, CredixPdas};
pub use state::{CredixPassView, EventQueueHeader, MarketStateView, TokenAccountView};
