//! Credix Proxy Provisioner - submission and provisioning for the permissioned market.
//!
//! This crate sequences the proxy's transactions against a live ledger: it
//! lists markets, issues passes, deposits into the pool, submits proxied
//! trades and cranks the event queue. Every step waits for confirmation
//! before the next begins.
//!
//! # Components
//!
//! - [`config`]: Provisioner configuration
//! - [`transport`]: Ledger transport trait
//! - [`rpc`]: JSON-RPC transport
//! - [`submitter`]: Submission orchestrator
//! - [`bootstrap`]: Market bootstrap runner
//! - [`drain`]: Event-queue drain loop
//! - [`provision`]: Provisioning flows
//! - [`metrics`]: Submission metrics

pub mod bootstrap;
pub mod config;
pub mod drain;
pub mod metrics;
pub mod provision;
pub mod rpc;
pub mod submitter;
pub mod transport;

pub use bootstrap::{list_market, run_bootstrap};
pub use config::{ConfigError, ProvisionerConfig};
pub use drain::{drain_event_queue, Clock, DrainConfig, DrainReport, DrainTarget, TokioClock};
pub use metrics::SubmissionMetrics;
pub use provision::{deposit, issue_credix_pass, setup, submit_proxied, SetupParams, SetupReport};
pub use rpc::RpcTransport;
pub use submitter::SubmissionOrchestrator;
pub use transport::{LedgerTransport, TransportError};
