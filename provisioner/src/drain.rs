//! Event-queue drain loop.
//!
//! Cranks a permissioned market until its event queue is empty. Each round
//! reads the queue header, submits one consume-events instruction and waits
//! on the injected [`Clock`]. The loop gives up after `max_rounds`.

use std::time::Duration;

use async_trait::async_trait;
use credix_proxy_sdk::instructions::consume_events_permissioned;
use credix_proxy_sdk::{EventQueueHeader, ProxyError};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use tracing::{debug, info};

use super::submitter::SubmissionOrchestrator;

/// Time source for the drain loop.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Waits for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Tokio-backed clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Drain loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainConfig {
    /// Maximum consume-events rounds.
    pub max_rounds: u32,
    /// Events consumed per round.
    pub limit_per_round: u16,
    /// Pause between rounds.
    pub interval: Duration,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            max_rounds: 32,
            limit_per_round: 1,
            interval: Duration::from_millis(500),
        }
    }
}

/// Market accounts the drain loop touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainTarget {
    /// Venue program.
    pub dex_program_id: Pubkey,
    /// Market.
    pub market: Pubkey,
    /// Event queue.
    pub event_queue: Pubkey,
    /// Open orders accounts referenced by queued events.
    pub open_orders: Vec<Pubkey>,
}

/// Outcome of a successful drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Consume-events rounds submitted.
    pub rounds: u32,
    /// Events queued when draining started.
    pub initial_events: u32,
}

async fn queued_events(
    orchestrator: &SubmissionOrchestrator,
    event_queue: &Pubkey,
) -> Result<u32, ProxyError> {
    let data = orchestrator.require_account_data(event_queue).await?;
    Ok(EventQueueHeader::from_account_data(&data)?.count)
}

/// Drains the event queue of `target`.
///
/// # Errors
///
/// Returns `DrainExhausted` if events remain after `max_rounds` rounds, or
/// the first read or submission error.
pub async fn drain_event_queue(
    orchestrator: &SubmissionOrchestrator,
    clock: &dyn Clock,
    target: &DrainTarget,
    crank_authority: &Keypair,
    config: &DrainConfig,
) -> Result<DrainReport, ProxyError> {
    let initial_events = queued_events(orchestrator, &target.event_queue).await?;
    let mut remaining = initial_events;
    let mut rounds = 0u32;

    while remaining > 0 {
        if rounds >= config.max_rounds {
            return Err(ProxyError::DrainExhausted { rounds, remaining });
        }

        let ix = consume_events_permissioned(
            &target.dex_program_id,
            &target.open_orders,
            &target.market,
            &target.event_queue,
            &crank_authority.pubkey(),
            config.limit_per_round,
        )?;
        orchestrator
            .submit("consume_events", &[ix], &[crank_authority])
            .await?;
        orchestrator.metrics().record_drain_round();
        rounds += 1;

        clock.sleep(config.interval).await;
        remaining = queued_events(orchestrator, &target.event_queue).await?;
        debug!(round = rounds, remaining, "Drain round complete");
    }

    info!(
        market = %target.market,
        rounds,
        initial_events,
        "Event queue drained"
    );
    Ok(DrainReport {
        rounds,
        initial_events,
    })
}
