//! Diagnostic logging.

use tracing::debug;

use super::{AugmentContext, Middleware};
use crate::error::ProxyError;

/// Logs each augmented instruction. Never mutates the context.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn name(&self) -> &'static str {
        "logger"
    }

    fn process(&self, ctx: &mut AugmentContext<'_>) -> Result<(), ProxyError> {
        debug!(
            action = %ctx.action,
            participant = %ctx.participant,
            market = %ctx.market,
            injected = ctx.injected.len(),
            forwarded = ctx.instruction.accounts.len(),
            prefix = ?ctx.prefix,
            "Augmented venue instruction"
        );
        Ok(())
    }
}
