//! Authority resolution.

use tracing::trace;

use super::{AugmentContext, Middleware, ResolvedAuthorities};
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::pda::{derive_market_authority, derive_open_orders, CredixPdas};

/// Resolves the deployment authorities and the participant's market accounts.
///
/// Leaves the instruction untouched; later middlewares read
/// [`AugmentContext::authorities`].
#[derive(Debug, Clone)]
pub struct AuthorityMiddleware {
    config: ProxyConfig,
}

impl AuthorityMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub fn new(config: ProxyConfig) -> Self {
        Self { config }
    }
}

impl Middleware for AuthorityMiddleware {
    fn name(&self) -> &'static str {
        "authority"
    }

    fn process(&self, ctx: &mut AugmentContext<'_>) -> Result<(), ProxyError> {
        let pdas = CredixPdas::derive(&self.config)?;
        let (market_authority, _) = derive_market_authority(
            &self.config.proxy_program_id,
            &self.config.dex_program_id,
            &ctx.market,
        )?;
        let (open_orders, _) = derive_open_orders(
            &self.config.proxy_program_id,
            &self.config.dex_program_id,
            &ctx.market,
            &ctx.participant,
        )?;

        trace!(
            market = %ctx.market,
            market_authority = %market_authority,
            open_orders = %open_orders,
            "Resolved market authorities"
        );

        ctx.authorities = Some(ResolvedAuthorities {
            global_market_state: pdas.global_market_state,
            signing_authority: pdas.signing_authority,
            permission_authority: pdas.permission_authority,
            permission_authority_bump: pdas.permission_authority_bump,
            market_authority,
            open_orders,
        });
        Ok(())
    }
}
