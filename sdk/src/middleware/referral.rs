//! Referral fees.

use super::{AugmentContext, Middleware};
use crate::error::ProxyError;

/// Referral stage. The permissioned market pays no referral, so every action
/// passes through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferralMiddleware;

impl Middleware for ReferralMiddleware {
    fn name(&self) -> &'static str {
        "referral"
    }

    fn process(&self, _ctx: &mut AugmentContext<'_>) -> Result<(), ProxyError> {
        Ok(())
    }
}
