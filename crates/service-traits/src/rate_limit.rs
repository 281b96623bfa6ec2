//! Rate-limit buckets (IP / session / apiKey). These sit outside the core
//! (§5): the core only enforces pool capacity via the acquisition queue.
//! Frontends consult this port before even reaching the core's call
//! surface.

use async_trait::async_trait;
use ipnet::IpNet;

use crate::ServiceResult;

#[derive(Debug, Clone)]
pub enum RateLimitKey {
    Ip(IpNet),
    Session(String),
    ApiKey(String),
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_after_ms: u64,
}

#[async_trait]
pub trait RateLimitPort: Send + Sync {
    async fn check(&self, key: &RateLimitKey) -> ServiceResult<RateLimitDecision>;
}

/// Always allows. A frontend with no configured limiter should behave as
/// if rate limiting simply isn't deployed, not reject every request.
pub struct NoopRateLimitPort;

#[async_trait]
impl RateLimitPort for NoopRateLimitPort {
    async fn check(&self, _key: &RateLimitKey) -> ServiceResult<RateLimitDecision> {
        Ok(RateLimitDecision {
            allowed: true,
            remaining: u32::MAX,
            reset_after_ms: 0,
        })
    }
}
