//! Rate Limiter (C6): per-tenant token bucket with dynamic rpm/burst.
//!
//! Buckets live in a concurrent map with per-entry locking (`dashmap`), so
//! two tenants never contend on the same lock and a single tenant's requests
//! serialize only against each other.

use std::sync::Mutex;
use std::time::Instant;

use dashmap::DashMap;
use gateway_types::model::TenantContext;

#[derive(Debug)]
struct Bucket {
	rpm_limit: u32,
	burst_capacity: u32,
	tokens: f64,
	last_refill: Instant,
}

impl Bucket {
	fn new(rpm_limit: u32, burst_capacity: u32) -> Self {
		Bucket {
			rpm_limit: rpm_limit.max(1),
			burst_capacity: burst_capacity.max(1),
			tokens: f64::from(burst_capacity.max(1)),
			last_refill: Instant::now(),
		}
	}

	/// Reconciles the bucket's stored limits with the tenant's current
	/// policy. A capacity decrease clamps the token balance down; it never
	/// grows it.
	fn reconcile(&mut self, rpm_limit: u32, burst_capacity: u32) {
		let rpm_limit = rpm_limit.max(1);
		let burst_capacity = burst_capacity.max(1);
		if self.rpm_limit != rpm_limit || self.burst_capacity != burst_capacity {
			self.rpm_limit = rpm_limit;
			self.burst_capacity = burst_capacity;
			if f64::from(burst_capacity) < self.tokens {
				self.tokens = f64::from(burst_capacity);
			}
		}
	}

	fn refill(&mut self, now: Instant) {
		let elapsed = now.saturating_duration_since(self.last_refill);
		if elapsed.as_nanos() > 0 {
			let rate_per_nanosecond = f64::from(self.rpm_limit) / 60.0 * 1e-9;
			let grown = self.tokens + elapsed.as_nanos() as f64 * rate_per_nanosecond;
			self.tokens = grown.min(f64::from(self.burst_capacity));
			self.last_refill = now;
		}
	}

	fn try_consume(&mut self) -> bool {
		if self.tokens >= 1.0 {
			self.tokens -= 1.0;
			true
		} else {
			false
		}
	}
}

#[derive(Debug, Default)]
pub struct RateLimiter {
	buckets: DashMap<String, Mutex<Bucket>>,
}

impl RateLimiter {
	pub fn new() -> Self {
		RateLimiter::default()
	}

	/// Admits or rejects the request for `context.tenantId`, creating the
	/// bucket on first use. (P5, P6)
	pub fn try_consume(&self, context: &TenantContext) -> bool {
		let burst_capacity = context.quota_policy.burst_capacity();
		let rpm_limit = context.quota_policy.rpm_limit;

		let entry = self
			.buckets
			.entry(context.tenant_id.clone())
			.or_insert_with(|| Mutex::new(Bucket::new(rpm_limit, burst_capacity)));

		// Poisoned-mutex recovery mirrors the teacher's `lock!` macro
		// convention: a panic inside the critical section should not wedge
		// the bucket forever.
		let mut bucket = entry.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
		bucket.reconcile(rpm_limit, burst_capacity);
		bucket.refill(Instant::now());
		bucket.try_consume()
	}

	#[cfg(test)]
	fn bucket_count(&self) -> usize {
		self.buckets.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use gateway_types::model::{Plan, QuotaPolicy};

	fn context(tenant_id: &str, rpm_limit: u32, burst_multiplier: f64) -> TenantContext {
		TenantContext {
			tenant_id: tenant_id.to_string(),
			user_id: "u1".to_string(),
			plan: Plan::Basic,
			quota_policy: QuotaPolicy { rpm_limit, tpm_limit: None, monthly_token_cap: None, burst_multiplier },
		}
	}

	#[test]
	fn admits_up_to_burst_capacity_then_rejects() {
		let limiter = RateLimiter::new();
		let ctx = context("demo", 2, 1.0);
		assert!(limiter.try_consume(&ctx));
		assert!(limiter.try_consume(&ctx));
		assert!(!limiter.try_consume(&ctx));
	}

	#[test]
	fn separate_tenants_have_independent_buckets() {
		let limiter = RateLimiter::new();
		let a = context("a", 1, 1.0);
		let b = context("b", 1, 1.0);
		assert!(limiter.try_consume(&a));
		assert!(!limiter.try_consume(&a));
		assert!(limiter.try_consume(&b));
		assert_eq!(limiter.bucket_count(), 2);
	}

	#[test]
	fn policy_decrease_clamps_tokens_not_grows() {
		let limiter = RateLimiter::new();
		let generous = context("demo", 100, 2.0); // burst capacity 200
		assert!(limiter.try_consume(&generous));
		let strict = context("demo", 1, 1.0); // burst capacity 1
		// Tokens were ~199 before the policy tightened; reconcile must clamp
		// to the new capacity rather than allow that headroom through.
		assert!(limiter.try_consume(&strict));
		assert!(!limiter.try_consume(&strict));
	}

	#[test]
	fn never_creates_zero_capacity_bucket() {
		let limiter = RateLimiter::new();
		let degenerate = context("demo", 0, 0.0);
		// Even a pathological policy floors to capacity 1, so exactly one
		// request is admitted before rejection.
		assert!(limiter.try_consume(&degenerate));
		assert!(!limiter.try_consume(&degenerate));
	}

	proptest::proptest! {
		#[test]
		fn prop_rate_limit_bound(rpm in 1u32..120, burst_mult in 1.0f64..5.0) {
			let limiter = RateLimiter::new();
			let ctx = context("demo", rpm, burst_mult);
			let expected = ctx.quota_policy.burst_capacity();
			let mut admitted = 0u32;
			for _ in 0..(expected + 5) {
				if limiter.try_consume(&ctx) {
					admitted += 1;
				}
			}
			proptest::prop_assert_eq!(admitted, expected);
		}
	}
}

// vim: ts=4
