//! Page and size ceilings per subscription plan

use crate::error::{Error, Result};
use crate::types::{PlanTable, SubscriptionPlan};

/// Ceilings applied to one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaLimits {
    /// Slug of the tier the limits came from
    pub tier: String,
    pub max_pages: u32,
    pub max_file_size_bytes: u64,
}

/// Result of checking a parsed document against its limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    Within,
    Exceeded { pages: u32, max_pages: u32 },
}

/// Resolves limits from the caller's plan and the plan table
#[derive(Debug, Clone)]
pub struct QuotaPolicy {
    plans: PlanTable,
}

impl QuotaPolicy {
    pub fn new(plans: PlanTable) -> Self {
        Self { plans }
    }

    /// The caller's `pages_ceiling` wins; otherwise the tier for `is_active` applies.
    /// The size limit always comes from the tier.
    pub fn limits_for(&self, plan: &SubscriptionPlan) -> Result<QuotaLimits> {
        let tier = self.plans.tier_for(plan).ok_or_else(|| {
            Error::Config(format!(
                "plan table has no tier for {} subscriptions",
                if plan.is_active { "active" } else { "inactive" }
            ))
        })?;

        Ok(QuotaLimits {
            tier: tier.slug.clone(),
            max_pages: plan.pages_ceiling.unwrap_or(tier.pages_per_pdf),
            max_file_size_bytes: tier.max_file_size_bytes,
        })
    }

    pub fn check(limits: &QuotaLimits, page_count: u32) -> QuotaDecision {
        if page_count > limits.max_pages {
            QuotaDecision::Exceeded {
                pages: page_count,
                max_pages: limits.max_pages,
            }
        } else {
            QuotaDecision::Within
        }
    }
}
