//! Subscription plans and the page-quota table

use serde::{Deserialize, Serialize};

/// Plan resolved by the caller for the uploading user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPlan {
    /// Active paid subscription
    pub is_active: bool,
    /// Per-document page ceiling already resolved by the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages_ceiling: Option<u32>,
}

/// One tier of the plan table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanTier {
    /// Display name ("Free", "Pro")
    pub name: String,
    /// Stable identifier ("free", "pro")
    pub slug: String,
    /// Monthly upload quota (enforced elsewhere)
    pub quota: u32,
    /// Maximum pages per document
    pub pages_per_pdf: u32,
    /// Maximum uploaded file size
    pub max_file_size_bytes: u64,
}

/// Fixed plan table passed to the pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanTable {
    /// Slug of the tier applied to active subscriptions
    pub paid_slug: String,
    /// Slug of the tier applied to everyone else
    pub free_slug: String,
    pub tiers: Vec<PlanTier>,
}

impl Default for PlanTable {
    fn default() -> Self {
        Self {
            paid_slug: "pro".to_string(),
            free_slug: "free".to_string(),
            tiers: vec![
                PlanTier {
                    name: "Free".to_string(),
                    slug: "free".to_string(),
                    quota: 10,
                    pages_per_pdf: 5,
                    max_file_size_bytes: 4 * 1024 * 1024,
                },
                PlanTier {
                    name: "Pro".to_string(),
                    slug: "pro".to_string(),
                    quota: 50,
                    pages_per_pdf: 25,
                    max_file_size_bytes: 16 * 1024 * 1024,
                },
            ],
        }
    }
}

impl PlanTable {
    /// Look up a tier by slug
    pub fn tier(&self, slug: &str) -> Option<&PlanTier> {
        self.tiers.iter().find(|t| t.slug == slug)
    }

    /// Tier that applies to a plan: paid when the subscription is active
    pub fn tier_for(&self, plan: &SubscriptionPlan) -> Option<&PlanTier> {
        if plan.is_active {
            self.tier(&self.paid_slug)
        } else {
            self.tier(&self.free_slug)
        }
    }

    /// Check that both referenced tiers exist
    pub fn validate(&self) -> std::result::Result<(), String> {
        for slug in [&self.paid_slug, &self.free_slug] {
            if self.tier(slug).is_none() {
                return Err(format!("plan table has no tier with slug '{}'", slug));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_matches_tiers() {
        let table = PlanTable::default();
        assert!(table.validate().is_ok());

        let free = table.tier_for(&SubscriptionPlan { is_active: false, pages_ceiling: None }).unwrap();
        assert_eq!(free.pages_per_pdf, 5);
        assert_eq!(free.quota, 10);

        let pro = table.tier_for(&SubscriptionPlan { is_active: true, pages_ceiling: None }).unwrap();
        assert_eq!(pro.pages_per_pdf, 25);
        assert_eq!(pro.max_file_size_bytes, 16 * 1024 * 1024);
    }

    #[test]
    fn test_validate_rejects_missing_tier() {
        let table = PlanTable {
            paid_slug: "enterprise".to_string(),
            ..PlanTable::default()
        };
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_plan_deserializes_from_camel_case() {
        let plan: SubscriptionPlan =
            serde_json::from_str(r#"{"isActive": true, "pagesCeiling": 25}"#).unwrap();
        assert!(plan.is_active);
        assert_eq!(plan.pages_ceiling, Some(25));

        let plan: SubscriptionPlan = serde_json::from_str(r#"{"isActive": false}"#).unwrap();
        assert_eq!(plan.pages_ceiling, None);
    }
}
