//! Upload-completion trigger payload

use serde::{Deserialize, Serialize};

use super::SubscriptionPlan;

/// Metadata resolved by the upload middleware before the trigger fires
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    pub user_id: String,
    pub subscription_plan: SubscriptionPlan,
}

/// A completed upload, delivered once (or more) by the storage provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadCompleteEvent {
    /// Opaque storage key, the idempotency key
    pub storage_key: String,
    pub display_name: String,
    /// HTTP(S) URL the bytes can be fetched from
    pub file_url: String,
    pub metadata: UploadMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_from_trigger_json() {
        let event: UploadCompleteEvent = serde_json::from_str(
            r#"{
                "storageKey": "5f1c-report.pdf",
                "displayName": "report.pdf",
                "fileUrl": "https://utfs.io/f/5f1c-report.pdf",
                "metadata": {
                    "userId": "kp_42",
                    "subscriptionPlan": { "isActive": false, "pagesCeiling": 5 }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(event.storage_key, "5f1c-report.pdf");
        assert_eq!(event.metadata.user_id, "kp_42");
        assert!(!event.metadata.subscription_plan.is_active);
        assert_eq!(event.metadata.subscription_plan.pages_ceiling, Some(5));
    }
}
