// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Crambot gateway.
//!
//! This crate provides the adapter traits, the error type, the domain types
//! and the background task tracker shared by every other Crambot crate.

pub mod error;
pub mod tasks;
pub mod traits;
pub mod types;

pub use error::CrambotError;
pub use tasks::BackgroundTasks;
pub use types::{AdapterType, HealthStatus};

pub use traits::{
    BusinessApi, ChatTransport, ClassifierContext, DistributedCache, IntentClassifier,
    PluginAdapter, StorageAdapter,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;

    #[test]
    fn adapter_type_round_trips_through_strum() {
        use std::str::FromStr;

        for variant in [
            AdapterType::Transport,
            AdapterType::Storage,
            AdapterType::Cache,
            AdapterType::Classifier,
            AdapterType::BusinessApi,
            AdapterType::Observability,
        ] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn status_strings_match_store_values() {
        assert_eq!(ActionStatus::Pending.to_string(), "pending");
        assert_eq!(ActionStatus::Expired.to_string(), "expired");
        assert_eq!(RequestStatus::Approved.to_string(), "approved");
        assert_eq!(JobStatus::Processing.to_string(), "processing");
        assert_eq!(AuditStatus::Error.to_string(), "error");
        assert_eq!(CrossBotKind::LeaveRequest.to_string(), "leave_request");
        assert_eq!(UsageKind::AiCalls.to_string(), "ai_calls");
        assert_eq!(BusinessModule::Inclass.to_string(), "inclass");
    }

    #[test]
    fn wire_response_maps_into_closed_union() {
        let ok: WireApiResponse =
            serde_json::from_str(r#"{"success":true,"message":"已登記","data":{"n":1}}"#)
                .expect("parse");
        let ok = ApiResponse::from(ok);
        assert!(ok.is_success());
        assert_eq!(ok.message(), Some("已登記"));
        assert_eq!(ok.data().and_then(|d| d.get("n")), Some(&serde_json::json!(1)));

        let err: WireApiResponse = serde_json::from_str(
            r#"{"success":false,"error":"student_not_found","message":"找不到學生","suggestions":[{"name":"陳小明"}]}"#,
        )
        .expect("parse");
        match ApiResponse::from(err) {
            ApiResponse::Failure {
                error, suggestions, ..
            } => {
                assert_eq!(error, "student_not_found");
                assert_eq!(suggestions.len(), 1);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn failure_without_error_code_defaults_to_api_error() {
        let wire: WireApiResponse = serde_json::from_str(r#"{"success":false}"#).expect("parse");
        match ApiResponse::from(wire) {
            ApiResponse::Failure { error, message, .. } => {
                assert_eq!(error, "api_error");
                assert!(message.is_none());
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn bot_request_body_carries_tenant_first() {
        let mut params = Params::new();
        params.insert("student_name".into(), "陳小明".into());
        let req = ApiRequest::bot(BusinessModule::Inclass, "/attendance/leave", "t1", &params);
        assert_eq!(req.scope, ApiScope::Bot);
        assert_eq!(req.body.get("tenant_id"), Some(&serde_json::json!("t1")));
        assert_eq!(req.body.get("student_name"), Some(&serde_json::json!("陳小明")));
    }

    #[test]
    fn binding_resolves_context_for_bound_tenants_only() {
        let now = chrono::Utc::now();
        let binding = UserBinding {
            user_id: "u1".into(),
            bindings: vec![
                TenantBinding {
                    tenant_id: "t1".into(),
                    tenant_name: "大安補習班".into(),
                    role: "admin".into(),
                },
                TenantBinding {
                    tenant_id: "t2".into(),
                    tenant_name: "信義補習班".into(),
                    role: "staff".into(),
                },
            ],
            active_tenant_id: "t2".into(),
            active_tenant_name: "信義補習班".into(),
            created_at: now,
            last_active_at: now,
        };
        let active = binding.active_context().expect("active");
        assert_eq!(active.tenant_id, "t2");
        assert_eq!(active.role, "staff");
        assert!(binding.context_for("t1").is_some());
        assert!(binding.context_for("t3").is_none());
    }

    #[test]
    fn param_str_accepts_numbers_and_skips_blanks() {
        let mut params = Params::new();
        params.insert("amount".into(), serde_json::json!(5000));
        params.insert("note".into(), serde_json::json!("  "));
        assert_eq!(param_str(&params, "amount").as_deref(), Some("5000"));
        assert_eq!(param_str(&params, "note"), None);
        assert_eq!(param_str(&params, "missing"), None);
    }

    #[test]
    fn pending_action_expiry_is_lazy_and_status_aware() {
        let now = chrono::Utc::now();
        let mut action = PendingAction {
            id: "a1".into(),
            user_id: "u1".into(),
            chat_id: "c1".into(),
            tenant_id: "t1".into(),
            tenant_name: "大安補習班".into(),
            intent: "inclass.leave".into(),
            params: Params::new(),
            status: ActionStatus::Pending,
            confirm_message_id: None,
            created_at: now - chrono::Duration::minutes(10),
            expires_at: now - chrono::Duration::minutes(5),
        };
        assert!(action.is_expired_at(now));
        action.status = ActionStatus::Confirmed;
        assert!(!action.is_expired_at(now));
    }

    #[test]
    fn all_traits_are_object_safe() {
        fn _plugin(_: &dyn PluginAdapter) {}
        fn _transport(_: &dyn ChatTransport) {}
        fn _storage(_: &dyn StorageAdapter) {}
        fn _kv(_: &dyn DistributedCache) {}
        fn _classifier(_: &dyn IntentClassifier) {}
        fn _business(_: &dyn BusinessApi) {}
    }
}
