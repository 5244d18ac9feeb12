//! Core types for set template reconciliation

use crate::diff::ModuleDiff;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A set instance: the parent whose modules are reconciled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetInst {
    #[serde(rename = "bk_biz_id")]
    pub biz_id: i64,
    #[serde(rename = "bk_set_id")]
    pub set_id: i64,
    pub set_template_id: i64,
    /// Display only
    #[serde(rename = "bk_set_name", default, skip_serializing_if = "Option::is_none")]
    pub set_name: Option<String>,
}

impl SetInst {
    pub fn new(biz_id: i64, set_id: i64, set_template_id: i64) -> Self {
        Self {
            biz_id,
            set_id,
            set_template_id,
            set_name: None,
        }
    }
}

impl fmt::Display for SetInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.set_name {
            Some(name) => write!(
                f,
                "{} (set {}, biz {}, template {})",
                name, self.set_id, self.biz_id, self.set_template_id
            ),
            None => write!(
                f,
                "set {} (biz {}, template {})",
                self.set_id, self.biz_id, self.set_template_id
            ),
        }
    }
}

/// Service template a new module is materialized from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTemplate {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub service_category_id: i64,
}

/// Result envelope returned by every topology server mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub result: bool,
    #[serde(rename = "bk_error_code", default)]
    pub code: i64,
    #[serde(rename = "bk_error_msg", default)]
    pub message: String,
}

impl ApiResponse {
    /// Successful response
    pub fn ok() -> Self {
        Self {
            result: true,
            code: 0,
            message: "success".to_string(),
        }
    }

    /// Failed response with the given code and message
    pub fn failed(code: i64, message: impl Into<String>) -> Self {
        Self {
            result: false,
            code,
            message: message.into(),
        }
    }

    /// Success requires both the flag and a zero code
    pub fn is_success(&self) -> bool {
        self.result && self.code == 0
    }

    /// Convert into `Err(Error::Remote)` unless successful
    pub fn into_result(self) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(Error::remote(self.code, self.message))
        }
    }
}

/// Body of a module creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateModule {
    #[serde(rename = "bk_module_name")]
    pub module_name: String,
    pub service_category_id: i64,
    pub service_template_id: i64,
    #[serde(rename = "bk_parent_id")]
    pub parent_id: i64,
    pub set_template_id: i64,
}

/// Body of a module update request; only the name is synced from templates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateModule {
    #[serde(rename = "bk_module_name")]
    pub module_name: String,
}

/// One set's pending module diffs, as the topology server reports them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDiff {
    #[serde(rename = "bk_set_id")]
    pub set_id: i64,
    pub set_detail: SetInst,
    #[serde(default)]
    pub module_diffs: Vec<ModuleDiff>,
}

/// What applying a single module diff did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOutcome {
    /// A module was created from its service template
    Created,
    /// A module was renamed
    Updated,
    /// A module was deleted
    Removed,
    /// Already converged, nothing sent
    Unchanged,
}

impl SyncOutcome {
    /// Check if the outcome represents a remote mutation
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Summary of a reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl SyncSummary {
    /// Total number of remote mutations made
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.removed
    }

    /// Total number of diffs processed
    pub fn total(&self) -> usize {
        self.total_changes() + self.unchanged
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &SyncSummary) {
        self.created += other.created;
        self.updated += other.updated;
        self.removed += other.removed;
        self.unchanged += other.unchanged;
    }

    /// Add an outcome to the summary
    pub fn add_outcome(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Created => self.created += 1,
            SyncOutcome::Updated => self.updated += 1,
            SyncOutcome::Removed => self.removed += 1,
            SyncOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_success_requires_flag_and_code() {
        assert!(ApiResponse::ok().is_success());
        assert!(!ApiResponse::failed(7, "nope").is_success());

        let flag_only = ApiResponse {
            result: true,
            code: 7,
            message: String::new(),
        };
        assert!(!flag_only.is_success());

        let code_only = ApiResponse {
            result: false,
            code: 0,
            message: String::new(),
        };
        assert!(!code_only.is_success());
    }

    #[test]
    fn test_api_response_into_result_carries_code() {
        let err = ApiResponse::failed(1199014, "module name duplicated")
            .into_result()
            .unwrap_err();
        match err {
            Error::Remote { code, message } => {
                assert_eq!(code, 1199014);
                assert_eq!(message, "module name duplicated");
            }
            other => panic!("Expected Error::Remote, got {other:?}"),
        }
    }

    #[test]
    fn test_api_response_deserialize_envelope() {
        let resp: ApiResponse = serde_json::from_str(
            r#"{"result": false, "bk_error_code": 7, "bk_error_msg": "denied", "data": null}"#,
        )
        .unwrap();
        assert_eq!(resp, ApiResponse::failed(7, "denied"));
    }

    #[test]
    fn test_create_module_wire_names() {
        let body = serde_json::to_value(CreateModule {
            module_name: "web".to_string(),
            service_category_id: 3,
            service_template_id: 9,
            parent_id: 10,
            set_template_id: 5,
        })
        .unwrap();
        assert_eq!(body["bk_module_name"], "web");
        assert_eq!(body["service_category_id"], 3);
        assert_eq!(body["service_template_id"], 9);
        assert_eq!(body["bk_parent_id"], 10);
        assert_eq!(body["set_template_id"], 5);
    }

    #[test]
    fn test_update_module_only_carries_name() {
        let body = serde_json::to_value(UpdateModule {
            module_name: "db".to_string(),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"bk_module_name": "db"}));
    }

    #[test]
    fn test_summary_add_and_merge() {
        let mut summary = SyncSummary::default();
        summary.add_outcome(SyncOutcome::Created);
        summary.add_outcome(SyncOutcome::Removed);
        summary.add_outcome(SyncOutcome::Unchanged);
        assert_eq!(summary.total_changes(), 2);
        assert_eq!(summary.total(), 3);

        let mut other = SyncSummary::default();
        other.add_outcome(SyncOutcome::Updated);
        summary.merge(&other);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.total(), 4);
    }

    #[test]
    fn test_set_display() {
        let mut set = SetInst::new(2, 10, 5);
        assert_eq!(set.to_string(), "set 10 (biz 2, template 5)");
        set.set_name = Some("gamesvr".to_string());
        assert!(set.to_string().starts_with("gamesvr"));
    }
}
