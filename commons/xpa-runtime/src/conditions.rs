use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionType {
    Ready,
    Synced,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// The fixed set of reasons written by the reconciler. Health consumers
/// depend on these strings.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionReason {
    Creating,
    Available,
    Deleting,
    Unavailable,
    ReconcileSuccess,
    ReconcileError,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: ConditionType,
    pub status: ConditionStatus,
    pub reason: ConditionReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        rename = "lastTransitionTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_transition_time: Option<String>,
}

impl Condition {
    pub fn new(
        type_: ConditionType,
        status: ConditionStatus,
        reason: ConditionReason,
    ) -> Self {
        Self {
            type_,
            status,
            reason,
            message: None,
            last_transition_time: Some(Utc::now().to_rfc3339()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn equal_ignoring_time(&self, other: &Condition) -> bool {
        self.type_ == other.type_
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

pub fn available() -> Condition {
    Condition::new(
        ConditionType::Ready,
        ConditionStatus::True,
        ConditionReason::Available,
    )
}

pub fn creating() -> Condition {
    Condition::new(
        ConditionType::Ready,
        ConditionStatus::False,
        ConditionReason::Creating,
    )
}

pub fn deleting() -> Condition {
    Condition::new(
        ConditionType::Ready,
        ConditionStatus::False,
        ConditionReason::Deleting,
    )
}

pub fn unavailable() -> Condition {
    Condition::new(
        ConditionType::Ready,
        ConditionStatus::False,
        ConditionReason::Unavailable,
    )
}

pub fn reconcile_success() -> Condition {
    Condition::new(
        ConditionType::Synced,
        ConditionStatus::True,
        ConditionReason::ReconcileSuccess,
    )
}

pub fn reconcile_error(err: &dyn std::error::Error) -> Condition {
    Condition::new(
        ConditionType::Synced,
        ConditionStatus::False,
        ConditionReason::ReconcileError,
    )
    .with_message(err.to_string())
}
