use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::MaterialId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MaterialError {
    #[error("material title cannot be empty")]
    EmptyTitle,

    #[error("material {material_id} is already {from}; only pending materials can be reviewed")]
    InvalidTransition {
        material_id: MaterialId,
        from: MaterialStatus,
    },
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Review status of an uploaded material.
///
/// `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialStatus {
    Pending,
    Approved,
    Rejected,
}

impl MaterialStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MaterialStatus::Pending => "pending",
            MaterialStatus::Approved => "approved",
            MaterialStatus::Rejected => "rejected",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, MaterialStatus::Pending)
    }
}

impl fmt::Display for MaterialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reviewer's verdict on a pending material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    #[must_use]
    pub fn target_status(self) -> MaterialStatus {
        match self {
            ReviewDecision::Approve => MaterialStatus::Approved,
            ReviewDecision::Reject => MaterialStatus::Rejected,
        }
    }
}

//
// ─── MATERIAL ──────────────────────────────────────────────────────────────────
//

/// A study material uploaded by a learner and awaiting (or past) review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedMaterial {
    #[serde(rename = "id")]
    pub material_id: MaterialId,
    pub title: String,
    pub uploaded_at: DateTime<Utc>,
    pub status: MaterialStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl UploadedMaterial {
    /// Create a freshly submitted, pending material.
    ///
    /// # Errors
    ///
    /// Returns `MaterialError::EmptyTitle` if the title is blank.
    pub fn submitted(
        material_id: MaterialId,
        title: impl Into<String>,
        uploaded_at: DateTime<Utc>,
    ) -> Result<Self, MaterialError> {
        let raw = title.into();
        let title = raw.trim();
        if title.is_empty() {
            return Err(MaterialError::EmptyTitle);
        }
        Ok(Self {
            material_id,
            title: title.to_owned(),
            uploaded_at,
            status: MaterialStatus::Pending,
            feedback: None,
        })
    }

    /// Move a pending material to its terminal status.
    ///
    /// Blank feedback is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns `MaterialError::InvalidTransition` unless the material is pending.
    pub fn review(
        &mut self,
        decision: ReviewDecision,
        feedback: Option<&str>,
    ) -> Result<(), MaterialError> {
        if self.status.is_terminal() {
            return Err(MaterialError::InvalidTransition {
                material_id: self.material_id,
                from: self.status,
            });
        }
        self.status = decision.target_status();
        if let Some(text) = feedback.map(str::trim).filter(|t| !t.is_empty()) {
            self.feedback = Some(text.to_owned());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn pending() -> UploadedMaterial {
        UploadedMaterial::submitted(MaterialId::generate(), " Cell biology notes ", fixed_now())
            .unwrap()
    }

    #[test]
    fn submitted_material_is_pending_with_trimmed_title() {
        let material = pending();
        assert_eq!(material.status, MaterialStatus::Pending);
        assert_eq!(material.title, "Cell biology notes");
        assert!(material.feedback.is_none());
    }

    #[test]
    fn blank_title_is_rejected() {
        let err = UploadedMaterial::submitted(MaterialId::generate(), "   ", fixed_now())
            .unwrap_err();
        assert_eq!(err, MaterialError::EmptyTitle);
    }

    #[test]
    fn review_is_terminal() {
        let mut material = pending();
        material
            .review(ReviewDecision::Approve, Some("Well structured"))
            .unwrap();
        assert_eq!(material.status, MaterialStatus::Approved);
        assert_eq!(material.feedback.as_deref(), Some("Well structured"));

        let err = material.review(ReviewDecision::Reject, None).unwrap_err();
        assert!(matches!(
            err,
            MaterialError::InvalidTransition {
                from: MaterialStatus::Approved,
                ..
            }
        ));
        assert_eq!(material.status, MaterialStatus::Approved);
    }

    #[test]
    fn blank_feedback_is_not_stored() {
        let mut material = pending();
        material.review(ReviewDecision::Reject, Some("  ")).unwrap();
        assert_eq!(material.status, MaterialStatus::Rejected);
        assert!(material.feedback.is_none());
    }

    #[test]
    fn persisted_layout_uses_id_and_lowercase_status() {
        let material = pending();
        let json = serde_json::to_value(&material).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json.get("id").is_some());
        assert!(json.get("uploadedAt").is_some());
        assert!(json.get("feedback").is_none());
    }
}
