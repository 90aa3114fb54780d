//! Proposal entity and its draft/patch shapes
use crate::error::BrokerError;
use crate::types::{ProposalStatus, TimeStamp};
use chrono::Utc;

/// A seller's confidential listing. `detailed_content` is never cleared;
/// what leaves the engine is decided by the visibility policy alone.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub title: String,
    #[n(2)]
    pub brief_content: String,
    #[n(3)]
    pub detailed_content: String,
    #[n(4)]
    pub status: ProposalStatus,
    #[n(5)]
    pub seller_id: String,
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
    #[n(7)]
    pub updated_at: TimeStamp<Utc>,
    #[n(8)]
    pub submitted_at: Option<TimeStamp<Utc>>,
    #[n(9)]
    pub reviewed_at: Option<TimeStamp<Utc>>,
    #[n(10)]
    pub reviewed_by: Option<String>,
    #[n(11)]
    pub reject_reason: Option<String>,
}

// Also used for constructing drafts before an id or owner exists
#[derive(Debug, Default)]
pub struct ProposalDraft {
    title: Option<String>,
    brief_content: Option<String>,
    detailed_content: Option<String>,
}

impl ProposalDraft {
    /// Construct a new builder object, this becomes the basis for a draft
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }
    pub fn set_brief_content(mut self, brief_content: &str) -> Self {
        self.brief_content = Some(brief_content.to_string());
        self
    }
    pub fn set_detailed_content(mut self, detailed_content: &str) -> Self {
        self.detailed_content = Some(detailed_content.to_string());
        self
    }
    // Checks fields, then materialises a Draft-status proposal owned by the seller
    pub fn validate_and_finalise(
        self,
        id: String,
        seller_id: &str,
    ) -> Result<Proposal, BrokerError> {
        let title = require_text(self.title, "title")?;
        let brief_content = require_text(self.brief_content, "brief_content")?;
        let detailed_content = require_text(self.detailed_content, "detailed_content")?;

        let now = TimeStamp::new();
        Ok(Proposal {
            id,
            title,
            brief_content,
            detailed_content,
            status: ProposalStatus::Draft,
            seller_id: seller_id.to_string(),
            created_at: now.clone(),
            updated_at: now,
            submitted_at: None,
            reviewed_at: None,
            reviewed_by: None,
            reject_reason: None,
        })
    }
}

fn require_text(value: Option<String>, field: &'static str) -> Result<String, BrokerError> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text),
        Some(_) => Err(BrokerError::validation(field, "must not be blank")),
        None => Err(BrokerError::validation(field, "is not set")),
    }
}

/// Partial field merge for Draft-status proposals.
#[derive(Debug, Default)]
pub struct ProposalPatch {
    title: Option<String>,
    brief_content: Option<String>,
    detailed_content: Option<String>,
}

impl ProposalPatch {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }
    pub fn set_brief_content(mut self, brief_content: &str) -> Self {
        self.brief_content = Some(brief_content.to_string());
        self
    }
    pub fn set_detailed_content(mut self, detailed_content: &str) -> Self {
        self.detailed_content = Some(detailed_content.to_string());
        self
    }
    /// Merge the set fields into `proposal`. Unset fields are left alone.
    pub fn apply(&self, proposal: &mut Proposal) -> Result<(), BrokerError> {
        if let Some(title) = &self.title {
            proposal.title = non_blank(title, "title")?;
        }
        if let Some(brief_content) = &self.brief_content {
            proposal.brief_content = non_blank(brief_content, "brief_content")?;
        }
        if let Some(detailed_content) = &self.detailed_content {
            proposal.detailed_content = non_blank(detailed_content, "detailed_content")?;
        }
        proposal.updated_at = TimeStamp::new();
        Ok(())
    }
}

fn non_blank(text: &str, field: &'static str) -> Result<String, BrokerError> {
    if text.trim().is_empty() {
        return Err(BrokerError::validation(field, "must not be blank"));
    }
    Ok(text.to_string())
}

/// Outcome of an admin review pass.
#[derive(Debug, Clone)]
pub struct ReviewDecision {
    pub approved: bool,
    pub reject_reason: Option<String>,
}

impl ReviewDecision {
    pub fn approve() -> Self {
        Self {
            approved: true,
            reject_reason: None,
        }
    }
    pub fn reject(reason: Option<&str>) -> Self {
        Self {
            approved: false,
            reject_reason: reason.map(str::to_string),
        }
    }
}
