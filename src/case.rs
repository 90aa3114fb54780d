//! Case and comment entities
use crate::error::BrokerError;
use crate::proposal::Proposal;
use crate::types::{CaseStatus, TimeStamp};
use chrono::Utc;

pub const INITIAL_MESSAGE_MAX_CHARS: usize = 500;
pub const COMMENT_MIN_CHARS: usize = 1;
pub const COMMENT_MAX_CHARS: usize = 1000;

/// One seller-to-buyer disclosure transaction. Content is copied from the
/// proposal when the case is created; later proposal edits never reach it.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Case {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub proposal_id: String,
    #[n(2)]
    pub seller_id: String,
    #[n(3)]
    pub buyer_id: String,
    #[n(4)]
    pub title: String,
    #[n(5)]
    pub brief_content: String,
    #[n(6)]
    pub detailed_content: String,
    #[n(7)]
    pub status: CaseStatus,
    #[n(8)]
    pub created_at: TimeStamp<Utc>,
    #[n(9)]
    pub updated_at: TimeStamp<Utc>,
    #[n(10)]
    pub interested_at: Option<TimeStamp<Utc>>,
    #[n(11)]
    pub rejected_at: Option<TimeStamp<Utc>>,
    #[n(12)]
    pub nda_signed_at: Option<TimeStamp<Utc>>,
    #[n(13)]
    pub initial_message: Option<String>,
}

impl Case {
    /// Snapshot the proposal's content into a fresh Created-status case.
    pub fn snapshot_from(
        id: String,
        proposal: &Proposal,
        buyer_id: &str,
        initial_message: Option<String>,
    ) -> Self {
        let now = TimeStamp::new();
        Self {
            id,
            proposal_id: proposal.id.clone(),
            seller_id: proposal.seller_id.clone(),
            buyer_id: buyer_id.to_string(),
            title: proposal.title.clone(),
            brief_content: proposal.brief_content.clone(),
            detailed_content: proposal.detailed_content.clone(),
            status: CaseStatus::Created,
            created_at: now.clone(),
            updated_at: now,
            interested_at: None,
            rejected_at: None,
            nda_signed_at: None,
            initial_message,
        }
    }
}

/// Seller's request to open a case against one buyer.
#[derive(Debug, Clone)]
pub struct CaseRequest {
    pub proposal_id: String,
    pub buyer_id: String,
    pub initial_message: Option<String>,
}

impl CaseRequest {
    pub fn new(proposal_id: &str, buyer_id: &str) -> Self {
        Self {
            proposal_id: proposal_id.to_string(),
            buyer_id: buyer_id.to_string(),
            initial_message: None,
        }
    }
    pub fn set_initial_message(mut self, message: &str) -> Self {
        self.initial_message = Some(message.to_string());
        self
    }
    pub fn validate(&self) -> Result<(), BrokerError> {
        if let Some(message) = &self.initial_message {
            if message.chars().count() > INITIAL_MESSAGE_MAX_CHARS {
                return Err(BrokerError::validation(
                    "initial_message",
                    format!("must be at most {INITIAL_MESSAGE_MAX_CHARS} characters"),
                ));
            }
        }
        Ok(())
    }
}

/// Append-only message on a case. Never edited, never deleted.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub case_id: String,
    #[n(2)]
    pub user_id: String,
    #[n(3)]
    pub content: String,
    #[n(4)]
    pub created_at: TimeStamp<Utc>,
}

pub fn validate_comment_content(content: &str) -> Result<(), BrokerError> {
    let chars = content.chars().count();
    if chars < COMMENT_MIN_CHARS {
        return Err(BrokerError::validation("content", "must not be empty"));
    }
    if chars > COMMENT_MAX_CHARS {
        return Err(BrokerError::validation(
            "content",
            format!("must be at most {COMMENT_MAX_CHARS} characters"),
        ));
    }
    Ok(())
}
