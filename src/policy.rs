//! Content-visibility policy
//!
//! Pure projections from persisted entities to what a given caller is allowed
//! to see. Every read path goes through these functions; nothing here touches
//! storage or mutates its inputs, so the rules can be tested on their own.
use crate::auth::Intent;
use crate::case::{Case, Comment};
use crate::error::BrokerError;
use crate::proposal::Proposal;
use crate::types::{Actor, CaseStatus, ProposalStatus, Role, TimeStamp};
use crate::user::User;
use chrono::Utc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalView {
    pub id: String,
    pub title: String,
    pub brief_content: String,
    pub detailed_content: String,
    pub status: ProposalStatus,
    pub seller_id: String,
    pub created_at: TimeStamp<Utc>,
    pub updated_at: TimeStamp<Utc>,
    pub submitted_at: Option<TimeStamp<Utc>>,
    pub reviewed_at: Option<TimeStamp<Utc>>,
    pub reviewed_by: Option<String>,
    pub reject_reason: Option<String>,
}

/// `detailed_content` is `None` whenever the policy withholds it; the stored
/// record always keeps the full text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseView {
    pub id: String,
    pub proposal_id: String,
    pub seller_id: String,
    pub buyer_id: String,
    pub title: String,
    pub brief_content: String,
    pub detailed_content: Option<String>,
    pub status: CaseStatus,
    pub created_at: TimeStamp<Utc>,
    pub updated_at: TimeStamp<Utc>,
    pub interested_at: Option<TimeStamp<Utc>>,
    pub rejected_at: Option<TimeStamp<Utc>>,
    pub nda_signed_at: Option<TimeStamp<Utc>>,
    pub initial_message: Option<String>,
}

/// Row shape for sent/received listings. `counterpart` is the other party's
/// contact-safe display handle; full contact fields stay behind the NDA gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseSummary {
    pub id: String,
    pub proposal_id: String,
    pub title: String,
    pub status: CaseStatus,
    pub created_at: TimeStamp<Utc>,
    pub updated_at: TimeStamp<Utc>,
    pub counterpart: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentView {
    pub id: String,
    pub case_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: TimeStamp<Utc>,
    pub is_seller_comment: bool,
}

/// Both parties' addressable identity, released only after NDA signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactInfo {
    pub seller_email: String,
    pub buyer_email: String,
    pub seller_name: Option<String>,
    pub buyer_name: Option<String>,
}

/// Proposals are visible to their seller and to admins, nobody else.
pub fn project_proposal(proposal: &Proposal, viewer: &Actor) -> Result<ProposalView, BrokerError> {
    if viewer.id != proposal.seller_id && viewer.role != Role::Admin {
        return Err(BrokerError::denied(
            Intent::ProposalRead,
            &proposal.id,
            viewer,
        ));
    }

    Ok(ProposalView {
        id: proposal.id.clone(),
        title: proposal.title.clone(),
        brief_content: proposal.brief_content.clone(),
        detailed_content: proposal.detailed_content.clone(),
        status: proposal.status,
        seller_id: proposal.seller_id.clone(),
        created_at: proposal.created_at.clone(),
        updated_at: proposal.updated_at.clone(),
        submitted_at: proposal.submitted_at.clone(),
        reviewed_at: proposal.reviewed_at.clone(),
        reviewed_by: proposal.reviewed_by.clone(),
        reject_reason: proposal.reject_reason.clone(),
    })
}

/// Ordered visibility rules, first match wins:
/// 1. the case's seller sees everything;
/// 2. the named buyer sees everything once the NDA is signed;
/// 3. the named buyer otherwise sees the case with `detailed_content` withheld;
/// 4. anyone else is denied outright, never shown a degraded view.
pub fn project_case(case: &Case, viewer: &Actor) -> Result<CaseView, BrokerError> {
    if viewer.id == case.seller_id {
        return Ok(case_view(case, true));
    }
    if viewer.id == case.buyer_id {
        return Ok(case_view(case, case.status == CaseStatus::NdaSigned));
    }
    Err(BrokerError::denied(Intent::CaseRead, &case.id, viewer))
}

fn case_view(case: &Case, include_detail: bool) -> CaseView {
    CaseView {
        id: case.id.clone(),
        proposal_id: case.proposal_id.clone(),
        seller_id: case.seller_id.clone(),
        buyer_id: case.buyer_id.clone(),
        title: case.title.clone(),
        brief_content: case.brief_content.clone(),
        detailed_content: include_detail.then(|| case.detailed_content.clone()),
        status: case.status,
        created_at: case.created_at.clone(),
        updated_at: case.updated_at.clone(),
        interested_at: case.interested_at.clone(),
        rejected_at: case.rejected_at.clone(),
        nda_signed_at: case.nda_signed_at.clone(),
        initial_message: case.initial_message.clone(),
    }
}

pub fn summarize_case(case: &Case, counterpart: Option<String>) -> CaseSummary {
    CaseSummary {
        id: case.id.clone(),
        proposal_id: case.proposal_id.clone(),
        title: case.title.clone(),
        status: case.status,
        created_at: case.created_at.clone(),
        updated_at: case.updated_at.clone(),
        counterpart,
    }
}

/// `is_seller_comment` is derived at read time from the case record, never
/// stored on the comment.
pub fn project_comment(comment: &Comment, case: &Case) -> CommentView {
    CommentView {
        id: comment.id.clone(),
        case_id: comment.case_id.clone(),
        user_id: comment.user_id.clone(),
        content: comment.content.clone(),
        created_at: comment.created_at.clone(),
        is_seller_comment: comment.user_id == case.seller_id,
    }
}

/// Contact fields are released only to a party of the case and only once the
/// NDA is signed.
pub fn contact_info(
    case: &Case,
    seller: &User,
    buyer: &User,
    viewer: &Actor,
) -> Result<ContactInfo, BrokerError> {
    if viewer.id != case.seller_id && viewer.id != case.buyer_id {
        return Err(BrokerError::denied(Intent::CaseContactInfo, &case.id, viewer));
    }
    if case.status != CaseStatus::NdaSigned {
        return Err(BrokerError::invalid_case_state(
            Intent::CaseContactInfo,
            &case.id,
            case.status,
            CaseStatus::NdaSigned.as_str(),
        ));
    }

    Ok(ContactInfo {
        seller_email: seller.email.clone(),
        buyer_email: buyer.email.clone(),
        seller_name: seller.contact_person.clone(),
        buyer_name: buyer.contact_person.clone(),
    })
}

/// Contact-safe handle shown in listings: the email's local part only.
pub fn counterpart_handle(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    format!("{local}...")
}
