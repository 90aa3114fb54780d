//! Declarative authorization table, evaluated before every operation
use crate::error::BrokerError;
use crate::types::{Actor, Role};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    ProposalCreate,
    ProposalUpdate,
    ProposalSubmit,
    ProposalReview,
    ProposalResubmit,
    ProposalArchive,
    ProposalDelete,
    ProposalRead,
    ProposalList,
    ProposalListAll,
    CaseCreate,
    CaseExpressInterest,
    CaseReject,
    CaseSignNda,
    CaseRead,
    CaseListSent,
    CaseListReceived,
    CaseContactInfo,
    CommentCreate,
    CommentList,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::ProposalCreate => "proposal.create",
            Intent::ProposalUpdate => "proposal.update",
            Intent::ProposalSubmit => "proposal.submit",
            Intent::ProposalReview => "proposal.review",
            Intent::ProposalResubmit => "proposal.resubmit",
            Intent::ProposalArchive => "proposal.archive",
            Intent::ProposalDelete => "proposal.delete",
            Intent::ProposalRead => "proposal.read",
            Intent::ProposalList => "proposal.list",
            Intent::ProposalListAll => "proposal.list_all",
            Intent::CaseCreate => "case.create",
            Intent::CaseExpressInterest => "case.express_interest",
            Intent::CaseReject => "case.reject",
            Intent::CaseSignNda => "case.sign_nda",
            Intent::CaseRead => "case.read",
            Intent::CaseListSent => "case.list_sent",
            Intent::CaseListReceived => "case.list_received",
            Intent::CaseContactInfo => "case.contact_info",
            Intent::CommentCreate => "comment.create",
            Intent::CommentList => "comment.list",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Party identifiers of the entity an intent touches. Creation intents have
/// no stored entity yet and pass an empty scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scope<'a> {
    pub seller_id: Option<&'a str>,
    pub buyer_id: Option<&'a str>,
}

impl<'a> Scope<'a> {
    pub fn none() -> Self {
        Self::default()
    }
    pub fn proposal(seller_id: &'a str) -> Self {
        Self {
            seller_id: Some(seller_id),
            buyer_id: None,
        }
    }
    pub fn case(seller_id: &'a str, buyer_id: &'a str) -> Self {
        Self {
            seller_id: Some(seller_id),
            buyer_id: Some(buyer_id),
        }
    }
}

/// What an intent demands of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// any active caller holding the given role
    HasRole(Role),
    /// the seller that owns the entity in scope
    Owner,
    /// the owning seller, or any admin
    OwnerOrAdmin,
    /// seller role and owner of the proposal in scope
    SellerOwner,
    /// the buyer the case is addressed to
    NamedBuyer,
    /// either party of the case in scope
    Party,
}

/// The single source of authorization truth: intent -> requirement.
pub fn rule_for(intent: Intent) -> Rule {
    use Intent::*;

    match intent {
        ProposalCreate | ProposalList | CaseListSent => Rule::HasRole(Role::Seller),
        ProposalUpdate | ProposalSubmit | ProposalResubmit | ProposalDelete => Rule::Owner,
        ProposalReview | ProposalListAll => Rule::HasRole(Role::Admin),
        ProposalArchive | ProposalRead => Rule::OwnerOrAdmin,
        CaseCreate => Rule::SellerOwner,
        CaseExpressInterest | CaseReject | CaseSignNda => Rule::NamedBuyer,
        CaseListReceived => Rule::HasRole(Role::Buyer),
        CaseRead | CaseContactInfo | CommentCreate | CommentList => Rule::Party,
    }
}

/// Evaluate the table entry for `intent` against the caller and the entity's
/// party scope. `entity_id` only feeds the error payload.
pub fn authorize(
    intent: Intent,
    actor: &Actor,
    scope: Scope<'_>,
    entity_id: &str,
) -> Result<(), BrokerError> {
    let allowed = actor.active
        && match rule_for(intent) {
            Rule::HasRole(role) => actor.role == role,
            Rule::Owner => scope.seller_id == Some(actor.id.as_str()),
            Rule::OwnerOrAdmin => {
                actor.role == Role::Admin || scope.seller_id == Some(actor.id.as_str())
            }
            Rule::SellerOwner => {
                actor.role == Role::Seller && scope.seller_id == Some(actor.id.as_str())
            }
            Rule::NamedBuyer => scope.buyer_id == Some(actor.id.as_str()),
            Rule::Party => {
                scope.seller_id == Some(actor.id.as_str())
                    || scope.buyer_id == Some(actor.id.as_str())
            }
        };

    if allowed {
        Ok(())
    } else {
        warn!(intent = intent.as_str(), caller = %actor.id, entity = entity_id, "authorization denied");
        Err(BrokerError::denied(intent, entity_id, actor))
    }
}
