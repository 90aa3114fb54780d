//! Service layer API for the disclosure workflow
//!
//! Every operation is one load -> authorize -> precondition -> conditional
//! write unit. Status transitions go through sled's compare-and-swap so a
//! concurrent writer can never be silently overwritten: a missed swap reloads
//! the record and judges the precondition again against the winner's state.
use crate::auth::{self, Intent, Scope};
use crate::case::{self, Case, CaseRequest, Comment};
use crate::error::BrokerError;
use crate::policy::{self, CaseSummary, CaseView, CommentView, ContactInfo, ProposalView};
use crate::proposal::{Proposal, ProposalDraft, ProposalPatch, ReviewDecision};
use crate::types::{Actor, CaseStatus, ProposalStatus, TimeStamp};
use crate::user::User;
use crate::utils;
use std::sync::Arc;
use tracing::{debug, info};

pub struct BrokerService {
    proposals: sled::Tree,
    cases: sled::Tree,
    // (proposal, buyer) pair reservations; one case per pair
    case_index: sled::Tree,
    comments: sled::Tree,
    users: sled::Tree,
}

impl BrokerService {
    pub fn new(instance: Arc<sled::Db>) -> Result<Self, BrokerError> {
        Ok(Self {
            proposals: instance.open_tree("proposals")?,
            cases: instance.open_tree("cases")?,
            case_index: instance.open_tree("case_index")?,
            comments: instance.open_tree("comments")?,
            users: instance.open_tree("users")?,
        })
    }

    // USER DIRECTORY

    /// Register a directory record. Ids are unique; re-registration conflicts.
    pub fn register_user(&self, user: User) -> Result<(), BrokerError> {
        let bytes = encode_record(&user)?;
        match self
            .users
            .compare_and_swap(user.id.as_bytes(), None::<&[u8]>, Some(bytes))?
        {
            Ok(()) => Ok(()),
            Err(_) => Err(BrokerError::conflict("user", user.id)),
        }
    }

    fn load_user(&self, user_id: &str) -> Result<User, BrokerError> {
        let bytes = self
            .users
            .get(user_id.as_bytes())?
            .ok_or_else(|| BrokerError::not_found("user", user_id))?;
        decode_record(&bytes)
    }

    // PROPOSAL LIFECYCLE

    /// Open a new Draft-status proposal owned by the calling seller.
    pub fn create_proposal(
        &self,
        draft: ProposalDraft,
        actor: &Actor,
    ) -> Result<ProposalView, BrokerError> {
        auth::authorize(Intent::ProposalCreate, actor, Scope::none(), &actor.id)?;

        let id = utils::new_uuid_to_bech32("prop_").map_err(BrokerError::Infrastructure)?;
        let proposal = draft.validate_and_finalise(id, &actor.id)?;

        self.proposals
            .insert(proposal.id.as_bytes(), encode_record(&proposal)?)?;
        info!(proposal = %proposal.id, seller = %actor.id, "proposal created");

        policy::project_proposal(&proposal, actor)
    }

    pub fn get_proposal(
        &self,
        proposal_id: &str,
        actor: &Actor,
    ) -> Result<ProposalView, BrokerError> {
        let proposal = self.load_proposal(proposal_id)?;
        auth::authorize(
            Intent::ProposalRead,
            actor,
            Scope::proposal(&proposal.seller_id),
            proposal_id,
        )?;
        policy::project_proposal(&proposal, actor)
    }

    /// Merge fields into a Draft-status proposal.
    pub fn update_proposal(
        &self,
        proposal_id: &str,
        patch: ProposalPatch,
        actor: &Actor,
    ) -> Result<ProposalView, BrokerError> {
        let updated = swap_record(
            &self.proposals,
            "proposal",
            proposal_id,
            |current: &Proposal| {
                auth::authorize(
                    Intent::ProposalUpdate,
                    actor,
                    Scope::proposal(&current.seller_id),
                    proposal_id,
                )?;
                if current.status != ProposalStatus::Draft {
                    return Err(BrokerError::invalid_proposal_state(
                        Intent::ProposalUpdate,
                        proposal_id,
                        current.status,
                        ProposalStatus::Draft.as_str(),
                    ));
                }
                let mut next = current.clone();
                patch.apply(&mut next)?;
                Ok(next)
            },
        )?;
        debug!(proposal = proposal_id, "proposal fields merged");

        policy::project_proposal(&updated, actor)
    }

    /// Hand a Draft-status proposal to review.
    pub fn submit_proposal(
        &self,
        proposal_id: &str,
        actor: &Actor,
    ) -> Result<ProposalView, BrokerError> {
        let updated = swap_record(
            &self.proposals,
            "proposal",
            proposal_id,
            |current: &Proposal| {
                auth::authorize(
                    Intent::ProposalSubmit,
                    actor,
                    Scope::proposal(&current.seller_id),
                    proposal_id,
                )?;
                if current.status != ProposalStatus::Draft {
                    return Err(BrokerError::invalid_proposal_state(
                        Intent::ProposalSubmit,
                        proposal_id,
                        current.status,
                        ProposalStatus::Draft.as_str(),
                    ));
                }
                let mut next = current.clone();
                next.status = ProposalStatus::UnderReview;
                next.submitted_at = Some(TimeStamp::new());
                next.updated_at = TimeStamp::new();
                Ok(next)
            },
        )?;
        info!(proposal = proposal_id, "proposal submitted for review");

        policy::project_proposal(&updated, actor)
    }

    /// Approve or reject a proposal under review. Admin only.
    pub fn review_proposal(
        &self,
        proposal_id: &str,
        decision: ReviewDecision,
        actor: &Actor,
    ) -> Result<ProposalView, BrokerError> {
        let updated = swap_record(
            &self.proposals,
            "proposal",
            proposal_id,
            |current: &Proposal| {
                auth::authorize(
                    Intent::ProposalReview,
                    actor,
                    Scope::proposal(&current.seller_id),
                    proposal_id,
                )?;
                if current.status != ProposalStatus::UnderReview {
                    return Err(BrokerError::invalid_proposal_state(
                        Intent::ProposalReview,
                        proposal_id,
                        current.status,
                        ProposalStatus::UnderReview.as_str(),
                    ));
                }
                let mut next = current.clone();
                next.status = if decision.approved {
                    ProposalStatus::Approved
                } else {
                    ProposalStatus::Rejected
                };
                next.reviewed_at = Some(TimeStamp::new());
                next.reviewed_by = Some(actor.id.clone());
                next.updated_at = TimeStamp::new();
                if !decision.approved {
                    next.reject_reason = decision.reject_reason.clone();
                }
                Ok(next)
            },
        )?;
        info!(
            proposal = proposal_id,
            outcome = updated.status.as_str(),
            reviewer = %actor.id,
            "proposal reviewed"
        );

        policy::project_proposal(&updated, actor)
    }

    /// Put a rejected proposal back into Draft, clearing the reject reason.
    pub fn resubmit_proposal(
        &self,
        proposal_id: &str,
        actor: &Actor,
    ) -> Result<ProposalView, BrokerError> {
        let updated = swap_record(
            &self.proposals,
            "proposal",
            proposal_id,
            |current: &Proposal| {
                auth::authorize(
                    Intent::ProposalResubmit,
                    actor,
                    Scope::proposal(&current.seller_id),
                    proposal_id,
                )?;
                if current.status != ProposalStatus::Rejected {
                    return Err(BrokerError::invalid_proposal_state(
                        Intent::ProposalResubmit,
                        proposal_id,
                        current.status,
                        ProposalStatus::Rejected.as_str(),
                    ));
                }
                let mut next = current.clone();
                next.status = ProposalStatus::Draft;
                next.reject_reason = None;
                next.updated_at = TimeStamp::new();
                Ok(next)
            },
        )?;
        info!(proposal = proposal_id, "proposal returned to draft");

        policy::project_proposal(&updated, actor)
    }

    /// Archive an approved proposal. Terminal.
    pub fn archive_proposal(
        &self,
        proposal_id: &str,
        actor: &Actor,
    ) -> Result<ProposalView, BrokerError> {
        let updated = swap_record(
            &self.proposals,
            "proposal",
            proposal_id,
            |current: &Proposal| {
                auth::authorize(
                    Intent::ProposalArchive,
                    actor,
                    Scope::proposal(&current.seller_id),
                    proposal_id,
                )?;
                if current.status != ProposalStatus::Approved {
                    return Err(BrokerError::invalid_proposal_state(
                        Intent::ProposalArchive,
                        proposal_id,
                        current.status,
                        ProposalStatus::Approved.as_str(),
                    ));
                }
                let mut next = current.clone();
                next.status = ProposalStatus::Archived;
                next.updated_at = TimeStamp::new();
                Ok(next)
            },
        )?;
        info!(proposal = proposal_id, "proposal archived");

        policy::project_proposal(&updated, actor)
    }

    /// Remove a proposal that never went live. Draft and Rejected only.
    pub fn delete_proposal(&self, proposal_id: &str, actor: &Actor) -> Result<(), BrokerError> {
        remove_record(
            &self.proposals,
            "proposal",
            proposal_id,
            |current: &Proposal| {
                auth::authorize(
                    Intent::ProposalDelete,
                    actor,
                    Scope::proposal(&current.seller_id),
                    proposal_id,
                )?;
                match current.status {
                    ProposalStatus::Draft | ProposalStatus::Rejected => Ok(()),
                    status => Err(BrokerError::invalid_proposal_state(
                        Intent::ProposalDelete,
                        proposal_id,
                        status,
                        "draft or rejected",
                    )),
                }
            },
        )?;
        info!(proposal = proposal_id, "proposal deleted");
        Ok(())
    }

    /// The calling seller's proposals, newest first.
    pub fn seller_proposals(&self, actor: &Actor) -> Result<Vec<ProposalView>, BrokerError> {
        auth::authorize(Intent::ProposalList, actor, Scope::none(), &actor.id)?;

        let mut mine = Vec::new();
        for entry in self.proposals.iter() {
            let (_, bytes) = entry?;
            let proposal: Proposal = decode_record(&bytes)?;
            if proposal.seller_id == actor.id {
                mine.push(proposal);
            }
        }
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        mine.iter()
            .map(|proposal| policy::project_proposal(proposal, actor))
            .collect()
    }

    /// Admin listing, optionally narrowed to one status, newest first.
    pub fn proposals_by_status(
        &self,
        status: Option<ProposalStatus>,
        actor: &Actor,
    ) -> Result<Vec<ProposalView>, BrokerError> {
        auth::authorize(Intent::ProposalListAll, actor, Scope::none(), &actor.id)?;

        let mut found = Vec::new();
        for entry in self.proposals.iter() {
            let (_, bytes) = entry?;
            let proposal: Proposal = decode_record(&bytes)?;
            if status.is_none_or(|wanted| proposal.status == wanted) {
                found.push(proposal);
            }
        }
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        found
            .iter()
            .map(|proposal| policy::project_proposal(proposal, actor))
            .collect()
    }

    // CASE LIFECYCLE

    /// Open a disclosure case against one buyer, snapshotting the approved
    /// proposal's content. One case per (proposal, buyer) pair.
    pub fn create_case(
        &self,
        request: CaseRequest,
        actor: &Actor,
    ) -> Result<CaseView, BrokerError> {
        request.validate()?;

        let proposal = self.load_proposal(&request.proposal_id)?;
        auth::authorize(
            Intent::CaseCreate,
            actor,
            Scope::proposal(&proposal.seller_id),
            &request.proposal_id,
        )?;
        if proposal.status != ProposalStatus::Approved {
            return Err(BrokerError::invalid_proposal_state(
                Intent::CaseCreate,
                &request.proposal_id,
                proposal.status,
                ProposalStatus::Approved.as_str(),
            ));
        }

        let buyer = self.load_user(&request.buyer_id)?;
        if !buyer.is_active {
            return Err(BrokerError::validation("buyer_id", "buyer is not active"));
        }

        let case_id = utils::new_uuid_to_bech32("case_").map_err(BrokerError::Infrastructure)?;

        // reserve the (proposal, buyer) pair first; the reservation is the
        // uniqueness guarantee under concurrent creates
        let pair_key = case_pair_key(&request.proposal_id, &request.buyer_id);
        let reserved = self.case_index.compare_and_swap(
            pair_key.as_bytes(),
            None::<&[u8]>,
            Some(case_id.as_bytes()),
        )?;
        if reserved.is_err() {
            return Err(BrokerError::conflict(
                "case",
                format!(
                    "proposal {} / buyer {}",
                    request.proposal_id, request.buyer_id
                ),
            ));
        }

        let case = Case::snapshot_from(case_id, &proposal, &request.buyer_id, request.initial_message);
        self.cases
            .insert(case.id.as_bytes(), encode_record(&case)?)?;
        info!(case = %case.id, proposal = %case.proposal_id, buyer = %case.buyer_id, "case opened");

        policy::project_case(&case, actor)
    }

    /// Buyer signals interest. Created -> Interested.
    pub fn express_interest(&self, case_id: &str, actor: &Actor) -> Result<CaseView, BrokerError> {
        self.buyer_transition(
            case_id,
            actor,
            Intent::CaseExpressInterest,
            CaseStatus::Created,
            |next| {
                next.status = CaseStatus::Interested;
                next.interested_at = Some(TimeStamp::new());
            },
        )
    }

    /// Buyer declines the case. Created -> Rejected, terminal.
    pub fn reject_case(&self, case_id: &str, actor: &Actor) -> Result<CaseView, BrokerError> {
        self.buyer_transition(
            case_id,
            actor,
            Intent::CaseReject,
            CaseStatus::Created,
            |next| {
                next.status = CaseStatus::Rejected;
                next.rejected_at = Some(TimeStamp::new());
            },
        )
    }

    /// Buyer signs the NDA, unlocking the confidential content for this case.
    /// Interested -> NdaSigned, terminal.
    pub fn sign_nda(&self, case_id: &str, actor: &Actor) -> Result<CaseView, BrokerError> {
        self.buyer_transition(
            case_id,
            actor,
            Intent::CaseSignNda,
            CaseStatus::Interested,
            |next| {
                next.status = CaseStatus::NdaSigned;
                next.nda_signed_at = Some(TimeStamp::new());
            },
        )
    }

    fn buyer_transition<F>(
        &self,
        case_id: &str,
        actor: &Actor,
        intent: Intent,
        required: CaseStatus,
        mut apply: F,
    ) -> Result<CaseView, BrokerError>
    where
        F: FnMut(&mut Case),
    {
        let updated = swap_record(&self.cases, "case", case_id, |current: &Case| {
            auth::authorize(
                intent,
                actor,
                Scope::case(&current.seller_id, &current.buyer_id),
                case_id,
            )?;
            if current.status != required {
                return Err(BrokerError::invalid_case_state(
                    intent,
                    case_id,
                    current.status,
                    required.as_str(),
                ));
            }
            let mut next = current.clone();
            apply(&mut next);
            next.updated_at = TimeStamp::new();
            Ok(next)
        })?;
        info!(
            case = case_id,
            status = updated.status.as_str(),
            "case transitioned"
        );

        policy::project_case(&updated, actor)
    }

    pub fn get_case(&self, case_id: &str, actor: &Actor) -> Result<CaseView, BrokerError> {
        let case = self.load_case(case_id)?;
        auth::authorize(
            Intent::CaseRead,
            actor,
            Scope::case(&case.seller_id, &case.buyer_id),
            case_id,
        )?;
        policy::project_case(&case, actor)
    }

    /// Both parties' contact fields. NDA-signed cases only.
    pub fn contact_info(&self, case_id: &str, actor: &Actor) -> Result<ContactInfo, BrokerError> {
        let case = self.load_case(case_id)?;
        auth::authorize(
            Intent::CaseContactInfo,
            actor,
            Scope::case(&case.seller_id, &case.buyer_id),
            case_id,
        )?;

        let seller = self.load_user(&case.seller_id)?;
        let buyer = self.load_user(&case.buyer_id)?;
        policy::contact_info(&case, &seller, &buyer, actor)
    }

    /// Cases the calling seller has sent, newest first.
    pub fn sent_cases(&self, actor: &Actor) -> Result<Vec<CaseSummary>, BrokerError> {
        auth::authorize(Intent::CaseListSent, actor, Scope::none(), &actor.id)?;
        self.case_summaries(
            |case| case.seller_id == actor.id,
            |case| case.buyer_id.clone(),
        )
    }

    /// Cases addressed to the calling buyer, newest first.
    pub fn received_cases(&self, actor: &Actor) -> Result<Vec<CaseSummary>, BrokerError> {
        auth::authorize(Intent::CaseListReceived, actor, Scope::none(), &actor.id)?;
        self.case_summaries(
            |case| case.buyer_id == actor.id,
            |case| case.seller_id.clone(),
        )
    }

    fn case_summaries<P, C>(
        &self,
        mut belongs: P,
        mut counterpart_of: C,
    ) -> Result<Vec<CaseSummary>, BrokerError>
    where
        P: FnMut(&Case) -> bool,
        C: FnMut(&Case) -> String,
    {
        let mut rows = Vec::new();
        for entry in self.cases.iter() {
            let (_, bytes) = entry?;
            let case: Case = decode_record(&bytes)?;
            if !belongs(&case) {
                continue;
            }
            let handle = self
                .load_user(&counterpart_of(&case))
                .ok()
                .map(|user| policy::counterpart_handle(&user.email));
            rows.push(policy::summarize_case(&case, handle));
        }
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    // COMMENTS

    /// Append a comment to a case thread. Parties only; immutable afterwards.
    pub fn add_comment(
        &self,
        case_id: &str,
        content: &str,
        actor: &Actor,
    ) -> Result<CommentView, BrokerError> {
        let case = self.load_case(case_id)?;
        auth::authorize(
            Intent::CommentCreate,
            actor,
            Scope::case(&case.seller_id, &case.buyer_id),
            case_id,
        )?;
        case::validate_comment_content(content)?;

        let id = utils::new_uuid_to_bech32("cmt_").map_err(BrokerError::Infrastructure)?;
        let comment = Comment {
            id,
            case_id: case_id.to_string(),
            user_id: actor.id.clone(),
            content: content.to_string(),
            created_at: TimeStamp::new(),
        };
        // keyed under the case so one prefix scan returns the whole thread
        let key = format!("{case_id}/{}", comment.id);
        self.comments.insert(key.as_bytes(), encode_record(&comment)?)?;
        debug!(case = case_id, comment = %comment.id, "comment appended");

        Ok(policy::project_comment(&comment, &case))
    }

    /// The case's comment thread, newest first.
    pub fn case_comments(
        &self,
        case_id: &str,
        actor: &Actor,
    ) -> Result<Vec<CommentView>, BrokerError> {
        let case = self.load_case(case_id)?;
        auth::authorize(
            Intent::CommentList,
            actor,
            Scope::case(&case.seller_id, &case.buyer_id),
            case_id,
        )?;

        let mut thread = Vec::new();
        for entry in self.comments.scan_prefix(format!("{case_id}/").as_bytes()) {
            let (_, bytes) = entry?;
            let comment: Comment = decode_record(&bytes)?;
            thread.push(comment);
        }
        thread.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(thread
            .iter()
            .map(|comment| policy::project_comment(comment, &case))
            .collect())
    }

    fn load_proposal(&self, proposal_id: &str) -> Result<Proposal, BrokerError> {
        let bytes = self
            .proposals
            .get(proposal_id.as_bytes())?
            .ok_or_else(|| BrokerError::not_found("proposal", proposal_id))?;
        decode_record(&bytes)
    }

    fn load_case(&self, case_id: &str) -> Result<Case, BrokerError> {
        let bytes = self
            .cases
            .get(case_id.as_bytes())?
            .ok_or_else(|| BrokerError::not_found("case", case_id))?;
        decode_record(&bytes)
    }
}

fn case_pair_key(proposal_id: &str, buyer_id: &str) -> String {
    sha256::digest(format!("{proposal_id}/{buyer_id}"))
}

/// Load-validate-swap loop. `step` re-runs against the freshly loaded record
/// on every missed swap, so the precondition is always judged against the
/// exact bytes being replaced.
fn swap_record<T, F>(
    tree: &sled::Tree,
    entity: &'static str,
    id: &str,
    mut step: F,
) -> Result<T, BrokerError>
where
    T: minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()>,
    F: FnMut(&T) -> Result<T, BrokerError>,
{
    loop {
        let old_bytes = tree
            .get(id.as_bytes())?
            .ok_or_else(|| BrokerError::not_found(entity, id))?;
        let current: T = decode_record(&old_bytes)?;
        let next = step(&current)?;
        let new_bytes = encode_record(&next)?;

        match tree.compare_and_swap(id.as_bytes(), Some(&old_bytes), Some(new_bytes))? {
            Ok(()) => return Ok(next),
            Err(_) => {
                debug!(entity, id, "compare-and-swap missed, retrying");
                continue;
            }
        }
    }
}

/// Conditional delete with the same retry discipline as [`swap_record`].
fn remove_record<T, F>(
    tree: &sled::Tree,
    entity: &'static str,
    id: &str,
    mut check: F,
) -> Result<(), BrokerError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
    F: FnMut(&T) -> Result<(), BrokerError>,
{
    loop {
        let old_bytes = tree
            .get(id.as_bytes())?
            .ok_or_else(|| BrokerError::not_found(entity, id))?;
        let current: T = decode_record(&old_bytes)?;
        check(&current)?;

        match tree.compare_and_swap(id.as_bytes(), Some(&old_bytes), None::<Vec<u8>>)? {
            Ok(()) => return Ok(()),
            Err(_) => {
                debug!(entity, id, "compare-and-swap missed, retrying");
                continue;
            }
        }
    }
}

fn encode_record<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, BrokerError> {
    minicbor::to_vec(value)
        .map_err(|e| BrokerError::Infrastructure(anyhow::anyhow!("failed to encode record: {e}")))
}

fn decode_record<T>(bytes: &[u8]) -> Result<T, BrokerError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    minicbor::decode(bytes).map_err(|e| {
        BrokerError::Infrastructure(anyhow::anyhow!("failed to decode stored record: {e}"))
    })
}
