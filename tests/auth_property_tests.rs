//! Property-based tests for the authorization table
//!
//! `authorize` is a pure predicate over (intent, actor, scope), so the guard
//! can be exercised exhaustively without storage. The suite pins the
//! role/ownership semantics of each rule class for arbitrary callers.

use deal_broker::auth::{self, Intent, Scope};
use deal_broker::error::BrokerError;
use deal_broker::types::{Actor, Role};
use proptest::prelude::*;

const ALL_INTENTS: [Intent; 20] = [
    Intent::ProposalCreate,
    Intent::ProposalUpdate,
    Intent::ProposalSubmit,
    Intent::ProposalReview,
    Intent::ProposalResubmit,
    Intent::ProposalArchive,
    Intent::ProposalDelete,
    Intent::ProposalRead,
    Intent::ProposalList,
    Intent::ProposalListAll,
    Intent::CaseCreate,
    Intent::CaseExpressInterest,
    Intent::CaseReject,
    Intent::CaseSignNda,
    Intent::CaseRead,
    Intent::CaseListSent,
    Intent::CaseListReceived,
    Intent::CaseContactInfo,
    Intent::CommentCreate,
    Intent::CommentList,
];

// PROPERTY TEST STRATEGIES

fn role_strategy() -> impl Strategy<Value = Role> {
    (0u8..=2).prop_map(|i| match i {
        0 => Role::Admin,
        1 => Role::Seller,
        _ => Role::Buyer,
    })
}

fn intent_strategy() -> impl Strategy<Value = Intent> {
    (0usize..ALL_INTENTS.len()).prop_map(|i| ALL_INTENTS[i])
}

/// Strategy to generate a distinct (seller, buyer, stranger) id triple
fn party_ids_strategy() -> impl Strategy<Value = (String, String, String)> {
    "[a-z0-9]{8}".prop_map(|base| {
        (
            format!("user_s{base}"),
            format!("user_b{base}"),
            format!("user_x{base}"),
        )
    })
}

// PROPERTY TESTS
proptest! {
    /// Property: an inactive caller is denied every intent, whatever the
    /// role or scope.
    #[test]
    fn prop_inactive_caller_is_always_denied(
        intent in intent_strategy(),
        role in role_strategy(),
        (seller_id, buyer_id, _) in party_ids_strategy(),
    ) {
        let mut actor = Actor::new(seller_id.clone(), role);
        actor.active = false;
        let scope = Scope::case(&seller_id, &buyer_id);

        let res = auth::authorize(intent, &actor, scope, "entity_x");
        prop_assert!(matches!(res, Err(BrokerError::Permission { .. })), "expected Permission error, got {res:?}");
    }

    /// Property: review and the admin listing answer to the admin role
    /// alone; ownership of the scoped entity buys nothing.
    #[test]
    fn prop_admin_gate_ignores_ownership(
        role in role_strategy(),
        (seller_id, buyer_id, _) in party_ids_strategy(),
    ) {
        let actor = Actor::new(seller_id.clone(), role);
        let scope = Scope::case(&seller_id, &buyer_id);

        for intent in [Intent::ProposalReview, Intent::ProposalListAll] {
            let res = auth::authorize(intent, &actor, scope, "prop_x");
            prop_assert_eq!(res.is_ok(), role == Role::Admin);
        }
    }

    /// Property: owner-gated proposal intents follow the scope's seller id
    /// and ignore the caller's role.
    #[test]
    fn prop_owner_gate_follows_identity(
        role in role_strategy(),
        (seller_id, _, stranger_id) in party_ids_strategy(),
        caller_is_owner in prop::bool::ANY,
    ) {
        let caller_id = if caller_is_owner { &seller_id } else { &stranger_id };
        let actor = Actor::new(caller_id.clone(), role);
        let scope = Scope::proposal(&seller_id);

        for intent in [
            Intent::ProposalUpdate,
            Intent::ProposalSubmit,
            Intent::ProposalResubmit,
            Intent::ProposalDelete,
        ] {
            let res = auth::authorize(intent, &actor, scope, "prop_x");
            prop_assert_eq!(res.is_ok(), caller_is_owner);
        }
    }

    /// Property: buyer-side case transitions belong to the named buyer and
    /// nobody else, including the case's own seller.
    #[test]
    fn prop_buyer_transitions_require_the_named_buyer(
        role in role_strategy(),
        (seller_id, buyer_id, stranger_id) in party_ids_strategy(),
        caller_pick in 0u8..=2,
    ) {
        let caller_id = match caller_pick {
            0 => &seller_id,
            1 => &buyer_id,
            _ => &stranger_id,
        };
        let actor = Actor::new(caller_id.clone(), role);
        let scope = Scope::case(&seller_id, &buyer_id);

        for intent in [
            Intent::CaseExpressInterest,
            Intent::CaseReject,
            Intent::CaseSignNda,
        ] {
            let res = auth::authorize(intent, &actor, scope, "case_x");
            prop_assert_eq!(res.is_ok(), caller_pick == 1);
        }
    }

    /// Property: party-gated reads admit exactly the seller and the named
    /// buyer of the case.
    #[test]
    fn prop_party_gate_admits_both_sides(
        role in role_strategy(),
        (seller_id, buyer_id, stranger_id) in party_ids_strategy(),
        caller_pick in 0u8..=2,
    ) {
        let caller_id = match caller_pick {
            0 => &seller_id,
            1 => &buyer_id,
            _ => &stranger_id,
        };
        let actor = Actor::new(caller_id.clone(), role);
        let scope = Scope::case(&seller_id, &buyer_id);

        for intent in [
            Intent::CaseRead,
            Intent::CaseContactInfo,
            Intent::CommentCreate,
            Intent::CommentList,
        ] {
            let res = auth::authorize(intent, &actor, scope, "case_x");
            prop_assert_eq!(res.is_ok(), caller_pick < 2);
        }
    }

    /// Property: a denial names the intent and entity it refused, so the
    /// failure is self-documenting at the call site.
    #[test]
    fn prop_denial_is_self_documenting(
        intent in intent_strategy(),
        (seller_id, buyer_id, stranger_id) in party_ids_strategy(),
    ) {
        let mut actor = Actor::new(stranger_id, Role::Buyer);
        actor.active = false; // force a refusal for every intent
        let scope = Scope::case(&seller_id, &buyer_id);

        match auth::authorize(intent, &actor, scope, "entity_x") {
            Err(BrokerError::Permission { intent: named, id, .. }) => {
                prop_assert_eq!(named, intent);
                prop_assert_eq!(id, "entity_x");
            }
            other => prop_assert!(false, "expected permission error, got {:?}", other),
        }
    }
}
