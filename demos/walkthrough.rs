//! Full workflow walkthrough against a local sled database
//!
//! Run with: cargo run --example walkthrough

use deal_broker::case::CaseRequest;
use deal_broker::proposal::{ProposalDraft, ReviewDecision};
use deal_broker::service::BrokerService;
use deal_broker::types::Role;
use deal_broker::user::User;
use deal_broker::utils;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    let db = sled::open("walkthrough_db")?;

    if !db.is_empty() {
        db.clear()?;
    }

    let service = BrokerService::new(Arc::new(db))?;

    // a seller, a buyer and the reviewing admin
    let seller_user = User::new(
        utils::new_uuid_to_bech32("user_")?,
        "rosa@example.com",
        "rosa",
        Role::Seller,
    )
    .set_company_name("Riverside Bakery")
    .set_contact_person("Rosa");
    let buyer_user = User::new(
        utils::new_uuid_to_bech32("user_")?,
        "ines@example.com",
        "ines",
        Role::Buyer,
    )
    .set_contact_person("Ines");
    let admin_user = User::new(
        utils::new_uuid_to_bech32("user_")?,
        "meret@example.com",
        "meret",
        Role::Admin,
    );

    let seller = seller_user.actor();
    let buyer = buyer_user.actor();
    let admin = admin_user.actor();

    service.register_user(seller_user)?;
    service.register_user(buyer_user)?;
    service.register_user(admin_user)?;

    // seller drafts and submits, admin approves
    let draft = ProposalDraft::new()
        .set_title("Riverside bakery sale")
        .set_brief_content("Profitable bakery, owner retiring")
        .set_detailed_content("Revenue 420k, lease runs to 2031, 6 staff");
    let proposal = service.create_proposal(draft, &seller)?;
    let proposal = service.submit_proposal(&proposal.id, &seller)?;
    let proposal = service.review_proposal(&proposal.id, ReviewDecision::approve(), &admin)?;
    println!("proposal after review:\n{proposal:#?}");

    // seller opens a case toward the buyer
    let request =
        CaseRequest::new(&proposal.id, &buyer.id).set_initial_message("open books available");
    let case = service.create_case(request, &seller)?;

    // the buyer sees the brief only until the NDA is signed
    let before = service.get_case(&case.id, &buyer)?;
    println!(
        "buyer view before NDA: detailed_content = {:?}",
        before.detailed_content
    );

    service.express_interest(&case.id, &buyer)?;
    let after = service.sign_nda(&case.id, &buyer)?;
    println!(
        "buyer view after NDA: detailed_content = {:?}",
        after.detailed_content
    );

    let info = service.contact_info(&case.id, &buyer)?;
    println!("contact info:\n{info:#?}");

    service.add_comment(&case.id, "happy to answer questions", &seller)?;
    service.add_comment(&case.id, "what does the lease cost?", &buyer)?;
    let thread = service.case_comments(&case.id, &buyer)?;
    println!("comment thread (newest first):\n{thread:#?}");

    Ok(())
}
