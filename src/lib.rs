//! Disclosure workflow engine for a mediated deal marketplace
//!
//! Sellers draft confidential proposals, admins review them, and approved
//! proposals are disclosed to individual buyers through cases whose
//! confidential content unlocks only once the buyer signs an NDA.

pub mod auth;
pub mod case;
pub mod error;
pub mod policy;
pub mod proposal;
pub mod service;
pub mod types;
pub mod user;
pub mod utils;
