//! Bearer-token and master-key authentication (spec.md §4.2 "Auth Adjudicator").

pub mod adjudicator;
pub mod jwt;
pub mod master_key;

pub use adjudicator::{AuthAdjudicator, Credentials};
pub use jwt::TokenSigner;
