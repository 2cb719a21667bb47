pub mod access;
pub mod analysis;
pub mod crypto;
pub mod ledger;
pub mod state;
pub mod validation;
