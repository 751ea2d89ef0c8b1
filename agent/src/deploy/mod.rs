//! Deployment module

pub mod checkout;
pub mod engine;
pub mod process;
pub mod validate;
pub mod vcs;
