//! Inbound event handling

pub mod ancestor;
pub mod normalizer;
