//! Site Synchronizer Library
//!
//! Keeps website checkouts in sync with pubsub commit events and purges the
//! CDN after each deployment.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod events;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod pubsub;
pub mod purge;
pub mod queue;
pub mod storage;
pub mod utils;
pub mod workers;
