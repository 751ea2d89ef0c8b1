//! Pending deployment queue

pub mod deploy_queue;
