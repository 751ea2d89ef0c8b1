//! pubsub event stream

pub mod client;
