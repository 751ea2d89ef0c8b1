//! Integration tests for the site synchronizer

mod test_deploy;
mod test_pubsub;
mod test_queue;
