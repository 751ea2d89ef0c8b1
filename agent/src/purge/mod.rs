//! CDN cache invalidation

pub mod fastly;
pub mod notifier;
