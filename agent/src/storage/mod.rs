//! Configuration and on-disk layout

pub mod layout;
pub mod routing;
pub mod settings;
