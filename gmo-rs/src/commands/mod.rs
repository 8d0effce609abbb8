//! Command implementations

pub mod gmo;
