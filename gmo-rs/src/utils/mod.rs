//! Shared utilities for the gmo CLI

pub mod format;
pub mod table;
pub mod tree;

pub use format::*;
pub use table::*;
pub use tree::*;
