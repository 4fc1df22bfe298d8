//! Publish-or-persist decision for each measurement

mod coordinator;

pub use coordinator::*;
