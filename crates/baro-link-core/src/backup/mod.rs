//! Local fallback for payloads that could not be delivered live

pub mod sd_card;
mod store;

pub use sd_card::{FixedTimeSource, SdCardVolume};
pub use store::*;
