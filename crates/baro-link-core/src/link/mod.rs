//! Connectivity tracking and (re)establishment for the two delivery links:
//! network association and broker session.

mod establisher;
mod monitor;
mod session;

pub use establisher::*;
pub use monitor::*;
pub use session::*;
