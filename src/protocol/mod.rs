//! The Byzantine-resilient subprotocol stack: reliable broadcast, binary
//! agreement, a common-coin beacon, agreement on a common subset, complete
//! secret sharing, and the per-party runtime composing them.

pub mod aba;
pub mod acs;
pub mod auction;
pub mod beacon;
pub mod css;
pub mod party;
pub mod rbc;

pub use aba::Aba;
pub use acs::Acs;
pub use beacon::Beacon;
pub use css::Css;
pub use party::Party;
pub use rbc::Rbc;
