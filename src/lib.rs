#![allow(clippy::similar_names)]
#![allow(clippy::module_name_repetitions)]

//! Asynchronous, Byzantine-resilient multi-party computation core for a
//! sealed-bid second-price (Vickrey) auction.
//!
//! Parties never see each other's bids. The winner and the price they pay
//! (the second-highest bid) are computed entirely over Shamir-shared values,
//! tolerating up to `f` actively malicious parties out of `n >= 3f + 1`.

pub mod circuit;
pub mod config;
pub mod error;
pub mod field;
pub mod net;
pub mod protocol;

pub use config::AuctionConfig;
pub use error::{Error, Result};
pub use protocol::Party;
