//! Generic Access Profile: advertising data and radio parameters

pub mod advertising;
pub mod constants;
pub mod types;

pub use advertising::{decode, encode, AdvertisingPayload, Identifier};
pub use constants::*;
pub use types::*;
