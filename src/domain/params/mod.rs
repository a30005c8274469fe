//! Typed parameter keys and their wire encoding.
//!
//! Every durable fact about a negotiation record is a `(TxParameterID, bytes)`
//! pair in the parameter store; peer messages are sets of the same pairs.

pub mod codec;
mod id;
mod message;

pub use codec::{decode_param, encode_param};
pub use id::TxParameterID;
pub use message::ParameterMessage;
