//! Pure domain logic (no I/O).

pub mod coin_select;
pub mod crypto;
pub mod model;
pub mod negotiation;
pub mod params;
pub mod payment_proof;
pub mod transaction;

pub use model::*;
pub use negotiation::{NegotiationState, TxStatus, UserStatus};
pub use params::{ParameterMessage, TxParameterID};
pub use transaction::{Transaction, TxInput, TxKernel, TxOutput};
