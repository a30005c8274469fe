use crate::foundation::{FailureReason, WalletError};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// User-level status of a record. Persisted under `TxParameterID::Status`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[repr(u8)]
pub enum TxStatus {
    Pending = 0,
    InProgress = 1,
    Registering = 2,
    Completed = 3,
    Failed = 4,
    Canceled = 5,
}

/// Sub-state of the negotiation itself. Persisted under
/// `TxParameterID::State`; both roles run the same machine.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, PartialOrd, Ord, Serialize)]
#[repr(u8)]
pub enum NegotiationState {
    Initial = 0,
    Invitation = 1,
    InvitationConfirmation = 2,
    Registration = 3,
    KernelConfirmation = 4,
}

const VALID_STATUS_TRANSITIONS: &[(TxStatus, TxStatus)] = &[
    (TxStatus::Pending, TxStatus::InProgress),
    (TxStatus::Pending, TxStatus::Failed),
    (TxStatus::Pending, TxStatus::Canceled),
    (TxStatus::InProgress, TxStatus::Registering),
    (TxStatus::InProgress, TxStatus::Failed),
    (TxStatus::InProgress, TxStatus::Canceled),
    (TxStatus::Registering, TxStatus::Completed),
    (TxStatus::Registering, TxStatus::Failed),
    (TxStatus::Registering, TxStatus::Canceled),
];

pub fn is_terminal(status: TxStatus) -> bool {
    matches!(status, TxStatus::Completed | TxStatus::Failed | TxStatus::Canceled)
}

pub fn validate_status_transition(from: TxStatus, to: TxStatus) -> bool {
    from == to || VALID_STATUS_TRANSITIONS.contains(&(from, to))
}

pub fn ensure_valid_status_transition(from: TxStatus, to: TxStatus) -> Result<(), WalletError> {
    if validate_status_transition(from, to) {
        Ok(())
    } else {
        warn!("invalid status transition from_status={:?} to_status={:?}", from, to);
        Err(WalletError::InvalidStateTransition { from: format!("{:?}", from), to: format!("{:?}", to) })
    }
}

pub fn log_status_transition(tx_id: &crate::foundation::TxId, from: TxStatus, to: TxStatus) {
    if from != to {
        info!("txo {} status transition from_status={:?} to_status={:?}", tx_id, from, to);
    }
}

/// Status as rendered to the user. `Expired` is the public face of
/// `Failed(TransactionExpired)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UserStatus {
    Pending,
    InProgress,
    Registering,
    Completed,
    Failed(FailureReason),
    Canceled,
    Expired,
}

pub fn user_status(status: TxStatus, reason: Option<FailureReason>) -> UserStatus {
    match status {
        TxStatus::Pending => UserStatus::Pending,
        TxStatus::InProgress => UserStatus::InProgress,
        TxStatus::Registering => UserStatus::Registering,
        TxStatus::Completed => UserStatus::Completed,
        TxStatus::Canceled => UserStatus::Canceled,
        TxStatus::Failed => match reason {
            Some(FailureReason::TransactionExpired) => UserStatus::Expired,
            Some(reason) => UserStatus::Failed(reason),
            None => UserStatus::Failed(FailureReason::Unknown),
        },
    }
}
