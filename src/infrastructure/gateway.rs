//! Outbound port of the negotiation driver.
//!
//! Replies come back as parameter writes (`TransactionRegistered`,
//! `KernelProofHeight`, `KernelUnconfirmedHeight`) through the wallet
//! service; tips arrive as reactor events.

use crate::domain::params::ParameterMessage;
use crate::domain::transaction::Transaction;
use crate::foundation::{KernelId, TxId, WalletId};

pub trait NegotiatorGateway: Send + Sync {
    /// Ships a parameter set to the peer; `false` means the transport refused
    /// the message outright.
    fn send_tx_parameters(&self, peer: &WalletId, msg: ParameterMessage) -> bool;

    /// Submits the finished transaction to the node.
    fn register_tx(&self, tx_id: &TxId, transaction: &Transaction);

    /// Asks the node for an inclusion proof of the kernel.
    fn confirm_kernel(&self, tx_id: &TxId, kernel_id: &KernelId);
}
