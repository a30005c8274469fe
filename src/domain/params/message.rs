use crate::domain::model::TxKind;
use crate::domain::params::codec::encode_param;
use crate::domain::params::TxParameterID;
use crate::foundation::{Result, TxId};
use serde::{Deserialize, Serialize};

/// One peer message: a set of parameter writes for a single record.
///
/// The transport (sbbs) authenticates and encrypts; delivery is unordered and
/// receipt is idempotent with respect to the parameter store. Ids unknown to
/// this build are carried as raw bytes and persisted without driving state.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ParameterMessage {
    pub tx_id: TxId,
    pub kind: TxKind,
    pub params: Vec<(u8, Vec<u8>)>,
}

impl ParameterMessage {
    pub fn new(tx_id: TxId, kind: TxKind) -> Self {
        Self { tx_id, kind, params: Vec::new() }
    }

    pub fn push<T: Serialize>(&mut self, id: TxParameterID, value: &T) -> Result<&mut Self> {
        self.params.push((id.as_u8(), encode_param(value)?));
        Ok(self)
    }

    pub fn raw(&self, id: TxParameterID) -> Option<&[u8]> {
        self.params.iter().find(|(raw, _)| *raw == id.as_u8()).map(|(_, bytes)| bytes.as_slice())
    }

    pub fn contains(&self, id: TxParameterID) -> bool {
        self.raw(id).is_some()
    }
}
