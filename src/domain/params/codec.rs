//! Value encoding for the parameter store.
//!
//! Values are length-prefixed bincode buffers; the store itself is indifferent
//! to the type. A buffer that fails to decode as the requested type is treated
//! the same as an absent key.

use crate::foundation::{Result, WalletError};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub fn encode_param<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let body = bincode::serialize(value)?;
    let mut buf = Vec::with_capacity(4 + body.len());
    buf.extend_from_slice(&(body.len() as u32).to_le_bytes());
    buf.extend_from_slice(&body);
    Ok(buf)
}

pub fn decode_param<T: DeserializeOwned>(buf: &[u8]) -> Option<T> {
    if buf.len() < 4 {
        return None;
    }
    let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    let body = buf.get(4..)?;
    if body.len() != len {
        return None;
    }
    bincode::deserialize(body).ok()
}

pub fn decode_param_mandatory<T: DeserializeOwned>(buf: &[u8], param: &str) -> Result<T> {
    decode_param(buf).ok_or_else(|| WalletError::missing_parameter(param))
}
