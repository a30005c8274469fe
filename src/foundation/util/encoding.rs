use crate::foundation::WalletError;

/// Parses a fixed-width hex string, with or without a `0x` prefix.
pub fn parse_hex_array<const N: usize>(value: &str) -> Result<[u8; N], WalletError> {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    if trimmed.len() != N * 2 {
        return Err(WalletError::EncodingError(format!("expected {} hex chars, got {}", N * 2, trimmed.len())));
    }
    let bytes = hex::decode(trimmed)?;
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}
