//! Binary identifier decoding.
//!
//! Active Directory stores `objectGUID` as 16 raw bytes whose first three
//! fields are little-endian, and `objectSid` as a variable-length binary SID.

use ic_directory::{DirectoryError, DirectoryResult};
use uuid::Uuid;

/// Decodes a binary `objectGUID`.
pub fn decode_guid(bytes: &[u8]) -> DirectoryResult<Uuid> {
    Uuid::from_slice_le(bytes)
        .map_err(|e| DirectoryError::mapping(format!("invalid objectGUID ({} bytes): {e}", bytes.len())))
}

/// Encodes a GUID string as an escaped binary filter value, for example
/// `(objectGUID=\3f\2a...)`.
pub fn encode_guid_filter(guid: &str) -> DirectoryResult<String> {
    let uuid = Uuid::parse_str(guid.trim())
        .map_err(|e| DirectoryError::mapping(format!("invalid GUID '{guid}': {e}")))?;
    Ok(escape_bytes(&uuid.to_bytes_le()))
}

/// Escapes every byte as `\xx`.
#[must_use]
pub fn escape_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("\\{b:02x}")).collect()
}

/// Decodes a binary SID into its `S-R-A-S1-S2-…` string form.
pub fn decode_sid(bytes: &[u8]) -> DirectoryResult<String> {
    let invalid = |reason: &str| DirectoryError::mapping(format!("invalid objectSid: {reason}"));

    if bytes.len() < 8 {
        return Err(invalid("shorter than 8 bytes"));
    }
    let (header, sub_authorities) = bytes.split_at(8);
    let revision = header[0];
    let count = usize::from(header[1]);
    if sub_authorities.len() != count * 4 {
        return Err(invalid("sub-authority count does not match length"));
    }

    let authority = header[2..8]
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    let authority = if authority < 1 << 32 {
        authority.to_string()
    } else {
        format!("0x{authority:012X}")
    };

    let mut parts = vec![format!("S-{revision}"), authority];
    parts.extend(
        sub_authorities
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]).to_string()),
    );
    Ok(parts.join("-"))
}

/// SID of the group with relative id `rid` in the domain of `sid`: the
/// last sub-authority replaced by `rid`.
pub fn sibling_sid(sid: &[u8], rid: u32) -> DirectoryResult<Vec<u8>> {
    decode_sid(sid)?;
    if sid[1] == 0 {
        return Err(DirectoryError::mapping("objectSid has no relative id"));
    }
    let mut sibling = sid.to_vec();
    let start = sibling.len() - 4;
    sibling[start..].copy_from_slice(&rid.to_le_bytes());
    Ok(sibling)
}
