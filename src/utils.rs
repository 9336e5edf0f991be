use anyhow::{bail, Context, Result};
use prost::Message;

/// The token used to delimit the segments of a hierarchical name.
pub const HIERARCHY_TOKEN: &str = ".";

/// Encode the given u64 as an array of big-endian bytes.
///
/// Log indices are stored under these keys so that sled's lexicographical ordering matches
/// numeric ordering.
pub fn encode_u64(val: u64) -> [u8; 8] {
    val.to_be_bytes()
}

/// Decode the given bytes as a u64.
pub fn decode_u64(val: &[u8]) -> Result<u64> {
    match val {
        [b0, b1, b2, b3, b4, b5, b6, b7] => Ok(u64::from_be_bytes([*b0, *b1, *b2, *b3, *b4, *b5, *b6, *b7])),
        _ => bail!("invalid byte array given to decode as u64, invalid len {} needed 8", val.len()),
    }
}

/// Encode the given model into a bytes vec.
pub fn encode_model<M: Message>(model: &M) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(model.encoded_len());
    model.encode(&mut buf).context("error serializing data model")?;
    Ok(buf)
}

/// Decode an object from the given buffer.
pub fn decode_model<M: Message + Default>(data: &[u8]) -> Result<M> {
    M::decode(data).context("error decoding data model")
}

/// Check that the given name is a well-formed hierarchy, returning a description of the problem
/// if it is not.
pub fn check_name_hierarchy(name: &str) -> Option<String> {
    for seg in name.split(HIERARCHY_TOKEN) {
        if seg.is_empty() {
            return Some(format!("name hierarchy `{}` is invalid, segments delimited by `.` may not be empty", name));
        }
    }
    None
}
