//! Records and their canonical byte encoding

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::hash::Hash;
use thiserror::Error;

/// A value that can be committed to as a tree leaf
pub trait Record {
    /// Caller-defined identity, unique within one record sequence
    type Key: Clone + Eq + Hash + fmt::Debug;

    fn key(&self) -> Self::Key;
}

#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("Record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Turns a record into the exact bytes that are hashed into its leaf.
///
/// The same codec must be used when building and when verifying, and
/// logically equal records must produce identical bytes.
pub trait RecordCodec<R: ?Sized> {
    fn encode(&self, record: &R) -> Result<Vec<u8>, EncodingError>;
}

impl<R: ?Sized, C: RecordCodec<R> + ?Sized> RecordCodec<R> for &C {
    fn encode(&self, record: &R) -> Result<Vec<u8>, EncodingError> {
        (**self).encode(record)
    }
}

/// Canonical JSON encoding of any serde-serializable record.
///
/// Object keys are sorted bytewise at every depth and no whitespace is
/// emitted, so field declaration or insertion order never affects the
/// output. Numbers keep serde_json's shortest round-trip formatting
/// (non-finite floats become `null`, as serde_json does). Map keys that
/// are not strings or integers fail to encode.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalJson;

impl CanonicalJson {
    pub fn encode_value(&self, value: &Value) -> Result<Vec<u8>, EncodingError> {
        let mut out = Vec::new();
        write_canonical(value, &mut out)?;
        Ok(out)
    }
}

impl<R: Serialize + ?Sized> RecordCodec<R> for CanonicalJson {
    fn encode(&self, record: &R) -> Result<Vec<u8>, EncodingError> {
        let value = serde_json::to_value(record)?;
        self.encode_value(&value)
    }
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) -> Result<(), EncodingError> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => serde_json::to_writer(&mut *out, s)?,
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)?;
                out.push(b':');
                write_canonical(item, out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}
