//! On-disk container format.
//!
//! Each cache entry is a single file:
//!
//! ```text
//! [magic "PREP"][envelope length: u32 big-endian][bincode envelope][body]
//! ```
//!
//! The envelope names the object and carries flat `name=value` attributes
//! (mime type, serializer version, provenance, body checksum). The body is a
//! compressed block produced by [`crate::compress::compress_block`].

use std::collections::BTreeMap;

use prep_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, MissReason};
use crate::name::{ObjectName, RawObject};

/// Magic bytes identifying a prep cache entry.
const CONTAINER_MAGIC: [u8; 4] = *b"PREP";

/// Bytes preceding the envelope: magic plus the envelope length.
const FRAME_LEN: usize = 8;

/// Upper bound on a decoded envelope, guarding against corrupt length fields.
const ENVELOPE_LIMIT: usize = 1 << 20;

/// Mime type stamped on every entry.
pub const PREP_MIME_TYPE: &str = "application/x-prep-cache";

/// Attribute keys used in the envelope.
pub mod attr {
    /// Mime type of the body.
    pub const MIME_TYPE: &str = "mime_type";
    /// Serializer version tag.
    pub const PREP_VERSION: &str = "prep_version";
    /// Name of the source object in its database.
    pub const SOURCE_OBJECT: &str = "source_object";
    /// Path of the source database.
    pub const SOURCE_PATH: &str = "source_path";
    /// XXH3-128 checksum of the body.
    pub const BODY_CHECKSUM: &str = "body_checksum";
}

/// Metadata wrapped around an entry body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Name of the cached object.
    pub name: String,
    /// Flat attribute list.
    pub attributes: BTreeMap<String, String>,
}

impl Envelope {
    /// Builds the envelope for a body about to be committed.
    ///
    /// Provenance is best-effort: a source path that is not valid UTF-8 is
    /// simply omitted.
    pub fn for_body(name: &ObjectName, raw: &RawObject<'_>, version: &str, body: &[u8]) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(attr::MIME_TYPE.to_string(), PREP_MIME_TYPE.to_string());
        attributes.insert(attr::PREP_VERSION.to_string(), version.to_string());
        if !raw.name.is_empty() {
            attributes.insert(attr::SOURCE_OBJECT.to_string(), raw.name.to_string());
        }
        if let Some(path) = raw.source_path.and_then(|p| p.to_str()) {
            attributes.insert(attr::SOURCE_PATH.to_string(), path.to_string());
        }
        attributes.insert(
            attr::BODY_CHECKSUM.to_string(),
            ContentHash::from_bytes(body).to_string(),
        );
        Self {
            name: name.to_string(),
            attributes,
        }
    }

    /// Looks up an attribute.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// A parsed entry borrowing its body from the mapped file.
#[derive(Debug)]
pub struct Container<'a> {
    /// The decoded envelope.
    pub envelope: Envelope,
    /// The compressed body.
    pub body: &'a [u8],
}

impl<'a> Container<'a> {
    /// Splits raw entry bytes into envelope and body.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, MissReason> {
        if bytes.len() < FRAME_LEN || bytes[..4] != CONTAINER_MAGIC {
            return Err(MissReason::BadEnvelope);
        }
        let env_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        let env_end = FRAME_LEN
            .checked_add(env_len)
            .filter(|end| *end <= bytes.len())
            .ok_or(MissReason::BadEnvelope)?;

        let config = bincode::config::standard().with_limit::<ENVELOPE_LIMIT>();
        let (envelope, read): (Envelope, usize) =
            bincode::serde::decode_from_slice(&bytes[FRAME_LEN..env_end], config)
                .map_err(|_| MissReason::BadEnvelope)?;
        if read != env_len {
            return Err(MissReason::BadEnvelope);
        }

        Ok(Self {
            envelope,
            body: &bytes[env_end..],
        })
    }

    /// Checks that this entry is a prep entry for `name` with an intact body.
    ///
    /// Returns the serializer version tag on success. Whether the tag is
    /// acceptable is up to the codec.
    pub fn check(&self, name: &ObjectName) -> Result<&str, MissReason> {
        if self.envelope.name != name.as_str() {
            return Err(MissReason::NameMismatch);
        }
        if self.envelope.get(attr::MIME_TYPE) != Some(PREP_MIME_TYPE) {
            return Err(MissReason::MimeMismatch);
        }
        let version = self
            .envelope
            .get(attr::PREP_VERSION)
            .filter(|v| !v.is_empty())
            .ok_or(MissReason::VersionMismatch)?;
        let stored: ContentHash = self
            .envelope
            .get(attr::BODY_CHECKSUM)
            .and_then(|c| c.parse().ok())
            .ok_or(MissReason::BadEnvelope)?;
        if stored != ContentHash::from_bytes(self.body) {
            return Err(MissReason::ChecksumMismatch);
        }
        Ok(version)
    }
}

/// Serializes an envelope and body into entry bytes.
pub fn encode(envelope: &Envelope, body: &[u8]) -> Result<Vec<u8>, CacheError> {
    let env_bytes = bincode::serde::encode_to_vec(envelope, bincode::config::standard())
        .map_err(|e| CacheError::Codec {
            reason: format!("envelope encoding failed: {e}"),
        })?;
    let env_len = u32::try_from(env_bytes.len()).map_err(|_| CacheError::Codec {
        reason: "envelope too large".to_string(),
    })?;

    let mut out = Vec::with_capacity(FRAME_LEN + env_bytes.len() + body.len());
    out.extend_from_slice(&CONTAINER_MAGIC);
    out.extend_from_slice(&env_len.to_be_bytes());
    out.extend_from_slice(&env_bytes);
    out.extend_from_slice(body);
    Ok(out)
}
