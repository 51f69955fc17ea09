//! Storage codecs for session entities.
//!
//! The master record and authentication results have exactly one shape and
//! serialize directly with serde. SP sessions are a sealed variant set, so
//! their codecs go through an explicit dispatch table keyed by
//! [`SPSessionKind`]: each stored SP record is a small envelope
//! `{ kind, body }`, and decode looks the codec up by the envelope's kind.
//! The registry is immutable configuration injected at construction.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use keystone_storage::StorageError;

use crate::types::{BasicSPSession, SPSession, SPSessionKind, Saml2SPSession};

/// Persisted form of the master session record.
///
/// Carries the session's identity/activity state plus the cross-reference
/// lists naming which flow and service sub-records exist under the
/// session's context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMasterRecord {
    /// Canonical principal name, set once for the session's lifetime.
    pub principal_name: String,

    /// When the session was created.
    #[serde(with = "time::serde::rfc3339")]
    pub creation_instant: OffsetDateTime,

    /// Last recorded activity.
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity_instant: OffsetDateTime,

    /// Bound client address, if address binding is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<IpAddr>,

    /// Flow ids with a stored `AuthenticationResult` sub-record.
    #[serde(default)]
    pub flow_ids: Vec<String>,

    /// Service ids with a stored `SPSession` sub-record.
    #[serde(default)]
    pub service_ids: Vec<String>,
}

impl SessionMasterRecord {
    /// Encodes the record for storage.
    pub fn encode(&self) -> Result<String, StorageError> {
        serde_json::to_string(self).map_err(|e| StorageError::serialization(e.to_string()))
    }

    /// Decodes a stored record.
    pub fn decode(value: &str) -> Result<Self, StorageError> {
        serde_json::from_str(value).map_err(|e| StorageError::serialization(e.to_string()))
    }
}

/// Encodes a secondary-index id list.
///
/// A structured JSON list rather than a joined string, so session ids may
/// contain any character and decode failures are explicit.
pub fn encode_index_list(ids: &[String]) -> Result<String, StorageError> {
    serde_json::to_string(ids).map_err(|e| StorageError::serialization(e.to_string()))
}

/// Decodes a secondary-index id list.
pub fn decode_index_list(value: &str) -> Result<Vec<String>, StorageError> {
    serde_json::from_str(value).map_err(|e| StorageError::serialization(e.to_string()))
}

/// Codec for one [`SPSession`] variant.
pub trait SPSessionCodec: Send + Sync {
    /// The variant this codec handles.
    fn kind(&self) -> SPSessionKind;

    /// Encodes the session body (without the envelope).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the session is not of this
    /// codec's kind or fails to encode.
    fn encode(&self, sp_session: &SPSession) -> Result<String, StorageError>;

    /// Decodes a session body produced by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` on malformed input.
    fn decode(&self, body: &str) -> Result<SPSession, StorageError>;
}

/// JSON codec for [`SPSession::Basic`].
#[derive(Debug, Default)]
pub struct BasicSPSessionCodec;

impl SPSessionCodec for BasicSPSessionCodec {
    fn kind(&self) -> SPSessionKind {
        SPSessionKind::Basic
    }

    fn encode(&self, sp_session: &SPSession) -> Result<String, StorageError> {
        match sp_session {
            SPSession::Basic(s) => {
                serde_json::to_string(s).map_err(|e| StorageError::serialization(e.to_string()))
            }
            other => Err(StorageError::serialization(format!(
                "basic codec cannot encode {} session",
                other.kind()
            ))),
        }
    }

    fn decode(&self, body: &str) -> Result<SPSession, StorageError> {
        let session: BasicSPSession =
            serde_json::from_str(body).map_err(|e| StorageError::serialization(e.to_string()))?;
        Ok(SPSession::Basic(session))
    }
}

/// JSON codec for [`SPSession::Saml2`].
#[derive(Debug, Default)]
pub struct Saml2SPSessionCodec;

impl SPSessionCodec for Saml2SPSessionCodec {
    fn kind(&self) -> SPSessionKind {
        SPSessionKind::Saml2
    }

    fn encode(&self, sp_session: &SPSession) -> Result<String, StorageError> {
        match sp_session {
            SPSession::Saml2(s) => {
                serde_json::to_string(s).map_err(|e| StorageError::serialization(e.to_string()))
            }
            other => Err(StorageError::serialization(format!(
                "saml2 codec cannot encode {} session",
                other.kind()
            ))),
        }
    }

    fn decode(&self, body: &str) -> Result<SPSession, StorageError> {
        let session: Saml2SPSession =
            serde_json::from_str(body).map_err(|e| StorageError::serialization(e.to_string()))?;
        Ok(SPSession::Saml2(session))
    }
}

/// On-the-wire envelope for stored SP sessions.
#[derive(Debug, Serialize, Deserialize)]
struct SPSessionEnvelope {
    kind: SPSessionKind,
    body: String,
}

/// Dispatch table mapping [`SPSessionKind`] to its codec.
///
/// Required whenever SP-session tracking is enabled; a session variant
/// without a registered codec cannot be persisted or loaded.
#[derive(Clone)]
pub struct SPSessionCodecRegistry {
    codecs: HashMap<SPSessionKind, Arc<dyn SPSessionCodec>>,
}

impl SPSessionCodecRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Registers a codec, replacing any prior codec for the same kind.
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn SPSessionCodec>) -> Self {
        self.codecs.insert(codec.kind(), codec);
        self
    }

    /// Encodes an SP session into its storage envelope.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if no codec is registered for
    /// the session's kind or encoding fails.
    pub fn encode(&self, sp_session: &SPSession) -> Result<String, StorageError> {
        let kind = sp_session.kind();
        let codec = self.codecs.get(&kind).ok_or_else(|| {
            StorageError::serialization(format!("no codec registered for {kind} sessions"))
        })?;
        let envelope = SPSessionEnvelope {
            kind,
            body: codec.encode(sp_session)?,
        };
        serde_json::to_string(&envelope).map_err(|e| StorageError::serialization(e.to_string()))
    }

    /// Decodes a storage envelope back into an SP session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` on malformed envelopes or when
    /// no codec is registered for the envelope's kind.
    pub fn decode(&self, value: &str) -> Result<SPSession, StorageError> {
        let envelope: SPSessionEnvelope =
            serde_json::from_str(value).map_err(|e| StorageError::serialization(e.to_string()))?;
        let codec = self.codecs.get(&envelope.kind).ok_or_else(|| {
            StorageError::serialization(format!(
                "no codec registered for {} sessions",
                envelope.kind
            ))
        })?;
        codec.decode(&envelope.body)
    }
}

impl Default for SPSessionCodecRegistry {
    /// Registry with the built-in codecs for every supported variant.
    fn default() -> Self {
        Self::empty()
            .with_codec(Arc::new(BasicSPSessionCodec))
            .with_codec(Arc::new(Saml2SPSessionCodec))
    }
}

impl std::fmt::Debug for SPSessionCodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SPSessionCodecRegistry")
            .field("kinds", &self.codecs.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn saml2_session() -> SPSession {
        let now = OffsetDateTime::now_utc();
        SPSession::Saml2(Saml2SPSession {
            service_id: "https://sp.example.org".to_string(),
            creation_instant: now,
            expiration_instant: now + Duration::hours(8),
            name_id: "nameid-123".to_string(),
            session_index: "_idx1".to_string(),
        })
    }

    #[test]
    fn test_master_record_round_trip() {
        let record = SessionMasterRecord {
            principal_name: "alice".to_string(),
            creation_instant: OffsetDateTime::now_utc(),
            last_activity_instant: OffsetDateTime::now_utc(),
            address: Some("192.0.2.1".parse().unwrap()),
            flow_ids: vec!["authn/Password".to_string()],
            service_ids: vec!["https://sp.example.org".to_string()],
        };
        let encoded = record.encode().unwrap();
        assert_eq!(SessionMasterRecord::decode(&encoded).unwrap(), record);
    }

    #[test]
    fn test_master_record_tolerates_missing_lists() {
        // Records written before SP tracking was enabled have no lists.
        let decoded = SessionMasterRecord::decode(
            r#"{"principalName":"alice",
                "creationInstant":"2026-01-01T00:00:00Z",
                "lastActivityInstant":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(decoded.flow_ids.is_empty());
        assert!(decoded.service_ids.is_empty());
        assert!(decoded.address.is_none());
    }

    #[test]
    fn test_index_list_handles_awkward_ids() {
        // Ids with commas and quotes must survive; the joined-string
        // encoding this replaces could not express them.
        let ids = vec!["a,b".to_string(), "c\"d".to_string()];
        let encoded = encode_index_list(&ids).unwrap();
        assert_eq!(decode_index_list(&encoded).unwrap(), ids);
    }

    #[test]
    fn test_registry_dispatch_round_trip() {
        let registry = SPSessionCodecRegistry::default();
        let sp = saml2_session();
        let encoded = registry.encode(&sp).unwrap();
        assert_eq!(registry.decode(&encoded).unwrap(), sp);
    }

    #[test]
    fn test_registry_missing_codec() {
        let registry = SPSessionCodecRegistry::empty();
        let err = registry.encode(&saml2_session()).unwrap_err();
        assert!(err.to_string().contains("no codec registered"));
    }

    #[test]
    fn test_codec_rejects_wrong_variant() {
        let now = OffsetDateTime::now_utc();
        let basic = SPSession::Basic(BasicSPSession {
            service_id: "sp".to_string(),
            creation_instant: now,
            expiration_instant: now + Duration::hours(1),
        });
        assert!(Saml2SPSessionCodec.encode(&basic).is_err());
    }

    #[test]
    fn test_registry_rejects_garbage() {
        let registry = SPSessionCodecRegistry::default();
        assert!(registry.decode("not json").is_err());
        assert!(registry.decode(r#"{"kind":"saml2","body":"{}"}"#).is_err());
    }
}
