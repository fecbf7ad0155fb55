//! JSON envelope unwrapping
//!
//! The ingestion transport delivers one JSON envelope per record:
//!
//! ```json
//! {"identity": {"patientId": "uuid1", "limb": 1}, "rawData": "<base64 rows>"}
//! ```
//!
//! The field names emitted by the watch app (`WatchPosition`, `PatientID`,
//! `Limb`, `RawData`) are accepted too.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::common::{decode_base64, encode_base64, DecodeError};
use crate::sample::{Identity, SourceBlob};

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(alias = "WatchPosition")]
    identity: Identity,
    #[serde(rename = "rawData", alias = "RawData", default)]
    raw_data: Option<String>,
}

/// Blobs unwrapped from a batch of delivered records.
#[derive(Debug, Clone, Default)]
pub struct UnwrappedEnvelopes {
    /// Successfully unwrapped blobs, in delivery order
    pub blobs: Vec<SourceBlob>,
    /// Records that were not valid envelopes and were dropped
    pub dropped: usize,
}

/// Unwrap a single envelope into a [`SourceBlob`].
///
/// A missing or null `rawData` is an empty blob. A patient id that is not a
/// single path segment is rejected with [`DecodeError::InvalidPatientId`].
pub fn unwrap_envelope(record: &[u8]) -> Result<SourceBlob, DecodeError> {
    let envelope: Envelope = serde_json::from_slice(record)?;
    envelope.identity.validate()?;
    let raw = match envelope.raw_data {
        Some(encoded) => decode_base64(&encoded)?,
        None => Vec::new(),
    };
    Ok(SourceBlob {
        identity: envelope.identity,
        raw: Bytes::from(raw),
    })
}

/// Unwrap every record in a delivered batch.
///
/// Malformed envelopes are logged and counted, never fatal.
pub fn unwrap_envelopes<I, R>(records: I) -> UnwrappedEnvelopes
where
    I: IntoIterator<Item = R>,
    R: AsRef<[u8]>,
{
    let mut out = UnwrappedEnvelopes::default();
    for (idx, record) in records.into_iter().enumerate() {
        match unwrap_envelope(record.as_ref()) {
            Ok(blob) => out.blobs.push(blob),
            Err(e) => {
                log::warn!("unable to decode envelope for record {}: {}", idx, e);
                out.dropped += 1;
            }
        }
    }
    out
}

/// Wrap raw rows into an envelope, as the ingestion transport would deliver them.
pub fn wrap_envelope(identity: &Identity, raw: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let envelope = Envelope {
        identity: identity.clone(),
        raw_data: Some(encode_base64(raw)),
    };
    Ok(serde_json::to_vec(&envelope)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_envelope_canonical_names() {
        let json = br#"{"identity":{"patientId":"uuid1","limb":1},"rawData":"AQID"}"#;
        let blob = unwrap_envelope(json).unwrap();

        assert_eq!(blob.identity, Identity::new("uuid1", 1));
        assert_eq!(blob.raw.as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn test_unwrap_envelope_watch_app_names() {
        let json = br#"{"WatchPosition":{"PatientID":"p7","Limb":3},"RawData":"AQID"}"#;
        let blob = unwrap_envelope(json).unwrap();

        assert_eq!(blob.identity, Identity::new("p7", 3));
        assert_eq!(blob.raw.as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn test_unwrap_envelope_null_raw_data() {
        let json = br#"{"identity":{"patientId":"a","limb":2},"rawData":null}"#;
        let blob = unwrap_envelope(json).unwrap();
        assert!(blob.raw.is_empty());
    }

    #[test]
    fn test_unwrap_envelope_limb_out_of_range() {
        let json = br#"{"identity":{"patientId":"a","limb":300},"rawData":""}"#;
        let err = unwrap_envelope(json).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn test_unwrap_envelope_bad_base64() {
        let json = br#"{"identity":{"patientId":"a","limb":2},"rawData":"@@@"}"#;
        let err = unwrap_envelope(json).unwrap_err();
        assert!(matches!(err, DecodeError::Base64(_)));
    }

    #[test]
    fn test_unwrap_envelope_rejects_path_patient_id() {
        for id in ["../escaped", "a/b", ""] {
            let json = format!(
                r#"{{"identity":{{"patientId":"{id}","limb":1}},"rawData":"AQID"}}"#
            );
            let err = unwrap_envelope(json.as_bytes()).unwrap_err();
            assert!(matches!(err, DecodeError::InvalidPatientId(_)), "{id:?}");
        }
    }

    #[test]
    fn test_unwrap_envelopes_counts_unsafe_ids_as_dropped() {
        let good = wrap_envelope(&Identity::new("a", 1), &[9u8; 4]).unwrap();
        let escaping = wrap_envelope(&Identity::new("../escaped", 1), &[9u8; 4]).unwrap();

        let unwrapped = unwrap_envelopes([good, escaping]);

        assert_eq!(unwrapped.blobs.len(), 1);
        assert_eq!(unwrapped.dropped, 1);
        assert_eq!(unwrapped.blobs[0].identity, Identity::new("a", 1));
    }

    #[test]
    fn test_unwrap_envelopes_drops_malformed() {
        let good = wrap_envelope(&Identity::new("a", 1), &[9u8; 4]).unwrap();
        let records: Vec<Vec<u8>> = vec![good.clone(), b"not json".to_vec(), good];

        let unwrapped = unwrap_envelopes(&records);

        assert_eq!(unwrapped.blobs.len(), 2);
        assert_eq!(unwrapped.dropped, 1);
        assert_eq!(unwrapped.blobs[1].raw.as_ref(), &[9u8; 4]);
    }

    #[test]
    fn test_wrap_envelope_roundtrip() {
        let identity = Identity::new("uuid1", 1);
        let wrapped = wrap_envelope(&identity, &[0u8, 255, 17]).unwrap();
        let blob = unwrap_envelope(&wrapped).unwrap();

        assert_eq!(blob.identity, identity);
        assert_eq!(blob.raw.as_ref(), &[0u8, 255, 17]);
    }
}
