//! The signature validator (§4.1, component D): HMAC-SHA1/SHA256 check over
//! the raw body using a hot-reloadable secret token set.
//!
//! `X-Hub-Signature-256` is checked first; `X-Hub-Signature` (SHA1) is only
//! consulted if the stronger header is absent, never the reverse (§11
//! supplemental feature).

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

use hookrelay_core::{EventEnvelope, EventType};

use crate::error::IngestError;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// A hot-reloadable set of accepted HMAC secrets (§4.1: "set membership, not
/// a single value, to permit rotation"). Readers always observe a complete
/// snapshot (§5 "shared resource policy", pointer-publish discipline).
#[derive(Clone)]
pub struct TokenSet {
    inner: Arc<RwLock<Arc<HashSet<String>>>>,
}

impl TokenSet {
    pub fn new(tokens: HashSet<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(tokens))),
        }
    }

    pub fn snapshot(&self) -> Arc<HashSet<String>> {
        self.inner.read().expect("token set lock poisoned").clone()
    }

    /// Publish a new snapshot atomically.
    pub fn refresh(&self, tokens: HashSet<String>) {
        *self.inner.write().expect("token set lock poisoned") = Arc::new(tokens);
    }
}

/// The two headers §4.1/§6 name, and the event-id/event-type headers the
/// demultiplexer needs.
pub struct SignatureHeaders<'a> {
    pub signature_256: Option<&'a str>,
    pub signature_1: Option<&'a str>,
    pub event_type: Option<&'a str>,
    pub delivery_id: Option<&'a str>,
}

pub struct SignatureValidator {
    tokens: TokenSet,
}

impl SignatureValidator {
    pub fn new(tokens: TokenSet) -> Self {
        Self { tokens }
    }

    /// Verify `body` against the active token set using whichever signature
    /// header is present, then build the validated [`EventEnvelope`] (§4.1).
    ///
    /// Returns `Ok` only on a MAC match against at least one secret in the
    /// set — `∃ s ∈ S. mac(s, B) = H.signature` (§8 "signature discipline").
    pub fn validate(
        &self,
        headers: SignatureHeaders<'_>,
        body: Vec<u8>,
        raw_headers: std::collections::HashMap<String, Vec<String>>,
    ) -> Result<EventEnvelope, IngestError> {
        let event_type = headers
            .event_type
            .ok_or_else(|| IngestError::Malformed("missing X-GitHub-Event header".to_string()))?;
        let delivery_id = headers
            .delivery_id
            .ok_or_else(|| IngestError::Malformed("missing X-GitHub-Delivery header".to_string()))?;

        let secrets = self.tokens.snapshot();

        let verified = if let Some(sig) = headers.signature_256 {
            verify_any::<HmacSha256>(sig, "sha256=", &body, &secrets)?
        } else if let Some(sig) = headers.signature_1 {
            verify_any::<HmacSha1>(sig, "sha1=", &body, &secrets)?
        } else {
            return Err(IngestError::Malformed(
                "missing X-Hub-Signature-256 or X-Hub-Signature header".to_string(),
            ));
        };

        if !verified {
            return Err(IngestError::SignatureMismatch);
        }

        Ok(EventEnvelope::new(
            EventType::parse(event_type),
            delivery_id.to_string(),
            body,
            raw_headers,
        ))
    }
}

/// Recompute the keyed MAC with every secret in `secrets`, accepting on any
/// match. `hmac::Mac::verify_slice` performs a constant-time comparison
/// internally.
fn verify_any<M: Mac + digest::KeyInit>(
    header_value: &str,
    prefix: &str,
    body: &[u8],
    secrets: &HashSet<String>,
) -> Result<bool, IngestError> {
    let hex_digest = header_value
        .strip_prefix(prefix)
        .ok_or_else(|| IngestError::Malformed(format!("signature header missing `{prefix}` prefix")))?;
    let expected = hex::decode(hex_digest)
        .map_err(|e| IngestError::Malformed(format!("invalid hex in signature header: {e}")))?;

    for secret in secrets {
        let mut mac = match M::new_from_slice(secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => continue,
        };
        mac.update(body);
        if mac.verify_slice(&expected).is_ok() {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_signature_from_any_secret_in_the_set() {
        let mut secrets = HashSet::new();
        secrets.insert("old".to_string());
        secrets.insert("new".to_string());
        let validator = SignatureValidator::new(TokenSet::new(secrets));

        let body = b"{\"hello\":true}".to_vec();
        let sig = sign("new", &body);

        let headers = SignatureHeaders {
            signature_256: Some(&sig),
            signature_1: None,
            event_type: Some("issues"),
            delivery_id: Some("evt-1"),
        };

        let envelope = validator.validate(headers, body, HashMap::new()).unwrap();
        assert_eq!(envelope.id, "evt-1");
    }

    #[test]
    fn rejects_signature_after_secret_rotation() {
        let tokens = TokenSet::new(["old".to_string()].into_iter().collect());
        let validator = SignatureValidator::new(tokens.clone());

        let body = b"{}".to_vec();
        let sig = sign("old", &body);

        tokens.refresh(["new".to_string()].into_iter().collect());

        let headers = SignatureHeaders {
            signature_256: Some(&sig),
            signature_1: None,
            event_type: Some("issues"),
            delivery_id: Some("evt-1"),
        };

        let result = validator.validate(headers, body, HashMap::new());
        assert!(matches!(result, Err(IngestError::SignatureMismatch)));
    }

    #[test]
    fn falls_back_to_sha1_only_when_sha256_absent() {
        let secrets: HashSet<String> = ["secret".to_string()].into_iter().collect();
        let validator = SignatureValidator::new(TokenSet::new(secrets));
        let body = b"{}".to_vec();

        let mut mac = HmacSha1::new_from_slice(b"secret").unwrap();
        mac.update(&body);
        let sig1 = format!("sha1={}", hex::encode(mac.finalize().into_bytes()));

        let headers = SignatureHeaders {
            signature_256: None,
            signature_1: Some(&sig1),
            event_type: Some("push"),
            delivery_id: Some("evt-2"),
        };

        assert!(validator.validate(headers, body, HashMap::new()).is_ok());
    }

    #[test]
    fn missing_headers_are_malformed_not_forbidden() {
        let validator = SignatureValidator::new(TokenSet::new(HashSet::new()));
        let headers = SignatureHeaders {
            signature_256: None,
            signature_1: None,
            event_type: Some("issues"),
            delivery_id: Some("evt-1"),
        };
        let result = validator.validate(headers, b"{}".to_vec(), HashMap::new());
        assert!(matches!(result, Err(IngestError::Malformed(_))));
    }
}
