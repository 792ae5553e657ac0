//! Opaque continuation tokens.
//!
//! A token is `hex(version || bincode(payload) || tag)` where `tag` is the first
//! eight bytes of `SHA-256(secret || version || payload)`. Tokens carry all the
//! state needed to resume, so any engine holding the same secret can serve the
//! next page.

use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::errors::DbError;
use crate::types::{Direction, EntityId, SortKey};

pub const CURSOR_VERSION: u8 = 1;
const TAG_LEN: usize = 8;
const MAX_TOKEN_HEX_LEN: usize = 512;

/// Decoded resume position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    /// Last entity emitted on the previous page.
    pub sort_key: SortKey,
    pub direction: Direction,
    /// Fingerprint of the collection and predicate that minted the cursor.
    pub scope: u32,
    /// Millisecond wall-clock time the cursor was minted.
    pub issued_at: i64,
}

#[derive(Serialize, Deserialize)]
struct CursorPayload {
    created: i64,
    id: [u8; 16],
    direction: u8,
    scope: u32,
    issued_at: i64,
}

#[derive(Clone)]
pub struct CursorCodec {
    secret: Vec<u8>,
    ttl_ms: Option<i64>,
}

impl std::fmt::Debug for CursorCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorCodec").field("ttl_ms", &self.ttl_ms).finish_non_exhaustive()
    }
}

impl CursorCodec {
    #[must_use]
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self { secret: secret.as_ref().to_vec(), ttl_ms: None }
    }

    /// Codec with a per-process random secret. Cursors will not survive a restart.
    #[must_use]
    pub fn random() -> Self {
        let mut secret = vec![0u8; 32];
        rand::rng().fill_bytes(&mut secret);
        Self { secret, ttl_ms: None }
    }

    #[must_use]
    pub fn with_ttl_secs(mut self, ttl_secs: Option<u64>) -> Self {
        self.ttl_ms = ttl_secs.map(|s| i64::try_from(s.saturating_mul(1000)).unwrap_or(i64::MAX));
        self
    }

    /// # Errors
    /// Returns `Encode` if the payload cannot be serialized.
    pub fn encode(&self, cursor: &Cursor) -> Result<String, DbError> {
        let payload = CursorPayload {
            created: cursor.sort_key.created,
            id: *cursor.sort_key.id.0.as_bytes(),
            direction: cursor.direction.as_byte(),
            scope: cursor.scope,
            issued_at: cursor.issued_at,
        };
        let body = encode_to_vec(&payload, standard())?;
        let mut raw = Vec::with_capacity(1 + body.len() + TAG_LEN);
        raw.push(CURSOR_VERSION);
        raw.extend_from_slice(&body);
        let tag = self.tag(&raw);
        raw.extend_from_slice(&tag);
        Ok(hex::encode(raw))
    }

    /// # Errors
    /// Returns `InvalidCursor` for anything that is not a live token minted with this secret.
    pub fn decode(&self, token: &str) -> Result<Cursor, DbError> {
        let token = token.trim().trim_matches('"');
        if token.is_empty() {
            return Err(DbError::invalid_cursor("empty token"));
        }
        if token.len() > MAX_TOKEN_HEX_LEN {
            return Err(DbError::invalid_cursor(format!(
                "token exceeds {MAX_TOKEN_HEX_LEN} characters"
            )));
        }
        let raw = hex::decode(token).map_err(|e| DbError::invalid_cursor(e.to_string()))?;
        if raw.len() < 1 + TAG_LEN {
            return Err(DbError::invalid_cursor("token truncated"));
        }
        if raw[0] != CURSOR_VERSION {
            return Err(DbError::invalid_cursor(format!("unsupported version {}", raw[0])));
        }
        let (signed, tag) = raw.split_at(raw.len() - TAG_LEN);
        if !tags_equal(&self.tag(signed), tag) {
            return Err(DbError::invalid_cursor("signature mismatch"));
        }
        let body = &signed[1..];
        let (payload, used) = decode_from_slice::<CursorPayload, _>(body, standard())
            .map_err(|e| DbError::invalid_cursor(e.to_string()))?;
        if used != body.len() {
            return Err(DbError::invalid_cursor("trailing bytes"));
        }
        let direction = Direction::from_byte(payload.direction)
            .ok_or_else(|| DbError::invalid_cursor("unknown scan direction"))?;
        if let Some(ttl) = self.ttl_ms {
            let age = chrono::Utc::now().timestamp_millis().saturating_sub(payload.issued_at);
            if age > ttl {
                return Err(DbError::invalid_cursor("token expired"));
            }
        }
        Ok(Cursor {
            sort_key: SortKey::new(payload.created, EntityId(Uuid::from_bytes(payload.id))),
            direction,
            scope: payload.scope,
            issued_at: payload.issued_at,
        })
    }

    // Prefix-keyed SHA-256, not HMAC. Length extension can only append bytes
    // after the payload, and `decode` rejects any payload that does not
    // consume the body exactly, so an extended token never decodes.
    fn tag(&self, signed: &[u8]) -> [u8; TAG_LEN] {
        let mut h = Sha256::new();
        h.update(&self.secret);
        h.update(signed);
        let digest = h.finalize();
        let mut out = [0u8; TAG_LEN];
        out.copy_from_slice(&digest[..TAG_LEN]);
        out
    }
}

fn tags_equal(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Fingerprint binding a cursor to the collection and predicate it paginates.
#[must_use]
pub fn query_scope(entity_type: &str, predicate_canonical: &str) -> u32 {
    let mut h = crc32fast::Hasher::new();
    h.update(entity_type.as_bytes());
    h.update(&[0x1f]);
    h.update(predicate_canonical.as_bytes());
    h.finalize()
}
