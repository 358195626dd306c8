use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use time::{Duration, OffsetDateTime};

use crate::types::PlayerId;

use super::AuthError;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_SESSION_TTL: Duration = Duration::hours(2);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    player_id: PlayerId,
    #[serde(with = "time::serde::rfc3339")]
    issued_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
}

/// Mints `base64url(payload) + "." + hex(HMAC_SHA256(appSecret, payload))`.
pub fn issue_session_token(player_id: PlayerId, app_secret: &[u8]) -> String {
    let now = OffsetDateTime::now_utc();
    let claims = Claims { player_id, issued_at: now, expires_at: now + DEFAULT_SESSION_TTL };
    let payload = serde_json::to_vec(&claims).expect("claims always serialize");
    let encoded_payload = URL_SAFE_NO_PAD.encode(&payload);

    let mut mac = HmacSha256::new_from_slice(app_secret).expect("hmac accepts any key length");
    mac.update(encoded_payload.as_bytes());
    let sig = hex::encode(mac.finalize().into_bytes());

    format!("{encoded_payload}.{sig}")
}

/// Verifies the MAC with a constant-time compare, then checks expiry.
pub fn verify_session_token(token: &str, app_secret: &[u8]) -> Result<PlayerId, AuthError> {
    let (encoded_payload, sig_hex) = token.split_once('.').ok_or(AuthError::BadSession)?;

    let mut mac = HmacSha256::new_from_slice(app_secret).expect("hmac accepts any key length");
    mac.update(encoded_payload.as_bytes());
    let sig = hex::decode(sig_hex).map_err(|_| AuthError::BadSession)?;
    mac.verify_slice(&sig).map_err(|_| AuthError::BadSession)?;

    let payload = URL_SAFE_NO_PAD.decode(encoded_payload).map_err(|_| AuthError::BadSession)?;
    let claims: Claims = serde_json::from_slice(&payload).map_err(|_| AuthError::BadSession)?;

    if claims.expires_at <= OffsetDateTime::now_utc() {
        return Err(AuthError::SessionExpired);
    }
    Ok(claims.player_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn round_trips_a_fresh_token() {
        let player_id = Uuid::new_v4();
        let secret = b"app-secret";
        let token = issue_session_token(player_id, secret);
        assert_eq!(verify_session_token(&token, secret).unwrap(), player_id);
    }

    #[test]
    fn rejects_a_token_signed_with_a_different_secret() {
        let player_id = Uuid::new_v4();
        let token = issue_session_token(player_id, b"secret-a");
        assert!(matches!(verify_session_token(&token, b"secret-b"), Err(AuthError::BadSession)));
    }

    #[test]
    fn rejects_an_expired_token() {
        let player_id = Uuid::new_v4();
        let secret = b"app-secret";
        let now = OffsetDateTime::now_utc();
        let claims = Claims { player_id, issued_at: now - Duration::hours(3), expires_at: now - Duration::hours(1) };
        let payload = serde_json::to_vec(&claims).unwrap();
        let encoded_payload = URL_SAFE_NO_PAD.encode(&payload);
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(encoded_payload.as_bytes());
        let sig = hex::encode(mac.finalize().into_bytes());
        let token = format!("{encoded_payload}.{sig}");
        assert!(matches!(verify_session_token(&token, secret), Err(AuthError::SessionExpired)));
    }
}
