use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use super::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// The subset of Telegram's `user` field we need; anything else in
/// `initData` is carried only for the hash check, never parsed further.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
    pub language_code: Option<String>,
}

/// Validates a Telegram WebApp `initData` string against `bot_token`,
/// following the five-step procedure: parse, build the data-check string,
/// derive the secret key, recompute the MAC, compare.
pub fn validate_init_data(init_data: &str, bot_token: &str) -> Result<TelegramUser, AuthError> {
    let mut pairs: Vec<(String, String)> = url::form_urlencoded::parse(init_data.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let hash_pos = pairs.iter().position(|(k, _)| k == "hash").ok_or(AuthError::HashMismatch)?;
    let received_hash = pairs.remove(hash_pos).1;

    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    let data_check_string = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("\n");

    let secret_key = hmac_sha256_raw(b"WebAppData", bot_token.as_bytes());

    let mut mac = HmacSha256::new_from_slice(&secret_key).expect("hmac accepts any key length");
    mac.update(data_check_string.as_bytes());
    let received = hex::decode(&received_hash).map_err(|_| AuthError::HashMismatch)?;
    mac.verify_slice(&received).map_err(|_| AuthError::HashMismatch)?;

    let user_json = pairs
        .iter()
        .find(|(k, _)| k == "user")
        .map(|(_, v)| v.clone())
        .ok_or(AuthError::MalformedInitData)?;
    serde_json::from_str(&user_json).map_err(|_| AuthError::MalformedInitData)
}

fn hmac_sha256_raw(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(bot_token: &str, pairs: &[(&str, &str)]) -> String {
        let secret_key = hmac_sha256_raw(b"WebAppData", bot_token.as_bytes());
        let mut sorted: Vec<_> = pairs.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let data_check_string = sorted.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("\n");
        let mut mac = HmacSha256::new_from_slice(&secret_key).unwrap();
        mac.update(data_check_string.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_a_correctly_signed_payload() {
        let bot_token = "test-bot-token";
        let user_json = r#"{"id":42,"first_name":"Ada","username":"ada","language_code":"en"}"#;
        let pairs = [("auth_date", "1700000000"), ("user", user_json)];
        let hash = sign(bot_token, &pairs);
        let init_data = format!(
            "auth_date={}&user={}&hash={}",
            pairs[0].1,
            urlencoding_escape(user_json),
            hash
        );
        let user = validate_init_data(&init_data, bot_token).unwrap();
        assert_eq!(user.id, 42);
        assert_eq!(user.first_name, "Ada");
    }

    #[test]
    fn rejects_a_tampered_payload() {
        let bot_token = "test-bot-token";
        let user_json = r#"{"id":42,"first_name":"Ada"}"#;
        let pairs = [("auth_date", "1700000000"), ("user", user_json)];
        let hash = sign(bot_token, &pairs);
        let init_data = format!(
            "auth_date=1700000001&user={}&hash={}",
            urlencoding_escape(user_json),
            hash
        );
        assert!(matches!(validate_init_data(&init_data, bot_token), Err(AuthError::HashMismatch)));
    }

    fn urlencoding_escape(s: &str) -> String {
        url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
    }
}
