//! Auth (U): stateless crypto helpers, no I/O. Telegram handshake
//! validation and session token mint/verify, per spec.md §4.4.

pub mod handshake;
pub mod session;

pub use handshake::{validate_init_data, TelegramUser};
pub use session::{issue_session_token, verify_session_token};

use crate::error::ErrorCode;

#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("initData hash did not match")]
    HashMismatch,
    #[error("initData was malformed")]
    MalformedInitData,
    #[error("session token was malformed or forged")]
    BadSession,
    #[error("session token has expired")]
    SessionExpired,
}

impl AuthError {
    pub fn code(self) -> ErrorCode {
        match self {
            AuthError::HashMismatch | AuthError::MalformedInitData => ErrorCode::BadSession,
            AuthError::BadSession => ErrorCode::BadSession,
            AuthError::SessionExpired => ErrorCode::SessionExpired,
        }
    }
}
