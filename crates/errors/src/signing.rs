//! Signing error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SigningError {
    /// The trusted key shipped with the application could not be parsed.
    #[error("failed to load trusted public key: {message}")]
    KeyLoad { message: String },

    #[error("invalid signature: {artifact}")]
    SignatureMismatch { artifact: String },
}

impl UserFacingError for SigningError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::KeyLoad { .. } => {
                Some("The embedded trusted key is damaged; reinstall the application.")
            }
            Self::SignatureMismatch { .. } => {
                Some("The download may have been tampered with. Nothing was installed.")
            }
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::KeyLoad { .. } => "signing.key_load",
            Self::SignatureMismatch { .. } => "signing.signature_mismatch",
        };
        Some(code)
    }
}
