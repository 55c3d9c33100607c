use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
    #[error("unknown key id: {0}")]
    UnknownKeyId(String),
    #[error("key id claim {claim} does not match verifying key {key}")]
    KeyIdMismatch { claim: String, key: String },
    #[error("token ttl of {0}s does not fit an expiry timestamp")]
    InvalidTtl(u64),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

pub type TokenResult<T> = Result<T, TokenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_variants() {
        let errors = vec![
            TokenError::InvalidKey("empty secret".to_string()),
            TokenError::UnknownKeyId("k9".to_string()),
            TokenError::InvalidTtl(u64::MAX),
            TokenError::KeyIdMismatch {
                claim: "a".to_string(),
                key: "b".to_string(),
            },
            TokenError::Jwt(jsonwebtoken::errors::Error::from(
                jsonwebtoken::errors::ErrorKind::InvalidToken,
            )),
        ];

        for error in errors {
            let rendered = error.to_string();
            assert!(!rendered.is_empty());
        }
    }
}
