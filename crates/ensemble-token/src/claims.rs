use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Audience the Ensemble chat backend expects in every token.
pub const ENSEMBLE_AUDIENCE: &str = "ensembleapp.ai";

/// Claims carried by tokens minted for the Ensemble chat backend.
///
/// Field order is the serialization order, and `context` is a sorted map, so
/// the encoded payload is stable for a given set of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
    pub iat: i64,
    pub exp: i64,
    pub aud: String,
    /// Only present when the key id is carried as a claim instead of a header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

/// The identity a token is minted for.
///
/// Conversation threads on the chat backend are keyed by `subject`, so it must
/// be stable for a given end user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatIdentity {
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub context: Option<Map<String, Value>>,
}

impl ChatIdentity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Self::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = Some(context);
        self
    }
}
