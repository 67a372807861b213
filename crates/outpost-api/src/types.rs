//! Flow executor wire types

use std::collections::BTreeMap;
use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Component name of the identification stage
pub const COMPONENT_IDENTIFICATION: &str = "ak-stage-identification";
/// Component name of the password stage
pub const COMPONENT_PASSWORD: &str = "ak-stage-password";

/// Stage kind of a challenge, taken from its `component` field.
///
/// The set of components is open; anything the bridge cannot answer lands in
/// `Other` and is rejected by the solver.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum StageKind {
    Identification,
    Password,
    Other(String),
}

impl From<String> for StageKind {
    fn from(component: String) -> Self {
        match component.as_str() {
            COMPONENT_IDENTIFICATION => StageKind::Identification,
            COMPONENT_PASSWORD => StageKind::Password,
            _ => StageKind::Other(component),
        }
    }
}

impl Default for StageKind {
    fn default() -> Self {
        StageKind::Other(String::new())
    }
}

impl StageKind {
    pub fn as_str(&self) -> &str {
        match self {
            StageKind::Identification => COMPONENT_IDENTIFICATION,
            StageKind::Password => COMPONENT_PASSWORD,
            StageKind::Other(component) => component,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response kind of a challenge (`type` field)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ChallengeType {
    Native,
    Shell,
    Redirect,
    Other(String),
}

impl From<String> for ChallengeType {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "native" => ChallengeType::Native,
            "shell" => ChallengeType::Shell,
            "redirect" => ChallengeType::Redirect,
            _ => ChallengeType::Other(kind),
        }
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeType::Native => f.write_str("native"),
            ChallengeType::Shell => f.write_str("shell"),
            ChallengeType::Redirect => f.write_str("redirect"),
            ChallengeType::Other(kind) => f.write_str(kind),
        }
    }
}

/// A field-level validation error attached to a challenge
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub string: String,
    #[serde(default)]
    pub code: String,
}

/// One challenge issued by the flow executor
#[derive(Debug, Clone, Deserialize)]
pub struct Challenge {
    #[serde(rename = "type")]
    pub challenge_type: ChallengeType,

    #[serde(default)]
    pub component: StageKind,

    /// Redirect target, present on redirect challenges
    #[serde(default)]
    pub to: Option<String>,

    #[serde(default)]
    pub response_errors: Option<BTreeMap<String, Vec<ErrorDetail>>>,
}

impl Challenge {
    pub fn is_redirect(&self) -> bool {
        self.challenge_type == ChallengeType::Redirect
    }

    /// First validation error, keyed by the field it applies to
    pub fn first_error(&self) -> Option<(&str, &ErrorDetail)> {
        self.response_errors.as_ref().and_then(|errors| {
            errors
                .iter()
                .find_map(|(field, details)| details.first().map(|d| (field.as_str(), d)))
        })
    }
}

/// Answer to a challenge.
///
/// `Debug` never shows the password; serialization is the only place the
/// secret is exposed.
#[derive(Debug)]
pub enum ChallengeResponse {
    Identification { uid_field: String },
    Password { password: SecretString },
}

impl ChallengeResponse {
    pub fn stage(&self) -> StageKind {
        match self {
            ChallengeResponse::Identification { .. } => StageKind::Identification,
            ChallengeResponse::Password { .. } => StageKind::Password,
        }
    }
}

impl Serialize for ChallengeResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("component", self.stage().as_str())?;
        match self {
            ChallengeResponse::Identification { uid_field } => {
                map.serialize_entry("uid_field", uid_field)?;
            }
            ChallengeResponse::Password { password } => {
                map.serialize_entry("password", password.expose_secret())?;
            }
        }
        map.end()
    }
}
