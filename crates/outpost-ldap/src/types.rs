//! Bind request and result types

use std::fmt;
use std::net::SocketAddr;

use secrecy::SecretString;

// ============================================================================
// LDAP result codes (RFC 4511 section 4.1.9)
// ============================================================================

pub const LDAP_SUCCESS: u32 = 0;
pub const LDAP_OPERATIONS_ERROR: u32 = 1;
pub const LDAP_INVALID_CREDENTIALS: u32 = 49;
pub const LDAP_INSUFFICIENT_ACCESS_RIGHTS: u32 = 50;

/// Final result of a bind, as reported to the directory client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    Success,
    /// Anything not cleanly classifiable as bad credentials or denied access
    OperationsError,
    InvalidCredentials,
    InsufficientAccessRights,
}

impl BindOutcome {
    /// LDAP result code
    pub fn code(&self) -> u32 {
        match self {
            BindOutcome::Success => LDAP_SUCCESS,
            BindOutcome::OperationsError => LDAP_OPERATIONS_ERROR,
            BindOutcome::InvalidCredentials => LDAP_INVALID_CREDENTIALS,
            BindOutcome::InsufficientAccessRights => LDAP_INSUFFICIENT_ACCESS_RIGHTS,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BindOutcome::Success)
    }
}

impl fmt::Display for BindOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BindOutcome::Success => "success",
            BindOutcome::OperationsError => "operationsError",
            BindOutcome::InvalidCredentials => "invalidCredentials",
            BindOutcome::InsufficientAccessRights => "insufficientAccessRights",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

/// A simple bind as received by the directory server
#[derive(Debug)]
pub struct BindRequest {
    pub dn: String,
    pub password: SecretString,
    /// Remote address of the LDAP client, for logging
    pub peer: Option<SocketAddr>,
}

impl BindRequest {
    pub fn new(dn: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            password: SecretString::from(password.into()),
            peer: None,
        }
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }
}
