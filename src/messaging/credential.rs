//! # Queue Credentials
//!
//! The credential provider hands the consumer either a long-lived connection
//! string or a short-lived bearer token. Sessions accept both: connection
//! strings are signed into shared access signatures per request, bearer
//! tokens are wrapped in a [`FixedTokenCredential`] that stays valid until
//! the supplied expiry.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;

use super::errors::{QueueError, QueueResult};
use crate::constants::{service_bus, DEFAULT_TOKEN_LIFETIME};

type HmacSha256 = Hmac<Sha256>;

/// Credential supplied by the external credential provider
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Credential {
    /// Long-lived secret with embedded endpoint and shared access key
    ConnectionString { connection_string: String },
    /// Short-lived bearer token with an optional expiry
    BearerToken {
        bearer_token: String,
        #[serde(default)]
        expires_at: Option<DateTime<Utc>>,
    },
}

impl Credential {
    pub fn connection_string(connection_string: impl Into<String>) -> Self {
        Self::ConnectionString {
            connection_string: connection_string.into(),
        }
    }

    pub fn bearer_token(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self::BearerToken {
            bearer_token: token.into(),
            expires_at,
        }
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionString { .. } => "connection_string",
            Self::BearerToken { .. } => "bearer_token",
        }
    }

    /// Reject credentials that can never authenticate
    pub fn validate(&self) -> QueueResult<()> {
        match self {
            Self::ConnectionString { connection_string } => {
                ConnectionStringParts::parse(connection_string).map(|_| ())
            }
            Self::BearerToken { bearer_token, .. } if bearer_token.trim().is_empty() => Err(
                QueueError::configuration("bearer token must not be empty"),
            ),
            Self::BearerToken { .. } => Ok(()),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionString { .. } => f
                .debug_struct("ConnectionString")
                .field("connection_string", &"<redacted>")
                .finish(),
            Self::BearerToken { expires_at, .. } => f
                .debug_struct("BearerToken")
                .field("bearer_token", &"<redacted>")
                .field("expires_at", expires_at)
                .finish(),
        }
    }
}

/// Bearer token fixed for its whole lifetime
#[derive(Clone)]
pub struct FixedTokenCredential {
    token: String,
    expires_at: DateTime<Utc>,
}

impl FixedTokenCredential {
    /// Wrap a token; without an expiry it is assumed valid for one hour from now
    pub fn new(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        let expires_at = expires_at.unwrap_or_else(|| {
            Utc::now()
                + Duration::from_std(DEFAULT_TOKEN_LIFETIME).unwrap_or_else(|_| Duration::hours(1))
        });
        Self {
            token: token.into(),
            expires_at,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Return the token if it is still valid
    pub fn token(&self) -> QueueResult<&str> {
        if self.is_expired_at(Utc::now()) {
            return Err(QueueError::authentication(format!(
                "bearer token expired at {}",
                self.expires_at.to_rfc3339()
            )));
        }
        Ok(&self.token)
    }
}

impl fmt::Debug for FixedTokenCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedTokenCredential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Parsed `Endpoint=...;SharedAccessKeyName=...;SharedAccessKey=...` string
#[derive(Clone, PartialEq)]
pub struct ConnectionStringParts {
    /// `https://` form of the namespace endpoint, no trailing slash
    pub endpoint: String,
    pub shared_access_key_name: String,
    shared_access_key: String,
    /// Queue name embedded in the connection string, if any
    pub entity_path: Option<String>,
}

impl ConnectionStringParts {
    pub fn parse(connection_string: &str) -> QueueResult<Self> {
        let mut endpoint = None;
        let mut key_name = None;
        let mut key = None;
        let mut entity_path = None;

        for part in connection_string.split(';').map(str::trim) {
            if let Some(value) = part.strip_prefix("Endpoint=") {
                endpoint = Some(value.to_string());
            } else if let Some(value) = part.strip_prefix("SharedAccessKeyName=") {
                key_name = Some(value.to_string());
            } else if let Some(value) = part.strip_prefix("SharedAccessKey=") {
                key = Some(value.to_string());
            } else if let Some(value) = part.strip_prefix("EntityPath=") {
                entity_path = Some(value.to_string());
            }
        }

        let endpoint = endpoint.ok_or_else(|| {
            QueueError::configuration("invalid connection string: missing Endpoint")
        })?;
        let shared_access_key_name = key_name.ok_or_else(|| {
            QueueError::configuration("invalid connection string: missing SharedAccessKeyName")
        })?;
        let shared_access_key = key.ok_or_else(|| {
            QueueError::configuration("invalid connection string: missing SharedAccessKey")
        })?;

        let host = endpoint
            .trim_start_matches("sb://")
            .trim_start_matches("https://")
            .trim_end_matches('/');
        if host.is_empty() {
            return Err(QueueError::configuration(
                "invalid connection string: empty Endpoint",
            ));
        }

        Ok(Self {
            endpoint: format!("https://{host}"),
            shared_access_key_name,
            shared_access_key,
            entity_path: entity_path.filter(|path| !path.is_empty()),
        })
    }

    /// Build a shared access signature for `resource` valid until `expiry`
    pub fn sas_token(&self, resource: &str, expiry: DateTime<Utc>) -> QueueResult<String> {
        let expiry = expiry.timestamp();
        let encoded_resource = urlencoding::encode(resource);
        let string_to_sign = format!("{encoded_resource}\n{expiry}");

        let mut mac = HmacSha256::new_from_slice(self.shared_access_key.as_bytes())
            .map_err(|e| QueueError::authentication(format!("failed to create HMAC: {e}")))?;
        mac.update(string_to_sign.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        Ok(format!(
            "SharedAccessSignature sr={}&sig={}&se={}&skn={}",
            encoded_resource,
            urlencoding::encode(&signature),
            expiry,
            urlencoding::encode(&self.shared_access_key_name)
        ))
    }
}

impl fmt::Debug for ConnectionStringParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionStringParts")
            .field("endpoint", &self.endpoint)
            .field("shared_access_key_name", &self.shared_access_key_name)
            .field("shared_access_key", &"<redacted>")
            .field("entity_path", &self.entity_path)
            .finish()
    }
}

/// Per-session request authorizer built from a [`Credential`]
#[derive(Debug, Clone)]
pub enum Authorizer {
    SharedAccessSignature(ConnectionStringParts),
    Token(FixedTokenCredential),
}

impl Authorizer {
    pub fn from_credential(credential: &Credential) -> QueueResult<Self> {
        match credential {
            Credential::ConnectionString { connection_string } => Ok(
                Self::SharedAccessSignature(ConnectionStringParts::parse(connection_string)?),
            ),
            Credential::BearerToken {
                bearer_token,
                expires_at,
            } => {
                credential.validate()?;
                Ok(Self::Token(FixedTokenCredential::new(
                    bearer_token.clone(),
                    *expires_at,
                )))
            }
        }
    }

    /// Value for the `Authorization` header of a request against `resource`
    pub fn authorization_header(&self, resource: &str) -> QueueResult<String> {
        match self {
            Self::SharedAccessSignature(parts) => parts.sas_token(
                resource,
                Utc::now() + Duration::seconds(service_bus::SAS_LIFETIME_SECONDS),
            ),
            Self::Token(credential) => Ok(format!("Bearer {}", credential.token()?)),
        }
    }
}
