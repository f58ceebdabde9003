//! Request signing for the in-band authorize-connection frame.
//!
//! The cluster re-asserts caller identity from AWS Signature V4 material.
//! The canonical request is fixed: a POST to `/` on `dax.amazonaws.com`
//! with an empty payload; only the timestamp (and optional session token)
//! vary between signatures.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use dax_core::{DaxError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Canonical host every signature is computed against, independent of the
/// endpoint actually connected to.
pub const CANONICAL_HOST: &str = "dax.amazonaws.com";
/// Service name in the credential scope.
pub const SERVICE_NAME: &str = "dax";
/// Content type of the canonical request.
pub const CONTENT_TYPE: &str = "application/x-amz-cbor-1.1";

/// Static AWS credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// The access key id.
    pub access_key_id: String,
    /// The secret access key.
    pub secret_access_key: String,
    /// The session token for temporary credentials.
    pub session_token: Option<String>,
}

impl Credentials {
    /// Creates long-lived credentials.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    /// Attaches a session token for temporary credentials.
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

/// The material fed into an authorize-connection frame.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    /// The access key id.
    pub access_key: String,
    /// The hex-encoded signature.
    pub signature: String,
    /// The exact string-to-sign bytes, echoed to the server.
    pub string_to_sign: Vec<u8>,
    /// The session token, when temporary credentials are in use.
    pub token: Option<String>,
}

/// Produces signing material on demand.
///
/// The connection layer consumes this seam; tests substitute deterministic
/// implementations.
#[async_trait]
pub trait RequestSigner: Send + Sync {
    /// Produces fresh signing material.
    async fn sign(&self) -> Result<SignedRequest>;
}

/// AWS Signature V4 signer over static credentials.
#[derive(Debug, Clone)]
pub struct SigV4Signer {
    credentials: Credentials,
    region: String,
}

impl SigV4Signer {
    /// Creates a signer for the given credentials and region.
    pub fn new(credentials: Credentials, region: impl Into<String>) -> Self {
        Self {
            credentials,
            region: region.into(),
        }
    }

    /// Computes the signature for a fixed timestamp. Deterministic, which
    /// is what the tests lean on.
    pub fn sign_at(&self, now: DateTime<Utc>) -> SignedRequest {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/{}/aws4_request", date, self.region, SERVICE_NAME);

        let canonical_request = self.canonical_request(&amz_date);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let secret = format!("AWS4{}", self.credentials.secret_access_key);
        let key = hmac_sha256(secret.as_bytes(), date.as_bytes());
        let key = hmac_sha256(&key, self.region.as_bytes());
        let key = hmac_sha256(&key, SERVICE_NAME.as_bytes());
        let key = hmac_sha256(&key, b"aws4_request");
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

        SignedRequest {
            access_key: self.credentials.access_key_id.clone(),
            signature,
            string_to_sign: string_to_sign.into_bytes(),
            token: self.credentials.session_token.clone(),
        }
    }

    /// Builds the canonical request: POST to `/`, empty payload, headers
    /// lowercased and alphabetically sorted.
    fn canonical_request(&self, amz_date: &str) -> String {
        let empty_payload_hash = hex::encode(Sha256::digest(b""));

        let mut headers = vec![
            ("content-type", CONTENT_TYPE.to_string()),
            ("host", CANONICAL_HOST.to_string()),
            ("x-amz-date", amz_date.to_string()),
        ];
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token", token.clone()));
        }
        headers.sort_by(|a, b| a.0.cmp(b.0));

        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{}:{}\n", name, value))
            .collect();
        let signed_headers: Vec<&str> = headers.iter().map(|(name, _)| *name).collect();

        format!(
            "POST\n/\n\n{}\n{}\n{}",
            canonical_headers,
            signed_headers.join(";"),
            empty_payload_hash
        )
    }
}

#[async_trait]
impl RequestSigner for SigV4Signer {
    async fn sign(&self) -> Result<SignedRequest> {
        Ok(self.sign_at(Utc::now()))
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// A signer that always fails; stands in when credentials are missing.
#[derive(Debug, Default)]
pub struct MissingCredentials;

#[async_trait]
impl RequestSigner for MissingCredentials {
    async fn sign(&self) -> Result<SignedRequest> {
        Err(DaxError::AuthFailed("no credentials configured".to_string()))
    }
}
