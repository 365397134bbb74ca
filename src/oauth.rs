//! OAuth 1.0a request signing (HMAC-SHA1).

use crate::error::{Result, TanalyzerError};
use crate::storage::Storage;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use std::fmt::Write;
use std::time::{SystemTime, UNIX_EPOCH};

/// Setting names the four credentials are stored under.
pub const CREDENTIAL_SETTINGS: [&str; 4] = [
    "consumer-key",
    "consumer-secret",
    "access-token",
    "access-secret",
];

/// OAuth 1.0a user-context credentials.
#[derive(Clone)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("access_token", &self.access_token)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Load the credentials saved by `tanalyze init`.
    ///
    /// # Errors
    ///
    /// Returns [`TanalyzerError::MissingSetting`] if any of the four is absent.
    pub fn from_storage(storage: &Storage) -> Result<Self> {
        let mut values = storage.get_required_settings(&CREDENTIAL_SETTINGS)?.into_iter();
        let mut next = || values.next().unwrap_or_default();
        Ok(Self {
            consumer_key: next(),
            consumer_secret: next(),
            access_token: next(),
            access_secret: next(),
        })
    }
}

/// RFC 3986 percent-encoding as OAuth requires (only unreserved characters pass).
#[must_use]
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Compute the `oauth_signature` for a request.
///
/// `params` are the request's query/body parameters, unencoded.
#[must_use]
pub fn signature(
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    credentials: &Credentials,
    nonce: &str,
    timestamp: &str,
) -> String {
    let mut all: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    for (k, v) in protocol_params(credentials, nonce, timestamp) {
        all.push((k.to_string(), percent_encode(&v)));
    }
    all.sort();

    let param_string = all
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let base_string = format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(url),
        percent_encode(&param_string)
    );
    let signing_key = format!(
        "{}&{}",
        percent_encode(&credentials.consumer_secret),
        percent_encode(&credentials.access_secret)
    );

    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, signing_key.as_bytes());
    let tag = hmac::sign(&key, base_string.as_bytes());
    BASE64.encode(tag.as_ref())
}

/// Build the `Authorization` header value for a request, with a fresh nonce
/// and the current timestamp.
///
/// # Errors
///
/// Returns [`TanalyzerError::Signing`] if no random nonce can be generated.
pub fn authorization_header(
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    credentials: &Credentials,
) -> Result<String> {
    let nonce = generate_nonce()?;
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| TanalyzerError::Signing {
            reason: e.to_string(),
        })?
        .as_secs()
        .to_string();
    Ok(header_with(method, url, params, credentials, &nonce, &timestamp))
}

fn header_with(
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    credentials: &Credentials,
    nonce: &str,
    timestamp: &str,
) -> String {
    let signature = signature(method, url, params, credentials, nonce, timestamp);

    let mut fields = protocol_params(credentials, nonce, timestamp);
    fields.push(("oauth_signature", signature));
    fields.sort_by(|a, b| a.0.cmp(b.0));

    let mut header = String::from("OAuth ");
    for (i, (k, v)) in fields.iter().enumerate() {
        if i > 0 {
            header.push_str(", ");
        }
        let _ = write!(header, "{k}=\"{}\"", percent_encode(v));
    }
    header
}

fn protocol_params(
    credentials: &Credentials,
    nonce: &str,
    timestamp: &str,
) -> Vec<(&'static str, String)> {
    vec![
        ("oauth_consumer_key", credentials.consumer_key.clone()),
        ("oauth_nonce", nonce.to_string()),
        ("oauth_signature_method", "HMAC-SHA1".to_string()),
        ("oauth_timestamp", timestamp.to_string()),
        ("oauth_token", credentials.access_token.clone()),
        ("oauth_version", "1.0".to_string()),
    ]
}

fn generate_nonce() -> Result<String> {
    let mut bytes = [0u8; 16];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| TanalyzerError::Signing {
            reason: "system random source unavailable".to_string(),
        })?;
    Ok(bytes.iter().fold(String::with_capacity(32), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference request from Twitter's "Creating a signature" guide.
    fn reference_credentials() -> Credentials {
        Credentials {
            consumer_key: "xvz1evFS4wEEPTGEFPHBog".to_string(),
            consumer_secret: "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw".to_string(),
            access_token: "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb".to_string(),
            access_secret: "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE".to_string(),
        }
    }

    const REFERENCE_NONCE: &str = "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg";
    const REFERENCE_TIMESTAMP: &str = "1318622958";
    const REFERENCE_URL: &str = "https://api.twitter.com/1.1/statuses/update.json";

    fn reference_params() -> Vec<(&'static str, &'static str)> {
        vec![
            ("include_entities", "true"),
            ("status", "Hello Ladies + Gentlemen, a signed OAuth request!"),
        ]
    }

    #[test]
    fn signature_matches_reference() {
        let sig = signature(
            "POST",
            REFERENCE_URL,
            &reference_params(),
            &reference_credentials(),
            REFERENCE_NONCE,
            REFERENCE_TIMESTAMP,
        );
        assert_eq!(sig, "hCtSmYh+iHYCEqBWrE7C7hYmtUk=");
    }

    #[test]
    fn header_lists_sorted_encoded_fields() {
        let header = header_with(
            "POST",
            REFERENCE_URL,
            &reference_params(),
            &reference_credentials(),
            REFERENCE_NONCE,
            REFERENCE_TIMESTAMP,
        );
        assert!(header.starts_with("OAuth oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\""));
        assert!(header.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""));
        assert!(header.ends_with("oauth_version=\"1.0\""));
    }

    #[test]
    fn percent_encode_keeps_only_unreserved() {
        assert_eq!(percent_encode("a-b_c.d~e"), "a-b_c.d~e");
        assert_eq!(percent_encode("a b+c!"), "a%20b%2Bc%21");
    }

    #[test]
    fn nonce_is_fresh_hex() {
        let a = generate_nonce().unwrap();
        let b = generate_nonce().unwrap();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn credentials_require_all_settings() {
        let storage = Storage::open_memory().unwrap();
        storage.set_setting("consumer-key", "k").unwrap();
        assert!(matches!(
            Credentials::from_storage(&storage),
            Err(TanalyzerError::MissingSetting { .. })
        ));

        for name in CREDENTIAL_SETTINGS {
            storage.set_setting(name, &format!("{name}-value")).unwrap();
        }
        let creds = Credentials::from_storage(&storage).unwrap();
        assert_eq!(creds.access_secret, "access-secret-value");
        assert!(!format!("{creds:?}").contains("access-secret-value"));
    }
}
