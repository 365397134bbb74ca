//! HTTP implementation of [`TwitterApi`] over the v1.1 REST endpoints.

use crate::api::{
    Page, PageRequest, SUSPENDED_ERROR_CODE, TweetFeed, TwitterApi, UserListFeed, UserLookup,
};
use crate::config::ApiConfig;
use crate::error::{Result, TanalyzerError};
use crate::model::{ApiTweet, ApiUser, UserPage};
use crate::oauth::{self, Credentials};
use crate::storage::Storage;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com/1.1";

/// Longest slice of an unparseable error body kept in the error message.
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorBody {
    errors: Vec<ErrorItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorItem {
    code: i64,
    message: String,
}

/// Signed REST client.
#[derive(Debug)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl RestClient {
    /// Build a client with explicit credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(credentials: Credentials, config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("tanalyzer/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Build a client from the credentials stored in the settings table.
    ///
    /// # Errors
    ///
    /// Returns [`TanalyzerError::MissingSetting`] naming the first absent
    /// credential, or an error if the HTTP client cannot be constructed.
    pub fn from_storage(storage: &Storage, config: &ApiConfig) -> Result<Self> {
        let credentials = Credentials::from_storage(storage)?;
        Self::new(credentials, config)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}.json", self.base_url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let url = self.endpoint(path);
        let borrowed: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let header = oauth::authorization_header("GET", &url, &borrowed, &self.credentials)?;

        // Encode the query the same way the signature base string does.
        let query = borrowed
            .iter()
            .map(|(k, v)| format!("{}={}", oauth::percent_encode(k), oauth::percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let full_url = if query.is_empty() {
            url
        } else {
            format!("{url}?{query}")
        };

        debug!(url = %full_url, "GET");
        let response = self
            .http
            .get(&full_url)
            .header(AUTHORIZATION, header)
            .send()
            .await?;

        let status = response.status();
        log_rate_limit(path, response.headers());
        let body = response.text().await?;

        if !status.is_success() {
            return Err(parse_api_error(status.as_u16(), &body));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl TwitterApi for RestClient {
    async fn verify_credentials(&self) -> Result<ApiUser> {
        self.get(
            "account/verify_credentials",
            &[("skip_status", "true".to_string())],
        )
        .await
    }

    async fn tweets(&self, feed: TweetFeed, request: &PageRequest) -> Result<Page<ApiTweet>> {
        let records: Vec<ApiTweet> = self.get(feed.path(), &tweet_params(request)).await?;
        Ok(Page::new(records))
    }

    async fn users(&self, feed: UserListFeed, request: &PageRequest) -> Result<Page<ApiUser>> {
        let page: UserPage = self.get(feed.path(), &user_list_params(request)).await?;
        Ok(Page::with_cursor(page.users, page.next_cursor))
    }

    async fn lookup_user(&self, user_id: &str) -> Result<UserLookup> {
        let result = self
            .get("users/show", &[("user_id", user_id.to_string())])
            .await;
        classify_lookup(result)
    }
}

fn tweet_params(request: &PageRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("count", request.count.to_string()),
        ("tweet_mode", "extended".to_string()),
    ];
    if let Some(since_id) = request.since_id {
        params.push(("since_id", since_id.to_string()));
    }
    if let Some(max_id) = request.max_id {
        params.push(("max_id", max_id.to_string()));
    }
    params
}

fn user_list_params(request: &PageRequest) -> Vec<(&'static str, String)> {
    vec![
        ("count", request.count.to_string()),
        ("cursor", request.cursor.unwrap_or(-1).to_string()),
        ("skip_status", "true".to_string()),
        ("include_user_entities", "false".to_string()),
    ]
}

/// Turn a non-success response into [`TanalyzerError::Api`], keeping the
/// first Twitter error code when the body carries one.
fn parse_api_error(status: u16, body: &str) -> TanalyzerError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => {
            let first = &parsed.errors[0];
            TanalyzerError::api(status, Some(first.code), first.message.clone())
        }
        _ => {
            let snippet: String = body.chars().take(MAX_ERROR_BODY).collect();
            TanalyzerError::api(status, None, snippet)
        }
    }
}

fn classify_lookup(result: Result<ApiUser>) -> Result<UserLookup> {
    match result {
        Ok(user) => Ok(UserLookup::Found(user)),
        Err(TanalyzerError::Api {
            status: 403,
            code: Some(SUSPENDED_ERROR_CODE),
            ..
        }) => Ok(UserLookup::Suspended),
        Err(e) => Err(e),
    }
}

fn log_rate_limit(path: &str, headers: &HeaderMap) {
    let remaining = headers
        .get("x-rate-limit-remaining")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    match remaining {
        Some(0) => warn!(endpoint = path, "Rate limit exhausted"),
        Some(n) => debug!(endpoint = path, remaining = n, "Rate limit"),
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suspended_lookup_is_an_outcome() {
        let err = parse_api_error(
            403,
            r#"{"errors":[{"code":63,"message":"User has been suspended."}]}"#,
        );
        assert!(matches!(classify_lookup(Err(err)), Ok(UserLookup::Suspended)));
    }

    #[test]
    fn other_forbidden_errors_propagate() {
        let err = parse_api_error(
            403,
            r#"{"errors":[{"code":179,"message":"Not authorized to see this status."}]}"#,
        );
        match classify_lookup(Err(err)) {
            Err(TanalyzerError::Api { status, code, .. }) => {
                assert_eq!(status, 403);
                assert_eq!(code, Some(179));
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[test]
    fn not_found_propagates() {
        let err = parse_api_error(
            404,
            r#"{"errors":[{"code":50,"message":"User not found."}]}"#,
        );
        assert!(classify_lookup(Err(err)).is_err());
    }

    #[test]
    fn found_user_passes_through() {
        let user = ApiUser {
            id_str: "9".to_string(),
            ..ApiUser::default()
        };
        match classify_lookup(Ok(user)) {
            Ok(UserLookup::Found(u)) => assert_eq!(u.id_str, "9"),
            other => panic!("expected user, got {other:?}"),
        }
    }

    #[test]
    fn unparseable_error_body_is_truncated() {
        let body = "x".repeat(1000);
        match parse_api_error(502, &body) {
            TanalyzerError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 502);
                assert_eq!(code, None);
                assert_eq!(message.len(), MAX_ERROR_BODY);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn tweet_params_include_only_set_bounds() {
        let params = tweet_params(&PageRequest {
            count: 200,
            since_id: Some(10),
            max_id: None,
            cursor: None,
        });
        assert!(params.contains(&("since_id", "10".to_string())));
        assert!(params.contains(&("tweet_mode", "extended".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "max_id"));
    }

    #[test]
    fn user_list_cursor_defaults_to_first_page() {
        let params = user_list_params(&PageRequest {
            count: 200,
            ..PageRequest::default()
        });
        assert!(params.contains(&("cursor", "-1".to_string())));
    }

    #[test]
    fn endpoint_joins_base_and_path() {
        let config = ApiConfig {
            base_url: "http://localhost:9/1.1/".to_string(),
            ..ApiConfig::default()
        };
        let creds = Credentials {
            consumer_key: "a".into(),
            consumer_secret: "b".into(),
            access_token: "c".into(),
            access_secret: "d".into(),
        };
        let client = RestClient::new(creds, &config).unwrap();
        assert_eq!(
            client.endpoint("users/show"),
            "http://localhost:9/1.1/users/show.json"
        );
    }
}
