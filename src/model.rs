//! Data models for Twitter API records and stored rows.
//!
//! `Api*` structures mirror the v1.1 REST JSON payloads; the plain structures
//! are the normalized rows kept in `SQLite`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user object as returned by the API.
///
/// `follower`, `me` and `analyzed` never come from the API; the sync cycle
/// sets them before handing the record to the upsert layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiUser {
    pub id_str: String,
    pub name: String,
    pub screen_name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub favourites_count: Option<i64>,
    pub friends_count: Option<i64>,
    pub followers_count: Option<i64>,
    pub statuses_count: Option<i64>,
    pub listed_count: Option<i64>,
    pub verified: Option<bool>,
    pub protected: Option<bool>,
    pub blocked_by: Option<bool>,
    pub blocking: Option<bool>,
    pub contributors_enabled: Option<bool>,
    pub follow_request_sent: Option<bool>,
    pub muting: Option<bool>,
    pub live_following: Option<bool>,
    pub following: Option<bool>,
    pub follower: bool,
    pub me: bool,
    pub analyzed: bool,
}

impl From<&UserMention> for ApiUser {
    fn from(mention: &UserMention) -> Self {
        Self {
            id_str: mention.id_str.clone(),
            name: mention.name.clone(),
            screen_name: mention.screen_name.clone(),
            ..Self::default()
        }
    }
}

/// A tweet object as returned by the API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiTweet {
    pub id_str: String,
    pub created_at: String,
    pub text: Option<String>,
    pub full_text: Option<String>,
    pub user: ApiUser,
    pub favorite_count: Option<i64>,
    pub favorited: Option<bool>,
    pub retweet_count: Option<i64>,
    pub retweeted: Option<bool>,
    pub in_reply_to_status_id_str: Option<String>,
    pub in_reply_to_user_id_str: Option<String>,
    pub entities: Entities,
    /// Set locally for records pulled from the favorites feed.
    pub my_favorite: bool,
}

impl ApiTweet {
    /// Tweet body, preferring the extended-mode `full_text`.
    #[must_use]
    pub fn body(&self) -> &str {
        self.full_text
            .as_deref()
            .or(self.text.as_deref())
            .unwrap_or_default()
    }
}

/// Entities extracted by the API from a tweet body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Entities {
    pub urls: Vec<UrlEntity>,
    pub user_mentions: Vec<UserMention>,
}

/// A URL in a tweet
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlEntity {
    pub url: String,
    pub expanded_url: Option<String>,
}

impl UrlEntity {
    /// The expanded URL when the API provided one, the t.co link otherwise.
    #[must_use]
    pub fn target(&self) -> &str {
        self.expanded_url.as_deref().unwrap_or(&self.url)
    }
}

/// A user mention in a tweet
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserMention {
    pub id_str: String,
    pub screen_name: String,
    pub name: String,
}

/// One page of a cursor-paginated user list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserPage {
    pub users: Vec<ApiUser>,
    pub next_cursor: i64,
}

/// A stored user row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct User {
    pub id: String,
    pub name: String,
    pub screen_name: String,
    pub description: String,
    pub location: String,
    pub favourites_count: i64,
    pub friends_count: i64,
    pub followers_count: i64,
    pub statuses_count: i64,
    pub listed_count: i64,
    pub verified: bool,
    pub protected: bool,
    pub blocked_by: bool,
    pub blocking: bool,
    pub contributors_enabled: bool,
    pub follow_request_sent: bool,
    pub muting: bool,
    pub live_following: bool,
    pub friend: bool,
    pub follower: bool,
    pub me: bool,
    pub analyzed: bool,
    pub suspended: bool,
}

impl From<&ApiUser> for User {
    fn from(data: &ApiUser) -> Self {
        Self {
            id: data.id_str.clone(),
            name: data.name.clone(),
            screen_name: data.screen_name.clone(),
            description: data.description.clone().unwrap_or_default(),
            location: data.location.clone().unwrap_or_default(),
            favourites_count: data.favourites_count.unwrap_or(0),
            friends_count: data.friends_count.unwrap_or(0),
            followers_count: data.followers_count.unwrap_or(0),
            statuses_count: data.statuses_count.unwrap_or(0),
            listed_count: data.listed_count.unwrap_or(0),
            verified: data.verified.unwrap_or(false),
            protected: data.protected.unwrap_or(false),
            blocked_by: data.blocked_by.unwrap_or(false),
            blocking: data.blocking.unwrap_or(false),
            contributors_enabled: data.contributors_enabled.unwrap_or(false),
            follow_request_sent: data.follow_request_sent.unwrap_or(false),
            muting: data.muting.unwrap_or(false),
            live_following: data.live_following.unwrap_or(false),
            friend: data.following.unwrap_or(false),
            follower: data.follower,
            me: data.me,
            analyzed: data.analyzed,
            suspended: false,
        }
    }
}

/// A stored tweet row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub user_id: String,
    pub favorite_count: i64,
    pub favorited: bool,
    pub my_favorite: bool,
    pub in_reply_to_status_id: Option<String>,
    pub in_reply_to_user_id: Option<String>,
    pub retweet_count: i64,
    pub retweeted: bool,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub polarity: f64,
    pub subjectivity: f64,
}

/// A stored URL row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredUrl {
    pub id: i64,
    pub url: String,
    pub domain: String,
    pub tweet_id: String,
}

/// Tweet search hit with the author's screen name resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetMatch {
    pub screen_name: String,
    #[serde(flatten)]
    pub tweet: Tweet,
}

/// A user flagged by the troll heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Troll {
    pub user_id: String,
    pub screen_name: String,
    pub polarity: f64,
    pub subjectivity: f64,
}

/// Row counts and watermarks of the local store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbStats {
    pub users_count: i64,
    pub analyzed_users_count: i64,
    pub suspended_users_count: i64,
    pub tweets_count: i64,
    pub urls_count: i64,
    pub mentions_count: i64,
    pub first_tweet_date: Option<DateTime<Utc>>,
    pub last_tweet_date: Option<DateTime<Utc>>,
    pub watermarks: Vec<(String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_user_defaults_missing_fields() {
        let user: ApiUser = serde_json::from_str(
            r#"{"id_str": "12", "name": "Ada", "screen_name": "ada", "description": null,
                "following": true, "verified": null}"#,
        )
        .unwrap();
        let row = User::from(&user);
        assert_eq!(row.id, "12");
        assert_eq!(row.description, "");
        assert_eq!(row.followers_count, 0);
        assert!(row.friend);
        assert!(!row.verified);
        assert!(!row.analyzed);
    }

    #[test]
    fn api_tweet_prefers_full_text() {
        let tweet: ApiTweet = serde_json::from_str(
            r#"{"id_str": "1", "text": "short", "full_text": "the full text",
                "user": {"id_str": "2", "name": "B", "screen_name": "b"}}"#,
        )
        .unwrap();
        assert_eq!(tweet.body(), "the full text");
        assert!(tweet.entities.urls.is_empty());
        assert!(!tweet.my_favorite);
    }

    #[test]
    fn url_entity_falls_back_to_short_link() {
        let entity = UrlEntity {
            url: "https://t.co/abc".to_string(),
            expanded_url: None,
        };
        assert_eq!(entity.target(), "https://t.co/abc");
    }

    #[test]
    fn mention_converts_to_bare_user() {
        let mention = UserMention {
            id_str: "99".to_string(),
            screen_name: "someone".to_string(),
            name: "Some One".to_string(),
        };
        let user = ApiUser::from(&mention);
        assert_eq!(user.id_str, "99");
        assert_eq!(user.screen_name, "someone");
        assert!(user.following.is_none());
    }
}
