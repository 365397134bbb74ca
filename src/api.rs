//! The Twitter API as seen by the sync cycle.
//!
//! [`TwitterApi`] is the seam between ingestion and the network. The
//! production implementation is [`crate::client::RestClient`]; tests plug in
//! in-memory fakes.

use crate::error::Result;
use crate::model::{ApiTweet, ApiUser};
use async_trait::async_trait;

/// Twitter error code for "User has been suspended" (sent with HTTP 403).
pub const SUSPENDED_ERROR_CODE: i64 = 63;

/// Number of records requested per page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: u32 = 200;

/// Id-paginated tweet feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TweetFeed {
    Mentions,
    UserTimeline,
    HomeTimeline,
    Favorites,
}

impl TweetFeed {
    /// Every feed, in the order the sync cycle pulls them.
    pub const ALL: [Self; 4] = [
        Self::Mentions,
        Self::UserTimeline,
        Self::HomeTimeline,
        Self::Favorites,
    ];

    /// REST path, relative to the API base URL.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Mentions => "statuses/mentions_timeline",
            Self::UserTimeline => "statuses/user_timeline",
            Self::HomeTimeline => "statuses/home_timeline",
            Self::Favorites => "favorites/list",
        }
    }

    /// Setting that stores this feed's since-id watermark.
    #[must_use]
    pub const fn watermark_setting(self) -> &'static str {
        match self {
            Self::Mentions => "user-mentions-last-id",
            Self::UserTimeline => "user-last-id",
            Self::HomeTimeline => "home-last-id",
            Self::Favorites => "favorites-last-id",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Mentions => "mentions",
            Self::UserTimeline => "own tweets",
            Self::HomeTimeline => "home timeline",
            Self::Favorites => "favorites",
        }
    }
}

/// Cursor-paginated user lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserListFeed {
    Followers,
    Friends,
}

impl UserListFeed {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Followers => "followers/list",
            Self::Friends => "friends/list",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Followers => "followers",
            Self::Friends => "friends",
        }
    }
}

/// Bounds of one page request. Unset fields are left out of the query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub count: u32,
    pub since_id: Option<u64>,
    pub max_id: Option<u64>,
    pub cursor: Option<i64>,
}

/// One page of records and, for cursor feeds, the cursor of the next page.
#[derive(Debug, Clone)]
pub struct Page<R> {
    pub records: Vec<R>,
    pub next_cursor: Option<i64>,
}

impl<R> Page<R> {
    #[must_use]
    pub const fn new(records: Vec<R>) -> Self {
        Self {
            records,
            next_cursor: None,
        }
    }

    #[must_use]
    pub const fn with_cursor(records: Vec<R>, next_cursor: i64) -> Self {
        Self {
            records,
            next_cursor: Some(next_cursor),
        }
    }

    #[must_use]
    pub const fn empty() -> Self {
        Self::new(Vec::new())
    }
}

/// Outcome of a single-user profile lookup.
#[derive(Debug, Clone)]
pub enum UserLookup {
    Found(ApiUser),
    /// The account is suspended; its profile will never be available.
    Suspended,
}

/// Read access to the Twitter REST API.
#[async_trait]
pub trait TwitterApi: Send + Sync {
    /// Profile of the authenticated account.
    async fn verify_credentials(&self) -> Result<ApiUser>;

    /// One page of an id-paginated tweet feed.
    async fn tweets(&self, feed: TweetFeed, request: &PageRequest) -> Result<Page<ApiTweet>>;

    /// One page of a cursor-paginated user list.
    async fn users(&self, feed: UserListFeed, request: &PageRequest) -> Result<Page<ApiUser>>;

    /// Full profile of one user. Suspension is an outcome, not an error.
    async fn lookup_user(&self, user_id: &str) -> Result<UserLookup>;
}
