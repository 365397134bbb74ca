//! `SQLite` storage for collected Twitter data.
//!
//! Holds the five tables the tool works with (settings, users, tweets, urls,
//! mentions) plus a `meta` table for the schema version. Everything here is
//! row-level; the create-or-update policy lives in [`crate::ingest`].

use crate::error::{Result, TanalyzerError};
use crate::model::{DbStats, StoredUrl, Tweet, User};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use std::path::Path;
use tracing::{debug, info};

const SCHEMA_VERSION: i32 = 1;

/// Setting names under which pagination watermarks are stored all share this suffix.
pub const WATERMARK_SUFFIX: &str = "-last-id";

const USER_COLUMNS: &str = "id, name, screen_name, description, location, favourites_count, \
     friends_count, followers_count, statuses_count, listed_count, verified, protected, \
     blocked_by, blocking, contributors_enabled, follow_request_sent, muting, live_following, \
     friend, follower, me, analyzed, suspended";

const TWEET_COLUMNS: &str = "id, user_id, favorite_count, favorited, my_favorite, \
     in_reply_to_status_id, in_reply_to_user_id_str, retweet_count, retweeted, text, \
     created_at, polarity, subjectivity";

const fn epoch_utc() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

fn parse_rfc3339_or_epoch(value: Option<String>) -> DateTime<Utc> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map_or_else(epoch_utc, |dt| dt.with_timezone(&Utc))
}

fn parse_rfc3339_opt(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Result of attempting to insert a row keyed by an external id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same key already exists; nothing was written.
    Duplicate,
}

/// `SQLite` storage manager
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open or create the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())?;

        // Set pragmas for performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    /// Open an existing database, failing if the file has not been created yet.
    ///
    /// # Errors
    ///
    /// Returns [`TanalyzerError::DatabaseNotFound`] when the file is missing.
    pub fn open_existing(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref();
        if !path.exists() {
            return Err(TanalyzerError::database_not_found(path));
        }
        Self::open(path)
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be initialized.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            ",
        )?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    /// Get a reference to the underlying database connection.
    ///
    /// This is useful for modules that need to execute custom queries.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let current_version = self.get_schema_version();

        if current_version < SCHEMA_VERSION {
            info!(
                "Migrating database from version {} to {}",
                current_version, SCHEMA_VERSION
            );
            self.create_schema()?;
            self.set_schema_version(SCHEMA_VERSION)?;
        }

        Ok(())
    }

    fn get_schema_version(&self) -> i32 {
        let result: std::result::Result<i32, _> = self.conn.query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| {
                let value: String = row.get(0)?;
                Ok(value.parse().unwrap_or(0))
            },
        );

        // Treat missing schema table as version 0.
        result.unwrap_or_default()
    }

    fn set_schema_version(&self, version: i32) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?)",
            params![version.to_string()],
        )?;
        Ok(())
    }

    fn create_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r"
            -- Metadata table
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            -- Credentials and pagination watermarks
            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                value TEXT
            );

            -- Users
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT,
                screen_name TEXT,
                description TEXT,
                location TEXT,
                favourites_count INTEGER DEFAULT 0,
                friends_count INTEGER DEFAULT 0,
                followers_count INTEGER DEFAULT 0,
                statuses_count INTEGER DEFAULT 0,
                listed_count INTEGER DEFAULT 0,
                verified INTEGER DEFAULT 0,
                protected INTEGER DEFAULT 0,
                blocked_by INTEGER DEFAULT 0,
                blocking INTEGER DEFAULT 0,
                contributors_enabled INTEGER DEFAULT 0,
                follow_request_sent INTEGER DEFAULT 0,
                muting INTEGER DEFAULT 0,
                live_following INTEGER DEFAULT 0,
                friend INTEGER DEFAULT 0,
                follower INTEGER DEFAULT 0,
                me INTEGER DEFAULT 0,
                analyzed INTEGER DEFAULT 0,
                suspended INTEGER DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_users_screen_name ON users(screen_name);
            CREATE INDEX IF NOT EXISTS idx_users_name ON users(name);
            CREATE INDEX IF NOT EXISTS idx_users_analyzed ON users(analyzed);
            CREATE INDEX IF NOT EXISTS idx_users_me ON users(me);

            -- Tweets
            CREATE TABLE IF NOT EXISTS tweets (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                favorite_count INTEGER DEFAULT 0,
                favorited INTEGER DEFAULT 0,
                my_favorite INTEGER DEFAULT 0,
                in_reply_to_status_id TEXT,
                in_reply_to_user_id_str TEXT,
                retweet_count INTEGER DEFAULT 0,
                retweeted INTEGER DEFAULT 0,
                text TEXT NOT NULL,
                created_at TEXT NOT NULL,
                polarity REAL DEFAULT 0,
                subjectivity REAL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_tweets_user_id ON tweets(user_id);
            CREATE INDEX IF NOT EXISTS idx_tweets_created_at ON tweets(created_at);
            CREATE INDEX IF NOT EXISTS idx_tweets_reply_to_user ON tweets(in_reply_to_user_id_str);

            -- URLs extracted from tweets
            CREATE TABLE IF NOT EXISTS urls (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                domain TEXT,
                tweet_id TEXT NOT NULL REFERENCES tweets(id)
            );
            CREATE INDEX IF NOT EXISTS idx_urls_url ON urls(url);
            CREATE INDEX IF NOT EXISTS idx_urls_domain ON urls(domain);

            -- Mentions
            CREATE TABLE IF NOT EXISTS mentions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tweet_id TEXT NOT NULL REFERENCES tweets(id),
                user_id TEXT NOT NULL REFERENCES users(id)
            );
            CREATE INDEX IF NOT EXISTS idx_mentions_tweet ON mentions(tweet_id);
            CREATE INDEX IF NOT EXISTS idx_mentions_user ON mentions(user_id);
            ",
        )?;

        Ok(())
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Read a setting value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_setting(&self, name: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE name = ?",
                params![name],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(value.flatten())
    }

    /// Create or overwrite a setting.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub fn set_setting(&self, name: &str, value: &str) -> Result<()> {
        self.conn.execute(
            r"
            INSERT INTO settings (name, value) VALUES (?1, ?2)
            ON CONFLICT(name) DO UPDATE SET value = excluded.value
            ",
            params![name, value],
        )?;
        debug!(setting = name, "Stored setting");
        Ok(())
    }

    /// Read several settings, failing on the first one that is missing.
    ///
    /// # Errors
    ///
    /// Returns [`TanalyzerError::MissingSetting`] naming the absent setting.
    pub fn get_required_settings(&self, names: &[&str]) -> Result<Vec<String>> {
        names
            .iter()
            .map(|name| {
                self.get_setting(name)?
                    .ok_or_else(|| TanalyzerError::missing_setting(*name))
            })
            .collect()
    }

    /// All stored pagination watermarks, by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn watermarks(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, value FROM settings WHERE name LIKE '%' || ? ORDER BY name",
        )?;
        let rows = stmt
            .query_map(params![WATERMARK_SUFFIX], |row| {
                Ok((row.get(0)?, row.get::<_, Option<String>>(1)?.unwrap_or_default()))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Fetch a user by external id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        Ok(self
            .conn
            .query_row(&sql, params![id], user_from_row)
            .optional()?)
    }

    /// The authenticated account, once `update` has stored it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_me(&self) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE me = 1 LIMIT 1");
        Ok(self.conn.query_row(&sql, [], user_from_row).optional()?)
    }

    /// Insert a new user row.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails (including a duplicate id).
    pub fn insert_user(&self, user: &User) -> Result<()> {
        let sql = format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, \
              ?19, ?20, ?21, ?22, ?23)"
        );
        self.conn.execute(
            &sql,
            params![
                user.id,
                user.name,
                user.screen_name,
                user.description,
                user.location,
                user.favourites_count,
                user.friends_count,
                user.followers_count,
                user.statuses_count,
                user.listed_count,
                user.verified,
                user.protected,
                user.blocked_by,
                user.blocking,
                user.contributors_enabled,
                user.follow_request_sent,
                user.muting,
                user.live_following,
                user.friend,
                user.follower,
                user.me,
                user.analyzed,
                user.suspended,
            ],
        )?;
        Ok(())
    }

    /// Overwrite every mutable column of an existing user.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn update_user(&self, user: &User) -> Result<()> {
        self.conn.execute(
            r"
            UPDATE users SET
                name = ?2, screen_name = ?3, description = ?4, location = ?5,
                favourites_count = ?6, friends_count = ?7, followers_count = ?8,
                statuses_count = ?9, listed_count = ?10, verified = ?11, protected = ?12,
                blocked_by = ?13, blocking = ?14, contributors_enabled = ?15,
                follow_request_sent = ?16, muting = ?17, live_following = ?18,
                friend = ?19, follower = ?20, me = ?21, analyzed = ?22, suspended = ?23
            WHERE id = ?1
            ",
            params![
                user.id,
                user.name,
                user.screen_name,
                user.description,
                user.location,
                user.favourites_count,
                user.friends_count,
                user.followers_count,
                user.statuses_count,
                user.listed_count,
                user.verified,
                user.protected,
                user.blocked_by,
                user.blocking,
                user.contributors_enabled,
                user.follow_request_sent,
                user.muting,
                user.live_following,
                user.friend,
                user.follower,
                user.me,
                user.analyzed,
                user.suspended,
            ],
        )?;
        Ok(())
    }

    /// Mark a user as suspended. Suspended users are also marked analyzed so
    /// they are never looked up again.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn mark_suspended(&self, id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET suspended = 1, analyzed = 1 WHERE id = ?",
            params![id],
        )?;
        Ok(())
    }

    /// Users whose profile has not been fetched yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn unanalyzed_users(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE analyzed = 0 ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    // =========================================================================
    // Tweets
    // =========================================================================

    /// Insert a tweet row, reporting a primary key clash instead of failing.
    ///
    /// # Errors
    ///
    /// Returns an error for any failure other than a uniqueness violation.
    pub fn insert_tweet(&self, tweet: &Tweet) -> Result<InsertOutcome> {
        let sql = format!(
            "INSERT INTO tweets ({TWEET_COLUMNS}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        );
        let result = self.conn.execute(
            &sql,
            params![
                tweet.id,
                tweet.user_id,
                tweet.favorite_count,
                tweet.favorited,
                tweet.my_favorite,
                tweet.in_reply_to_status_id,
                tweet.in_reply_to_user_id,
                tweet.retweet_count,
                tweet.retweeted,
                tweet.text,
                tweet.created_at.to_rfc3339(),
                tweet.polarity,
                tweet.subjectivity,
            ],
        );

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation
                    && self.tweet_exists(&tweet.id)? =>
            {
                Ok(InsertOutcome::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite every column of an existing tweet except its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn update_tweet(&self, tweet: &Tweet) -> Result<()> {
        self.conn.execute(
            r"
            UPDATE tweets SET
                user_id = ?2, favorite_count = ?3, favorited = ?4, my_favorite = ?5,
                in_reply_to_status_id = ?6, in_reply_to_user_id_str = ?7,
                retweet_count = ?8, retweeted = ?9, text = ?10, created_at = ?11,
                polarity = ?12, subjectivity = ?13
            WHERE id = ?1
            ",
            params![
                tweet.id,
                tweet.user_id,
                tweet.favorite_count,
                tweet.favorited,
                tweet.my_favorite,
                tweet.in_reply_to_status_id,
                tweet.in_reply_to_user_id,
                tweet.retweet_count,
                tweet.retweeted,
                tweet.text,
                tweet.created_at.to_rfc3339(),
                tweet.polarity,
                tweet.subjectivity,
            ],
        )?;
        Ok(())
    }

    fn tweet_exists(&self, id: &str) -> Result<bool> {
        Ok(self
            .conn
            .query_row("SELECT 1 FROM tweets WHERE id = ?", params![id], |_| Ok(()))
            .optional()?
            .is_some())
    }

    /// Retrieve a tweet by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_tweet(&self, id: &str) -> Result<Option<Tweet>> {
        let sql = format!("SELECT {TWEET_COLUMNS} FROM tweets WHERE id = ?");
        Ok(self
            .conn
            .query_row(&sql, params![id], tweet_from_row)
            .optional()?)
    }

    /// Number of tweets `user_id` has sent in reply to `reply_to_user_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn count_replies(&self, user_id: &str, reply_to_user_id: &str) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM tweets WHERE user_id = ? AND in_reply_to_user_id_str = ?",
            params![user_id, reply_to_user_id],
            |row| row.get(0),
        )?)
    }

    // =========================================================================
    // Urls and mentions
    // =========================================================================

    /// Record a URL found in a tweet.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn insert_url(&self, tweet_id: &str, url: &str, domain: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO urls (url, domain, tweet_id) VALUES (?, ?, ?)",
            params![url, domain, tweet_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// URLs recorded for a tweet, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn urls_for_tweet(&self, tweet_id: &str) -> Result<Vec<StoredUrl>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, url, domain, tweet_id FROM urls WHERE tweet_id = ? ORDER BY id")?;
        let urls = stmt
            .query_map(params![tweet_id], |row| {
                Ok(StoredUrl {
                    id: row.get(0)?,
                    url: row.get(1)?,
                    domain: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    tweet_id: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(urls)
    }

    /// Record that a tweet mentions a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn insert_mention(&self, tweet_id: &str, user_id: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO mentions (tweet_id, user_id) VALUES (?, ?)",
            params![tweet_id, user_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Ids of the users mentioned by a tweet, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn mentions_for_tweet(&self, tweet_id: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id FROM mentions WHERE tweet_id = ? ORDER BY id")?;
        let ids = stmt
            .query_map(params![tweet_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Get row counts, tweet date bounds and watermarks.
    ///
    /// # Errors
    ///
    /// Returns an error if statistics queries fail.
    pub fn get_stats(&self) -> Result<DbStats> {
        let query = r"
            SELECT
                (SELECT COUNT(*) FROM users) AS users_count,
                (SELECT COUNT(*) FROM users WHERE analyzed = 1) AS analyzed_users_count,
                (SELECT COUNT(*) FROM users WHERE suspended = 1) AS suspended_users_count,
                (SELECT COUNT(*) FROM tweets) AS tweets_count,
                (SELECT COUNT(*) FROM urls) AS urls_count,
                (SELECT COUNT(*) FROM mentions) AS mentions_count,
                (SELECT MIN(created_at) FROM tweets) AS first_tweet_date,
                (SELECT MAX(created_at) FROM tweets) AS last_tweet_date
        ";

        let mut stats = self.conn.query_row(query, [], |row| {
            Ok(DbStats {
                users_count: row.get(0)?,
                analyzed_users_count: row.get(1)?,
                suspended_users_count: row.get(2)?,
                tweets_count: row.get(3)?,
                urls_count: row.get(4)?,
                mentions_count: row.get(5)?,
                first_tweet_date: parse_rfc3339_opt(row.get(6)?),
                last_tweet_date: parse_rfc3339_opt(row.get(7)?),
                watermarks: Vec::new(),
            })
        })?;
        stats.watermarks = self.watermarks()?;
        Ok(stats)
    }
}

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        screen_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        description: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        location: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        favourites_count: row.get(5)?,
        friends_count: row.get(6)?,
        followers_count: row.get(7)?,
        statuses_count: row.get(8)?,
        listed_count: row.get(9)?,
        verified: row.get(10)?,
        protected: row.get(11)?,
        blocked_by: row.get(12)?,
        blocking: row.get(13)?,
        contributors_enabled: row.get(14)?,
        follow_request_sent: row.get(15)?,
        muting: row.get(16)?,
        live_following: row.get(17)?,
        friend: row.get(18)?,
        follower: row.get(19)?,
        me: row.get(20)?,
        analyzed: row.get(21)?,
        suspended: row.get(22)?,
    })
}

pub(crate) fn tweet_from_row(row: &Row<'_>) -> rusqlite::Result<Tweet> {
    Ok(Tweet {
        id: row.get(0)?,
        user_id: row.get(1)?,
        favorite_count: row.get(2)?,
        favorited: row.get(3)?,
        my_favorite: row.get(4)?,
        in_reply_to_status_id: row.get(5)?,
        in_reply_to_user_id: row.get(6)?,
        retweet_count: row.get(7)?,
        retweeted: row.get(8)?,
        text: row.get(9)?,
        created_at: parse_rfc3339_or_epoch(row.get::<_, Option<String>>(10)?),
        polarity: row.get(11)?,
        subjectivity: row.get(12)?,
    })
}

/// Number of columns [`tweet_from_row`] reads; extra columns may follow.
pub(crate) const TWEET_COLUMN_COUNT: usize = 13;

/// Column list for selecting tweets with [`tweet_from_row`], prefixed by table alias.
pub(crate) fn tweet_columns(alias: &str) -> String {
    TWEET_COLUMNS
        .split(", ")
        .map(|col| format!("{alias}.{col}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Column list for selecting users with [`user_from_row`].
pub(crate) const fn user_columns() -> &'static str {
    USER_COLUMNS
}
