//! Create-or-update policy for users and tweets pulled from the API.

use crate::cache::UserCache;
use crate::error::{Result, TanalyzerError};
use crate::model::{ApiTweet, ApiUser, Tweet, User};
use crate::sentiment::SentimentScorer;
use crate::storage::{InsertOutcome, Storage};
use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

/// What happened to a tweet handed to [`Ingestor::upsert_tweet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweetOutcome {
    /// New row, with its urls and mentions extracted.
    Inserted,
    /// Already stored; counters and scores were refreshed.
    Updated,
}

/// Writes API records into storage, one run at a time.
///
/// Owns the run's [`UserCache`]; drop the ingestor and the cache goes with it.
pub struct Ingestor<'a> {
    storage: &'a Storage,
    scorer: &'a dyn SentimentScorer,
    cache: UserCache,
}

impl<'a> Ingestor<'a> {
    #[must_use]
    pub fn new(storage: &'a Storage, scorer: &'a dyn SentimentScorer, cache: UserCache) -> Self {
        Self {
            storage,
            scorer,
            cache,
        }
    }

    #[must_use]
    pub const fn cache(&self) -> &UserCache {
        &self.cache
    }

    /// The user with external id `id` as cached this run or stored earlier.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn known_user(&self, id: &str) -> Result<Option<User>> {
        match self.cache.get(id) {
            Some(user) => Ok(Some(user)),
            None => self.storage.get_user(id),
        }
    }

    /// Store a user unless already known; with `update`, overwrite the stored
    /// row with the record's values.
    ///
    /// # Errors
    ///
    /// Returns an error if the record has no id or the database write fails.
    pub fn upsert_user(&mut self, raw: &ApiUser, update: bool) -> Result<User> {
        if raw.id_str.is_empty() {
            return Err(TanalyzerError::Other(anyhow::anyhow!(
                "user record without id_str (screen name '{}')",
                raw.screen_name
            )));
        }

        let user = match self.known_user(&raw.id_str)? {
            None => {
                let user = User::from(raw);
                self.storage.insert_user(&user)?;
                trace!(id = %user.id, screen_name = %user.screen_name, "Inserted user");
                user
            }
            Some(_) if update => {
                let user = User::from(raw);
                self.storage.update_user(&user)?;
                trace!(id = %user.id, screen_name = %user.screen_name, "Updated user");
                user
            }
            Some(stored) => stored,
        };

        self.cache.insert(user.clone());
        Ok(user)
    }

    /// Store a tweet with its sentiment, urls and mentions. A tweet that is
    /// already stored only gets its mutable fields refreshed.
    ///
    /// # Errors
    ///
    /// Returns an error if any database write fails.
    pub fn upsert_tweet(&mut self, raw: &ApiTweet) -> Result<TweetOutcome> {
        let author = self.upsert_user(&raw.user, false)?;
        let text = raw.body();
        let sentiment = self.scorer.score(text);

        let tweet = Tweet {
            id: raw.id_str.clone(),
            user_id: author.id,
            favorite_count: raw.favorite_count.unwrap_or(0),
            favorited: raw.favorited.unwrap_or(false),
            my_favorite: raw.my_favorite,
            in_reply_to_status_id: raw.in_reply_to_status_id_str.clone(),
            in_reply_to_user_id: raw.in_reply_to_user_id_str.clone(),
            retweet_count: raw.retweet_count.unwrap_or(0),
            retweeted: raw.retweeted.unwrap_or(false),
            text: text.to_string(),
            created_at: parse_created_at(&raw.created_at),
            polarity: sentiment.polarity,
            subjectivity: sentiment.subjectivity,
        };

        if self.storage.insert_tweet(&tweet)? == InsertOutcome::Duplicate {
            self.storage.update_tweet(&tweet)?;
            trace!(id = %tweet.id, "Refreshed tweet");
            return Ok(TweetOutcome::Updated);
        }

        for url in &raw.entities.urls {
            let target = url.target();
            self.storage.insert_url(&tweet.id, target, &domain_of(target))?;
        }
        for mention in &raw.entities.user_mentions {
            if mention.id_str.is_empty() {
                continue;
            }
            self.upsert_user(&ApiUser::from(mention), false)?;
            self.storage.insert_mention(&tweet.id, &mention.id_str)?;
        }

        debug!(
            id = %tweet.id,
            polarity = tweet.polarity,
            subjectivity = tweet.subjectivity,
            "Inserted tweet"
        );
        Ok(TweetOutcome::Inserted)
    }
}

/// Parse a tweet timestamp ("Wed Oct 10 20:19:24 +0000 2018"), accepting
/// RFC 3339 as well. Unparseable values fall back to the Unix epoch.
#[must_use]
pub fn parse_created_at(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_str(value, "%a %b %d %H:%M:%S %z %Y")
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map_or_else(
            |_| {
                warn!(value, "Unparseable tweet timestamp");
                DateTime::<Utc>::UNIX_EPOCH
            },
            |dt| dt.with_timezone(&Utc),
        )
}

/// Host (and explicit port) of a URL, or an empty string if it has none.
#[must_use]
pub fn domain_of(url: &str) -> String {
    let Ok(parsed) = url::Url::parse(url) else {
        return String::new();
    };
    match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entities, UrlEntity, UserMention};
    use crate::sentiment::LexiconScorer;
    use chrono::{Datelike, Timelike};

    fn api_user(id: &str, screen_name: &str) -> ApiUser {
        ApiUser {
            id_str: id.to_string(),
            name: screen_name.to_uppercase(),
            screen_name: screen_name.to_string(),
            followers_count: Some(10),
            ..ApiUser::default()
        }
    }

    fn api_tweet(id: &str, author: ApiUser, text: &str) -> ApiTweet {
        ApiTweet {
            id_str: id.to_string(),
            created_at: "Wed Oct 10 20:19:24 +0000 2018".to_string(),
            full_text: Some(text.to_string()),
            user: author,
            favorite_count: Some(1),
            ..ApiTweet::default()
        }
    }

    #[test]
    fn new_user_is_inserted_with_defaults() {
        let storage = Storage::open_memory().unwrap();
        let scorer = LexiconScorer::new();
        let mut ingestor = Ingestor::new(&storage, &scorer, UserCache::new(16));

        let user = ingestor.upsert_user(&api_user("1", "alice"), false).unwrap();
        assert_eq!(user.followers_count, 10);
        assert_eq!(user.friends_count, 0);
        assert!(!user.suspended);
        assert_eq!(storage.get_user("1").unwrap().unwrap(), user);
    }

    #[test]
    fn existing_user_untouched_without_update() {
        let storage = Storage::open_memory().unwrap();
        let scorer = LexiconScorer::new();
        let mut ingestor = Ingestor::new(&storage, &scorer, UserCache::new(16));
        ingestor.upsert_user(&api_user("1", "alice"), false).unwrap();

        let mut changed = api_user("1", "alice_renamed");
        changed.followers_count = Some(99);
        let user = ingestor.upsert_user(&changed, false).unwrap();

        assert_eq!(user.screen_name, "alice");
        assert_eq!(storage.get_user("1").unwrap().unwrap().followers_count, 10);
    }

    #[test]
    fn update_overwrites_and_refreshes_cache() {
        let storage = Storage::open_memory().unwrap();
        let scorer = LexiconScorer::new();
        let mut ingestor = Ingestor::new(&storage, &scorer, UserCache::new(16));
        ingestor.upsert_user(&api_user("1", "alice"), false).unwrap();

        let mut changed = api_user("1", "alice2");
        changed.followers_count = Some(99);
        changed.following = Some(true);
        changed.analyzed = true;
        ingestor.upsert_user(&changed, true).unwrap();

        let stored = storage.get_user("1").unwrap().unwrap();
        assert_eq!(stored.screen_name, "alice2");
        assert_eq!(stored.followers_count, 99);
        assert!(stored.friend);
        assert!(stored.analyzed);

        // A later no-update lookup sees the refreshed value, not the first one.
        let again = ingestor.upsert_user(&api_user("1", "ignored"), false).unwrap();
        assert_eq!(again.screen_name, "alice2");
    }

    #[test]
    fn known_user_falls_back_to_storage() {
        let storage = Storage::open_memory().unwrap();
        let scorer = LexiconScorer::new();
        {
            let mut first_run = Ingestor::new(&storage, &scorer, UserCache::new(16));
            first_run.upsert_user(&api_user("1", "alice"), false).unwrap();
        }

        let ingestor = Ingestor::new(&storage, &scorer, UserCache::new(16));
        let known = ingestor.known_user("1").unwrap().unwrap();
        assert_eq!(known.screen_name, "alice");
        assert!(ingestor.known_user("2").unwrap().is_none());
        assert_eq!(ingestor.cache().stats(), (0, 2));
    }

    #[test]
    fn user_without_id_is_rejected() {
        let storage = Storage::open_memory().unwrap();
        let scorer = LexiconScorer::new();
        let mut ingestor = Ingestor::new(&storage, &scorer, UserCache::new(16));
        assert!(ingestor.upsert_user(&ApiUser::default(), false).is_err());
    }

    #[test]
    fn tweet_insert_extracts_children() {
        let storage = Storage::open_memory().unwrap();
        let scorer = LexiconScorer::new();
        let mut ingestor = Ingestor::new(&storage, &scorer, UserCache::new(16));

        let mut tweet = api_tweet("100", api_user("1", "alice"), "what a great read");
        tweet.entities = Entities {
            urls: vec![UrlEntity {
                url: "https://t.co/abc".to_string(),
                expanded_url: Some("https://example.com:8080/post".to_string()),
            }],
            user_mentions: vec![UserMention {
                id_str: "2".to_string(),
                screen_name: "bob".to_string(),
                name: "Bob".to_string(),
            }],
        };

        let outcome = ingestor.upsert_tweet(&tweet).unwrap();
        assert_eq!(outcome, TweetOutcome::Inserted);

        let stored = storage.get_tweet("100").unwrap().unwrap();
        assert_eq!(stored.user_id, "1");
        assert!((stored.polarity - 0.8).abs() < 1e-9);
        assert_eq!(stored.created_at.year(), 2018);
        assert_eq!(stored.created_at.hour(), 20);

        let urls = storage.urls_for_tweet("100").unwrap();
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].url, "https://example.com:8080/post");
        assert_eq!(urls[0].domain, "example.com:8080");

        assert_eq!(storage.mentions_for_tweet("100").unwrap(), vec!["2"]);
        let bob = storage.get_user("2").unwrap().unwrap();
        assert_eq!(bob.screen_name, "bob");
        assert!(!bob.analyzed);
    }

    #[test]
    fn second_upsert_updates_without_duplicating_children() {
        let storage = Storage::open_memory().unwrap();
        let scorer = LexiconScorer::new();
        let mut ingestor = Ingestor::new(&storage, &scorer, UserCache::new(16));

        let mut tweet = api_tweet("100", api_user("1", "alice"), "hello");
        tweet.entities.urls.push(UrlEntity {
            url: "https://t.co/x".to_string(),
            expanded_url: None,
        });
        assert_eq!(ingestor.upsert_tweet(&tweet).unwrap(), TweetOutcome::Inserted);

        tweet.favorite_count = Some(42);
        tweet.my_favorite = true;
        assert_eq!(ingestor.upsert_tweet(&tweet).unwrap(), TweetOutcome::Updated);

        let stored = storage.get_tweet("100").unwrap().unwrap();
        assert_eq!(stored.favorite_count, 42);
        assert!(stored.my_favorite);
        assert_eq!(storage.urls_for_tweet("100").unwrap().len(), 1);
        assert_eq!(storage.get_stats().unwrap().tweets_count, 1);
    }

    #[test]
    fn created_at_formats() {
        let twitter = parse_created_at("Fri Jan 09 15:12:21 +0000 2026");
        assert_eq!((twitter.year(), twitter.month(), twitter.day()), (2026, 1, 9));

        let rfc = parse_created_at("2020-05-01T12:00:00Z");
        assert_eq!(rfc.year(), 2020);

        assert_eq!(parse_created_at("yesterday"), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn domain_extraction() {
        assert_eq!(domain_of("https://www.example.org/a?b=c"), "www.example.org");
        assert_eq!(domain_of("http://localhost:3000/"), "localhost:3000");
        assert_eq!(domain_of("not a url"), "");
    }
}
