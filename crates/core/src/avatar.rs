// crates/core/src/avatar.rs
//! Time-bounded avatar URL cache.
//!
//! Maps a numeric user id to its avatar URL, refreshed at most once per TTL
//! window. The cache is owned by the single connection task, so a lookup in
//! flight can never race a duplicate fetch for the same id.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::LookupError;
use crate::time::Clock;

/// How long a fetched avatar URL stays valid.
pub const AVATAR_TTL_MILLIS: u64 = 3_600_000;

#[derive(Debug, Clone)]
struct CacheEntry {
    fetched_at_millis: u64,
    url: String,
}

pub struct AvatarCache {
    client: reqwest::Client,
    endpoint: String,
    clock: Arc<dyn Clock>,
    entries: HashMap<u64, CacheEntry>,
}

impl AvatarCache {
    pub fn new(endpoint: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            clock,
            entries: HashMap::new(),
        }
    }

    /// Avatar URL for the user, fetched through the lookup endpoint on a
    /// miss or once the cached entry has expired.
    ///
    /// A failed fetch leaves any previous entry untouched and returns the
    /// error; the caller degrades to a null avatar for that message only.
    pub async fn get(&mut self, uid: u64) -> Result<String, LookupError> {
        let now = self.clock.now_millis();
        if let Some(entry) = self.entries.get(&uid) {
            if now < entry.fetched_at_millis + AVATAR_TTL_MILLIS {
                return Ok(entry.url.clone());
            }
        }

        let response = self
            .client
            .get(format!("{}?mid={}", self.endpoint, uid))
            .send()
            .await?;
        let body: serde_json::Value = response.json().await?;
        let url = body
            .pointer("/data/info/face")
            .and_then(|face| face.as_str())
            .ok_or(LookupError::MissingField("data.info.face"))?
            .to_string();

        self.entries.insert(
            uid,
            CacheEntry {
                fetched_at_millis: now,
                url: url.clone(),
            },
        );
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::time::test_support::ManualClock;

    fn face_body(url: &str) -> String {
        json!({"data": {"info": {"face": url}}}).to_string()
    }

    #[tokio::test]
    async fn second_get_within_ttl_does_not_fetch() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .match_query(mockito::Matcher::UrlEncoded("mid".into(), "5".into()))
            .with_body(face_body("https://cdn.example/5.jpg"))
            .expect(1)
            .create_async()
            .await;

        let clock = Arc::new(ManualClock::new(1_000));
        let mut cache = AvatarCache::new(server.url(), clock.clone());

        assert_eq!(cache.get(5).await.unwrap(), "https://cdn.example/5.jpg");

        // One millisecond short of expiry: still served from the cache.
        clock.advance(AVATAR_TTL_MILLIS - 1);
        assert_eq!(cache.get(5).await.unwrap(), "https://cdn.example/5.jpg");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn expired_entry_is_refetched() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .match_query(mockito::Matcher::UrlEncoded("mid".into(), "5".into()))
            .with_body(face_body("https://cdn.example/new.jpg"))
            .expect(2)
            .create_async()
            .await;

        let clock = Arc::new(ManualClock::new(0));
        let mut cache = AvatarCache::new(server.url(), clock.clone());

        cache.get(5).await.unwrap();
        clock.advance(AVATAR_TTL_MILLIS);
        assert_eq!(cache.get(5).await.unwrap(), "https://cdn.example/new.jpg");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn users_are_cached_independently() {
        let mut server = mockito::Server::new_async().await;
        let five = server
            .mock("GET", "/")
            .match_query(mockito::Matcher::UrlEncoded("mid".into(), "5".into()))
            .with_body(face_body("https://cdn.example/5.jpg"))
            .expect(1)
            .create_async()
            .await;
        let nine = server
            .mock("GET", "/")
            .match_query(mockito::Matcher::UrlEncoded("mid".into(), "9".into()))
            .with_body(face_body("https://cdn.example/9.jpg"))
            .expect(1)
            .create_async()
            .await;

        let mut cache = AvatarCache::new(server.url(), Arc::new(ManualClock::new(0)));
        assert_eq!(cache.get(5).await.unwrap(), "https://cdn.example/5.jpg");
        assert_eq!(cache.get(9).await.unwrap(), "https://cdn.example/9.jpg");
        assert_eq!(cache.get(5).await.unwrap(), "https://cdn.example/5.jpg");

        five.assert_async().await;
        nine.assert_async().await;
    }

    #[tokio::test]
    async fn failed_refresh_leaves_previous_entry_untouched() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("GET", "/")
            .match_query(mockito::Matcher::UrlEncoded("mid".into(), "5".into()))
            .with_body(face_body("https://cdn.example/old.jpg"))
            .expect(1)
            .create_async()
            .await;

        let clock = Arc::new(ManualClock::new(1_000));
        let mut cache = AvatarCache::new(server.url(), clock.clone());
        cache.get(5).await.unwrap();
        ok.assert_async().await;

        let broken = server
            .mock("GET", "/")
            .match_query(mockito::Matcher::UrlEncoded("mid".into(), "5".into()))
            .with_body("not json at all")
            .create_async()
            .await;

        clock.advance(AVATAR_TTL_MILLIS);
        cache.get(5).await.unwrap_err();
        broken.assert_async().await;

        // The stale entry survived the failed refresh: winding the clock
        // back inside the original window serves it without a new fetch.
        clock.set(2_000);
        assert_eq!(cache.get(5).await.unwrap(), "https://cdn.example/old.jpg");
    }

    #[tokio::test]
    async fn missing_face_field_is_a_typed_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .match_query(mockito::Matcher::UrlEncoded("mid".into(), "5".into()))
            .with_body(json!({"data": {}}).to_string())
            .create_async()
            .await;

        let mut cache = AvatarCache::new(server.url(), Arc::new(ManualClock::new(0)));
        let err = cache.get(5).await.unwrap_err();
        assert!(matches!(err, LookupError::MissingField("data.info.face")));
    }
}
