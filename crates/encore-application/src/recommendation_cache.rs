// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::Arc;
use std::time::Duration;

use encore_domain::artist_name_key;
use moka::sync::Cache;

use crate::related_artists::RelatedArtistView;

/// In-process cache of generated related artists, keyed by artist name.
///
/// Entries expire after the configured TTL. Losing the cache only costs a
/// fresh generation call.
#[derive(Clone)]
pub struct RecommendationCache {
    entries: Cache<String, Arc<Vec<RelatedArtistView>>>,
}

impl RecommendationCache {
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn get(&self, artist_name: &str) -> Option<Arc<Vec<RelatedArtistView>>> {
        self.entries.get(&artist_name_key(artist_name))
    }

    pub fn put(&self, artist_name: &str, artists: Vec<RelatedArtistView>) {
        self.entries
            .insert(artist_name_key(artist_name), Arc::new(artists));
    }

    pub fn evict(&self, artist_name: &str) {
        self.entries.invalidate(&artist_name_key(artist_name));
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(name: &str) -> RelatedArtistView {
        RelatedArtistView {
            id: None,
            name: name.into(),
            reason: String::new(),
            image_url: None,
            url: None,
            genres: Vec::new(),
        }
    }

    #[test]
    fn lookups_ignore_case_and_width() {
        let cache = RecommendationCache::new(Duration::from_secs(60), 10);
        cache.put("Weezer", vec![view("Ozma")]);
        assert_eq!(cache.get("  WEEZER ").unwrap()[0].name, "Ozma");
        assert_eq!(cache.get("ｗｅｅｚｅｒ").unwrap().len(), 1);
    }

    #[test]
    fn evict_and_clear_drop_entries() {
        let cache = RecommendationCache::new(Duration::from_secs(60), 10);
        cache.put("Weezer", vec![view("Ozma")]);
        cache.put("Oasis", vec![view("Blur")]);
        cache.evict("weezer");
        assert!(cache.get("Weezer").is_none());
        assert!(cache.get("Oasis").is_some());
        cache.clear();
        assert!(cache.get("Oasis").is_none());
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = RecommendationCache::new(Duration::from_millis(20), 10);
        cache.put("Weezer", vec![view("Ozma")]);
        std::thread::sleep(Duration::from_millis(60));
        assert!(cache.get("Weezer").is_none());
    }
}
