//! Favorite servers and the storage they are persisted through

use crate::error::Result;
use std::collections::HashSet;
use std::sync::Mutex;

/// Set of favorited server guids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FavoritesSet {
    guids: HashSet<String>,
}

impl FavoritesSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, guid: &str) -> bool {
        self.guids.contains(guid)
    }

    pub fn add(&mut self, guid: &str) -> bool {
        self.guids.insert(guid.to_string())
    }

    pub fn remove(&mut self, guid: &str) -> bool {
        self.guids.remove(guid)
    }

    /// Flip membership. Returns true if the guid is a favorite afterwards.
    pub fn toggle(&mut self, guid: &str) -> bool {
        if self.remove(guid) {
            false
        } else {
            self.add(guid);
            true
        }
    }

    pub fn len(&self) -> usize {
        self.guids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.guids.iter().map(String::as_str)
    }
}

impl FromIterator<String> for FavoritesSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self { guids: iter.into_iter().collect() }
    }
}

/// Where favorites live between sessions
pub trait FavoritesStore: Send {
    fn load_favorites(&self) -> Result<FavoritesSet>;
    fn add_favorite(&self, guid: &str) -> Result<()>;
    fn remove_favorite(&self, guid: &str) -> Result<()>;
}

/// Non-persistent store for headless runs and tests
#[derive(Debug, Default)]
pub struct MemoryFavorites {
    inner: Mutex<FavoritesSet>,
}

impl MemoryFavorites {
    pub fn with(guids: &[&str]) -> Self {
        Self {
            inner: Mutex::new(guids.iter().map(|g| g.to_string()).collect()),
        }
    }
}

impl FavoritesStore for MemoryFavorites {
    fn load_favorites(&self) -> Result<FavoritesSet> {
        Ok(self.inner.lock().map(|s| s.clone()).unwrap_or_default())
    }

    fn add_favorite(&self, guid: &str) -> Result<()> {
        if let Ok(mut set) = self.inner.lock() {
            set.add(guid);
        }
        Ok(())
    }

    fn remove_favorite(&self, guid: &str) -> Result<()> {
        if let Ok(mut set) = self.inner.lock() {
            set.remove(guid);
        }
        Ok(())
    }
}
