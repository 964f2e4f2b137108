//! Cached directory listings with optimistic mutation support.
//!
//! Every optimistic change follows one protocol:
//!
//! 1. [`ListingCache::begin`] captures the listings a scope matches.
//! 2. [`ListingCache::apply_patch`] edits the cached copies in place.
//! 3. On success, [`ListingCache::commit`] drops the snapshot and returns the
//!    keys to refetch. On failure, [`ListingCache::rollback`] restores the
//!    captured listings verbatim.
//!
//! Two transactions touching the same key are not isolated: whichever rolls
//! back last wins. A listing fetched after `begin` is newer than anything the
//! snapshot holds and survives the rollback.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use cumulus_core::{path, DirectoryListing};

/// Which cached listings a snapshot covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheScope {
    /// Every cached listing.
    AllListings,
    /// Exactly these keys, cached or not.
    Paths(Vec<String>),
    /// Every cached listing at or below a path.
    Subtree(String),
}

impl CacheScope {
    /// Check whether a cache key falls within this scope.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::AllListings => true,
            Self::Paths(paths) => paths.iter().any(|p| p == key),
            Self::Subtree(prefix) => path::is_within(key, prefix),
        }
    }
}

/// Tentative edit applied to cached listings. Never touches the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CachePatch {
    /// Drop entries by path.
    Remove { paths: Vec<String> },
    /// Move entries, as `(source, destination)` full paths.
    Move { moves: Vec<(String, String)> },
}

impl CachePatch {
    /// A rename is a move within one parent.
    pub fn rename(path: &str, new_name: &str) -> Self {
        Self::Move {
            moves: vec![(path.to_string(), path::join(path::parent(path), new_name))],
        }
    }
}

/// Point-in-time copy of the listings matched by a scope.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    scope: CacheScope,
    revision: u64,
    captured: Vec<(String, Option<DirectoryListing>)>,
}

impl CacheSnapshot {
    /// Scope this snapshot was taken with.
    pub fn scope(&self) -> &CacheScope {
        &self.scope
    }

    /// Keys captured by this snapshot.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.captured.iter().map(|(k, _)| k.as_str())
    }
}

/// Listings keyed by directory path.
#[derive(Debug, Clone, Default)]
pub struct ListingCache {
    listings: IndexMap<String, DirectoryListing>,
    stale: IndexSet<String>,
    /// Revision of the last fetch stored under each key.
    fetched: IndexMap<String, u64>,
    revision: u64,
}

impl ListingCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached listing for a directory.
    pub fn get(&self, key: &str) -> Option<&DirectoryListing> {
        self.listings.get(key)
    }

    /// Check whether a directory is cached.
    pub fn contains(&self, key: &str) -> bool {
        self.listings.contains_key(key)
    }

    /// Store a freshly fetched listing, clearing its stale mark.
    pub fn insert(&mut self, listing: DirectoryListing) {
        self.revision += 1;
        self.fetched
            .insert(listing.current_path.clone(), self.revision);
        self.stale.shift_remove(&listing.current_path);
        self.listings.insert(listing.current_path.clone(), listing);
    }

    /// Check whether a key was marked stale by a commit.
    pub fn is_stale(&self, key: &str) -> bool {
        self.stale.contains(key)
    }

    /// Cached keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.listings.keys().map(String::as_str)
    }

    /// Number of cached listings.
    pub fn len(&self) -> usize {
        self.listings.len()
    }

    /// Check if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    /// Drop every listing.
    pub fn clear(&mut self) {
        self.listings.clear();
        self.stale.clear();
        self.fetched.clear();
    }

    /// The narrowest [`CacheScope::Paths`] covering every key `patch` can touch:
    /// parent listings of sources and destinations plus cached listings
    /// beneath moved or removed directories (and where they would move to).
    pub fn scope_for(&self, patch: &CachePatch) -> CacheScope {
        let mut keys: IndexSet<String> = IndexSet::new();
        match patch {
            CachePatch::Remove { paths } => {
                for p in paths {
                    keys.insert(path::parent(p).to_string());
                    keys.extend(self.keys_within(p));
                }
            }
            CachePatch::Move { moves } => {
                for (src, dst) in moves {
                    keys.insert(path::parent(src).to_string());
                    keys.insert(path::parent(dst).to_string());
                    for key in self.keys_within(src) {
                        if let Some(rebased) = path::rebase(&key, src, dst) {
                            keys.insert(rebased);
                        }
                        keys.insert(key);
                    }
                }
            }
        }
        CacheScope::Paths(keys.into_iter().collect())
    }

    /// Capture every listing matched by `scope`.
    pub fn begin(&self, scope: CacheScope) -> CacheSnapshot {
        let captured = match &scope {
            CacheScope::Paths(paths) => paths
                .iter()
                .map(|p| (p.clone(), self.listings.get(p).cloned()))
                .collect(),
            _ => self
                .listings
                .iter()
                .filter(|(key, _)| scope.matches(key))
                .map(|(key, listing)| (key.clone(), Some(listing.clone())))
                .collect(),
        };
        CacheSnapshot {
            scope,
            revision: self.revision,
            captured,
        }
    }

    /// Apply a tentative edit to the cached copies.
    pub fn apply_patch(&mut self, patch: &CachePatch) {
        match patch {
            CachePatch::Remove { paths } => {
                for listing in self.listings.values_mut() {
                    listing.entries.retain(|e| !paths.contains(&e.path));
                }
                self.listings
                    .retain(|key, _| !paths.iter().any(|p| path::is_within(key, p)));
            }
            CachePatch::Move { moves } => {
                for (src, dst) in moves {
                    self.move_entry(src, dst);
                }
            }
        }
    }

    /// Finish a successful transaction.
    ///
    /// Marks every captured key that is still cached as stale and returns
    /// those keys so the caller can refetch them.
    pub fn commit(&mut self, snapshot: CacheSnapshot) -> Vec<String> {
        let refetch: Vec<String> = snapshot
            .captured
            .into_iter()
            .map(|(key, _)| key)
            .filter(|key| self.listings.contains_key(key))
            .collect();
        self.stale.extend(refetch.iter().cloned());
        refetch
    }

    /// Undo a failed transaction, restoring every captured key exactly.
    ///
    /// Keys that were absent at [`begin`](Self::begin) are removed. For
    /// predicate scopes, matching keys added since the snapshot are removed
    /// as well. Keys fetched after `begin` are left alone.
    pub fn rollback(&mut self, snapshot: CacheSnapshot) {
        debug!(keys = snapshot.captured.len(), "Rolling back listing cache");
        if !matches!(snapshot.scope, CacheScope::Paths(_)) {
            let captured: IndexSet<&str> = snapshot.keys().collect();
            let added: Vec<String> = self
                .listings
                .keys()
                .filter(|key| snapshot.scope.matches(key) && !captured.contains(key.as_str()))
                .filter(|key| !self.fetched_since(key, snapshot.revision))
                .cloned()
                .collect();
            for key in added {
                self.listings.shift_remove(&key);
            }
        }
        for (key, listing) in snapshot.captured {
            if self.fetched_since(&key, snapshot.revision) {
                debug!(path = %key, "Keeping listing fetched during the transaction");
                continue;
            }
            match listing {
                Some(listing) => {
                    self.listings.insert(key, listing);
                }
                None => {
                    self.listings.shift_remove(&key);
                }
            }
        }
    }

    fn fetched_since(&self, key: &str, revision: u64) -> bool {
        self.listings.contains_key(key)
            && self.fetched.get(key).is_some_and(|r| *r > revision)
    }

    fn keys_within(&self, ancestor: &str) -> Vec<String> {
        self.listings
            .keys()
            .filter(|key| path::is_within(key, ancestor))
            .cloned()
            .collect()
    }

    fn move_entry(&mut self, src: &str, dst: &str) {
        let moved = self.listings.get_mut(path::parent(src)).and_then(|listing| {
            let pos = listing.entries.iter().position(|e| e.path == src)?;
            Some(listing.entries.remove(pos))
        });

        for key in self.keys_within(src) {
            let (Some(listing), Some(new_key)) =
                (self.listings.shift_remove(&key), path::rebase(&key, src, dst))
            else {
                continue;
            };
            let entries = listing
                .entries
                .iter()
                .map(|e| match path::rebase(&e.path, src, dst) {
                    Some(p) => e.relocated(&p),
                    None => e.clone(),
                })
                .collect();
            self.listings
                .insert(new_key.clone(), DirectoryListing::new(new_key, entries));
        }

        let Some(entry) = moved else {
            return;
        };
        if let Some(listing) = self.listings.get_mut(path::parent(dst)) {
            listing.entries.retain(|e| e.path != dst);
            listing.entries.push(entry.relocated(dst));
        }
    }
}
