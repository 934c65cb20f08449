//! Match Registry (§4.5): creates matches, looks them up, classifies
//! "recent" ones for a lobby listing, and reaps stale ones.
//!
//! The registry's own map lock and a `MatchHandle`'s internal state lock
//! are never held at the same time in either order (§5) — every method
//! here either touches the map or calls into a handle, never both while
//! holding the other.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;

use crate::match_engine::MatchHandle;
use crate::types::PlayerIdentity;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum RecentStatus {
    /// Still in START, one seat open: the viewer can join as Black.
    Joinable,
    /// The viewer is already a seated player.
    Returnable,
    /// Anyone can watch; neither seat is open to this viewer.
    Observable,
}

pub struct RecentMatch {
    pub key: String,
    pub status: RecentStatus,
}

#[derive(Default)]
pub struct Registry {
    matches: Mutex<HashMap<String, Arc<MatchHandle>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a brand new match with a fresh random key, `creator` seated
    /// as White.
    pub fn new_match(&self, creator: PlayerIdentity, now: f64) -> Arc<MatchHandle> {
        let key = generate_key();
        let handle = Arc::new(MatchHandle::new(key.clone(), now, creator));
        self.matches.lock().insert(key, handle.clone());
        handle
    }

    /// Looks up a match by key, ticking it against `now` before handing it
    /// back so callers always observe a fresh snapshot.
    pub fn get(&self, key: &str, now: f64) -> Option<Arc<MatchHandle>> {
        let handle = self.matches.lock().get(key).cloned()?;
        handle.snapshot(now);
        Some(handle)
    }

    /// Same-key replacement (§4.4/§4.5): builds a fresh `MatchState` under
    /// the same key, preserving the seated players and observers of the
    /// match it replaces. `initiator` must already be seated in the match
    /// being replaced.
    pub fn new_game(
        &self,
        key: &str,
        initiator: &PlayerIdentity,
        now: f64,
    ) -> Option<Arc<MatchHandle>> {
        let old = self.matches.lock().get(key).cloned()?;
        let (white, black) = old.rematch_inputs();
        let is_party = white.as_ref().map(|p| p.id == initiator.id).unwrap_or(false)
            || black.as_ref().map(|p| p.id == initiator.id).unwrap_or(false);
        if !is_party {
            return None;
        }
        let observers = old.take_observers();
        let fresh = Arc::new(MatchHandle::fresh_rematch(
            key.to_string(),
            now,
            white,
            black,
            observers,
        ));
        self.matches.lock().insert(key.to_string(), fresh.clone());
        Some(fresh)
    }

    /// Matches a `viewer` could reasonably be shown in a lobby listing
    /// (§4.5): the 20 most recently created matches that are within the
    /// `RECENT_ACTIVITY_SECONDS` window, newest first.
    pub fn recent(&self, viewer: &PlayerIdentity, now: f64) -> Vec<RecentMatch> {
        let mut snapshot: Vec<Arc<MatchHandle>> = self
            .matches
            .lock()
            .values()
            .cloned()
            .filter(|handle| handle.is_recently_active(now))
            .collect();
        snapshot.sort_by(|a, b| b.created_at.partial_cmp(&a.created_at).unwrap());
        snapshot.truncate(20);

        snapshot
            .into_iter()
            .map(|handle| {
                let is_white = handle.white_id().as_deref() == Some(viewer.id.as_str());
                let is_black = handle.black_id().as_deref() == Some(viewer.id.as_str());
                let status = if is_white || is_black {
                    RecentStatus::Returnable
                } else if handle.black_id().is_none() {
                    RecentStatus::Joinable
                } else {
                    RecentStatus::Observable
                };
                RecentMatch {
                    key: handle.key.clone(),
                    status,
                }
            })
            .collect()
    }

    /// Drops matches whose `MATCH_TTL_SECONDS` has elapsed. Intended to be
    /// called periodically by a background task, never from a request
    /// handler.
    pub fn reap(&self, now: f64) {
        self.matches.lock().retain(|_, handle| !handle.is_stale(now));
    }

    pub fn len(&self) -> usize {
        self.matches.lock().len()
    }
}

fn generate_key() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::rng();
    (0..8)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}
