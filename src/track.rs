//! Per-object position history.
//!
//! Each track keeps its last `MAX_TRAIL_LEN` centroids, oldest first. The map
//! itself is capped: inserting a new id into a full store evicts the
//! least-recently-updated track.

use std::collections::{HashMap, VecDeque};

pub const MAX_TRAIL_LEN: usize = 30;

#[derive(Debug)]
struct Track {
    positions: VecDeque<(i32, i32)>,
    last_update: u64,
}

#[derive(Debug)]
pub struct TrackStore {
    tracks: HashMap<u32, Track>,
    capacity: usize,
    tick: u64,
    trail: Vec<(i32, i32)>,
}

impl TrackStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            tracks: HashMap::new(),
            capacity: capacity.max(1),
            tick: 0,
            trail: Vec::with_capacity(MAX_TRAIL_LEN),
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn contains(&self, track_id: u32) -> bool {
        self.tracks.contains_key(&track_id)
    }

    /// Append a centroid and return the track's trail, oldest first.
    pub fn update(&mut self, track_id: u32, centroid: (i32, i32)) -> &[(i32, i32)] {
        self.tick += 1;
        if !self.tracks.contains_key(&track_id) && self.tracks.len() >= self.capacity {
            self.evict_oldest();
        }
        let track = self.tracks.entry(track_id).or_insert_with(|| Track {
            positions: VecDeque::with_capacity(MAX_TRAIL_LEN + 1),
            last_update: 0,
        });
        track.positions.push_back(centroid);
        while track.positions.len() > MAX_TRAIL_LEN {
            track.positions.pop_front();
        }
        track.last_update = self.tick;

        self.trail.clear();
        self.trail.extend(track.positions.iter().copied());
        &self.trail
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .tracks
            .iter()
            .min_by_key(|(_, track)| track.last_update)
            .map(|(id, _)| *id);
        if let Some(id) = oldest {
            log::debug!("track: evicting stale track {}", id);
            self.tracks.remove(&id);
        }
    }
}

impl Default for TrackStore {
    fn default() -> Self {
        Self::new(256)
    }
}
