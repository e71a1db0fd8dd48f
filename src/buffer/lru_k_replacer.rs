use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::common::{FrameId, Timestamp};

/// Access history of a single frame.
#[derive(Debug)]
struct FrameAccessInfo {
    /// The last k access timestamps, oldest at the front
    history: VecDeque<Timestamp>,
    is_evictable: bool,
}

impl FrameAccessInfo {
    fn new(k: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(k),
            is_evictable: false,
        }
    }

    fn record_access(&mut self, timestamp: Timestamp, k: usize) {
        self.history.push_back(timestamp);
        while self.history.len() > k {
            self.history.pop_front();
        }
    }

    /// Backward k-distance from `now`, or None (+inf) with fewer than k accesses.
    fn k_distance(&self, now: Timestamp, k: usize) -> Option<Timestamp> {
        if self.history.len() < k {
            None
        } else {
            self.history.front().map(|&kth| now.saturating_sub(kth))
        }
    }

    fn earliest_timestamp(&self) -> Timestamp {
        self.history.front().copied().unwrap_or(Timestamp::MIN)
    }
}

#[derive(Debug)]
struct ReplacerState {
    current_timestamp: Timestamp,
    frames: HashMap<FrameId, FrameAccessInfo>,
    num_evictable: usize,
}

/// LRU-K Replacement Policy
///
/// The replacer evicts the frame whose backward k-distance is the largest of
/// all evictable frames. Backward k-distance is the time between now and the
/// k-th most recent access. A frame with fewer than k recorded accesses has
/// +inf distance; among several such frames the one with the earliest
/// recorded access goes first, which degrades to classic LRU.
///
/// Every operation runs under one internal lock.
pub struct LruKReplacer {
    k: usize,
    /// Number of frames in the pool, frame ids at or above are ignored
    max_frames: usize,
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    /// Creates a new LRU-K replacer with the given k value and maximum frame count.
    pub fn new(k: usize, max_frames: usize) -> Self {
        assert!(k > 0, "LRU-K needs k >= 1");
        Self {
            k,
            max_frames,
            state: Mutex::new(ReplacerState {
                current_timestamp: 0,
                frames: HashMap::new(),
                num_evictable: 0,
            }),
        }
    }

    /// Evicts the frame with the largest backward k-distance and forgets its
    /// history. Returns None if no frame is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();
        if state.num_evictable == 0 {
            return None;
        }

        let now = state.current_timestamp;
        let victim = state
            .frames
            .iter()
            .filter(|(_, info)| info.is_evictable)
            .max_by(|(_, a), (_, b)| {
                let a_dist = a.k_distance(now, self.k);
                let b_dist = b.k_distance(now, self.k);
                match (a_dist, b_dist) {
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (Some(_), None) => std::cmp::Ordering::Less,
                    // Older first access ranks higher
                    (None, None) => b.earliest_timestamp().cmp(&a.earliest_timestamp()),
                    (Some(a_dist), Some(b_dist)) => a_dist
                        .cmp(&b_dist)
                        .then_with(|| b.earliest_timestamp().cmp(&a.earliest_timestamp())),
                }
            })
            .map(|(&frame_id, _)| frame_id)?;

        state.frames.remove(&victim);
        state.num_evictable -= 1;
        Some(victim)
    }

    /// Records an access to the frame at the next logical timestamp.
    pub fn record_access(&self, frame_id: FrameId) {
        if frame_id.as_usize() >= self.max_frames {
            return;
        }

        let mut state = self.state.lock();
        let timestamp = state.current_timestamp;
        state.current_timestamp = timestamp.saturating_add(1);
        state
            .frames
            .entry(frame_id)
            .or_insert_with(|| FrameAccessInfo::new(self.k))
            .record_access(timestamp, self.k);
    }

    /// Records an access at an explicit timestamp. The logical clock is moved
    /// past it so later distances stay non-negative.
    pub fn record_access_at(&self, frame_id: FrameId, timestamp: Timestamp) {
        if frame_id.as_usize() >= self.max_frames {
            return;
        }

        let mut state = self.state.lock();
        state.current_timestamp = state.current_timestamp.max(timestamp.saturating_add(1));
        state
            .frames
            .entry(frame_id)
            .or_insert_with(|| FrameAccessInfo::new(self.k))
            .record_access(timestamp, self.k);
    }

    /// Sets whether a frame takes part in eviction. Unknown frames are
    /// tracked with an empty history when marked evictable.
    pub fn set_evictable(&self, frame_id: FrameId, is_evictable: bool) {
        if frame_id.as_usize() >= self.max_frames {
            return;
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;
        if !state.frames.contains_key(&frame_id) {
            if !is_evictable {
                return;
            }
            state.frames.insert(frame_id, FrameAccessInfo::new(self.k));
        }

        let Some(info) = state.frames.get_mut(&frame_id) else {
            return;
        };
        if info.is_evictable == is_evictable {
            return;
        }
        info.is_evictable = is_evictable;
        if is_evictable {
            state.num_evictable += 1;
        } else {
            state.num_evictable -= 1;
        }
    }

    /// Forgets a frame and its history, used when its page is deleted.
    pub fn remove(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        if let Some(info) = state.frames.remove(&frame_id) {
            if info.is_evictable {
                state.num_evictable -= 1;
            }
        }
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().num_evictable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fid(id: u32) -> FrameId {
        FrameId::new(id)
    }

    #[test]
    fn test_lru_k_replacer_evict_empty() {
        let replacer = LruKReplacer::new(2, 10);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_k_replacer_infinite_distance_lru_order() {
        let replacer = LruKReplacer::new(2, 10);
        for i in 0..3 {
            replacer.record_access(fid(i));
            replacer.set_evictable(fid(i), true);
        }
        assert_eq!(replacer.size(), 3);

        assert_eq!(replacer.evict(), Some(fid(0)));
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.size(), 1);
    }

    #[test]
    fn test_lru_k_replacer_infinite_beats_finite() {
        let replacer = LruKReplacer::new(2, 10);
        replacer.record_access(fid(0));
        replacer.record_access(fid(0));
        replacer.record_access(fid(1));
        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);

        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), Some(fid(0)));
    }

    #[test]
    fn test_lru_k_replacer_largest_k_distance() {
        let replacer = LruKReplacer::new(2, 10);
        // Frame 0 at t=0,1; frame 1 at t=2,3; frame 2 at t=4,5
        for i in 0..3 {
            replacer.record_access(fid(i));
            replacer.record_access(fid(i));
            replacer.set_evictable(fid(i), true);
        }
        // Frame 0 again at t=6: its 2nd most recent access is now t=1
        replacer.record_access(fid(0));

        assert_eq!(replacer.evict(), Some(fid(0)));
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), Some(fid(2)));
    }

    #[test]
    fn test_lru_k_replacer_history_bounded_by_k() {
        let replacer = LruKReplacer::new(2, 10);
        // Frame 0: t=0,1,2,3 -> keeps 2,3
        for _ in 0..4 {
            replacer.record_access(fid(0));
        }
        // Frame 1: t=4,5
        replacer.record_access(fid(1));
        replacer.record_access(fid(1));
        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);

        assert_eq!(replacer.evict(), Some(fid(0)));
    }

    #[test]
    fn test_lru_k_replacer_explicit_timestamps() {
        let replacer = LruKReplacer::new(2, 10);
        replacer.record_access_at(fid(0), 10);
        replacer.record_access_at(fid(0), 20);
        replacer.record_access_at(fid(1), 5);
        replacer.record_access_at(fid(1), 30);
        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);

        // k-distance: frame 0 -> now - 10, frame 1 -> now - 5
        assert_eq!(replacer.evict(), Some(fid(1)));
    }

    #[test]
    fn test_lru_k_replacer_clock_saturates() {
        let replacer = LruKReplacer::new(2, 10);
        replacer.record_access_at(fid(0), 1);
        replacer.record_access_at(fid(1), Timestamp::MAX);
        replacer.record_access(fid(1));
        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);

        assert_eq!(replacer.evict(), Some(fid(0)));
        assert_eq!(replacer.evict(), Some(fid(1)));
    }

    #[test]
    fn test_lru_k_replacer_not_evictable() {
        let replacer = LruKReplacer::new(2, 10);
        replacer.record_access(fid(0));
        replacer.record_access(fid(1));
        replacer.set_evictable(fid(1), true);

        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_k_replacer_toggle_and_remove() {
        let replacer = LruKReplacer::new(2, 10);
        replacer.record_access(fid(0));
        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(0), true);
        assert_eq!(replacer.size(), 1);

        replacer.set_evictable(fid(0), false);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);

        replacer.set_evictable(fid(0), true);
        replacer.remove(fid(0));
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_k_replacer_ignores_out_of_range_frames() {
        let replacer = LruKReplacer::new(2, 4);
        replacer.record_access(fid(9));
        replacer.set_evictable(fid(9), true);
        assert_eq!(replacer.size(), 0);
    }
}
