//! Scheduled playback records ("fires") and their indexed store.
//!
//! A fire names a source, a begin sample, an end sample, and gain/pan. The
//! store keeps fires in an id-keyed map plus two ordered indexes: by begin
//! sample for promotion scans, and by end sample so the garbage cycle can
//! pop the soonest-expiring fires without walking everything.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use sq_common::Tz;

use crate::source::Source;

/// Opaque handle to a scheduled fire.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FireId(pub u64);

impl fmt::Display for FireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fire#{}", self.0)
    }
}

/// Lifecycle of a fire.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FireState {
    /// Scheduled, begin sample not yet reached.
    Pending,
    /// The clock is inside `[begin, end)`.
    Playing,
    /// Finished; awaiting removal by the garbage cycle.
    Done,
}

/// A scheduled playback event.
#[derive(Clone, Debug)]
pub struct Fire {
    pub id: FireId,
    pub source_key: String,
    /// First sample of playback.
    pub begin: Tz,
    /// One past the last sample of playback. `begin <= end` always.
    pub end: Tz,
    pub volume: f64,
    pub pan: f64,
    pub state: FireState,
    /// Resolved at admission so the mix thread never touches the cache map.
    pub source: Option<Arc<Source>>,
    /// Set once a silent frame was emitted for a not-yet-loaded source.
    pub source_late: bool,
}

impl Fire {
    /// Left/right gain for stereo output.
    ///
    /// `pan = -1` is full left, `0` center, `+1` full right.
    pub fn stereo_gains(&self) -> (f64, f64) {
        let pan = self.pan.clamp(-1.0, 1.0);
        let left = self.volume * (1.0 - pan).min(1.0);
        let right = self.volume * (1.0 + pan).min(1.0);
        (left, right)
    }
}

/// The fire store: id map plus begin/end ordered indexes and the live set.
#[derive(Default)]
pub struct FireStore {
    fires: HashMap<FireId, Fire>,
    by_begin: BTreeSet<(Tz, FireId)>,
    by_end: BTreeSet<(Tz, FireId)>,
    /// Playing fires, kept sorted by `(begin, id)` for deterministic
    /// summation order.
    live: Vec<FireId>,
    next_id: u64,
}

impl FireStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a fire. Caller has already resolved begin/end to sample indexes.
    pub fn insert(
        &mut self,
        source_key: String,
        begin: Tz,
        end: Tz,
        volume: f64,
        pan: f64,
        source: Option<Arc<Source>>,
    ) -> FireId {
        debug_assert!(begin <= end);
        let id = FireId(self.next_id);
        self.next_id += 1;

        self.fires.insert(
            id,
            Fire {
                id,
                source_key,
                begin,
                end,
                volume,
                pan,
                state: FireState::Pending,
                source,
                source_late: false,
            },
        );
        self.by_begin.insert((begin, id));
        self.by_end.insert((end, id));
        id
    }

    /// Promote pending fires whose begin sample has been reached into the
    /// live set. The scan only touches the begin-ordered index up to `t`.
    pub fn promote_until(&mut self, t: Tz) {
        let mut promoted = false;
        while let Some((begin, id)) = self.by_begin.first().copied() {
            if begin > t {
                break;
            }
            self.by_begin.remove(&(begin, id));
            if let Some(fire) = self.fires.get_mut(&id) {
                if fire.state == FireState::Pending {
                    fire.state = FireState::Playing;
                    self.live.push(id);
                    promoted = true;
                }
            }
        }
        if promoted {
            let fires = &self.fires;
            self.live
                .sort_unstable_by_key(|id| (fires.get(id).map(|f| f.begin), *id));
        }
    }

    /// Mark a live fire finished. It stays in the map until the next
    /// garbage cycle.
    pub fn retire(&mut self, id: FireId) {
        if let Some(fire) = self.fires.get_mut(&id) {
            fire.state = FireState::Done;
        }
    }

    /// Drop retired entries from the live set.
    pub fn compact_live(&mut self) {
        let fires = &self.fires;
        self.live
            .retain(|id| matches!(fires.get(id), Some(f) if f.state == FireState::Playing));
    }

    /// Remove finished fires whose end sample has passed, walking the
    /// end-ordered index from the soonest-expiring entry. A Pending fire
    /// whose end is already behind the clock can never play and is
    /// collected too.
    ///
    /// Returns the number of fires collected.
    pub fn collect_garbage(&mut self, t: Tz) -> usize {
        let mut removed = 0;
        while let Some((end, id)) = self.by_end.first().copied() {
            if end > t {
                break;
            }
            if matches!(self.fires.get(&id), Some(f) if f.state == FireState::Playing) {
                break;
            }
            self.by_end.remove(&(end, id));
            if let Some(fire) = self.fires.remove(&id) {
                self.by_begin.remove(&(fire.begin, id));
                removed += 1;
            }
        }
        if removed > 0 {
            self.compact_live();
        }
        removed
    }

    /// Fires that are neither finished nor already past their end at `t`.
    ///
    /// Evaluating against the clock (rather than stored state alone) lets a
    /// host polling under a pull-less driver still observe fires draining.
    pub fn count_active(&self, t: Tz) -> usize {
        self.fires
            .values()
            .filter(|f| f.state != FireState::Done && f.end > t)
            .count()
    }

    /// Total fires held, including Done ones awaiting collection.
    pub fn len(&self) -> usize {
        self.fires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fires.is_empty()
    }

    /// Remove every fire regardless of state.
    pub fn clear(&mut self) {
        self.fires.clear();
        self.by_begin.clear();
        self.by_end.clear();
        self.live.clear();
    }

    /// Ids of currently-playing fires, in `(begin, id)` order.
    pub fn live_ids(&self) -> &[FireId] {
        &self.live
    }

    /// All fires covering sample `t`: `begin <= t < end` and not Done.
    pub fn live_fires_at(&self, t: Tz) -> impl Iterator<Item = &Fire> {
        self.fires
            .values()
            .filter(move |f| f.state != FireState::Done && f.begin <= t && t < f.end)
    }

    pub fn get(&self, id: FireId) -> Option<&Fire> {
        self.fires.get(&id)
    }

    pub fn get_mut(&mut self, id: FireId) -> Option<&mut Fire> {
        self.fires.get_mut(&id)
    }
}
