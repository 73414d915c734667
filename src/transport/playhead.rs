//! Shared play-head: the transport position every node reads.
//!
//! The clock publishes a fresh immutable [`PlayHeadState`] on every change;
//! readers on the audio path only ever do a lock-free load.

use std::sync::Arc;

use arc_swap::ArcSwap;

/// One consistent view of the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayHeadState {
    pub bpm: u32,
    pub time_in_seconds: u64,
    /// Musical position in ticks (one tick per beat).
    pub ppq_position: u64,
    pub is_playing: bool,
}

impl Default for PlayHeadState {
    fn default() -> Self {
        Self {
            bpm: 60,
            time_in_seconds: 0,
            ppq_position: 0,
            is_playing: false,
        }
    }
}

#[derive(Debug)]
pub struct PlayHead {
    state: ArcSwap<PlayHeadState>,
}

pub type SharedPlayHead = Arc<PlayHead>;

impl PlayHead {
    pub fn new(bpm: u32) -> SharedPlayHead {
        Arc::new(Self {
            state: ArcSwap::from_pointee(PlayHeadState {
                bpm,
                ..Default::default()
            }),
        })
    }

    /// Snapshot of the whole transport.
    pub fn current(&self) -> PlayHeadState {
        **self.state.load()
    }

    pub fn bpm(&self) -> u32 {
        self.state.load().bpm
    }

    pub fn time_in_seconds(&self) -> u64 {
        self.state.load().time_in_seconds
    }

    pub fn ppq_position(&self) -> u64 {
        self.state.load().ppq_position
    }

    pub fn is_playing(&self) -> bool {
        self.state.load().is_playing
    }

    fn update(&self, mut f: impl FnMut(&mut PlayHeadState)) {
        self.state.rcu(|current| {
            let mut next = **current;
            f(&mut next);
            next
        });
    }

    pub(crate) fn set_bpm(&self, bpm: u32) {
        self.update(|s| s.bpm = bpm);
    }

    pub(crate) fn set_playing(&self, playing: bool) {
        self.update(|s| s.is_playing = playing);
    }

    pub(crate) fn set_time_in_seconds(&self, seconds: u64) {
        self.update(|s| s.time_in_seconds = seconds);
    }

    pub(crate) fn set_ppq_position(&self, position: u64) {
        self.update(|s| s.ppq_position = position);
    }

    /// Zero seconds and ticks in a single publish.
    pub(crate) fn reset_position(&self) {
        self.update(|s| {
            s.time_in_seconds = 0;
            s.ppq_position = 0;
        });
    }
}
