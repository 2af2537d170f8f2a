//! Key matching: pair old and new siblings that should keep their identity.
//!
//! Matching runs in two tiers:
//! 1. **Keyed**: a new sibling with a key takes the old sibling with the same
//!    key. When the old run repeats a key, the later frame wins.
//! 2. **Slot**: unkeyed siblings pair positionally among the unkeyed siblings
//!    emitted by the same source slot, so the j-th old frame from a slot meets
//!    the j-th new frame from that slot.
//!
//! In both tiers a pair is only accepted when the two frames have the same
//! [`Identity`]; otherwise the old frame goes away and the new one is built
//! from scratch.

use super::edit::Diagnostics;
use crate::frame::{ComponentType, Key};
use std::collections::{HashMap, HashSet, VecDeque};

/// What must agree for two frames to be the same live node.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Identity<'a> {
    /// Element with this name.
    Element(&'a str),
    /// Component of this type.
    Component(&'a ComponentType),
    /// Text node.
    Text,
    /// Markup node.
    Markup,
}

/// A sibling as seen by the matcher.
#[derive(Clone, Copy, Debug)]
pub struct Candidate<'a> {
    /// Explicit key, if any.
    pub key: Option<Key>,
    /// Source slot: the frame's sequence number combined with the regions
    /// it sits in.
    pub slot: u64,
    /// Identity the counterpart must share.
    pub identity: Identity<'a>,
}

/// Summary of one matching pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchReport {
    /// Pairs matched by key.
    pub keyed: usize,
    /// Pairs matched by slot.
    pub slotted: usize,
    /// Authoring problems seen.
    pub diagnostics: Diagnostics,
}

/// Sibling matcher with reusable scratch storage.
#[derive(Debug, Default)]
pub struct KeyMatcher {
    /// Old keyed siblings by key.
    by_key: HashMap<Key, usize>,
    /// Old unkeyed siblings by slot, in sibling order.
    by_slot: HashMap<u64, VecDeque<usize>>,
    /// Keys already seen in the new run.
    seen: HashSet<Key>,
}

impl KeyMatcher {
    /// Create a matcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Match `new` against `old`.
    ///
    /// On return `out[i]` holds the index in `old` paired with `new[i]`, if
    /// any. Every old index appears at most once.
    pub fn match_runs(
        &mut self,
        old: &[Candidate<'_>],
        new: &[Candidate<'_>],
        out: &mut Vec<Option<usize>>,
    ) -> MatchReport {
        let mut report = MatchReport::default();
        self.by_key.clear();
        self.by_slot.clear();
        self.seen.clear();
        out.clear();

        for (index, candidate) in old.iter().enumerate() {
            match candidate.key {
                Some(key) => {
                    if self.by_key.insert(key, index).is_some() {
                        tracing::trace!(key = key.0, "duplicate key in previous sibling run");
                        report.diagnostics |= Diagnostics::DUPLICATE_KEY;
                    }
                }
                None => self.by_slot.entry(candidate.slot).or_default().push_back(index),
            }
        }

        for candidate in new {
            let matched = match candidate.key {
                Some(key) => {
                    if !self.seen.insert(key) {
                        tracing::trace!(key = key.0, "duplicate key in sibling run");
                        report.diagnostics |= Diagnostics::DUPLICATE_KEY;
                    }
                    match self.by_key.remove(&key) {
                        Some(index) if old[index].identity == candidate.identity => {
                            report.keyed += 1;
                            Some(index)
                        }
                        Some(index) => {
                            tracing::trace!(
                                key = key.0,
                                old = ?old[index].identity,
                                new = ?candidate.identity,
                                "key reused for a different node"
                            );
                            report.diagnostics |= Diagnostics::KEY_IDENTITY_CONFLICT;
                            None
                        }
                        None => None,
                    }
                }
                None => self
                    .by_slot
                    .get_mut(&candidate.slot)
                    .and_then(VecDeque::pop_front)
                    .filter(|&index| old[index].identity == candidate.identity)
                    .inspect(|_| report.slotted += 1),
            };
            out.push(matched);
        }

        report
    }
}
