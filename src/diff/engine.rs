//! Diff engine: reconcile an old and a new frame sequence.
//!
//! The walk works one sibling scope at a time:
//! 1. Flatten the scope into live nodes (regions are transparent, attributes
//!    and reference captures are not nodes).
//! 2. Pair siblings: a positional fast path while slot, identity and key
//!    agree, then the [`KeyMatcher`] for whatever is left.
//! 3. Emit edits in an order a renderer can apply front to back:
//!    - updates of matched pairs, recursing into element children
//!    - removals of unmatched old nodes, highest index first
//!    - moves and insertions in new sibling order
//!
//! Because a scope emits all of its updates (and so all nested scopes)
//! before any structural edit of its own, every path in the script is
//! computed against the old positions of its ancestors.

use super::edit::{ComponentBinding, Diagnostics, Edit, EditScript, NodePath};
use super::keys::{Candidate, Identity, KeyMatcher};
use crate::error::DiffError;
use crate::frame::{AttributeValue, EventHandlerId, Frame, FrameData, FrameKind, Frames};
use std::ops::Range;

/// Configuration for the diff engine.
#[derive(Debug, Clone)]
pub struct DiffConfig {
    /// Deepest nesting of elements and regions the engine will walk.
    pub max_depth: usize,
    /// Whether to pair leading siblings positionally before key matching.
    pub fast_path: bool,
    /// Log a warning for every sibling run with repeated keys.
    pub warn_on_duplicate_keys: bool,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            max_depth: 256,
            fast_path: true,
            warn_on_duplicate_keys: true,
        }
    }
}

/// Reusable diff engine.
///
/// Holds only configuration and scratch storage; every call to
/// [`diff`](Self::diff) is independent of the previous one.
#[derive(Debug, Default)]
pub struct DiffEngine {
    config: DiffConfig,
    matcher: KeyMatcher,
}

impl DiffEngine {
    /// Create an engine with the given configuration.
    pub fn new(config: DiffConfig) -> Self {
        Self {
            config,
            matcher: KeyMatcher::new(),
        }
    }

    /// The engine configuration.
    pub const fn config(&self) -> &DiffConfig {
        &self.config
    }

    /// Compute the edits that turn the tree of `old` into the tree of `new`.
    pub fn diff(&mut self, old: &Frames, new: &Frames) -> Result<EditScript, DiffError> {
        let mut walk = Walk {
            old: old.as_slice(),
            new: new.as_slice(),
            config: &self.config,
            matcher: &mut self.matcher,
            script: EditScript::default(),
        };
        walk.scope(&NodePath::root(), 0..old.len(), 0..new.len(), 0)?;

        let script = walk.script;
        tracing::debug!(
            old_frames = old.len(),
            new_frames = new.len(),
            edits = script.edits.len(),
            stats = ?script.stats,
            "diff complete"
        );
        Ok(script)
    }
}

/// Diff with the default configuration.
pub fn diff(old: &Frames, new: &Frames) -> Result<EditScript, DiffError> {
    DiffEngine::default().diff(old, new)
}

/// Diff with an explicit configuration.
pub fn diff_with_config(old: &Frames, new: &Frames, config: DiffConfig) -> Result<EditScript, DiffError> {
    DiffEngine::new(config).diff(old, new)
}

const SLOT_SEED: u64 = 0xcbf2_9ce4_8422_2325;
const SLOT_PRIME: u64 = 0x0000_0100_0000_01b3;
const REGION_MARK: u32 = u32::MAX;

#[inline]
const fn mix(state: u64, value: u32) -> u64 {
    (state ^ value as u64).wrapping_mul(SLOT_PRIME)
}

/// Live nodes of one sibling scope.
#[derive(Default)]
struct Nodes<'a> {
    /// Frame index of each node.
    frames: Vec<usize>,
    /// Matcher view of each node.
    candidates: Vec<Candidate<'a>>,
}

impl Nodes<'_> {
    fn len(&self) -> usize {
        self.frames.len()
    }
}

/// Order of every sibling position a scope can pass through while it is
/// rearranged.
///
/// Stable survivors never move, and every other placed node goes right
/// after the node placed before it, so the final order is known up front:
/// nodes placed before the first stable survivor, then each old survivor
/// followed by the nodes placed after it. The live position of a node is
/// the number of occupied coordinates before its own.
struct Layout {
    /// Coordinate of each old node at its original place.
    old: Vec<usize>,
    /// Coordinate of each new node placed by a move or an insert.
    new: Vec<usize>,
    len: usize,
}

impl Layout {
    fn new(matches: &[Option<usize>], stable: &[bool], old_len: usize) -> Self {
        // Group 0 follows the start of the scope, group `o + 1` follows old node `o`.
        let mut group = 0;
        let mut groups = vec![0usize; old_len + 1];
        let mut placed = vec![(0, 0); matches.len()];
        let mut matched_seen = 0;
        for (new_pos, old_pos) in matches.iter().enumerate() {
            if let Some(old_pos) = *old_pos {
                matched_seen += 1;
                if stable[matched_seen - 1] {
                    group = old_pos + 1;
                    continue;
                }
            }
            placed[new_pos] = (group, groups[group]);
            groups[group] += 1;
        }

        let mut starts = vec![0usize; old_len + 1];
        let mut old = vec![0usize; old_len];
        let mut next = groups[0];
        for (old_pos, coordinate) in old.iter_mut().enumerate() {
            *coordinate = next;
            starts[old_pos + 1] = next + 1;
            next += 1 + groups[old_pos + 1];
        }
        let new = placed.into_iter().map(|(group, rank)| starts[group] + rank).collect();

        Self { old, new, len: next }
    }

    const fn len(&self) -> usize {
        self.len
    }
}

/// Occupied coordinates, with prefix counts (a Fenwick tree).
struct Occupancy {
    tree: Vec<usize>,
}

impl Occupancy {
    fn new(len: usize) -> Self {
        Self {
            tree: vec![0; len + 1],
        }
    }

    fn insert(&mut self, at: usize) {
        let mut i = at + 1;
        while i < self.tree.len() {
            self.tree[i] += 1;
            i += i & i.wrapping_neg();
        }
    }

    /// Free an occupied coordinate.
    fn remove(&mut self, at: usize) {
        let mut i = at + 1;
        while i < self.tree.len() {
            self.tree[i] -= 1;
            i += i & i.wrapping_neg();
        }
    }

    /// Number of occupied coordinates below `at`.
    fn before(&self, at: usize) -> usize {
        let mut i = at;
        let mut count = 0;
        while i > 0 {
            count += self.tree[i];
            i &= i - 1;
        }
        count
    }
}

struct Walk<'a, 'e> {
    old: &'a [Frame],
    new: &'a [Frame],
    config: &'e DiffConfig,
    matcher: &'e mut KeyMatcher,
    script: EditScript,
}

impl<'a> Walk<'a, '_> {
    fn scope(
        &mut self,
        parent: &NodePath,
        old_range: Range<usize>,
        new_range: Range<usize>,
        depth: usize,
    ) -> Result<(), DiffError> {
        self.check_depth(depth)?;

        let (old_frames, new_frames) = (self.old, self.new);
        let max_depth = self.config.max_depth;
        let mut old = Nodes::default();
        let mut new = Nodes::default();
        collect(old_frames, old_range, SLOT_SEED, depth, max_depth, &mut old)?;
        collect(new_frames, new_range, SLOT_SEED, depth, max_depth, &mut new)?;

        let (matches, diagnostics) = self.pair(&old, &new);
        if diagnostics.contains(Diagnostics::DUPLICATE_KEY) && self.config.warn_on_duplicate_keys {
            tracing::warn!(%parent, "duplicate keys among siblings, last one wins");
        }
        tracing::trace!(
            %parent,
            old = old.len(),
            new = new.len(),
            matched = matches.iter().flatten().count(),
            "sibling scope"
        );

        // Updates, against old positions.
        let mut old_used = vec![false; old.len()];
        for (new_pos, old_pos) in matches.iter().enumerate() {
            if let Some(old_pos) = *old_pos {
                old_used[old_pos] = true;
                self.update(
                    &parent.child(position(old_pos)),
                    old.frames[old_pos],
                    new.frames[new_pos],
                    depth,
                )?;
            }
        }

        // Removals, highest index first so lower indices stay valid.
        for old_pos in (0..old.len()).rev() {
            if !old_used[old_pos] {
                self.remove(parent.child(position(old_pos)), old.frames[old_pos]);
            }
        }

        // Moves and insertions in new order. Survivors on the longest run
        // that is already in order stay put; everything else lands right
        // after the sibling placed before it.
        let order: Vec<usize> = matches.iter().flatten().copied().collect();
        let stable = longest_increasing(&order);
        let layout = Layout::new(&matches, &stable, old.len());
        let mut occupied = Occupancy::new(layout.len());
        for (old_pos, &used) in old_used.iter().enumerate() {
            if used {
                occupied.insert(layout.old[old_pos]);
            }
        }

        let mut matched_seen = 0;
        for (new_pos, old_pos) in matches.iter().enumerate() {
            match *old_pos {
                Some(old_pos) => {
                    let keep = stable[matched_seen];
                    matched_seen += 1;
                    if keep {
                        continue;
                    }
                    let from = occupied.before(layout.old[old_pos]);
                    occupied.remove(layout.old[old_pos]);
                    let to = occupied.before(layout.new[new_pos]);
                    occupied.insert(layout.new[new_pos]);
                    if from != to {
                        self.script.edits.push(Edit::MoveSubtree {
                            parent: parent.clone(),
                            from: position(from),
                            to: position(to),
                        });
                        self.script.stats.moves += 1;
                    }
                }
                None => {
                    let to = occupied.before(layout.new[new_pos]);
                    occupied.insert(layout.new[new_pos]);
                    self.insert(parent.clone(), position(to), new.frames[new_pos], depth)?;
                }
            }
        }

        Ok(())
    }

    /// Pair new siblings with old ones; `matches[new] = Some(old)`.
    fn pair(&mut self, old: &Nodes<'a>, new: &Nodes<'a>) -> (Vec<Option<usize>>, Diagnostics) {
        let mut matches = vec![None; new.len()];
        let mut diagnostics = Diagnostics::empty();

        let mut prefix = 0;
        if self.config.fast_path {
            while prefix < old.len()
                && prefix < new.len()
                && same_position(&old.candidates[prefix], &new.candidates[prefix])
            {
                matches[prefix] = Some(prefix);
                prefix += 1;
            }
            self.script.stats.fast_path_matches += prefix;
        }

        if prefix < old.len() && prefix < new.len() {
            let mut rest = Vec::with_capacity(new.len() - prefix);
            let report = self.matcher.match_runs(
                &old.candidates[prefix..],
                &new.candidates[prefix..],
                &mut rest,
            );
            for (offset, old_pos) in rest.into_iter().enumerate() {
                matches[prefix + offset] = old_pos.map(|old_pos| old_pos + prefix);
            }
            self.script.stats.keyed_matches += report.keyed;
            self.script.stats.slot_matches += report.slotted;
            self.script.diagnostics |= report.diagnostics;
            diagnostics = report.diagnostics;
        }

        (matches, diagnostics)
    }

    fn update(&mut self, node: &NodePath, old_index: usize, new_index: usize, depth: usize) -> Result<(), DiffError> {
        let (old, new) = (self.old, self.new);
        let old_frame = &old[old_index];
        let new_frame = &new[new_index];

        // The matcher only pairs frames with equal identity, so the kinds agree.
        match (old_frame.data(), new_frame.data()) {
            (FrameData::Text { text: before }, FrameData::Text { text: after }) => {
                if before != after {
                    self.script.edits.push(Edit::SetText {
                        node: node.clone(),
                        text: after.clone(),
                    });
                    self.script.stats.updates += 1;
                }
            }
            (FrameData::Markup { markup: before }, FrameData::Markup { markup: after }) => {
                if before != after {
                    self.script.edits.push(Edit::UpdateMarkup {
                        node: node.clone(),
                        markup: after.clone(),
                    });
                    self.script.stats.updates += 1;
                }
            }
            (FrameData::Element { .. }, FrameData::Element { .. }) => {
                self.attributes(node, old_index, new_index);
                self.scope(node, descendants(old, old_index), descendants(new, new_index), depth + 1)?;
            }
            (
                FrameData::Component {
                    component_id, state, ..
                },
                FrameData::Component { .. },
            ) => {
                // The child component diffs its own output; only the
                // parameters passed to it belong to this tree.
                self.attributes(node, old_index, new_index);
                if let Some(id) = *component_id {
                    self.script.retained_components.push(ComponentBinding {
                        index: new_index,
                        id,
                        state: *state,
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn attributes(&mut self, node: &NodePath, old_index: usize, new_index: usize) {
        let (old, new) = (self.old, self.new);
        let before = attribute_run(old, old_index);
        let after = attribute_run(new, new_index);

        for (offset, frame) in after.iter().enumerate() {
            let FrameData::Attribute { name, value, handler } = frame.data() else {
                continue;
            };
            if shadowed(&after[offset + 1..], name) {
                self.script.diagnostics |= Diagnostics::DUPLICATE_ATTRIBUTE;
                continue;
            }
            let unchanged = last_attribute(before, name).is_some_and(|(old_value, old_handler)| {
                old_value == value && old_handler == *handler
            });
            if !unchanged {
                self.script.edits.push(Edit::SetAttribute {
                    node: node.clone(),
                    name: name.clone(),
                    value: value.clone(),
                    handler: *handler,
                });
                self.script.stats.updates += 1;
            }
        }

        for (offset, frame) in before.iter().enumerate() {
            let FrameData::Attribute { name, .. } = frame.data() else {
                continue;
            };
            if shadowed(&before[offset + 1..], name) {
                continue;
            }
            if last_attribute(after, name).is_none() {
                self.script.edits.push(Edit::RemoveAttribute {
                    node: node.clone(),
                    name: name.clone(),
                });
                self.script.stats.updates += 1;
            }
        }
    }

    fn remove(&mut self, node: NodePath, index: usize) {
        let old = self.old;
        let end = index + old[index].span();
        for frame in &old[index..end] {
            if let FrameData::Component {
                component_id: Some(id),
                ..
            } = frame.data()
            {
                self.script.disposed_components.push(*id);
            }
        }
        self.script.edits.push(Edit::RemoveSubtree { node });
        self.script.stats.removes += 1;
    }

    fn insert(&mut self, parent: NodePath, index: u32, frame_index: usize, depth: usize) -> Result<(), DiffError> {
        let new = self.new;
        let end = frame_index + new[frame_index].span();
        // A walk of the inserted subtree would enter one scope per level.
        self.check_depth(depth + nesting(&new[frame_index..end]))?;
        self.script.edits.push(Edit::InsertSubtree {
            parent,
            index,
            origin: frame_index,
            frames: new[frame_index..end].to_vec(),
        });
        self.script.stats.inserts += 1;
        Ok(())
    }

    fn check_depth(&self, depth: usize) -> Result<(), DiffError> {
        if depth > self.config.max_depth {
            return Err(DiffError::DepthLimitExceeded {
                limit: self.config.max_depth,
            });
        }
        Ok(())
    }
}

/// Gather the live nodes of a sibling range, descending through regions.
fn collect<'a>(
    frames: &'a [Frame],
    range: Range<usize>,
    region: u64,
    depth: usize,
    max_depth: usize,
    out: &mut Nodes<'a>,
) -> Result<(), DiffError> {
    let mut index = range.start;
    while index < range.end {
        let frame = &frames[index];
        let slot = mix(region, frame.seq());
        if frame.kind() == FrameKind::Region {
            if depth + 1 > max_depth {
                return Err(DiffError::DepthLimitExceeded { limit: max_depth });
            }
            let inner = mix(slot, REGION_MARK);
            collect(frames, descendants(frames, index), inner, depth + 1, max_depth, out)?;
        } else if let Some(identity) = identity(frame) {
            out.frames.push(index);
            out.candidates.push(Candidate {
                key: frame.key(),
                slot,
                identity,
            });
        }
        index += frame.span();
    }
    Ok(())
}

/// Deepest element or region nesting inside a subtree, the root included.
fn nesting(frames: &[Frame]) -> usize {
    let mut open: Vec<usize> = Vec::new();
    let mut deepest = 0;
    for (index, frame) in frames.iter().enumerate() {
        while open.last().is_some_and(|&end| end <= index) {
            open.pop();
        }
        if matches!(frame.kind(), FrameKind::Element | FrameKind::Region) {
            open.push(index + frame.span());
            deepest = deepest.max(open.len());
        }
    }
    deepest
}

fn identity(frame: &Frame) -> Option<Identity<'_>> {
    match frame.data() {
        FrameData::Element { name, .. } => Some(Identity::Element(name)),
        FrameData::Component { component_type, .. } => Some(Identity::Component(component_type)),
        FrameData::Text { .. } => Some(Identity::Text),
        FrameData::Markup { .. } => Some(Identity::Markup),
        _ => None,
    }
}

fn same_position(old: &Candidate<'_>, new: &Candidate<'_>) -> bool {
    old.slot == new.slot && old.identity == new.identity && old.key == new.key
}

fn descendants(frames: &[Frame], index: usize) -> Range<usize> {
    let start = index + 1;
    start..(start + frames[index].subtree_len() as usize).min(frames.len())
}

fn attribute_run(frames: &[Frame], index: usize) -> &[Frame] {
    let range = descendants(frames, index);
    let len = frames[range.clone()]
        .iter()
        .take_while(|frame| frame.kind() == FrameKind::Attribute)
        .count();
    &frames[range.start..range.start + len]
}

fn shadowed(rest: &[Frame], name: &str) -> bool {
    rest.iter()
        .any(|frame| matches!(frame.data(), FrameData::Attribute { name: other, .. } if &**other == name))
}

fn last_attribute<'f>(run: &'f [Frame], name: &str) -> Option<(&'f AttributeValue, Option<EventHandlerId>)> {
    run.iter().rev().find_map(|frame| match frame.data() {
        FrameData::Attribute {
            name: other,
            value,
            handler,
        } if &**other == name => Some((value, *handler)),
        _ => None,
    })
}

/// Membership flags of one longest strictly increasing subsequence.
fn longest_increasing(values: &[usize]) -> Vec<bool> {
    let mut tails: Vec<usize> = Vec::new();
    let mut previous: Vec<Option<usize>> = vec![None; values.len()];

    for (i, &value) in values.iter().enumerate() {
        let at = tails.partition_point(|&t| values[t] < value);
        previous[i] = at.checked_sub(1).map(|p| tails[p]);
        if at == tails.len() {
            tails.push(i);
        } else {
            tails[at] = i;
        }
    }

    let mut flags = vec![false; values.len()];
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        flags[i] = true;
        cursor = previous[i];
    }
    flags
}

/// Sibling positions are stored as `u32`; sibling runs never approach that size.
#[inline]
#[allow(clippy::cast_possible_truncation)]
const fn position(index: usize) -> u32 {
    index as u32
}
