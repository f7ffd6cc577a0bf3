//! Two-way mapping between source positions and drawables
//!
//! The editor uses it to scroll to the line of a clicked arrow and to
//! highlight the arrow of the line under the caret.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::lifeline::LifelineId;
use crate::message::MessageId;

/// Something the exporter draws that originates from a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Drawable {
    Lifeline(LifelineId),
    Message(MessageId),
    Marker(usize),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMap {
    by_position: BTreeMap<usize, Drawable>,
    by_drawable: HashMap<Drawable, usize>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `drawable` with `position`. A position keeps the first
    /// drawable registered for it (the first branch of a broadcast).
    pub fn insert(&mut self, position: usize, drawable: Drawable) {
        self.by_position.entry(position).or_insert(drawable);
        self.by_drawable.insert(drawable, position);
    }

    /// Drawable produced by the record at exactly `position`
    pub fn drawable_at(&self, position: usize) -> Option<Drawable> {
        self.by_position.get(&position).copied()
    }

    /// Drawable of the closest record starting at or before `position`
    pub fn drawable_near(&self, position: usize) -> Option<(usize, Drawable)> {
        self.by_position
            .range(..=position)
            .next_back()
            .map(|(p, d)| (*p, *d))
    }

    /// Source position of `drawable`
    pub fn position_of(&self, drawable: Drawable) -> Option<usize> {
        self.by_drawable.get(&drawable).copied()
    }

    pub fn len(&self) -> usize {
        self.by_drawable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_drawable.is_empty()
    }
}
