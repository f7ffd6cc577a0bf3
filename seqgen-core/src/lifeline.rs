//! Lifelines and their activation trees
//!
//! All activations live in one arena ([`Lifelines`]) and refer to each other
//! by [`LifelineId`]. A participant is a *root* activation. When it is called
//! while already active, a nested activation is appended to the chain on the
//! caller's side (left if the caller is declared left of it, right otherwise).
//! Nested activations are detached again when their answer is sent, but they
//! stay in the arena: the space they occupied is still part of the drawing.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::StructuralError;
use crate::record::ObjectRecord;
use crate::thread::ThreadId;

/// Index of an activation in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LifelineId(pub usize);

/// Side of the root a nested activation is drawn on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Center,
    Left,
    Right,
}

/// Vertical span of an activation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment {
    pub top: f64,
    /// `None` while the span is still open
    pub bottom: Option<f64>,
    /// Full-width rectangle (`true`) or thin lifeline (`false`)
    pub active: bool,
}

/// A root lifeline or a nested activation of it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lifeline {
    pub id: LifelineId,
    pub name: String,
    pub type_name: String,
    pub label: String,
    pub anonymous: bool,
    pub role: bool,
    pub always_active: bool,
    pub active_object: bool,
    pub has_thread: bool,
    pub autodestroy: bool,
    pub external: bool,

    pub alive: bool,
    pub active: bool,
    /// Suspended in a call that has not been answered yet
    pub waiting: bool,
    pub thread: ThreadId,
    pub mnemonic: Option<String>,
    /// Declared left-to-right index of the participant
    pub position: usize,

    pub root: LifelineId,
    pub parent: Option<LifelineId>,
    pub left_child: Option<LifelineId>,
    pub right_child: Option<LifelineId>,
    pub direction: Direction,
    /// Nesting depth at creation time (0 for roots)
    pub depth: usize,
    pub disposed: bool,

    pub segments: Vec<Segment>,
    /// Where the participant came to life (roots only)
    pub birth: Option<f64>,
    /// Where the participant ended (roots only)
    pub death: Option<f64>,
    /// Draw a destruction cross at `death`
    pub destroy_mark: bool,
}

impl Lifeline {
    pub fn is_root(&self) -> bool {
        self.parent.is_none() && self.root == self.id
    }

    /// Currently executing on its thread
    pub fn is_executing(&self) -> bool {
        self.active && !self.waiting
    }

    fn open_segment(&self) -> Option<&Segment> {
        self.segments.last().filter(|s| s.bottom.is_none())
    }

    fn close_segment(&mut self, y: f64) {
        if let Some(segment) = self.segments.last_mut() {
            if segment.bottom.is_none() {
                segment.bottom = Some(y.max(segment.top));
            }
        }
    }

    /// Lowest point reached so far
    pub fn extent(&self) -> f64 {
        self.segments
            .iter()
            .map(|s| s.bottom.unwrap_or(s.top))
            .fold(self.birth.unwrap_or(0.0), f64::max)
    }
}

/// Arena of all activations, with the name-keyed registry of roots
#[derive(Debug, Clone, Default)]
pub struct Lifelines {
    nodes: Vec<Lifeline>,
    roots: IndexMap<String, LifelineId>,
}

impl Lifelines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the root lifeline of a declared object
    pub fn create(&mut self, record: &ObjectRecord) -> LifelineId {
        let id = LifelineId(self.nodes.len());
        let always_active = record.is_always_active();
        let alive = record.flags.alive_from_start;
        let segments = if alive {
            vec![Segment {
                top: 0.0,
                bottom: None,
                active: always_active,
            }]
        } else {
            Vec::new()
        };
        self.nodes.push(Lifeline {
            id,
            name: record.name.clone(),
            type_name: record.type_name.clone(),
            label: record.label.clone().unwrap_or_else(|| record.name.clone()),
            anonymous: record.flags.anonymous,
            role: record.flags.role,
            always_active,
            active_object: record.flags.active_object,
            has_thread: record.flags.has_thread,
            autodestroy: record.flags.autodestroy,
            external: record.flags.external,
            alive,
            active: always_active && alive,
            waiting: false,
            thread: if always_active {
                ThreadId::ACTOR
            } else {
                ThreadId::MAIN
            },
            mnemonic: None,
            position: self.roots.len(),
            root: id,
            parent: None,
            left_child: None,
            right_child: None,
            direction: Direction::Center,
            depth: 0,
            disposed: false,
            segments,
            birth: alive.then_some(0.0),
            death: None,
            destroy_mark: false,
        });
        self.roots.insert(record.name.clone(), id);
        id
    }

    pub fn get(&self, id: LifelineId) -> &Lifeline {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: LifelineId) -> &mut Lifeline {
        &mut self.nodes[id.0]
    }

    /// Root lifeline registered under `name`
    pub fn root(&self, name: &str) -> Option<LifelineId> {
        self.roots.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.roots.contains_key(name)
    }

    /// Roots in declaration order
    pub fn roots(&self) -> impl Iterator<Item = &Lifeline> + '_ {
        self.roots.values().map(move |id| self.get(*id))
    }

    /// Every activation ever created
    pub fn iter(&self) -> impl Iterator<Item = &Lifeline> + '_ {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every view of `root`, detached ones included
    pub fn all_views(&self, root: LifelineId) -> impl Iterator<Item = &Lifeline> + '_ {
        self.nodes.iter().filter(move |n| n.root == root)
    }

    /// Activations of `root` currently attached to its tree
    pub fn attached(&self, root: LifelineId) -> Vec<LifelineId> {
        let mut ids = vec![root];
        for side in [Direction::Left, Direction::Right] {
            let mut next = self.child(root, side);
            while let Some(id) = next {
                ids.push(id);
                next = self.child(id, side);
            }
        }
        ids
    }

    fn child(&self, id: LifelineId, side: Direction) -> Option<LifelineId> {
        let node = self.get(id);
        match side {
            Direction::Left => node.left_child,
            Direction::Right => node.right_child,
            Direction::Center => None,
        }
    }

    fn set_child(&mut self, id: LifelineId, side: Direction, child: Option<LifelineId>) {
        let node = self.get_mut(id);
        match side {
            Direction::Left => node.left_child = child,
            Direction::Right => node.right_child = child,
            Direction::Center => {}
        }
    }

    /// Any activation of `root` is active
    pub fn is_active(&self, root: LifelineId) -> bool {
        self.attached(root).iter().any(|id| self.get(*id).active)
    }

    /// Append a nested activation of `root` for a call coming from a
    /// participant at `caller_position` (`None` for calls without caller)
    pub fn add_activity(
        &mut self,
        root: LifelineId,
        caller_position: Option<usize>,
        thread: ThreadId,
    ) -> LifelineId {
        let side = match caller_position {
            Some(p) if p < self.get(root).position => Direction::Left,
            _ => Direction::Right,
        };
        let mut end = root;
        while let Some(next) = self.child(end, side) {
            end = next;
        }

        let id = LifelineId(self.nodes.len());
        let template = self.get(root);
        let node = Lifeline {
            id,
            alive: true,
            active: false,
            waiting: false,
            thread,
            mnemonic: None,
            root,
            parent: Some(end),
            left_child: None,
            right_child: None,
            direction: side,
            depth: self.get(end).depth + 1,
            disposed: false,
            segments: Vec::new(),
            birth: None,
            death: None,
            destroy_mark: false,
            ..template.clone()
        };
        tracing::trace!(name = %node.name, side = ?side, depth = node.depth, "nested activation");
        self.nodes.push(node);
        self.set_child(end, side, Some(id));
        id
    }

    /// Switch between the thin and the full-width representation at `y`
    pub fn set_active(&mut self, id: LifelineId, active: bool, y: f64) {
        let node = self.get_mut(id);
        if node.active == active && node.open_segment().is_some() {
            return;
        }
        node.active = active;
        node.close_segment(y);
        // Nested activations only exist while active
        if active || node.is_root() {
            node.segments.push(Segment {
                top: y,
                bottom: None,
                active,
            });
        }
    }

    /// Stop executing at `y`
    pub fn finish(&mut self, id: LifelineId, y: f64) {
        if self.get(id).always_active {
            return;
        }
        self.set_active(id, false, y);
        let node = self.get_mut(id);
        node.waiting = false;
        node.mnemonic = None;
    }

    /// Bring a not-yet-alive root to life at `y`
    pub fn bring_to_life(&mut self, id: LifelineId, y: f64) {
        let node = self.get_mut(id);
        node.alive = true;
        node.birth = Some(y);
        node.death = None;
        node.destroy_mark = false;
        node.segments.push(Segment {
            top: y,
            bottom: None,
            active: node.always_active,
        });
        node.active = node.always_active;
    }

    /// Detach a finished nested activation, splicing its child into its parent
    pub fn dispose(&mut self, id: LifelineId) -> Result<(), StructuralError> {
        let node = self.get(id);
        if node.is_root() {
            return Err(StructuralError::DisposeRoot {
                name: node.name.clone(),
                id: id.0,
            });
        }
        if node.active {
            return Err(StructuralError::DisposeActive {
                name: node.name.clone(),
                id: id.0,
                thread: node.thread.0,
            });
        }
        let side = node.direction;
        let child = self.child(id, side);
        let parent = node.parent.ok_or_else(|| StructuralError::BrokenChain {
            name: node.name.clone(),
            id: id.0,
        })?;

        self.set_child(parent, side, child);
        if let Some(child) = child {
            self.get_mut(child).parent = Some(parent);
        }
        let node = self.get_mut(id);
        node.parent = None;
        node.left_child = None;
        node.right_child = None;
        node.disposed = true;
        Ok(())
    }

    /// End the life of a root at `y`
    pub fn terminate(&mut self, id: LifelineId, y: f64, destroyed: bool) {
        let node = self.get_mut(id);
        node.close_segment(y);
        node.alive = false;
        node.active = false;
        node.waiting = false;
        node.death = Some(y);
        node.destroy_mark = destroyed || node.autodestroy;
    }

    /// Close the open segment of an always active lifeline at `y`
    pub fn close(&mut self, id: LifelineId, y: f64) {
        self.get_mut(id).close_segment(y);
    }
}
