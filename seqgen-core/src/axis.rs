//! Horizontal placement of lifelines, activations and arrows
//!
//! Runs once over a finished [`Diagram`]. Lifelines are placed left to right
//! in declaration order: each axis is the running accumulator plus the room
//! its left-nested activations need plus half the activation width. A lifeline
//! is pushed further right whenever an arrow label coming from the left (or a
//! self-call label of its left neighbour) would not fit otherwise.

use serde::Serialize;

use crate::config::Config;
use crate::diagram::Diagram;
use crate::lifeline::{Direction, Lifeline, LifelineId, Lifelines};
use crate::message::{Message, MessageId};

/// Rectangle of one active span
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivationBox {
    pub id: LifelineId,
    pub axis: f64,
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

/// Placement of a participant and all its activations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifelineAxis {
    pub id: LifelineId,
    pub name: String,
    pub axis: f64,
    pub top: f64,
    pub bottom: f64,
    pub destroy_mark: bool,
    pub boxes: Vec<ActivationBox>,
}

/// Horizontal span of a message arrow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Arrow {
    pub message: MessageId,
    pub from: f64,
    pub to: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    /// Participants in declaration order
    pub lifelines: Vec<LifelineAxis>,
    /// Arrows in generation order
    pub arrows: Vec<Arrow>,
    pub width: f64,
    pub height: f64,
}

impl Layout {
    pub fn lifeline(&self, name: &str) -> Option<&LifelineAxis> {
        self.lifelines.iter().find(|l| l.name == name)
    }

    pub fn arrow(&self, id: MessageId) -> Option<&Arrow> {
        self.arrows.get(id.0)
    }
}

/// Offset of a (possibly nested) activation from its root's axis
fn offset(node: &Lifeline, config: &Config) -> f64 {
    let shift = node.depth as f64 * config.sub_width;
    match node.direction {
        Direction::Center => 0.0,
        Direction::Left => -shift,
        Direction::Right => shift,
    }
}

/// Deepest nesting on the left and on the right of `root`
fn side_depths(lifelines: &Lifelines, root: LifelineId) -> (usize, usize) {
    lifelines
        .all_views(root)
        .fold((0, 0), |(left, right), node| match node.direction {
            Direction::Left => (left.max(node.depth), right),
            Direction::Right => (left, right.max(node.depth)),
            Direction::Center => (left, right),
        })
}

struct Placement<'a> {
    config: &'a Config,
    lifelines: &'a Lifelines,
    axes: Vec<f64>,
}

impl Placement<'_> {
    fn node_axis(&self, id: LifelineId) -> f64 {
        let node = self.lifelines.get(id);
        self.axes[node.position] + offset(node, self.config)
    }

    fn arrow(&self, message: &Message) -> Arrow {
        let half = self.config.main_width / 2.0;
        let (from, to) = match (message.caller, message.callee) {
            (Some(a), Some(b)) => {
                let (xa, xb) = (self.node_axis(a), self.node_axis(b));
                if self.lifelines.get(a).root == self.lifelines.get(b).root {
                    (xa + half, xb + half)
                } else if xa < xb {
                    (xa + half, xb - half)
                } else {
                    (xa - half, xb + half)
                }
            }
            (Some(a), None) => {
                let x = self.node_axis(a) + half;
                (x, x)
            }
            (None, Some(b)) => {
                let to = self.node_axis(b) - half;
                ((to - self.config.label_width(&message.text)).max(0.0), to)
            }
            (None, None) => (0.0, 0.0),
        };
        Arrow {
            message: message.id,
            from,
            to,
            y: message.y,
        }
    }
}

pub(crate) fn compute(diagram: &Diagram) -> Layout {
    let config = diagram.config();
    let lifelines = diagram.lifelines();
    let half = config.main_width / 2.0;
    let roots: Vec<&Lifeline> = lifelines.roots().collect();

    let mut placement = Placement {
        config,
        lifelines,
        axes: Vec::with_capacity(roots.len()),
    };
    let mut accumulator = config.left_margin;
    let mut right_edge: f64 = 0.0;

    for (index, root) in roots.iter().enumerate() {
        let (left_depth, right_depth) = side_depths(lifelines, root.id);
        let left_reach = left_depth as f64 * config.sub_width;
        let mut axis = accumulator + left_reach + half;

        for message in diagram.messages() {
            let (Some(a), Some(b)) = (message.caller, message.callee) else {
                continue;
            };
            let (na, nb) = (lifelines.get(a), lifelines.get(b));
            let width = config.label_width(&message.text);

            if na.position == nb.position {
                // Self-call labels hang right of the lifeline
                if na.position + 1 == index {
                    let reach = placement.axes[na.position]
                        + offset(na, config).max(offset(nb, config))
                        + half
                        + width;
                    axis = axis.max(reach + left_reach + half);
                }
                continue;
            }

            let (left, right) = if na.position < nb.position {
                (na, nb)
            } else {
                (nb, na)
            };
            if right.position != index {
                continue;
            }
            let needed = placement.axes[left.position] + offset(left, config) + half + width + half
                - offset(right, config);
            axis = axis.max(needed);
        }

        placement.axes.push(axis);
        let right_reach = axis + half + right_depth as f64 * config.sub_width;
        right_edge = right_edge.max(right_reach);
        accumulator = right_reach + config.lifeline_gap;
    }

    let arrows: Vec<Arrow> = diagram
        .messages()
        .iter()
        .map(|m| placement.arrow(m))
        .collect();
    for (arrow, message) in arrows.iter().zip(diagram.messages()) {
        let label_end = arrow.from.min(arrow.to) + config.label_width(&message.text);
        right_edge = right_edge.max(arrow.from.max(arrow.to)).max(label_end);
    }

    let end = diagram.cursor();
    let placed = roots
        .iter()
        .map(|root| {
            let boxes = lifelines
                .all_views(root.id)
                .flat_map(|node| {
                    let axis = placement.node_axis(node.id);
                    node.segments
                        .iter()
                        .filter(|s| s.active)
                        .map(move |s| ActivationBox {
                            id: node.id,
                            axis,
                            left: axis - half,
                            right: axis + half,
                            top: s.top,
                            bottom: s.bottom.unwrap_or(end),
                        })
                })
                .collect();
            LifelineAxis {
                id: root.id,
                name: root.name.clone(),
                axis: placement.axes[root.position],
                top: root.birth.unwrap_or(end),
                bottom: root.death.unwrap_or(end),
                destroy_mark: root.destroy_mark,
                boxes,
            }
        })
        .collect();

    Layout {
        lifelines: placed,
        arrows,
        width: right_edge + config.left_margin,
        height: end + config.row_height,
    }
}
