use std::collections::HashMap;

use crate::{
    expr::{ExprCache, ExprGraph},
    frame::{Dcm, Frame, FrameId},
    point::{Point, PointId},
    vector::Vector,
};

/// Mechanism owns everything a symbolic multibody derivation touches: the
/// expression graph, the caller-supplied derivative cache, and the arenas of
/// reference frames and points.
///
/// Frames and points are plain data. All kinematics are done by the free
/// functions in `frame`, `point` and `vector`, which take the mechanism as
/// their first argument.
pub struct Mechanism {
    pub graph: ExprGraph,
    pub cache: ExprCache,
    pub(crate) frames: Vec<Frame>,
    pub(crate) points: Vec<Point>,
    pub(crate) dcms: HashMap<(FrameId, FrameId), Dcm>,
    newtonian: FrameId,
}

impl Mechanism {
    /// Creates a mechanism whose first frame is the inertial frame.
    pub fn new(newtonian: &str, cache: ExprCache) -> Self {
        Mechanism {
            graph: ExprGraph::new(),
            cache,
            frames: vec![Frame::new(newtonian)],
            points: vec![],
            dcms: HashMap::new(),
            newtonian: FrameId(0),
        }
    }

    pub fn newtonian(&self) -> FrameId {
        self.newtonian
    }

    pub fn frame(&self, id: FrameId) -> &Frame {
        &self.frames[id.0]
    }

    pub fn point(&self, id: PointId) -> &Point {
        &self.points[id.0]
    }

    pub fn frame_by_name(&self, name: &str) -> Option<FrameId> {
        self.frames.iter().position(|f| f.name == name).map(FrameId)
    }

    pub fn point_by_name(&self, name: &str) -> Option<PointId> {
        self.points.iter().position(|p| p.name == name).map(PointId)
    }

    /// Renders a vector as `(expr)*a1 + ...` using the frames' unit labels.
    pub fn vector_string(&self, v: &Vector) -> String {
        let mut parts = vec![];
        for (frame, components) in v.terms() {
            let labels = self.frame(*frame).unit_labels();
            for (label, c) in labels.iter().zip(components.iter()) {
                if !self.graph.is_zero(*c) {
                    parts.push(format!("{}*{}", self.graph.display(*c), label));
                }
            }
        }
        if parts.is_empty() {
            "0".to_string()
        } else {
            parts.join(" + ")
        }
    }
}
