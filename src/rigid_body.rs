use crate::{
    expr::ExprId, frame::FrameId, inertia::Inertia, point::PointId, vector::Vector,
};

#[derive(Clone, Debug, PartialEq)]
pub struct RigidBody {
    pub name: String,
    pub masscenter: PointId,
    pub frame: FrameId,
    pub mass: ExprId,
    /// Central inertia. Its frame may differ from `frame` when the body is
    /// axisymmetric about its spin axis.
    pub inertia: Inertia,
}

impl RigidBody {
    pub fn new(
        name: &str,
        masscenter: PointId,
        frame: FrameId,
        mass: ExprId,
        inertia: Inertia,
    ) -> Self {
        RigidBody {
            name: name.to_string(),
            masscenter,
            frame,
            mass,
            inertia,
        }
    }
}

/// An applied load: a force bound to a point or a torque bound to a frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Load {
    Force { point: PointId, force: Vector },
    Torque { frame: FrameId, torque: Vector },
}
