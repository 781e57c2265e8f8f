//! Points located relative to one another, with velocities obtained from
//! kinematic theorems.

use crate::{
    error::{Error, Result},
    frame::{self, FrameId},
    mechanism::Mechanism,
    vector::{self, Vector},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointId(pub(crate) usize);

#[derive(Clone, Debug)]
pub struct Point {
    pub name: String,
    /// The point this one is located from, and the position relative to it.
    pub location: Option<(PointId, Vector)>,
    /// Velocity in the Newtonian frame, once known.
    pub vel: Option<Vector>,
}

/// Adds a point with no location, the root of a position tree.
pub fn add_point(mech: &mut Mechanism, name: &str) -> PointId {
    mech.points.push(Point {
        name: name.to_string(),
        location: None,
        vel: None,
    });
    PointId(mech.points.len() - 1)
}

/// Adds a point at `offset` from `from`. The location is fixed at creation.
pub fn locate_new(mech: &mut Mechanism, name: &str, from: PointId, offset: Vector) -> PointId {
    mech.points.push(Point {
        name: name.to_string(),
        location: Some((from, offset)),
        vel: None,
    });
    PointId(mech.points.len() - 1)
}

fn chain(mech: &Mechanism, mut p: PointId) -> Vec<PointId> {
    let mut out = vec![p];
    while let Some((parent, _)) = &mech.points[p.0].location {
        p = *parent;
        out.push(p);
    }
    out
}

/// Position of `p` relative to `other`, through their lowest common ancestor.
pub fn pos_from(mech: &mut Mechanism, p: PointId, other: PointId) -> Result<Vector> {
    let p_chain = chain(mech, p);
    let other_chain = chain(mech, other);
    let ancestor = p_chain
        .iter()
        .find(|x| other_chain.contains(x))
        .copied()
        .ok_or_else(|| {
            Error::PointsDisconnected(mech.points[p.0].name.clone(), mech.points[other.0].name.clone())
        })?;

    let mut parts = vec![];
    for x in p_chain.iter().take_while(|x| **x != ancestor) {
        if let Some((_, offset)) = &mech.points[x.0].location {
            parts.push(offset.clone());
        }
    }
    for x in other_chain.iter().take_while(|x| **x != ancestor) {
        if let Some((_, offset)) = mech.points[x.0].location.clone() {
            parts.push(vector::neg(mech, &offset));
        }
    }
    Ok(vector::sum(mech, &parts))
}

/// Assigns a velocity directly. Used for points whose motion is known
/// outright, such as points fixed in the Newtonian frame.
pub fn set_vel(mech: &mut Mechanism, p: PointId, vel: Vector) {
    mech.points[p.0].vel = Some(vel);
}

pub fn vel(mech: &Mechanism, p: PointId) -> Result<&Vector> {
    mech.points[p.0]
        .vel
        .as_ref()
        .ok_or_else(|| Error::VelocityUndefined(mech.points[p.0].name.clone()))
}

/// Two-point theorem for points fixed in `fixed_in`:
///     v_p = v_other + w x r_{p/other}
pub fn v2pt_theory(
    mech: &mut Mechanism,
    p: PointId,
    other: PointId,
    fixed_in: FrameId,
) -> Result<Vector> {
    let v_other = vel(mech, other)?.clone();
    let newtonian = mech.newtonian();
    let w = frame::ang_vel(mech, fixed_in, newtonian)?;
    let r = pos_from(mech, p, other)?;
    let w_x_r = vector::cross(mech, &w, &r)?;
    let v = vector::add(mech, &v_other, &w_x_r);
    set_vel(mech, p, v.clone());
    Ok(v)
}

/// Acceleration in the Newtonian frame.
pub fn acc(mech: &mut Mechanism, p: PointId) -> Result<Vector> {
    let v = vel(mech, p)?.clone();
    let newtonian = mech.newtonian();
    vector::dt(mech, &v, newtonian)
}
