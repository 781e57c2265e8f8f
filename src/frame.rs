//! Reference frames related by simple rotations.

use crate::{
    error::{Error, Result},
    expr::{ExprGraph, ExprId},
    mechanism::Mechanism,
    vector::{self, Vector},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub(crate) usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Direction cosine matrix. `dcm(to, from)` maps components in `from` to
/// components in `to`.
pub type Dcm = [[ExprId; 3]; 3];

#[derive(Clone, Debug)]
pub struct Frame {
    pub name: String,
    pub parent: Option<FrameId>,
    /// Simple rotation relative to the parent about one of its basis vectors.
    pub rotation: Option<(Axis, ExprId)>,
    /// Angular velocity relative to the parent.
    pub ang_vel: Vector,
    ang_vel_assigned: bool,
}

impl Frame {
    pub(crate) fn new(name: &str) -> Self {
        Frame {
            name: name.to_string(),
            parent: None,
            rotation: None,
            ang_vel: Vector::zero(),
            ang_vel_assigned: false,
        }
    }

    /// Unit vector labels, e.g. `c1`, `c2`, `c3` for frame `C`.
    pub fn unit_labels(&self) -> [String; 3] {
        let prefix = self.name.to_lowercase();
        [1, 2, 3].map(|i| format!("{}{}", prefix, i))
    }
}

pub fn add_frame(mech: &mut Mechanism, name: &str) -> FrameId {
    mech.frames.push(Frame::new(name));
    FrameId(mech.frames.len() - 1)
}

/// Orients `child` by a rotation of `angle` about `axis` of `parent`. The
/// angular velocity defaults to the rate of the angle about that axis.
pub fn orient(
    mech: &mut Mechanism,
    child: FrameId,
    parent: FrameId,
    axis: Axis,
    angle: ExprId,
) -> Result<()> {
    if mech.frames[child.0].parent.is_some() || child == mech.newtonian() {
        return Err(Error::FrameRedefined(mech.frames[child.0].name.clone()));
    }
    let rate = mech.graph.dt(angle, &mut mech.cache)?;
    let unit_axis = unit(mech, parent, axis);
    let ang_vel = vector::scale(mech, &unit_axis, rate);
    let frame = &mut mech.frames[child.0];
    frame.parent = Some(parent);
    frame.rotation = Some((axis, angle));
    frame.ang_vel = ang_vel;
    Ok(())
}

/// Assigns the angular velocity of `child` relative to `parent`. A frame
/// with no orientation becomes a child of `parent` without a DCM, which is
/// how bodies such as wheels are attached when only their rates matter.
pub fn set_ang_vel(
    mech: &mut Mechanism,
    child: FrameId,
    parent: FrameId,
    ang_vel: Vector,
) -> Result<()> {
    let frame = &mech.frames[child.0];
    if frame.ang_vel_assigned {
        return Err(Error::FrameRedefined(frame.name.clone()));
    }
    if let Some(p) = frame.parent {
        if p != parent {
            return Err(Error::ParentMismatch {
                frame: frame.name.clone(),
                parent: mech.frames[p.0].name.clone(),
                given: mech.frames[parent.0].name.clone(),
            });
        }
    }
    let frame = &mut mech.frames[child.0];
    frame.parent = Some(parent);
    frame.ang_vel = ang_vel;
    frame.ang_vel_assigned = true;
    Ok(())
}

/// Basis vector of `frame`.
pub fn unit(mech: &Mechanism, frame: FrameId, axis: Axis) -> Vector {
    let (zero, one) = (mech.graph.zero(), mech.graph.one());
    let mut components = [zero; 3];
    components[axis.index()] = one;
    Vector::new(frame, components)
}

fn chain(mech: &Mechanism, mut frame: FrameId) -> Vec<FrameId> {
    let mut out = vec![frame];
    while let Some(parent) = mech.frames[frame.0].parent {
        out.push(parent);
        frame = parent;
    }
    out
}

fn identity(graph: &ExprGraph) -> Dcm {
    let (z, o) = (graph.zero(), graph.one());
    [[o, z, z], [z, o, z], [z, z, o]]
}

fn transpose(m: &Dcm) -> Dcm {
    let mut out = *m;
    for (i, row) in out.iter_mut().enumerate() {
        for (j, entry) in row.iter_mut().enumerate() {
            *entry = m[j][i];
        }
    }
    out
}

fn matmul(graph: &mut ExprGraph, a: &Dcm, b: &Dcm) -> Dcm {
    let mut out = identity(graph);
    for i in 0..3 {
        for j in 0..3 {
            let products: Vec<ExprId> = (0..3).map(|k| graph.mul(&[a[i][k], b[k][j]])).collect();
            out[i][j] = graph.add(&products);
        }
    }
    out
}

/// DCM from `frame` to its parent for the simple rotation.
fn parent_dcm(mech: &mut Mechanism, frame: FrameId) -> Result<Dcm> {
    let f = &mech.frames[frame.0];
    let (axis, angle) = match (f.parent, f.rotation) {
        (Some(_), Some(rotation)) => rotation,
        (Some(parent), None) => {
            return Err(Error::no_orientation_path(
                f.name.clone(),
                mech.frames[parent.0].name.clone(),
            ))
        }
        (None, _) => return Ok(identity(&mech.graph)),
    };
    let g = &mut mech.graph;
    let (c, s) = (g.cos(angle), g.sin(angle));
    let ms = g.neg(s);
    let (z, o) = (g.zero(), g.one());
    Ok(match axis {
        Axis::X => [[o, z, z], [z, c, ms], [z, s, c]],
        Axis::Y => [[c, z, s], [z, o, z], [ms, z, c]],
        Axis::Z => [[c, ms, z], [s, c, z], [z, z, o]],
    })
}

fn dcm_to_ancestor(mech: &mut Mechanism, mut frame: FrameId, ancestor: FrameId) -> Result<Dcm> {
    let mut out = identity(&mech.graph);
    while frame != ancestor {
        let step = parent_dcm(mech, frame)?;
        out = matmul(&mut mech.graph, &step, &out);
        frame = match mech.frames[frame.0].parent {
            Some(parent) => parent,
            None => break,
        };
    }
    Ok(out)
}

/// DCM mapping components expressed in `from` into `to`, composed through
/// the lowest common ancestor of the two frames.
pub fn dcm(mech: &mut Mechanism, to: FrameId, from: FrameId) -> Result<Dcm> {
    if to == from {
        return Ok(identity(&mech.graph));
    }
    if let Some(cached) = mech.dcms.get(&(to, from)) {
        return Ok(*cached);
    }
    let from_chain = chain(mech, from);
    let to_chain = chain(mech, to);
    let ancestor = from_chain
        .iter()
        .find(|f| to_chain.contains(f))
        .copied()
        .ok_or_else(|| {
            Error::no_orientation_path(
                mech.frames[from.0].name.clone(),
                mech.frames[to.0].name.clone(),
            )
        })?;
    let from_up = dcm_to_ancestor(mech, from, ancestor)?;
    let to_up = dcm_to_ancestor(mech, to, ancestor)?;
    let result = matmul(&mut mech.graph, &transpose(&to_up), &from_up);
    mech.dcms.insert((to, from), result);
    Ok(result)
}

/// Angular velocity of `frame` in the root of its tree.
fn ang_vel_in_root(mech: &mut Mechanism, frame: FrameId) -> (FrameId, Vector) {
    let frames = chain(mech, frame);
    let parts: Vec<Vector> = frames
        .iter()
        .map(|f| mech.frames[f.0].ang_vel.clone())
        .collect();
    let root = frames[frames.len() - 1];
    (root, vector::sum(mech, &parts))
}

/// Angular velocity of `frame` relative to `relative_to`, composed from the
/// parent-relative rates.
pub fn ang_vel(mech: &mut Mechanism, frame: FrameId, relative_to: FrameId) -> Result<Vector> {
    let (root, w_frame) = ang_vel_in_root(mech, frame);
    let (other_root, w_other) = ang_vel_in_root(mech, relative_to);
    if root != other_root {
        return Err(Error::no_orientation_path(
            mech.frames[frame.0].name.clone(),
            mech.frames[relative_to.0].name.clone(),
        ));
    }
    Ok(vector::sub(mech, &w_frame, &w_other))
}

#[cfg(test)]
mod frame_tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::expr::ExprCache;

    fn two_rotations() -> (Mechanism, FrameId, FrameId, FrameId, [ExprId; 2]) {
        let mut mech = Mechanism::new("N", ExprCache::new(1 << 12));
        let a = add_frame(&mut mech, "A");
        let b = add_frame(&mut mech, "B");
        let n = mech.newtonian();
        let q1 = mech.graph.dynamic("q1").unwrap();
        let q2 = mech.graph.dynamic("q2").unwrap();
        orient(&mut mech, a, n, Axis::Z, q1).unwrap();
        orient(&mut mech, b, a, Axis::X, q2).unwrap();
        (mech, n, a, b, [q1, q2])
    }

    #[test]
    fn dcm_composes_rotations() {
        // Arrange
        let (mut mech, n, _a, b, [q1, q2]) = two_rotations();
        let (t1, t2) = (0.3, -1.1);

        // Act
        let r = dcm(&mut mech, n, b).unwrap();
        let mut values = vec![None; mech.graph.symbol_count()];
        values[mech.graph.as_symbol(q1).unwrap().index()] = Some(t1);
        values[mech.graph.as_symbol(q2).unwrap().index()] = Some(t2);
        let flat: Vec<ExprId> = r.iter().flatten().copied().collect();
        let numeric = mech.graph.evaluate::<f64>(&flat, &values).unwrap();

        // Assert
        // Rz(t1) * Rx(t2)
        let expected = [
            t1.cos(),
            -t1.sin() * t2.cos(),
            t1.sin() * t2.sin(),
            t1.sin(),
            t1.cos() * t2.cos(),
            -t1.cos() * t2.sin(),
            0.0,
            t2.sin(),
            t2.cos(),
        ];
        for (x, y) in numeric.iter().zip(expected.iter()) {
            assert_relative_eq!(*x, *y, epsilon = 1e-15);
        }
        let back = dcm(&mut mech, b, n).unwrap();
        assert_eq!(back, transpose(&r));
    }

    #[test]
    fn orient_twice_is_rejected() {
        // Arrange
        let (mut mech, n, a, _b, [q1, _]) = two_rotations();

        // Act
        let result = orient(&mut mech, a, n, Axis::Y, q1);

        // Assert
        assert!(matches!(result, Err(Error::FrameRedefined(name)) if name == "A"));
    }

    #[test]
    fn frame_without_orientation_has_no_dcm() {
        // Arrange
        let (mut mech, n, a, _b, _) = two_rotations();
        let wheel = add_frame(&mut mech, "D");
        let u = mech.graph.dynamic("u").unwrap();
        let axis = unit(&mech, a, Axis::Y);
        let w = vector::scale(&mut mech, &axis, u);
        set_ang_vel(&mut mech, wheel, a, w).unwrap();

        // Act
        let result = dcm(&mut mech, n, wheel);
        let w_wheel = ang_vel(&mut mech, wheel, n).unwrap();

        // Assert
        assert!(matches!(result, Err(Error::NoOrientationPath { .. })));
        // q1' n3 + u a2
        assert_eq!(w_wheel.terms().len(), 2);
    }

    #[test]
    fn ang_vel_sums_chain() {
        // Arrange
        let (mut mech, n, a, b, _) = two_rotations();

        // Act
        let w_b = ang_vel(&mut mech, b, n).unwrap();
        let w_rel = ang_vel(&mut mech, b, a).unwrap();

        // Assert
        assert_eq!(mech.vector_string(&w_b), "q2'*a1 + q1'*n3");
        assert_eq!(mech.vector_string(&w_rel), "q2'*a1");
    }

    #[test]
    fn unit_labels_follow_frame_name() {
        // Arrange
        let (mech, _, _, b, _) = two_rotations();

        // Act
        let labels = mech.frame(b).unit_labels();

        // Assert
        assert_eq!(labels, ["b1".to_string(), "b2".to_string(), "b3".to_string()]);
    }
}
