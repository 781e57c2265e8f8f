use tracing::info;

use crate::{
    constraint::{check_holonomic_derivative, IdentityCheck},
    error::Result,
    expr::{ExprCache, ExprId, Replacement, SymbolId},
    frame::{add_frame, orient, set_ang_vel, unit, Axis, FrameId},
    inertia::Inertia,
    kane::{EquationsOfMotion, KanesMethod},
    mechanism::Mechanism,
    point::{self, add_point, locate_new, PointId},
    rigid_body::{Load, RigidBody},
    symbols::{Constant, Coordinate, Input, Speed, SymbolTable},
    types::Float,
    vector::{self, Vector},
};

/// Frames of the Whipple bicycle.
#[derive(Clone, Copy, Debug)]
pub struct WhippleFrames {
    /// Newtonian
    pub n: FrameId,
    /// Yaw
    pub a: FrameId,
    /// Roll
    pub b: FrameId,
    /// Rear frame (pitch)
    pub c: FrameId,
    /// Rear wheel
    pub d: FrameId,
    /// Fork and handlebar (steer)
    pub e: FrameId,
    /// Front wheel
    pub f: FrameId,
}

#[derive(Clone, Copy, Debug)]
pub struct WhipplePoints {
    pub origin: PointId,
    pub rear_wheel_center: PointId,
    pub rear_frame_center: PointId,
    /// Point on the steer axis nearest the rear wheel center.
    pub steer_axis: PointId,
    pub front_wheel_center: PointId,
    pub fork_center: PointId,
    pub rear_contact: PointId,
    pub front_contact: PointId,
}

/// The Whipple bicycle: two wheels rolling without slip on flat ground, a
/// rear frame and a steerable fork, with roll, rear wheel and steer torques.
///
/// Reference: Moore, "Human Control of a Bicycle", 2012, chapter 2, and
/// Meijaard, Papadopoulos, Ruina & Schwab, Proc. R. Soc. A, 2007.
pub struct WhippleModel {
    pub mech: Mechanism,
    pub symbols: SymbolTable,
    pub frames: WhippleFrames,
    pub points: WhipplePoints,
    /// Front contact height above the ground, zero on a valid configuration.
    pub holonomic: ExprId,
    /// Front contact velocity along a1, a2, a3.
    pub nonholonomic: Vec<ExprId>,
    pub bodies: Vec<RigidBody>,
    pub loads: Vec<Load>,
}

fn scaled(mech: &mut Mechanism, frame: FrameId, axis: Axis, k: ExprId) -> Vector {
    let e = unit(mech, frame, axis);
    vector::scale(mech, &e, k)
}

fn orient_frames(mech: &mut Mechanism, symbols: &SymbolTable) -> Result<WhippleFrames> {
    info!("Defining reference frames");
    let n = mech.newtonian();
    let [a, b, c, d, e, f] = ["A", "B", "C", "D", "E", "F"].map(|name| add_frame(mech, name));

    info!("Orienting frames");
    let q = |c: Coordinate| symbols.q(c).expr;
    orient(mech, a, n, Axis::Z, q(Coordinate::Q3))?;
    orient(mech, b, a, Axis::X, q(Coordinate::Q4))?;
    orient(mech, c, b, Axis::Y, q(Coordinate::Q5))?;
    orient(mech, e, c, Axis::Z, q(Coordinate::Q7))?;

    info!("Setting angular velocities");
    let u = |s: Speed| symbols.u(s).expr;
    let rates = [
        (a, n, Axis::Z, u(Speed::U3)),
        (b, a, Axis::X, u(Speed::U4)),
        (c, b, Axis::Y, u(Speed::U5)),
        (d, c, Axis::Y, u(Speed::U6)),
        (e, c, Axis::Z, u(Speed::U7)),
        (f, e, Axis::Y, u(Speed::U8)),
    ];
    for (child, parent, axis, rate) in rates {
        let w = scaled(mech, parent, axis, rate);
        set_ang_vel(mech, child, parent, w)?;
    }
    Ok(WhippleFrames { n, a, b, c, d, e, f })
}

fn locate_points(
    mech: &mut Mechanism,
    symbols: &SymbolTable,
    frames: &WhippleFrames,
) -> Result<WhipplePoints> {
    info!("Defining points");
    let k = |c: Constant| symbols.constant(c).expr;
    let WhippleFrames { a, b, c, e, .. } = *frames;

    let origin = add_point(mech, "no");

    let minus_rr = mech.graph.neg(k(Constant::Rr));
    let offset = scaled(mech, b, Axis::Z, minus_rr);
    let rear_wheel_center = locate_new(mech, "do", origin, offset);

    let along = scaled(mech, c, Axis::X, k(Constant::L1));
    let down = scaled(mech, c, Axis::Z, k(Constant::L2));
    let offset = vector::add(mech, &along, &down);
    let rear_frame_center = locate_new(mech, "co", rear_wheel_center, offset);

    let offset = scaled(mech, c, Axis::X, k(Constant::D1));
    let steer_axis = locate_new(mech, "ce", rear_wheel_center, offset);

    let along = scaled(mech, e, Axis::Z, k(Constant::D2));
    let across = scaled(mech, e, Axis::X, k(Constant::D3));
    let offset = vector::add(mech, &along, &across);
    let front_wheel_center = locate_new(mech, "fo", steer_axis, offset);

    let across = scaled(mech, e, Axis::X, k(Constant::L3));
    let along = scaled(mech, e, Axis::Z, k(Constant::L4));
    let offset = vector::add(mech, &across, &along);
    let fork_center = locate_new(mech, "eo", front_wheel_center, offset);

    let offset = scaled(mech, b, Axis::Z, k(Constant::Rr));
    let rear_contact = locate_new(mech, "dn", rear_wheel_center, offset);

    // The front contact lies along the wheel radius that points at the ground:
    // (e2 x a3) x e2, normalized.
    let e2 = unit(mech, e, Axis::Y);
    let a3 = unit(mech, a, Axis::Z);
    let e2_x_a3 = vector::cross(mech, &e2, &a3)?;
    let radial = vector::cross(mech, &e2_x_a3, &e2)?;
    let radial = vector::normalize(mech, &radial)?;
    let offset = vector::scale(mech, &radial, k(Constant::Rf));
    let front_contact = locate_new(mech, "fn", front_wheel_center, offset);

    Ok(WhipplePoints {
        origin,
        rear_wheel_center,
        rear_frame_center,
        steer_axis,
        front_wheel_center,
        fork_center,
        rear_contact,
        front_contact,
    })
}

fn set_velocities(
    mech: &mut Mechanism,
    frames: &WhippleFrames,
    points: &WhipplePoints,
) -> Result<Vector> {
    info!("Setting point velocities");
    let p = points;
    point::set_vel(mech, p.origin, Vector::zero());
    point::v2pt_theory(mech, p.rear_wheel_center, p.origin, frames.d)?;
    point::v2pt_theory(mech, p.rear_frame_center, p.rear_wheel_center, frames.c)?;
    point::v2pt_theory(mech, p.steer_axis, p.rear_wheel_center, frames.c)?;
    point::v2pt_theory(mech, p.front_wheel_center, p.steer_axis, frames.e)?;
    point::v2pt_theory(mech, p.fork_center, p.front_wheel_center, frames.e)?;
    // The rear wheel rolls without slip
    point::set_vel(mech, p.rear_contact, Vector::zero());
    point::v2pt_theory(mech, p.front_contact, p.front_wheel_center, frames.f)
}

fn rigid_bodies(
    mech: &mut Mechanism,
    symbols: &SymbolTable,
    frames: &WhippleFrames,
    points: &WhipplePoints,
) -> Vec<RigidBody> {
    info!("Defining inertia and rigid bodies");
    let k = |c: Constant| symbols.constant(c).expr;
    let z = mech.graph.float(0.0);
    let WhippleFrames { c, d, e, f, .. } = *frames;

    let ic = Inertia::new(c, k(Constant::Ic11), k(Constant::Ic22), k(Constant::Ic33), z, z, k(Constant::Ic31));
    // The wheels are axisymmetric, so their inertia is written in the frame
    // carrying the axle.
    let id = Inertia::new(c, k(Constant::Id11), k(Constant::Id22), k(Constant::Id11), z, z, z);
    let ie = Inertia::new(e, k(Constant::Ie11), k(Constant::Ie22), k(Constant::Ie33), z, z, k(Constant::Ie31));
    let i_f = Inertia::new(e, k(Constant::If11), k(Constant::If22), k(Constant::If11), z, z, z);

    vec![
        RigidBody::new("rear frame", points.rear_frame_center, c, k(Constant::Mc), ic),
        RigidBody::new("rear wheel", points.rear_wheel_center, d, k(Constant::Md), id),
        RigidBody::new("fork", points.fork_center, e, k(Constant::Me), ie),
        RigidBody::new("front wheel", points.front_wheel_center, f, k(Constant::Mf), i_f),
    ]
}

fn applied_loads(
    mech: &mut Mechanism,
    symbols: &SymbolTable,
    frames: &WhippleFrames,
    bodies: &[RigidBody],
) -> Vec<Load> {
    info!("Defining loads");
    let g = symbols.constant(Constant::G).expr;
    let WhippleFrames { a, b, c, d, e, .. } = *frames;
    let t = |i: Input| symbols.input(i).expr;

    let mut loads = vec![];
    // Gravity points along a3, down
    for body in bodies {
        let weight = mech.graph.mul(&[body.mass, g]);
        let force = scaled(mech, a, Axis::Z, weight);
        loads.push(Load::Force {
            point: body.masscenter,
            force,
        });
    }

    let minus_t6 = mech.graph.neg(t(Input::T6));
    let minus_t7 = mech.graph.neg(t(Input::T7));
    let roll = scaled(mech, a, Axis::X, t(Input::T4));
    let rear_reaction = scaled(mech, b, Axis::Y, minus_t6);
    let steer_reaction = scaled(mech, c, Axis::Z, minus_t7);
    let rear_frame_torque = vector::sum(mech, &[roll, rear_reaction, steer_reaction]);
    let rear_wheel_torque = scaled(mech, c, Axis::Y, t(Input::T6));
    let steer_torque = scaled(mech, c, Axis::Z, t(Input::T7));
    loads.push(Load::Torque {
        frame: c,
        torque: rear_frame_torque,
    });
    loads.push(Load::Torque {
        frame: d,
        torque: rear_wheel_torque,
    });
    loads.push(Load::Torque {
        frame: e,
        torque: steer_torque,
    });
    loads
}

/// Builds frames, points, constraints, bodies and loads of the Whipple
/// bicycle in a fresh mechanism using `cache` for derivatives.
pub fn build_whipple(cache: ExprCache) -> Result<WhippleModel> {
    let mut mech = Mechanism::new("N", cache);
    info!("Defining time-varying symbols and constants");
    let symbols = SymbolTable::declare(&mut mech.graph)?;

    let frames = orient_frames(&mut mech, &symbols)?;
    let points = locate_points(&mut mech, &symbols, &frames)?;

    info!("Forming the holonomic constraint");
    let to_front = point::pos_from(&mut mech, points.front_contact, points.rear_contact)?;
    let a3 = unit(&mech, frames.a, Axis::Z);
    let holonomic = vector::dot(&mut mech, &to_front, &a3)?;

    let v_front_contact = set_velocities(&mut mech, &frames, &points)?;
    info!("Forming the nonholonomic constraints");
    let mut nonholonomic = vec![];
    for axis in [Axis::X, Axis::Y, Axis::Z] {
        let direction = unit(&mech, frames.a, axis);
        nonholonomic.push(vector::dot(&mut mech, &v_front_contact, &direction)?);
    }

    let bodies = rigid_bodies(&mut mech, &symbols, &frames, &points);
    let loads = applied_loads(&mut mech, &symbols, &frames, &bodies);

    Ok(WhippleModel {
        mech,
        symbols,
        frames,
        points,
        holonomic,
        nonholonomic,
        bodies,
        loads,
    })
}

impl WhippleModel {
    /// q3' = u3, q4' = u4, q5' = u5, q7' = u7
    pub fn kinematic_equations(&self) -> Vec<(SymbolId, ExprId)> {
        [
            (Coordinate::Q3, Speed::U3),
            (Coordinate::Q4, Speed::U4),
            (Coordinate::Q5, Speed::U5),
            (Coordinate::Q7, Speed::U7),
        ]
        .iter()
        .map(|(q, u)| (self.symbols.q(*q).symbol, self.symbols.u(*u).expr))
        .collect()
    }

    pub fn kanes_method(&self) -> KanesMethod {
        let q = |c: Coordinate| self.symbols.q(c).symbol;
        let u = |s: Speed| self.symbols.u(s).symbol;
        KanesMethod {
            newtonian: self.frames.n,
            q_independent: vec![q(Coordinate::Q3), q(Coordinate::Q4), q(Coordinate::Q7)],
            q_dependent: vec![q(Coordinate::Q5)],
            configuration_constraints: vec![self.holonomic],
            u_independent: vec![u(Speed::U4), u(Speed::U6), u(Speed::U7)],
            u_dependent: vec![u(Speed::U3), u(Speed::U5), u(Speed::U8)],
            kinematic_equations: self.kinematic_equations(),
            velocity_constraints: self.nonholonomic.clone(),
        }
    }

    pub fn equations_of_motion(&mut self) -> Result<EquationsOfMotion> {
        let kane = self.kanes_method();
        kane.kanes_equations(&mut self.mech, &self.bodies, &self.loads)
    }

    /// Spot-checks d/dt(holonomic) against the vertical velocity constraint.
    pub fn check_holonomic(
        &mut self,
        samples: usize,
        seed: u64,
        tolerance: Float,
    ) -> Result<IdentityCheck> {
        let mut kd = self.kanes_method().kinematic_replacement(&mut self.mech)?;
        check_holonomic_derivative(
            &mut self.mech,
            self.holonomic,
            self.nonholonomic[2],
            &mut kd,
            samples,
            seed,
            tolerance,
        )
    }

    pub fn specified(&self) -> Vec<SymbolId> {
        self.symbols.inputs().iter().map(|d| d.symbol).collect()
    }

    /// Accelerations of the rear contact, u1' and u2', from the rolling
    /// relations u1 = -rr (u5 + u6) cos(q3) and u2 = -rr (u5 + u6) sin(q3).
    /// The results contain the rates u5' and u6'.
    pub fn contact_accelerations(&mut self) -> Result<[ExprId; 2]> {
        let s = &self.symbols;
        let (rr, q3) = (s.constant(Constant::Rr).expr, s.q(Coordinate::Q3).expr);
        let (u5, u6) = (s.u(Speed::U5).expr, s.u(Speed::U6).expr);
        let mut kd = Replacement::new();
        for (q, u) in self.kinematic_equations() {
            kd.insert(self.mech.graph.derivative_symbol(q)?, u);
        }

        let g = &mut self.mech.graph;
        let wheel_rate = g.add(&[u5, u6]);
        let minus_rr = g.neg(rr);
        let speed = g.mul(&[minus_rr, wheel_rate]);
        let (c3, s3) = (g.cos(q3), g.sin(q3));
        let u1 = g.mul(&[speed, c3]);
        let u2 = g.mul(&[speed, s3]);

        let mut out = [u1, u2];
        for x in out.iter_mut() {
            let rate = self.mech.graph.dt(*x, &mut self.mech.cache)?;
            *x = self.mech.graph.xreplace(rate, &mut kd);
        }
        Ok(out)
    }
}
