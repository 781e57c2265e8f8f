//! Kane's method for systems with nonholonomic velocity constraints.
//!
//! Reference: Kane & Levinson, "Dynamics: Theory and Applications", 1985,
//! chapters 4 and 6.

use itertools::izip;
use na::{DMatrix, DVector};
use tracing::{debug, info};

use crate::{
    error::{Error, Result},
    expr::{ExprGraph, ExprId, Replacement, SymbolId},
    frame::{self, FrameId},
    inertia::{inertia_dot, inertia_rate_dot},
    mechanism::Mechanism,
    point,
    rigid_body::{Load, RigidBody},
    vector::{self, Vector},
};

/// Inputs to Kane's method. Speeds are ordered independent first; the
/// number of velocity constraints equals the number of dependent speeds.
/// Every dependent coordinate must appear in a configuration constraint.
#[derive(Clone, Debug)]
pub struct KanesMethod {
    pub newtonian: FrameId,
    pub q_independent: Vec<SymbolId>,
    pub q_dependent: Vec<SymbolId>,
    pub configuration_constraints: Vec<ExprId>,
    pub u_independent: Vec<SymbolId>,
    pub u_dependent: Vec<SymbolId>,
    /// `(q, rhs)` pairs meaning q' = rhs.
    pub kinematic_equations: Vec<(SymbolId, ExprId)>,
    pub velocity_constraints: Vec<ExprId>,
}

/// Equations of motion in the form
///     M(q) [u_ind', u_dep']ᵀ = F(q, u, T)
///     q' = kinematic_rhs(u)
/// The first rows of M and F are the reduced dynamical equations in the
/// independent speeds, the remaining rows the time-differentiated velocity
/// constraints.
#[derive(Clone, Debug)]
pub struct EquationsOfMotion {
    pub coordinates: Vec<SymbolId>,
    pub speeds: Vec<SymbolId>,
    pub n_independent: usize,
    pub mass_matrix: DMatrix<ExprId>,
    pub forcing: DVector<ExprId>,
    pub kinematic_rhs: DVector<ExprId>,
}

impl EquationsOfMotion {
    /// All expressions of M and F, row-major M first.
    pub fn roots(&self) -> Vec<ExprId> {
        let mut roots: Vec<ExprId> = self.mass_matrix.transpose().iter().copied().collect();
        roots.extend(self.forcing.iter().copied());
        roots
    }
}

fn determinant(g: &mut ExprGraph, m: &DMatrix<ExprId>) -> ExprId {
    let n = m.nrows();
    match n {
        0 => g.one(),
        1 => m[(0, 0)],
        2 => {
            let ad = g.mul(&[m[(0, 0)], m[(1, 1)]]);
            let bc = g.mul(&[m[(0, 1)], m[(1, 0)]]);
            g.sub(ad, bc)
        }
        _ => {
            let mut terms = Vec::with_capacity(n);
            for j in 0..n {
                let minor = m.clone().remove_row(0).remove_column(j);
                let d = determinant(g, &minor);
                let term = g.mul(&[m[(0, j)], d]);
                terms.push(if j % 2 == 0 { term } else { g.neg(term) });
            }
            g.add(&terms)
        }
    }
}

fn adjugate(g: &mut ExprGraph, m: &DMatrix<ExprId>) -> DMatrix<ExprId> {
    let n = m.nrows();
    if n == 1 {
        return DMatrix::from_element(1, 1, g.one());
    }
    DMatrix::from_fn(n, n, |i, j| {
        let minor = m.clone().remove_row(j).remove_column(i);
        let d = determinant(g, &minor);
        if (i + j) % 2 == 0 {
            d
        } else {
            g.neg(d)
        }
    })
}

/// Solves B_dep u_dep = -B_ind u_ind for the dependent speeds, giving
/// u_dep = A_rs u_ind with A_rs = -B_dep⁻¹ B_ind.
fn dependent_speed_coefficients(
    g: &mut ExprGraph,
    k_nh: &DMatrix<ExprId>,
    n_independent: usize,
) -> DMatrix<ExprId> {
    let m = k_nh.nrows();
    let b_ind = k_nh.columns(0, n_independent).into_owned();
    let b_dep = k_nh.columns(n_independent, m).into_owned();
    let det = determinant(g, &b_dep);
    let inv_det = g.pow(det, -1.0);
    let adj = adjugate(g, &b_dep);
    DMatrix::from_fn(m, n_independent, |i, j| {
        let products: Vec<ExprId> = (0..m).map(|k| g.mul(&[adj[(i, k)], b_ind[(k, j)]])).collect();
        let sum = g.add(&products);
        let scaled = g.mul(&[inv_det, sum]);
        g.neg(scaled)
    })
}

/// X~[r] = X_ind[r] + sum_k A_rs[k, r] X_dep[k]
fn reduce(g: &mut ExprGraph, a_rs: &DMatrix<ExprId>, x: &[ExprId], r: usize) -> ExprId {
    let p = a_rs.ncols();
    let mut terms = vec![x[r]];
    for k in 0..a_rs.nrows() {
        terms.push(g.mul(&[a_rs[(k, r)], x[p + k]]));
    }
    g.add(&terms)
}

fn partials(mech: &mut Mechanism, v: &Vector, speeds: &[SymbolId]) -> Vec<Vector> {
    speeds.iter().map(|u| vector::partial(mech, v, *u)).collect()
}

impl KanesMethod {
    pub fn speeds(&self) -> Vec<SymbolId> {
        self.u_independent
            .iter()
            .chain(self.u_dependent.iter())
            .copied()
            .collect()
    }

    pub fn coordinates(&self) -> Vec<SymbolId> {
        self.q_independent
            .iter()
            .chain(self.q_dependent.iter())
            .copied()
            .collect()
    }

    /// Replacement of every coordinate rate by its kinematic right-hand side.
    pub fn kinematic_replacement(&self, mech: &mut Mechanism) -> Result<Replacement> {
        let mut kd = Replacement::new();
        for (q, rhs) in &self.kinematic_equations {
            let qd = mech.graph.derivative_symbol(*q)?;
            kd.insert(qd, *rhs);
        }
        Ok(kd)
    }

    /// Forms the mass matrix and forcing vector.
    pub fn kanes_equations(
        &self,
        mech: &mut Mechanism,
        bodies: &[RigidBody],
        loads: &[Load],
    ) -> Result<EquationsOfMotion> {
        let constrained = mech.graph.free_symbols(&self.configuration_constraints);
        if let Some(q) = self.q_dependent.iter().find(|q| !constrained.contains(*q)) {
            return Err(Error::UnconstrainedCoordinate(mech.graph.symbol_name(*q).to_string()));
        }

        let speeds = self.speeds();
        let coordinates = self.coordinates();
        let (n, p) = (speeds.len(), self.u_independent.len());
        let m = self.u_dependent.len();
        let zero = mech.graph.zero();

        let mut kd = self.kinematic_replacement(mech)?;
        // Accelerations with the speed rates removed, for the nonlinear part of Fr*
        let mut kd_no_udot = kd.clone();
        for u in &speeds {
            let ud = mech.graph.derivative_symbol(*u)?;
            kd_no_udot.insert(ud, zero);
        }

        info!("Forming constraint coefficient matrices");
        let nh: Vec<ExprId> = self
            .velocity_constraints
            .iter()
            .map(|e| mech.graph.xreplace(*e, &mut kd))
            .collect();
        let k_nh = DMatrix::from_fn(m, n, |i, j| {
            mech.graph.diff(nh[i], speeds[j], &mut mech.cache)
        });
        let mut zero_speeds = Replacement::new();
        for u in &speeds {
            zero_speeds.insert(*u, zero);
        }
        let f_nh: Vec<ExprId> = nh
            .iter()
            .map(|e| mech.graph.xreplace(*e, &mut zero_speeds))
            .collect();
        let a_rs = dependent_speed_coefficients(&mut mech.graph, &k_nh, p);
        debug!(nodes = mech.graph.len(), "dependent speed coefficients formed");

        info!("Forming generalized active forces");
        let newtonian = self.newtonian;
        let mut fr = vec![zero; n];
        for load in loads {
            let (motion, applied) = match load {
                Load::Force { point: at, force } => (point::vel(mech, *at)?.clone(), force),
                Load::Torque { frame: on, torque } => {
                    (frame::ang_vel(mech, *on, newtonian)?, torque)
                }
            };
            let motion = vector::replace(mech, &motion, &mut kd);
            for (r, partial) in partials(mech, &motion, &speeds).iter().enumerate() {
                let contribution = vector::dot(mech, partial, applied)?;
                fr[r] = mech.graph.add(&[fr[r], contribution]);
            }
        }

        info!("Forming generalized inertia forces");
        let mut mm = vec![vec![zero; n]; n];
        let mut non_mm = vec![zero; n];
        for body in bodies {
            let vel = point::vel(mech, body.masscenter)?.clone();
            let vel = vector::replace(mech, &vel, &mut kd);
            let omega = frame::ang_vel(mech, body.frame, newtonian)?;
            let omega = vector::replace(mech, &omega, &mut kd);
            let pv = partials(mech, &vel, &speeds);
            let pw = partials(mech, &omega, &speeds);

            let acc = vector::dt(mech, &vel, newtonian)?;
            let acc = vector::replace(mech, &acc, &mut kd_no_udot);
            let alpha = vector::dt(mech, &omega, newtonian)?;
            let alpha = vector::replace(mech, &alpha, &mut kd_no_udot);

            let inertia = &body.inertia;
            let rate = inertia_rate_dot(mech, inertia, body.frame, &omega)?;
            let i_alpha = inertia_dot(mech, inertia, &alpha)?;
            let i_omega = inertia_dot(mech, inertia, &omega)?;
            let gyroscopic = vector::cross(mech, &omega, &i_omega)?;
            let torque = vector::sum(mech, &[rate, i_alpha, gyroscopic]);
            let torque = vector::replace(mech, &torque, &mut kd);
            let force = vector::scale(mech, &acc, body.mass);

            for (mm_row, non_mm_j, pv_j, pw_j) in izip!(mm.iter_mut(), non_mm.iter_mut(), &pv, &pw) {
                let i_pw = inertia_dot(mech, inertia, pw_j)?;
                for (entry, pv_k, pw_k) in izip!(mm_row.iter_mut(), &pv, &pw) {
                    let translational = vector::dot(mech, pv_j, pv_k)?;
                    let translational = mech.graph.mul(&[body.mass, translational]);
                    let rotational = vector::dot(mech, &i_pw, pw_k)?;
                    *entry = mech.graph.add(&[*entry, translational, rotational]);
                }
                let linear = vector::dot(mech, &force, pv_j)?;
                let angular = vector::dot(mech, &torque, pw_j)?;
                *non_mm_j = mech.graph.add(&[*non_mm_j, linear, angular]);
            }
            debug!(body = %body.name, nodes = mech.graph.len(), "inertia forces added");
        }

        info!("Assembling mass matrix and forcing vector");
        let g = &mut mech.graph;
        let mut mass_matrix = DMatrix::from_element(n, n, zero);
        let mut forcing = DVector::from_element(n, zero);
        for r in 0..p {
            for c in 0..n {
                let column: Vec<ExprId> = mm.iter().map(|row| row[c]).collect();
                mass_matrix[(r, c)] = reduce(g, &a_rs, &column, r);
            }
            let active = reduce(g, &a_rs, &fr, r);
            let inertial = reduce(g, &a_rs, &non_mm, r);
            forcing[r] = g.sub(active, inertial);
        }
        for i in 0..m {
            let mut terms = vec![];
            for (j, u) in speeds.iter().enumerate() {
                mass_matrix[(p + i, j)] = k_nh[(i, j)];
                let rate = g.dt(k_nh[(i, j)], &mut mech.cache)?;
                let u = g.symbol_expr(*u);
                terms.push(g.mul(&[rate, u]));
            }
            terms.push(g.dt(f_nh[i], &mut mech.cache)?);
            let constraint_rate = g.add(&terms);
            forcing[p + i] = g.neg(constraint_rate);
        }
        let mass_matrix = mass_matrix.map(|e| g.xreplace(e, &mut kd));
        let forcing = forcing.map(|e| g.xreplace(e, &mut kd));

        let mut kinematic_rhs = DVector::from_element(coordinates.len(), zero);
        for (i, q) in coordinates.iter().enumerate() {
            if let Some((_, rhs)) = self.kinematic_equations.iter().find(|(s, _)| s == q) {
                kinematic_rhs[i] = *rhs;
            }
        }
        debug!(nodes = g.len(), cache = ?mech.cache.stats(), "equations of motion formed");

        Ok(EquationsOfMotion {
            coordinates,
            speeds,
            n_independent: p,
            mass_matrix,
            forcing,
            kinematic_rhs,
        })
    }
}

#[cfg(test)]
mod kane_tests {
    use super::*;
    use crate::{
        assert_close,
        expr::ExprCache,
        frame::{add_frame, orient, set_ang_vel, unit, Axis},
        inertia::Inertia,
        point::{add_point, locate_new, set_vel, v2pt_theory},
    };

    fn values(mech: &Mechanism, pairs: &[(&str, f64)]) -> Vec<Option<f64>> {
        let mut values = vec![None; mech.graph.symbol_count()];
        for (name, value) in pairs {
            values[mech.graph.find_symbol(name).unwrap().index()] = Some(*value);
        }
        values
    }

    #[test]
    fn simple_pendulum() {
        // Arrange
        let mut mech = Mechanism::new("N", ExprCache::new(1 << 12));
        let n = mech.newtonian();
        let a = add_frame(&mut mech, "A");
        let q = mech.graph.dynamic("q").unwrap();
        let u = mech.graph.dynamic("u").unwrap();
        let (l, m, g) = (
            mech.graph.constant("l").unwrap(),
            mech.graph.constant("m").unwrap(),
            mech.graph.constant("g").unwrap(),
        );
        orient(&mut mech, a, n, Axis::Z, q).unwrap();
        let n3 = unit(&mech, n, Axis::Z);
        let w = vector::scale(&mut mech, &n3, u);
        set_ang_vel(&mut mech, a, n, w).unwrap();

        let o = add_point(&mut mech, "o");
        set_vel(&mut mech, o, Vector::zero());
        let a1 = unit(&mech, a, Axis::X);
        let arm = vector::scale(&mut mech, &a1, l);
        let p = locate_new(&mut mech, "p", o, arm);
        v2pt_theory(&mut mech, p, o, a).unwrap();

        let zero = mech.graph.zero();
        let inertia = Inertia::new(a, zero, zero, zero, zero, zero, zero);
        let bob = RigidBody::new("bob", p, a, m, inertia);
        let n1 = unit(&mech, n, Axis::X);
        let weight = mech.graph.mul(&[m, g]);
        let gravity = vector::scale(&mut mech, &n1, weight);
        let loads = [Load::Force {
            point: p,
            force: gravity,
        }];

        let (q_symbol, u_symbol) = (mech.graph.as_symbol(q).unwrap(), mech.graph.as_symbol(u).unwrap());
        let kane = KanesMethod {
            newtonian: n,
            q_independent: vec![q_symbol],
            q_dependent: vec![],
            configuration_constraints: vec![],
            u_independent: vec![u_symbol],
            u_dependent: vec![],
            kinematic_equations: vec![(q_symbol, u)],
            velocity_constraints: vec![],
        };

        // Act
        let eom = kane.kanes_equations(&mut mech, &[bob], &loads).unwrap();

        // Assert
        assert_eq!(eom.speeds, vec![u_symbol]);
        assert_eq!(eom.kinematic_rhs[0], u);
        let vals = values(&mech, &[("q", 0.5), ("u", 0.3), ("l", 2.0), ("m", 3.0), ("g", 9.81)]);
        let out = mech.graph.evaluate::<f64>(&eom.roots(), &vals).unwrap();
        assert_close!(out[0], 3.0 * 2.0 * 2.0, 1e-12);
        assert_close!(out[1], -3.0 * 9.81 * 2.0 * 0.5f64.sin(), 1e-12);
    }

    #[test]
    fn velocity_constraint_couples_speeds() {
        // Arrange
        let mut mech = Mechanism::new("N", ExprCache::new(1 << 12));
        let n = mech.newtonian();
        let u1 = mech.graph.dynamic("u1").unwrap();
        let u2 = mech.graph.dynamic("u2").unwrap();
        let f = mech.graph.dynamic("f").unwrap();
        let m = mech.graph.constant("m").unwrap();

        let p = add_point(&mut mech, "p");
        let n1 = unit(&mech, n, Axis::X);
        let n2 = unit(&mech, n, Axis::Y);
        let vx = vector::scale(&mut mech, &n1, u1);
        let vy = vector::scale(&mut mech, &n2, u2);
        let v = vector::add(&mut mech, &vx, &vy);
        set_vel(&mut mech, p, v);
        let push = vector::scale(&mut mech, &n1, f);

        let zero = mech.graph.zero();
        let body = RigidBody::new("particle", p, n, m, Inertia::new(n, zero, zero, zero, zero, zero, zero));
        let constraint = mech.graph.sub(u2, u1);
        let (s1, s2) = (mech.graph.as_symbol(u1).unwrap(), mech.graph.as_symbol(u2).unwrap());
        let kane = KanesMethod {
            newtonian: n,
            q_independent: vec![],
            q_dependent: vec![],
            configuration_constraints: vec![],
            u_independent: vec![s1],
            u_dependent: vec![s2],
            kinematic_equations: vec![],
            velocity_constraints: vec![constraint],
        };

        // Act
        let eom = kane
            .kanes_equations(&mut mech, &[body], &[Load::Force { point: p, force: push }])
            .unwrap();

        // Assert
        let vals = values(&mech, &[("m", 2.0), ("f", 1.0), ("u1", 0.4), ("u2", 0.4)]);
        let out = mech.graph.evaluate::<f64>(&eom.roots(), &vals).unwrap();
        assert_eq!(eom.n_independent, 1);
        assert_eq!(&out[..4], &[2.0, 2.0, -1.0, 1.0]);
        assert_eq!(&out[4..], &[1.0, 0.0]);
    }

    #[test]
    fn dependent_coordinate_needs_a_configuration_constraint() {
        // Arrange
        let mut mech = Mechanism::new("N", ExprCache::new(1 << 12));
        let n = mech.newtonian();
        let q1 = mech.graph.dynamic("q1").unwrap();
        let q2 = mech.graph.dynamic("q2").unwrap();
        let (s1, s2) = (mech.graph.as_symbol(q1).unwrap(), mech.graph.as_symbol(q2).unwrap());
        let kane = KanesMethod {
            newtonian: n,
            q_independent: vec![s1],
            q_dependent: vec![s2],
            configuration_constraints: vec![mech.graph.sin(q1)],
            u_independent: vec![],
            u_dependent: vec![],
            kinematic_equations: vec![],
            velocity_constraints: vec![],
        };

        // Act
        let result = kane.kanes_equations(&mut mech, &[], &[]);

        // Assert
        assert!(matches!(result, Err(Error::UnconstrainedCoordinate(name)) if name == "q2"));
    }
}
