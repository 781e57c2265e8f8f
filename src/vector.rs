//! Symbolic vectors stored as component triples in one or more frames.
//!
//! Components in different frames are kept apart until an operation needs a
//! common basis, so no direction cosine matrix is built unless required.

use crate::{
    error::Result,
    expr::{ExprGraph, ExprId, Replacement, SymbolId},
    frame::{self, FrameId},
    mechanism::Mechanism,
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Vector {
    terms: Vec<(FrameId, [ExprId; 3])>,
}

impl Vector {
    pub fn zero() -> Self {
        Vector { terms: vec![] }
    }

    pub fn new(frame: FrameId, components: [ExprId; 3]) -> Self {
        Vector {
            terms: vec![(frame, components)],
        }
    }

    pub fn terms(&self) -> &[(FrameId, [ExprId; 3])] {
        &self.terms
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Sum of vectors, merged per frame. Frames whose components all vanish are
/// dropped.
pub fn sum(mech: &mut Mechanism, vectors: &[Vector]) -> Vector {
    let mut merged: Vec<(FrameId, [ExprId; 3])> = vec![];
    for v in vectors {
        for (frame, components) in &v.terms {
            match merged.iter_mut().find(|(f, _)| f == frame) {
                Some((_, acc)) => {
                    for i in 0..3 {
                        acc[i] = mech.graph.add(&[acc[i], components[i]]);
                    }
                }
                None => merged.push((*frame, *components)),
            }
        }
    }
    let graph = &mech.graph;
    merged.retain(|(_, c)| c.iter().any(|x| !graph.is_zero(*x)));
    Vector { terms: merged }
}

pub fn add(mech: &mut Mechanism, a: &Vector, b: &Vector) -> Vector {
    sum(mech, &[a.clone(), b.clone()])
}

pub fn sub(mech: &mut Mechanism, a: &Vector, b: &Vector) -> Vector {
    let nb = neg(mech, b);
    sum(mech, &[a.clone(), nb])
}

pub fn scale(mech: &mut Mechanism, v: &Vector, k: ExprId) -> Vector {
    map(mech, v, |g, x| g.mul(&[k, x]))
}

pub fn neg(mech: &mut Mechanism, v: &Vector) -> Vector {
    let minus_one = mech.graph.float(-1.0);
    scale(mech, v, minus_one)
}

fn map(
    mech: &mut Mechanism,
    v: &Vector,
    mut f: impl FnMut(&mut ExprGraph, ExprId) -> ExprId,
) -> Vector {
    let terms: Vec<Vector> = v
        .terms
        .iter()
        .map(|(frame, c)| Vector::new(*frame, c.map(|x| f(&mut mech.graph, x))))
        .collect();
    sum(mech, &terms)
}

/// Components of `v` in the basis of `frame`.
pub fn express(mech: &mut Mechanism, v: &Vector, frame: FrameId) -> Result<[ExprId; 3]> {
    let zero = mech.graph.zero();
    let mut out = [zero; 3];
    for (from, c) in &v.terms {
        let r = frame::dcm(mech, frame, *from)?;
        for i in 0..3 {
            let products: Vec<ExprId> = (0..3).map(|j| mech.graph.mul(&[r[i][j], c[j]])).collect();
            let row = mech.graph.add(&products);
            out[i] = mech.graph.add(&[out[i], row]);
        }
    }
    Ok(out)
}

/// Dot product, evaluated in the frames of `a`.
pub fn dot(mech: &mut Mechanism, a: &Vector, b: &Vector) -> Result<ExprId> {
    let mut products = vec![];
    for (frame, x) in &a.terms {
        let y = express(mech, b, *frame)?;
        for i in 0..3 {
            products.push(mech.graph.mul(&[x[i], y[i]]));
        }
    }
    Ok(mech.graph.add(&products))
}

/// Cross product, evaluated in the frames of `a`.
pub fn cross(mech: &mut Mechanism, a: &Vector, b: &Vector) -> Result<Vector> {
    let mut parts = vec![];
    for (frame, x) in &a.terms {
        let y = express(mech, b, *frame)?;
        let g = &mut mech.graph;
        let mut c = [g.zero(); 3];
        for i in 0..3 {
            let (j, k) = ((i + 1) % 3, (i + 2) % 3);
            let xy = g.mul(&[x[j], y[k]]);
            let yx = g.mul(&[x[k], y[j]]);
            c[i] = g.sub(xy, yx);
        }
        parts.push(Vector::new(*frame, c));
    }
    Ok(sum(mech, &parts))
}

pub fn magnitude(mech: &mut Mechanism, v: &Vector) -> Result<ExprId> {
    let squared = dot(mech, v, v)?;
    Ok(mech.graph.sqrt(squared))
}

pub fn normalize(mech: &mut Mechanism, v: &Vector) -> Result<Vector> {
    let m = magnitude(mech, v)?;
    let inverse = mech.graph.pow(m, -1.0);
    Ok(scale(mech, v, inverse))
}

/// Time derivative of `v` as seen from `frame`: the rate of each
/// component plus `w x v` for the frame the component lives in.
pub fn dt(mech: &mut Mechanism, v: &Vector, frame: FrameId) -> Result<Vector> {
    let mut parts = vec![];
    for (f, c) in &v.terms {
        let mut rates = *c;
        for x in rates.iter_mut() {
            *x = mech.graph.dt(*x, &mut mech.cache)?;
        }
        parts.push(Vector::new(*f, rates));
        let w = frame::ang_vel(mech, *f, frame)?;
        parts.push(cross(mech, &w, &Vector::new(*f, *c))?);
    }
    Ok(sum(mech, &parts))
}

/// Partial derivative of each component with respect to `symbol`.
pub fn partial(mech: &mut Mechanism, v: &Vector, symbol: SymbolId) -> Vector {
    let terms: Vec<Vector> = v
        .terms
        .iter()
        .map(|(frame, c)| {
            let mut d = *c;
            for x in d.iter_mut() {
                *x = mech.graph.diff(*x, symbol, &mut mech.cache);
            }
            Vector::new(*frame, d)
        })
        .collect();
    sum(mech, &terms)
}

pub fn replace(mech: &mut Mechanism, v: &Vector, replacement: &mut Replacement) -> Vector {
    map(mech, v, |g, x| g.xreplace(x, replacement))
}

#[cfg(test)]
mod vector_tests {
    use super::*;
    use crate::{
        expr::ExprCache,
        frame::{add_frame, orient, unit, Axis},
    };

    #[test]
    fn cross_of_basis_vectors() {
        // Arrange
        let mut mech = Mechanism::new("N", ExprCache::new(1 << 12));
        let n = mech.newtonian();
        let (x, y) = (unit(&mech, n, Axis::X), unit(&mech, n, Axis::Y));

        // Act
        let z = cross(&mut mech, &x, &y).unwrap();
        let back = cross(&mut mech, &y, &x).unwrap();

        // Assert
        assert_eq!(z, unit(&mech, n, Axis::Z));
        assert_eq!(mech.vector_string(&back), "-1*n3");
    }

    #[test]
    fn dot_across_frames() {
        // Arrange
        let mut mech = Mechanism::new("N", ExprCache::new(1 << 12));
        let n = mech.newtonian();
        let a = add_frame(&mut mech, "A");
        let q = mech.graph.dynamic("q").unwrap();
        orient(&mut mech, a, n, Axis::Z, q).unwrap();
        let a1 = unit(&mech, a, Axis::X);
        let n1 = unit(&mech, n, Axis::X);
        let n2 = unit(&mech, n, Axis::Y);

        // Act
        let c = dot(&mut mech, &a1, &n1).unwrap();
        let s = dot(&mut mech, &a1, &n2).unwrap();

        // Assert
        assert_eq!(c, mech.graph.cos(q));
        assert_eq!(s, mech.graph.sin(q));
    }

    #[test]
    fn rotating_unit_vector_rate() {
        // Arrange
        let mut mech = Mechanism::new("N", ExprCache::new(1 << 12));
        let n = mech.newtonian();
        let a = add_frame(&mut mech, "A");
        let q = mech.graph.dynamic("q").unwrap();
        orient(&mut mech, a, n, Axis::Z, q).unwrap();
        let a1 = unit(&mech, a, Axis::X);

        // Act
        let rate = dt(&mut mech, &a1, n).unwrap();
        let fixed = dt(&mut mech, &a1, a).unwrap();

        // Assert
        // q' n3 x a1 = q' a2
        let n3 = unit(&mech, n, Axis::Z);
        let qd = mech.graph.find_symbol("q'").unwrap();
        let qd = mech.graph.symbol_expr(qd);
        let w = scale(&mut mech, &n3, qd);
        let expected = cross(&mut mech, &w, &a1).unwrap();
        assert_eq!(rate, expected);
        assert!(fixed.is_zero());
    }

    #[test]
    fn normalize_scales_to_unit_length() {
        // Arrange
        let mut mech = Mechanism::new("N", ExprCache::new(1 << 12));
        let n = mech.newtonian();
        let r = mech.graph.constant("r").unwrap();
        let two = mech.graph.float(2.0);
        let x = unit(&mech, n, Axis::X);
        let v = scale(&mut mech, &x, r);
        let y = unit(&mech, n, Axis::Y);
        let w = scale(&mut mech, &y, two);
        let v = add(&mut mech, &v, &w);

        // Act
        let unit_v = normalize(&mut mech, &v).unwrap();
        let length = magnitude(&mut mech, &unit_v).unwrap();

        // Assert
        let mut values = vec![None; mech.graph.symbol_count()];
        values[mech.graph.as_symbol(r).unwrap().index()] = Some(1.5);
        let numeric = mech.graph.evaluate::<f64>(&[length], &values).unwrap();
        assert!((numeric[0] - 1.0).abs() < 1e-15);
    }
}
