use crate::{
    error::Result,
    expr::ExprId,
    frame::{self, FrameId},
    mechanism::Mechanism,
    vector::{self, Vector},
};

/// Central inertia dyadic, stored as a symmetric component matrix in the
/// basis of `frame`:
///     | ixx ixy izx |
///     | ixy iyy iyz |
///     | izx iyz izz |
#[derive(Clone, Debug, PartialEq)]
pub struct Inertia {
    pub frame: FrameId,
    pub components: [[ExprId; 3]; 3],
}

impl Inertia {
    pub fn new(
        frame: FrameId,
        ixx: ExprId,
        iyy: ExprId,
        izz: ExprId,
        ixy: ExprId,
        iyz: ExprId,
        izx: ExprId,
    ) -> Self {
        Inertia {
            frame,
            components: [[ixx, ixy, izx], [ixy, iyy, iyz], [izx, iyz, izz]],
        }
    }
}

/// I . v
pub fn inertia_dot(mech: &mut Mechanism, inertia: &Inertia, v: &Vector) -> Result<Vector> {
    let c = vector::express(mech, v, inertia.frame)?;
    let m = &inertia.components;
    let g = &mut mech.graph;
    let mut out = [g.zero(); 3];
    for (i, row) in m.iter().enumerate() {
        let products: Vec<ExprId> = (0..3).map(|j| g.mul(&[row[j], c[j]])).collect();
        out[i] = g.add(&products);
    }
    Ok(vector::sum(mech, &[Vector::new(inertia.frame, out)]))
}

/// Rate of the dyadic as seen from `body_frame`, dotted with `w`.
///
/// The components are constant in the dyadic's own frame F, so
///     d_B(I).w = d_F(I).w + w_{F/B} x (I.w) - I.(w_{F/B} x w)
/// which lets a wheel carry its inertia in the frame it spins in.
pub fn inertia_rate_dot(
    mech: &mut Mechanism,
    inertia: &Inertia,
    body_frame: FrameId,
    w: &Vector,
) -> Result<Vector> {
    let mut rates = inertia.components;
    for row in rates.iter_mut() {
        for x in row.iter_mut() {
            *x = mech.graph.dt(*x, &mut mech.cache)?;
        }
    }
    let rate = Inertia {
        frame: inertia.frame,
        components: rates,
    };
    let local = inertia_dot(mech, &rate, w)?;

    let w_fb = frame::ang_vel(mech, inertia.frame, body_frame)?;
    let iw = inertia_dot(mech, inertia, w)?;
    let transport = vector::cross(mech, &w_fb, &iw)?;
    let w_fb_x_w = vector::cross(mech, &w_fb, w)?;
    let correction = inertia_dot(mech, inertia, &w_fb_x_w)?;
    let correction = vector::neg(mech, &correction);
    Ok(vector::sum(mech, &[local, transport, correction]))
}
