use super::{field, record};
use crate::{error::Result, types::Record};

/// Benchmark bicycle parameters, Table 1 of Meijaard et al.
pub fn benchmark_parameters() -> Record {
    record(&[
        ("w", 1.02),
        ("c", 0.08),
        ("lam", std::f64::consts::PI / 10.0),
        ("g", 9.81),
        ("rR", 0.3),
        ("mR", 2.0),
        ("IRxx", 0.0603),
        ("IRyy", 0.12),
        ("xB", 0.3),
        ("zB", -0.9),
        ("mB", 85.0),
        ("IBxx", 9.2),
        ("IByy", 11.0),
        ("IBzz", 2.8),
        ("IBxz", 2.4),
        ("xH", 0.9),
        ("zH", -0.7),
        ("mH", 4.0),
        ("IHxx", 0.05892),
        ("IHyy", 0.06),
        ("IHzz", 0.00708),
        ("IHxz", -0.00756),
        ("rF", 0.35),
        ("mF", 3.0),
        ("IFxx", 0.1405),
        ("IFyy", 0.28),
    ])
}

/// Rotates a benchmark inertia tensor, symmetric in the xz plane, by the
/// steer axis tilt into the steer-aligned frame. Returns (11, 22, 33, 31).
fn rotate_inertia(
    lam: f64,
    ixx: f64,
    iyy: f64,
    izz: f64,
    ixz: f64,
) -> (f64, f64, f64, f64) {
    let (sl, cl) = lam.sin_cos();
    let c1 = [cl, -sl];
    let c3 = [sl, cl];
    let tensor = [[ixx, ixz], [ixz, izz]];
    let quadratic = |a: [f64; 2], b: [f64; 2]| {
        let mut acc = 0.0;
        for i in 0..2 {
            for j in 0..2 {
                acc += a[i] * tensor[i][j] * b[j];
            }
        }
        acc
    };
    (quadratic(c1, c1), iyy, quadratic(c3, c3), quadratic(c3, c1))
}

/// Converts benchmark parameters to the steer-axis-aligned parameters of
/// the model. Products of inertia that vanish by symmetry are emitted too.
pub fn benchmark_to_moore(bp: &Record) -> Result<Record> {
    let p = |k: &str| field(bp, k);
    let (w, c, lam) = (p("w")?, p("c")?, p("lam")?);
    let (rr, rf) = (p("rR")?, p("rF")?);
    let (xb, zb, xh, zh) = (p("xB")?, p("zB")?, p("xH")?, p("zH")?);
    let (sl, cl) = lam.sin_cos();

    let mut mp = record(&[
        ("rf", rf),
        ("rr", rr),
        ("d1", cl * (c + w - rr * lam.tan())),
        ("d2", w * sl + (rr - rf) * cl),
        ("d3", -cl * (c - rf * lam.tan())),
        ("l1", xb * cl - (zb + rr) * sl),
        ("l2", xb * sl + (zb + rr) * cl),
        ("l3", (xh - w) * cl - (zh + rf) * sl),
        ("l4", (xh - w) * sl + (zh + rf) * cl),
        ("g", p("g")?),
        ("mc", p("mB")?),
        ("md", p("mR")?),
        ("me", p("mH")?),
        ("mf", p("mF")?),
        ("id11", p("IRxx")?),
        ("id22", p("IRyy")?),
        ("id33", p("IRxx")?),
        ("if11", p("IFxx")?),
        ("if22", p("IFyy")?),
        ("if33", p("IFxx")?),
    ]);

    let (c11, c22, c33, c31) = rotate_inertia(lam, p("IBxx")?, p("IByy")?, p("IBzz")?, p("IBxz")?);
    let (e11, e22, e33, e31) = rotate_inertia(lam, p("IHxx")?, p("IHyy")?, p("IHzz")?, p("IHxz")?);
    for (k, v) in [
        ("ic11", c11),
        ("ic22", c22),
        ("ic33", c33),
        ("ic31", c31),
        ("ic12", 0.0),
        ("ic23", 0.0),
        ("ie11", e11),
        ("ie22", e22),
        ("ie33", e33),
        ("ie31", e31),
        ("ie12", 0.0),
        ("ie23", 0.0),
    ] {
        mp.insert(k.to_string(), v);
    }
    Ok(mp)
}

#[cfg(test)]
mod parameters_tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::error::Error;

    #[test]
    fn benchmark_bicycle_in_moore_parameters() {
        // Arrange
        let bp = benchmark_parameters();

        // Act
        let mp = benchmark_to_moore(&bp).unwrap();

        // Assert
        let expected = [
            ("d1", 0.95345706961218472),
            ("d2", 0.26764450844768871),
            ("d3", 0.032071426727619304),
            ("l1", 0.47072715151351453),
            ("l2", -0.47792881146460795),
            ("l3", -0.0059708339241868329),
            ("l4", -0.36995182002829742),
            ("ic11", 7.1781697764978956),
            ("ic22", 11.0),
            ("ic33", 4.8218302235021035),
            ("ic31", 3.8225535938357876),
            ("ie11", 0.058413377001529734),
            ("ie22", 0.06),
            ("ie33", 0.0075866229984702663),
            ("ie31", 0.009119225261946301),
        ];
        for (k, v) in expected {
            assert_relative_eq!(mp[k], v, max_relative = 1e-12);
        }
        assert_eq!(mp["mc"], 85.0);
        assert_eq!(mp["id33"], mp["id11"]);
        assert_eq!(mp["ic12"], 0.0);
    }

    #[test]
    fn rotation_preserves_trace() {
        // Arrange
        let bp = benchmark_parameters();

        // Act
        let mp = benchmark_to_moore(&bp).unwrap();

        // Assert
        assert_relative_eq!(
            mp["ic11"] + mp["ic22"] + mp["ic33"],
            bp["IBxx"] + bp["IByy"] + bp["IBzz"],
            max_relative = 1e-14
        );
    }

    #[test]
    fn missing_parameter() {
        // Arrange
        let mut bp = benchmark_parameters();
        bp.remove("rF");

        // Act
        let result = benchmark_to_moore(&bp);

        // Assert
        assert!(matches!(result, Err(Error::MissingField(k)) if k == "rF"));
    }
}
