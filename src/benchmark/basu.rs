use std::f64::consts::FRAC_PI_2;
use std::f64::consts::PI;

use super::{field, record};
use crate::{error::Result, types::Record};

/// Table 1 of Basu-Mandal et al.: the state of a benchmark bicycle in a
/// general configuration.
pub fn basu_table_one_input() -> Record {
    record(&[
        ("x", 0.0),
        ("y", 0.0),
        ("z", 0.2440472102925),
        ("theta", 0.0),
        ("psi", 0.9501292851472),
        ("phi", 3.1257073014894),
        ("psif", 0.2311385135743),
        ("betar", 0.0),
        ("betaf", 0.0),
        ("xd", -2.8069345714545),
        ("yd", -0.1480982396001),
        ("zd", 0.1058778746261),
        ("thetad", 0.7830033527065),
        ("psid", 0.6068425835418),
        ("phid", -0.0119185528069),
        ("psifd", 0.4859824687093),
        ("betard", 8.9129896614890),
        ("betafd", 8.0133620584155),
    ])
}

/// Table 1 of Basu-Mandal et al.: accelerations at the input state.
pub fn basu_table_one_output() -> Record {
    record(&[
        ("betardd", 1.8472554144217),
        ("psifdd", -4.6198904039403),
        ("thetadd", 0.8353281706379),
        ("psidd", -7.8555281128244),
        ("phidd", 0.1205543897884),
        ("betafdd", 2.4548072904550),
        ("xdd", -0.5041626315047),
        ("ydd", -0.3449706619454),
        ("zdd", -1.4604528332980),
    ])
}

/// Angles that differ between the conventions only by sign, as
/// (Basu name, Moore index).
const NEGATED: [(&str, usize); 4] = [("theta", 3), ("betar", 6), ("psif", 7), ("betaf", 8)];

/// Converts a Basu-Mandal state to Moore's coordinates and speeds. The
/// coordinates are required; speeds and accelerations are converted when
/// the record holds them.
pub fn basu_to_moore(basu: &Record, rr: f64, lam: f64) -> Result<Record> {
    let b = |k: &str| field(basu, k);
    let mut moore = Record::new();

    let q3 = -b("theta")?;
    let q4 = FRAC_PI_2 - b("psi")?;
    let (s3, c3) = q3.sin_cos();
    let (s4, c4) = q4.sin_cos();
    for (name, i) in NEGATED {
        moore.insert(format!("q{}", i), -b(name)?);
    }
    moore.insert("q1".to_string(), rr * s3 * s4 - b("x")?);
    moore.insert("q2".to_string(), b("y")? - rr * c3 * s4);
    moore.insert("q4".to_string(), q4);
    moore.insert("q5".to_string(), PI - b("phi")? + lam);

    if basu.contains_key("thetad") {
        let u3 = -b("thetad")?;
        let u4 = -b("psid")?;
        for (name, i) in NEGATED {
            moore.insert(format!("u{}", i), -b(format!("{}d", name).as_str())?);
        }
        moore.insert("u4".to_string(), u4);
        moore.insert("u5".to_string(), -b("phid")?);
        moore.insert("u1".to_string(), rr * (c3 * s4 * u3 + s3 * c4 * u4) - b("xd")?);
        moore.insert("u2".to_string(), b("yd")? - rr * (-s3 * s4 * u3 + c3 * c4 * u4));
    }

    if basu.contains_key("thetadd") {
        let (u3, u4) = (field(&moore, "u3")?, field(&moore, "u4")?);
        let (u3p, u4p) = (-b("thetadd")?, -b("psidd")?);
        for (name, i) in NEGATED {
            moore.insert(format!("u{}p", i), -b(format!("{}dd", name).as_str())?);
        }
        moore.insert("u4p".to_string(), u4p);
        moore.insert("u5p".to_string(), -b("phidd")?);
        let [xdd, ydd, _] = wheel_center_acceleration(rr, q3, q4, u3, u4, u3p, u4p);
        moore.insert("u1p".to_string(), xdd - b("xdd")?);
        moore.insert("u2p".to_string(), b("ydd")? - ydd);
    }
    Ok(moore)
}

/// Acceleration of the rear wheel center relative to the contact point
/// motion, i.e. the terms of (xdd, ydd, zdd) that do not involve u1' and u2'.
fn wheel_center_acceleration(
    rr: f64,
    q3: f64,
    q4: f64,
    u3: f64,
    u4: f64,
    u3p: f64,
    u4p: f64,
) -> [f64; 3] {
    let (s3, c3) = q3.sin_cos();
    let (s4, c4) = q4.sin_cos();
    [
        rr * (-s3 * s4 * u3 * u3 + 2.0 * c3 * c4 * u3 * u4 + c3 * s4 * u3p - s3 * s4 * u4 * u4
            + s3 * c4 * u4p),
        rr * (-c3 * s4 * u3 * u3 - 2.0 * s3 * c4 * u3 * u4 - s3 * s4 * u3p - c3 * s4 * u4 * u4
            + c3 * c4 * u4p),
        -rr * (c4 * u4 * u4 + s4 * u4p),
    ]
}

/// Converts Moore's coordinates, and speeds and accelerations when present,
/// to the Basu-Mandal convention, including the rear wheel center height z.
pub fn moore_to_basu(moore: &Record, rr: f64, lam: f64) -> Result<Record> {
    let m = |k: &str| field(moore, k);
    let mut basu = Record::new();

    let (q3, q4) = (m("q3")?, m("q4")?);
    let (s3, c3) = q3.sin_cos();
    let (s4, c4) = q4.sin_cos();
    for (name, i) in NEGATED {
        basu.insert(name.to_string(), -m(format!("q{}", i).as_str())?);
    }
    basu.insert("x".to_string(), rr * s3 * s4 - m("q1")?);
    basu.insert("y".to_string(), m("q2")? + rr * c3 * s4);
    basu.insert("z".to_string(), rr * c4);
    basu.insert("psi".to_string(), FRAC_PI_2 - q4);
    basu.insert("phi".to_string(), PI - m("q5")? + lam);

    if moore.contains_key("u3") {
        let (u3, u4) = (m("u3")?, m("u4")?);
        for (name, i) in NEGATED {
            basu.insert(format!("{}d", name), -m(format!("u{}", i).as_str())?);
        }
        basu.insert("psid".to_string(), -u4);
        basu.insert("phid".to_string(), -m("u5")?);
        basu.insert("xd".to_string(), rr * (c3 * s4 * u3 + s3 * c4 * u4) - m("u1")?);
        basu.insert("yd".to_string(), rr * (-s3 * s4 * u3 + c3 * c4 * u4) + m("u2")?);
        basu.insert("zd".to_string(), -rr * s4 * u4);

        if moore.contains_key("u3p") {
            let (u3p, u4p) = (m("u3p")?, m("u4p")?);
            for (name, i) in NEGATED {
                basu.insert(format!("{}dd", name), -m(format!("u{}p", i).as_str())?);
            }
            basu.insert("psidd".to_string(), -u4p);
            basu.insert("phidd".to_string(), -m("u5p")?);
            let [xdd, ydd, zdd] = wheel_center_acceleration(rr, q3, q4, u3, u4, u3p, u4p);
            basu.insert("xdd".to_string(), xdd - m("u1p")?);
            basu.insert("ydd".to_string(), ydd + m("u2p")?);
            basu.insert("zdd".to_string(), zdd);
        }
    }
    Ok(basu)
}

#[cfg(test)]
mod basu_tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::error::Error;

    const RR: f64 = 0.3;
    const LAM: f64 = PI / 10.0;

    #[test]
    fn table_state_in_moore_coordinates() {
        // Arrange
        let basu = basu_table_one_input();

        // Act
        let moore = basu_to_moore(&basu, RR, LAM).unwrap();

        // Assert
        assert_eq!(moore["q3"], 0.0);
        assert_relative_eq!(moore["q4"], FRAC_PI_2 - 0.9501292851472, max_relative = 1e-15);
        assert_relative_eq!(moore["q5"], PI - 3.1257073014894 + LAM, max_relative = 1e-15);
        assert_eq!(moore["q7"], -0.2311385135743);
        assert_eq!(moore["u6"], -8.9129896614890);
        assert!(!moore.contains_key("u3p"));
        assert!(!moore.contains_key("z"));
    }

    #[test]
    fn wheel_center_height_follows_from_pitch() {
        // Arrange
        let basu = basu_table_one_input();

        // Act
        let back = moore_to_basu(&basu_to_moore(&basu, RR, LAM).unwrap(), RR, LAM).unwrap();

        // Assert
        assert_relative_eq!(back["z"], basu["z"], max_relative = 1e-9);
        assert_relative_eq!(back["zd"], basu["zd"], max_relative = 1e-9);
    }

    #[test]
    fn conversions_are_inverse() {
        // Arrange
        let mut basu = basu_table_one_input();
        basu.append(&mut basu_table_one_output());
        basu.insert("theta".to_string(), 0.4);
        basu.insert("thetad".to_string(), -0.2);

        // Act
        let moore = basu_to_moore(&basu, RR, LAM).unwrap();
        let back = moore_to_basu(&moore, RR, LAM).unwrap();

        // Assert
        for (k, v) in &basu {
            if k.starts_with('z') {
                continue;
            }
            assert_relative_eq!(back[k], *v, epsilon = 1e-12, max_relative = 1e-12);
        }
    }

    #[test]
    fn coordinates_are_required() {
        // Arrange
        let mut basu = basu_table_one_input();
        basu.remove("psi");

        // Act
        let result = basu_to_moore(&basu, RR, LAM);

        // Assert
        assert!(matches!(result, Err(Error::MissingField(k)) if k == "psi"));
    }

    #[test]
    fn accelerations_without_speeds_are_an_error() {
        // Arrange
        let mut basu = basu_table_one_input();
        basu.retain(|k, _| !k.ends_with('d'));
        basu.append(&mut basu_table_one_output());

        // Act
        let result = basu_to_moore(&basu, RR, LAM);

        // Assert
        assert!(matches!(result, Err(Error::MissingField(k)) if k == "u3"));
    }
}
