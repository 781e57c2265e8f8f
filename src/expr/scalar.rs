use std::{
    fmt::{self, Debug, Display},
    ops::{Add, Div, Mul, Neg, Sub},
};

use crate::types::Float;

/// Numeric type an expression graph can be evaluated in.
pub trait Scalar:
    Copy
    + Debug
    + PartialEq
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    fn from_f64(value: Float) -> Self;
    fn to_f64(self) -> Float;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn sqrt(self) -> Self;

    /// Integer power by repeated multiplication.
    fn powi(self, n: i32) -> Self {
        let mut result = Self::from_f64(1.0);
        for _ in 0..n.unsigned_abs() {
            result = result * self;
        }
        if n < 0 {
            Self::from_f64(1.0) / result
        } else {
            result
        }
    }

    /// Real power. Integer and half-integer exponents stay in `Self`;
    /// anything else goes through f64.
    fn powf(self, exponent: Float) -> Self {
        if exponent.fract() == 0.0 {
            self.powi(exponent as i32)
        } else if exponent == 0.5 {
            self.sqrt()
        } else if exponent == -0.5 {
            Self::from_f64(1.0) / self.sqrt()
        } else if (2.0 * exponent).fract() == 0.0 {
            self.sqrt().powi((2.0 * exponent) as i32)
        } else {
            Self::from_f64(self.to_f64().powf(exponent))
        }
    }
}

impl Scalar for f64 {
    fn from_f64(value: Float) -> Self {
        value
    }

    fn to_f64(self) -> Float {
        self
    }

    fn sin(self) -> Self {
        f64::sin(self)
    }

    fn cos(self) -> Self {
        f64::cos(self)
    }

    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }
}

/// Unevaluated sum of two f64 values, `hi + lo` with `|lo| <= ulp(hi) / 2`,
/// giving roughly 32 significant decimal digits.
///
/// Reference: Hida, Li & Bailey, "Library for Double-Double and Quad-Double
/// Arithmetic", 2007.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DoubleDouble {
    pub hi: f64,
    pub lo: f64,
}

/// pi / 2 split into leading and trailing parts.
const HALF_PI: DoubleDouble = DoubleDouble {
    hi: 1.570_796_326_794_896_6,
    lo: 6.123_233_995_736_766e-17,
};

fn two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    let bb = s - a;
    let e = (a - (s - bb)) + (b - bb);
    (s, e)
}

fn quick_two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    let e = b - (s - a);
    (s, e)
}

fn two_prod(a: f64, b: f64) -> (f64, f64) {
    let p = a * b;
    let e = a.mul_add(b, -p);
    (p, e)
}

impl DoubleDouble {
    pub const fn new(hi: f64, lo: f64) -> Self {
        DoubleDouble { hi, lo }
    }

    fn normalized(hi: f64, lo: f64) -> Self {
        let (hi, lo) = quick_two_sum(hi, lo);
        DoubleDouble { hi, lo }
    }

    fn scale(self, k: f64) -> Self {
        self * DoubleDouble::from_f64(k)
    }

    /// Taylor series of sin and cos for |x| <= pi/4.
    fn sin_cos_reduced(x: Self) -> (Self, Self) {
        let x2 = x * x;
        let mut sin = x;
        let mut cos = DoubleDouble::from_f64(1.0);
        let mut term_sin = x;
        let mut term_cos = DoubleDouble::from_f64(1.0);
        let mut n = 1.0;
        while n < 60.0 {
            term_cos = -(term_cos * x2) / DoubleDouble::from_f64(n * (n + 1.0));
            term_sin = -(term_sin * x2) / DoubleDouble::from_f64((n + 1.0) * (n + 2.0));
            cos = cos + term_cos;
            sin = sin + term_sin;
            if term_cos.hi.abs() < 1e-34 && term_sin.hi.abs() < 1e-34 {
                break;
            }
            n += 2.0;
        }
        (sin, cos)
    }

    pub fn sin_cos(self) -> (Self, Self) {
        let k = (self.hi / HALF_PI.hi).round();
        let r = self - HALF_PI.scale(k);
        let (s, c) = Self::sin_cos_reduced(r);
        match (k as i64).rem_euclid(4) {
            0 => (s, c),
            1 => (c, -s),
            2 => (-s, -c),
            _ => (-c, s),
        }
    }
}

impl Display for DoubleDouble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:e} + {:e}", self.hi, self.lo)
    }
}

impl Add for DoubleDouble {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let (s, e) = two_sum(self.hi, rhs.hi);
        let (t, f) = two_sum(self.lo, rhs.lo);
        let (s, e) = quick_two_sum(s, e + t);
        Self::normalized(s, e + f)
    }
}

impl Neg for DoubleDouble {
    type Output = Self;

    fn neg(self) -> Self {
        DoubleDouble {
            hi: -self.hi,
            lo: -self.lo,
        }
    }
}

impl Sub for DoubleDouble {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl Mul for DoubleDouble {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let (p, e) = two_prod(self.hi, rhs.hi);
        let e = e + (self.hi * rhs.lo + self.lo * rhs.hi);
        Self::normalized(p, e)
    }
}

impl Div for DoubleDouble {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        let q1 = self.hi / rhs.hi;
        let r = self - rhs.scale(q1);
        let q2 = r.hi / rhs.hi;
        let r = r - rhs.scale(q2);
        let q3 = r.hi / rhs.hi;
        Self::normalized(q1, q2) + DoubleDouble::from_f64(q3)
    }
}

impl Scalar for DoubleDouble {
    fn from_f64(value: Float) -> Self {
        DoubleDouble { hi: value, lo: 0.0 }
    }

    fn to_f64(self) -> Float {
        self.hi + self.lo
    }

    fn sin(self) -> Self {
        self.sin_cos().0
    }

    fn cos(self) -> Self {
        self.sin_cos().1
    }

    fn sqrt(self) -> Self {
        if self.hi <= 0.0 {
            return DoubleDouble::from_f64(self.hi.sqrt());
        }
        // One Newton step from the f64 root
        let x = self.hi.sqrt();
        let (p, e) = two_prod(x, x);
        let residual = (self - DoubleDouble::new(p, e)).hi;
        Self::normalized(x, residual / (2.0 * x))
    }
}
