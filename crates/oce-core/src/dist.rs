// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Distribution functions used by the normality tests and hypothesis tests.
//!
//! Hand-rolled like the rest of the numerics: Lanczos log-gamma, a rational
//! erfc, Acklam's normal quantile with one Halley refinement, the continued
//! fraction for the regularized incomplete beta, and a Student-t CDF and
//! quantile built on top of it.

use crate::OceError;

const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEFFS: [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_13,
    -176.615_029_162_140_59,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_571_6e-6,
    1.505_632_735_149_311_6e-7,
];

/// Natural log of the gamma function for `x > 0`.
pub fn ln_gamma(x: f64) -> Result<f64, OceError> {
    if !x.is_finite() || x <= 0.0 {
        return Err(OceError::invalid_input(format!(
            "ln_gamma requires x > 0; got {x}"
        )));
    }

    if x < 0.5 {
        // Reflection: Gamma(x) Gamma(1-x) = pi / sin(pi x).
        let reflected = ln_gamma(1.0 - x)?;
        return Ok(std::f64::consts::PI.ln()
            - (std::f64::consts::PI * x).sin().ln()
            - reflected);
    }

    let x = x - 1.0;
    let mut acc = LANCZOS_COEFFS[0];
    for (i, &coeff) in LANCZOS_COEFFS.iter().enumerate().skip(1) {
        acc += coeff / (x + i as f64);
    }
    let t = x + LANCZOS_G + 0.5;
    Ok(0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + acc.ln())
}

/// Complementary error function (rational approximation, |error| < 1.2e-7).
pub fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let ans = t
        * (-z * z - 1.265_512_23
            + t * (1.000_023_68
                + t * (0.374_091_96
                    + t * (0.096_784_18
                        + t * (-0.186_288_06
                            + t * (0.278_868_07
                                + t * (-1.135_203_98
                                    + t * (1.488_515_87
                                        + t * (-0.822_152_23 + t * 0.170_872_77)))))))))
        .exp();
    if x >= 0.0 { ans } else { 2.0 - ans }
}

/// Error function.
pub fn erf(x: f64) -> f64 {
    1.0 - erfc(x)
}

/// Standard normal CDF.
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

const ACKLAM_A: [f64; 6] = [
    -3.969_683_028_665_376e1,
    2.209_460_984_245_205e2,
    -2.759_285_104_469_687e2,
    1.383_577_518_672_690e2,
    -3.066_479_806_614_716e1,
    2.506_628_277_459_239,
];
const ACKLAM_B: [f64; 5] = [
    -5.447_609_879_822_406e1,
    1.615_858_368_580_409e2,
    -1.556_989_798_598_866e2,
    6.680_131_188_771_972e1,
    -1.328_068_155_288_572e1,
];
const ACKLAM_C: [f64; 6] = [
    -7.784_894_002_430_293e-3,
    -3.223_964_580_411_365e-1,
    -2.400_758_277_161_838,
    -2.549_732_539_343_734,
    4.374_664_141_464_968,
    2.938_163_982_698_783,
];
const ACKLAM_D: [f64; 4] = [
    7.784_695_709_041_462e-3,
    3.224_671_290_700_398e-1,
    2.445_134_137_142_996,
    3.754_408_661_907_416,
];
const ACKLAM_P_LOW: f64 = 0.02425;

/// Standard normal quantile (Acklam's approximation plus one Halley step).
pub fn norm_quantile(p: f64) -> Result<f64, OceError> {
    if !p.is_finite() || p <= 0.0 || p >= 1.0 {
        return Err(OceError::invalid_input(format!(
            "norm_quantile requires p in (0, 1); got {p}"
        )));
    }

    let x = if p < ACKLAM_P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((ACKLAM_C[0] * q + ACKLAM_C[1]) * q + ACKLAM_C[2]) * q + ACKLAM_C[3]) * q
            + ACKLAM_C[4])
            * q
            + ACKLAM_C[5])
            / ((((ACKLAM_D[0] * q + ACKLAM_D[1]) * q + ACKLAM_D[2]) * q + ACKLAM_D[3]) * q + 1.0)
    } else if p <= 1.0 - ACKLAM_P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((ACKLAM_A[0] * r + ACKLAM_A[1]) * r + ACKLAM_A[2]) * r + ACKLAM_A[3]) * r
            + ACKLAM_A[4])
            * r
            + ACKLAM_A[5])
            * q
            / (((((ACKLAM_B[0] * r + ACKLAM_B[1]) * r + ACKLAM_B[2]) * r + ACKLAM_B[3]) * r
                + ACKLAM_B[4])
                * r
                + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -((((((ACKLAM_C[0] * q + ACKLAM_C[1]) * q + ACKLAM_C[2]) * q + ACKLAM_C[3]) * q
            + ACKLAM_C[4])
            * q
            + ACKLAM_C[5])
            / ((((ACKLAM_D[0] * q + ACKLAM_D[1]) * q + ACKLAM_D[2]) * q + ACKLAM_D[3]) * q + 1.0))
    };

    // One Halley refinement against the CDF.
    let e = norm_cdf(x) - p;
    let u = e * (2.0 * std::f64::consts::PI).sqrt() * (x * x / 2.0).exp();
    Ok(x - u / (1.0 + x * u / 2.0))
}

const BETACF_MAX_ITERATIONS: usize = 200;
const BETACF_EPS: f64 = 3.0e-14;
const BETACF_FPMIN: f64 = 1.0e-300;

fn betacf(a: f64, b: f64, x: f64) -> Result<f64, OceError> {
    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < BETACF_FPMIN {
        d = BETACF_FPMIN;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=BETACF_MAX_ITERATIONS {
        let m_f = m as f64;
        let m2 = 2.0 * m_f;

        let aa = m_f * (b - m_f) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < BETACF_FPMIN {
            d = BETACF_FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < BETACF_FPMIN {
            c = BETACF_FPMIN;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m_f) * (qab + m_f) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < BETACF_FPMIN {
            d = BETACF_FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < BETACF_FPMIN {
            c = BETACF_FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < BETACF_EPS {
            return Ok(h);
        }
    }

    Err(OceError::numerical_issue(
        "incomplete beta continued fraction did not converge",
    ))
}

/// Regularized incomplete beta function `I_x(a, b)`.
pub fn incomplete_beta(a: f64, b: f64, x: f64) -> Result<f64, OceError> {
    if a <= 0.0 || b <= 0.0 {
        return Err(OceError::invalid_input(format!(
            "incomplete_beta requires a > 0 and b > 0; got a={a}, b={b}"
        )));
    }
    if !(0.0..=1.0).contains(&x) {
        return Err(OceError::invalid_input(format!(
            "incomplete_beta requires x in [0, 1]; got {x}"
        )));
    }
    if x == 0.0 {
        return Ok(0.0);
    }
    if x == 1.0 {
        return Ok(1.0);
    }

    let ln_front =
        ln_gamma(a + b)? - ln_gamma(a)? - ln_gamma(b)? + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();

    if x < (a + 1.0) / (a + b + 2.0) {
        Ok(front * betacf(a, b, x)? / a)
    } else {
        Ok(1.0 - front * betacf(b, a, 1.0 - x)? / b)
    }
}

/// Student-t CDF with `df` degrees of freedom.
pub fn t_cdf(t: f64, df: f64) -> Result<f64, OceError> {
    if !df.is_finite() || df <= 0.0 {
        return Err(OceError::invalid_input(format!(
            "t_cdf requires df > 0; got {df}"
        )));
    }
    if !t.is_finite() {
        return Err(OceError::invalid_input("t_cdf requires a finite statistic"));
    }

    let x = df / (df + t * t);
    let tail = 0.5 * incomplete_beta(df / 2.0, 0.5, x)?;
    if t >= 0.0 { Ok(1.0 - tail) } else { Ok(tail) }
}

/// Student-t quantile, solved by bracketed bisection on the CDF.
pub fn t_quantile(p: f64, df: f64) -> Result<f64, OceError> {
    if !p.is_finite() || p <= 0.0 || p >= 1.0 {
        return Err(OceError::invalid_input(format!(
            "t_quantile requires p in (0, 1); got {p}"
        )));
    }
    if !df.is_finite() || df <= 0.0 {
        return Err(OceError::invalid_input(format!(
            "t_quantile requires df > 0; got {df}"
        )));
    }
    if (p - 0.5).abs() < 1e-15 {
        return Ok(0.0);
    }

    // Bracket outward from the normal-quantile start until the CDF crosses p.
    let mut hi = norm_quantile(p)?.abs().max(1.0);
    let mut expansions = 0;
    while expansions < 128 {
        let cdf_hi = t_cdf(hi, df)?;
        let cdf_lo = t_cdf(-hi, df)?;
        if cdf_lo < p && p < cdf_hi {
            break;
        }
        hi *= 2.0;
        expansions += 1;
    }
    if expansions == 128 {
        return Err(OceError::numerical_issue(format!(
            "t_quantile failed to bracket p={p}, df={df}"
        )));
    }

    let mut lo = -hi;
    let mut hi = hi;
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if t_cdf(mid, df)? < p {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-12 * (1.0 + hi.abs()) {
            break;
        }
    }
    Ok(0.5 * (lo + hi))
}
