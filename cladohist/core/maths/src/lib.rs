#![deny(clippy::pedantic)]

pub trait MathsCore: 'static + Clone + core::fmt::Debug {
    #[must_use]
    fn floor(x: f64) -> f64;
    #[must_use]
    fn ceil(x: f64) -> f64;
    #[must_use]
    fn ln(x: f64) -> f64;
    #[must_use]
    fn ln_1p(x: f64) -> f64;
    #[must_use]
    fn exp(x: f64) -> f64;
    #[must_use]
    fn sqrt(x: f64) -> f64;
    #[must_use]
    fn pow(x: f64, exp: f64) -> f64;
    #[must_use]
    fn sin(x: f64) -> f64;
    #[must_use]
    fn cos(x: f64) -> f64;
    #[must_use]
    fn round(x: f64) -> f64;
}

#[derive(Clone, Debug)]
pub enum StdMathsCore {}

impl MathsCore for StdMathsCore {
    #[inline]
    fn floor(x: f64) -> f64 {
        x.floor()
    }

    #[inline]
    fn ceil(x: f64) -> f64 {
        x.ceil()
    }

    #[inline]
    fn ln(x: f64) -> f64 {
        x.ln()
    }

    #[inline]
    fn ln_1p(x: f64) -> f64 {
        x.ln_1p()
    }

    #[inline]
    fn exp(x: f64) -> f64 {
        x.exp()
    }

    #[inline]
    fn sqrt(x: f64) -> f64 {
        x.sqrt()
    }

    #[inline]
    fn pow(x: f64, exp: f64) -> f64 {
        x.powf(exp)
    }

    #[inline]
    fn sin(x: f64) -> f64 {
        x.sin()
    }

    #[inline]
    fn cos(x: f64) -> f64 {
        x.cos()
    }

    #[inline]
    fn round(x: f64) -> f64 {
        x.round()
    }
}

const LANCZOS_G: f64 = 7.0_f64;
const LANCZOS_COEFFICIENTS: [f64; 9] = [
    0.999_999_999_999_809_9_f64,
    676.520_368_121_885_1_f64,
    -1_259.139_216_722_402_8_f64,
    771.323_428_777_653_1_f64,
    -176.615_029_162_140_6_f64,
    12.507_343_278_686_905_f64,
    -0.138_571_095_265_720_12_f64,
    9.984_369_578_019_572e-6_f64,
    1.505_632_735_149_311_6e-7_f64,
];

/// Natural logarithm of the gamma function for `x > 0`, using the Lanczos
/// approximation (g = 7, n = 9) and the reflection formula below 0.5.
#[must_use]
pub fn ln_gamma<M: MathsCore>(x: f64) -> f64 {
    if x < 0.5_f64 {
        // Reflection: Gamma(x) * Gamma(1 - x) = pi / sin(pi * x)
        return M::ln(core::f64::consts::PI / M::sin(core::f64::consts::PI * x).abs())
            - ln_gamma::<M>(1.0_f64 - x);
    }

    let x = x - 1.0_f64;

    let mut series = LANCZOS_COEFFICIENTS[0];

    for (i, coefficient) in LANCZOS_COEFFICIENTS.iter().enumerate().skip(1) {
        #[allow(clippy::cast_precision_loss)]
        let offset = i as f64;

        series += coefficient / (x + offset);
    }

    let t = x + LANCZOS_G + 0.5_f64;

    0.5_f64 * M::ln(2.0_f64 * core::f64::consts::PI) + (x + 0.5_f64) * M::ln(t) - t + M::ln(series)
}

#[must_use]
pub fn ln_beta<M: MathsCore>(alpha: f64, beta: f64) -> f64 {
    ln_gamma::<M>(alpha) + ln_gamma::<M>(beta) - ln_gamma::<M>(alpha + beta)
}

/// Log-density of the Beta(`alpha`, `beta`) distribution at `x`.
///
/// Returns negative infinity outside of the open unit interval.
#[must_use]
pub fn ln_beta_pdf<M: MathsCore>(alpha: f64, beta: f64, x: f64) -> f64 {
    if x <= 0.0_f64 || x >= 1.0_f64 {
        return f64::NEG_INFINITY;
    }

    (alpha - 1.0_f64) * M::ln(x) + (beta - 1.0_f64) * M::ln_1p(-x) - ln_beta::<M>(alpha, beta)
}

#[must_use]
pub fn ln_factorial<M: MathsCore>(n: u64) -> f64 {
    (2..=n)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let i = i as f64;
            M::ln(i)
        })
        .sum()
}
