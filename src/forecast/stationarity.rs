//! Differencing and the statistical tests that drive order selection.

use statrs::distribution::{ChiSquared, ContinuousCDF};

/// KPSS level-stationarity critical value at the 5% level.
const KPSS_CRITICAL_5PCT: f64 = 0.463;

/// Seasonal strength above which one seasonal difference is taken.
const SEASONAL_STRENGTH_THRESHOLD: f64 = 0.64;

/// `x[t] - x[t - lag]`; empty when `lag >= x.len()`.
pub fn difference(x: &[f64], lag: usize) -> Vec<f64> {
    if lag == 0 {
        return x.to_vec();
    }
    x.iter().skip(lag).zip(x).map(|(a, b)| a - b).collect()
}

/// Apply `seasonal_d` lag-`m` differences, then `d` lag-1 differences.
pub fn difference_orders(x: &[f64], d: usize, seasonal_d: usize, m: usize) -> Vec<f64> {
    let mut out = x.to_vec();
    if m > 1 {
        for _ in 0..seasonal_d {
            out = difference(&out, m);
        }
    }
    for _ in 0..d {
        out = difference(&out, 1);
    }
    out
}

pub(crate) fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

pub(crate) fn variance(x: &[f64]) -> f64 {
    if x.len() < 2 {
        return 0.0;
    }
    let mu = mean(x);
    x.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / (x.len() - 1) as f64
}

/// True when the series is constant up to rounding noise.
pub(crate) fn is_flat(x: &[f64]) -> bool {
    let scale = x.iter().fold(1.0f64, |acc, v| acc.max(v.abs()));
    variance(x).sqrt() <= 1e-9 * scale
}

/// KPSS statistic for level stationarity with a Bartlett-weighted long-run
/// variance, lag truncation `trunc(3 * sqrt(n) / 13)`.
pub fn kpss_level(x: &[f64]) -> f64 {
    let n = x.len();
    let mu = mean(x);
    let resid: Vec<f64> = x.iter().map(|v| v - mu).collect();

    let mut partial = 0.0;
    let eta: f64 = resid
        .iter()
        .map(|e| {
            partial += e;
            partial * partial
        })
        .sum::<f64>()
        / (n * n) as f64;

    let lags = (3.0 * (n as f64).sqrt() / 13.0) as usize;
    let mut long_run = resid.iter().map(|e| e * e).sum::<f64>() / n as f64;
    for lag in 1..=lags.min(n.saturating_sub(1)) {
        let weight = 1.0 - lag as f64 / (lags as f64 + 1.0);
        let cov: f64 = resid[lag..]
            .iter()
            .zip(&resid)
            .map(|(a, b)| a * b)
            .sum::<f64>()
            / n as f64;
        long_run += 2.0 * weight * cov;
    }
    eta / long_run
}

/// Whether the KPSS test fails to reject level stationarity at 5%.
pub fn is_level_stationary(x: &[f64]) -> bool {
    if x.len() < 3 || is_flat(x) {
        return true;
    }
    let stat = kpss_level(x);
    !stat.is_finite() || stat < KPSS_CRITICAL_5PCT
}

/// Number of first differences needed before the KPSS test passes.
pub fn estimate_d(x: &[f64], max_d: usize) -> usize {
    let mut series = x.to_vec();
    let mut d = 0;
    while d < max_d && !is_level_stationary(&series) {
        series = difference(&series, 1);
        d += 1;
    }
    d
}

/// Strength of seasonality in `[0, 1]` from a classical additive
/// decomposition. `None` when fewer than two full periods are available.
pub fn seasonal_strength(x: &[f64], m: usize) -> Option<f64> {
    let n = x.len();
    if m < 2 || n < 2 * m {
        return None;
    }

    let trend = centred_moving_average(x, m);
    let mut position_sums = vec![0.0; m];
    let mut position_counts = vec![0usize; m];
    let mut detrended = Vec::with_capacity(n);
    for (t, (value, tr)) in x.iter().zip(&trend).enumerate() {
        if let Some(tr) = tr {
            let v = value - tr;
            position_sums[t % m] += v;
            position_counts[t % m] += 1;
            detrended.push((t, v));
        }
    }

    let mut indices: Vec<f64> = position_sums
        .iter()
        .zip(&position_counts)
        .map(|(s, c)| if *c > 0 { s / *c as f64 } else { 0.0 })
        .collect();
    let centre = mean(&indices);
    indices.iter_mut().for_each(|s| *s -= centre);

    let seasonal_plus_remainder: Vec<f64> = detrended.iter().map(|(_, v)| *v).collect();
    let remainder: Vec<f64> = detrended.iter().map(|(t, v)| v - indices[t % m]).collect();

    let total = variance(&seasonal_plus_remainder);
    if total <= f64::EPSILON * mean(x).abs().max(1.0) {
        return Some(0.0);
    }
    Some((1.0 - variance(&remainder) / total).clamp(0.0, 1.0))
}

fn centred_moving_average(x: &[f64], m: usize) -> Vec<Option<f64>> {
    let n = x.len();
    let half = m / 2;
    (0..n)
        .map(|t| {
            if t < half || t + half >= n {
                return None;
            }
            if m % 2 == 1 {
                Some(x[t - half..=t + half].iter().sum::<f64>() / m as f64)
            } else {
                // 2 x m moving average: half weight on both end points.
                let inner: f64 = x[t - half + 1..t + half].iter().sum();
                Some((inner + 0.5 * (x[t - half] + x[t + half])) / m as f64)
            }
        })
        .collect()
}

/// Number of seasonal differences suggested by the seasonal-strength test.
pub fn estimate_seasonal_d(x: &[f64], m: usize, max_seasonal_d: usize) -> usize {
    let mut series = x.to_vec();
    let mut seasonal_d = 0;
    while seasonal_d < max_seasonal_d {
        match seasonal_strength(&series, m) {
            Some(strength) if strength > SEASONAL_STRENGTH_THRESHOLD => {
                series = difference(&series, m);
                seasonal_d += 1;
            }
            _ => break,
        }
    }
    seasonal_d
}

/// Result of a Ljung-Box portmanteau test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LjungBox {
    pub statistic: f64,
    pub lags: usize,
    pub dof: usize,
    pub p_value: f64,
}

/// Default lag count: `min(2m, n/5)` for seasonal data, `min(10, n/5)`
/// otherwise, at least one.
pub fn ljung_box_lags(n: usize, m: usize) -> usize {
    let cap = if m > 1 { 2 * m } else { 10 };
    cap.min(n / 5).max(1)
}

/// Ljung-Box test of residual autocorrelation up to `lags`, with degrees of
/// freedom reduced by the number of fitted ARMA coefficients.
pub fn ljung_box(residuals: &[f64], lags: usize, fitted: usize) -> Option<LjungBox> {
    let n = residuals.len();
    if n < 3 || lags == 0 || lags >= n {
        return None;
    }
    let mu = mean(residuals);
    let centred: Vec<f64> = residuals.iter().map(|e| e - mu).collect();
    let denom: f64 = centred.iter().map(|e| e * e).sum();
    if denom <= 0.0 {
        return None;
    }

    let statistic = (1..=lags)
        .map(|k| {
            let r: f64 = centred[k..]
                .iter()
                .zip(&centred)
                .map(|(a, b)| a * b)
                .sum::<f64>()
                / denom;
            r * r / (n - k) as f64
        })
        .sum::<f64>()
        * (n * (n + 2)) as f64;

    let dof = lags.saturating_sub(fitted).max(1);
    let chi2 = ChiSquared::new(dof as f64).ok()?;
    Some(LjungBox {
        statistic,
        lags,
        dof,
        p_value: 1.0 - chi2.cdf(statistic),
    })
}
