//! Multiplicative seasonal ARIMA estimated by conditional sum of squares.
//!
//! The series is differenced `d` times at lag 1 and `D` times at lag `m`,
//! then an ARMA(p + P·m, q + Q·m) model with multiplicative lag structure is
//! fitted to the differenced values by Levenberg-Marquardt on the one-step
//! innovations. An intercept (mean, or drift after one difference) is
//! estimated when `d + D <= 1`.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::{Dyn, OMatrix, OVector, Owned};
use std::f64::consts::PI;
use tracing::trace;

use super::model::{FittedModel, ModelFitter, Prediction};
use super::order::SearchBounds;
use super::stationarity::{difference_orders, ljung_box, ljung_box_lags, mean};
use super::FitError;
use crate::domain::ModelOrder;

/// Innovation variance floor, relative to the mean square of the
/// differenced series. Keeps the likelihood finite on exact fits.
const SIGMA2_FLOOR: f64 = 1e-12;

/// Reflection coefficients must stay this far inside the unit circle.
const ROOT_MARGIN: f64 = 1e-6;

/// Forward-difference step for the numeric Jacobian.
const JACOBIAN_STEP: f64 = 1e-7;

/// Residual dimension beyond the parameter count required for a fit.
const MIN_DEGREES_OF_FREEDOM: usize = 3;

/// Position of each coefficient group in the parameter vector:
/// `[phi_1..p, Phi_1..P, theta_1..q, Theta_1..Q, mu]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    p: usize,
    seasonal_p: usize,
    q: usize,
    seasonal_q: usize,
    m: usize,
    intercept: bool,
}

/// Expanded lag polynomials in the convention
/// `x_t = sum ar[k] x_{t-k} + e_t + sum ma[k] e_{t-k}`; index 0 unused.
#[derive(Debug, Clone, PartialEq)]
struct Expanded {
    ar: Vec<f64>,
    ma: Vec<f64>,
    mu: f64,
}

impl Layout {
    fn new(order: &ModelOrder) -> Self {
        let seasonal = order.is_seasonal();
        let seasonal_d = if seasonal { order.seasonal_d } else { 0 };
        Self {
            p: order.p,
            seasonal_p: if seasonal { order.seasonal_p } else { 0 },
            q: order.q,
            seasonal_q: if seasonal { order.seasonal_q } else { 0 },
            m: order.m.max(1),
            intercept: order.d + seasonal_d <= 1,
        }
    }

    fn len(&self) -> usize {
        self.arma_len() + usize::from(self.intercept)
    }

    fn arma_len(&self) -> usize {
        self.p + self.seasonal_p + self.q + self.seasonal_q
    }

    fn ar_lag(&self) -> usize {
        self.p + self.seasonal_p * self.m
    }

    fn ma_lag(&self) -> usize {
        self.q + self.seasonal_q * self.m
    }

    /// Split a parameter vector into (phi, Phi, theta, Theta).
    fn groups<'a>(&self, params: &'a [f64]) -> [&'a [f64]; 4] {
        let (phi, rest) = params.split_at(self.p);
        let (sphi, rest) = rest.split_at(self.seasonal_p);
        let (theta, rest) = rest.split_at(self.q);
        let (stheta, _) = rest.split_at(self.seasonal_q);
        [phi, sphi, theta, stheta]
    }

    fn expand(&self, params: &[f64]) -> Expanded {
        let [phi, sphi, theta, stheta] = self.groups(params);
        let m = self.m;

        let mut ar = vec![0.0; self.ar_lag() + 1];
        for (i, a) in phi.iter().enumerate() {
            ar[i + 1] += a;
        }
        for (j, s) in sphi.iter().enumerate() {
            ar[(j + 1) * m] += s;
            for (i, a) in phi.iter().enumerate() {
                ar[i + 1 + (j + 1) * m] -= a * s;
            }
        }

        let mut ma = vec![0.0; self.ma_lag() + 1];
        for (i, b) in theta.iter().enumerate() {
            ma[i + 1] += b;
        }
        for (j, s) in stheta.iter().enumerate() {
            ma[(j + 1) * m] += s;
            for (i, b) in theta.iter().enumerate() {
                ma[i + 1 + (j + 1) * m] += b * s;
            }
        }

        let mu = if self.intercept {
            params.get(self.arma_len()).copied().unwrap_or(0.0)
        } else {
            0.0
        };
        Expanded { ar, ma, mu }
    }
}

/// Conditional innovations over the whole differenced series. Entries
/// before the first usable index stay zero.
fn innovations(model: &Expanded, w: &[f64]) -> Vec<f64> {
    let start = model.ar.len() - 1;
    let mut e = vec![0.0; w.len()];
    for t in start..w.len() {
        let mut v = w[t] - model.mu;
        for (k, a) in model.ar.iter().enumerate().skip(1) {
            v -= a * (w[t - k] - model.mu);
        }
        for (k, b) in model.ma.iter().enumerate().skip(1) {
            if k <= t {
                v -= b * e[t - k];
            }
        }
        e[t] = v;
    }
    e
}

struct CssProblem {
    layout: Layout,
    w: Vec<f64>,
    params: OVector<f64, Dyn>,
}

impl CssProblem {
    fn residuals_at(&self, params: &[f64]) -> Option<OVector<f64, Dyn>> {
        let expanded = self.layout.expand(params);
        let start = expanded.ar.len() - 1;
        let e = innovations(&expanded, &self.w);
        if e.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Some(OVector::<f64, Dyn>::from_vec(e[start..].to_vec()))
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for CssProblem {
    type ParameterStorage = Owned<f64, Dyn>;
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;

    fn set_params(&mut self, p: &OVector<f64, Dyn>) {
        self.params.copy_from(p);
    }

    fn params(&self) -> OVector<f64, Dyn> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<OVector<f64, Dyn>> {
        self.residuals_at(self.params.as_slice())
    }

    fn jacobian(&self) -> Option<OMatrix<f64, Dyn, Dyn>> {
        let base = self.residuals()?;
        let mut jac = OMatrix::<f64, Dyn, Dyn>::zeros(base.len(), self.params.len());
        let mut shifted = self.params.as_slice().to_vec();
        for j in 0..shifted.len() {
            let original = shifted[j];
            let h = JACOBIAN_STEP * original.abs().max(1.0);
            shifted[j] = original + h;
            let bumped = self.residuals_at(&shifted)?;
            shifted[j] = original;
            jac.set_column(j, &((bumped - &base) / h));
        }
        Some(jac)
    }
}

/// Step-down test: whether `1 - c_1 z - ... - c_k z^k` has every root
/// outside the unit circle.
fn roots_outside_unit_circle(coefs: &[f64]) -> bool {
    let mut a = coefs.to_vec();
    while let Some(&k) = a.last() {
        if !(k.abs() < 1.0 - ROOT_MARGIN) {
            return false;
        }
        let p = a.len();
        let denom = 1.0 - k * k;
        a = (0..p - 1).map(|i| (a[i] + k * a[p - 2 - i]) / denom).collect();
    }
    true
}

fn is_invertible(ma: &[f64]) -> bool {
    let negated: Vec<f64> = ma.iter().map(|b| -b).collect();
    roots_outside_unit_circle(&negated)
}

fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Coefficients of `(1 - B)^d (1 - B^m)^D`.
fn differencing_polynomial(d: usize, seasonal_d: usize, m: usize) -> Vec<f64> {
    let mut poly = vec![1.0];
    if m > 1 {
        let mut seasonal = vec![0.0; m + 1];
        seasonal[0] = 1.0;
        seasonal[m] = -1.0;
        for _ in 0..seasonal_d {
            poly = poly_mul(&poly, &seasonal);
        }
    }
    for _ in 0..d {
        poly = poly_mul(&poly, &[1.0, -1.0]);
    }
    poly
}

/// Fits [`SarimaModel`]s and screens their residuals with a Ljung-Box test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SarimaFitter {
    ljung_box_alpha: f64,
}

impl Default for SarimaFitter {
    fn default() -> Self {
        Self::new(SearchBounds::default().ljung_box_alpha)
    }
}

impl SarimaFitter {
    /// `ljung_box_alpha` of zero disables the residual check.
    pub fn new(ljung_box_alpha: f64) -> Self {
        Self { ljung_box_alpha }
    }

    pub fn from_bounds(bounds: &SearchBounds) -> Self {
        Self::new(bounds.ljung_box_alpha)
    }

    /// Concrete fit, for callers that want the model's coefficients.
    pub fn fit_sarima(&self, values: &[f64], order: ModelOrder) -> Result<SarimaModel, FitError> {
        if values.iter().any(|v| !v.is_finite()) {
            return Err(FitError::Unstable("series contains non-finite values".into()));
        }

        let layout = Layout::new(&order);
        let seasonal_d = if order.is_seasonal() { order.seasonal_d } else { 0 };
        let diff_poly = differencing_polynomial(order.d, seasonal_d, layout.m);
        let w = difference_orders(values, order.d, seasonal_d, layout.m);
        let start = layout.ar_lag();

        let needed = diff_poly.len() - 1 + start + layout.len() + MIN_DEGREES_OF_FREEDOM;
        if values.len() < needed {
            return Err(FitError::InsufficientData {
                needed,
                available: values.len(),
            });
        }
        let n_eff = w.len() - start;

        let scale = (w.iter().map(|v| v * v).sum::<f64>() / w.len() as f64).max(1.0);
        let floor = SIGMA2_FLOOR * scale;

        let mut initial = vec![0.0; layout.len()];
        if layout.intercept {
            initial[layout.arma_len()] = mean(&w);
        }
        let mut problem = CssProblem {
            layout,
            w,
            params: OVector::<f64, Dyn>::from_vec(initial),
        };

        let initial_ssr = problem
            .residuals()
            .map(|r| r.norm_squared())
            .ok_or_else(|| FitError::Unstable("non-finite innovations at start".into()))?;
        if layout.len() > 0 && initial_ssr > floor * n_eff as f64 {
            let (solved, report) = LevenbergMarquardt::new().minimize(problem);
            problem = solved;
            let ssr = problem.residuals().map(|r| r.norm_squared());
            let exact = ssr.is_some_and(|s| s <= floor * n_eff as f64);
            if !report.termination.was_successful() && !exact {
                return Err(FitError::NonConvergent(format!("{:?}", report.termination)));
            }
        }

        let params: Vec<f64> = problem.params.iter().copied().collect();
        if params.iter().any(|v| !v.is_finite()) {
            return Err(FitError::Unstable("non-finite coefficient".into()));
        }
        let [phi, sphi, theta, stheta] = layout.groups(&params);
        if !roots_outside_unit_circle(phi) || !roots_outside_unit_circle(sphi) {
            return Err(FitError::Unstable("autoregressive part is not stationary".into()));
        }
        if !is_invertible(theta) || !is_invertible(stheta) {
            return Err(FitError::Unstable("moving-average part is not invertible".into()));
        }

        let expanded = layout.expand(&params);
        let innovations = innovations(&expanded, &problem.w);
        let residuals = innovations[start..].to_vec();
        let ssr: f64 = residuals.iter().map(|e| e * e).sum();
        if !ssr.is_finite() {
            return Err(FitError::Unstable("non-finite residuals".into()));
        }
        let raw_sigma2 = ssr / n_eff as f64;
        let sigma2 = raw_sigma2.max(floor);

        if self.ljung_box_alpha > 0.0 && raw_sigma2 > floor {
            let lags = ljung_box_lags(n_eff, order.m);
            if let Some(test) = ljung_box(&residuals, lags, layout.arma_len()) {
                if test.p_value < self.ljung_box_alpha {
                    return Err(FitError::InadequateResiduals {
                        p_value: test.p_value,
                        lags: test.lags,
                    });
                }
            }
        }

        let log_likelihood = -0.5 * n_eff as f64 * ((2.0 * PI * sigma2).ln() + 1.0);
        trace!(%order, sigma2, log_likelihood, "fitted candidate");

        Ok(SarimaModel {
            order,
            params,
            expanded,
            values: values.to_vec(),
            w: problem.w,
            innovations,
            residuals,
            diff_poly,
            sigma2,
            log_likelihood,
            n_params: layout.len() + 1,
        })
    }
}

impl ModelFitter for SarimaFitter {
    fn fit(&self, values: &[f64], order: ModelOrder) -> Result<Box<dyn FittedModel>, FitError> {
        Ok(Box::new(self.fit_sarima(values, order)?))
    }
}

#[derive(Debug, Clone)]
pub struct SarimaModel {
    order: ModelOrder,
    params: Vec<f64>,
    expanded: Expanded,
    values: Vec<f64>,
    w: Vec<f64>,
    innovations: Vec<f64>,
    residuals: Vec<f64>,
    diff_poly: Vec<f64>,
    sigma2: f64,
    log_likelihood: f64,
    n_params: usize,
}

impl SarimaModel {
    /// Estimated coefficients in the order
    /// `[phi_1..p, Phi_1..P, theta_1..q, Theta_1..Q, intercept]`.
    pub fn params(&self) -> &[f64] {
        &self.params
    }

    pub fn intercept(&self) -> Option<f64> {
        Layout::new(&self.order).intercept.then_some(self.expanded.mu)
    }

    /// MA(infinity) weights of the integrated model, `psi_0 = 1`.
    fn psi_weights(&self, horizon: usize) -> Vec<f64> {
        let ar_poly: Vec<f64> = std::iter::once(1.0)
            .chain(self.expanded.ar.iter().skip(1).map(|a| -a))
            .collect();
        let full = poly_mul(&ar_poly, &self.diff_poly);
        let ma = &self.expanded.ma;

        let mut psi = Vec::with_capacity(horizon);
        psi.push(1.0);
        for j in 1..horizon {
            let mut v = ma.get(j).copied().unwrap_or(0.0);
            for i in 1..=j.min(full.len() - 1) {
                v -= full[i] * psi[j - i];
            }
            psi.push(v);
        }
        psi
    }
}

impl FittedModel for SarimaModel {
    fn order(&self) -> ModelOrder {
        self.order
    }

    fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    fn n_params(&self) -> usize {
        self.n_params
    }

    fn n_obs(&self) -> usize {
        self.residuals.len()
    }

    fn sigma2(&self) -> f64 {
        self.sigma2
    }

    fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    fn fitted_values(&self) -> Vec<f64> {
        let offset = self.values.len() - self.residuals.len();
        self.values[offset..]
            .iter()
            .zip(&self.residuals)
            .map(|(y, e)| y - e)
            .collect()
    }

    fn predict(&self, horizon: usize) -> Result<Vec<Prediction>, FitError> {
        let Expanded { ar, ma, mu } = &self.expanded;
        let n_w = self.w.len();

        let mut x: Vec<f64> = self.w.iter().map(|v| v - mu).collect();
        let mut e = self.innovations.clone();
        for t in n_w..n_w + horizon {
            let mut v = 0.0;
            for (k, a) in ar.iter().enumerate().skip(1) {
                v += a * x[t - k];
            }
            for (k, b) in ma.iter().enumerate().skip(1) {
                if k <= t {
                    v += b * e[t - k];
                }
            }
            x.push(v);
            e.push(0.0);
        }

        let n = self.values.len();
        let mut y = self.values.clone();
        for j in 0..horizon {
            let t = n + j;
            let mut v = x[n_w + j] + mu;
            for (k, c) in self.diff_poly.iter().enumerate().skip(1) {
                v -= c * y[t - k];
            }
            y.push(v);
        }

        let psi = self.psi_weights(horizon);
        let mut cumulative = 0.0;
        let predictions: Vec<Prediction> = y[n..]
            .iter()
            .zip(&psi)
            .map(|(mean, weight)| {
                cumulative += weight * weight;
                Prediction {
                    mean: *mean,
                    variance: self.sigma2 * cumulative,
                }
            })
            .collect();

        if predictions
            .iter()
            .any(|p| !p.mean.is_finite() || !p.variance.is_finite())
        {
            return Err(FitError::Unstable("forecast diverged".into()));
        }
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn uniform_noise(n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                (state >> 11) as f64 / (1u64 << 53) as f64 - 0.5
            })
            .collect()
    }

    fn seasonal_trend(n: usize) -> Vec<f64> {
        (0..n)
            .map(|t| {
                let t = t as f64;
                100.0 + 10.0 * t + 3.0 * (2.0 * PI * t / 12.0).sin()
            })
            .collect()
    }

    #[test]
    fn test_expand_multiplies_seasonal_factors() {
        let layout = Layout::new(&ModelOrder::new((1, 0, 1), (1, 0, 1), 4));
        let expanded = layout.expand(&[0.5, 0.2, 0.3, 0.4, 7.0]);
        assert_eq!(expanded.ar.len(), 6);
        assert_relative_eq!(expanded.ar[1], 0.5);
        assert_relative_eq!(expanded.ar[4], 0.2);
        assert_relative_eq!(expanded.ar[5], -0.1);
        assert_relative_eq!(expanded.ma[1], 0.3);
        assert_relative_eq!(expanded.ma[4], 0.4);
        assert_relative_eq!(expanded.ma[5], 0.12);
        assert_eq!(expanded.mu, 7.0);
    }

    #[test]
    fn test_intercept_rule() {
        assert!(Layout::new(&ModelOrder::new((0, 1, 0), (0, 0, 0), 12)).intercept);
        assert!(Layout::new(&ModelOrder::new((0, 0, 0), (0, 1, 0), 12)).intercept);
        assert!(!Layout::new(&ModelOrder::new((0, 1, 0), (0, 1, 0), 12)).intercept);
    }

    #[test]
    fn test_step_down_stationarity() {
        assert!(roots_outside_unit_circle(&[]));
        assert!(roots_outside_unit_circle(&[0.5]));
        assert!(!roots_outside_unit_circle(&[1.0]));
        assert!(roots_outside_unit_circle(&[0.5, 0.3]));
        assert!(!roots_outside_unit_circle(&[0.8, 0.3]));
        assert!(!roots_outside_unit_circle(&[f64::NAN]));
        assert!(is_invertible(&[0.9]));
        assert!(!is_invertible(&[-1.2]));
    }

    #[test]
    fn test_differencing_polynomial() {
        assert_eq!(differencing_polynomial(1, 0, 12), vec![1.0, -1.0]);
        let p = differencing_polynomial(1, 1, 4);
        assert_eq!(p, vec![1.0, -1.0, 0.0, 0.0, -1.0, 1.0]);
    }

    #[test]
    fn test_recovers_ar1_coefficient() {
        let noise = uniform_noise(400, 7);
        let mut y = vec![0.0; noise.len()];
        for t in 1..y.len() {
            y[t] = 0.6 * y[t - 1] + noise[t];
        }
        let model = SarimaFitter::default()
            .fit_sarima(&y, ModelOrder::new((1, 0, 0), (0, 0, 0), 1))
            .unwrap();
        assert!((model.params()[0] - 0.6).abs() < 0.1, "phi = {}", model.params()[0]);
        assert_eq!(model.n_params(), 3);
        assert_eq!(model.n_obs(), 399);
        assert_eq!(model.fitted_values().len(), 399);

        let predictions = model.predict(5).unwrap();
        assert!(predictions.windows(2).all(|w| w[0].variance < w[1].variance));
        assert_relative_eq!(predictions[0].variance, model.sigma2());
    }

    #[test]
    fn test_exact_seasonal_drift_forecast() {
        let y = seasonal_trend(24);
        let model = SarimaFitter::default()
            .fit_sarima(&y, ModelOrder::new((0, 0, 0), (0, 1, 0), 12))
            .unwrap();
        assert_relative_eq!(model.intercept().unwrap(), 120.0, epsilon = 1e-9);
        assert!(model.log_likelihood().is_finite());

        let expected = seasonal_trend(36);
        let predictions = model.predict(12).unwrap();
        for (p, want) in predictions.iter().zip(&expected[24..]) {
            assert_relative_eq!(p.mean, *want, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_insufficient_data() {
        let y = seasonal_trend(24);
        let err = SarimaFitter::default()
            .fit_sarima(&y, ModelOrder::new((1, 0, 0), (1, 1, 0), 12))
            .unwrap_err();
        assert!(matches!(err, FitError::InsufficientData { available: 24, .. }));
    }

    #[test]
    fn test_autocorrelated_residuals_rejected() {
        let y: Vec<f64> = (0..120).map(|t| (2.0 * PI * t as f64 / 50.0).sin()).collect();
        let err = SarimaFitter::default()
            .fit_sarima(&y, ModelOrder::new((0, 0, 0), (0, 0, 0), 12))
            .unwrap_err();
        assert!(matches!(err, FitError::InadequateResiduals { .. }));

        // With the check disabled the same fit is accepted.
        assert!(SarimaFitter::new(0.0)
            .fit_sarima(&y, ModelOrder::new((0, 0, 0), (0, 0, 0), 12))
            .is_ok());
    }

    #[test]
    fn test_non_finite_input_rejected() {
        let mut y = seasonal_trend(30);
        y[3] = f64::NAN;
        assert!(matches!(
            SarimaFitter::default().fit_sarima(&y, ModelOrder::new((0, 1, 0), (0, 0, 0), 1)),
            Err(FitError::Unstable(_))
        ));
    }
}
