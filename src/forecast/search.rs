//! Order search: differencing tests first, then a stepwise or exhaustive
//! walk over the ARMA orders, keeping the minimum-criterion fit.

use ordered_float::OrderedFloat;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::model::{FittedModel, ModelFitter};
use super::order::{InformationCriterion, SearchBounds};
use super::stationarity::{difference_orders, estimate_d, estimate_seasonal_d};
use super::{FitError, ForecastError};
use crate::domain::ModelOrder;

/// What happened to one candidate order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateStatus {
    Fitted { criterion: f64 },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRecord {
    pub order: ModelOrder,
    #[serde(flatten)]
    pub status: CandidateStatus,
}

/// Trace of a search, in the order candidates were tried.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchReport {
    pub d: usize,
    pub seasonal_d: usize,
    pub criterion: InformationCriterion,
    pub stepwise: bool,
    /// The stepwise search found no fittable starting order and fell back
    /// to the full grid
    pub exhaustive_fallback: bool,
    pub candidates: Vec<CandidateRecord>,
    pub winner: Option<ModelOrder>,
}

impl SearchReport {
    pub fn fitted(&self) -> usize {
        self.candidates
            .iter()
            .filter(|c| matches!(c.status, CandidateStatus::Fitted { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.candidates.len() - self.fitted()
    }
}

/// The winning model and how it was found.
#[derive(Debug)]
pub struct Selection {
    pub model: Box<dyn FittedModel>,
    pub criterion: f64,
    pub report: SearchReport,
}

/// Ranking key: criterion, then total order, then the order itself.
type Rank = (OrderedFloat<f64>, usize, ModelOrder);

fn rank(order: ModelOrder, criterion: f64) -> Rank {
    (OrderedFloat(criterion), order.total(), order)
}

struct Fit {
    order: ModelOrder,
    result: Result<(Box<dyn FittedModel>, f64), FitError>,
}

impl Fit {
    fn rank(&self) -> Option<Rank> {
        self.result.as_ref().ok().map(|(_, c)| rank(self.order, *c))
    }

    fn record(&self) -> CandidateRecord {
        let status = match &self.result {
            Ok((_, criterion)) => CandidateStatus::Fitted {
                criterion: *criterion,
            },
            Err(e) => CandidateStatus::Skipped {
                reason: e.to_string(),
            },
        };
        CandidateRecord {
            order: self.order,
            status,
        }
    }
}

/// Searches model orders for one series with a given fitter.
pub struct OrderSearch<'a> {
    fitter: &'a dyn ModelFitter,
    bounds: &'a SearchBounds,
    criterion: InformationCriterion,
}

impl<'a> OrderSearch<'a> {
    pub fn new(
        fitter: &'a dyn ModelFitter,
        bounds: &'a SearchBounds,
        criterion: InformationCriterion,
    ) -> Self {
        Self {
            fitter,
            bounds,
            criterion,
        }
    }

    /// Differencing orders `(d, D)` for `values` with period `m`.
    pub fn differencing(&self, values: &[f64], m: usize) -> (usize, usize) {
        let b = self.bounds;
        let seasonal_d = if m > 1 {
            let estimated = b
                .fixed_seasonal_d
                .unwrap_or_else(|| estimate_seasonal_d(values, m, b.max_seasonal_d));
            b.clamp_seasonal_d(estimated)
        } else {
            0
        };
        let d = b.clamp_d(b.fixed_d.unwrap_or_else(|| {
            let deseasonalized = difference_orders(values, 0, seasonal_d, m);
            estimate_d(&deseasonalized, b.max_d)
        }));
        (d, seasonal_d)
    }

    /// Run the search and return the best model.
    pub fn run(&self, values: &[f64], m: usize) -> Result<Selection, ForecastError> {
        let m = if m > 1 { m } else { 1 };
        let (d, seasonal_d) = self.differencing(values, m);
        debug!(d, seasonal_d, m, "differencing orders chosen");

        let (fits, best, exhaustive_fallback) = if self.bounds.stepwise {
            self.stepwise(values, d, seasonal_d, m)
        } else {
            let fits = self.fit_all(values, &self.grid_orders(d, seasonal_d, m));
            let best = best_of(&fits);
            (fits, best, false)
        };

        let mut report = SearchReport {
            d,
            seasonal_d,
            criterion: self.criterion,
            stepwise: self.bounds.stepwise,
            exhaustive_fallback,
            candidates: fits.iter().map(Fit::record).collect(),
            winner: None,
        };

        let Some(best) = best else {
            return Err(ForecastError::ModelSelection {
                tried: report.candidates.len(),
                report: Box::new(report),
            });
        };
        let Some((model, criterion)) = fits.into_iter().nth(best).and_then(|f| f.result.ok())
        else {
            return Err(ForecastError::ModelSelection {
                tried: report.candidates.len(),
                report: Box::new(report),
            });
        };

        report.winner = Some(model.order());
        info!(
            order = %model.order(),
            criterion,
            tried = report.candidates.len(),
            skipped = report.skipped(),
            "selected model"
        );
        Ok(Selection {
            model,
            criterion,
            report,
        })
    }

    fn evaluate(&self, values: &[f64], order: ModelOrder) -> Fit {
        let result = self.fitter.fit(values, order).and_then(|model| {
            let criterion = model.criterion(self.criterion);
            if criterion.is_finite() {
                Ok((model, criterion))
            } else {
                Err(FitError::NonConvergent(format!(
                    "{} is not finite",
                    self.criterion
                )))
            }
        });
        if let Err(e) = &result {
            debug!(%order, reason = %e, "candidate skipped");
        }
        Fit { order, result }
    }

    fn order(
        &self,
        (p, d, q): (usize, usize, usize),
        (sp, sd, sq): (usize, usize, usize),
        m: usize,
    ) -> ModelOrder {
        if m > 1 {
            ModelOrder::new((p, d, q), (sp, sd, sq), m)
        } else {
            ModelOrder::new((p, d, q), (0, 0, 0), 1)
        }
    }

    fn starting_orders(&self, d: usize, seasonal_d: usize, m: usize) -> Vec<ModelOrder> {
        let b = self.bounds;
        let floors = [b.min_p, b.min_q, b.min_seasonal_p, b.min_seasonal_q];
        let ceilings = [b.max_p, b.max_q, b.max_seasonal_p, b.max_seasonal_q];
        let seeds = [
            [b.start_p, b.start_q, b.start_seasonal_p, b.start_seasonal_q],
            [0, 0, 0, 0],
            [1, 0, 1, 0],
            [0, 1, 0, 1],
        ];
        let mut seen = BTreeSet::new();
        seeds
            .into_iter()
            .map(|seed| {
                let clamped = std::array::from_fn(|i| seed[i].clamp(floors[i], ceilings[i]));
                let [p, q, sp, sq] = within_max_order(clamped, floors, b.max_order);
                self.order((p, d, q), (sp, seasonal_d, sq), m)
            })
            .filter(|o| b.admits(o) && seen.insert(*o))
            .collect()
    }

    fn neighbours(&self, around: ModelOrder) -> Vec<ModelOrder> {
        const STEPS: [(i64, i64, i64, i64); 12] = [
            (1, 0, 0, 0),
            (-1, 0, 0, 0),
            (0, 1, 0, 0),
            (0, -1, 0, 0),
            (1, 1, 0, 0),
            (-1, -1, 0, 0),
            (0, 0, 1, 0),
            (0, 0, -1, 0),
            (0, 0, 0, 1),
            (0, 0, 0, -1),
            (0, 0, 1, 1),
            (0, 0, -1, -1),
        ];
        let shift = |v: usize, by: i64| usize::try_from(v as i64 + by).ok();
        STEPS
            .iter()
            .filter_map(|&(dp, dq, dsp, dsq)| {
                Some(self.order(
                    (shift(around.p, dp)?, around.d, shift(around.q, dq)?),
                    (
                        shift(around.seasonal_p, dsp)?,
                        around.seasonal_d,
                        shift(around.seasonal_q, dsq)?,
                    ),
                    around.m,
                ))
            })
            .filter(|o| *o != around && self.bounds.admits(o))
            .collect()
    }

    /// Hyndman-Khandakar stepwise search: fit the starting orders, then move
    /// to the first neighbour that improves on the best fit until none does.
    ///
    /// When no starting order can be fitted, every remaining order of the
    /// grid is tried before giving up. That fallback ignores `max_steps`.
    fn stepwise(
        &self,
        values: &[f64],
        d: usize,
        seasonal_d: usize,
        m: usize,
    ) -> (Vec<Fit>, Option<usize>, bool) {
        let mut fits: Vec<Fit> = Vec::new();
        let mut visited = BTreeSet::new();
        let mut best: Option<usize> = None;

        let better = |fits: &[Fit], candidate: usize, best: Option<usize>| match (
            fits[candidate].rank(),
            best.and_then(|b| fits[b].rank()),
        ) {
            (Some(c), Some(b)) => c < b,
            (Some(_), None) => true,
            _ => false,
        };

        for order in self.starting_orders(d, seasonal_d, m) {
            visited.insert(order);
            fits.push(self.evaluate(values, order));
            if better(&fits, fits.len() - 1, best) {
                best = Some(fits.len() - 1);
            }
        }

        let mut exhaustive_fallback = false;
        if best.is_none() {
            let remaining: Vec<ModelOrder> = self
                .grid_orders(d, seasonal_d, m)
                .into_iter()
                .filter(|o| !visited.contains(o))
                .collect();
            warn!(
                seeds = fits.len(),
                remaining = remaining.len(),
                "no starting order could be fitted, trying the full grid"
            );
            visited.extend(remaining.iter().copied());
            fits.extend(self.fit_all(values, &remaining));
            best = best_of(&fits);
            exhaustive_fallback = true;
        }

        'search: while let Some(current) = best {
            let around = fits[current].order;
            for order in self.neighbours(around) {
                if fits.len() >= self.bounds.max_steps {
                    debug!(steps = fits.len(), "stepwise search hit its step limit");
                    break 'search;
                }
                if !visited.insert(order) {
                    continue;
                }
                fits.push(self.evaluate(values, order));
                if better(&fits, fits.len() - 1, best) {
                    best = Some(fits.len() - 1);
                    continue 'search;
                }
            }
            break;
        }

        (fits, best, exhaustive_fallback)
    }

    /// Every admissible (p, q, P, Q) combination.
    fn grid_orders(&self, d: usize, seasonal_d: usize, m: usize) -> Vec<ModelOrder> {
        let b = self.bounds;
        let (sp_range, sq_range) = if m > 1 {
            (
                b.min_seasonal_p..=b.max_seasonal_p,
                b.min_seasonal_q..=b.max_seasonal_q,
            )
        } else {
            (0..=0, 0..=0)
        };
        let mut orders = Vec::new();
        for p in b.min_p..=b.max_p {
            for q in b.min_q..=b.max_q {
                for sp in sp_range.clone() {
                    for sq in sq_range.clone() {
                        let order = self.order((p, d, q), (sp, seasonal_d, sq), m);
                        if b.admits(&order) {
                            orders.push(order);
                        }
                    }
                }
            }
        }
        orders
    }

    /// Fit each order independently.
    fn fit_all(&self, values: &[f64], orders: &[ModelOrder]) -> Vec<Fit> {
        #[cfg(feature = "parallel")]
        let fits: Vec<Fit> = {
            use rayon::prelude::*;
            orders
                .par_iter()
                .map(|order| self.evaluate(values, *order))
                .collect()
        };
        #[cfg(not(feature = "parallel"))]
        let fits: Vec<Fit> = orders
            .iter()
            .map(|order| self.evaluate(values, *order))
            .collect();
        fits
    }
}

fn best_of(fits: &[Fit]) -> Option<usize> {
    fits.iter()
        .enumerate()
        .filter_map(|(i, f)| f.rank().map(|r| (r, i)))
        .min()
        .map(|(_, i)| i)
}

/// Lower the largest orders (first one on ties) until p + q + P + Q fits
/// under `max_order`, never going below the floors.
fn within_max_order(mut orders: [usize; 4], floors: [usize; 4], max_order: usize) -> [usize; 4] {
    while orders.iter().sum::<usize>() > max_order {
        let Some(i) = (0..4)
            .filter(|&i| orders[i] > floors[i])
            .min_by_key(|&i| Reverse(orders[i] - floors[i]))
        else {
            break;
        };
        orders[i] -= 1;
    }
    orders
}
