//! Least-squares trend fitting and the startup revenue/leads forecast.
//!
//! The fit regresses `series[i]` on its index `i`. Predictions carry a uniform
//! noise term proportional to the predicted mean; pass a `noise_fraction` of
//! `0.0` for exact trend values.

use chrono::Days;
use rand::Rng;

use crate::{
    Constants, ForecastError, ForecastInsight, ForecastPanel, ReferenceRecord, TrendDirection,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearTrend {
    pub slope: f64,
    pub intercept: f64,
    /// Number of points the line was fitted to.
    pub len: usize,
}

impl LinearTrend {
    pub fn fit(series: &[f64]) -> Result<Self, ForecastError> {
        if series.is_empty() {
            return Err(ForecastError::EmptySeries);
        }
        if let Some(index) = series.iter().position(|y| !y.is_finite()) {
            return Err(ForecastError::NonFinite { index });
        }

        let n = series.len() as f64;
        let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
        for (i, y) in series.iter().enumerate() {
            let x = i as f64;
            sum_x += x;
            sum_y += y;
            sum_xy += x * y;
            sum_xx += x * x;
        }

        let denominator = n * sum_xx - sum_x * sum_x;
        if denominator.abs() < f64::EPSILON {
            return Err(ForecastError::Degenerate { len: series.len() });
        }
        let slope = (n * sum_xy - sum_x * sum_y) / denominator;
        let intercept = (sum_y - slope * sum_x) / n;

        Ok(Self {
            slope,
            intercept,
            len: series.len(),
        })
    }

    /// Trend value `step` points past the last fitted index (`step >= 1`).
    pub fn step_mean(&self, step: usize) -> f64 {
        self.slope * ((self.len - 1 + step) as f64) + self.intercept
    }
}

/// Fits `series` and returns `horizon` rounded predictions with noise of
/// `±noise_fraction / 2` of each predicted mean.
pub fn fit_and_predict(
    series: &[f64],
    horizon: usize,
    noise_fraction: f64,
    rng: &mut impl Rng,
) -> Result<Vec<f64>, ForecastError> {
    if horizon == 0 {
        return Err(ForecastError::ZeroHorizon);
    }
    let trend = LinearTrend::fit(series)?;
    Ok((1..=horizon)
        .map(|step| {
            let mean = trend.step_mean(step);
            let spread = mean * noise_fraction;
            let noise = rng.gen::<f64>() * spread - spread / 2.0;
            (mean + noise).round()
        })
        .collect())
}

/// Noise-free one-step prediction used by the tick for the chart overlay.
pub fn predict_next(series: &[f64]) -> Result<f64, ForecastError> {
    LinearTrend::fit(series).map(|trend| trend.step_mean(1).round())
}

/// Builds the revenue and leads forecast shown on the forecast view.
///
/// Actual series hold the past values followed by `horizon` gaps. Forecast
/// series hold gaps, then the last actual value (so the dashed line joins the
/// solid one), then the predictions.
pub fn build_forecast_panel(
    reference: &[ReferenceRecord],
    constants: &Constants,
    rng: &mut impl Rng,
) -> Result<ForecastPanel, ForecastError> {
    let horizon = constants.forecast_horizon_days;
    let past_revenue: Vec<f64> = reference.iter().map(|r| r.daily_revenue).collect();
    let past_leads: Vec<f64> = reference
        .iter()
        .map(|r| r.new_leads * constants.leads_chart_scale)
        .collect();

    let future_revenue = fit_and_predict(
        &past_revenue,
        horizon,
        constants.forecast_noise_fraction,
        rng,
    )?;
    let future_leads = fit_and_predict(
        &past_leads,
        horizon,
        constants.forecast_noise_fraction,
        rng,
    )?;

    // fit_and_predict rejected an empty series above.
    let last = &reference[reference.len() - 1];
    let mut labels: Vec<String> = reference
        .iter()
        .map(|r| r.date.format("%m-%d").to_string())
        .collect();
    labels.extend((1..=horizon as u64).map(|offset| {
        last.date
            .checked_add_days(Days::new(offset))
            .map_or_else(|| format!("+{offset}"), |d| d.format("%m-%d").to_string())
    }));

    let last_revenue = past_revenue[past_revenue.len() - 1];
    let projected_revenue = future_revenue[future_revenue.len() - 1];
    let diff = projected_revenue - last_revenue;

    Ok(ForecastPanel {
        labels,
        revenue_actual: padded_actual(&past_revenue, horizon),
        revenue_forecast: joined_forecast(&past_revenue, &future_revenue),
        leads_actual: padded_actual(&past_leads, horizon),
        leads_forecast: joined_forecast(&past_leads, &future_leads),
        insight: ForecastInsight {
            last_revenue,
            projected_revenue,
            diff,
            direction: if diff > 0.0 {
                TrendDirection::Up
            } else {
                TrendDirection::Down
            },
        },
    })
}

fn padded_actual(past: &[f64], horizon: usize) -> Vec<Option<f64>> {
    past.iter()
        .copied()
        .map(Some)
        .chain(std::iter::repeat(None).take(horizon))
        .collect()
}

fn joined_forecast(past: &[f64], future: &[f64]) -> Vec<Option<f64>> {
    let mut series = vec![None; past.len() - 1];
    series.push(past.last().copied());
    series.extend(future.iter().copied().map(Some));
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{base_constants, make_rng, reference_records};

    fn line(n: usize) -> Vec<f64> {
        (0..n).map(|x| 3.0 * x as f64 + 7.0).collect()
    }

    #[test]
    fn fit_recovers_exact_line() {
        let trend = LinearTrend::fit(&line(15)).unwrap();
        assert!((trend.slope - 3.0).abs() < 1e-9);
        assert!((trend.intercept - 7.0).abs() < 1e-9);
    }

    #[test]
    fn zero_noise_predictions_follow_the_line() {
        let series = line(15);
        let n = series.len();
        let mut rng = make_rng();
        let predictions = fit_and_predict(&series, 7, 0.0, &mut rng).unwrap();
        assert_eq!(predictions.len(), 7);
        for (i, value) in predictions.iter().enumerate() {
            let step = i + 1;
            let expected = 3.0 * (n - 1 + step) as f64 + 7.0;
            assert!(
                (value - expected).abs() < 1e-9,
                "step {step}: expected {expected}, got {value}"
            );
        }
    }

    #[test]
    fn noisy_predictions_stay_inside_band() {
        let series = line(15);
        let n = series.len();
        let mut rng = make_rng();
        for _ in 0..50 {
            let predictions = fit_and_predict(&series, 7, 0.05, &mut rng).unwrap();
            for (i, value) in predictions.iter().enumerate() {
                let mean = 3.0 * (n + i) as f64 + 7.0;
                // ±2.5% of the mean, plus 0.5 for rounding.
                let band = mean * 0.025 + 0.5;
                assert!(
                    (value - mean).abs() <= band,
                    "prediction {value} outside {mean} ± {band}"
                );
            }
        }
    }

    #[test]
    fn constant_series_has_flat_trend() {
        let trend = LinearTrend::fit(&[42.0, 42.0, 42.0, 42.0]).unwrap();
        assert!(trend.slope.abs() < 1e-12);
        assert!((trend.step_mean(3) - 42.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        let mut rng = make_rng();
        assert_eq!(LinearTrend::fit(&[]), Err(ForecastError::EmptySeries));
        assert_eq!(
            LinearTrend::fit(&[5.0]),
            Err(ForecastError::Degenerate { len: 1 })
        );
        assert_eq!(
            LinearTrend::fit(&[1.0, f64::NAN]),
            Err(ForecastError::NonFinite { index: 1 })
        );
        assert_eq!(
            fit_and_predict(&line(3), 0, 0.05, &mut rng),
            Err(ForecastError::ZeroHorizon)
        );
    }

    #[test]
    fn predict_next_is_noise_free() {
        assert_eq!(predict_next(&[10.0, 20.0, 30.0]), Ok(40.0));
    }

    #[test]
    fn forecast_panel_series_line_up() {
        let constants = base_constants();
        let reference = reference_records();
        let mut rng = make_rng();
        let panel = build_forecast_panel(&reference, &constants, &mut rng).unwrap();

        let total = reference.len() + constants.forecast_horizon_days;
        assert_eq!(panel.labels.len(), total);
        assert_eq!(panel.revenue_actual.len(), total);
        assert_eq!(panel.revenue_forecast.len(), total);
        assert_eq!(panel.leads_actual.len(), total);
        assert_eq!(panel.leads_forecast.len(), total);

        assert_eq!(panel.labels[0], "11-01");
        assert_eq!(panel.labels[reference.len()], "11-16");
        assert_eq!(panel.labels[total - 1], "11-22");

        // The forecast line starts at the last actual point.
        let last = reference.len() - 1;
        assert_eq!(panel.revenue_forecast[last], panel.revenue_actual[last]);
        assert!(panel.revenue_forecast[..last].iter().all(Option::is_none));
        assert!(panel.revenue_actual[reference.len()..].iter().all(Option::is_none));
    }

    #[test]
    fn forecast_insight_reflects_rising_revenue() {
        let constants = base_constants();
        let reference = reference_records();
        let mut rng = make_rng();
        let panel = build_forecast_panel(&reference, &constants, &mut rng).unwrap();

        assert!((panel.insight.last_revenue - 19_000.0).abs() < 1e-9);
        assert_eq!(panel.insight.direction, TrendDirection::Up);
        assert!(
            (panel.insight.diff - (panel.insight.projected_revenue - 19_000.0)).abs() < 1e-9
        );
    }
}
