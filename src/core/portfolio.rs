use super::simulate::{build_summary, simulate};
use super::types::{
    AggregateOutcome, MonthlySnapshot, PlanSettings, ProjectionPoint, QuickEstimate,
    SimulationOutput, TickerCashflow, TickerInput, WeightedProfile, YearlyResult,
};

pub const DEFAULT_PROJECTION_YEARS: u32 = 10;
pub const MIN_PROJECTION_YEARS: u32 = 5;

// Negative weights clamp to 0 first; an all-zero or missing set splits
// equally.
pub fn normalize_weights(entries: Vec<(TickerInput, Option<f64>)>) -> Vec<WeightedProfile> {
    let clamped: Vec<f64> = entries
        .iter()
        .map(|(_, weight)| weight.unwrap_or(0.0).max(0.0))
        .collect();
    let total: f64 = clamped.iter().sum();
    let count = entries.len();

    entries
        .into_iter()
        .zip(clamped)
        .map(|((ticker, _), weight)| WeightedProfile {
            ticker,
            weight: if total > 0.0 {
                weight / total
            } else {
                1.0 / count as f64
            },
        })
        .collect()
}

pub fn aggregate(
    profiles: &[WeightedProfile],
    settings: &PlanSettings,
    projection_years: Option<u32>,
) -> AggregateOutcome {
    if profiles.is_empty() {
        return AggregateOutcome {
            simulation: None,
            cashflow_by_ticker: Vec::new(),
            post_investment_projection: Vec::new(),
        };
    }

    let mut runs: Vec<SimulationOutput> = if profiles.len() == 1 {
        vec![simulate(&profiles[0].ticker, settings)]
    } else {
        profiles
            .iter()
            .map(|profile| {
                let allocated = PlanSettings {
                    initial_investment: settings.initial_investment * profile.weight,
                    monthly_contribution: settings.monthly_contribution * profile.weight,
                    ..settings.clone()
                };
                simulate(&profile.ticker, &allocated)
            })
            .collect()
    };

    let cashflow_by_ticker: Vec<TickerCashflow> = profiles
        .iter()
        .zip(&runs)
        .map(|(profile, run)| TickerCashflow {
            ticker: profile.ticker.ticker.clone(),
            weight: profile.weight,
            yearly: run.yearly.clone(),
        })
        .collect();

    let merged = if runs.len() > 1 {
        merge_runs(settings, &runs)
    } else {
        runs.remove(0)
    };

    let years = projection_years
        .unwrap_or(DEFAULT_PROJECTION_YEARS)
        .max(MIN_PROJECTION_YEARS);
    let post_investment_projection = project_post_horizon(profiles, &cashflow_by_ticker, &merged, years);

    AggregateOutcome {
        simulation: Some(merged),
        cashflow_by_ticker,
        post_investment_projection,
    }
}

// Price and DPS come from the first profile only; they carry no
// portfolio-level meaning after the merge.
fn merge_runs(settings: &PlanSettings, runs: &[SimulationOutput]) -> SimulationOutput {
    let base = &runs[0];

    let monthly: Vec<MonthlySnapshot> = base
        .monthly
        .iter()
        .enumerate()
        .map(|(idx, base_row)| {
            let mut merged = MonthlySnapshot {
                shares: 0.0,
                dividend_paid: 0.0,
                contribution_paid: 0.0,
                tax_paid: 0.0,
                portfolio_value: 0.0,
                cumulative_dividend: 0.0,
                ..base_row.clone()
            };
            for run in runs {
                let row = &run.monthly[idx];
                merged.shares += row.shares;
                merged.dividend_paid += row.dividend_paid;
                merged.contribution_paid += row.contribution_paid;
                merged.tax_paid += row.tax_paid;
                merged.portfolio_value += row.portfolio_value;
                merged.cumulative_dividend += row.cumulative_dividend;
            }
            merged
        })
        .collect();

    let yearly: Vec<YearlyResult> = base
        .yearly
        .iter()
        .enumerate()
        .map(|(idx, base_row)| {
            let mut total_contribution = 0.0;
            let mut asset_value = 0.0;
            let mut annual_dividend = 0.0;
            let mut cumulative_dividend = 0.0;
            for run in runs {
                let row = &run.yearly[idx];
                total_contribution += row.total_contribution;
                asset_value += row.asset_value;
                annual_dividend += row.annual_dividend;
                cumulative_dividend += row.cumulative_dividend;
            }
            YearlyResult {
                year: base_row.year,
                total_contribution,
                asset_value,
                annual_dividend,
                cumulative_dividend,
                // Recomputed on the merged total rather than summed, so the
                // derived field cannot drift from its source.
                monthly_dividend: annual_dividend / 12.0,
            }
        })
        .collect();

    let total_tax_paid = runs.iter().map(|run| run.summary.total_tax_paid).sum();
    let summary = build_summary(settings, &monthly, &yearly, total_tax_paid);

    let quick_estimate = QuickEstimate {
        end_value: runs.iter().map(|run| run.quick_estimate.end_value).sum(),
        annual_dividend: runs
            .iter()
            .map(|run| run.quick_estimate.annual_dividend)
            .sum(),
        monthly_dividend: runs
            .iter()
            .map(|run| run.quick_estimate.monthly_dividend)
            .sum(),
        // Unweighted mean across profiles, matching the upstream behavior.
        yield_on_price_at_end: runs
            .iter()
            .map(|run| run.quick_estimate.yield_on_price_at_end)
            .sum::<f64>()
            / runs.len() as f64,
    };

    SimulationOutput {
        monthly,
        yearly,
        summary,
        quick_estimate,
    }
}

// Rates averaged with each profile's terminal magnitude as the weight; an
// all-zero basis falls back to the unweighted mean.
fn magnitude_weighted_rate(pairs: &[(f64, f64)]) -> f64 {
    let basis: f64 = pairs.iter().map(|(_, magnitude)| magnitude.max(0.0)).sum();
    if basis > 0.0 {
        pairs
            .iter()
            .map(|(rate, magnitude)| rate * magnitude.max(0.0))
            .sum::<f64>()
            / basis
    } else if pairs.is_empty() {
        0.0
    } else {
        pairs.iter().map(|(rate, _)| rate).sum::<f64>() / pairs.len() as f64
    }
}

// No further contributions past the horizon; offset 0 restates the merged
// terminal state.
fn project_post_horizon(
    profiles: &[WeightedProfile],
    cashflows: &[TickerCashflow],
    merged: &SimulationOutput,
    years: u32,
) -> Vec<ProjectionPoint> {
    let Some(last_year) = merged.yearly.last().map(|row| row.year) else {
        return Vec::new();
    };
    let base_annual_dividend = merged.summary.final_annual_dividend;
    let base_asset_value = merged.summary.final_asset_value;

    let dividend_pairs: Vec<(f64, f64)> = profiles
        .iter()
        .zip(cashflows)
        .map(|(profile, cashflow)| {
            let final_dividend = cashflow
                .yearly
                .last()
                .map(|row| row.annual_dividend)
                .unwrap_or(0.0);
            (profile.ticker.dividend_growth / 100.0, final_dividend)
        })
        .collect();
    let asset_pairs: Vec<(f64, f64)> = profiles
        .iter()
        .zip(cashflows)
        .map(|(profile, cashflow)| {
            let final_value = cashflow
                .yearly
                .last()
                .map(|row| row.asset_value)
                .unwrap_or(0.0);
            (profile.ticker.expected_total_return / 100.0, final_value)
        })
        .collect();

    let dividend_growth_rate = magnitude_weighted_rate(&dividend_pairs);
    let asset_growth_rate = magnitude_weighted_rate(&asset_pairs);

    (0..=years)
        .map(|offset| {
            let annual_dividend =
                base_annual_dividend * (1.0 + dividend_growth_rate).powi(offset as i32);
            let asset_value = base_asset_value * (1.0 + asset_growth_rate).powi(offset as i32);
            ProjectionPoint {
                year: last_year + offset as i32,
                annual_dividend,
                monthly_dividend: annual_dividend / 12.0,
                asset_value,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::core::types::{DpsGrowthMode, PayoutFrequency, ReinvestTiming};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn ticker(name: &str, dividend_yield: f64, expected_total_return: f64) -> TickerInput {
        TickerInput {
            ticker: name.to_string(),
            initial_price: 100.0,
            dividend_yield,
            dividend_growth: 0.0,
            expected_total_return,
            frequency: PayoutFrequency::Quarterly,
        }
    }

    fn settings() -> PlanSettings {
        PlanSettings {
            initial_investment: 10_000.0,
            monthly_contribution: 500.0,
            target_monthly_dividend: 0.0,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date"),
            duration_years: 5,
            reinvest_dividends: true,
            reinvest_dividend_percent: 100.0,
            tax_rate: Some(15.0),
            reinvest_timing: ReinvestTiming::SameMonth,
            dps_growth_mode: DpsGrowthMode::MonthlySmooth,
        }
    }

    fn profile(name: &str, weight: f64) -> WeightedProfile {
        WeightedProfile {
            ticker: ticker(name, 3.0, 8.0),
            weight,
        }
    }

    #[test]
    fn empty_set_yields_no_simulation() {
        let outcome = aggregate(&[], &settings(), None);
        assert!(outcome.simulation.is_none());
        assert!(outcome.cashflow_by_ticker.is_empty());
        assert!(outcome.post_investment_projection.is_empty());
    }

    #[test]
    fn single_profile_delegates_unchanged() {
        let profiles = [profile("ONLY", 1.0)];
        let outcome = aggregate(&profiles, &settings(), None);
        let merged = outcome.simulation.expect("simulation present");
        let direct = simulate(&profiles[0].ticker, &settings());

        assert_eq!(merged.monthly.len(), direct.monthly.len());
        assert_approx(
            merged.summary.final_asset_value,
            direct.summary.final_asset_value,
        );
        assert_approx(
            merged.summary.total_net_dividend,
            direct.summary.total_net_dividend,
        );
        assert_approx(merged.quick_estimate.end_value, direct.quick_estimate.end_value);
        assert_eq!(outcome.cashflow_by_ticker.len(), 1);
        assert_approx(outcome.cashflow_by_ticker[0].weight, 1.0);
    }

    #[test]
    fn flat_two_ticker_merge_sums_contributions_and_value() {
        let profiles = [
            WeightedProfile {
                ticker: ticker("A", 0.0, 0.0),
                weight: 0.25,
            },
            WeightedProfile {
                ticker: ticker("B", 0.0, 0.0),
                weight: 0.75,
            },
        ];
        let plan = PlanSettings {
            initial_investment: 24_000_000.0,
            monthly_contribution: 1_000_000.0,
            duration_years: 1,
            tax_rate: None,
            ..settings()
        };

        let outcome = aggregate(&profiles, &plan, None);
        let merged = outcome.simulation.expect("simulation present");
        assert_approx(merged.summary.total_contribution, 36_000_000.0);
        assert_approx(merged.summary.final_asset_value, 36_000_000.0);
    }

    #[test]
    fn merged_monthly_rows_sum_across_profiles() {
        let profiles = [
            WeightedProfile {
                ticker: ticker("A", 4.0, 8.0),
                weight: 0.5,
            },
            WeightedProfile {
                ticker: ticker("B", 2.0, 6.0),
                weight: 0.5,
            },
        ];
        let plan = settings();

        let outcome = aggregate(&profiles, &plan, None);
        let merged = outcome.simulation.expect("simulation present");

        let half_plan = PlanSettings {
            initial_investment: plan.initial_investment * 0.5,
            monthly_contribution: plan.monthly_contribution * 0.5,
            ..plan.clone()
        };
        let a = simulate(&profiles[0].ticker, &half_plan);
        let b = simulate(&profiles[1].ticker, &half_plan);

        for idx in [0, 5, 35, merged.monthly.len() - 1] {
            assert_approx(
                merged.monthly[idx].dividend_paid,
                a.monthly[idx].dividend_paid + b.monthly[idx].dividend_paid,
            );
            assert_approx(
                merged.monthly[idx].portfolio_value,
                a.monthly[idx].portfolio_value + b.monthly[idx].portfolio_value,
            );
            // Full monthly contribution is preserved across the split.
            assert_approx(
                merged.monthly[idx].contribution_paid,
                plan.monthly_contribution,
            );
            // Price is a base-profile passthrough.
            assert_approx(merged.monthly[idx].price, a.monthly[idx].price);
        }

        for idx in 0..merged.yearly.len() {
            assert_approx(
                merged.yearly[idx].monthly_dividend,
                merged.yearly[idx].annual_dividend / 12.0,
            );
        }
        assert_approx(
            merged.summary.total_tax_paid,
            a.summary.total_tax_paid + b.summary.total_tax_paid,
        );
    }

    #[test]
    fn merged_quick_estimate_sums_values_and_averages_yield() {
        let profiles = [
            WeightedProfile {
                ticker: ticker("A", 4.0, 8.0),
                weight: 0.5,
            },
            WeightedProfile {
                ticker: ticker("B", 2.0, 6.0),
                weight: 0.5,
            },
        ];
        let plan = settings();

        let outcome = aggregate(&profiles, &plan, None);
        let merged = outcome.simulation.expect("simulation present");

        let half_plan = PlanSettings {
            initial_investment: plan.initial_investment * 0.5,
            monthly_contribution: plan.monthly_contribution * 0.5,
            ..plan.clone()
        };
        let a = simulate(&profiles[0].ticker, &half_plan);
        let b = simulate(&profiles[1].ticker, &half_plan);

        assert_approx(
            merged.quick_estimate.end_value,
            a.quick_estimate.end_value + b.quick_estimate.end_value,
        );
        assert_approx(
            merged.quick_estimate.yield_on_price_at_end,
            (a.quick_estimate.yield_on_price_at_end + b.quick_estimate.yield_on_price_at_end)
                / 2.0,
        );
    }

    #[test]
    fn target_year_is_recomputed_on_the_merged_series() {
        let profiles = [
            WeightedProfile {
                ticker: ticker("A", 5.0, 8.0),
                weight: 0.5,
            },
            WeightedProfile {
                ticker: ticker("B", 5.0, 8.0),
                weight: 0.5,
            },
        ];
        let plan = PlanSettings {
            initial_investment: 1_000_000.0,
            // Each half alone pays under the target; the merged series
            // crosses it in year one.
            target_monthly_dividend: 3_000.0,
            tax_rate: None,
            ..settings()
        };

        let outcome = aggregate(&profiles, &plan, None);
        let merged = outcome.simulation.expect("simulation present");
        assert_eq!(merged.summary.target_reached_year, Some(2026));

        let half_plan = PlanSettings {
            initial_investment: plan.initial_investment * 0.5,
            monthly_contribution: plan.monthly_contribution * 0.5,
            ..plan.clone()
        };
        let half = simulate(&profiles[0].ticker, &half_plan);
        assert_eq!(half.summary.target_reached_year, None);
    }

    #[test]
    fn normalize_clamps_negatives_and_scales_to_one() {
        let profiles = normalize_weights(vec![
            (ticker("A", 3.0, 8.0), Some(2.0)),
            (ticker("B", 3.0, 8.0), Some(-1.0)),
            (ticker("C", 3.0, 8.0), Some(2.0)),
        ]);
        assert_approx(profiles[0].weight, 0.5);
        assert_approx(profiles[1].weight, 0.0);
        assert_approx(profiles[2].weight, 0.5);
        assert_approx(profiles.iter().map(|p| p.weight).sum::<f64>(), 1.0);
    }

    #[test]
    fn normalize_splits_equally_when_weights_are_missing() {
        let profiles = normalize_weights(vec![
            (ticker("A", 3.0, 8.0), None),
            (ticker("B", 3.0, 8.0), Some(0.0)),
            (ticker("C", 3.0, 8.0), None),
            (ticker("D", 3.0, 8.0), None),
        ]);
        for profile in &profiles {
            assert_approx(profile.weight, 0.25);
        }
    }

    #[test]
    fn projection_defaults_to_ten_years_inclusive_of_the_base() {
        let profiles = [profile("ONLY", 1.0)];
        let outcome = aggregate(&profiles, &settings(), None);
        assert_eq!(outcome.post_investment_projection.len(), 11);
    }

    #[test]
    fn projection_length_is_clamped_to_the_minimum() {
        let profiles = [profile("ONLY", 1.0)];
        let outcome = aggregate(&profiles, &settings(), Some(2));
        assert_eq!(outcome.post_investment_projection.len(), 6);
    }

    #[test]
    fn projection_compounds_from_the_merged_terminal_state() {
        let profiles = [WeightedProfile {
            ticker: TickerInput {
                dividend_growth: 6.0,
                ..ticker("GROW", 4.0, 9.0)
            },
            weight: 1.0,
        }];
        let outcome = aggregate(&profiles, &settings(), Some(5));
        let merged = outcome.simulation.expect("simulation present");
        let projection = &outcome.post_investment_projection;

        assert_approx(
            projection[0].annual_dividend,
            merged.summary.final_annual_dividend,
        );
        assert_approx(projection[0].asset_value, merged.summary.final_asset_value);
        assert_eq!(
            projection[0].year,
            merged.yearly.last().expect("yearly rows").year
        );

        for offset in 1..projection.len() {
            assert_approx(
                projection[offset].annual_dividend,
                projection[offset - 1].annual_dividend * 1.06,
            );
            assert_approx(
                projection[offset].monthly_dividend,
                projection[offset].annual_dividend / 12.0,
            );
            assert_eq!(projection[offset].year, projection[0].year + offset as i32);
        }
    }

    #[test]
    fn dividendless_portfolio_falls_back_to_the_mean_growth_rate() {
        let profiles = [
            WeightedProfile {
                ticker: TickerInput {
                    dividend_growth: 4.0,
                    ..ticker("A", 0.0, 8.0)
                },
                weight: 0.5,
            },
            WeightedProfile {
                ticker: TickerInput {
                    dividend_growth: 8.0,
                    ..ticker("B", 0.0, 6.0)
                },
                weight: 0.5,
            },
        ];
        let outcome = aggregate(&profiles, &settings(), Some(5));
        let projection = &outcome.post_investment_projection;

        // No dividends anywhere: the projected dividend stays zero, and the
        // fallback mean keeps every point finite.
        for point in projection {
            assert_approx(point.annual_dividend, 0.0);
            assert!(point.asset_value.is_finite());
        }
    }

    #[test]
    fn magnitude_weighting_prefers_the_larger_payer() {
        let rate = magnitude_weighted_rate(&[(0.04, 100.0), (0.08, 300.0)]);
        assert_approx(rate, 0.07);

        let fallback = magnitude_weighted_rate(&[(0.04, 0.0), (0.08, 0.0)]);
        assert_approx(fallback, 0.06);

        assert_approx(magnitude_weighted_rate(&[]), 0.0);
    }
}
