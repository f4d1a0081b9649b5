use super::simulate::price_growth_annual;
use super::types::{PlanSettings, QuickEstimate, TickerInput};

// Below this absolute monthly return the annuity future value degenerates
// to a plain sum of contributions.
const FLAT_RETURN_EPS: f64 = 1e-12;

// Closed-form approximation of the month loop. The tax adjustment folds the
// dividend drag into one annual rate, a simplification of the exact monthly
// timing.
pub fn quick_estimate(ticker: &TickerInput, settings: &PlanSettings) -> QuickEstimate {
    let tax_rate = settings.tax_rate_or_zero() / 100.0;
    let annual_return = (ticker.expected_total_return / 100.0
        - ticker.dividend_yield / 100.0 * tax_rate)
        .max(-0.99);
    let monthly_return = (1.0 + annual_return).powf(1.0 / 12.0) - 1.0;
    let total_months = settings.total_months() as f64;

    let contribution_growth = if monthly_return.abs() < FLAT_RETURN_EPS {
        settings.monthly_contribution * total_months
    } else {
        settings.monthly_contribution * ((1.0 + monthly_return).powf(total_months) - 1.0)
            / monthly_return
    };
    let initial_growth = settings.initial_investment * (1.0 + monthly_return).powf(total_months);
    let end_value = contribution_growth + initial_growth;

    let price_growth = price_growth_annual(ticker);
    let relative_yield_growth = if 1.0 + price_growth > 0.0 {
        (1.0 + ticker.dividend_growth / 100.0) / (1.0 + price_growth)
    } else {
        1.0
    };
    let yield_on_price_at_end = (ticker.dividend_yield / 100.0
        * relative_yield_growth.powf(settings.duration_years as f64))
    .max(0.0);

    let annual_dividend = end_value * yield_on_price_at_end * (1.0 - tax_rate);

    QuickEstimate {
        end_value,
        annual_dividend,
        monthly_dividend: annual_dividend / 12.0,
        yield_on_price_at_end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::core::simulate::simulate;
    use crate::core::types::{DpsGrowthMode, PayoutFrequency, ReinvestTiming};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn flat_ticker() -> TickerInput {
        TickerInput {
            ticker: "FLAT".to_string(),
            initial_price: 100.0,
            dividend_yield: 0.0,
            dividend_growth: 0.0,
            expected_total_return: 0.0,
            frequency: PayoutFrequency::Monthly,
        }
    }

    fn settings(duration_years: u32) -> PlanSettings {
        PlanSettings {
            initial_investment: 10_000.0,
            monthly_contribution: 500.0,
            target_monthly_dividend: 0.0,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date"),
            duration_years,
            reinvest_dividends: true,
            reinvest_dividend_percent: 100.0,
            tax_rate: None,
            reinvest_timing: ReinvestTiming::SameMonth,
            dps_growth_mode: DpsGrowthMode::MonthlySmooth,
        }
    }

    #[test]
    fn zero_return_falls_back_to_linear_accumulation() {
        let estimate = quick_estimate(&flat_ticker(), &settings(3));
        assert_approx(estimate.end_value, 10_000.0 + 500.0 * 36.0);
        assert_approx(estimate.annual_dividend, 0.0);
        assert_approx(estimate.yield_on_price_at_end, 0.0);
    }

    #[test]
    fn positive_return_compounds_monthly() {
        let ticker = TickerInput {
            expected_total_return: 8.0,
            ..flat_ticker()
        };
        let plan = PlanSettings {
            monthly_contribution: 0.0,
            ..settings(10)
        };

        let estimate = quick_estimate(&ticker, &plan);
        // Monthly compounding of the annual rate reproduces it exactly over
        // whole years.
        assert!((estimate.end_value - 10_000.0 * 1.08f64.powi(10)).abs() < 1e-6);
    }

    #[test]
    fn end_yield_tracks_dividend_growth_relative_to_price_growth() {
        let ticker = TickerInput {
            dividend_yield: 4.0,
            dividend_growth: 7.0,
            expected_total_return: 9.0,
            ..flat_ticker()
        };
        let plan = settings(10);

        let estimate = quick_estimate(&ticker, &plan);
        let expected = 0.04 * (1.07f64 / 1.05).powi(10);
        assert!((estimate.yield_on_price_at_end - expected).abs() < 1e-12);
    }

    #[test]
    fn collapsed_price_growth_keeps_the_starting_yield() {
        let ticker = TickerInput {
            dividend_yield: 100.0,
            dividend_growth: 3.0,
            expected_total_return: -100.0,
            ..flat_ticker()
        };

        let estimate = quick_estimate(&ticker, &settings(10));
        // Growth floors at -0.99, so the denominator stays positive and the
        // relative-growth ratio applies rather than the fallback.
        assert!(estimate.yield_on_price_at_end >= 0.0);
        assert!(estimate.yield_on_price_at_end.is_finite());
    }

    #[test]
    fn tax_scales_the_dividend_approximation() {
        let ticker = TickerInput {
            dividend_yield: 4.0,
            expected_total_return: 8.0,
            ..flat_ticker()
        };
        let untaxed = quick_estimate(&ticker, &settings(10));
        let taxed = quick_estimate(
            &ticker,
            &PlanSettings {
                tax_rate: Some(15.0),
                ..settings(10)
            },
        );

        assert!(taxed.annual_dividend < untaxed.annual_dividend);
        assert!(taxed.end_value < untaxed.end_value);
        assert_approx(taxed.monthly_dividend, taxed.annual_dividend / 12.0);
    }

    #[test]
    fn estimate_agrees_directionally_with_the_full_loop() {
        // Full reinvestment with no tax makes the loop's effective return
        // close to the expected total return, the estimate's model.
        let ticker = TickerInput {
            ticker: "AGREE".to_string(),
            initial_price: 50.0,
            dividend_yield: 3.5,
            dividend_growth: 5.0,
            expected_total_return: 8.5,
            frequency: PayoutFrequency::Monthly,
        };
        let plan = PlanSettings {
            monthly_contribution: 250.0,
            ..settings(10)
        };

        let estimate = quick_estimate(&ticker, &plan);
        let full = simulate(&ticker, &plan);
        let relative = (estimate.end_value - full.summary.final_asset_value).abs()
            / full.summary.final_asset_value;
        assert!(relative < 0.15, "relative divergence {relative}");
    }
}
