use chrono::Datelike;

use super::estimate::quick_estimate;
use super::types::{
    DpsGrowthMode, MonthlySnapshot, PlanSettings, ReinvestTiming, SimulationOutput,
    SimulationSummary, TickerInput, YearlyResult,
};

// Floor keeps a high-yield, low-return input from driving the price to zero.
const MIN_PRICE_GROWTH: f64 = -0.99;

// Annual capital growth net of the dividend yield.
pub(crate) fn price_growth_annual(ticker: &TickerInput) -> f64 {
    (ticker.expected_total_return / 100.0 - ticker.dividend_yield / 100.0).max(MIN_PRICE_GROWTH)
}

pub fn simulate(ticker: &TickerInput, settings: &PlanSettings) -> SimulationOutput {
    let total_months = settings.total_months();
    let dps0 = ticker.initial_price * ticker.dividend_yield / 100.0;
    let growth = price_growth_annual(ticker);
    let dividend_growth = ticker.dividend_growth / 100.0;
    let payments_per_year = ticker.frequency.payments_per_year();
    let reinvest_ratio = (settings.reinvest_dividend_percent / 100.0).clamp(0.0, 1.0);
    let tax_rate = settings.tax_rate_or_zero() / 100.0;

    let start_year = settings.start_date.year();
    let start_month0 = settings.start_date.month() - 1;

    let mut shares = settings.initial_investment / ticker.initial_price;
    let mut pending_reinvest_cash = 0.0;
    let mut cumulative_dividend = 0.0;
    let mut total_tax_paid = 0.0;
    let mut year_dividend = 0.0;

    let mut monthly = Vec::with_capacity(total_months as usize);
    let mut yearly = Vec::with_capacity(settings.duration_years as usize);

    for m in 1..=total_months {
        let elapsed_months = m - 1;
        let elapsed_years = elapsed_months / 12;
        let sim_month = elapsed_months % 12 + 1;
        let sim_year_label = start_year + elapsed_years as i32;

        // Calendar bookkeeping is display-only and intentionally independent
        // of the fixed 12-month simulation year above.
        let calendar_offset = start_month0 + elapsed_months;
        let calendar_year = start_year + (calendar_offset / 12) as i32;
        let calendar_month = calendar_offset % 12 + 1;

        let year_fraction = elapsed_years as f64 + (sim_month - 1) as f64 / 12.0;
        let price = ticker.initial_price * (1.0 + growth).powf(year_fraction);

        let dps_exponent = match settings.dps_growth_mode {
            DpsGrowthMode::MonthlySmooth => year_fraction,
            DpsGrowthMode::AnnualStep => elapsed_years as f64,
        };
        let dps = dps0 * (1.0 + dividend_growth).powf(dps_exponent);

        // Deferred reinvestment buys at this month's price, ahead of the
        // month's payout and contribution.
        if pending_reinvest_cash > 0.0 {
            shares += pending_reinvest_cash / price;
            pending_reinvest_cash = 0.0;
        }

        let mut dividend_paid = 0.0;
        let mut tax_paid = 0.0;
        if ticker.frequency.is_payout_month(sim_month) {
            let gross_dividend = shares * dps / payments_per_year;
            tax_paid = gross_dividend * tax_rate;
            dividend_paid = gross_dividend - tax_paid;

            if settings.reinvest_dividends {
                let reinvest_amount = dividend_paid * reinvest_ratio;
                match settings.reinvest_timing {
                    ReinvestTiming::SameMonth => shares += reinvest_amount / price,
                    ReinvestTiming::NextMonth => pending_reinvest_cash += reinvest_amount,
                }
            }

            cumulative_dividend += dividend_paid;
            total_tax_paid += tax_paid;
            year_dividend += dividend_paid;
        }

        // Dollar-cost averaging happens every month regardless of payouts.
        shares += settings.monthly_contribution / price;
        let portfolio_value = shares * price;

        monthly.push(MonthlySnapshot {
            month: m,
            calendar_year,
            calendar_month,
            shares,
            price,
            dividend_per_share: dps,
            dividend_paid,
            contribution_paid: settings.monthly_contribution,
            tax_paid,
            portfolio_value,
            cumulative_dividend,
        });

        if sim_month == 12 {
            yearly.push(YearlyResult {
                year: sim_year_label,
                total_contribution: settings.initial_investment
                    + settings.monthly_contribution * m as f64,
                asset_value: portfolio_value,
                annual_dividend: year_dividend,
                cumulative_dividend,
                monthly_dividend: year_dividend / 12.0,
            });
            year_dividend = 0.0;
        }
    }

    let summary = build_summary(settings, &monthly, &yearly, total_tax_paid);
    let quick_estimate = quick_estimate(ticker, settings);

    SimulationOutput {
        monthly,
        yearly,
        summary,
        quick_estimate,
    }
}

// Also used by the aggregator, which rebuilds the summary over merged rows.
pub(crate) fn build_summary(
    settings: &PlanSettings,
    monthly: &[MonthlySnapshot],
    yearly: &[YearlyResult],
    total_tax_paid: f64,
) -> SimulationSummary {
    let final_payout_month_dividend = monthly
        .iter()
        .rev()
        .find(|row| row.dividend_paid > 0.0)
        .map(|row| row.dividend_paid)
        .unwrap_or(0.0);

    let (final_asset_value, final_annual_dividend, final_monthly_dividend, total_contribution) =
        yearly
            .last()
            .map(|row| {
                (
                    row.asset_value,
                    row.annual_dividend,
                    row.monthly_dividend,
                    row.total_contribution,
                )
            })
            .unwrap_or((0.0, 0.0, 0.0, 0.0));

    SimulationSummary {
        final_asset_value,
        final_annual_dividend,
        final_monthly_dividend,
        final_payout_month_dividend,
        total_contribution,
        total_net_dividend: yearly.last().map(|row| row.cumulative_dividend).unwrap_or(0.0),
        total_tax_paid,
        target_reached_year: target_reached_year(settings.target_monthly_dividend, yearly),
    }
}

// First yearly row whose average monthly dividend meets the target, else
// unset. A zero target is met immediately.
pub(crate) fn target_reached_year(target: f64, yearly: &[YearlyResult]) -> Option<i32> {
    yearly
        .iter()
        .find(|row| row.monthly_dividend >= target)
        .map(|row| row.year)
}
