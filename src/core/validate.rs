use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::types::{
    DpsGrowthMode, PayoutFrequency, PlanSettings, ReinvestTiming, TickerInput,
};

// Enum-like fields stay strings so an unrecognized key is a reported
// violation rather than a deserialization failure.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTickerInput {
    pub ticker: String,
    pub initial_price: f64,
    pub dividend_yield: f64,
    pub dividend_growth: f64,
    pub expected_total_return: f64,
    pub frequency: String,
}

// `duration_years` is a float so a fractional duration is reportable
// instead of being silently truncated.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPlanSettings {
    pub initial_investment: f64,
    pub monthly_contribution: f64,
    pub target_monthly_dividend: f64,
    pub investment_start_date: String,
    pub duration_years: f64,
    pub reinvest_dividends: bool,
    pub reinvest_dividend_percent: f64,
    pub tax_rate: Option<f64>,
    pub reinvest_timing: String,
    pub dps_growth_mode: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPlan {
    pub ticker: RawTickerInput,
    pub settings: RawPlanSettings,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

fn percent_range(value: f64) -> bool {
    (0.0..=100.0).contains(&value)
}

// Strict YYYY-MM-DD: fixed width, dash separators, a real calendar date.
fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let bytes = raw.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn whole_year_count(value: f64) -> bool {
    value.fract() == 0.0 && (1.0..=60.0).contains(&value)
}

// Every violation is collected; nothing short-circuits.
pub fn validate_plan(plan: &RawPlan) -> ValidationReport {
    let ticker = &plan.ticker;
    let settings = &plan.settings;

    let rules = [
        (
            ticker.ticker.trim().is_empty(),
            "ticker must not be empty",
        ),
        (
            !(ticker.initial_price > 0.0),
            "initialPrice must be greater than 0",
        ),
        (
            !percent_range(ticker.dividend_yield),
            "dividendYield must be between 0 and 100",
        ),
        (
            !percent_range(ticker.dividend_growth),
            "dividendGrowth must be between 0 and 100",
        ),
        (
            !(-100.0..=100.0).contains(&ticker.expected_total_return),
            "expectedTotalReturn must be between -100 and 100",
        ),
        (
            PayoutFrequency::from_key(ticker.frequency.trim()).is_none(),
            "frequency must be one of monthly, quarterly, semiannual, annual",
        ),
        (
            !(settings.initial_investment >= 0.0),
            "initialInvestment must be 0 or greater",
        ),
        (
            !(settings.monthly_contribution >= 0.0),
            "monthlyContribution must be 0 or greater",
        ),
        (
            !(settings.target_monthly_dividend >= 0.0),
            "targetMonthlyDividend must be 0 or greater",
        ),
        (
            parse_iso_date(settings.investment_start_date.trim()).is_none(),
            "investmentStartDate must be a valid date formatted YYYY-MM-DD",
        ),
        (
            !whole_year_count(settings.duration_years),
            "durationYears must be a whole number between 1 and 60",
        ),
        (
            !percent_range(settings.reinvest_dividend_percent),
            "reinvestDividendPercent must be between 0 and 100",
        ),
        (
            settings.tax_rate.is_some_and(|rate| !percent_range(rate)),
            "taxRate must be between 0 and 100",
        ),
        (
            ReinvestTiming::from_key(settings.reinvest_timing.trim()).is_none(),
            "reinvestTiming must be sameMonth or nextMonth",
        ),
        (
            DpsGrowthMode::from_key(settings.dps_growth_mode.trim()).is_none(),
            "dpsGrowthMode must be annualStep or monthlySmooth",
        ),
    ];

    let errors: Vec<String> = rules
        .into_iter()
        .filter(|(violated, _)| *violated)
        .map(|(_, message)| message.to_string())
        .collect();

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
    }
}

impl RawPlan {
    // The unwrap_or fallbacks below are unreachable once the report is
    // clean.
    pub fn into_typed(&self) -> Result<(TickerInput, PlanSettings), ValidationReport> {
        let report = validate_plan(self);
        if !report.is_valid {
            return Err(report);
        }

        let ticker = TickerInput {
            ticker: self.ticker.ticker.trim().to_string(),
            initial_price: self.ticker.initial_price,
            dividend_yield: self.ticker.dividend_yield,
            dividend_growth: self.ticker.dividend_growth,
            expected_total_return: self.ticker.expected_total_return,
            frequency: PayoutFrequency::from_key(self.ticker.frequency.trim())
                .unwrap_or(PayoutFrequency::Quarterly),
        };

        let settings = PlanSettings {
            initial_investment: self.settings.initial_investment,
            monthly_contribution: self.settings.monthly_contribution,
            target_monthly_dividend: self.settings.target_monthly_dividend,
            start_date: parse_iso_date(self.settings.investment_start_date.trim())
                .unwrap_or_default(),
            duration_years: self.settings.duration_years as u32,
            reinvest_dividends: self.settings.reinvest_dividends,
            reinvest_dividend_percent: self.settings.reinvest_dividend_percent,
            tax_rate: self.settings.tax_rate,
            reinvest_timing: ReinvestTiming::from_key(self.settings.reinvest_timing.trim())
                .unwrap_or(ReinvestTiming::SameMonth),
            dps_growth_mode: DpsGrowthMode::from_key(self.settings.dps_growth_mode.trim())
                .unwrap_or(DpsGrowthMode::AnnualStep),
        };

        Ok((ticker, settings))
    }
}
