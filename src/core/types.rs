use chrono::NaiveDate;
use serde::Serialize;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutFrequency {
    Monthly,
    Quarterly,
    Semiannual,
    Annual,
}

impl PayoutFrequency {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "monthly" => Some(Self::Monthly),
            "quarterly" => Some(Self::Quarterly),
            "semiannual" => Some(Self::Semiannual),
            "annual" => Some(Self::Annual),
            _ => None,
        }
    }

    pub fn payments_per_year(self) -> f64 {
        match self {
            Self::Monthly => 12.0,
            Self::Quarterly => 4.0,
            Self::Semiannual => 2.0,
            Self::Annual => 1.0,
        }
    }

    // `sim_month` is 1..=12 within the simulation year, not the calendar.
    pub fn is_payout_month(self, sim_month: u32) -> bool {
        match self {
            Self::Monthly => true,
            Self::Quarterly => sim_month % 3 == 0,
            Self::Semiannual => sim_month == 6 || sim_month == 12,
            Self::Annual => sim_month == 12,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReinvestTiming {
    SameMonth,
    NextMonth,
}

impl ReinvestTiming {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "sameMonth" => Some(Self::SameMonth),
            "nextMonth" => Some(Self::NextMonth),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DpsGrowthMode {
    AnnualStep,
    MonthlySmooth,
}

impl DpsGrowthMode {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "annualStep" => Some(Self::AnnualStep),
            "monthlySmooth" => Some(Self::MonthlySmooth),
            _ => None,
        }
    }
}

// Rates are percentages as entered by the user.
#[derive(Debug, Clone)]
pub struct TickerInput {
    pub ticker: String,
    pub initial_price: f64,
    pub dividend_yield: f64,
    pub dividend_growth: f64,
    pub expected_total_return: f64,
    pub frequency: PayoutFrequency,
}

#[derive(Debug, Clone)]
pub struct PlanSettings {
    pub initial_investment: f64,
    pub monthly_contribution: f64,
    pub target_monthly_dividend: f64,
    pub start_date: NaiveDate,
    pub duration_years: u32,
    pub reinvest_dividends: bool,
    pub reinvest_dividend_percent: f64,
    pub tax_rate: Option<f64>,
    pub reinvest_timing: ReinvestTiming,
    pub dps_growth_mode: DpsGrowthMode,
}

impl PlanSettings {
    pub fn total_months(&self) -> u32 {
        self.duration_years * 12
    }

    pub fn tax_rate_or_zero(&self) -> f64 {
        self.tax_rate.unwrap_or(0.0)
    }
}

// calendar_year/calendar_month track the start date for display; the
// simulation year stays a fixed 12-month block.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySnapshot {
    pub month: u32,
    pub calendar_year: i32,
    pub calendar_month: u32,
    pub shares: f64,
    pub price: f64,
    pub dividend_per_share: f64,
    pub dividend_paid: f64,
    pub contribution_paid: f64,
    pub tax_paid: f64,
    pub portfolio_value: f64,
    pub cumulative_dividend: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyResult {
    pub year: i32,
    pub total_contribution: f64,
    pub asset_value: f64,
    pub annual_dividend: f64,
    pub cumulative_dividend: f64,
    pub monthly_dividend: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    pub final_asset_value: f64,
    pub final_annual_dividend: f64,
    pub final_monthly_dividend: f64,
    pub final_payout_month_dividend: f64,
    pub total_contribution: f64,
    pub total_net_dividend: f64,
    pub total_tax_paid: f64,
    pub target_reached_year: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickEstimate {
    pub end_value: f64,
    pub annual_dividend: f64,
    pub monthly_dividend: f64,
    pub yield_on_price_at_end: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOutput {
    pub monthly: Vec<MonthlySnapshot>,
    pub yearly: Vec<YearlyResult>,
    pub summary: SimulationSummary,
    pub quick_estimate: QuickEstimate,
}

// Weights are normalized; across an included set they sum to 1.
#[derive(Debug, Clone)]
pub struct WeightedProfile {
    pub ticker: TickerInput,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionPoint {
    pub year: i32,
    pub annual_dividend: f64,
    pub monthly_dividend: f64,
    pub asset_value: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerCashflow {
    pub ticker: String,
    pub weight: f64,
    pub yearly: Vec<YearlyResult>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateOutcome {
    pub simulation: Option<SimulationOutput>,
    pub cashflow_by_ticker: Vec<TickerCashflow>,
    pub post_investment_projection: Vec<ProjectionPoint>,
}
