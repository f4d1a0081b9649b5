mod estimate;
mod portfolio;
mod simulate;
mod types;
mod validate;

pub use estimate::quick_estimate;
pub use portfolio::{
    DEFAULT_PROJECTION_YEARS, MIN_PROJECTION_YEARS, aggregate, normalize_weights,
};
pub use simulate::simulate;
pub use types::{
    AggregateOutcome, DpsGrowthMode, MonthlySnapshot, PayoutFrequency, PlanSettings,
    ProjectionPoint, QuickEstimate, ReinvestTiming, SimulationOutput, SimulationSummary,
    TickerCashflow, TickerInput, WeightedProfile, YearlyResult,
};
pub use validate::{
    RawPlan, RawPlanSettings, RawTickerInput, ValidationReport, validate_plan,
};
