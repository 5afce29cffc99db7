//! Symbol and timing resolution.
//!
//! Two pure concerns sit here: picking the trade candidate out of an analysis
//! result set, and turning an intention's hold duration into concrete buy and
//! sell timestamps. A third, advisory refinement maps a symbol's analysis
//! attributes plus one random draw onto an optimal hold time inside a given
//! range; the main scheduling path does not consume it.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::Serialize;

use crate::analysis::EnhancedRate;
use crate::random::RandomSource;
use crate::types::Symbol;

/// Highest-value rate; ties resolve to the first maximum encountered.
pub fn pick_top_rate(rates: &[EnhancedRate]) -> Option<&EnhancedRate> {
    let mut best: Option<&EnhancedRate> = None;
    for rate in rates {
        match best {
            Some(current) if rate.value <= current.value => {}
            _ => best = Some(rate),
        }
    }
    best
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub buy_time: DateTime<Utc>,
    pub sell_time: DateTime<Utc>,
}

/// Buy now, sell `hold_minutes` later, both at second precision.
///
/// `hold_minutes <= 0` is accepted as given and yields a sell time at or
/// before the buy time; the trading API owns rejecting it.
pub fn schedule_window(now: DateTime<Utc>, hold_minutes: i64) -> ScheduleWindow {
    let buy_time = now.with_nanosecond(0).unwrap_or(now);
    ScheduleWindow {
        buy_time,
        sell_time: buy_time + Duration::minutes(hold_minutes),
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct TimingFactors {
    pub energetic_value: i64,
    pub gv: i64,
    pub value_factor: f64,
    pub gv_factor: f64,
    pub random_factor: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TimingAdvice {
    pub optimal_hold_minutes: i64,
    pub timing_score: f64,
    pub factors: TimingFactors,
}

/// Advisory hold-time refinement for the chosen symbol.
///
/// A high energetic value favours selling sooner (towards `min_hold_minutes`),
/// a high general-vitality reading favours holding longer (towards
/// `max_hold_minutes`), and one uniform draw keeps the mapping from being
/// fully deterministic. Score 1.0 maps to the minimum hold, score 0.0 to the
/// maximum.
pub fn analyze_timing_for_symbol(
    symbol: &Symbol,
    min_hold_minutes: i64,
    max_hold_minutes: i64,
    rates: &[EnhancedRate],
    random: &dyn RandomSource,
) -> TimingAdvice {
    let Some(rate) = rates.iter().find(|r| &r.signature == symbol) else {
        // Symbol absent from the result set: advise the midpoint.
        return TimingAdvice {
            optimal_hold_minutes: (min_hold_minutes + max_hold_minutes) / 2,
            timing_score: 0.0,
            factors: TimingFactors::default(),
        };
    };

    let value_factor = (rate.energetic_value as f64 / 1000.0).clamp(0.0, 1.0);
    let gv_factor = 1.0 - (rate.gv as f64 / 1000.0).clamp(0.0, 1.0);
    let random_factor = random.next_int(0, 1000) as f64 / 1000.0;

    let timing_score = value_factor * 0.4 + gv_factor * 0.4 + random_factor * 0.2;

    let hold_range = max_hold_minutes - min_hold_minutes;
    let optimal = max_hold_minutes - (timing_score * hold_range as f64) as i64;

    TimingAdvice {
        optimal_hold_minutes: optimal.clamp(min_hold_minutes, max_hold_minutes),
        timing_score,
        factors: TimingFactors {
            energetic_value: rate.energetic_value,
            gv: rate.gv,
            value_factor,
            gv_factor,
            random_factor,
        },
    }
}
