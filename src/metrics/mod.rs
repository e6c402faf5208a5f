pub mod types;

pub use types::*;

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};

use crate::record::{ActivityRecord, Domain, Scope};

/// `numerator / denominator * 100`, or 0 when the result would not be a
/// finite number.
pub fn safe_rate(numerator: f64, denominator: f64) -> f64 {
    safe_ratio(numerator * 100.0, denominator)
}

/// `numerator / denominator`, or 0 when the result would not be a finite number.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let ratio = numerator / denominator;
    if ratio.is_finite() {
        ratio
    } else {
        0.0
    }
}

/// `floor(xp / step) + 1`. A non-positive step pins everyone at level 1.
pub fn level_for(xp: f64, step: f64) -> u32 {
    if step <= 0.0 || !xp.is_finite() || xp <= 0.0 {
        return 1;
    }
    ((xp / step).floor() as u32).saturating_add(1)
}

pub fn level_progress(xp: f64, options: &AggregateOptions) -> LevelProgress {
    let xp = if xp.is_finite() { xp.max(0.0) } else { 0.0 };
    let level = level_for(xp, options.level_step_xp);
    let step = options.level_step_xp.max(0.0);
    let xp_into_level = if step > 0.0 {
        xp - (level - 1) as f64 * step
    } else {
        0.0
    };
    LevelProgress {
        level,
        xp_into_level,
        xp_for_next_level: (step - xp_into_level).max(0.0),
        level_progress_pct: safe_rate(xp_into_level, step),
        milestone_pct: safe_rate(xp, options.milestone_xp).min(100.0),
    }
}

/// Average of the sales and marketing levels, rounded down.
pub fn combined_level(sales_level: u32, marketing_level: u32) -> u32 {
    ((sales_level as u64 + marketing_level as u64) / 2) as u32
}

pub fn compute_rates(t: &CounterTotals, basis: CloseRateBasis) -> Rates {
    let close_denominator = match basis {
        CloseRateBasis::Contracts => t.contracts_signed,
        CloseRateBasis::Shows => t.shows,
    };
    Rates {
        response_rate: safe_rate(t.positive_responses as f64, t.outbound_messages as f64),
        conversion_rate: safe_rate(t.triage as f64, t.outbound as f64),
        set_rate: safe_rate(t.appointments as f64, t.triage as f64),
        show_rate: safe_rate(t.shows as f64, t.appointments as f64),
        contract_rate: safe_rate(t.contracts_signed as f64, t.shows as f64),
        close_rate: safe_rate(t.closes as f64, close_denominator as f64),
        revenue_per_close: safe_ratio(t.revenue, t.closes as f64),
        leads_per_post: safe_ratio(t.leads_generated as f64, t.posts_created as f64),
    }
}

impl MetricSnapshot {
    /// Build a snapshot from already-summed counters, deriving every rate.
    pub fn from_totals(
        scope: Scope,
        domain: Domain,
        totals: CounterTotals,
        record_count: usize,
        day_count: usize,
        options: &AggregateOptions,
    ) -> Self {
        let rates = compute_rates(&totals, options.close_rate_basis);
        let total_xp = totals.xp(domain);
        let progress = level_progress(total_xp, options);
        Self {
            scope,
            domain,
            record_count,
            day_count,
            totals,
            rates,
            total_xp,
            level: progress.level,
            progress,
        }
    }

    /// Sum two snapshots' counters and recompute every rate. `day_count` of
    /// the result is a lower bound, since overlapping dates are unknown here.
    pub fn combine(&self, other: &MetricSnapshot, options: &AggregateOptions) -> MetricSnapshot {
        let mut totals = self.totals.clone();
        totals.merge(&other.totals);
        let scope = if self.scope == other.scope {
            self.scope.clone()
        } else {
            Scope::All
        };
        MetricSnapshot::from_totals(
            scope,
            self.domain,
            totals,
            self.record_count + other.record_count,
            self.day_count.max(other.day_count),
            options,
        )
    }

    pub fn empty(scope: Scope, domain: Domain, options: &AggregateOptions) -> Self {
        Self::from_totals(scope, domain, CounterTotals::default(), 0, 0, options)
    }
}

/// Reduce records to one snapshot for `scope`. Records outside the scope are
/// ignored; an empty input yields an all-zero snapshot.
pub fn aggregate(
    records: &[ActivityRecord],
    scope: &Scope,
    domain: Domain,
    options: &AggregateOptions,
) -> MetricSnapshot {
    let mut totals = CounterTotals::default();
    let mut days = BTreeSet::new();
    let mut count = 0;
    for r in records.iter().filter(|r| scope.includes(&r.team_member)) {
        totals.add_record(r);
        days.insert(r.date);
        count += 1;
    }
    log::debug!("Aggregated {count} records for {scope} ({domain}) over {} days", days.len());
    MetricSnapshot::from_totals(scope.clone(), domain, totals, count, days.len(), options)
}

/// Week-over-week XP growth for `scope`: the 7 days ending today against the
/// 7 days before them, as a whole percent clamped to [-100, 100]. 0 when the
/// earlier week earned nothing.
pub fn velocity(
    records: &[ActivityRecord],
    scope: &Scope,
    domain: Domain,
    today: NaiveDate,
) -> i64 {
    let this_start = today - Duration::days(6);
    let last_start = today - Duration::days(13);
    let mut this_week = 0.0;
    let mut last_week = 0.0;
    for r in records.iter().filter(|r| scope.includes(&r.team_member)) {
        if r.date >= this_start && r.date <= today {
            this_week += r.xp(domain);
        } else if r.date >= last_start && r.date < this_start {
            last_week += r.xp(domain);
        }
    }
    if last_week <= 0.0 {
        return 0;
    }
    let change = (this_week / last_week - 1.0) * 100.0;
    change.round().clamp(-100.0, 100.0) as i64
}
