use chrono::NaiveDate;
use serde::Serialize;

use crate::metrics::{aggregate, AggregateOptions, CounterTotals, MetricSnapshot};
use crate::projections::{MemberProjections, MetricKey};
use crate::record::{ActivityRecord, Domain, Scope};
use crate::window::Timeframe;

/// How an actual value stands against its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    OnTarget,
    NearTarget,
    BelowTarget,
    /// The target is zero or missing, so nothing was evaluated.
    NoTarget,
}

impl Status {
    /// `percent >= 100` is on target, `>= 90` near, anything else below.
    pub fn classify(actual: f64, target: f64) -> (f64, Status) {
        if !target.is_finite() || target <= 0.0 {
            return (0.0, Status::NoTarget);
        }
        let percent = actual * 100.0 / target;
        let percent = if percent.is_finite() { percent } else { 0.0 };
        let status = if percent >= 100.0 {
            Status::OnTarget
        } else if percent >= 90.0 {
            Status::NearTarget
        } else {
            Status::BelowTarget
        };
        (percent, status)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::OnTarget => write!(f, "on-target"),
            Status::NearTarget => write!(f, "near-target"),
            Status::BelowTarget => write!(f, "below-target"),
            Status::NoTarget => write!(f, "no-target"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricComparison {
    pub metric: MetricKey,
    pub actual: f64,
    pub target: f64,
    pub percent: f64,
    pub status: Status,
}

impl MetricComparison {
    pub fn new(metric: MetricKey, actual: f64, target: f64) -> Self {
        let (percent, status) = Status::classify(actual, target);
        Self {
            metric,
            actual,
            target,
            percent,
            status,
        }
    }
}

/// One aggregation per timeframe bucket, each over its own window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeframeActuals {
    pub daily: MetricSnapshot,
    pub weekly: MetricSnapshot,
    pub monthly: MetricSnapshot,
}

impl TimeframeActuals {
    /// Aggregate `scope`'s records three times. The daily bucket is the
    /// scope's most recent day in the data, not the calendar day.
    pub fn collect(
        records: &[ActivityRecord],
        scope: &Scope,
        domain: Domain,
        today: NaiveDate,
        options: &AggregateOptions,
    ) -> Self {
        let scoped: Vec<ActivityRecord> = records
            .iter()
            .filter(|r| scope.includes(&r.team_member))
            .cloned()
            .collect();
        let bucket = |timeframe: Timeframe| {
            let windowed = timeframe.window().filter(&scoped, today);
            aggregate(&windowed, scope, domain, options)
        };
        Self {
            daily: bucket(Timeframe::Daily),
            weekly: bucket(Timeframe::Weekly),
            monthly: bucket(Timeframe::Monthly),
        }
    }

    pub fn get(&self, timeframe: Timeframe) -> &MetricSnapshot {
        match timeframe {
            Timeframe::Daily => &self.daily,
            Timeframe::Weekly => &self.weekly,
            Timeframe::Monthly => &self.monthly,
        }
    }
}

/// Compare one timeframe's actuals against targets, in the domain's
/// display order. Missing targets compare as zero.
pub fn compare(
    actuals: &TimeframeActuals,
    projections: &MemberProjections,
    timeframe: Timeframe,
    domain: Domain,
) -> Vec<MetricComparison> {
    compare_totals(&actuals.get(timeframe).totals, projections, timeframe, domain)
}

pub fn compare_totals(
    totals: &CounterTotals,
    projections: &MemberProjections,
    timeframe: Timeframe,
    domain: Domain,
) -> Vec<MetricComparison> {
    MetricKey::for_domain(domain)
        .iter()
        .map(|metric| {
            let actual = totals.get(metric.counter());
            let target = projections.get(*metric).get(timeframe);
            MetricComparison::new(*metric, actual, target)
        })
        .collect()
}

const LEAD_INDICATORS: [MetricKey; 3] = [
    MetricKey::Outbound,
    MetricKey::OutboundMessages,
    MetricKey::Posts,
];

/// Weekly follow-through on the lead indicators (sales outbound, outbound
/// messages, posts): total actual over total target as a whole percent.
pub fn say_do_ratio(weekly: &CounterTotals, projections: &MemberProjections) -> i64 {
    let (actual, target) = LEAD_INDICATORS.iter().fold((0.0, 0.0), |(a, t), metric| {
        (
            a + weekly.get(metric.counter()),
            t + projections.get(*metric).weekly,
        )
    });
    if target <= 0.0 {
        return 0;
    }
    (actual * 100.0 / target).round() as i64
}
