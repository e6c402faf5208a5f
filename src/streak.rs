use crate::projections::{MetricKey, TeamProjections};
use crate::record::{daily_totals, ActivityRecord, Counter, Scope};
use crate::window::sort_desc;

/// Count qualifying records from the front of a most-recent-first list,
/// stopping at the first one below `daily_target`. An unset target
/// (zero, negative, non-finite) never yields a streak.
pub fn streak(records_desc: &[ActivityRecord], counter: Counter, daily_target: f64) -> u32 {
    if !daily_target.is_finite() || daily_target <= 0.0 {
        return 0;
    }
    records_desc
        .iter()
        .take_while(|r| r.get(counter) >= daily_target)
        .count() as u32
}

/// Streak of `scope` on `metric` against the scope's daily projection. Each
/// date counts once; for the whole team a date's value is the team total.
pub fn streak_for(
    records: &[ActivityRecord],
    scope: &Scope,
    metric: MetricKey,
    projections: &TeamProjections,
) -> u32 {
    let target = projections.for_scope(scope).get(metric).daily;
    let mut days = daily_totals(records, scope);
    sort_desc(&mut days);
    let n = streak(&days, metric.counter(), target);
    log::debug!(
        "Streak for {scope} on {metric}: {n} of {} days (target {target})",
        days.len()
    );
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projections::Projection;
    use chrono::{Duration, NaiveDate};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// Records most recent first, one per day ending at 2025-01-10.
    fn desc(values: &[u64]) -> Vec<ActivityRecord> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| ActivityRecord {
                outbound: *v,
                ..ActivityRecord::new(d(2025, 1, 10) - Duration::days(i as i64), "chris")
            })
            .collect()
    }

    #[test]
    fn test_most_recent_day_fails() {
        assert_eq!(streak(&desc(&[9, 10, 11, 12]), Counter::Outbound, 10.0), 0);
    }

    #[test]
    fn test_counts_until_first_failure() {
        assert_eq!(streak(&desc(&[12, 11, 10, 9, 50]), Counter::Outbound, 10.0), 3);
        assert_eq!(streak(&desc(&[10, 10]), Counter::Outbound, 10.0), 2);
    }

    #[test]
    fn test_unset_target_gives_zero() {
        let records = desc(&[100, 100, 100]);
        for target in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert_eq!(streak(&records, Counter::Outbound, target), 0);
        }
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(streak(&[], Counter::Outbound, 10.0), 0);
    }

    #[test]
    fn test_streak_for_team_totals_per_day() {
        let mut records = desc(&[6, 6, 1]);
        records.extend(desc(&[5, 3, 1]).into_iter().map(|mut r| {
            r.team_member = "ISRAEL".into();
            r
        }));
        let mut table = TeamProjections::new();
        let daily = |v: f64| Projection {
            daily: v,
            weekly: 0.0,
            monthly: 0.0,
        };
        table.set("chris", MetricKey::Outbound, daily(5.0));
        table.set("israel", MetricKey::Outbound, daily(5.0));

        // team totals 11, 9, 2 against 10
        assert_eq!(streak_for(&records, &Scope::All, MetricKey::Outbound, &table), 1);
        assert_eq!(
            streak_for(&records, &Scope::parse("chris"), MetricKey::Outbound, &table),
            2
        );
        assert_eq!(
            streak_for(&records, &Scope::parse("israel"), MetricKey::Outbound, &table),
            1
        );
        assert_eq!(
            streak_for(&records, &Scope::parse("chris"), MetricKey::Triage, &table),
            0
        );
    }

    #[test]
    fn test_streak_for_sorts_input() {
        let mut records = desc(&[12, 11, 3]);
        records.reverse();
        let mut table = TeamProjections::new();
        table.set(
            "chris",
            MetricKey::Outbound,
            Projection {
                daily: 10.0,
                weekly: 0.0,
                monthly: 0.0,
            },
        );
        assert_eq!(
            streak_for(&records, &Scope::parse("chris"), MetricKey::Outbound, &table),
            2
        );
    }
}
