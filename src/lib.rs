pub mod compare;
pub mod config;
pub mod date_util;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod projections;
pub mod record;
pub mod source;
pub mod streak;
pub mod window;

pub use compare::{compare, say_do_ratio, MetricComparison, Status, TimeframeActuals};
pub use config::{Config, MemberConfig};
pub use error::{Error, Result};
pub use metrics::{aggregate, velocity, AggregateOptions, CloseRateBasis, MetricSnapshot};
pub use normalize::{Cell, NormalizedBatch, RowError, RowNormalizer, RowSchema};
pub use projections::{MemberProjections, MetricKey, Projection, TeamProjections};
pub use record::{ActivityRecord, Counter, Domain, Scope, XpWeights};
pub use source::{CsvFileSource, JsonFileSource, MemorySource, RowSource};
pub use streak::{streak, streak_for};
pub use window::{filter, Timeframe, Window};

use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

/// A member's row source plus how to read it.
pub struct MemberSource {
    pub key: String,
    pub schema: Option<RowSchema>,
    pub source: Box<dyn RowSource>,
}

/// What loading one member produced.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub member: String,
    pub source: String,
    pub schema: Option<RowSchema>,
    pub records: usize,
    pub dropped: Vec<RowError>,
}

/// Main entry point: every member's normalized records plus the team's targets.
#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    records: Vec<ActivityRecord>,
    projections: TeamProjections,
    options: AggregateOptions,
    reports: Vec<LoadReport>,
}

impl Dashboard {
    /// Build from records already in hand. Same-day rows for a member are summed.
    pub fn new(
        records: Vec<ActivityRecord>,
        projections: TeamProjections,
        options: AggregateOptions,
    ) -> Self {
        Self {
            records: record::consolidate(&records),
            projections,
            options,
            reports: Vec::new(),
        }
    }

    /// Load every configured member's sheet and the projection tables.
    pub async fn open(config: &Config) -> Result<Self> {
        if config.members.is_empty() {
            return Err(Error::Config("no members configured".into()));
        }
        let sources = config
            .members
            .iter()
            .map(|m| MemberSource {
                key: m.key.clone(),
                schema: m.schema,
                source: source::file_source(&config.resolve(&m.rows)),
            })
            .collect();
        let projections = load_projections(config).await?;
        Self::load(
            sources,
            projections,
            &config.xp_weights,
            config.aggregate_options(),
        )
        .await
    }

    /// Fetch and normalize each member in turn. A source failure aborts the
    /// load; bad rows are only reported.
    pub async fn load(
        sources: Vec<MemberSource>,
        projections: TeamProjections,
        xp_weights: &XpWeights,
        options: AggregateOptions,
    ) -> Result<Self> {
        let mut records = Vec::new();
        let mut reports = Vec::new();
        for member in sources {
            let key = record::normalize_member(&member.key);
            let rows = member.source.fetch(&key).await?;

            let mut normalizer = RowNormalizer::new(&key).with_xp_weights(xp_weights.clone());
            if let Some(schema) = member.schema {
                normalizer = normalizer.with_schema(schema);
            }
            let mut batch = normalizer.normalize_batch(&rows);

            // a shared raw-data sheet carries every member's rows
            let before = batch.records.len();
            batch.records.retain(|r| r.team_member == key);
            if batch.records.len() < before {
                log::debug!(
                    "Ignored {} rows belonging to other members in {key}'s sheet",
                    before - batch.records.len()
                );
            }

            log::info!(
                "Loaded {} records for {key} from {} source",
                batch.records.len(),
                member.source.name()
            );
            reports.push(LoadReport {
                member: key,
                source: member.source.name().to_string(),
                schema: batch.schema,
                records: batch.records.len(),
                dropped: batch.errors,
            });
            records.extend(batch.records);
        }

        let mut dashboard = Self::new(records, projections, options);
        dashboard.reports = reports;
        Ok(dashboard)
    }

    pub fn records(&self) -> &[ActivityRecord] {
        &self.records
    }

    pub fn projections(&self) -> &TeamProjections {
        &self.projections
    }

    pub fn options(&self) -> &AggregateOptions {
        &self.options
    }

    pub fn reports(&self) -> &[LoadReport] {
        &self.reports
    }

    // ── Metrics ───────────────────────────────────────────────────

    pub fn snapshot(
        &self,
        scope: &Scope,
        window: &Window,
        domain: Domain,
        today: NaiveDate,
    ) -> MetricSnapshot {
        let windowed = self.windowed(scope, window, today);
        aggregate(&windowed, scope, domain, &self.options)
    }

    /// Sales and marketing levels averaged, over the same window.
    pub fn combined_level(&self, scope: &Scope, window: &Window, today: NaiveDate) -> u32 {
        let windowed = self.windowed(scope, window, today);
        let sales = aggregate(&windowed, scope, Domain::Sales, &self.options);
        let marketing = aggregate(&windowed, scope, Domain::Marketing, &self.options);
        metrics::combined_level(sales.level, marketing.level)
    }

    pub fn velocity(&self, scope: &Scope, domain: Domain, today: NaiveDate) -> i64 {
        velocity(&self.records, scope, domain, today)
    }

    // ── Targets ───────────────────────────────────────────────────

    pub fn actuals(&self, scope: &Scope, domain: Domain, today: NaiveDate) -> TimeframeActuals {
        TimeframeActuals::collect(&self.records, scope, domain, today, &self.options)
    }

    pub fn targets(
        &self,
        scope: &Scope,
        timeframe: Timeframe,
        domain: Domain,
        today: NaiveDate,
    ) -> Vec<MetricComparison> {
        let actuals = self.actuals(scope, domain, today);
        compare(
            &actuals,
            &self.projections.for_scope(scope),
            timeframe,
            domain,
        )
    }

    pub fn say_do_ratio(&self, scope: &Scope, today: NaiveDate) -> i64 {
        let actuals = self.actuals(scope, Domain::Sales, today);
        say_do_ratio(&actuals.weekly.totals, &self.projections.for_scope(scope))
    }

    pub fn streak(&self, scope: &Scope, metric: MetricKey) -> u32 {
        streak_for(&self.records, scope, metric, &self.projections)
    }

    fn windowed(&self, scope: &Scope, window: &Window, today: NaiveDate) -> Vec<ActivityRecord> {
        let scoped: Vec<ActivityRecord> = self
            .records
            .iter()
            .filter(|r| scope.includes(&r.team_member))
            .cloned()
            .collect();
        window.filter(&scoped, today)
    }
}

/// Read the sales projections and, if configured, overlay the marketing ones.
pub async fn load_projections(config: &Config) -> Result<TeamProjections> {
    let keys = config.member_keys();
    let members: Vec<&str> = keys.iter().map(String::as_str).collect();
    let mut table = TeamProjections::new();
    if let Some(path) = &config.projections {
        table = read_projections(&config.resolve(path), &members, None).await?;
    }
    if let Some(path) = &config.marketing_projections {
        let marketing =
            read_projections(&config.resolve(path), &members, Some(Domain::Marketing)).await?;
        table.merge(&marketing);
    }
    Ok(table)
}

/// Read a projections export, JSON or CSV by extension.
pub async fn read_projections(
    path: &Path,
    members: &[&str],
    domain: Option<Domain>,
) -> Result<TeamProjections> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    let table = if is_csv {
        let bytes = tokio::fs::read(path).await?;
        let rows = source::rows_from_csv(bytes.as_slice())?;
        TeamProjections::from_rows(&rows, members, domain)
    } else {
        let text = tokio::fs::read_to_string(path).await?;
        TeamProjections::from_json(&text, members, domain)?
    };
    log::debug!(
        "Read projections for {} members from {}",
        table.members().count(),
        path.display()
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn iso_row(date: &str, outbound: f64, triage: f64) -> Vec<Cell> {
        vec![Cell::from(date), Cell::from(outbound), Cell::from(triage)]
    }

    fn raw_row(member: &str, date: &str, outbound: f64) -> Vec<Cell> {
        vec![
            Cell::from("2025-03-10 09:00:00"),
            Cell::from(member),
            Cell::from(date),
            Cell::from(outbound),
        ]
    }

    async fn sample() -> Dashboard {
        let chris = MemorySource::new().with_rows(
            "chris",
            vec![
                iso_row("2025-03-08", 10.0, 5.0),
                iso_row("2025-03-09", 20.0, 0.0),
                iso_row("2025-03-10", 0.0, 0.0),
                iso_row("not a date", 99.0, 99.0),
            ],
        );
        let shared = vec![
            raw_row("Israel", "2025-03-10", 7.0),
            raw_row("Chris", "2025-03-10", 500.0),
        ];
        let israel = MemorySource::new().with_rows("israel", shared);

        let mut projections = TeamProjections::new();
        projections.set(
            "chris",
            MetricKey::Outbound,
            Projection {
                daily: 10.0,
                weekly: 20.0,
                monthly: 100.0,
            },
        );
        projections.set(
            "israel",
            MetricKey::Outbound,
            Projection {
                daily: 5.0,
                weekly: 10.0,
                monthly: 50.0,
            },
        );

        Dashboard::load(
            vec![
                MemberSource {
                    key: "chris".into(),
                    schema: Some(RowSchema::LegacyAnalysis),
                    source: Box::new(chris),
                },
                MemberSource {
                    key: "israel".into(),
                    schema: Some(RowSchema::RawData),
                    source: Box::new(israel),
                },
            ],
            projections,
            &XpWeights::default(),
            AggregateOptions::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_load_reports_and_filters_shared_rows() {
        let dash = sample().await;
        assert_eq!(dash.records().len(), 4);
        let reports = dash.reports();
        assert_eq!(reports[0].member, "CHRIS");
        assert_eq!(reports[0].records, 3);
        assert_eq!(reports[0].dropped.len(), 1);
        assert_eq!(reports[0].dropped[0].row, 3);
        assert_eq!(reports[1].records, 1);
        assert_eq!(reports[1].source, "memory");
    }

    #[tokio::test]
    async fn test_snapshot_lookback() {
        let dash = sample().await;
        let today = d(2025, 3, 10);
        let chris = dash.snapshot(
            &Scope::parse("chris"),
            &Window::Lookback(7),
            Domain::Sales,
            today,
        );
        assert_eq!(chris.totals.outbound, 30);
        assert_eq!(chris.totals.triage, 5);
        assert_eq!(format!("{:.1}", chris.rates.conversion_rate), "16.7");

        let all = dash.snapshot(&Scope::All, &Window::Lookback(7), Domain::Sales, today);
        assert_eq!(all.totals.outbound, 37);
    }

    #[tokio::test]
    async fn test_targets_and_streak() {
        let dash = sample().await;
        let today = d(2025, 3, 10);
        let rows = dash.targets(&Scope::parse("israel"), Timeframe::Daily, Domain::Sales, today);
        assert_eq!(rows[0].metric, MetricKey::Outbound);
        assert_eq!(rows[0].status, Status::OnTarget);
        assert_eq!(rows[1].status, Status::NoTarget);

        let weekly = dash.targets(&Scope::All, Timeframe::Weekly, Domain::Sales, today);
        assert_eq!(weekly[0].target, 30.0);
        assert_eq!(weekly[0].actual, 37.0);

        // chris's most recent day has 0 outbound
        assert_eq!(dash.streak(&Scope::parse("chris"), MetricKey::Outbound), 0);
        assert_eq!(dash.streak(&Scope::parse("israel"), MetricKey::Outbound), 1);
        assert_eq!(dash.say_do_ratio(&Scope::All, today), 123);
    }

    #[tokio::test]
    async fn test_empty_dashboard_is_all_zero() {
        let dash = Dashboard::default();
        let s = dash.snapshot(&Scope::All, &Window::All, Domain::Marketing, d(2025, 1, 1));
        assert_eq!(s.record_count, 0);
        assert_eq!(s.rates.response_rate, 0.0);
        assert_eq!(dash.streak(&Scope::All, MetricKey::Outbound), 0);
        assert_eq!(dash.combined_level(&Scope::All, &Window::All, d(2025, 1, 1)), 1);
    }

    #[tokio::test]
    async fn test_open_from_config_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("chris.csv"),
            "Date,Dials,Triage\n2025-03-09,12,2\n2025-03-10,11,1\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("projections.json"),
            r#"[["Outbound", 10, 50, 200]]"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("marketing.json"),
            r#"{"values": [["Outbound", 30, 150, 600]]}"#,
        )
        .unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(
            &config_path,
            r#"{
                "members": [{"key": "chris", "rows": "chris.csv"}],
                "projections": "projections.json",
                "marketing_projections": "marketing.json"
            }"#,
        )
        .unwrap();

        let config = Config::load(&config_path).await.unwrap();
        let dash = Dashboard::open(&config).await.unwrap();
        assert_eq!(dash.records().len(), 2);
        assert_eq!(dash.reports()[0].schema, Some(RowSchema::LegacyAnalysis));
        assert_eq!(dash.streak(&Scope::parse("chris"), MetricKey::Outbound), 2);
        assert_eq!(
            dash.projections().get("chris", MetricKey::OutboundMessages).daily,
            30.0
        );
    }

    #[tokio::test]
    async fn test_open_without_members_fails() {
        let config = Config::default();
        assert!(matches!(
            Dashboard::open(&config).await,
            Err(Error::Config(_))
        ));
    }
}
