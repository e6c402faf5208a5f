use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::normalize::Cell;
use crate::record::{normalize_member, Counter, Domain, Scope};
use crate::source::rows_from_json;
use crate::window::Timeframe;

/// A metric that can carry a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    Outbound,
    Triage,
    FollowUps,
    Appointments,
    Shows,
    Contracts,
    Closes,
    Revenue,
    Posts,
    Leads,
    OutboundMessages,
    Responses,
}

const SALES_ORDER: [MetricKey; 8] = [
    MetricKey::Outbound,
    MetricKey::Triage,
    MetricKey::FollowUps,
    MetricKey::Appointments,
    MetricKey::Shows,
    MetricKey::Contracts,
    MetricKey::Closes,
    MetricKey::Revenue,
];

const MARKETING_ORDER: [MetricKey; 4] = [
    MetricKey::OutboundMessages,
    MetricKey::Responses,
    MetricKey::Posts,
    MetricKey::Leads,
];

impl MetricKey {
    /// Row order of the projections sheet.
    pub const SHEET_ORDER: [MetricKey; 12] = [
        MetricKey::Outbound,
        MetricKey::Triage,
        MetricKey::FollowUps,
        MetricKey::Appointments,
        MetricKey::Shows,
        MetricKey::Contracts,
        MetricKey::Closes,
        MetricKey::Revenue,
        MetricKey::Posts,
        MetricKey::Leads,
        MetricKey::OutboundMessages,
        MetricKey::Responses,
    ];

    /// Display order for a domain's target table.
    pub fn for_domain(domain: Domain) -> &'static [MetricKey] {
        match domain {
            Domain::Sales => &SALES_ORDER,
            Domain::Marketing => &MARKETING_ORDER,
        }
    }

    pub fn counter(&self) -> Counter {
        match self {
            MetricKey::Outbound => Counter::Outbound,
            MetricKey::Triage => Counter::Triage,
            MetricKey::FollowUps => Counter::FollowUps,
            MetricKey::Appointments => Counter::Appointments,
            MetricKey::Shows => Counter::Shows,
            MetricKey::Contracts => Counter::ContractsSigned,
            MetricKey::Closes => Counter::Closes,
            MetricKey::Revenue => Counter::Revenue,
            MetricKey::Posts => Counter::PostsCreated,
            MetricKey::Leads => Counter::LeadsGenerated,
            MetricKey::OutboundMessages => Counter::OutboundMessages,
            MetricKey::Responses => Counter::PositiveResponses,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetricKey::Outbound => "Outbound",
            MetricKey::Triage => "Triage",
            MetricKey::FollowUps => "Follow Ups",
            MetricKey::Appointments => "Appointments",
            MetricKey::Shows => "Shows",
            MetricKey::Contracts => "Contracts",
            MetricKey::Closes => "Closes",
            MetricKey::Revenue => "Revenue",
            MetricKey::Posts => "Posts",
            MetricKey::Leads => "Leads",
            MetricKey::OutboundMessages => "Outbound Messages",
            MetricKey::Responses => "Responses",
        }
    }

    /// Parse a sheet label or key. On the marketing sheet a bare "Outbound"
    /// means outbound messages.
    pub fn parse_in(s: &str, domain: Domain) -> Option<Self> {
        let key: String = s
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        let metric = match key.as_str() {
            "outbound" | "dials" if domain == Domain::Marketing => MetricKey::OutboundMessages,
            "outbound" | "dials" => MetricKey::Outbound,
            "triage" => MetricKey::Triage,
            "followups" => MetricKey::FollowUps,
            "appointments" => MetricKey::Appointments,
            "shows" => MetricKey::Shows,
            "contracts" | "contractssigned" => MetricKey::Contracts,
            "closes" => MetricKey::Closes,
            "revenue" => MetricKey::Revenue,
            "posts" | "postscreated" => MetricKey::Posts,
            "leads" | "leadsgenerated" => MetricKey::Leads,
            "outboundmessages" | "outboundmsgs" => MetricKey::OutboundMessages,
            "responses" | "positiveresponses" => MetricKey::Responses,
            _ => return None,
        };
        Some(metric)
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::parse_in(s, Domain::Sales)
    }
}

impl std::fmt::Display for MetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Targets for one metric across the three timeframe buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Projection {
    pub daily: f64,
    pub weekly: f64,
    pub monthly: f64,
}

impl Projection {
    pub fn get(&self, timeframe: Timeframe) -> f64 {
        match timeframe {
            Timeframe::Daily => self.daily,
            Timeframe::Weekly => self.weekly,
            Timeframe::Monthly => self.monthly,
        }
    }

    pub fn add(&mut self, other: &Projection) {
        self.daily += other.daily;
        self.weekly += other.weekly;
        self.monthly += other.monthly;
    }

    fn from_cells(cells: &[Cell]) -> Self {
        let at = |i: usize| cells.get(i).map(Cell::as_amount).unwrap_or(0.0);
        Projection {
            daily: at(0),
            weekly: at(1),
            monthly: at(2),
        }
    }

    fn sanitized(self) -> Self {
        let clean = |v: f64| if v.is_finite() && v > 0.0 { v } else { 0.0 };
        Projection {
            daily: clean(self.daily),
            weekly: clean(self.weekly),
            monthly: clean(self.monthly),
        }
    }
}

/// One scope's targets. A metric without an entry has no target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberProjections(pub BTreeMap<MetricKey, Projection>);

impl MemberProjections {
    pub fn get(&self, metric: MetricKey) -> Projection {
        self.0.get(&metric).copied().unwrap_or_default()
    }

    pub fn set(&mut self, metric: MetricKey, projection: Projection) {
        self.0.insert(metric, projection.sanitized());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Targets for every member. The "ALL" scope is always the sum of the
/// members; an entry stored under that key is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamProjections(pub BTreeMap<String, MemberProjections>);

impl TeamProjections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, member: &str, metric: MetricKey, projection: Projection) {
        self.0
            .entry(normalize_member(member))
            .or_default()
            .set(metric, projection);
    }

    pub fn get(&self, member: &str, metric: MetricKey) -> Projection {
        self.0
            .get(&normalize_member(member))
            .map(|m| m.get(metric))
            .unwrap_or_default()
    }

    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.0
            .keys()
            .map(String::as_str)
            .filter(|k| !k.eq_ignore_ascii_case("all"))
    }

    /// Targets for a scope. `All` sums every member per metric and timeframe,
    /// ignoring any stored "ALL" entry.
    pub fn for_scope(&self, scope: &Scope) -> MemberProjections {
        match scope {
            Scope::Member(key) => self.0.get(&normalize_member(key)).cloned().unwrap_or_default(),
            Scope::All => {
                let mut summed: BTreeMap<MetricKey, Projection> = BTreeMap::new();
                for (member, table) in &self.0 {
                    if member.eq_ignore_ascii_case("all") {
                        continue;
                    }
                    for (metric, projection) in &table.0 {
                        summed.entry(*metric).or_default().add(projection);
                    }
                }
                MemberProjections(summed)
            }
        }
    }

    /// Overlay `other` on top of this table; `other` wins per member and metric.
    pub fn merge(&mut self, other: &TeamProjections) {
        for (member, table) in &other.0 {
            let entry = self.0.entry(normalize_member(member)).or_default();
            for (metric, projection) in &table.0 {
                entry.set(*metric, *projection);
            }
        }
    }

    /// Parse the combined projections sheet: one row per metric in
    /// [`MetricKey::SHEET_ORDER`], first column a label, then a
    /// daily/weekly/monthly triple per member. A recognised label wins over
    /// the row position; any other row is read by position.
    pub fn from_sheet_rows(rows: &[Vec<Cell>], members: &[&str]) -> Self {
        let mut table = TeamProjections::new();
        for (idx, row) in rows.iter().enumerate() {
            let label = row.first().and_then(Cell::as_text);
            let metric = match label {
                Some(l) => MetricKey::parse(l).or_else(|| {
                    let fallback = MetricKey::SHEET_ORDER.get(idx).copied();
                    log::warn!(
                        "Projections row {idx}: unknown metric '{l}', reading it as {}",
                        fallback.map_or("nothing".to_string(), |m| m.to_string())
                    );
                    fallback
                }),
                None => MetricKey::SHEET_ORDER.get(idx).copied(),
            };
            let Some(metric) = metric else { continue };
            table.fill_row(metric, row, members);
        }
        table
    }

    /// Parse the marketing projections sheet, where rows are matched by label
    /// only and "Outbound" means outbound messages.
    pub fn from_marketing_sheet_rows(rows: &[Vec<Cell>], members: &[&str]) -> Self {
        let mut table = TeamProjections::new();
        for row in rows {
            let Some(metric) = row
                .first()
                .and_then(Cell::as_text)
                .and_then(|l| MetricKey::parse_in(l, Domain::Marketing))
            else {
                continue;
            };
            table.fill_row(metric, row, members);
        }
        table
    }

    /// Parse a projections export: either the keyed JSON form of this table or
    /// sheet rows (bare or in a `{ "values": [...] }` envelope) laid out as
    /// [`TeamProjections::from_sheet_rows`] expects for `domain`.
    pub fn from_json(text: &str, members: &[&str], domain: Option<Domain>) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let keyed = value
            .as_object()
            .is_some_and(|o| !o.contains_key("values"));
        if keyed {
            let mut table = TeamProjections::new();
            table.merge(&serde_json::from_value(value)?);
            return Ok(table);
        }
        let rows = rows_from_json(text)?;
        Ok(Self::from_rows(&rows, members, domain))
    }

    pub fn from_rows(rows: &[Vec<Cell>], members: &[&str], domain: Option<Domain>) -> Self {
        match domain {
            Some(Domain::Marketing) => Self::from_marketing_sheet_rows(rows, members),
            _ => Self::from_sheet_rows(rows, members),
        }
    }

    fn fill_row(&mut self, metric: MetricKey, row: &[Cell], members: &[&str]) {
        for (j, member) in members.iter().enumerate() {
            let start = 1 + 3 * j;
            let cells = row.get(start..).unwrap_or(&[]);
            self.set(member, metric, Projection::from_cells(cells));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(daily: f64, weekly: f64, monthly: f64) -> Projection {
        Projection {
            daily,
            weekly,
            monthly,
        }
    }

    fn num_row(label: Option<&str>, values: &[f64]) -> Vec<Cell> {
        let mut row = vec![label.map(Cell::from).unwrap_or(Cell::Empty)];
        row.extend(values.iter().map(|v| Cell::Number(*v)));
        row
    }

    #[test]
    fn test_missing_entries_default_to_zero() {
        let table = TeamProjections::new();
        assert_eq!(table.get("chris", MetricKey::Outbound), Projection::default());
        assert!(table.for_scope(&Scope::parse("chris")).is_empty());
    }

    #[test]
    fn test_all_scope_is_sum_of_members() {
        let mut table = TeamProjections::new();
        table.set("chris", MetricKey::Outbound, p(10.0, 50.0, 200.0));
        table.set("israel", MetricKey::Outbound, p(5.0, 25.0, 100.0));
        table.set("israel", MetricKey::Closes, p(0.0, 1.0, 4.0));
        table.set("all", MetricKey::Outbound, p(999.0, 999.0, 999.0));

        let all = table.for_scope(&Scope::All);
        assert_eq!(all.get(MetricKey::Outbound), p(15.0, 75.0, 300.0));
        assert_eq!(all.get(MetricKey::Closes), p(0.0, 1.0, 4.0));
        assert_eq!(all.get(MetricKey::Revenue), Projection::default());
    }

    #[test]
    fn test_negative_targets_are_clamped() {
        let mut table = TeamProjections::new();
        table.set("chris", MetricKey::Outbound, p(-3.0, f64::NAN, 7.0));
        assert_eq!(table.get("CHRIS", MetricKey::Outbound), p(0.0, 0.0, 7.0));
    }

    #[test]
    fn test_from_sheet_rows_positional() {
        let rows = vec![
            num_row(None, &[10.0, 50.0, 200.0, 8.0, 40.0, 160.0, 6.0, 30.0, 120.0]),
            num_row(None, &[3.0, 15.0, 60.0]),
        ];
        let table = TeamProjections::from_sheet_rows(&rows, &["CHRIS", "ISRAEL", "IVETTE"]);
        assert_eq!(table.get("chris", MetricKey::Outbound), p(10.0, 50.0, 200.0));
        assert_eq!(table.get("ivette", MetricKey::Outbound), p(6.0, 30.0, 120.0));
        assert_eq!(table.get("chris", MetricKey::Triage), p(3.0, 15.0, 60.0));
        assert_eq!(table.get("israel", MetricKey::Triage), Projection::default());
    }

    #[test]
    fn test_from_sheet_rows_labels_win() {
        let rows = vec![
            num_row(Some("Revenue"), &[1000.0, 5000.0, 20000.0]),
            num_row(Some("Mystery"), &[1.0, 1.0, 1.0]),
            num_row(Some("follow ups"), &[2.0, 10.0, 40.0]),
        ];
        let table = TeamProjections::from_sheet_rows(&rows, &["chris"]);
        assert_eq!(table.get("chris", MetricKey::Revenue), p(1000.0, 5000.0, 20000.0));
        assert_eq!(table.get("chris", MetricKey::FollowUps), p(2.0, 10.0, 40.0));
        assert_eq!(table.get("chris", MetricKey::Triage), p(1.0, 1.0, 1.0));
        assert_eq!(table.get("chris", MetricKey::Outbound), Projection::default());
    }

    #[test]
    fn test_from_sheet_rows_unknown_label_read_by_position() {
        let rows = vec![
            num_row(Some("Outbound Calls"), &[10.0, 50.0, 200.0]),
            num_row(Some("Triage"), &[3.0, 15.0, 60.0]),
        ];
        let table = TeamProjections::from_sheet_rows(&rows, &["chris"]);
        assert_eq!(table.get("chris", MetricKey::Outbound), p(10.0, 50.0, 200.0));
        assert_eq!(table.get("chris", MetricKey::Triage), p(3.0, 15.0, 60.0));

        let beyond: Vec<Vec<Cell>> = (0..13)
            .map(|_| num_row(Some("Notes"), &[1.0, 1.0, 1.0]))
            .collect();
        let table = TeamProjections::from_sheet_rows(&beyond, &["chris"]);
        assert_eq!(table.get("chris", MetricKey::Responses), p(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_marketing_sheet_outbound_means_messages() {
        let rows = vec![
            num_row(Some("Outbound"), &[20.0, 100.0, 400.0]),
            num_row(Some("Posts"), &[1.0, 5.0, 20.0]),
        ];
        let table = TeamProjections::from_marketing_sheet_rows(&rows, &["chris"]);
        assert_eq!(
            table.get("chris", MetricKey::OutboundMessages),
            p(20.0, 100.0, 400.0)
        );
        assert_eq!(table.get("chris", MetricKey::Outbound), Projection::default());
        assert_eq!(table.get("chris", MetricKey::Posts), p(1.0, 5.0, 20.0));
    }

    #[test]
    fn test_merge_overlays() {
        let mut sales = TeamProjections::new();
        sales.set("chris", MetricKey::Outbound, p(10.0, 50.0, 200.0));
        sales.set("chris", MetricKey::Posts, p(1.0, 1.0, 1.0));
        let mut marketing = TeamProjections::new();
        marketing.set("chris", MetricKey::Posts, p(2.0, 10.0, 40.0));

        sales.merge(&marketing);
        assert_eq!(sales.get("chris", MetricKey::Outbound), p(10.0, 50.0, 200.0));
        assert_eq!(sales.get("chris", MetricKey::Posts), p(2.0, 10.0, 40.0));
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{"CHRIS": {"outbound": {"daily": 10, "weekly": 50, "monthly": 200}}}"#;
        let table: TeamProjections = serde_json::from_str(json).unwrap();
        assert_eq!(table.get("chris", MetricKey::Outbound), p(10.0, 50.0, 200.0));
        assert_eq!(table.members().collect::<Vec<_>>(), vec!["CHRIS"]);
    }

    #[test]
    fn test_from_json_accepts_rows_or_table() {
        let rows = r#"{"values": [["Outbound", 10, 50, 200]]}"#;
        let table = TeamProjections::from_json(rows, &["chris"], None).unwrap();
        assert_eq!(table.get("chris", MetricKey::Outbound), p(10.0, 50.0, 200.0));

        let marketing =
            TeamProjections::from_json(rows, &["chris"], Some(Domain::Marketing)).unwrap();
        assert_eq!(
            marketing.get("chris", MetricKey::OutboundMessages),
            p(10.0, 50.0, 200.0)
        );

        let keyed = r#"{"Israel": {"closes": {"weekly": 2}}}"#;
        let table = TeamProjections::from_json(keyed, &[], None).unwrap();
        assert_eq!(table.get("israel", MetricKey::Closes), p(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_canonical_orders() {
        assert_eq!(MetricKey::for_domain(Domain::Sales)[0], MetricKey::Outbound);
        assert_eq!(MetricKey::for_domain(Domain::Sales)[7], MetricKey::Revenue);
        assert_eq!(
            MetricKey::for_domain(Domain::Marketing),
            &[
                MetricKey::OutboundMessages,
                MetricKey::Responses,
                MetricKey::Posts,
                MetricKey::Leads
            ]
        );
        assert_eq!(
            MetricKey::SHEET_ORDER[8..],
            [
                MetricKey::Posts,
                MetricKey::Leads,
                MetricKey::OutboundMessages,
                MetricKey::Responses
            ]
        );
    }
}
