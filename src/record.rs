use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which half of the dashboard a computation belongs to. Sales and marketing
/// keep separate XP pools and separate metric lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Sales,
    Marketing,
}

impl Domain {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "sales" => Some(Domain::Sales),
            "marketing" => Some(Domain::Marketing),
            _ => None,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Sales => write!(f, "sales"),
            Domain::Marketing => write!(f, "marketing"),
        }
    }
}

/// Which records an aggregation includes. Serialized as `"ALL"` or the member key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Scope {
    All,
    Member(String),
}

impl Scope {
    /// `ALL` (any case) or empty means the whole team; anything else is a member key.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            Scope::All
        } else {
            Scope::Member(normalize_member(s))
        }
    }

    pub fn includes(&self, member: &str) -> bool {
        match self {
            Scope::All => true,
            Scope::Member(key) => key.eq_ignore_ascii_case(member.trim()),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Scope::All => "ALL",
            Scope::Member(key) => key,
        }
    }
}

impl From<String> for Scope {
    fn from(s: String) -> Self {
        Scope::parse(&s)
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.key().to_string()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Canonical member key: trimmed and upper-cased, so "Chris" and "CHRIS " agree.
pub fn normalize_member(s: &str) -> String {
    s.trim().to_uppercase()
}

/// A single numeric field of an [`ActivityRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    Outbound,
    Triage,
    FollowUps,
    Appointments,
    Shows,
    ContractsSigned,
    Closes,
    Revenue,
    OutboundMessages,
    PositiveResponses,
    PostsCreated,
    LeadsGenerated,
    SalesXp,
    MarketingXp,
}

/// One team member's normalized activity for one calendar day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub date: NaiveDate,
    pub team_member: String,

    pub outbound: u64,
    pub triage: u64,
    pub follow_ups: u64,
    pub appointments: u64,
    pub shows: u64,
    pub contracts_signed: u64,
    pub closes: u64,
    pub revenue: f64,

    pub outbound_messages: u64,
    pub positive_responses: u64,
    pub posts_created: u64,
    pub leads_generated: u64,

    pub sales_xp: f64,
    pub marketing_xp: f64,
}

impl ActivityRecord {
    pub fn new(date: NaiveDate, team_member: &str) -> Self {
        Self {
            date,
            team_member: normalize_member(team_member),
            ..Default::default()
        }
    }

    pub fn get(&self, counter: Counter) -> f64 {
        match counter {
            Counter::Outbound => self.outbound as f64,
            Counter::Triage => self.triage as f64,
            Counter::FollowUps => self.follow_ups as f64,
            Counter::Appointments => self.appointments as f64,
            Counter::Shows => self.shows as f64,
            Counter::ContractsSigned => self.contracts_signed as f64,
            Counter::Closes => self.closes as f64,
            Counter::Revenue => self.revenue,
            Counter::OutboundMessages => self.outbound_messages as f64,
            Counter::PositiveResponses => self.positive_responses as f64,
            Counter::PostsCreated => self.posts_created as f64,
            Counter::LeadsGenerated => self.leads_generated as f64,
            Counter::SalesXp => self.sales_xp,
            Counter::MarketingXp => self.marketing_xp,
        }
    }

    pub fn xp(&self, domain: Domain) -> f64 {
        match domain {
            Domain::Sales => self.sales_xp,
            Domain::Marketing => self.marketing_xp,
        }
    }

    /// Add another record's counters into this one. Date and member are left alone.
    pub fn absorb(&mut self, other: &ActivityRecord) {
        self.outbound = self.outbound.saturating_add(other.outbound);
        self.triage = self.triage.saturating_add(other.triage);
        self.follow_ups = self.follow_ups.saturating_add(other.follow_ups);
        self.appointments = self.appointments.saturating_add(other.appointments);
        self.shows = self.shows.saturating_add(other.shows);
        self.contracts_signed = self.contracts_signed.saturating_add(other.contracts_signed);
        self.closes = self.closes.saturating_add(other.closes);
        self.revenue += other.revenue;
        self.outbound_messages = self.outbound_messages.saturating_add(other.outbound_messages);
        self.positive_responses = self.positive_responses.saturating_add(other.positive_responses);
        self.posts_created = self.posts_created.saturating_add(other.posts_created);
        self.leads_generated = self.leads_generated.saturating_add(other.leads_generated);
        self.sales_xp += other.sales_xp;
        self.marketing_xp += other.marketing_xp;
    }

    /// Replace both XP fields with values derived from the counters.
    pub fn recompute_xp(&mut self, weights: &XpWeights) {
        self.sales_xp = weights.sales_xp(self);
        self.marketing_xp = weights.marketing_xp(self);
    }
}

/// Points awarded per counted activity when a sheet layout carries no XP column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct XpWeights {
    pub outbound: f64,
    pub triage: f64,
    pub appointments: f64,
    pub shows: f64,
    pub closes: f64,
    pub positive_responses: f64,
    pub posts_created: f64,
    pub leads_generated: f64,
}

impl Default for XpWeights {
    fn default() -> Self {
        Self {
            outbound: 1.0,
            triage: 0.0,
            appointments: 10.0,
            shows: 25.0,
            closes: 50.0,
            positive_responses: 1.0,
            posts_created: 5.0,
            leads_generated: 25.0,
        }
    }
}

impl XpWeights {
    pub fn sales_xp(&self, r: &ActivityRecord) -> f64 {
        r.outbound as f64 * self.outbound
            + r.triage as f64 * self.triage
            + r.appointments as f64 * self.appointments
            + r.shows as f64 * self.shows
            + r.closes as f64 * self.closes
    }

    pub fn marketing_xp(&self, r: &ActivityRecord) -> f64 {
        r.positive_responses as f64 * self.positive_responses
            + r.posts_created as f64 * self.posts_created
            + r.leads_generated as f64 * self.leads_generated
    }
}

/// Merge records that share a member and date by summing their counters.
///
/// Output is ordered by (date, member) ascending.
pub fn consolidate(records: &[ActivityRecord]) -> Vec<ActivityRecord> {
    let mut merged: BTreeMap<(NaiveDate, String), ActivityRecord> = BTreeMap::new();
    for r in records {
        let key = (r.date, normalize_member(&r.team_member));
        match merged.get_mut(&key) {
            Some(existing) => {
                log::debug!("Summing duplicate record for {} on {}", key.1, key.0);
                existing.absorb(r);
            }
            None => {
                let mut first = r.clone();
                first.team_member = key.1.clone();
                merged.insert(key, first);
            }
        }
    }
    merged.into_values().collect()
}

/// Collapse records to one per date, summing every member. The member key
/// becomes the scope key.
pub fn daily_totals(records: &[ActivityRecord], scope: &Scope) -> Vec<ActivityRecord> {
    let mut by_date: BTreeMap<NaiveDate, ActivityRecord> = BTreeMap::new();
    for r in records.iter().filter(|r| scope.includes(&r.team_member)) {
        by_date
            .entry(r.date)
            .or_insert_with(|| ActivityRecord::new(r.date, scope.key()))
            .absorb(r);
    }
    by_date.into_values().collect()
}
