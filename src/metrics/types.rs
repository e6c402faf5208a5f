use serde::{Deserialize, Serialize};

use crate::record::{ActivityRecord, Counter, Domain, Scope};

/// Summed counters for a set of records. Only these are ever added across
/// scopes; rates are always recomputed from them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CounterTotals {
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

impl CounterTotals {
    pub fn add_record(&mut self, r: &ActivityRecord) {
        self.outbound = self.outbound.saturating_add(r.outbound);
        self.triage = self.triage.saturating_add(r.triage);
        self.follow_ups = self.follow_ups.saturating_add(r.follow_ups);
        self.appointments = self.appointments.saturating_add(r.appointments);
        self.shows = self.shows.saturating_add(r.shows);
        self.contracts_signed = self.contracts_signed.saturating_add(r.contracts_signed);
        self.closes = self.closes.saturating_add(r.closes);
        self.revenue += r.revenue;
        self.outbound_messages = self.outbound_messages.saturating_add(r.outbound_messages);
        self.positive_responses = self.positive_responses.saturating_add(r.positive_responses);
        self.posts_created = self.posts_created.saturating_add(r.posts_created);
        self.leads_generated = self.leads_generated.saturating_add(r.leads_generated);
        self.sales_xp += r.sales_xp;
        self.marketing_xp += r.marketing_xp;
    }

    pub fn merge(&mut self, other: &CounterTotals) {
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

    pub fn xp(&self, domain: Domain) -> f64 {
        match domain {
            Domain::Sales => self.sales_xp,
            Domain::Marketing => self.marketing_xp,
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
}

/// Derived rates. Percentages are 0-100 scale but not clamped; the two
/// per-unit ratios are plain quotients. Full precision, never NaN.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Rates {
    /// positive responses / outbound messages, percent
    pub response_rate: f64,
    /// triage / outbound, percent
    pub conversion_rate: f64,
    /// appointments / triage, percent
    pub set_rate: f64,
    /// shows / appointments, percent
    pub show_rate: f64,
    /// contracts signed / shows, percent
    pub contract_rate: f64,
    /// closes / contracts signed (or shows), percent
    pub close_rate: f64,
    pub revenue_per_close: f64,
    pub leads_per_post: f64,
}

/// Denominator used for the close rate. Sheet revisions disagree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseRateBasis {
    #[default]
    Contracts,
    Shows,
}

/// Where a snapshot's XP sits on the level ladder.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LevelProgress {
    pub level: u32,
    pub xp_into_level: f64,
    pub xp_for_next_level: f64,
    pub level_progress_pct: f64,
    /// Progress toward the configured milestone, capped at 100.
    pub milestone_pct: f64,
}

/// Knobs that vary between dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AggregateOptions {
    pub close_rate_basis: CloseRateBasis,
    /// XP per level.
    pub level_step_xp: f64,
    /// XP of the headline milestone (level 25 on the dashboard).
    pub milestone_xp: f64,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            close_rate_basis: CloseRateBasis::Contracts,
            level_step_xp: 2000.0,
            milestone_xp: 50_000.0,
        }
    }
}

/// Aggregated totals and rates for one scope over one set of records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSnapshot {
    pub scope: Scope,
    pub domain: Domain,
    pub record_count: usize,
    /// Distinct dates with at least one record.
    pub day_count: usize,
    pub totals: CounterTotals,
    pub rates: Rates,
    /// XP pool of `domain` only.
    pub total_xp: f64,
    pub level: u32,
    pub progress: LevelProgress,
}
