use serde::{Deserialize, Serialize};

use super::cell::Cell;
use crate::record::Counter;

/// Positional layout of one historical sheet version.
#[derive(Debug)]
pub struct ColumnMap {
    pub date: usize,
    /// Column holding the member name, for layouts that mix members in one tab.
    pub member: Option<usize>,
    pub counters: &'static [(Counter, usize)],
}

impl ColumnMap {
    /// Whether the layout carries its own XP figures.
    pub fn has_xp(&self) -> bool {
        self.counters
            .iter()
            .any(|(c, _)| matches!(c, Counter::SalesXp | Counter::MarketingXp))
    }
}

/// Per-member analysis tab (`<Name> Analysis!A2:X`). Columns between the
/// counters hold sheet-computed rates, which are recomputed downstream.
static ANALYSIS: ColumnMap = ColumnMap {
    date: 0,
    member: None,
    counters: &[
        (Counter::Outbound, 1),
        (Counter::Triage, 2),
        (Counter::FollowUps, 4),
        (Counter::Appointments, 5),
        (Counter::Shows, 7),
        (Counter::ContractsSigned, 9),
        (Counter::Closes, 11),
        (Counter::Revenue, 13),
        (Counter::OutboundMessages, 15),
        (Counter::PositiveResponses, 16),
        (Counter::PostsCreated, 18),
        (Counter::LeadsGenerated, 19),
        (Counter::MarketingXp, 21),
        (Counter::SalesXp, 22),
    ],
};

/// Original single-sheet layout (`Analysis!A2:O`): no follow-ups, no contracts,
/// no marketing columns, outbound recorded as "dials".
static LEGACY_ANALYSIS: ColumnMap = ColumnMap {
    date: 0,
    member: None,
    counters: &[
        (Counter::Outbound, 1),
        (Counter::Triage, 2),
        (Counter::Appointments, 4),
        (Counter::Shows, 6),
        (Counter::Closes, 8),
        (Counter::Revenue, 10),
        (Counter::SalesXp, 13),
    ],
};

/// Form-response log (`Raw Data!A2:S`): timestamp, member, date, then counters.
static RAW_DATA: ColumnMap = ColumnMap {
    date: 2,
    member: Some(1),
    counters: &[
        (Counter::Outbound, 3),
        (Counter::Triage, 4),
        (Counter::FollowUps, 5),
        (Counter::Appointments, 6),
        (Counter::Shows, 7),
        (Counter::ContractsSigned, 8),
        (Counter::Closes, 9),
        (Counter::Revenue, 10),
        (Counter::PostsCreated, 11),
        (Counter::LeadsGenerated, 12),
        (Counter::OutboundMessages, 13),
        (Counter::PositiveResponses, 14),
    ],
};

/// Widest row the legacy layout ever produced.
const LEGACY_WIDTH: usize = 15;

/// A known sheet layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowSchema {
    Analysis,
    LegacyAnalysis,
    RawData,
}

impl RowSchema {
    pub fn columns(&self) -> &'static ColumnMap {
        match self {
            RowSchema::Analysis => &ANALYSIS,
            RowSchema::LegacyAnalysis => &LEGACY_ANALYSIS,
            RowSchema::RawData => &RAW_DATA,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "analysis" => Some(RowSchema::Analysis),
            "legacy" | "legacy_analysis" => Some(RowSchema::LegacyAnalysis),
            "raw" | "raw_data" => Some(RowSchema::RawData),
            _ => None,
        }
    }

    /// Recognize a header row by the optional columns it names.
    pub fn from_header(row: &[Cell]) -> Option<Self> {
        let names: Vec<String> = row
            .iter()
            .filter_map(Cell::as_text)
            .map(header_key)
            .collect();
        let starts_with_date = names.first().map(String::as_str) == Some("date");
        if starts_with_date || names.iter().any(|n| n == "timestamp") {
            if names.iter().any(|n| n == "teammember") {
                return Some(RowSchema::RawData);
            }
            if names.iter().any(|n| n == "followups") {
                return Some(RowSchema::Analysis);
            }
            if names.iter().any(|n| n == "dials") {
                return Some(RowSchema::LegacyAnalysis);
            }
            return Some(if row.len() > LEGACY_WIDTH {
                RowSchema::Analysis
            } else {
                RowSchema::LegacyAnalysis
            });
        }
        None
    }

    /// Pick a layout from a header row if there is one, otherwise from the
    /// shape of a data row. The sheet API drops trailing empty cells, so width
    /// alone only separates "wider than legacy" from "not".
    pub fn detect(row: &[Cell]) -> Self {
        if let Some(schema) = Self::from_header(row) {
            return schema;
        }
        let member_then_date = row
            .get(1)
            .and_then(Cell::as_text)
            .is_some_and(|s| s.parse::<f64>().is_err())
            && row.get(2).is_some_and(|c| c.as_date().is_ok());
        if member_then_date {
            RowSchema::RawData
        } else if row.len() > LEGACY_WIDTH {
            RowSchema::Analysis
        } else {
            RowSchema::LegacyAnalysis
        }
    }
}

fn header_key(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}
