pub mod cell;
pub mod schema;

pub use cell::Cell;
pub use schema::{ColumnMap, RowSchema};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::record::{normalize_member, ActivityRecord, Counter, XpWeights};

/// A row that was skipped during batch normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    /// Zero-based index into the input rows.
    pub row: usize,
    pub message: String,
}

/// Result of normalizing a batch: the good records plus the rows that were dropped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizedBatch {
    pub schema: Option<RowSchema>,
    pub records: Vec<ActivityRecord>,
    pub errors: Vec<RowError>,
}

/// Converts raw sheet rows into [`ActivityRecord`]s.
///
/// Without an explicit schema, the layout is detected once per batch from the
/// first non-blank row.
#[derive(Debug, Clone, Default)]
pub struct RowNormalizer {
    schema: Option<RowSchema>,
    default_member: String,
    xp_weights: XpWeights,
}

impl RowNormalizer {
    pub fn new(default_member: &str) -> Self {
        Self {
            default_member: normalize_member(default_member),
            ..Default::default()
        }
    }

    pub fn with_schema(mut self, schema: RowSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_xp_weights(mut self, weights: XpWeights) -> Self {
        self.xp_weights = weights;
        self
    }

    /// Normalize one row. Only an unusable date is an error.
    pub fn normalize(&self, row: &[Cell]) -> Result<ActivityRecord> {
        let schema = self.schema.unwrap_or_else(|| RowSchema::detect(row));
        normalize_row(row, 0, schema, &self.default_member, &self.xp_weights)
    }

    /// Normalize every row, skipping blank rows and a leading header.
    /// Rows with bad dates are reported in `errors`; they never abort the batch.
    pub fn normalize_batch(&self, rows: &[Vec<Cell>]) -> NormalizedBatch {
        let first = rows.iter().position(|r| !is_blank_row(r));
        let Some(first) = first else {
            return NormalizedBatch {
                schema: self.schema,
                ..Default::default()
            };
        };

        let header = RowSchema::from_header(&rows[first]);
        let schema = self
            .schema
            .or(header)
            .unwrap_or_else(|| RowSchema::detect(&rows[first]));
        let skip_until = if header.is_some() { first + 1 } else { first };

        let mut batch = NormalizedBatch {
            schema: Some(schema),
            ..Default::default()
        };
        for (idx, row) in rows.iter().enumerate().skip(skip_until) {
            if is_blank_row(row) {
                continue;
            }
            match normalize_row(row, idx, schema, &self.default_member, &self.xp_weights) {
                Ok(record) => batch.records.push(record),
                Err(e) => {
                    log::warn!("Skipping row {idx}: {e}");
                    batch.errors.push(RowError {
                        row: idx,
                        message: e.to_string(),
                    });
                }
            }
        }
        log::debug!(
            "Normalized {} rows as {:?}: {} records, {} dropped",
            rows.len(),
            schema,
            batch.records.len(),
            batch.errors.len()
        );
        batch
    }
}

/// Normalize one row against an explicit layout.
pub fn normalize(row: &[Cell], schema: RowSchema, default_member: &str) -> Result<ActivityRecord> {
    normalize_row(
        row,
        0,
        schema,
        &normalize_member(default_member),
        &XpWeights::default(),
    )
}

fn normalize_row(
    row: &[Cell],
    index: usize,
    schema: RowSchema,
    default_member: &str,
    weights: &XpWeights,
) -> Result<ActivityRecord> {
    let columns = schema.columns();

    let date = row
        .get(columns.date)
        .unwrap_or(&Cell::Empty)
        .as_date()
        .map_err(|e| Error::Normalization {
            row: index,
            message: e.to_string(),
        })?;

    let member = columns
        .member
        .and_then(|col| row.get(col))
        .and_then(Cell::as_text)
        .unwrap_or(default_member);

    let mut record = ActivityRecord::new(date, member);
    for &(counter, col) in columns.counters {
        let cell = row.get(col).unwrap_or(&Cell::Empty);
        set_counter(&mut record, counter, cell);
    }
    if !columns.has_xp() {
        record.recompute_xp(weights);
    }
    Ok(record)
}

fn set_counter(record: &mut ActivityRecord, counter: Counter, cell: &Cell) {
    match counter {
        Counter::Outbound => record.outbound = cell.as_count(),
        Counter::Triage => record.triage = cell.as_count(),
        Counter::FollowUps => record.follow_ups = cell.as_count(),
        Counter::Appointments => record.appointments = cell.as_count(),
        Counter::Shows => record.shows = cell.as_count(),
        Counter::ContractsSigned => record.contracts_signed = cell.as_count(),
        Counter::Closes => record.closes = cell.as_count(),
        Counter::Revenue => record.revenue = cell.as_amount(),
        Counter::OutboundMessages => record.outbound_messages = cell.as_count(),
        Counter::PositiveResponses => record.positive_responses = cell.as_count(),
        Counter::PostsCreated => record.posts_created = cell.as_count(),
        Counter::LeadsGenerated => record.leads_generated = cell.as_count(),
        Counter::SalesXp => record.sales_xp = cell.as_amount(),
        Counter::MarketingXp => record.marketing_xp = cell.as_amount(),
    }
}

fn is_blank_row(row: &[Cell]) -> bool {
    row.iter().all(Cell::is_blank)
}
