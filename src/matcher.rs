use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use tracing::{info, warn};

use crate::importer::parse_amount;
use crate::models::{Cell, InvalidReason, InvalidRecord, ParsedRow, ReversalPair, TransactionRecord};

/// Result of cancelling reversal pairs over already-validated records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Netting {
    /// Records that take part in no pair, in input order.
    pub surviving: Vec<TransactionRecord>,
    /// Matched pairs, in the input order of their negative member.
    pub cancelled: Vec<ReversalPair>,
}

/// Three-way partition of the input rows: every row lands in exactly one list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchOutcome {
    pub surviving: Vec<TransactionRecord>,
    pub cancelled: Vec<ReversalPair>,
    pub invalid: Vec<InvalidRecord>,
    /// Sum of every valid amount, taken before netting.
    pub valid_total: f64,
}

impl MatchOutcome {
    pub fn cancelled_records(&self) -> usize {
        self.cancelled.len() * 2
    }

    pub fn accounted_rows(&self) -> usize {
        self.surviving.len() + self.cancelled_records() + self.invalid.len()
    }
}

fn amount_from_cell(cell: &Cell) -> Result<f64, InvalidReason> {
    let value = match cell {
        Cell::Empty => return Err(InvalidReason::Empty),
        Cell::Number(n) => *n,
        Cell::Text(s) if s.trim().is_empty() => return Err(InvalidReason::Empty),
        Cell::Text(s) => parse_amount(s).ok_or(InvalidReason::NotANumber)?,
        Cell::Bool(_) => return Err(InvalidReason::NotANumber),
    };
    if value.is_finite() {
        Ok(value)
    } else {
        Err(InvalidReason::NotFinite)
    }
}

/// Split rows into records with a usable amount and rows to report as invalid.
pub fn validate_rows(rows: Vec<ParsedRow>) -> (Vec<TransactionRecord>, Vec<InvalidRecord>) {
    let mut records = Vec::with_capacity(rows.len());
    let mut invalid = Vec::new();

    for row in rows {
        match amount_from_cell(&row.amount) {
            Ok(amount) => records.push(TransactionRecord {
                row: row.row,
                salesperson: row.salesperson.as_key(),
                amount,
                client_id: row.client_id.as_key(),
                product: row.product.as_ref().filter(|p| !p.is_empty()).map(Cell::as_key),
                fields: row.fields,
            }),
            Err(reason) => {
                warn!(row = row.row, value = %row.amount, %reason, "skipping invalid record");
                invalid.push(InvalidRecord {
                    row: row.row,
                    value: row.amount.to_string(),
                    reason,
                });
            }
        }
    }
    (records, invalid)
}

/// Cancel each negative record against the earliest unused positive record
/// of the same client whose amount is its exact inverse.
///
/// Candidates are taken in input order regardless of whether they appear
/// before or after the negative record. Each record joins at most one pair.
/// A negative record without a counterpart survives unchanged, as do zero
/// amounts and records with a blank client id, which never equal anything.
pub fn net_reversals(records: Vec<TransactionRecord>) -> Netting {
    // (client, amount bits) -> indices of unused positive records, FIFO.
    let mut candidates: HashMap<(&str, u64), VecDeque<usize>> = HashMap::new();
    for (idx, record) in records.iter().enumerate() {
        if record.amount > 0.0 && !record.client_id.is_empty() {
            candidates
                .entry((record.client_id.as_str(), record.amount.to_bits()))
                .or_default()
                .push_back(idx);
        }
    }

    let mut consumed = vec![false; records.len()];
    let mut pairs: Vec<(usize, usize)> = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        if record.amount.is_nan() || record.amount >= 0.0 || record.client_id.is_empty() {
            continue;
        }
        let key = (record.client_id.as_str(), (-record.amount).to_bits());
        if let Some(positive) = candidates.get_mut(&key).and_then(VecDeque::pop_front) {
            consumed[idx] = true;
            consumed[positive] = true;
            pairs.push((idx, positive));
        }
    }
    drop(candidates);

    let mut slots: Vec<Option<TransactionRecord>> = records.into_iter().map(Some).collect();
    let cancelled = pairs
        .into_iter()
        .filter_map(|(negative, positive)| {
            Some(ReversalPair {
                negative: slots[negative].take()?,
                positive: slots[positive].take()?,
            })
        })
        .collect();
    let surviving = slots
        .into_iter()
        .zip(consumed)
        .filter_map(|(slot, used)| if used { None } else { slot })
        .collect();

    Netting { surviving, cancelled }
}

/// Validate amounts and cancel reversal pairs in one pass over the input.
pub fn match_reversals(rows: Vec<ParsedRow>) -> MatchOutcome {
    let total = rows.len();
    let (records, invalid) = validate_rows(rows);
    let valid_total = records.iter().map(|r| r.amount).sum();
    let Netting { surviving, cancelled } = net_reversals(records);
    info!(
        rows = total,
        surviving = surviving.len(),
        pairs = cancelled.len(),
        invalid = invalid.len(),
        "reversal matching complete"
    );
    MatchOutcome {
        surviving,
        cancelled,
        invalid,
        valid_total,
    }
}
