use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::commission::{aggregate, aggregate_by_product, CommissionTotals, RatePolicy};
use crate::error::Result;
use crate::importer::filter_products;
use crate::matcher::{match_reversals, MatchOutcome};
use crate::models::{CommissionSummary, ParsedRow};

pub struct RunOptions {
    pub policy: RatePolicy,
    pub unassigned_label: String,
    /// Whether the source header has the product column.
    pub product_column: bool,
    /// Empty means every product.
    pub products: Vec<String>,
}

/// Everything one run produces. Every input row is counted exactly once in
/// `filtered_out`, `outcome.surviving`, `outcome.cancelled` or `outcome.invalid`.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub input_rows: usize,
    pub filtered_out: usize,
    /// Sum of every valid amount before netting.
    pub gross_sales: f64,
    /// Sum of surviving amounts. Equals `gross_sales` up to rounding, since
    /// every cancelled pair sums to zero.
    pub net_sales: f64,
    pub outcome: MatchOutcome,
    pub summaries: Vec<CommissionSummary>,
    pub by_product: BTreeMap<String, Vec<CommissionSummary>>,
    pub totals: CommissionTotals,
}

impl RunReport {
    pub fn accounted_rows(&self) -> usize {
        self.filtered_out + self.outcome.accounted_rows()
    }
}

pub fn run(rows: Vec<ParsedRow>, opts: &RunOptions) -> Result<RunReport> {
    let input_rows = rows.len();
    let filtered = filter_products(rows, opts.product_column, &opts.products)?;

    let outcome = match_reversals(filtered.rows);
    let gross_sales = outcome.valid_total;
    let net_sales: f64 = outcome.surviving.iter().map(|r| r.amount).sum();

    let summaries = aggregate(&outcome.surviving, &opts.policy, &opts.unassigned_label);
    let by_product = if opts.product_column {
        aggregate_by_product(&outcome.surviving, &opts.policy, &opts.unassigned_label)
    } else {
        BTreeMap::new()
    };
    let totals = CommissionTotals::from_summaries(&summaries);

    let report = RunReport {
        input_rows,
        filtered_out: filtered.excluded,
        gross_sales,
        net_sales,
        outcome,
        summaries,
        by_product,
        totals,
    };
    debug!(
        input_rows,
        accounted = report.accounted_rows(),
        drift = gross_sales - net_sales,
        "run complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commission::DEFAULT_UNASSIGNED_LABEL;
    use crate::models::Cell;

    fn row(n: usize, salesperson: &str, amount: Cell, client: &str) -> ParsedRow {
        ParsedRow {
            row: n,
            salesperson: Cell::Text(salesperson.to_string()),
            amount,
            client_id: Cell::Text(client.to_string()),
            product: None,
            fields: Vec::new(),
        }
    }

    fn opts(percent: f64) -> RunOptions {
        RunOptions {
            policy: RatePolicy::flat(percent).unwrap(),
            unassigned_label: DEFAULT_UNASSIGNED_LABEL.to_string(),
            product_column: false,
            products: Vec::new(),
        }
    }

    #[test]
    fn test_reversal_pair_is_netted_before_commission() {
        let report = run(
            vec![
                row(2, "A", Cell::Number(100.0), "C1"),
                row(3, "A", Cell::Number(-100.0), "C1"),
                row(4, "A", Cell::Number(50.0), "C2"),
            ],
            &opts(10.0),
        )
        .unwrap();
        assert_eq!(report.outcome.cancelled.len(), 1);
        assert_eq!(report.summaries.len(), 1);
        let a = &report.summaries[0];
        assert_eq!((a.total_sales, a.invoice_count, a.unique_clients), (50.0, 1, 1));
        assert_eq!(a.commission, 5.0);
        assert_eq!(report.gross_sales, 50.0);
        assert_eq!(report.net_sales, 50.0);
    }

    #[test]
    fn test_lone_credit_survives_as_negative_total() {
        let report = run(vec![row(2, "B", Cell::Number(-30.0), "C3")], &opts(1.0)).unwrap();
        let b = &report.summaries[0];
        assert_eq!((b.total_sales, b.invoice_count, b.unique_clients), (-30.0, 1, 1));
    }

    #[test]
    fn test_duplicate_invoice_leaves_one_survivor() {
        let report = run(
            vec![
                row(2, "A", Cell::Number(100.0), "C1"),
                row(3, "A", Cell::Number(100.0), "C1"),
                row(4, "A", Cell::Number(-100.0), "C1"),
            ],
            &opts(1.0),
        )
        .unwrap();
        assert_eq!(report.outcome.surviving.len(), 1);
        assert_eq!(report.outcome.surviving[0].row, 3);
        let a = &report.summaries[0];
        assert_eq!((a.total_sales, a.invoice_count, a.unique_clients), (100.0, 1, 1));
    }

    #[test]
    fn test_invalid_amount_is_accounted_for() {
        let report = run(
            vec![
                row(2, "A", Cell::Text("pendiente".into()), "C1"),
                row(3, "A", Cell::Number(20.0), "C1"),
            ],
            &opts(1.0),
        )
        .unwrap();
        assert_eq!(report.outcome.invalid.len(), 1);
        assert_eq!(report.outcome.invalid[0].row, 2);
        assert_eq!(report.summaries[0].total_sales, 20.0);
        assert_eq!(report.accounted_rows(), report.input_rows);
    }

    #[test]
    fn test_gross_sales_sums_valid_amounts_before_netting() {
        let report = run(
            vec![
                row(2, "A", Cell::Number(250.0), "C1"),
                row(3, "B", Cell::Number(-250.0), "C1"),
                row(4, "A", Cell::Number(40.5), "C2"),
                row(5, "B", Cell::Text("x".into()), "C2"),
                row(6, "B", Cell::Number(-10.25), "C9"),
            ],
            &opts(1.0),
        )
        .unwrap();
        assert_eq!(report.outcome.cancelled.len(), 1);
        assert_eq!(report.gross_sales, 250.0 - 250.0 + 40.5 - 10.25);
        assert_eq!(report.net_sales, 40.5 - 10.25);
        assert_eq!(report.gross_sales, report.net_sales);
    }

    #[test]
    fn test_product_filter_without_product_column_fails() {
        let mut options = opts(1.0);
        options.products = vec!["Seguro".to_string()];
        assert!(run(Vec::new(), &options).is_err());
    }

    #[test]
    fn test_empty_input_is_not_an_error() {
        let report = run(Vec::new(), &opts(1.0)).unwrap();
        assert!(report.summaries.is_empty());
        assert!(report.by_product.is_empty());
        assert_eq!(report.totals.salespeople, 0);
    }

    #[test]
    fn test_product_filter_and_breakdown() {
        let mut rows = vec![
            row(2, "A", Cell::Number(100.0), "C1"),
            row(3, "A", Cell::Number(40.0), "C2"),
            row(4, "B", Cell::Number(70.0), "C3"),
        ];
        for (r, p) in rows.iter_mut().zip(["Seguro", "Credito", "Seguro"]) {
            r.product = Some(Cell::Text(p.to_string()));
        }
        let mut options = opts(1.0);
        options.product_column = true;
        options.products = vec!["Seguro".to_string()];
        let report = run(rows, &options).unwrap();
        assert_eq!(report.filtered_out, 1);
        assert_eq!(report.net_sales, 170.0);
        assert_eq!(report.by_product.len(), 1);
        assert_eq!(report.by_product["Seguro"].len(), 2);
        assert_eq!(report.accounted_rows(), 3);
    }
}
