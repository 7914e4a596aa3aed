use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TallyError};
use crate::models::{CommissionSummary, TransactionRecord};

pub const DEFAULT_UNASSIGNED_LABEL: &str = "(unassigned)";

/// A commission rate, stored as a percentage in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Rate(f64);

impl Rate {
    pub fn from_percent(percent: f64) -> Result<Self> {
        if percent.is_finite() && (0.0..=100.0).contains(&percent) {
            Ok(Self(percent))
        } else {
            Err(TallyError::InvalidRate(percent))
        }
    }

    pub fn percent(self) -> f64 {
        self.0
    }

    pub fn fraction(self) -> f64 {
        self.0 / 100.0
    }
}

impl TryFrom<f64> for Rate {
    type Error = TallyError;

    fn try_from(percent: f64) -> Result<Self> {
        Self::from_percent(percent)
    }
}

impl From<Rate> for f64 {
    fn from(rate: Rate) -> f64 {
        rate.percent()
    }
}

/// How the rate for one salesperson is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RatePolicy {
    /// Same rate for everyone.
    Flat { percent: Rate },
    /// `below` for fewer than `min_invoices` surviving invoices, otherwise
    /// `at_or_above`.
    Tiered {
        min_invoices: usize,
        below: Rate,
        at_or_above: Rate,
    },
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self::Tiered {
            min_invoices: 3,
            below: Rate(0.5),
            at_or_above: Rate(1.0),
        }
    }
}

impl RatePolicy {
    pub fn flat(percent: f64) -> Result<Self> {
        Ok(Self::Flat {
            percent: Rate::from_percent(percent)?,
        })
    }

    pub fn rate_for(&self, invoice_count: usize) -> Rate {
        match *self {
            Self::Flat { percent } => percent,
            Self::Tiered {
                min_invoices,
                below,
                at_or_above,
            } => {
                if invoice_count < min_invoices {
                    below
                } else {
                    at_or_above
                }
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Flat { percent } => format!("flat {}%", percent.percent()),
            Self::Tiered {
                min_invoices,
                below,
                at_or_above,
            } => format!(
                "{}% below {min_invoices} invoices, {}% from {min_invoices}",
                below.percent(),
                at_or_above.percent()
            ),
        }
    }
}

#[derive(Default)]
struct Group<'a> {
    total_sales: f64,
    invoice_count: usize,
    clients: HashSet<&'a str>,
}

/// Summarize surviving records per salesperson.
///
/// Records with a blank salesperson are grouped under `unassigned_label`.
/// Every group gets a commission, including groups with a zero or negative
/// total. Rows are ordered by descending total sales, then salesperson name.
pub fn aggregate(
    surviving: &[TransactionRecord],
    policy: &RatePolicy,
    unassigned_label: &str,
) -> Vec<CommissionSummary> {
    let mut groups: BTreeMap<&str, Group> = BTreeMap::new();
    for record in surviving {
        let name = match record.salesperson.trim() {
            "" => unassigned_label,
            name => name,
        };
        let group = groups.entry(name).or_default();
        group.total_sales += record.amount;
        group.invoice_count += 1;
        if !record.client_id.is_empty() {
            group.clients.insert(record.client_id.as_str());
        }
    }

    let mut summaries: Vec<CommissionSummary> = groups
        .into_iter()
        .map(|(name, group)| {
            let rate = policy.rate_for(group.invoice_count);
            CommissionSummary {
                salesperson: name.to_string(),
                total_sales: group.total_sales,
                invoice_count: group.invoice_count,
                unique_clients: group.clients.len(),
                rate: rate.fraction(),
                commission: group.total_sales * rate.fraction(),
            }
        })
        .collect();
    summaries.sort_by(|a, b| {
        b.total_sales
            .total_cmp(&a.total_sales)
            .then_with(|| a.salesperson.cmp(&b.salesperson))
    });
    summaries
}

/// One summary table per non-empty product value, in product order.
pub fn aggregate_by_product(
    surviving: &[TransactionRecord],
    policy: &RatePolicy,
    unassigned_label: &str,
) -> BTreeMap<String, Vec<CommissionSummary>> {
    let mut by_product: BTreeMap<&str, Vec<TransactionRecord>> = BTreeMap::new();
    for record in surviving {
        if let Some(product) = record.product.as_deref().filter(|p| !p.is_empty()) {
            by_product.entry(product).or_default().push(record.clone());
        }
    }
    by_product
        .into_iter()
        .map(|(product, records)| {
            (product.to_string(), aggregate(&records, policy, unassigned_label))
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommissionTotals {
    pub salespeople: usize,
    pub total_sales: f64,
    pub total_commission: f64,
    pub average_commission: f64,
}

impl CommissionTotals {
    pub fn from_summaries(summaries: &[CommissionSummary]) -> Self {
        let total_sales = summaries.iter().map(|s| s.total_sales).sum();
        let total_commission: f64 = summaries.iter().map(|s| s.commission).sum();
        let average_commission = if summaries.is_empty() {
            0.0
        } else {
            total_commission / summaries.len() as f64
        };
        Self {
            salespeople: summaries.len(),
            total_sales,
            total_commission,
            average_commission,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(salesperson: &str, amount: f64, client: &str) -> TransactionRecord {
        TransactionRecord {
            row: 0,
            salesperson: salesperson.to_string(),
            amount,
            client_id: client.to_string(),
            product: None,
            fields: Vec::new(),
        }
    }

    fn with_product(mut r: TransactionRecord, product: &str) -> TransactionRecord {
        r.product = Some(product.to_string());
        r
    }

    fn flat(percent: f64) -> RatePolicy {
        RatePolicy::flat(percent).unwrap()
    }

    #[test]
    fn test_rate_bounds() {
        assert!(Rate::from_percent(0.0).is_ok());
        assert!(Rate::from_percent(100.0).is_ok());
        assert!(Rate::from_percent(-0.1).is_err());
        assert!(Rate::from_percent(100.5).is_err());
        assert!(Rate::from_percent(f64::NAN).is_err());
        assert_eq!(Rate::from_percent(1.0).unwrap().fraction(), 0.01);
    }

    #[test]
    fn test_single_salesperson_totals() {
        let summaries = aggregate(&[record("A", 50.0, "C2")], &flat(10.0), DEFAULT_UNASSIGNED_LABEL);
        assert_eq!(summaries.len(), 1);
        let a = &summaries[0];
        assert_eq!(a.salesperson, "A");
        assert_eq!(a.total_sales, 50.0);
        assert_eq!(a.invoice_count, 1);
        assert_eq!(a.unique_clients, 1);
        assert_eq!(a.commission, 5.0);
    }

    #[test]
    fn test_unique_clients_counts_distinct_ids() {
        let summaries = aggregate(
            &[record("A", 10.0, "C1"), record("A", 20.0, "C1"), record("A", 30.0, "C2")],
            &flat(1.0),
            DEFAULT_UNASSIGNED_LABEL,
        );
        assert_eq!(summaries[0].invoice_count, 3);
        assert_eq!(summaries[0].unique_clients, 2);
        assert_eq!(summaries[0].total_sales, 60.0);
    }

    #[test]
    fn test_blank_client_ids_are_not_counted_as_clients() {
        let summaries = aggregate(
            &[record("A", 10.0, ""), record("A", 20.0, ""), record("A", 30.0, "C2")],
            &flat(1.0),
            DEFAULT_UNASSIGNED_LABEL,
        );
        assert_eq!(summaries[0].invoice_count, 3);
        assert_eq!(summaries[0].unique_clients, 1);
    }

    #[test]
    fn test_negative_total_still_gets_commission() {
        let summaries = aggregate(&[record("B", -30.0, "C3")], &flat(10.0), DEFAULT_UNASSIGNED_LABEL);
        assert_eq!(summaries[0].total_sales, -30.0);
        assert_eq!(summaries[0].commission, -3.0);
    }

    #[test]
    fn test_zero_rate_yields_zero_commission() {
        let summaries = aggregate(&[record("A", 500.0, "C1")], &flat(0.0), DEFAULT_UNASSIGNED_LABEL);
        assert_eq!(summaries[0].commission, 0.0);
        assert_eq!(summaries[0].rate, 0.0);
    }

    #[test]
    fn test_blank_salesperson_uses_sentinel() {
        let summaries = aggregate(
            &[record("", 10.0, "C1"), record("  ", 5.0, "C2")],
            &flat(1.0),
            "(sin asesor)",
        );
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].salesperson, "(sin asesor)");
        assert_eq!(summaries[0].invoice_count, 2);
    }

    #[test]
    fn test_order_by_total_then_name() {
        let summaries = aggregate(
            &[
                record("Carla", 100.0, "C1"),
                record("Beto", 300.0, "C2"),
                record("Ana", 100.0, "C3"),
                record("Dario", -20.0, "C4"),
            ],
            &flat(1.0),
            DEFAULT_UNASSIGNED_LABEL,
        );
        let names: Vec<&str> = summaries.iter().map(|s| s.salesperson.as_str()).collect();
        assert_eq!(names, vec!["Beto", "Ana", "Carla", "Dario"]);
    }

    #[test]
    fn test_empty_input_is_empty_table() {
        assert!(aggregate(&[], &flat(1.0), DEFAULT_UNASSIGNED_LABEL).is_empty());
        let totals = CommissionTotals::from_summaries(&[]);
        assert_eq!(totals, CommissionTotals::default());
    }

    #[test]
    fn test_tiered_policy_by_invoice_count() {
        let records = vec![
            record("A", 100.0, "C1"),
            record("A", 100.0, "C2"),
            record("A", 100.0, "C3"),
            record("B", 400.0, "C4"),
        ];
        let summaries = aggregate(&records, &RatePolicy::default(), DEFAULT_UNASSIGNED_LABEL);
        let a = summaries.iter().find(|s| s.salesperson == "A").unwrap();
        let b = summaries.iter().find(|s| s.salesperson == "B").unwrap();
        assert_eq!(a.rate, 0.01);
        assert_eq!(a.commission, 3.0);
        assert_eq!(b.rate, 0.005);
        assert_eq!(b.commission, 2.0);
    }

    #[test]
    fn test_by_product_breakdown() {
        let records = vec![
            with_product(record("A", 100.0, "C1"), "Seguro"),
            with_product(record("B", 40.0, "C2"), "Credito"),
            with_product(record("A", 60.0, "C3"), "Credito"),
            record("A", 999.0, "C4"),
        ];
        let by_product = aggregate_by_product(&records, &flat(1.0), DEFAULT_UNASSIGNED_LABEL);
        let keys: Vec<&String> = by_product.keys().collect();
        assert_eq!(keys, vec!["Credito", "Seguro"]);
        let credito = &by_product["Credito"];
        assert_eq!(credito.len(), 2);
        assert_eq!(credito[0].salesperson, "A");
        assert_eq!(credito[0].total_sales, 60.0);
        assert_eq!(by_product["Seguro"][0].total_sales, 100.0);
    }

    #[test]
    fn test_totals() {
        let summaries = aggregate(
            &[record("A", 200.0, "C1"), record("B", 100.0, "C2")],
            &flat(10.0),
            DEFAULT_UNASSIGNED_LABEL,
        );
        let totals = CommissionTotals::from_summaries(&summaries);
        assert_eq!(totals.salespeople, 2);
        assert_eq!(totals.total_sales, 300.0);
        assert_eq!(totals.total_commission, 30.0);
        assert_eq!(totals.average_commission, 15.0);
    }

    #[test]
    fn test_policy_serde_roundtrip_validates_rate() {
        let json = r#"{"kind":"flat","percent":2.5}"#;
        let policy: RatePolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.rate_for(1).percent(), 2.5);
        let bad = r#"{"kind":"flat","percent":250}"#;
        assert!(serde_json::from_str::<RatePolicy>(bad).is_err());
    }
}
