use std::borrow::Cow;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{Result, TallyError};
use crate::models::{Cell, ParsedRow};
use crate::settings::ColumnMap;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse an amount as written in a spreadsheet export. Accepts thousands
/// separators, a leading `$`, and accounting-style `(123.45)` negatives.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw.replace(',', "").replace('"', "").replace('$', "");
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return inner.trim().parse::<f64>().ok().map(|v| -v);
    }
    s.parse().ok()
}

fn text_cell(raw: &str) -> Cell {
    if raw.trim().is_empty() {
        Cell::Empty
    } else {
        Cell::Text(raw.to_string())
    }
}

// ---------------------------------------------------------------------------
// Sheet
// ---------------------------------------------------------------------------

/// A rectangular table as read from disk: one header row plus data rows.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceKind {
    Csv,
    #[cfg(feature = "xlsx")]
    Xlsx,
}

impl SourceKind {
    pub fn detect(file_path: &Path) -> Result<Self> {
        let ext = file_path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" | "txt" => Ok(Self::Csv),
            #[cfg(feature = "xlsx")]
            "xlsx" | "xlsm" | "xls" | "ods" => Ok(Self::Xlsx),
            _ => Err(TallyError::UnsupportedFormat(file_path.display().to_string())),
        }
    }
}

pub fn read_sheet(file_path: &Path, sheet_name: Option<&str>) -> Result<Sheet> {
    let kind = SourceKind::detect(file_path)?;
    debug!(path = %file_path.display(), ?kind, "reading sheet");
    let sheet = match kind {
        SourceKind::Csv => read_csv(file_path)?,
        #[cfg(feature = "xlsx")]
        SourceKind::Xlsx => read_xlsx(file_path, sheet_name)?,
    };
    #[cfg(not(feature = "xlsx"))]
    let _ = sheet_name;
    debug!(columns = sheet.headers.len(), rows = sheet.rows.len(), "sheet loaded");
    Ok(sheet)
}

fn read_csv(file_path: &Path) -> Result<Sheet> {
    let file = std::fs::File::open(file_path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));
    let mut sheet = Sheet::default();
    let mut found_header = false;

    // Legacy exports are often Windows-1252; undecodable bytes become U+FFFD
    // instead of failing the whole file.
    for result in rdr.byte_records() {
        let record = result?;
        let fields: Vec<Cow<str>> = record.iter().map(String::from_utf8_lossy).collect();
        if fields.iter().any(|f| matches!(f, Cow::Owned(_))) {
            warn!(
                line = ?record.position().map(|p| p.line()),
                "replaced invalid UTF-8 in record"
            );
        }
        if fields.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        if !found_header {
            sheet.headers = fields
                .iter()
                .map(|f| f.trim_start_matches('\u{feff}').trim().to_string())
                .collect();
            found_header = true;
            continue;
        }
        sheet.rows.push(fields.iter().map(|f| text_cell(f)).collect());
    }
    Ok(sheet)
}

#[cfg(feature = "xlsx")]
fn read_xlsx(file_path: &Path, sheet_name: Option<&str>) -> Result<Sheet> {
    use calamine::{Data, Reader};

    let mut workbook = calamine::open_workbook_auto(file_path)?;
    let range = match sheet_name {
        Some(name) => {
            if !workbook.sheet_names().iter().any(|n| n == name) {
                return Err(TallyError::SheetNotFound(name.to_string()));
            }
            workbook.worksheet_range(name)?
        }
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| TallyError::SheetNotFound("(first sheet)".to_string()))??,
    };

    let mut rows = range.rows().skip_while(|r| r.iter().all(|c| matches!(c, Data::Empty)));
    let Some(header) = rows.next() else {
        return Ok(Sheet::default());
    };
    let headers = header.iter().map(|c| c.to_string().trim().to_string()).collect();

    let mut sheet = Sheet {
        headers,
        rows: Vec::new(),
    };
    for row in rows {
        if row.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        let cells = row
            .iter()
            .map(|c| match c {
                Data::Empty => Cell::Empty,
                Data::Float(f) => Cell::Number(*f),
                Data::Int(i) => Cell::Number(*i as f64),
                Data::Bool(b) => Cell::Bool(*b),
                Data::String(s) => text_cell(s),
                other => text_cell(&other.to_string()),
            })
            .collect();
        sheet.rows.push(cells);
    }
    Ok(sheet)
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

struct ColumnIndex {
    salesperson: usize,
    amount: usize,
    client_id: usize,
    product: Option<usize>,
}

fn column_index(headers: &[String], columns: &ColumnMap) -> Result<ColumnIndex> {
    let find = |name: &str| headers.iter().position(|h| h == name);
    let missing: Vec<String> = columns
        .required()
        .into_iter()
        .filter(|name| find(name).is_none())
        .map(|name| name.to_string())
        .collect();

    match (find(&columns.salesperson), find(&columns.amount), find(&columns.client_id)) {
        (Some(salesperson), Some(amount), Some(client_id)) => Ok(ColumnIndex {
            salesperson,
            amount,
            client_id,
            product: find(&columns.product),
        }),
        _ => Err(TallyError::MissingColumns {
            missing,
            available: headers.to_vec(),
        }),
    }
}

impl Sheet {
    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    /// Map every data row onto the configured columns. Fails before any row
    /// is produced when a required column is absent from the header.
    pub fn into_rows(self, columns: &ColumnMap) -> Result<Vec<ParsedRow>> {
        let idx = column_index(&self.headers, columns)?;
        let headers = self.headers;
        let cell_at = |cells: &[Cell], i: usize| cells.get(i).cloned().unwrap_or(Cell::Empty);

        let rows = self
            .rows
            .into_iter()
            .enumerate()
            .map(|(i, cells)| ParsedRow {
                // header is row 1
                row: i + 2,
                salesperson: cell_at(&cells, idx.salesperson),
                amount: cell_at(&cells, idx.amount),
                client_id: cell_at(&cells, idx.client_id),
                product: idx.product.map(|p| cell_at(&cells, p)),
                fields: headers
                    .iter()
                    .enumerate()
                    .map(|(c, h)| (h.clone(), cell_at(&cells, c)))
                    .collect(),
            })
            .collect();
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Product filter
// ---------------------------------------------------------------------------

pub struct FilterResult {
    pub rows: Vec<ParsedRow>,
    pub excluded: usize,
}

/// Keep rows whose product is one of `products`. An empty selection keeps
/// everything. A non-empty selection needs `product_column`, whether the
/// source header has the product column, even when there are no data rows.
pub fn filter_products(
    rows: Vec<ParsedRow>,
    product_column: bool,
    products: &[String],
) -> Result<FilterResult> {
    if products.is_empty() {
        return Ok(FilterResult { rows, excluded: 0 });
    }
    if !product_column {
        return Err(TallyError::Other(
            "--product requires a product column in the input file".to_string(),
        ));
    }
    let before = rows.len();
    let rows: Vec<ParsedRow> = rows
        .into_iter()
        .filter(|r| {
            r.product
                .as_ref()
                .is_some_and(|p| products.iter().any(|want| *want == p.as_key()))
        })
        .collect();
    let excluded = before - rows.len();
    debug!(kept = rows.len(), excluded, "product filter applied");
    Ok(FilterResult { rows, excluded })
}

/// Distinct non-empty product values in sorted order.
pub fn product_values(rows: &[ParsedRow]) -> Vec<String> {
    let set: std::collections::BTreeSet<String> = rows
        .iter()
        .filter_map(|r| r.product.as_ref())
        .filter(|p| !p.is_empty())
        .map(Cell::as_key)
        .collect();
    set.into_iter().collect()
}
