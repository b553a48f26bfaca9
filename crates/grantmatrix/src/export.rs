//! Tabular export of the budget matrix.
//!
//! [`build_table`] lays the matrix out as a 2-D string table with German row
//! labels, the shape EU applicants paste into their proposal spreadsheets.
//! The table renders as tab-separated text for the clipboard
//! ([`BudgetTable::to_tsv`]) or as semicolon-delimited CSV with a UTF-8
//! byte-order mark ([`BudgetTable::to_csv`]), which spreadsheet programs in
//! EU locales open without an import dialog.

use crate::category::CostCategory;
use crate::error::{BudgetError, Result};
use crate::model::{ActionType, Amount, BudgetState};
use crate::query::{
    get_category_row_total, get_grand_total, get_partner_grand_total, get_wp_partner_total,
    get_wp_total,
};
use chrono::NaiveDate;
use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};

const BOM: char = '\u{FEFF}';
const CSV_DELIMITER: u8 = b';';
const TSV_DELIMITER: u8 = b'\t';

/// Label of the grand-total row.
pub const GRAND_TOTAL_LABEL: &str = "GESAMTBUDGET";
/// Label of the budget-tier row.
pub const TIER_LABEL: &str = "Budget-Stufe";

/// Rectangular table of strings. The first row is the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetTable {
    rows: Vec<Vec<String>>,
}

/// Build the export table.
///
/// Layout: header `Work Package | Kostenkategorie | <partners…> | TOTAL`;
/// per work package one row per category, a `WP<n> Gesamt` subtotal row and
/// a blank separator row; then the grand-total row and the tier row.
pub fn build_table(state: &BudgetState) -> BudgetTable {
    let partners = &state.partners;
    let cells = &state.cells;

    let mut header = vec!["Work Package".to_string(), "Kostenkategorie".to_string()];
    header.extend(partners.iter().map(|p| p.name.clone()));
    header.push("TOTAL".to_string());
    let width = header.len();

    let mut rows = vec![header];
    for wp in &state.work_packages {
        for category in CostCategory::ALL {
            let mut row = vec![
                format!("WP{}: {}", wp.number, wp.title_de),
                category.label_de().to_string(),
            ];
            row.extend(
                partners
                    .iter()
                    .map(|p| cells.get(&wp.id, &p.id, category).to_string()),
            );
            row.push(get_category_row_total(cells, partners, &wp.id, category).to_string());
            rows.push(row);
        }

        let mut subtotal = vec![format!("WP{} Gesamt", wp.number), String::new()];
        subtotal.extend(
            partners
                .iter()
                .map(|p| get_wp_partner_total(cells, &wp.id, &p.id).to_string()),
        );
        subtotal.push(get_wp_total(cells, partners, &wp.id).to_string());
        rows.push(subtotal);

        rows.push(vec![String::new(); width]);
    }

    let mut grand = vec![GRAND_TOTAL_LABEL.to_string(), String::new()];
    grand.extend(
        partners
            .iter()
            .map(|p| get_partner_grand_total(cells, &state.work_packages, &p.id).to_string()),
    );
    grand.push(get_grand_total(cells, partners, &state.work_packages).to_string());
    rows.push(grand);

    let mut tier = vec![TIER_LABEL.to_string(), String::new()];
    tier.extend(partners.iter().map(|_| String::new()));
    tier.push(state.budget_tier.to_string());
    rows.push(tier);

    BudgetTable { rows }
}

impl BudgetTable {
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn header(&self) -> &[String] {
        self.rows.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Partner column names, i.e. the header minus the two label columns and
    /// the trailing total.
    pub fn partner_names(&self) -> &[String] {
        let header = self.header();
        if header.len() < 3 {
            return &[];
        }
        &header[2..header.len() - 1]
    }

    /// Per-partner totals and the grand total read back from the
    /// `GESAMTBUDGET` row. `None` if the row is missing or not numeric.
    pub fn grand_totals(&self) -> Option<(Vec<Amount>, Amount)> {
        let row = self
            .rows
            .iter()
            .find(|r| r.first().map(String::as_str) == Some(GRAND_TOTAL_LABEL))?;
        let (last, values) = row.get(2..)?.split_last()?;
        let partners = values
            .iter()
            .map(|v| v.trim().parse::<Amount>().ok())
            .collect::<Option<Vec<_>>>()?;
        Some((partners, last.trim().parse().ok()?))
    }

    /// Tab-separated rows, one per line. A field containing a tab, quote or
    /// line break is quoted so it stays in its column.
    pub fn to_tsv(&self) -> Result<String> {
        self.write_delimited(TSV_DELIMITER)
    }

    /// Semicolon-delimited CSV prefixed with a UTF-8 BOM. Fields are quoted
    /// only when they contain the delimiter, a quote or a line break.
    pub fn to_csv(&self) -> Result<String> {
        let body = self.write_delimited(CSV_DELIMITER)?;
        Ok(format!("{BOM}{body}"))
    }

    fn write_delimited(&self, delimiter: u8) -> Result<String> {
        let mut writer = WriterBuilder::new()
            .delimiter(delimiter)
            .quote_style(QuoteStyle::Necessary)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        for row in &self.rows {
            writer.write_record(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| BudgetError::Io(std::io::Error::new(e.error().kind(), e.to_string())))?;
        String::from_utf8(bytes)
            .map_err(|e| BudgetError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    /// Parse CSV produced by [`to_csv`](Self::to_csv). A leading BOM is
    /// ignored.
    pub fn from_csv(input: &str) -> Result<Self> {
        let input = input.strip_prefix(BOM).unwrap_or(input);
        let mut reader = ReaderBuilder::new()
            .delimiter(CSV_DELIMITER)
            .has_headers(false)
            .flexible(true)
            .from_reader(input.as_bytes());
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { rows })
    }
}

/// Download name for a CSV export, e.g. `budget_KA220_2025-03-14.csv`.
pub fn export_file_name(action_type: ActionType, date: NaiveDate) -> String {
    format!("budget_{}_{}.csv", action_type, date.format("%Y-%m-%d"))
}
