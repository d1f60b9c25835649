//! Match instrument compound names to molecular formulas through a CSV export.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use lipidsort_shared::{LipidSortError, Result};
use tracing::{debug, warn};

const FORMULA_COLUMN: &str = "Formula";
const NAME_COLUMN: &str = "Name";

/// Formulas found for a list of unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormulaMatches {
    /// Distinct formulas, first-seen order.
    pub formulas: Vec<String>,
    /// Formulas shared by more than one distinct compound name.
    pub duplicates: Vec<(String, Vec<String>)>,
    /// Unique names no CSV row mentions.
    pub unmatched: Vec<String>,
}

/// Match `unique` names against the CSV file at `csv_path`.
pub fn match_formulas(unique: &[String], csv_path: &Path) -> Result<FormulaMatches> {
    let file = std::fs::File::open(csv_path).map_err(|e| LipidSortError::io(csv_path, e))?;
    match_formulas_from_reader(unique, file)
}

/// Match `unique` names against CSV data.
///
/// A row matches a name when any of its fields equals the name. Each match
/// contributes the row's `Formula` value, remembered with the row's `Name`.
pub fn match_formulas_from_reader<R: Read>(unique: &[String], reader: R) -> Result<FormulaMatches> {
    let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = csv
        .headers()
        .map_err(|e| LipidSortError::parse(format!("unreadable CSV header: {e}")))?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| LipidSortError::parse(format!("CSV has no '{name}' column")))
    };
    let formula_col = column(FORMULA_COLUMN)?;
    let name_col = column(NAME_COLUMN)?;

    let rows = csv
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| LipidSortError::parse(format!("malformed CSV row: {e}")))?;
    debug!(rows = rows.len(), "loaded compound table");

    let mut formulas: Vec<String> = Vec::new();
    let mut names_by_formula: HashMap<String, Vec<String>> = HashMap::new();
    let mut unmatched = Vec::new();

    for wanted in unique.iter().map(|u| u.trim()).filter(|u| !u.is_empty()) {
        let mut hit = false;

        for row in rows.iter().filter(|r| r.iter().any(|f| f.trim() == wanted)) {
            let (Some(formula), Some(name)) = (row.get(formula_col), row.get(name_col)) else {
                continue;
            };
            let formula = formula.trim();
            if formula.is_empty() {
                continue;
            }
            hit = true;

            let names = names_by_formula.entry(formula.to_string()).or_insert_with(|| {
                formulas.push(formula.to_string());
                Vec::new()
            });
            let name = name.trim().to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }

        if !hit {
            unmatched.push(wanted.to_string());
        }
    }

    let duplicates: Vec<(String, Vec<String>)> = formulas
        .iter()
        .filter_map(|f| {
            let names = names_by_formula.get(f)?;
            (names.len() > 1).then(|| (f.clone(), names.clone()))
        })
        .collect();

    for (formula, names) in &duplicates {
        warn!(%formula, names = %names.join(", "), "formula found in multiple compounds");
    }

    Ok(FormulaMatches {
        formulas,
        duplicates,
        unmatched,
    })
}
