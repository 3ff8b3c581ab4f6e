//! Catalog file parsing.
//!
//! A catalog is a delimited text file with a header line. The delimiter is
//! sniffed from the header, header names are folded and mapped through a table
//! of aliases, and every data row is validated independently: a bad row is
//! reported and skipped, it never fails the whole file.

use crate::{
    core::product::{code_digits, code_problem, normalize_sku},
    errors::{Error, Result},
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Delimiters tried on the header line, in order of preference.
const DELIMITERS: [u8; 3] = [b';', b',', b'\t'];

/// Known catalog field a column can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogField {
    /// Stock keeping unit (required)
    Sku,
    /// Raw barcode or vendor code
    Ean,
    /// Display name
    Name,
    /// Top-level taxonomy group
    Group,
    /// Sub-group under `Group`
    SubGroup,
}

impl CatalogField {
    /// Field for a folded header name, if it is a known alias.
    #[must_use]
    pub fn from_header(folded: &str) -> Option<Self> {
        match folded {
            "sku" | "ref" | "reference" | "code" | "article" => Some(Self::Sku),
            "ean" | "ean13" | "barcode" | "code_barre" | "gtin" => Some(Self::Ean),
            "name" | "libelle" | "designation" | "description" | "label" => Some(Self::Name),
            "group" | "groupe" | "famille" | "category" => Some(Self::Group),
            "sub_group" | "subgroup" | "sous_groupe" | "sous_famille" | "subcategory" => {
                Some(Self::SubGroup)
            }
            _ => None,
        }
    }
}

/// Trims, lowercases and folds spaces and hyphens to `_`.
#[must_use]
pub fn fold_header(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// Picks the delimiter occurring most often in `header_line`; `,` if none does.
#[must_use]
pub fn sniff_delimiter(header_line: &str) -> u8 {
    let mut best = (b',', 0usize);
    for delimiter in DELIMITERS {
        let count = header_line.bytes().filter(|b| *b == delimiter).count();
        if count > best.1 {
            best = (delimiter, count);
        }
    }
    best.0
}

/// A valid data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    /// 1-based line in the file
    pub line: u64,
    /// SKU, trimmed
    pub sku: String,
    /// Raw code, trimmed, verbatim otherwise
    pub ean: Option<String>,
    /// Display name; the SKU when the file gives none
    pub name: String,
    /// Group name
    pub group: Option<String>,
    /// Sub-group name
    pub sub_group: Option<String>,
    /// Values of unmapped columns, by original header
    pub attributes: BTreeMap<String, String>,
}

/// A rejected data row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// 1-based line in the file
    pub line: u64,
    /// SKU of the row, when it had one
    pub sku: Option<String>,
    /// Why the row was rejected
    pub reason: String,
}

/// Outcome of parsing a catalog file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCatalog {
    /// Valid rows, in file order
    pub rows: Vec<CatalogRow>,
    /// Rejected rows, in file order
    pub errors: Vec<RowError>,
    /// Headers that map to no known field
    pub unmapped_columns: Vec<String>,
    /// Non-blank data rows seen
    pub total_rows: usize,
}

/// Column layout resolved from the header record.
struct Layout {
    fields: HashMap<CatalogField, usize>,
    attributes: Vec<(usize, String)>,
    width: usize,
}

impl Layout {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let mut fields = HashMap::new();
        let mut attributes = Vec::new();
        for (index, raw) in headers.iter().enumerate() {
            let name = raw.trim();
            if name.is_empty() {
                continue;
            }
            match CatalogField::from_header(&fold_header(name)) {
                Some(field) if !fields.contains_key(&field) => {
                    fields.insert(field, index);
                }
                _ => attributes.push((index, name.to_string())),
            }
        }
        if !fields.contains_key(&CatalogField::Sku) {
            return Err(Error::validation(
                "sku",
                "catalog has no SKU column (expected one of: sku, ref, reference, code, article)",
            ));
        }
        Ok(Self {
            fields,
            attributes,
            width: headers.len(),
        })
    }

    fn value<'r>(&self, record: &'r csv::StringRecord, field: CatalogField) -> Option<&'r str> {
        self.fields
            .get(&field)
            .and_then(|index| record.get(*index))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Parses a catalog file.
///
/// # Errors
/// - Validation (`file`): empty, not UTF-8, or not readable as delimited text
/// - Validation (`sku`): no SKU column
pub fn parse_catalog(content: &[u8], max_code_length: usize) -> Result<ParsedCatalog> {
    let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);
    let text = std::str::from_utf8(content)
        .map_err(|e| Error::validation("file", format!("catalog is not valid UTF-8: {e}")))?;
    let header_line = text.lines().next().unwrap_or_default();
    if header_line.trim().is_empty() {
        return Err(Error::validation("file", "catalog is empty"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(header_line))
        .flexible(true)
        .has_headers(true)
        .from_reader(text.as_bytes());
    let layout = Layout::from_headers(reader.headers().map_err(unreadable)?)?;

    let mut parsed = ParsedCatalog {
        unmapped_columns: layout.attributes.iter().map(|(_, name)| name.clone()).collect(),
        ..ParsedCatalog::default()
    };
    let mut first_seen: HashMap<String, u64> = HashMap::new();

    for record in reader.records() {
        let record = record.map_err(unreadable)?;
        if record.iter().all(|value| value.trim().is_empty()) {
            continue;
        }
        parsed.total_rows += 1;
        let line = record.position().map_or(0, csv::Position::line);

        match validate_row(&layout, &record, line, max_code_length, &mut first_seen) {
            Ok(row) => parsed.rows.push(row),
            Err(error) => parsed.errors.push(error),
        }
    }
    Ok(parsed)
}

/// Reader failures are reported against the uploaded file.
fn unreadable(error: csv::Error) -> Error {
    Error::validation("file", format!("catalog is not readable: {error}"))
}

fn validate_row(
    layout: &Layout,
    record: &csv::StringRecord,
    line: u64,
    max_code_length: usize,
    first_seen: &mut HashMap<String, u64>,
) -> std::result::Result<CatalogRow, RowError> {
    let sku = layout.value(record, CatalogField::Sku);
    let reject = |reason: String| RowError {
        line,
        sku: sku.map(ToString::to_string),
        reason,
    };

    if record.len() != layout.width {
        return Err(reject(format!(
            "expected {} columns, found {}",
            layout.width,
            record.len()
        )));
    }
    let Some(sku) = sku else {
        return Err(reject("SKU is empty".to_string()));
    };
    if let Some(problem) = code_problem(sku, max_code_length) {
        return Err(reject(format!("invalid SKU: {problem}")));
    }

    let ean = layout.value(record, CatalogField::Ean);
    if let Some(ean) = ean {
        if let Some(problem) = code_problem(ean, max_code_length) {
            return Err(reject(format!("invalid code: {problem}")));
        }
        if code_digits(ean).is_empty() {
            return Err(reject(format!("invalid code: {ean:?} has no digit")));
        }
    }

    if let Some(first) = first_seen.get(&normalize_sku(sku)) {
        return Err(reject(format!("duplicate SKU (first seen on line {first})")));
    }
    first_seen.insert(normalize_sku(sku), line);

    let attributes = layout
        .attributes
        .iter()
        .filter_map(|(index, header)| {
            record
                .get(*index)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(|value| (header.clone(), value.to_string()))
        })
        .collect();

    Ok(CatalogRow {
        line,
        sku: sku.to_string(),
        ean: ean.map(ToString::to_string),
        name: layout
            .value(record, CatalogField::Name)
            .unwrap_or(sku)
            .to_string(),
        group: layout.value(record, CatalogField::Group).map(ToString::to_string),
        sub_group: layout
            .value(record, CatalogField::SubGroup)
            .map(ToString::to_string),
        attributes,
    })
}
