//! Composite identity key over a persisted row.

use crate::pipeline::mapping::LienField;

/// Persisted row: one string cell per canonical column.
pub type Row = Vec<String>;

/// One component of a dedup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPart {
    Column(usize),
    /// First of these columns whose cell is non-blank.
    FirstNonEmpty(Vec<usize>),
}

/// `_`-joined, trimmed, upper-cased key parts. Missing columns read as "".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupeKey {
    parts: Vec<KeyPart>,
}

impl Default for DedupeKey {
    fn default() -> Self {
        Self::standard()
    }
}

impl DedupeKey {
    /// site_id, amount, and last name (company name for business rows).
    pub fn standard() -> Self {
        Self {
            parts: vec![
                KeyPart::Column(LienField::SiteId.index()),
                KeyPart::Column(LienField::Amount.index()),
                KeyPart::FirstNonEmpty(vec![
                    LienField::LastName.index(),
                    LienField::Company.index(),
                ]),
            ],
        }
    }

    /// Plain column key, e.g. `DedupeKey::columns(&[0, 2, 9])`.
    pub fn columns(columns: &[usize]) -> Self {
        Self {
            parts: columns.iter().map(|c| KeyPart::Column(*c)).collect(),
        }
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    pub fn key_for(&self, row: &[String]) -> String {
        self.parts
            .iter()
            .map(|part| match part {
                KeyPart::Column(index) => normalize_cell(row.get(*index)),
                KeyPart::FirstNonEmpty(indexes) => indexes
                    .iter()
                    .map(|i| normalize_cell(row.get(*i)))
                    .find(|cell| !cell.is_empty())
                    .unwrap_or_default(),
            })
            .collect::<Vec<_>>()
            .join("_")
    }
}

fn normalize_cell(cell: Option<&String>) -> String {
    cell.map(|c| c.trim().to_uppercase()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn personal(site: &str, amount: &str, last: &str) -> Row {
        let mut r = vec![String::new(); 14];
        r[0] = site.into();
        r[2] = amount.into();
        r[9] = last.into();
        r
    }

    #[test]
    fn key_ignores_case_and_padding() {
        let key = DedupeKey::standard();
        let a = personal("12", "18313668", "Pacquiao");
        let b = personal(" 12 ", "18313668  ", "  PACQUIAO");
        assert_eq!(key.key_for(&a), key.key_for(&b));
        assert_eq!(key.key_for(&a), "12_18313668_PACQUIAO");
    }

    #[test]
    fn business_rows_key_on_company() {
        let key = DedupeKey::standard();
        let mut r = personal("10", "25000", "");
        r[7] = "Acme Construction Inc".into();
        assert_eq!(key.key_for(&r), "10_25000_ACME CONSTRUCTION INC");
    }

    #[test]
    fn short_rows_read_missing_as_blank() {
        let key = DedupeKey::columns(&[0, 2, 9]);
        assert_eq!(key.key_for(&row(&["12", "x", "500"])), "12_500_");
    }

    #[test]
    fn key_is_deterministic() {
        let key = DedupeKey::default();
        let r = personal("20", "1000", "Smith");
        assert_eq!(key.key_for(&r), key.key_for(&r.clone()));
    }
}
