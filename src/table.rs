use serde::Serialize;
use serde_json::{Map, Value};
use std::ops::Deref;

/// One (series × period) data point: field name → scalar, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ObservationRow(Map<String, Value>);

impl ObservationRow {
    pub(crate) fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// String value of `field`, if it is a JSON string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

/// Rows of a download, in series-arrival order then period order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SeriesTable {
    rows: Vec<ObservationRow>,
}

impl SeriesTable {
    pub(crate) fn new(rows: Vec<ObservationRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[ObservationRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<ObservationRow> {
        self.rows
    }

    /// Union of the field names of all rows, in first-seen order.
    pub fn columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        for row in &self.rows {
            for (name, _) in row.fields() {
                if !columns.contains(&name) {
                    columns.push(name);
                }
            }
        }
        columns
    }

    /// Distinct series codes, in first-seen order.
    pub fn series_codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = Vec::new();
        for row in &self.rows {
            let code = row.get_str("series_code").or_else(|| row.get_str("code"));
            if let Some(code) = code {
                if !codes.contains(&code) {
                    codes.push(code);
                }
            }
        }
        codes
    }
}

impl Deref for SeriesTable {
    type Target = [ObservationRow];

    fn deref(&self) -> &Self::Target {
        &self.rows
    }
}

impl IntoIterator for SeriesTable {
    type Item = ObservationRow;
    type IntoIter = std::vec::IntoIter<ObservationRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a SeriesTable {
    type Item = &'a ObservationRow;
    type IntoIter = std::slice::Iter<'a, ObservationRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
