//! Series records and their flattening into observation rows.

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::page::DatasetDescriptor;
use crate::table::ObservationRow;

const CODE_FIELDS: [&str; 2] = ["series_code", "code"];

/// One series as returned by the Web API.
///
/// Array-valued fields are the parallel per-period axes (`period`, `value`,
/// per-period attributes). Every other field is scalar metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRecord {
    code: String,
    fields: Map<String, Value>,
}

impl SeriesRecord {
    /// Decodes one entry of a page's `docs`.
    pub fn from_value(value: Value) -> Result<Self> {
        let fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Err(Error::MalformedSeries {
                    code: "(unknown)".to_string(),
                    reason: format!("expected a JSON object, got {other}"),
                });
            }
        };

        let code = CODE_FIELDS
            .iter()
            .find_map(|k| fields.get(*k).and_then(Value::as_str))
            .map(str::to_string)
            .ok_or_else(|| Error::MalformedSeries {
                code: "(unknown)".to_string(),
                reason: "missing series_code".to_string(),
            })?;

        Ok(Self { code, fields })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Length of the period axis, `None` when the record has no array field.
    pub fn period_len(&self) -> Result<Option<usize>> {
        let mut common: Option<(&str, usize)> = None;
        for (name, value) in &self.fields {
            let Value::Array(items) = value else {
                continue;
            };
            match common {
                None => common = Some((name.as_str(), items.len())),
                Some((first, len)) if len != items.len() => {
                    return Err(Error::MalformedSeries {
                        code: self.code.clone(),
                        reason: format!(
                            "field {name:?} has {} elements but {first:?} has {len}",
                            items.len()
                        ),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(common.map(|(_, len)| len))
    }

    /// One row per period: scalars carried forward, arrays indexed, then
    /// `dataset_code` and a non-empty `dataset_name`.
    pub fn flatten(&self, dataset: Option<&DatasetDescriptor>) -> Result<Vec<ObservationRow>> {
        let Some(len) = self.period_len()? else {
            return Ok(Vec::new());
        };

        let mut rows = Vec::with_capacity(len);
        for i in 0..len {
            let mut row = Map::with_capacity(self.fields.len() + 2);
            for (name, value) in &self.fields {
                let cell = match value {
                    Value::Array(items) => items[i].clone(),
                    scalar => scalar.clone(),
                };
                row.insert(name.clone(), cell);
            }
            if let Some(dataset) = dataset {
                row.insert(
                    "dataset_code".to_string(),
                    Value::String(dataset.code.clone()),
                );
                if let Some(name) = dataset.display_name() {
                    row.insert("dataset_name".to_string(), Value::String(name.to_string()));
                }
            }
            rows.push(ObservationRow::from_map(row));
        }
        Ok(rows)
    }
}
