//! The pagination-and-assembly loop.
//!
//! Pages are requested strictly in order: the offset of a page is the number
//! of distinct series collected from all previous pages.

use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::{Error, Result, Violation};
use crate::page::{DatasetDescriptor, PageEnvelope};
use crate::series::SeriesRecord;
use crate::table::SeriesTable;

/// Download policy shared by every `fetch_all` call of a client.
#[derive(Debug, Clone)]
pub(crate) struct Aggregator {
    pub(crate) default_max_results: usize,
    pub(crate) progress: bool,
}

/// State owned by one download.
#[derive(Debug, Default)]
struct Accumulator {
    records: Vec<SeriesRecord>,
    seen: HashSet<String>,
    num_found: Option<u64>,
    dataset: Option<Option<DatasetDescriptor>>,
}

impl Accumulator {
    fn nb_series(&self) -> u64 {
        self.seen.len() as u64
    }

    /// Records `num_found` and the dataset on the first page, compares afterwards.
    fn pin(&mut self, page: &PageEnvelope) -> Result<()> {
        let num_found = page.series.num_found;
        match self.num_found {
            None => self.num_found = Some(num_found),
            Some(first) if first != num_found => {
                return Err(Violation::InconsistentPagination {
                    field: "num_found",
                    first: first.to_string(),
                    current: num_found.to_string(),
                }
                .into());
            }
            Some(_) => {}
        }

        let Some(first) = &self.dataset else {
            self.dataset = Some(page.dataset.clone());
            return Ok(());
        };

        let first_code = first.as_ref().map(|d| d.code.as_str());
        let code = page.dataset.as_ref().map(|d| d.code.as_str());
        if first_code != code {
            return Err(Violation::InconsistentPagination {
                field: "dataset code",
                first: describe(first_code),
                current: describe(code),
            }
            .into());
        }
        let first_name = first.as_ref().and_then(|d| d.name.as_deref());
        let name = page.dataset.as_ref().and_then(|d| d.name.as_deref());
        if first_name != name {
            return Err(Violation::InconsistentPagination {
                field: "dataset name",
                first: describe(first_name),
                current: describe(name),
            }
            .into());
        }
        Ok(())
    }

    /// Appends the page's records. Every record is kept, only codes are deduplicated.
    fn extend(&mut self, docs: Vec<Value>) -> Result<()> {
        self.records.reserve(docs.len());
        for doc in docs {
            let record = SeriesRecord::from_value(doc)?;
            if !self.seen.insert(record.code().to_string()) {
                warn!(
                    series_code = record.code(),
                    "series code already received on an earlier page"
                );
            }
            self.records.push(record);
        }
        Ok(())
    }

    /// Keeps the records of the first `max` distinct codes, in arrival order.
    fn truncate(&mut self, max: usize) {
        let mut kept: HashSet<String> = HashSet::with_capacity(max);
        self.records.retain(|record| {
            if kept.contains(record.code()) {
                return true;
            }
            if kept.len() < max {
                kept.insert(record.code().to_string());
                return true;
            }
            false
        });
        self.seen = kept;
    }
}

fn describe(value: Option<&str>) -> String {
    value.map_or_else(|| "(none)".to_string(), |v| format!("{v:?}"))
}

impl Aggregator {
    /// Runs the loop with `fetch_page(offset)` until the cap is reached or
    /// the result set is exhausted, then flattens every record into rows.
    pub(crate) fn run<F>(&self, max_results: Option<usize>, fetch_page: F) -> Result<SeriesTable>
    where
        F: FnMut(u64) -> Result<PageEnvelope>,
    {
        if max_results == Some(0) {
            return Err(Error::invalid_argument("max_results must be at least 1"));
        }

        let mut progress: Option<ProgressBar> = None;
        let collected = self.collect(max_results, fetch_page, &mut progress);
        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
        let acc = collected?;

        let dataset = acc.dataset.flatten();
        let mut rows = Vec::new();
        for record in &acc.records {
            rows.extend(record.flatten(dataset.as_ref())?);
        }
        debug!(
            series = acc.seen.len(),
            records = acc.records.len(),
            rows = rows.len(),
            "download complete"
        );
        Ok(SeriesTable::new(rows))
    }

    fn collect<F>(
        &self,
        max_results: Option<usize>,
        mut fetch_page: F,
        progress: &mut Option<ProgressBar>,
    ) -> Result<Accumulator>
    where
        F: FnMut(u64) -> Result<PageEnvelope>,
    {
        let mut acc = Accumulator::default();
        let mut offset = 0u64;

        loop {
            let page = fetch_page(offset)?;
            acc.pin(&page)?;

            let num_found = page.series.num_found;
            if max_results.is_none() && num_found > self.default_max_results as u64 {
                return Err(Error::TooManyResults {
                    num_found,
                    max_results,
                    default_max_results: self.default_max_results,
                });
            }

            if self.progress && progress.is_none() {
                *progress = Some(progress_bar(max_results.map_or(num_found, |max| {
                    num_found.min(max as u64)
                })));
            }

            let before = acc.nb_series();
            acc.extend(page.series.docs)?;
            let nb_series = acc.nb_series();
            if let Some(pb) = progress.as_ref() {
                pb.inc(nb_series - before);
            }
            debug!(offset, num_found, nb_series, "received series page");

            if let Some(max) = max_results {
                if nb_series >= max as u64 {
                    acc.truncate(max);
                    debug!(max_results = max, "result cap reached");
                    break;
                }
            }

            if nb_series > num_found {
                return Err(Violation::CountExceedsTotal {
                    nb_series,
                    num_found,
                }
                .into());
            }
            if nb_series == num_found {
                break;
            }
            if nb_series == before {
                return Err(Violation::Stalled {
                    offset,
                    nb_series,
                    num_found,
                }
                .into());
            }

            offset = nb_series;
        }

        Ok(acc)
    }
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::with_template("{spinner:.green} {pos}/{len} series {wide_bar} {eta}")
        .map(|s| s.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}
