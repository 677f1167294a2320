//! A small Rust client for the DBnomics Web API.
//!
//! The Web API answers series queries one page at a time. This crate walks
//! the pages of a query, checks that they belong to the same result set,
//! and flattens every series' parallel `period`/`value` arrays into one row
//! per observation.
//!
//! ## Quick start
//! - Optionally point the client at another instance via `DBNOMICS_API_URL` or a
//!   `.dbnomicsrc` file (supported in the current directory and in your home directory).
//! - Call [`Client::fetch_series`] with a [`SeriesQuery`], or [`Client::fetch_all`]
//!   with an "API link" copied from the website.
//!
//! ```no_run
//! use dbnomics::{Client, SeriesQuery};
//!
//! fn main() -> dbnomics::Result<()> {
//!     let client = Client::from_env()?;
//!     let query = SeriesQuery::dataset("AMECO", "ZUTN").series_code("EA19.1.0.0.0.ZUTN");
//!     let table = client.fetch_series(&query, None)?;
//!     for row in &table {
//!         println!("{:?} {:?}", row.get("period"), row.get("value"));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Queries matching more than [`DEFAULT_MAX_RESULTS`] series fail with
//! [`Error::TooManyResults`] unless an explicit `max_results` is given.

#![forbid(unsafe_code)]

mod aggregate;
mod client;
mod config;
mod error;
mod page;
mod query;
mod series;
mod table;
mod transport;
mod util;
mod version;

pub use client::{Client, ClientConfig, DEFAULT_API_BASE_URL, DEFAULT_MAX_RESULTS};
pub use error::{Error, Result, TransportError, Violation};
pub use page::{ApiMeta, DatasetDescriptor, PageEnvelope, SeriesPage};
pub use query::{SeriesId, SeriesQuery};
pub use series::SeriesRecord;
pub use table::{ObservationRow, SeriesTable};
pub use transport::{HttpResponse, HttpTransport, Transport};
pub use version::ApiVersionRange;
