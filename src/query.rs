//! Builds the series endpoint URL that the client paginates.

use reqwest::Url;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::util::urljoin;

/// Fully qualified series identifier, `provider/dataset/series`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesId {
    pub provider_code: String,
    pub dataset_code: String,
    pub series_code: String,
}

impl SeriesId {
    pub fn new(
        provider_code: impl Into<String>,
        dataset_code: impl Into<String>,
        series_code: impl Into<String>,
    ) -> Result<Self> {
        let id = Self {
            provider_code: provider_code.into(),
            dataset_code: dataset_code.into(),
            series_code: series_code.into(),
        };
        if id.provider_code.is_empty() || id.dataset_code.is_empty() || id.series_code.is_empty()
        {
            return Err(Error::invalid_argument(format!(
                "series id {id} has an empty part"
            )));
        }
        Ok(id)
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.provider_code, self.dataset_code, self.series_code
        )
    }
}

impl FromStr for SeriesId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(p), Some(d), Some(c)) => Self::new(p, d, c),
            _ => Err(Error::invalid_argument(format!(
                "series id {s:?} is not of the form provider/dataset/series"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Target {
    Dataset {
        provider_code: String,
        dataset_code: String,
        series_code: Option<String>,
        dimensions: BTreeMap<String, Vec<String>>,
    },
    Ids(Vec<SeriesId>),
    ApiLink(String),
}

/// A series selection, turned into an endpoint by [`SeriesQuery::endpoint`].
///
/// ```
/// use dbnomics::SeriesQuery;
///
/// let query = SeriesQuery::dataset("IMF", "CPI").series_code("M.FR+DE.PCPIEC_WT");
/// let url = query.endpoint("https://api.db.nomics.world/v22").unwrap();
/// assert_eq!(
///     url,
///     "https://api.db.nomics.world/v22/series/IMF/CPI/M.FR+DE.PCPIEC_WT?observations=1"
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesQuery {
    target: Target,
}

impl SeriesQuery {
    /// All series of a dataset.
    pub fn dataset(provider_code: impl Into<String>, dataset_code: impl Into<String>) -> Self {
        Self {
            target: Target::Dataset {
                provider_code: provider_code.into(),
                dataset_code: dataset_code.into(),
                series_code: None,
                dimensions: BTreeMap::new(),
            },
        }
    }

    /// Explicit series, given as `provider/dataset/series` strings.
    pub fn ids<I, S>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids = ids
            .into_iter()
            .map(|s| s.as_ref().parse())
            .collect::<Result<Vec<SeriesId>>>()?;
        Ok(Self::from_ids(ids))
    }

    pub fn from_ids(ids: Vec<SeriesId>) -> Self {
        Self {
            target: Target::Ids(ids),
        }
    }

    /// A URL copied from the DBnomics website ("API link"), used verbatim.
    pub fn api_link(url: impl Into<String>) -> Self {
        Self {
            target: Target::ApiLink(url.into()),
        }
    }

    /// Restricts a dataset query to one series code or SDMX code mask.
    ///
    /// Has no effect on id lists and API links.
    pub fn series_code(mut self, code: impl Into<String>) -> Self {
        if let Target::Dataset { series_code, .. } = &mut self.target {
            *series_code = Some(code.into());
        }
        self
    }

    /// Adds a dimension filter to a dataset query.
    pub fn dimension<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Target::Dataset { dimensions, .. } = &mut self.target {
            dimensions.insert(name.into(), values.into_iter().map(Into::into).collect());
        }
        self
    }

    pub fn dimensions(mut self, filters: BTreeMap<String, Vec<String>>) -> Self {
        for (name, values) in filters {
            self = self.dimension(name, values);
        }
        self
    }

    /// Validates the query and builds the endpoint under `base_url`.
    pub fn endpoint(&self, base_url: &str) -> Result<String> {
        match &self.target {
            Target::ApiLink(link) => {
                let url = Url::parse(link).map_err(|e| {
                    Error::invalid_argument(format!("invalid API link {link:?}: {e}"))
                })?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(Error::invalid_argument(format!(
                        "API link {link:?} is not an http(s) URL"
                    )));
                }
                Ok(link.clone())
            }
            Target::Ids(ids) => {
                if ids.is_empty() {
                    return Err(Error::invalid_argument("series id list is empty"));
                }
                let joined = ids
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                let mut url = series_url(base_url)?;
                url.query_pairs_mut()
                    .append_pair("observations", "1")
                    .append_pair("series_ids", &joined);
                Ok(url.to_string())
            }
            Target::Dataset {
                provider_code,
                dataset_code,
                series_code,
                dimensions,
            } => {
                if provider_code.is_empty() {
                    return Err(Error::invalid_argument("provider code is empty"));
                }
                if dataset_code.is_empty() {
                    return Err(Error::invalid_argument("dataset code is empty"));
                }
                if series_code.as_deref() == Some("") {
                    return Err(Error::invalid_argument("series code is empty"));
                }
                if series_code.is_some() && !dimensions.is_empty() {
                    return Err(Error::invalid_argument(
                        "a series code and dimension filters cannot be combined",
                    ));
                }
                validate_dimensions(dimensions)?;

                let mut url = series_url(base_url)?;
                {
                    let mut segments = url.path_segments_mut().map_err(|()| {
                        Error::invalid_argument(format!("base URL {base_url:?} cannot have a path"))
                    })?;
                    segments.pop_if_empty().push(provider_code).push(dataset_code);
                    if let Some(code) = series_code {
                        segments.push(code);
                    }
                }
                url.query_pairs_mut().append_pair("observations", "1");
                if !dimensions.is_empty() {
                    let json = serde_json::to_string(dimensions).map_err(|e| {
                        Error::invalid_argument(format!("cannot encode dimensions: {e}"))
                    })?;
                    url.query_pairs_mut().append_pair("dimensions", &json);
                }
                Ok(url.to_string())
            }
        }
    }
}

fn series_url(base_url: &str) -> Result<Url> {
    let joined = urljoin(base_url, "series");
    Url::parse(&joined)
        .map_err(|e| Error::invalid_argument(format!("invalid base URL {base_url:?}: {e}")))
}

fn validate_dimensions(dimensions: &BTreeMap<String, Vec<String>>) -> Result<()> {
    for (name, values) in dimensions {
        if name.is_empty() {
            return Err(Error::invalid_argument("dimension name is empty"));
        }
        if values.is_empty() {
            return Err(Error::invalid_argument(format!(
                "dimension {name:?} has no value codes"
            )));
        }
        if values.iter().any(String::is_empty) {
            return Err(Error::invalid_argument(format!(
                "dimension {name:?} has an empty value code"
            )));
        }
    }
    Ok(())
}
