use std::fmt;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error returned by a [`Transport`](crate::Transport) implementation.
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything that can abort a page fetch or a full download.
///
/// None of these are retried. A failure on any page discards the whole
/// in-progress accumulation.
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP layer could not produce a response at all.
    #[error("could not connect to {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },

    /// The response body is not a JSON object.
    #[error("could not parse JSON payload from {url}: {reason}. Response text: {body}")]
    MalformedResponse {
        url: String,
        reason: String,
        body: String,
    },

    /// The server answered with an error status or an error payload.
    #[error("could not fetch data from {url} (HTTP {status}): {message}")]
    RequestFailed {
        url: String,
        status: u16,
        message: String,
    },

    /// The JSON payload lacks the results object.
    #[error("could not find {key:?} key in response JSON payload from {url}")]
    UnexpectedSchema { url: String, key: &'static str },

    /// A defensive pagination check failed. Always fatal.
    #[error("pagination protocol violated: {0}")]
    ProtocolInvariantViolation(Violation),

    /// The server version lies outside the supported range.
    #[error("Web API version is {found}, but this client expects >= {min}, < {max}")]
    IncompatibleApiVersion {
        found: String,
        min: semver::Version,
        max: semver::Version,
    },

    /// More series match than the caller allowed.
    #[error("{}", too_many_results_message(.num_found, .max_results, .default_max_results))]
    TooManyResults {
        num_found: u64,
        /// The explicit cap, `None` when the default cap applied.
        max_results: Option<usize>,
        default_max_results: usize,
    },

    /// A series record breaks the parallel-array shape.
    #[error("malformed series {code}: {reason}")]
    MalformedSeries { code: String, reason: String },

    /// Caller input rejected before any network call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration could not be loaded.
    #[error("invalid configuration: {0:#}")]
    Config(anyhow::Error),
}

impl Error {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// The defensive checks behind [`Error::ProtocolInvariantViolation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// The page echoed a different offset than the one requested.
    OffsetMismatch { requested: u64, returned: u64 },
    /// More distinct series were collected than the server reported.
    CountExceedsTotal { nb_series: u64, num_found: u64 },
    /// A value pinned on the first page changed on a later one.
    InconsistentPagination {
        field: &'static str,
        first: String,
        current: String,
    },
    /// A page brought no new series while the result set is not exhausted.
    Stalled { offset: u64, nb_series: u64, num_found: u64 },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OffsetMismatch {
                requested,
                returned,
            } => write!(
                f,
                "requested offset {requested}, but the server returned offset {returned}"
            ),
            Self::CountExceedsTotal {
                nb_series,
                num_found,
            } => write!(
                f,
                "collected {nb_series} series, more than the {num_found} reported by the server"
            ),
            Self::InconsistentPagination {
                field,
                first,
                current,
            } => write!(
                f,
                "{field} changed during pagination ({first} on the first page, now {current})"
            ),
            Self::Stalled {
                offset,
                nb_series,
                num_found,
            } => write!(
                f,
                "page at offset {offset} added no new series ({nb_series} of {num_found} collected)"
            ),
        }
    }
}

impl From<Violation> for Error {
    fn from(v: Violation) -> Self {
        Self::ProtocolInvariantViolation(v)
    }
}

fn too_many_results_message(
    num_found: &u64,
    max_results: &Option<usize>,
    default_max_results: &usize,
) -> String {
    let given = match max_results {
        Some(max) => format!("but you passed max_results={max}."),
        None => format!(
            "but you did not pass max_results, so a default value of {default_max_results} was used."
        ),
    };
    format!(
        "DBnomics Web API found {num_found} series matching your request, {given} \
         Please give a higher value (at least max_results={num_found}), and try again."
    )
}

/// Error payload as sent by the Web API.
///
/// Different API generations use different keys, so all are optional.
#[derive(Debug, Default, serde::Deserialize)]
pub(crate) struct ApiErrorResponse {
    #[serde(default)]
    pub(crate) error_description: Option<String>,
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) detail: Option<String>,
    #[serde(default)]
    pub(crate) title: Option<String>,
}

impl ApiErrorResponse {
    pub(crate) fn server_message(&self) -> Option<&str> {
        self.error_description
            .as_deref()
            .or(self.message.as_deref())
            .or(self.detail.as_deref())
            .or(self.title.as_deref())
            .filter(|m| !m.trim().is_empty())
    }
}

pub(crate) fn request_failed(url: &str, status: u16, e: &ApiErrorResponse) -> Error {
    let message = match e.server_message() {
        Some(m) => m.to_string(),
        None if status == 404 => "not found".to_string(),
        None => "no error description in response".to_string(),
    };
    Error::RequestFailed {
        url: url.to_string(),
        status,
        message,
    }
}
