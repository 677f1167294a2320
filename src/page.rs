//! One page of a series query: envelope types and their validation.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ApiErrorResponse, Error, Result, Violation, request_failed};
use crate::transport::{HttpResponse, Transport};
use crate::util::page_url;
use crate::version::ApiVersionRange;

/// Results key looked up in every page.
pub(crate) const RESULTS_KEY: &str = "series";
const RESULTS_KEY_ALIAS: &str = "dataframe";

/// Decoded response of one page fetch.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PageEnvelope {
    #[serde(alias = "dataframe")]
    pub series: SeriesPage,
    #[serde(default)]
    pub dataset: Option<DatasetDescriptor>,
    #[serde(default, rename = "_meta")]
    pub meta: Option<ApiMeta>,
}

/// The results object of a page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeriesPage {
    /// Echo of the requested offset.
    pub offset: u64,
    /// Total number of series matching the query.
    pub num_found: u64,
    #[serde(default)]
    pub limit: Option<u64>,
    /// Raw series objects, decoded later by the aggregator.
    #[serde(default, alias = "data")]
    pub docs: Vec<Value>,
}

/// Dataset the series belong to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatasetDescriptor {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl DatasetDescriptor {
    /// Display name, `None` when absent or empty.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }
}

/// Server metadata carried in `_meta`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiMeta {
    #[serde(default, alias = "python_project_version")]
    pub version: Option<String>,
}

/// Fetches the page of `endpoint` starting at `offset` and validates it.
pub(crate) fn fetch_page<T: Transport + ?Sized>(
    transport: &T,
    endpoint: &str,
    offset: u64,
    version_range: Option<&ApiVersionRange>,
) -> Result<PageEnvelope> {
    let url = page_url(endpoint, offset);
    debug!(url = %url, "fetching series page");

    let resp = transport.get(&url).map_err(|source| Error::Transport {
        url: url.clone(),
        source,
    })?;
    decode_page(&url, offset, &resp, version_range)
}

/// Validates a raw page in a fixed order: JSON, status, schema, offset, version.
pub(crate) fn decode_page(
    url: &str,
    requested_offset: u64,
    resp: &HttpResponse,
    version_range: Option<&ApiVersionRange>,
) -> Result<PageEnvelope> {
    let malformed = |reason: String| Error::MalformedResponse {
        url: url.to_string(),
        reason,
        body: resp.body.clone(),
    };

    let json: Value = serde_json::from_str(&resp.body).map_err(|e| malformed(e.to_string()))?;
    if !json.is_object() {
        return Err(malformed("payload is not a JSON object".to_string()));
    }

    let api_error = ApiErrorResponse::deserialize(&json).unwrap_or_default();
    if !resp.is_success() || api_error.error_description.is_some() {
        return Err(request_failed(url, resp.status, &api_error));
    }

    let Some(results) = json
        .get(RESULTS_KEY)
        .or_else(|| json.get(RESULTS_KEY_ALIAS))
        .filter(|v| !v.is_null())
    else {
        return Err(Error::UnexpectedSchema {
            url: url.to_string(),
            key: RESULTS_KEY,
        });
    };

    let page = PageEnvelope {
        series: SeriesPage::deserialize(results).map_err(|e| malformed(e.to_string()))?,
        dataset: optional_field(&json, "dataset").map_err(|e| malformed(e.to_string()))?,
        meta: optional_field(&json, "_meta").map_err(|e| malformed(e.to_string()))?,
    };

    if page.series.offset != requested_offset {
        return Err(Violation::OffsetMismatch {
            requested: requested_offset,
            returned: page.series.offset,
        }
        .into());
    }

    if let Some(range) = version_range {
        range.check(page.meta.as_ref().and_then(|m| m.version.as_deref()))?;
    }

    Ok(page)
}

/// Decodes `json[key]`, treating an absent key like `null`.
fn optional_field<T: serde::de::DeserializeOwned>(
    json: &Value,
    key: &str,
) -> serde_json::Result<Option<T>> {
    match json.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => T::deserialize(v).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(body: Value) -> HttpResponse {
        HttpResponse::new(200, body.to_string())
    }

    const URL: &str = "https://host/series/P/D?offset=0";

    #[test]
    fn decodes_series_page_with_dataset() {
        let resp = ok(json!({
            "dataset": {"code": "ZUTN", "name": "Unemployment rate"},
            "series": {
                "offset": 0,
                "num_found": 1,
                "limit": 1000,
                "docs": [{"series_code": "A", "period": ["2010"], "value": [1.0]}],
            },
            "_meta": {"version": "22.1.0"},
        }));
        let page = decode_page(URL, 0, &resp, None).unwrap();
        assert_eq!(page.series.num_found, 1);
        assert_eq!(page.series.limit, Some(1000));
        assert_eq!(page.series.docs.len(), 1);
        let dataset = page.dataset.unwrap();
        assert_eq!(dataset.code, "ZUTN");
        assert_eq!(dataset.display_name(), Some("Unemployment rate"));
        assert_eq!(page.meta.unwrap().version.as_deref(), Some("22.1.0"));
    }

    #[test]
    fn accepts_dataframe_and_data_aliases() {
        let resp = ok(json!({
            "dataframe": {"offset": 3, "num_found": 4, "data": [{"code": "X", "value": [1]}]},
        }));
        let page = decode_page(URL, 3, &resp, None).unwrap();
        assert_eq!(page.series.docs.len(), 1);
        assert!(page.dataset.is_none());
    }

    #[test]
    fn non_json_body_is_malformed() {
        let resp = HttpResponse::new(502, "<html>Bad Gateway</html>");
        match decode_page(URL, 0, &resp, None) {
            Err(Error::MalformedResponse { body, .. }) => assert!(body.contains("Bad Gateway")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn error_status_carries_server_message() {
        let resp = HttpResponse::new(
            404,
            json!({"error_description": "Provider not found"}).to_string(),
        );
        match decode_page(URL, 0, &resp, None) {
            Err(Error::RequestFailed {
                status, message, ..
            }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "Provider not found");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn error_description_on_success_status_fails() {
        let resp = ok(json!({"error_description": "bad filter"}));
        assert!(matches!(
            decode_page(URL, 0, &resp, None),
            Err(Error::RequestFailed { status: 200, .. })
        ));
    }

    #[test]
    fn missing_results_key_is_unexpected_schema() {
        let resp = ok(json!({"dataset": {"code": "D"}}));
        assert!(matches!(
            decode_page(URL, 0, &resp, None),
            Err(Error::UnexpectedSchema { key: "series", .. })
        ));
    }

    #[test]
    fn null_results_key_is_unexpected_schema() {
        for body in [json!({"series": null}), json!({"dataframe": null, "dataset": {"code": "D"}})] {
            assert!(matches!(
                decode_page(URL, 0, &ok(body), None),
                Err(Error::UnexpectedSchema { key: "series", .. })
            ));
        }
    }

    #[test]
    fn series_key_wins_over_dataframe_alias() {
        let resp = ok(json!({
            "series": {"offset": 0, "num_found": 1, "docs": [{"code": "S", "value": [1]}]},
            "dataframe": {"offset": 9, "num_found": 9, "docs": []},
            "dataset": null,
        }));
        let page = decode_page(URL, 0, &resp, None).unwrap();
        assert_eq!(page.series.num_found, 1);
        assert!(page.dataset.is_none());
    }

    #[test]
    fn offset_echo_must_match() {
        let resp = ok(json!({"series": {"offset": 5, "num_found": 10, "docs": []}}));
        assert!(matches!(
            decode_page(URL, 0, &resp, None),
            Err(Error::ProtocolInvariantViolation(Violation::OffsetMismatch {
                requested: 0,
                returned: 5
            }))
        ));
    }

    #[test]
    fn version_gate_applies_only_when_configured() {
        let resp = ok(json!({
            "series": {"offset": 0, "num_found": 0, "docs": []},
            "_meta": {"python_project_version": "0.20.0"},
        }));
        assert!(decode_page(URL, 0, &resp, None).is_ok());
        assert!(matches!(
            decode_page(URL, 0, &resp, Some(&ApiVersionRange::LEGACY)),
            Err(Error::IncompatibleApiVersion { .. })
        ));
    }

    #[test]
    fn fetch_page_appends_offset() {
        struct Echo;
        impl Transport for Echo {
            fn get(&self, url: &str) -> Result<HttpResponse, crate::error::TransportError> {
                assert_eq!(url, "https://host/series?observations=1&offset=7");
                Ok(HttpResponse::new(
                    200,
                    json!({"series": {"offset": 7, "num_found": 7, "docs": []}}).to_string(),
                ))
            }
        }
        let page = fetch_page(&Echo, "https://host/series?observations=1", 7, None).unwrap();
        assert_eq!(page.series.offset, 7);
    }

    #[test]
    fn transport_failure_is_reported_with_url() {
        struct Down;
        impl Transport for Down {
            fn get(&self, _url: &str) -> Result<HttpResponse, crate::error::TransportError> {
                Err("connection refused".into())
            }
        }
        match fetch_page(&Down, "https://host/series", 0, None) {
            Err(Error::Transport { url, .. }) => assert_eq!(url, "https://host/series?offset=0"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
