//! Response representations: full JSON object or the bare number as plain text.

use crate::compute::SupplyResult;
use tracing::error;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_PLAIN: &str = "text/plain; charset=utf-8";
const METHOD_NOT_ALLOWED: &str = "Method not allowed";
const INTERNAL_ERROR: &str = "Internal server error";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Plain,
}

impl ResponseFormat {
    /// Exactly `format=json` selects JSON; absent or any other value selects plain text.
    pub fn from_query(format: Option<&str>) -> Self {
        match format {
            Some("json") => ResponseFormat::Json,
            _ => ResponseFormat::Plain,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ResponseFormat::Json => CONTENT_TYPE_JSON,
            ResponseFormat::Plain => CONTENT_TYPE_PLAIN,
        }
    }
}

/// Transport-neutral HTTP response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupplyResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl SupplyResponse {
    fn new(status: u16, format: ResponseFormat, body: String) -> Self {
        Self {
            status,
            content_type: format.content_type(),
            body,
        }
    }

    /// Every response allows cross-origin GET.
    pub fn headers(&self) -> [(&'static str, &'static str); 3] {
        [
            ("content-type", self.content_type),
            ("access-control-allow-origin", "*"),
            ("access-control-allow-methods", "GET"),
        ]
    }

    pub fn method_not_allowed(format: ResponseFormat) -> Self {
        let body = match format {
            ResponseFormat::Json => serde_json::json!({ "error": METHOD_NOT_ALLOWED }).to_string(),
            ResponseFormat::Plain => METHOD_NOT_ALLOWED.to_string(),
        };
        Self::new(405, format, body)
    }

    /// Plain consumers expect a bare number, so they get `0` with 200 instead of an error body.
    pub fn internal_error(format: ResponseFormat) -> Self {
        match format {
            ResponseFormat::Json => Self::new(
                500,
                format,
                serde_json::json!({ "error": INTERNAL_ERROR }).to_string(),
            ),
            ResponseFormat::Plain => Self::new(200, format, "0".to_string()),
        }
    }

    pub fn render(result: &SupplyResult, format: ResponseFormat) -> Self {
        match format {
            ResponseFormat::Json => match serde_json::to_string(result) {
                Ok(body) => Self::new(200, format, body),
                Err(e) => {
                    error!(error = %e, "failed to serialize supply result");
                    Self::internal_error(format)
                }
            },
            ResponseFormat::Plain => Self::new(200, format, result.circulating_supply.to_string()),
        }
    }
}
