use crate::interaction::{example_string, ResponseSpec};
use crate::verification::Mismatch;
use http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Bytes;
use serde_json::json;

/// The blueprint for the response returned by the mock provider to a request.
#[derive(Clone, Debug)]
pub(crate) struct ResponseTemplate {
    mime: String,
    status_code: StatusCode,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl ResponseTemplate {
    pub(crate) fn new(status_code: StatusCode) -> Self {
        Self {
            status_code,
            headers: HeaderMap::new(),
            mime: String::new(),
            body: None,
        }
    }

    /// The example response of an interaction: every matcher is replaced by its example.
    pub(crate) fn from_spec(spec: &ResponseSpec) -> Self {
        let mut template = Self::new(spec.status());
        for (name, values) in spec.headers() {
            let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
                log::warn!("Skipping invalid response header name `{}`", name);
                continue;
            };
            for value in values {
                match HeaderValue::from_str(&example_string(value)) {
                    Ok(value) => {
                        template.headers.append(name.clone(), value);
                    }
                    Err(_) => log::warn!("Skipping invalid value for response header `{}`", name),
                }
            }
        }
        if let Some(body) = spec.body() {
            template = template.set_body_raw(body.example_bytes(), &body.content_type());
        }
        template
    }

    /// Sent back when a request does not match any interaction.
    pub(crate) fn mismatch(mismatches: &[Mismatch]) -> Self {
        let body = json!({
            "error": "Request did not match any interaction",
            "mismatches": mismatches.iter().map(ToString::to_string).collect::<Vec<_>>(),
        });
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
            .set_body_raw(body.to_string().into_bytes(), "application/json")
    }

    pub(crate) fn bad_request(reason: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::BAD_REQUEST)
            .set_body_raw(reason.to_string().into_bytes(), "text/plain")
    }

    pub(crate) fn set_body_raw(mut self, body: Vec<u8>, mime: &str) -> Self {
        self.body = Some(body);
        self.mime = mime.to_string();
        self
    }

    pub(crate) fn generate_response(&self) -> Response<Full<Bytes>> {
        let mut headers = self.headers.clone();
        // Set content-type, if needed
        if !self.mime.is_empty() && !headers.contains_key(http::header::CONTENT_TYPE) {
            if let Ok(mime) = HeaderValue::from_str(&self.mime) {
                headers.insert(http::header::CONTENT_TYPE, mime);
            }
        }

        let body = self.body.clone().unwrap_or_default();
        let mut response = Response::new(Full::from(body));
        *response.status_mut() = self.status_code;
        *response.headers_mut() = headers;
        response
    }
}
