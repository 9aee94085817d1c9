use std::fmt;

use crate::error::DynError;
use http::{HeaderMap, Method};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use url::Url;

pub const BODY_PRINT_LIMIT: usize = 10_000;

/// Specifies limitations on printing request bodies when logging requests. Some bodies may be
/// too large to reasonably print and it may be desirable to limit them.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BodyPrintLimit {
    /// Maximum length of a body to print in bytes.
    Limited(usize),
    /// There is no limit to the size of a body that may be printed.
    Unlimited,
}

impl Default for BodyPrintLimit {
    fn default() -> Self {
        BodyPrintLimit::Limited(BODY_PRINT_LIMIT)
    }
}

/// A request received by the mock provider.
///
/// The body is read once, when the request arrives, so that it can be compared against every
/// interaction of the contract.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Request {
    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// All the values received for a query parameter, in order.
    pub fn query_values(&self, name: &str) -> Vec<String> {
        self.url
            .query_pairs()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
            .collect()
    }

    /// A compact description of the request, used when reporting unexpected requests.
    pub(crate) fn summary(&self) -> Value {
        let mut summary = json!({
            "method": self.method.as_str(),
            "path": self.url.path(),
        });
        if let Some(query) = self.url.query() {
            summary["query"] = Value::from(query);
        }
        summary
    }

    pub(crate) async fn from_hyper(
        request: hyper::Request<hyper::body::Incoming>,
    ) -> Result<Request, DynError> {
        let (parts, body) = request.into_parts();
        let url = match parts.uri.authority() {
            Some(_) => parts.uri.to_string(),
            None => format!("http://localhost{}", parts.uri),
        }
        .parse()?;

        let body = body.collect().await?.to_bytes();

        Ok(Self {
            url,
            method: parts.method,
            headers: parts.headers,
            body: body.to_vec(),
        })
    }

    pub(crate) fn print_with_limit(
        &self,
        mut buffer: impl fmt::Write,
        body_print_limit: BodyPrintLimit,
    ) -> fmt::Result {
        writeln!(buffer, "{} {}", self.method, self.url)?;
        for name in self.headers.keys() {
            let values = self
                .headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()))
                .collect::<Vec<_>>();
            let values = values.join(",");
            writeln!(buffer, "{}: {}", name, values)?;
        }

        match body_print_limit {
            BodyPrintLimit::Limited(limit) if self.body.len() > limit => {
                let mut written = false;
                // Back off to the closest UTF-8 boundary.
                for end_byte in (limit.saturating_sub(3)..=limit).rev() {
                    if let Ok(truncated) = std::str::from_utf8(&self.body[..end_byte]) {
                        written = true;
                        writeln!(buffer, "{}", truncated)?;
                        writeln!(
                            buffer,
                            "We truncated the body because it was too large: {} bytes (limit: {} bytes)",
                            self.body.len(),
                            limit
                        )?;
                        writeln!(
                            buffer,
                            "Increase this limit by setting `PACTMOCK_BODY_PRINT_LIMIT`, or calling `MockProviderConfig::with_body_print_limit`"
                        )?;
                        break;
                    }
                }
                if !written {
                    writeln!(
                        buffer,
                        "Body is likely binary (invalid utf-8) size is {} bytes",
                        self.body.len()
                    )
                } else {
                    Ok(())
                }
            }
            _ => {
                if let Ok(body) = std::str::from_utf8(&self.body) {
                    writeln!(buffer, "{}", body)
                } else {
                    writeln!(
                        buffer,
                        "Body is likely binary (invalid utf-8) size is {} bytes",
                        self.body.len()
                    )
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(body: &[u8]) -> Request {
        Request {
            url: "http://localhost/foobar?baz=bar&baz=bat&other=1".parse().unwrap(),
            method: Method::POST,
            headers: HeaderMap::new(),
            body: body.to_vec(),
        }
    }

    #[test]
    fn repeated_query_parameters_keep_their_order() {
        assert_eq!(request(b"").query_values("baz"), vec!["bar", "bat"]);
        assert!(request(b"").query_values("missing").is_empty());
    }

    #[test]
    fn long_bodies_are_truncated() {
        let mut printed = String::new();
        request(b"0123456789")
            .print_with_limit(&mut printed, BodyPrintLimit::Limited(4))
            .unwrap();

        assert!(printed.contains("POST http://localhost/foobar"));
        assert!(printed.contains("0123\n"));
        assert!(printed.contains("too large: 10 bytes (limit: 4 bytes)"));
    }

    #[test]
    fn binary_bodies_are_not_printed() {
        let mut printed = String::new();
        request(&[0xff, 0xfe, 0xfd])
            .print_with_limit(&mut printed, BodyPrintLimit::Unlimited)
            .unwrap();

        assert!(printed.contains("Body is likely binary (invalid utf-8) size is 3 bytes"));
    }
}
