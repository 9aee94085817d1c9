//! `multipart/form-data` bodies carrying a single file.
use crate::error::ContractError;
use crate::matchers::MatcherRule;
use crate::path::{Category, Path};
use crate::verification::Mismatch;
use http::HeaderMap;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Any multipart form, whatever its boundary.
pub(crate) const MULTIPART_CONTENT_TYPE_PATTERN: &str =
    r"^multipart/form-data;(\s*charset=[^;]*;)?\s*boundary=.*";

/// A form with one part, holding the contents of a file.
///
/// Requests are matched on the presence of the part and on its content type: the file sent by
/// the consumer does not have to be the example file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartBody {
    boundary: String,
    part_name: String,
    file_name: String,
    part_content_type: String,
    contents: Vec<u8>,
}

impl MultipartBody {
    pub fn new(
        part_content_type: impl Into<String>,
        file_name: impl Into<String>,
        part_name: impl Into<String>,
        contents: Vec<u8>,
    ) -> Self {
        let part_content_type = part_content_type.into();
        let file_name = file_name.into();
        let part_name = part_name.into();
        // Derived from the contents, so that the pact file is stable across runs.
        let mut hasher = DefaultHasher::new();
        part_name.hash(&mut hasher);
        file_name.hash(&mut hasher);
        contents.hash(&mut hasher);
        Self {
            boundary: format!("pactmock-boundary-{:016x}", hasher.finish()),
            part_name,
            file_name,
            part_content_type,
            contents,
        }
    }

    /// Read the part from `file_path`. The file name sent in the form is the last component of
    /// the path.
    pub fn from_file(
        part_content_type: &str,
        file_path: impl AsRef<std::path::Path>,
        part_name: &str,
    ) -> Result<Self, ContractError> {
        let file_path = file_path.as_ref();
        let contents = std::fs::read(file_path).map_err(|source| ContractError::UnreadableFile {
            path: file_path.to_path_buf(),
            source,
        })?;
        let file_name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(part_content_type, file_name, part_name, contents))
    }

    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    pub fn part_content_type(&self) -> &str {
        &self.part_content_type
    }

    /// The `Content-Type` of the whole form, e.g. `multipart/form-data; boundary=...`.
    pub fn media_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// The rule recorded for the `Content-Type` header: the boundary chosen by the consumer
    /// will differ from the example one.
    pub(crate) fn content_type_rule(&self) -> MatcherRule {
        MatcherRule::Regex {
            example: self.media_type(),
            pattern: MULTIPART_CONTENT_TYPE_PATTERN.to_string(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            self.boundary, self.part_name, self.file_name, self.part_content_type
        )
        .into_bytes();
        bytes.extend_from_slice(&self.contents);
        bytes.extend_from_slice(format!("\r\n--{}--\r\n", self.boundary).as_bytes());
        bytes
    }

    pub(crate) fn compare(&self, headers: &HeaderMap, body: &[u8]) -> Vec<Mismatch> {
        let root = Path::root(Category::Body);
        let content_type = headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok());
        let Some(boundary) = content_type.and_then(form_boundary) else {
            return vec![Mismatch::new(
                root,
                "multipart/form-data",
                content_type.map(Value::from),
            )];
        };
        let part_path = root.field(self.part_name.as_str());
        match parse_parts(body, &boundary)
            .into_iter()
            .find(|part| part.name.as_deref() == Some(self.part_name.as_str()))
        {
            None => vec![Mismatch::new(part_path, "present", None)],
            Some(part) if !part.content_type.eq_ignore_ascii_case(&self.part_content_type) => {
                vec![Mismatch::new(
                    part_path,
                    format!("contentType:{}", self.part_content_type),
                    Some(Value::from(part.content_type)),
                )]
            }
            Some(_) => vec![],
        }
    }
}

struct Part {
    name: Option<String>,
    content_type: String,
}

fn form_boundary(content_type: &str) -> Option<String> {
    let media_type = content_type.split(';').next()?.trim();
    if !media_type.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    header_param(content_type, "boundary")
}

/// The value of `key` in a header like `form-data; name="file"; filename="a.txt"`.
fn header_param(value: &str, key: &str) -> Option<String> {
    value.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case(key)
            .then(|| value.trim().trim_matches('"').to_string())
    })
}

fn parse_parts(body: &[u8], boundary: &str) -> Vec<Part> {
    // Only part headers are inspected: a lossy view of binary contents is fine.
    let text = String::from_utf8_lossy(body);
    let delimiter = format!("--{}", boundary);
    text.split(delimiter.as_str())
        .skip(1)
        .take_while(|segment| !segment.starts_with("--"))
        .filter_map(|segment| {
            let segment = segment.strip_prefix("\r\n").unwrap_or(segment);
            let (head, _) = segment.split_once("\r\n\r\n")?;
            // Parts without a content type are plain text.
            let mut part = Part {
                name: None,
                content_type: "text/plain".to_string(),
            };
            for line in head.split("\r\n") {
                let Some((name, value)) = line.split_once(':') else {
                    continue;
                };
                let name = name.trim();
                if name.eq_ignore_ascii_case("content-disposition") {
                    part.name = header_param(value, "name");
                } else if name.eq_ignore_ascii_case("content-type") {
                    part.content_type = value.trim().to_string();
                }
            }
            Some(part)
        })
        .collect()
}
