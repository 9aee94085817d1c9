//! Comparing received requests against the expectations of the contract.
use crate::interaction::{named_value_path, Body, NamedValues, RequestSpec};
use crate::matchers::{MatcherRule, Template};
use crate::path::{Category, Path};
use crate::request::Request;
use crate::verification::Mismatch;
use regex::Regex;
use serde_json::Value;

/// The JSON type of a value, as used in `type:<name>` mismatches.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// How plain values are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cascade {
    /// Plain values must be equal to the example.
    Equal,
    /// Inside a type matcher: plain values only need to have the same type as the example.
    Type,
}

/// Compare `actual` against `template`, collecting every mismatch.
pub(crate) fn compare(template: &Template, actual: &Value, path: &Path) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();
    compare_template(template, actual, path, Cascade::Equal, &mut mismatches);
    mismatches
}

fn compare_template(
    template: &Template,
    actual: &Value,
    path: &Path,
    cascade: Cascade,
    mismatches: &mut Vec<Mismatch>,
) {
    match template {
        Template::Literal(expected) => match cascade {
            Cascade::Equal if expected != actual => mismatches.push(Mismatch::new(
                path,
                format!("value:{}", expected),
                Some(actual.clone()),
            )),
            Cascade::Type if json_type_name(expected) != json_type_name(actual) => {
                mismatches.push(type_mismatch(expected, actual, path))
            }
            _ => {}
        },
        Template::Object(fields) => {
            let Value::Object(actual_fields) = actual else {
                mismatches.push(Mismatch::new(path, "type:object", Some(actual.clone())));
                return;
            };
            // Extra keys are fine: only what the consumer relies on is checked.
            for (key, child) in fields {
                let child_path = path.field(key.as_str());
                match actual_fields.get(key) {
                    Some(value) => compare_template(child, value, &child_path, cascade, mismatches),
                    None => mismatches.push(Mismatch::new(child_path, "present", None)),
                }
            }
        }
        Template::Array(elements) => {
            let Value::Array(actual_elements) = actual else {
                mismatches.push(Mismatch::new(path, "type:array", Some(actual.clone())));
                return;
            };
            match cascade {
                Cascade::Equal => {
                    if elements.len() != actual_elements.len() {
                        mismatches.push(Mismatch::new(
                            path,
                            format!("length:{}", elements.len()),
                            Some(actual.clone()),
                        ));
                        return;
                    }
                    for (index, (element, value)) in
                        elements.iter().zip(actual_elements).enumerate()
                    {
                        compare_template(element, value, &path.index(index), cascade, mismatches);
                    }
                }
                Cascade::Type => {
                    // Like arrays: extra elements are checked against the last example element.
                    if let Some(last) = elements.last() {
                        for (index, value) in actual_elements.iter().enumerate() {
                            let element = elements.get(index).unwrap_or(last);
                            compare_template(
                                element,
                                value,
                                &path.index(index),
                                cascade,
                                mismatches,
                            );
                        }
                    }
                }
            }
        }
        Template::Rule(rule) => compare_rule(rule, actual, path, mismatches),
    }
}

fn type_mismatch(expected: &Value, actual: &Value, path: &Path) -> Mismatch {
    Mismatch::new(
        path,
        format!("type:{}", json_type_name(expected)),
        Some(actual.clone()),
    )
}

fn matches(template: &Template, actual: &Value, path: &Path) -> bool {
    let mut mismatches = Vec::new();
    compare_template(template, actual, path, Cascade::Equal, &mut mismatches);
    mismatches.is_empty()
}

fn compare_rule(rule: &MatcherRule, actual: &Value, path: &Path, mismatches: &mut Vec<Mismatch>) {
    let fail = |expected: String| Mismatch::new(path, expected, Some(actual.clone()));
    match rule {
        // Explicit equality stays strict, even inside a type matcher.
        MatcherRule::Equality(expected) => {
            if expected != actual {
                mismatches.push(fail(format!("equality:{}", expected)));
            }
        }
        MatcherRule::Regex { pattern, .. } => {
            let matched = match (scalar_string(actual), Regex::new(pattern)) {
                (Some(value), Ok(regex)) => regex.is_match(&value),
                _ => false,
            };
            if !matched {
                mismatches.push(fail(format!("regex:{}", pattern)));
            }
        }
        MatcherRule::TypeLike(example) => {
            compare_template(example, actual, path, Cascade::Type, mismatches)
        }
        MatcherRule::Integer(_) => {
            if !(actual.is_i64() || actual.is_u64()) {
                mismatches.push(fail("integer".to_string()));
            }
        }
        MatcherRule::Decimal(_) => {
            if !actual.is_f64() {
                mismatches.push(fail("decimal".to_string()));
            }
        }
        MatcherRule::ArrayMinLike { example, min } => {
            compare_array_like(example, Some(*min), None, actual, path, mismatches)
        }
        MatcherRule::ArrayMaxLike { example, max } => {
            compare_array_like(example, None, Some(*max), actual, path, mismatches)
        }
        MatcherRule::ArrayMinMaxLike { example, min, max } => {
            compare_array_like(example, Some(*min), Some(*max), actual, path, mismatches)
        }
        MatcherRule::ArrayContaining(elements) => {
            let Value::Array(actual_elements) = actual else {
                mismatches.push(fail("type:array".to_string()));
                return;
            };
            for (index, element) in elements.iter().enumerate() {
                let element_path = path.index(index);
                let found = actual_elements
                    .iter()
                    .any(|value| matches(element, value, &element_path));
                if !found {
                    mismatches.push(Mismatch::new(
                        path,
                        format!("arrayContains:{}", element.example()),
                        Some(actual.clone()),
                    ));
                }
            }
        }
        MatcherRule::Includes(substring) => {
            let included = actual
                .as_str()
                .map(|value| value.contains(substring.as_str()))
                .unwrap_or(false);
            if !included {
                mismatches.push(fail(format!("include:{}", substring)));
            }
        }
        MatcherRule::FromProviderState { example, .. } => {
            let template = Template::from(example.clone());
            compare_template(&template, actual, path, Cascade::Type, mismatches)
        }
        MatcherRule::DateTimeGenerated { format, .. } => {
            let matched = match (actual.as_str(), Regex::new(&timestamp_pattern(format))) {
                (Some(value), Ok(regex)) => regex.is_match(value),
                _ => false,
            };
            if !matched {
                mismatches.push(fail(format!("timestamp:{}", format)));
            }
        }
    }
}

fn compare_array_like(
    example: &Template,
    min: Option<usize>,
    max: Option<usize>,
    actual: &Value,
    path: &Path,
    mismatches: &mut Vec<Mismatch>,
) {
    let Value::Array(elements) = actual else {
        mismatches.push(Mismatch::new(path, "type:array", Some(actual.clone())));
        return;
    };
    if let Some(min) = min {
        if elements.len() < min {
            mismatches.push(Mismatch::new(path, format!("min:{}", min), Some(actual.clone())));
        }
    }
    if let Some(max) = max {
        if elements.len() > max {
            mismatches.push(Mismatch::new(path, format!("max:{}", max), Some(actual.clone())));
        }
    }
    for (index, element) in elements.iter().enumerate() {
        compare_template(example, element, &path.index(index), Cascade::Type, mismatches);
    }
}

/// Regexes are applied to the textual form of scalars.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(value) => Some(value.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(boolean) => Some(boolean.to_string()),
        _ => None,
    }
}

/// Translate a Java `SimpleDateFormat` pattern into an anchored regular expression.
pub(crate) fn timestamp_pattern(format: &str) -> String {
    let mut pattern = String::from("^");
    let chars: Vec<char> = format.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            // Quoted literal; `''` is an escaped quote.
            if chars.get(i + 1) == Some(&'\'') {
                pattern.push('\'');
                i += 2;
                continue;
            }
            let mut literal = String::new();
            i += 1;
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        literal.push('\'');
                        i += 2;
                        continue;
                    }
                    break;
                }
                literal.push(chars[i]);
                i += 1;
            }
            pattern.push_str(&regex::escape(&literal));
            i += 1;
            continue;
        }
        if !c.is_ascii_alphabetic() {
            pattern.push_str(&regex::escape(&c.to_string()));
            i += 1;
            continue;
        }
        let mut run = 1;
        while chars.get(i + run) == Some(&c) {
            run += 1;
        }
        let fragment = match (c, run) {
            ('y', 2) | ('Y', 2) => r"\d{2}".to_string(),
            ('y', _) | ('Y', _) => r"\d{4}".to_string(),
            ('M', 1) | ('L', 1) => r"\d{1,2}".to_string(),
            ('M', 2) | ('L', 2) => r"\d{2}".to_string(),
            ('M', 3) | ('L', 3) | ('E', 1..=3) => "[A-Za-z]{3}".to_string(),
            ('M', _) | ('L', _) | ('E', _) => "[A-Za-z]+".to_string(),
            ('d' | 'H' | 'h' | 'k' | 'K' | 'm' | 's', 1) => r"\d{1,2}".to_string(),
            ('d' | 'H' | 'h' | 'k' | 'K' | 'm' | 's', n) => format!(r"\d{{{}}}", n),
            ('D', _) => r"\d{1,3}".to_string(),
            ('S', n) => format!(r"\d{{{}}}", n),
            ('a', _) => "(AM|PM|am|pm)".to_string(),
            ('X', _) => r"(Z|[+-]\d{2}(:?\d{2})?)".to_string(),
            ('Z', _) => r"[+-]\d{4}".to_string(),
            ('z', _) => "[A-Za-z]+([+-]\\d{1,2}(:\\d{2})?)?".to_string(),
            _ => format!(r"\w{{{}}}", run),
        };
        pattern.push_str(&fragment);
        i += run;
    }
    pattern.push('$');
    pattern
}

/// The outcome of comparing a request against a single interaction.
#[derive(Debug, Clone)]
pub(crate) struct RequestMatch {
    pub(crate) mismatches: Vec<Mismatch>,
    /// Method and path agree: the request was meant for this interaction.
    pub(crate) method_and_path: bool,
    pub(crate) specificity: usize,
}

impl RequestMatch {
    pub(crate) fn is_match(&self) -> bool {
        self.mismatches.is_empty()
    }
}

pub(crate) fn match_request(spec: &RequestSpec, request: &Request) -> RequestMatch {
    let mut mismatches = Vec::new();

    if spec.method() != request.method {
        mismatches.push(Mismatch::new(
            "$.method",
            format!("method:{}", spec.method()),
            Some(Value::from(request.method.as_str())),
        ));
    }
    let actual_path = Value::from(request.url.path());
    for mismatch in compare(spec.path(), &actual_path, &Path::root(Category::Path)) {
        mismatches.push(Mismatch::new(
            mismatch.path,
            format!("path:{}", spec.example_path()),
            mismatch.actual,
        ));
    }
    let method_and_path = mismatches.is_empty();

    compare_query(spec.query(), request, &mut mismatches);
    compare_headers(spec.headers(), request, &mut mismatches);
    compare_body(spec.body(), request, &mut mismatches);

    RequestMatch {
        mismatches,
        method_and_path,
        specificity: spec.specificity(),
    }
}

fn compare_query(expected: &NamedValues, request: &Request, mismatches: &mut Vec<Mismatch>) {
    for (name, templates) in expected {
        let values = request.query_values(name);
        compare_named_values(Category::Query, name, templates, values, mismatches);
    }
    for (name, value) in request.url.query_pairs() {
        if !expected.contains_key(&*name) {
            mismatches.push(Mismatch::new(
                Path::root(Category::Query).field(name.into_owned()),
                "absent",
                Some(Value::from(value.into_owned())),
            ));
        }
    }
}

fn compare_headers(expected: &NamedValues, request: &Request, mismatches: &mut Vec<Mismatch>) {
    // Extra headers are fine.
    for (name, templates) in expected {
        let raw: Vec<String> = request
            .headers
            .get_all(name.as_str())
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect();
        let values = if templates.len() == 1 {
            // A single expected value is matched against the whole header.
            if raw.is_empty() {
                raw
            } else {
                vec![raw.join(", ")]
            }
        } else {
            raw.iter()
                .flat_map(|value| value.split(','))
                .map(|value| value.trim().to_string())
                .collect()
        };
        compare_named_values(Category::Headers, name, templates, values, mismatches);
    }
}

fn compare_named_values(
    category: Category,
    name: &str,
    templates: &[Template],
    values: Vec<String>,
    mismatches: &mut Vec<Mismatch>,
) {
    if values.is_empty() && !templates.is_empty() {
        mismatches.push(Mismatch::new(
            Path::root(category).field(name),
            "present",
            None,
        ));
        return;
    }
    if values.len() != templates.len() {
        mismatches.push(Mismatch::new(
            Path::root(category).field(name),
            format!("length:{}", templates.len()),
            Some(Value::from(values)),
        ));
        return;
    }
    for (index, (template, value)) in templates.iter().zip(values).enumerate() {
        let path = named_value_path(category, name, index, templates.len());
        mismatches.extend(compare(template, &Value::String(value), &path));
    }
}

fn compare_body(expected: Option<&Body>, request: &Request, mismatches: &mut Vec<Mismatch>) {
    let root = Path::root(Category::Body);
    match expected {
        // No expectation on the body: anything goes.
        None => {}
        Some(_) if request.body.is_empty() => {
            mismatches.push(Mismatch::new(root, "present", None));
        }
        Some(Body::Json(matchers)) => match serde_json::from_slice::<Value>(&request.body) {
            Ok(actual) => mismatches.extend(compare(matchers.template(), &actual, &root)),
            Err(_) => mismatches.push(Mismatch::new(
                root,
                "type:json",
                Some(Value::from(String::from_utf8_lossy(&request.body).into_owned())),
            )),
        },
        Some(Body::Multipart(form)) => {
            mismatches.extend(form.compare(&request.headers, &request.body));
        }
        Some(Body::Raw { bytes, .. }) => {
            if bytes != &request.body {
                mismatches.push(Mismatch::new(
                    root,
                    format!("value:{}", String::from_utf8_lossy(bytes)),
                    Some(Value::from(String::from_utf8_lossy(&request.body).into_owned())),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::{
        array_containing, array_min_max_like, datetime_generated, decimal, equality, includes,
        integer, like, object, regex,
    };
    use serde_json::json;

    fn body_path() -> Path {
        Path::root(Category::Body)
    }

    fn expectations(mismatches: &[Mismatch]) -> Vec<(&str, &str)> {
        mismatches
            .iter()
            .map(|m| (m.path.as_str(), m.expected.as_str()))
            .collect()
    }

    #[test]
    fn like_accepts_any_value_of_the_same_type() {
        let template: Template = object().field("id", like(27)).into();

        assert!(compare(&template, &json!({"id": 99}), &body_path()).is_empty());
        let mismatches = compare(&template, &json!({"id": "27"}), &body_path());
        assert_eq!(expectations(&mismatches), vec![("$.body.id", "type:number")]);
        assert_eq!(mismatches[0].actual, Some(json!("27")));
    }

    #[test]
    fn plain_values_must_be_equal() {
        let template: Template = object().field("name", "billy").into();

        assert!(compare(&template, &json!({"name": "billy", "extra": 1}), &body_path()).is_empty());
        let mismatches = compare(&template, &json!({"name": "bob"}), &body_path());
        assert_eq!(
            expectations(&mismatches),
            vec![("$.body.name", "value:\"billy\"")]
        );
    }

    #[test]
    fn missing_keys_are_reported() {
        let template: Template = object().field("name", like("billy")).into();
        let mismatches = compare(&template, &json!({}), &body_path());
        assert_eq!(expectations(&mismatches), vec![("$.body.name", "present")]);
        assert_eq!(mismatches[0].actual, None);
    }

    #[test]
    fn equality_stays_strict_inside_like() {
        let template: Template = like(object().field("kind", equality("user")).field("n", 1)).into();

        assert!(compare(&template, &json!({"kind": "user", "n": 5}), &body_path()).is_empty());
        let mismatches = compare(&template, &json!({"kind": "admin", "n": 5}), &body_path());
        assert_eq!(
            expectations(&mismatches),
            vec![("$.body.kind", "equality:\"user\"")]
        );
    }

    #[test]
    fn numbers_are_checked_for_their_kind() {
        let template: Template = object()
            .field("integer", integer(1))
            .field("decimal", decimal(1.5))
            .into();

        assert!(compare(&template, &json!({"integer": 7, "decimal": 3.25}), &body_path()).is_empty());
        let mismatches = compare(&template, &json!({"integer": 7.5, "decimal": 3}), &body_path());
        assert_eq!(
            expectations(&mismatches),
            vec![("$.body.decimal", "decimal"), ("$.body.integer", "integer")]
        );
    }

    #[test]
    fn array_bounds_are_enforced() {
        let template: Template = array_min_max_like(27, 3, 5).unwrap().into();

        assert!(compare(&template, &json!([1, 2, 3]), &body_path()).is_empty());
        assert_eq!(
            expectations(&compare(&template, &json!([1, 2]), &body_path())),
            vec![("$.body", "min:3")]
        );
        assert_eq!(
            expectations(&compare(&template, &json!([1, 2, 3, 4, 5, 6]), &body_path())),
            vec![("$.body", "max:5")]
        );
        assert_eq!(
            expectations(&compare(&template, &json!([1, "2", 3]), &body_path())),
            vec![("$.body[1]", "type:number")]
        );
    }

    #[test]
    fn array_containing_looks_for_each_element_anywhere() {
        let template: Template =
            array_containing(vec![like("string").into(), integer(1).into()]).into();

        assert!(compare(&template, &json!([3, "a", true]), &body_path()).is_empty());
        let mismatches = compare(&template, &json!(["a", "b"]), &body_path());
        assert_eq!(expectations(&mismatches), vec![("$.body", "arrayContains:1")]);
    }

    #[test]
    fn strings_can_be_matched_by_regex_or_substring() {
        let template: Template = object()
            .field("date", regex("2020-01-01", r"^\d{4}-\d{2}-\d{2}$").unwrap())
            .field("greeting", includes("world"))
            .into();

        assert!(compare(
            &template,
            &json!({"date": "1999-12-31", "greeting": "hello world!"}),
            &body_path()
        )
        .is_empty());
        let mismatches = compare(
            &template,
            &json!({"date": "yesterday", "greeting": "hello"}),
            &body_path(),
        );
        assert_eq!(
            expectations(&mismatches),
            vec![
                ("$.body.date", r"regex:^\d{4}-\d{2}-\d{2}$"),
                ("$.body.greeting", "include:world")
            ]
        );
    }

    #[test]
    fn timestamps_follow_their_format() {
        let template: Template =
            datetime_generated("2020-01-01T08:00:45", "yyyy-MM-dd'T'HH:mm:ss").into();

        assert!(compare(&template, &json!("2021-12-31T23:59:59"), &body_path()).is_empty());
        assert_eq!(
            expectations(&compare(&template, &json!("2021-12-31 23:59:59"), &body_path())),
            vec![("$.body", "timestamp:yyyy-MM-dd'T'HH:mm:ss")]
        );
    }

    #[test]
    fn java_date_formats_become_anchored_regexes() {
        assert_eq!(
            timestamp_pattern("yyyy-MM-dd'T'HH:mm:ss.SSS"),
            r"^\d{4}\-\d{2}\-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}$"
        );
        assert_eq!(timestamp_pattern("h 'o''clock'"), r"^\d{1,2} o'clock$");
    }
}
