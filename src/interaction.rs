use crate::contract::{provider_states_json, SpecificationVersion};
use crate::error::ContractError;
use crate::matchers::{MatcherRule, Template};
use crate::matching_rules::{collect, BodyMatchers, GeneratorTable, RuleTable};
use crate::multipart::MultipartBody;
use crate::path::{Category, Path};
use http::{HeaderName, Method, StatusCode};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// A named precondition the provider must set up before replaying an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderState {
    pub name: String,
    pub params: BTreeMap<String, Value>,
}

impl ProviderState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

impl From<&str> for ProviderState {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ProviderState {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Where an [`Interaction`] is in its construction.
///
/// Stages are ordered: each builder step requires the interaction to be at a specific stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InteractionStage {
    Empty,
    StatesSet,
    Described,
    RequestMethodAndPath,
    RequestBodySet,
    AwaitingResponse,
    ResponseStatusSet,
    ResponseBodySet,
    Complete,
}

impl fmt::Display for InteractionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InteractionStage::Empty => "empty",
            InteractionStage::StatesSet => "provider states set",
            InteractionStage::Described => "described",
            InteractionStage::RequestMethodAndPath => "request method and path set",
            InteractionStage::RequestBodySet => "request body set",
            InteractionStage::AwaitingResponse => "awaiting response",
            InteractionStage::ResponseStatusSet => "response status set",
            InteractionStage::ResponseBodySet => "response body set",
            InteractionStage::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// A request or response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// A JSON body, possibly containing matching rules.
    Json(BodyMatchers),
    /// Opaque bytes, compared verbatim.
    Raw {
        content_type: String,
        bytes: Vec<u8>,
    },
    /// A `multipart/form-data` form carrying a file.
    Multipart(MultipartBody),
}

impl Body {
    pub fn content_type(&self) -> String {
        match self {
            Body::Json(_) => "application/json".to_string(),
            Body::Raw { content_type, .. } => content_type.clone(),
            Body::Multipart(form) => form.media_type(),
        }
    }

    /// The bytes sent on the wire when this body is used in a response.
    pub fn example_bytes(&self) -> Vec<u8> {
        match self {
            Body::Json(matchers) => matchers.example().to_string().into_bytes(),
            Body::Raw { bytes, .. } => bytes.clone(),
            Body::Multipart(form) => form.to_bytes(),
        }
    }

    fn to_pact_json(&self) -> Value {
        match self {
            Body::Json(matchers) => matchers.example(),
            Body::Raw { bytes, .. } => Value::String(String::from_utf8_lossy(bytes).into_owned()),
            Body::Multipart(form) => {
                Value::String(String::from_utf8_lossy(&form.to_bytes()).into_owned())
            }
        }
    }
}

/// Header (or query parameter) name, together with the templates of its values.
pub type NamedValues = BTreeMap<String, Vec<Template>>;

/// What the consumer will send.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub(crate) method: Method,
    /// Either a plain string or a regex rule.
    pub(crate) path: Template,
    pub(crate) query: NamedValues,
    pub(crate) headers: NamedValues,
    pub(crate) body: Option<Body>,
}

impl Default for RequestSpec {
    fn default() -> Self {
        Self {
            method: Method::GET,
            path: Template::Literal(Value::from("/")),
            query: NamedValues::new(),
            headers: NamedValues::new(),
            body: None,
        }
    }
}

impl RequestSpec {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &Template {
        &self.path
    }

    pub fn query(&self) -> &NamedValues {
        &self.query
    }

    pub fn headers(&self) -> &NamedValues {
        &self.headers
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// The example path, e.g. `/foobar` for a regex matching `/foo.*`.
    pub fn example_path(&self) -> String {
        match self.path.example() {
            Value::String(path) => path,
            other => other.to_string(),
        }
    }

    /// How constrained this request is. When several interactions match the same request, the
    /// most specific one wins.
    pub(crate) fn specificity(&self) -> usize {
        let path = match &self.path {
            Template::Literal(_) => 2,
            _ => 1,
        };
        let named = |values: &NamedValues| {
            values
                .values()
                .flatten()
                .map(Template::weight)
                .sum::<usize>()
        };
        let body = match &self.body {
            Some(Body::Json(matchers)) => matchers.template().weight(),
            Some(Body::Raw { .. }) | Some(Body::Multipart(_)) => 1,
            None => 0,
        };
        path + named(&self.query) + named(&self.headers) + body
    }

    fn rules_and_generators(&self) -> (RuleTable, GeneratorTable) {
        let mut rules = RuleTable::default();
        let mut generators = GeneratorTable::default();
        collect(&self.path, &Path::root(Category::Path), &mut rules, &mut generators);
        collect_named(&self.query, Category::Query, &mut rules, &mut generators);
        collect_named(&self.headers, Category::Headers, &mut rules, &mut generators);
        if let Some(Body::Json(matchers)) = &self.body {
            rules.extend(matchers.rules());
            generators.extend(matchers.generators());
        }
        (rules, generators)
    }

    fn to_pact_json(&self, version: SpecificationVersion) -> Value {
        let mut request = Map::new();
        request.insert("method".into(), Value::from(self.method.as_str()));
        request.insert("path".into(), Value::from(self.example_path()));
        if !self.query.is_empty() {
            let query = match version {
                SpecificationVersion::V2 => Value::from(query_string(&self.query)),
                SpecificationVersion::V3 => Value::Object(
                    self.query
                        .iter()
                        .map(|(name, values)| {
                            let values = values.iter().map(example_string).map(Value::from);
                            (name.clone(), Value::Array(values.collect()))
                        })
                        .collect(),
                ),
            };
            request.insert("query".into(), query);
        }
        let (rules, generators) = self.rules_and_generators();
        insert_message_parts(
            &mut request,
            &self.headers,
            self.body.as_ref(),
            &rules,
            &generators,
            version,
        );
        Value::Object(request)
    }
}

/// What the provider is expected to answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSpec {
    pub(crate) status: StatusCode,
    pub(crate) headers: NamedValues,
    pub(crate) body: Option<Body>,
}

impl Default for ResponseSpec {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: NamedValues::new(),
            body: None,
        }
    }
}

impl ResponseSpec {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &NamedValues {
        &self.headers
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    fn to_pact_json(&self, version: SpecificationVersion) -> Value {
        let mut response = Map::new();
        response.insert("status".into(), Value::from(self.status.as_u16()));
        let mut rules = RuleTable::default();
        let mut generators = GeneratorTable::default();
        collect_named(&self.headers, Category::Headers, &mut rules, &mut generators);
        if let Some(Body::Json(matchers)) = &self.body {
            rules.extend(matchers.rules());
            generators.extend(matchers.generators());
        }
        insert_message_parts(
            &mut response,
            &self.headers,
            self.body.as_ref(),
            &rules,
            &generators,
            version,
        );
        Value::Object(response)
    }
}

/// A single request/response pair, built step by step.
///
/// Every step checks that the interaction is at the stage it expects and fails with
/// [`ContractError::InvalidInteractionSequence`] otherwise, leaving the interaction untouched.
///
/// ```rust
/// use pactmock::{Interaction, SpecificationVersion};
///
/// let mut interaction = Interaction::new(SpecificationVersion::V3);
/// interaction.upon_receiving("A request to get foo").unwrap();
/// // The request has not been described yet.
/// assert!(interaction.will_respond_with(200).is_err());
///
/// interaction.with_request("GET", "/foo").unwrap();
/// interaction.will_respond_with(200).unwrap();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    stage: InteractionStage,
    version: SpecificationVersion,
    states: Vec<ProviderState>,
    description: String,
    request: RequestSpec,
    response: ResponseSpec,
}

impl Interaction {
    pub fn new(version: SpecificationVersion) -> Self {
        Self {
            stage: InteractionStage::Empty,
            version,
            states: Vec::new(),
            description: String::new(),
            request: RequestSpec::default(),
            response: ResponseSpec::default(),
        }
    }

    pub fn stage(&self) -> InteractionStage {
        self.stage
    }

    pub fn specification(&self) -> SpecificationVersion {
        self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn provider_states(&self) -> &[ProviderState] {
        &self.states
    }

    pub fn request(&self) -> &RequestSpec {
        &self.request
    }

    pub fn response(&self) -> &ResponseSpec {
        &self.response
    }

    fn expect_stage(
        &self,
        allowed: &[InteractionStage],
        expected: InteractionStage,
    ) -> Result<(), ContractError> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(ContractError::InvalidInteractionSequence {
                expected,
                actual: self.stage,
            })
        }
    }

    pub fn given(&mut self, state: impl Into<ProviderState>) -> Result<(), ContractError> {
        use InteractionStage::*;
        self.expect_stage(&[Empty, StatesSet], StatesSet)?;
        let state = state.into();
        if !state.params.is_empty() && self.version < SpecificationVersion::V3 {
            return Err(ContractError::UnsupportedForSpecVersion {
                feature: "provider state parameters",
                version: self.version,
            });
        }
        self.states.push(state);
        self.stage = StatesSet;
        Ok(())
    }

    pub fn upon_receiving(&mut self, description: impl Into<String>) -> Result<(), ContractError> {
        use InteractionStage::*;
        self.expect_stage(&[Empty, StatesSet], Described)?;
        self.description = description.into();
        self.stage = Described;
        Ok(())
    }

    /// Set the request method and path. The path is either a plain string or a regex rule.
    pub fn with_request(
        &mut self,
        method: &str,
        path: impl Into<Template>,
    ) -> Result<(), ContractError> {
        use InteractionStage::*;
        self.expect_stage(&[Described], RequestMethodAndPath)?;
        let method = parse_method(method)?;
        let path = path.into();
        match &path {
            Template::Literal(Value::String(_)) | Template::Rule(MatcherRule::Regex { .. }) => {}
            _ => return Err(ContractError::InvalidPathMatcher),
        }
        self.request.method = method;
        self.request.path = path;
        self.stage = RequestMethodAndPath;
        Ok(())
    }

    /// Add a query parameter. Each value is matched, in order, against the values received.
    pub fn with_query(&mut self, name: &str, values: Vec<Template>) -> Result<(), ContractError> {
        use InteractionStage::*;
        self.expect_stage(&[RequestMethodAndPath, RequestBodySet], RequestMethodAndPath)?;
        check_all(&values, self.version)?;
        self.request
            .query
            .entry(name.to_string())
            .or_default()
            .extend(values);
        Ok(())
    }

    pub fn with_request_header(
        &mut self,
        name: &str,
        values: Vec<Template>,
    ) -> Result<(), ContractError> {
        use InteractionStage::*;
        self.expect_stage(&[RequestMethodAndPath, RequestBodySet], RequestMethodAndPath)?;
        check_header_name(name)?;
        check_all(&values, self.version)?;
        self.request
            .headers
            .entry(name.to_string())
            .or_default()
            .extend(values);
        Ok(())
    }

    pub fn with_request_body(&mut self, body: Body) -> Result<(), ContractError> {
        use InteractionStage::*;
        self.expect_stage(&[RequestMethodAndPath, RequestBodySet], RequestBodySet)?;
        check_body(&body, self.version)?;
        self.request.body = Some(body);
        self.stage = RequestBodySet;
        Ok(())
    }

    /// Close the request: request headers, query parameters and body are rejected from now on.
    ///
    /// [`will_respond_with`](Self::will_respond_with) accepts an interaction whose request is
    /// still open.
    pub fn await_response(&mut self) -> Result<(), ContractError> {
        self.expect_stage(&REQUEST_CLOSABLE, InteractionStage::AwaitingResponse)?;
        self.stage = InteractionStage::AwaitingResponse;
        Ok(())
    }

    pub fn will_respond_with(&mut self, status: u16) -> Result<(), ContractError> {
        use InteractionStage::*;
        self.expect_stage(&REQUEST_CLOSABLE, AwaitingResponse)?;
        let status = StatusCode::from_u16(status).map_err(|_| {
            ContractError::IncompatibleType(format!("{} is not a valid status code", status))
        })?;
        self.response.status = status;
        self.stage = ResponseStatusSet;
        Ok(())
    }

    pub fn with_response_header(
        &mut self,
        name: &str,
        values: Vec<Template>,
    ) -> Result<(), ContractError> {
        use InteractionStage::*;
        self.expect_stage(&[ResponseStatusSet, ResponseBodySet], ResponseStatusSet)?;
        check_header_name(name)?;
        check_all(&values, self.version)?;
        self.response
            .headers
            .entry(name.to_string())
            .or_default()
            .extend(values);
        Ok(())
    }

    pub fn with_response_body(&mut self, body: Body) -> Result<(), ContractError> {
        use InteractionStage::*;
        self.expect_stage(&[ResponseStatusSet, ResponseBodySet], ResponseBodySet)?;
        check_body(&body, self.version)?;
        self.response.body = Some(body);
        self.stage = ResponseBodySet;
        Ok(())
    }

    pub(crate) fn complete(&mut self) {
        self.stage = InteractionStage::Complete;
    }

    pub(crate) fn to_pact_json(&self) -> Value {
        let mut interaction = Map::new();
        interaction.insert("description".into(), Value::from(self.description.as_str()));
        if !self.states.is_empty() {
            interaction.insert("providerStates".into(), provider_states_json(&self.states));
        }
        interaction.insert("request".into(), self.request.to_pact_json(self.version));
        interaction.insert("response".into(), self.response.to_pact_json(self.version));
        Value::Object(interaction)
    }
}

/// The stages from which the request can be closed.
const REQUEST_CLOSABLE: [InteractionStage; 3] = [
    InteractionStage::RequestMethodAndPath,
    InteractionStage::RequestBodySet,
    InteractionStage::AwaitingResponse,
];

fn parse_method(method: &str) -> Result<Method, ContractError> {
    let invalid = || ContractError::InvalidMethod(method.to_string());
    if method.is_empty() || method.bytes().any(|b| b.is_ascii_lowercase()) {
        return Err(invalid());
    }
    Method::from_bytes(method.as_bytes()).map_err(|_| invalid())
}

fn check_header_name(name: &str) -> Result<(), ContractError> {
    HeaderName::from_bytes(name.as_bytes())
        .map(|_| ())
        .map_err(|_| ContractError::InvalidHeaderName(name.to_string()))
}

fn check_all(values: &[Template], version: SpecificationVersion) -> Result<(), ContractError> {
    values
        .iter()
        .try_for_each(|template| template.check_version(version))
}

fn check_body(body: &Body, version: SpecificationVersion) -> Result<(), ContractError> {
    match body {
        Body::Json(matchers) => matchers.template().check_version(version),
        Body::Raw { .. } | Body::Multipart(_) => Ok(()),
    }
}

/// Header and query values are always strings on the wire.
pub(crate) fn example_string(template: &Template) -> String {
    match template.example() {
        Value::String(value) => value,
        other => other.to_string(),
    }
}

/// The path of the `index`-th value of a header or query parameter.
///
/// Query values are always indexed. Headers are only indexed when they have several values.
pub(crate) fn named_value_path(
    category: Category,
    name: &str,
    index: usize,
    n_values: usize,
) -> Path {
    let path = Path::root(category).field(name);
    if category == Category::Query || n_values > 1 {
        path.index(index)
    } else {
        path
    }
}

fn collect_named(
    values: &NamedValues,
    category: Category,
    rules: &mut RuleTable,
    generators: &mut GeneratorTable,
) {
    for (name, templates) in values {
        for (index, template) in templates.iter().enumerate() {
            let path = named_value_path(category, name, index, templates.len());
            collect(template, &path, rules, generators);
        }
    }
}

fn query_string(query: &NamedValues) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (name, values) in query {
        for value in values {
            serializer.append_pair(name, &example_string(value));
        }
    }
    serializer.finish()
}

fn insert_message_parts(
    target: &mut Map<String, Value>,
    headers: &NamedValues,
    body: Option<&Body>,
    rules: &RuleTable,
    generators: &GeneratorTable,
    version: SpecificationVersion,
) {
    let mut header_examples: Map<String, Value> = headers
        .iter()
        .map(|(name, values)| {
            let joined = values
                .iter()
                .map(example_string)
                .collect::<Vec<_>>()
                .join(", ");
            (name.clone(), Value::from(joined))
        })
        .collect();
    if let Some(body) = body {
        let declared = header_examples
            .keys()
            .any(|name| name.eq_ignore_ascii_case("content-type"));
        if !declared {
            header_examples.insert("Content-Type".into(), Value::from(body.content_type()));
        }
    }
    if !header_examples.is_empty() {
        target.insert("headers".into(), Value::Object(header_examples));
    }
    if let Some(body) = body {
        target.insert("body".into(), body.to_pact_json());
    }
    if !rules.is_empty() {
        let rules = match version {
            SpecificationVersion::V2 => rules.to_v2_json(),
            SpecificationVersion::V3 => rules.to_v3_json(),
        };
        target.insert("matchingRules".into(), rules);
    }
    // Generators do not exist in V2.
    if version >= SpecificationVersion::V3 && !generators.is_empty() {
        target.insert("generators".into(), generators.to_v3_json());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::{from_provider_state, integer, like, object, regex};
    use serde_json::json;

    fn described(version: SpecificationVersion) -> Interaction {
        let mut interaction = Interaction::new(version);
        interaction.given("User foo exists").unwrap();
        interaction.upon_receiving("A request to get foo").unwrap();
        interaction
    }

    #[test]
    fn steps_out_of_order_are_rejected_without_side_effects() {
        let mut interaction = described(SpecificationVersion::V3);
        let before = interaction.clone();

        let error = interaction.will_respond_with(200).unwrap_err();

        assert!(matches!(
            error,
            ContractError::InvalidInteractionSequence {
                expected: InteractionStage::AwaitingResponse,
                actual: InteractionStage::Described,
            }
        ));
        assert_eq!(interaction, before);
    }

    #[test]
    fn a_closed_request_only_accepts_the_response() {
        let mut interaction = described(SpecificationVersion::V3);
        interaction.with_request("GET", "/foo").unwrap();

        interaction.await_response().unwrap();

        assert_eq!(interaction.stage(), InteractionStage::AwaitingResponse);
        assert!(matches!(
            interaction.with_request_header("Accept", vec!["application/json".into()]),
            Err(ContractError::InvalidInteractionSequence {
                actual: InteractionStage::AwaitingResponse,
                ..
            })
        ));
        assert!(interaction.request().headers().is_empty());
        interaction.will_respond_with(200).unwrap();
        assert_eq!(interaction.stage(), InteractionStage::ResponseStatusSet);
    }

    #[test]
    fn states_cannot_be_added_once_described() {
        let mut interaction = described(SpecificationVersion::V3);
        assert!(interaction.given("Another state").is_err());
        assert_eq!(interaction.provider_states().len(), 1);
    }

    #[test]
    fn state_parameters_need_v3() {
        let mut interaction = Interaction::new(SpecificationVersion::V2);
        let error = interaction
            .given(ProviderState::new("User exists").with_param("name", "billy"))
            .unwrap_err();
        assert!(matches!(
            error,
            ContractError::UnsupportedForSpecVersion { .. }
        ));
    }

    #[test]
    fn methods_must_be_uppercase_http_methods() {
        let mut interaction = described(SpecificationVersion::V3);
        assert!(matches!(
            interaction.with_request("get", "/foo"),
            Err(ContractError::InvalidMethod(_))
        ));
        assert!(matches!(
            interaction.with_request("", "/foo"),
            Err(ContractError::InvalidMethod(_))
        ));
        assert_eq!(interaction.stage(), InteractionStage::Described);
    }

    #[test]
    fn paths_only_accept_strings_and_regexes() {
        let mut interaction = described(SpecificationVersion::V3);
        assert!(matches!(
            interaction.with_request("GET", like("/foo")),
            Err(ContractError::InvalidPathMatcher)
        ));
        interaction
            .with_request("GET", regex("/foobar", r"/foo.*").unwrap())
            .unwrap();
        assert_eq!(interaction.request().example_path(), "/foobar");
    }

    #[test]
    fn v3_request_layout() {
        let mut interaction = described(SpecificationVersion::V3);
        interaction
            .with_request("POST", regex("/foobar", r"/foo.*").unwrap())
            .unwrap();
        interaction
            .with_query(
                "baz",
                vec![
                    regex("bar", "[a-z]+").unwrap().into(),
                    regex("bat", "[a-z]+").unwrap().into(),
                ],
            )
            .unwrap();
        interaction
            .with_request_header("Authorization", vec![like("Bearer 1234").into()])
            .unwrap();
        let body = BodyMatchers::build(
            object()
                .field("id", integer(27))
                .field("name", from_provider_state("${name}", "billy"))
                .into(),
            SpecificationVersion::V3,
            Path::root(Category::Body),
        )
        .unwrap();
        interaction.with_request_body(Body::Json(body)).unwrap();

        let request = interaction.request().to_pact_json(SpecificationVersion::V3);
        assert_eq!(request["query"], json!({"baz": ["bar", "bat"]}));
        assert_eq!(
            request["headers"],
            json!({"Authorization": "Bearer 1234", "Content-Type": "application/json"})
        );
        assert_eq!(request["body"], json!({"id": 27, "name": "billy"}));
        assert_eq!(
            request["matchingRules"]["query"]["baz"]["matchers"],
            json!([{"match": "regex", "regex": "[a-z]+"}, {"match": "regex", "regex": "[a-z]+"}])
        );
        assert_eq!(
            request["matchingRules"]["header"]["Authorization"]["matchers"],
            json!([{"match": "type"}])
        );
        assert_eq!(
            request["generators"]["body"]["$.name"],
            json!({"type": "ProviderState", "expression": "${name}"})
        );
    }

    #[test]
    fn v2_queries_are_query_strings() {
        let mut interaction = described(SpecificationVersion::V2);
        interaction.with_request("GET", "/foobar").unwrap();
        interaction
            .with_query("baz", vec!["bar".into(), "bat".into()])
            .unwrap();

        let request = interaction.request().to_pact_json(SpecificationVersion::V2);
        assert_eq!(request["query"], json!("baz=bar&baz=bat"));
        assert!(request.get("matchingRules").is_none());
    }

    #[test]
    fn exact_requests_are_more_specific_than_regexes() {
        let mut exact = described(SpecificationVersion::V3);
        exact.with_request("GET", "/foobar").unwrap();
        let mut loose = described(SpecificationVersion::V3);
        loose
            .with_request("GET", regex("/foobar", "/foo.*").unwrap())
            .unwrap();

        assert!(exact.request().specificity() > loose.request().specificity());
    }
}
