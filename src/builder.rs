//! Step-ordered construction of HTTP interactions.
//!
//! Each step consumes the builder and returns the one for the next stage, so that steps can
//! only be chained in a valid order:
//! `given* → upon_receiving → with_request → (header | query | body)* → will_respond_with →
//! (header | body)*`.
//!
//! The interaction is appended to the contract by [`will_respond_with`]: the response steps
//! that follow refine the appended interaction.
//!
//! [`will_respond_with`]: InteractionWithRequest::will_respond_with
use crate::contract::{Contract, SpecificationVersion};
use crate::descriptor::FieldDescriptors;
use crate::error::ContractError;
use crate::interaction::{Body, Interaction, ProviderState};
use crate::matchers::{MatcherRule, Template};
use crate::matching_rules::BodyMatchers;
use crate::multipart::MultipartBody;
use crate::path::{Category, Path};
use serde::Serialize;

/// A new interaction: provider states can be added before it is described.
#[must_use]
pub struct UnconfiguredInteraction<'a> {
    contract: &'a mut Contract,
    interaction: Interaction,
}

/// An interaction with a description, waiting for its request.
#[must_use]
pub struct DescribedInteraction<'a> {
    contract: &'a mut Contract,
    interaction: Interaction,
}

/// An interaction with a request, waiting for its response.
#[must_use]
pub struct InteractionWithRequest<'a> {
    contract: &'a mut Contract,
    interaction: Interaction,
}

/// An interaction appended to the contract. Its response can still be refined.
pub struct InteractionWithResponse<'a> {
    contract: &'a mut Contract,
}

impl<'a> UnconfiguredInteraction<'a> {
    pub(crate) fn new(contract: &'a mut Contract) -> Self {
        let interaction = Interaction::new(contract.specification());
        Self {
            contract,
            interaction,
        }
    }

    /// Add a provider state without parameters. It can be called several times.
    pub fn given(mut self, state: &str) -> Self {
        self.interaction
            .given(state)
            .expect("A provider state without parameters is valid before the description");
        self
    }

    /// Add a provider state with parameters. Parameters need the V3 specification.
    pub fn given_with_params(mut self, state: ProviderState) -> Result<Self, ContractError> {
        self.interaction.given(state)?;
        Ok(self)
    }

    pub fn upon_receiving(mut self, description: &str) -> DescribedInteraction<'a> {
        self.interaction
            .upon_receiving(description)
            .expect("An interaction can always be described before its request");
        DescribedInteraction {
            contract: self.contract,
            interaction: self.interaction,
        }
    }
}

impl<'a> DescribedInteraction<'a> {
    /// The method and path of the expected request.
    ///
    /// `path` is either a plain string, matched exactly, or a [`regex`](crate::matchers::regex)
    /// rule. `method` must be an upper-case HTTP method.
    pub fn with_request(
        mut self,
        method: &str,
        path: impl Into<Template>,
    ) -> Result<InteractionWithRequest<'a>, ContractError> {
        self.interaction.with_request(method, path)?;
        Ok(InteractionWithRequest {
            contract: self.contract,
            interaction: self.interaction,
        })
    }

    pub fn with_request_path_matcher(
        self,
        method: &str,
        path: MatcherRule,
    ) -> Result<InteractionWithRequest<'a>, ContractError> {
        self.with_request(method, Template::Rule(path))
    }
}

impl<'a> InteractionWithRequest<'a> {
    /// Expect a request header. Calling it again with the same name expects one more value.
    pub fn header(self, name: &str, value: impl Into<Template>) -> Result<Self, ContractError> {
        self.headers(name, vec![value.into()])
    }

    pub fn headers(mut self, name: &str, values: Vec<Template>) -> Result<Self, ContractError> {
        self.interaction.with_request_header(name, values)?;
        Ok(self)
    }

    /// Expect a query parameter. Calling it again with the same name expects one more value.
    pub fn query(mut self, name: &str, value: impl Into<Template>) -> Result<Self, ContractError> {
        self.interaction.with_query(name, vec![value.into()])?;
        Ok(self)
    }

    pub fn json_body(mut self, body: impl Into<Template>) -> Result<Self, ContractError> {
        let body = json_body(body.into(), self.interaction.specification())?;
        self.interaction.with_request_body(body)?;
        Ok(self)
    }

    /// A body compared byte for byte.
    pub fn body(
        mut self,
        content_type: &str,
        bytes: impl Into<Vec<u8>>,
    ) -> Result<Self, ContractError> {
        self.interaction.with_request_body(Body::Raw {
            content_type: content_type.to_string(),
            bytes: bytes.into(),
        })?;
        Ok(self)
    }

    /// A JSON body shaped like `record`, with examples taken from `fields`.
    pub fn body_match<R: Serialize>(
        mut self,
        record: &R,
        fields: &FieldDescriptors,
    ) -> Result<Self, ContractError> {
        let body = record_body(record, fields, self.interaction.specification())?;
        self.interaction.with_request_body(body)?;
        Ok(self)
    }

    /// A `multipart/form-data` body with a single part, `part_name`, holding the file at
    /// `file_path`.
    ///
    /// The request matches whatever the boundary and the file contents, as long as the part is
    /// there with the expected `content_type`.
    pub fn multipart_body(
        mut self,
        content_type: &str,
        file_path: impl AsRef<std::path::Path>,
        part_name: &str,
    ) -> Result<Self, ContractError> {
        let form = MultipartBody::from_file(content_type, file_path, part_name)?;
        self.interaction
            .with_request_header("Content-Type", vec![Template::Rule(form.content_type_rule())])?;
        self.interaction.with_request_body(Body::Multipart(form))?;
        Ok(self)
    }

    /// Set the response status and append the interaction to the contract.
    pub fn will_respond_with(
        mut self,
        status: u16,
    ) -> Result<InteractionWithResponse<'a>, ContractError> {
        self.interaction.will_respond_with(status)?;
        self.contract.append(self.interaction)?;
        Ok(InteractionWithResponse {
            contract: self.contract,
        })
    }
}

impl<'a> InteractionWithResponse<'a> {
    pub fn header(self, name: &str, value: impl Into<Template>) -> Result<Self, ContractError> {
        self.headers(name, vec![value.into()])
    }

    pub fn headers(mut self, name: &str, values: Vec<Template>) -> Result<Self, ContractError> {
        self.interaction()?.with_response_header(name, values)?;
        Ok(self)
    }

    pub fn json_body(mut self, body: impl Into<Template>) -> Result<Self, ContractError> {
        let interaction = self.interaction()?;
        let body = json_body(body.into(), interaction.specification())?;
        interaction.with_response_body(body)?;
        Ok(self)
    }

    pub fn body(
        mut self,
        content_type: &str,
        bytes: impl Into<Vec<u8>>,
    ) -> Result<Self, ContractError> {
        self.interaction()?.with_response_body(Body::Raw {
            content_type: content_type.to_string(),
            bytes: bytes.into(),
        })?;
        Ok(self)
    }

    pub fn body_match<R: Serialize>(
        mut self,
        record: &R,
        fields: &FieldDescriptors,
    ) -> Result<Self, ContractError> {
        let interaction = self.interaction()?;
        let body = record_body(record, fields, interaction.specification())?;
        interaction.with_response_body(body)?;
        Ok(self)
    }

    /// Answer with a `multipart/form-data` body: a single part, `part_name`, holding the file
    /// at `file_path`.
    pub fn multipart_body(
        mut self,
        content_type: &str,
        file_path: impl AsRef<std::path::Path>,
        part_name: &str,
    ) -> Result<Self, ContractError> {
        let form = MultipartBody::from_file(content_type, file_path, part_name)?;
        let interaction = self.interaction()?;
        interaction
            .with_response_header("Content-Type", vec![Template::Rule(form.content_type_rule())])?;
        interaction.with_response_body(Body::Multipart(form))?;
        Ok(self)
    }

    fn interaction(&mut self) -> Result<&mut Interaction, ContractError> {
        if self.contract.is_sealed() {
            return Err(ContractError::ContractSealed);
        }
        self.contract
            .last_interaction_mut()
            .ok_or(ContractError::IncompleteInteraction)
    }
}

fn json_body(template: Template, version: SpecificationVersion) -> Result<Body, ContractError> {
    BodyMatchers::build(template, version, Path::root(Category::Body)).map(Body::Json)
}

fn record_body<R: Serialize>(
    record: &R,
    fields: &FieldDescriptors,
    version: SpecificationVersion,
) -> Result<Body, ContractError> {
    BodyMatchers::from_record(record, fields, version, Path::root(Category::Body)).map(Body::Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FieldDescriptor;
    use crate::interaction::InteractionStage;
    use crate::matchers::{like, object, regex, MatcherRule};
    use crate::matching_rules::MatchingRule;
    use serde_json::json;

    fn contract(version: SpecificationVersion) -> Contract {
        Contract::new("consumer", "provider", version)
    }

    #[test]
    fn a_complete_interaction_is_appended_on_will_respond_with() {
        let mut contract = contract(SpecificationVersion::V3);

        UnconfiguredInteraction::new(&mut contract)
            .given("User foo exists")
            .upon_receiving("A request to create foo")
            .with_request("POST", "/users")
            .unwrap()
            .header("Content-Type", "application/json")
            .unwrap()
            .json_body(object().field("id", like(27)))
            .unwrap()
            .will_respond_with(201)
            .unwrap()
            .json_body(object().field("name", like("billy")))
            .unwrap();

        let interaction = contract.http_interactions().next().unwrap();
        assert_eq!(interaction.description(), "A request to create foo");
        assert_eq!(interaction.provider_states()[0].name, "User foo exists");
        assert_eq!(interaction.response().status().as_u16(), 201);
        assert_eq!(interaction.stage(), InteractionStage::ResponseBodySet);
        match interaction.request().body() {
            Some(Body::Json(matchers)) => {
                assert_eq!(matchers.rules().get("$.body.id"), Some(&[MatchingRule::Type][..]));
            }
            other => panic!("Unexpected body: {:?}", other),
        }
    }

    #[test]
    fn nothing_is_appended_before_the_response_status() {
        let mut contract = contract(SpecificationVersion::V3);

        let _builder = UnconfiguredInteraction::new(&mut contract)
            .upon_receiving("A request to get foo")
            .with_request("GET", "/foo")
            .unwrap();

        assert!(contract.is_empty());
    }

    #[test]
    fn regex_paths_are_accepted_and_other_matchers_rejected() {
        let mut contract = contract(SpecificationVersion::V3);

        let with_regex = UnconfiguredInteraction::new(&mut contract)
            .upon_receiving("A request for any user")
            .with_request_path_matcher("GET", regex("/users/42", r"/users/\d+").unwrap());
        assert!(with_regex.is_ok());

        let with_type = UnconfiguredInteraction::new(&mut contract)
            .upon_receiving("Another request")
            .with_request("GET", like("/users/42"));
        assert!(matches!(with_type, Err(ContractError::InvalidPathMatcher)));
    }

    #[test]
    fn provider_state_parameters_need_v3() {
        let mut contract = contract(SpecificationVersion::V2);

        let outcome = UnconfiguredInteraction::new(&mut contract)
            .given("plain states are fine")
            .given_with_params(ProviderState::new("User exists").with_param("id", 27));

        assert!(matches!(
            outcome,
            Err(ContractError::UnsupportedForSpecVersion { .. })
        ));
    }

    #[test]
    fn duplicates_are_detected_when_appending() {
        let mut contract = contract(SpecificationVersion::V3);
        let add = |contract: &mut Contract| {
            UnconfiguredInteraction::new(contract)
                .given("User foo exists")
                .upon_receiving("A request to get foo")
                .with_request("GET", "/foo")
                .unwrap()
                .will_respond_with(200)
                .map(|_| ())
        };

        assert!(add(&mut contract).is_ok());
        assert!(matches!(
            add(&mut contract),
            Err(ContractError::DuplicateInteraction { .. })
        ));
        assert_eq!(contract.len(), 1);
    }

    #[test]
    fn typed_records_become_type_matchers() {
        #[derive(Serialize)]
        struct User {
            name: String,
            tags: Vec<String>,
        }

        let mut contract = contract(SpecificationVersion::V3);
        let fields = FieldDescriptors::new()
            .field("name", FieldDescriptor::example("billy"))
            .field("tags", FieldDescriptor::example("admin"));
        let user = User {
            name: String::new(),
            tags: vec![String::new()],
        };

        UnconfiguredInteraction::new(&mut contract)
            .upon_receiving("A request to get a user")
            .with_request("GET", "/user")
            .unwrap()
            .will_respond_with(200)
            .unwrap()
            .body_match(&user, &fields)
            .unwrap();

        let interaction = contract.http_interactions().next().unwrap();
        let body = interaction.response().body().unwrap();
        assert_eq!(
            String::from_utf8(body.example_bytes()).unwrap(),
            json!({"name": "billy", "tags": ["admin"]}).to_string()
        );
        assert!(matches!(
            interaction.response().body(),
            Some(Body::Json(matchers))
                if matches!(matchers.template(), Template::Object(_))
        ));
    }

    #[test]
    fn v3_only_matchers_are_rejected_under_v2() {
        let mut contract = contract(SpecificationVersion::V2);

        let outcome = UnconfiguredInteraction::new(&mut contract)
            .upon_receiving("A request to get an event")
            .with_request("GET", "/event")
            .unwrap()
            .will_respond_with(200)
            .unwrap()
            .json_body(object().field(
                "at",
                MatcherRule::DateTimeGenerated {
                    example: "2020-01-01".into(),
                    format: "yyyy-MM-dd".into(),
                },
            ));

        assert!(matches!(
            outcome,
            Err(ContractError::UnsupportedForSpecVersion { .. })
        ));
    }

    #[test]
    fn multipart_bodies_record_a_content_type_rule() {
        let file = std::env::temp_dir().join(format!("pactmock-upload-{}.csv", std::process::id()));
        std::fs::write(&file, "id,name\n1,billy\n").unwrap();
        let mut contract = contract(SpecificationVersion::V3);

        UnconfiguredInteraction::new(&mut contract)
            .upon_receiving("A request to upload users")
            .with_request("POST", "/users/import")
            .unwrap()
            .multipart_body("text/csv", &file, "users")
            .unwrap()
            .will_respond_with(202)
            .unwrap();
        std::fs::remove_file(&file).unwrap();

        let interaction = &contract.to_pact_json()["interactions"][0]["request"];
        let content_type = interaction["headers"]["Content-Type"].as_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        assert_eq!(
            interaction["matchingRules"]["header"]["Content-Type"]["matchers"][0]["match"],
            json!("regex")
        );
        let body = interaction["body"].as_str().unwrap();
        assert!(body.contains("name=\"users\"; filename=\"pactmock-upload-"));
        assert!(body.contains("id,name\n1,billy\n"));
    }

    #[test]
    fn multipart_bodies_need_a_readable_file() {
        let mut contract = contract(SpecificationVersion::V3);

        let outcome = UnconfiguredInteraction::new(&mut contract)
            .upon_receiving("A request to upload users")
            .with_request("POST", "/users/import")
            .unwrap()
            .multipart_body("text/csv", "/does/not/exist.csv", "users");

        assert!(matches!(outcome, Err(ContractError::UnreadableFile { .. })));
    }

    #[test]
    fn raw_bodies_keep_their_content_type() {
        let mut contract = contract(SpecificationVersion::V3);

        UnconfiguredInteraction::new(&mut contract)
            .upon_receiving("A request for a report")
            .with_request("GET", "/report")
            .unwrap()
            .query("format", "csv")
            .unwrap()
            .will_respond_with(200)
            .unwrap()
            .body("text/csv", "id,name\n1,billy\n")
            .unwrap();

        let interaction = contract.http_interactions().next().unwrap();
        assert_eq!(interaction.response().body().unwrap().content_type(), "text/csv");
        assert_eq!(interaction.request().query()["format"].len(), 1);
    }
}
