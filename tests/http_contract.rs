use pactmock::matchers::{array_containing, equality, integer, like, object, regex};
use pactmock::{
    BodyPrintLimit, Contract, ContractWriter, ExecutionError, HttpMockProvider, HttpMockServer,
    MockProviderConfig, PersistenceError, SpecificationVersion,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// Keeps written contracts in memory.
#[derive(Clone, Default)]
struct InMemoryWriter(Arc<Mutex<Vec<Value>>>);

impl InMemoryWriter {
    fn written(&self) -> Vec<Value> {
        self.0.lock().unwrap().clone()
    }
}

impl ContractWriter for InMemoryWriter {
    fn write_contract(&self, contract: &Contract) -> Result<(), PersistenceError> {
        self.0.lock().unwrap().push(contract.to_pact_json());
        Ok(())
    }
}

fn provider(writer: &InMemoryWriter) -> HttpMockProvider<HttpMockServer, InMemoryWriter> {
    HttpMockProvider::with_collaborators(
        MockProviderConfig::new("consumer", "provider"),
        HttpMockServer::new(BodyPrintLimit::Unlimited),
        writer.clone(),
    )
}

fn add_foobar_interaction(provider: &mut HttpMockProvider<HttpMockServer, InMemoryWriter>) {
    provider
        .add_interaction()
        .given("User foo exists")
        .upon_receiving("A request to create foobar")
        .with_request("POST", "/foobar")
        .unwrap()
        .query("baz", "bar")
        .unwrap()
        .json_body(object().field("id", like(27)))
        .unwrap()
        .will_respond_with(200)
        .unwrap()
        .json_body(object().field("name", equality("Billy")))
        .unwrap();
}

#[async_std::test]
async fn a_matching_request_is_served_and_the_contract_written() {
    // Arrange
    let writer = InMemoryWriter::default();
    let mut provider = provider(&writer);
    add_foobar_interaction(&mut provider);

    // Act
    let outcome = provider
        .execute_test(|server| async move {
            let response = reqwest::Client::new()
                .post(format!("{}/foobar?baz=bar", server.uri()))
                .json(&json!({"id": 27}))
                .send()
                .await?;
            assert_eq!(response.status().as_u16(), 200);
            let body: Value = response.json().await?;
            assert_eq!(body, json!({"name": "Billy"}));
            Ok::<_, reqwest::Error>(())
        })
        .await;

    // Assert
    assert!(outcome.is_ok(), "{:?}", outcome);
    let written = writer.written();
    assert_eq!(written.len(), 1);
    let interaction = &written[0]["interactions"][0];
    assert_eq!(
        interaction["request"]["matchingRules"],
        json!({"body": {"$.id": {"combine": "AND", "matchers": [{"match": "type"}]}}})
    );
    assert_eq!(interaction["request"]["query"], json!({"baz": ["bar"]}));
    assert_eq!(interaction["response"]["body"], json!({"name": "Billy"}));
    assert_eq!(
        written[0]["metadata"]["pactSpecification"]["version"],
        json!("3.0.0")
    );
}

#[tokio::test]
async fn a_body_of_the_wrong_type_is_reported_as_a_single_mismatch() {
    // Arrange
    let writer = InMemoryWriter::default();
    let mut provider = provider(&writer);
    add_foobar_interaction(&mut provider);

    // Act
    let error = provider
        .execute_test(|server| async move {
            let response = reqwest::Client::new()
                .post(format!("{}/foobar?baz=bar", server.uri()))
                .json(&json!({"id": "27"}))
                .send()
                .await?;
            assert_eq!(response.status().as_u16(), 500);
            Ok::<_, reqwest::Error>(())
        })
        .await
        .unwrap_err();

    // Assert
    let mismatches = error.mismatches();
    assert_eq!(mismatches.len(), 1, "{:?}", mismatches);
    assert_eq!(mismatches[0].path, "$.body.id");
    assert_eq!(mismatches[0].expected, "type:number");
    assert_eq!(mismatches[0].actual, Some(json!("27")));
    assert!(writer.written().is_empty());
}

#[async_std::test]
async fn array_containing_accepts_any_order_and_extra_elements() {
    let writer = InMemoryWriter::default();
    let mut provider = provider(&writer);
    provider
        .add_interaction()
        .upon_receiving("A request with tags")
        .with_request("POST", "/tags")
        .unwrap()
        .json_body(object().field(
            "tags",
            array_containing(vec![like("string").into(), integer(1).into()]),
        ))
        .unwrap()
        .will_respond_with(204)
        .unwrap();

    let outcome = provider
        .execute_test(|server| async move {
            let response = reqwest::Client::new()
                .post(format!("{}/tags", server.uri()))
                .json(&json!({"tags": [true, 42, null, "admin"]}))
                .send()
                .await?;
            assert_eq!(response.status().as_u16(), 204);
            Ok::<_, reqwest::Error>(())
        })
        .await;

    assert!(outcome.is_ok(), "{:?}", outcome);
}

#[async_std::test]
async fn array_containing_rejects_arrays_missing_a_shape() {
    let writer = InMemoryWriter::default();
    let mut provider = provider(&writer);
    provider
        .add_interaction()
        .upon_receiving("A request with tags")
        .with_request("POST", "/tags")
        .unwrap()
        .json_body(object().field(
            "tags",
            array_containing(vec![like("string").into(), integer(1).into()]),
        ))
        .unwrap()
        .will_respond_with(204)
        .unwrap();

    let error = provider
        .execute_test(|server| async move {
            reqwest::Client::new()
                .post(format!("{}/tags", server.uri()))
                .json(&json!({"tags": ["admin", "user"]}))
                .send()
                .await?;
            Ok::<_, reqwest::Error>(())
        })
        .await
        .unwrap_err();

    assert!(!error.mismatches().is_empty());
    assert!(error
        .mismatches()
        .iter()
        .all(|mismatch| mismatch.path.starts_with("$.body.tags")));
}

#[tokio::test]
async fn interactions_that_are_never_exercised_fail_the_test() {
    let writer = InMemoryWriter::default();
    let mut provider = provider(&writer);
    for path in ["/foo", "/bar"] {
        provider
            .add_interaction()
            .upon_receiving(&format!("A request to get {}", path))
            .with_request("GET", path)
            .unwrap()
            .will_respond_with(200)
            .unwrap();
    }

    let error = provider
        .execute_test(|server| async move {
            reqwest::get(format!("{}/foo", server.uri())).await?;
            Ok::<_, reqwest::Error>(())
        })
        .await
        .unwrap_err();

    let mismatches = error.mismatches();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].expected, "request:GET /bar");
    assert_eq!(mismatches[0].actual, None);
}

#[tokio::test]
async fn unexpected_requests_fail_the_test() {
    let writer = InMemoryWriter::default();
    let mut provider = provider(&writer);
    provider
        .add_interaction()
        .upon_receiving("A request to get foo")
        .with_request("GET", "/foo")
        .unwrap()
        .will_respond_with(200)
        .unwrap();

    let error = provider
        .execute_test(|server| async move {
            reqwest::get(format!("{}/foo", server.uri())).await?;
            let response = reqwest::get(format!("{}/unknown", server.uri())).await?;
            assert_eq!(response.status().as_u16(), 500);
            Ok::<_, reqwest::Error>(())
        })
        .await
        .unwrap_err();

    let mismatches = error.mismatches();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].expected, "no interaction");
    assert_eq!(
        mismatches[0].actual,
        Some(json!({"method": "GET", "path": "/unknown"}))
    );
}

#[async_std::test]
async fn headers_and_paths_can_be_matched_with_regexes() {
    let writer = InMemoryWriter::default();
    let mut provider = provider(&writer);
    provider
        .add_interaction()
        .upon_receiving("An authenticated request for a user")
        .with_request_path_matcher("GET", regex("/users/27", r"/users/\d+").unwrap())
        .unwrap()
        .header(
            "Authorization",
            regex("Bearer token", r"Bearer [a-z]+").unwrap(),
        )
        .unwrap()
        .will_respond_with(200)
        .unwrap()
        .header("X-Request-Id", like("abc"))
        .unwrap();

    let outcome = provider
        .execute_test(|server| async move {
            let response = reqwest::Client::new()
                .get(format!("{}/users/1234", server.uri()))
                .header("Authorization", "Bearer secret")
                .send()
                .await?;
            assert_eq!(response.status().as_u16(), 200);
            assert_eq!(response.headers()["X-Request-Id"], "abc");
            Ok::<_, reqwest::Error>(())
        })
        .await;

    assert!(outcome.is_ok(), "{:?}", outcome);
    let interaction = &writer.written()[0]["interactions"][0];
    assert_eq!(interaction["request"]["path"], json!("/users/27"));
    assert_eq!(
        interaction["request"]["matchingRules"]["path"],
        json!({"combine": "AND", "matchers": [{"match": "regex", "regex": r"/users/\d+"}]})
    );
}

#[async_std::test]
async fn the_exercise_error_is_reported_even_when_every_request_matched() {
    let writer = InMemoryWriter::default();
    let mut provider = provider(&writer);
    add_foobar_interaction(&mut provider);

    let error = provider
        .execute_test(|server| async move {
            reqwest::Client::new()
                .post(format!("{}/foobar?baz=bar", server.uri()))
                .json(&json!({"id": 1}))
                .send()
                .await?;
            Err::<(), pactmock::DynError>("the client rejected the response".into())
        })
        .await
        .unwrap_err();

    match error {
        ExecutionError::Verification(failure) => {
            assert!(failure.mismatches.is_empty());
            assert!(failure.exercise_error.is_some());
        }
        other => panic!("Unexpected error: {:?}", other),
    }
    assert!(writer.written().is_empty());
}

#[async_std::test]
async fn v2_contracts_use_the_flat_rule_notation() {
    let writer = InMemoryWriter::default();
    let mut provider = HttpMockProvider::with_collaborators(
        MockProviderConfig::new("consumer", "provider")
            .with_specification(SpecificationVersion::V2),
        HttpMockServer::default(),
        writer.clone(),
    );
    provider
        .add_interaction()
        .upon_receiving("A request for users")
        .with_request("GET", "/users")
        .unwrap()
        .query("page", "1")
        .unwrap()
        .will_respond_with(200)
        .unwrap()
        .json_body(object().field("id", like(27)))
        .unwrap();

    provider
        .execute_test(|server| async move {
            reqwest::get(format!("{}/users?page=1", server.uri())).await?;
            Ok::<_, reqwest::Error>(())
        })
        .await
        .unwrap();

    let pact = &writer.written()[0];
    assert_eq!(pact["metadata"]["pactSpecification"]["version"], json!("2.0.0"));
    let interaction = &pact["interactions"][0];
    assert_eq!(interaction["request"]["query"], json!("page=1"));
    assert_eq!(
        interaction["response"]["matchingRules"],
        json!({"$.body.id": {"match": "type"}})
    );
}

#[async_std::test]
async fn pact_files_are_written_to_the_configured_directory() {
    let pact_dir = std::env::temp_dir().join(format!("pactmock-it-{}", std::process::id()));
    let mut provider = HttpMockProvider::new(
        MockProviderConfig::new("file-consumer", "file-provider").with_pact_dir(&pact_dir),
    );
    provider
        .add_interaction()
        .upon_receiving("A request to get foo")
        .with_request("GET", "/foo")
        .unwrap()
        .will_respond_with(200)
        .unwrap();

    provider
        .execute_test(|server| async move {
            reqwest::get(format!("{}/foo", server.uri())).await?;
            Ok::<_, reqwest::Error>(())
        })
        .await
        .unwrap();

    let path = pact_dir.join("file-consumer-file-provider.json");
    let pact: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(pact["consumer"]["name"], json!("file-consumer"));
    assert_eq!(pact["provider"]["name"], json!("file-provider"));
    std::fs::remove_dir_all(pact_dir).unwrap();
}

#[async_std::test]
async fn multipart_uploads_match_whatever_their_boundary() {
    let file = std::env::temp_dir().join(format!("pactmock-import-{}.csv", std::process::id()));
    std::fs::write(&file, "id,name\n1,billy\n").unwrap();
    let writer = InMemoryWriter::default();
    let mut provider = provider(&writer);
    provider
        .add_interaction()
        .upon_receiving("A request to import users")
        .with_request("POST", "/users/import")
        .unwrap()
        .multipart_body("text/csv", &file, "users")
        .unwrap()
        .will_respond_with(200)
        .unwrap()
        .multipart_body("text/csv", &file, "report")
        .unwrap();
    std::fs::remove_file(&file).unwrap();

    let outcome = provider
        .execute_test(|server| async move {
            let part = reqwest::multipart::Part::bytes(b"id,name\n2,jane\n".to_vec())
                .file_name("other.csv")
                .mime_str("text/csv")?;
            let response = reqwest::Client::new()
                .post(format!("{}/users/import", server.uri()))
                .multipart(reqwest::multipart::Form::new().part("users", part))
                .send()
                .await?;
            assert_eq!(response.status().as_u16(), 200);
            let content_type = response.headers()["Content-Type"].to_str().unwrap().to_string();
            assert!(content_type.starts_with("multipart/form-data; boundary="));
            let body = response.text().await?;
            assert!(body.contains("name=\"report\""));
            Ok::<_, reqwest::Error>(())
        })
        .await;

    assert!(outcome.is_ok(), "{:?}", outcome);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_requests_are_each_attributed_to_their_interaction() {
    let writer = InMemoryWriter::default();
    let mut provider = provider(&writer);
    for i in 0..8 {
        provider
            .add_interaction()
            .upon_receiving(&format!("A request for item {}", i))
            .with_request("GET", format!("/item/{}", i))
            .unwrap()
            .will_respond_with(200)
            .unwrap()
            .json_body(object().field("id", i))
            .unwrap();
    }

    let outcome = provider
        .execute_test(|server| async move {
            let client = reqwest::Client::new();
            let requests = (0..8).map(|i| {
                let client = client.clone();
                let url = format!("{}/item/{}", server.uri(), i);
                async move {
                    let body: Value = client.get(url).send().await?.json().await?;
                    Ok::<_, reqwest::Error>((i, body))
                }
            });
            for outcome in futures::future::join_all(requests).await {
                let (i, body) = outcome?;
                assert_eq!(body, json!({"id": i}));
            }
            Ok::<_, reqwest::Error>(())
        })
        .await;

    assert!(outcome.is_ok(), "{:?}", outcome);
    assert_eq!(writer.written()[0]["interactions"].as_array().unwrap().len(), 8);
}
