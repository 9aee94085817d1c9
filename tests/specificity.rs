use pactmock::matchers::regex;
use pactmock::{DynError, HttpMockProvider, MockProviderConfig};

fn provider() -> HttpMockProvider {
    let pact_dir = std::env::temp_dir().join(format!("pactmock-specificity-{}", std::process::id()));
    HttpMockProvider::new(MockProviderConfig::new("consumer", "provider").with_pact_dir(pact_dir))
}

#[async_std::test]
async fn a_literal_path_wins_over_a_regex_path() {
    // Arrange
    let mut provider = provider();
    provider
        .add_interaction()
        .upon_receiving("A request for any four-letter resource")
        .with_request("GET", regex("/wxyz", "^/[a-z]{4}$").unwrap())
        .unwrap()
        .will_respond_with(201)
        .unwrap();
    provider
        .add_interaction()
        .upon_receiving("A request for abcd")
        .with_request("GET", "/abcd")
        .unwrap()
        .will_respond_with(200)
        .unwrap();

    // Act
    let outcome = provider
        .execute_test(|server| async move {
            let exact = reqwest::get(format!("{}/abcd", server.uri())).await?;
            let other = reqwest::get(format!("{}/wxyz", server.uri())).await?;

            // Assert
            assert_eq!(exact.status().as_u16(), 200);
            assert_eq!(other.status().as_u16(), 201);
            Ok::<_, DynError>(())
        })
        .await;
    assert!(outcome.is_ok(), "{:?}", outcome);
}

#[async_std::test]
async fn equally_specific_interactions_are_tried_in_insertion_order() {
    // Arrange
    let mut provider = provider();
    for (description, status) in [("A first request for abcd", 200), ("A second request for abcd", 201)] {
        provider
            .add_interaction()
            .upon_receiving(description)
            .with_request("GET", "/abcd")
            .unwrap()
            .will_respond_with(status)
            .unwrap();
    }

    // Act
    let error = provider
        .execute_test(|server| async move {
            let response = reqwest::get(format!("{}/abcd", server.uri())).await?;

            // Assert
            assert_eq!(response.status().as_u16(), 200);
            Ok::<_, DynError>(())
        })
        .await
        .unwrap_err();
    // The second interaction is never reached.
    assert_eq!(error.mismatches().len(), 1);
    assert_eq!(error.mismatches()[0].expected, "request:GET /abcd");
}
