use futures_util::StreamExt;
use serde_json::json;
use taskweave::catalog::AgentId;
use taskweave::error::GatewayError;
use taskweave::gateway::{AgentEvent, AgentGateway, AgentInput, HttpAgentGateway};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn host_of(server: &MockServer) -> String {
    server
        .uri()
        .strip_prefix("http://")
        .expect("mock server uri should be http")
        .to_string()
}

fn input(goal: &str) -> AgentInput {
    AgentInput::from_context(&[], goal)
}

#[tokio::test]
async fn unary_invoke_posts_to_agent_endpoint_with_api_key() {
    let server = MockServer::start().await;

    let response_body = json!({
        "output_raw": "the answer",
        "token_usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15},
        "extra_data": [{"key": "trace", "value": "t-1"}]
    });

    Mock::given(method("POST"))
        .and(path("/researcher/0.1"))
        .and(header("x-agent-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = HttpAgentGateway::new(host_of(&server), false, Some("test-key".into()));
    let response = gateway
        .invoke(&AgentId::new("researcher", "0.1"), &input("find data"))
        .await
        .unwrap();

    assert_eq!(response.output_raw, "the answer");
    assert_eq!(response.token_usage.unwrap().total_tokens, 15);
    assert_eq!(response.extra_data[0].key, "trace");
    server.verify().await;
}

#[tokio::test]
async fn non_success_status_maps_to_status_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/writer/0.1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let gateway = HttpAgentGateway::new(host_of(&server), false, None);
    let error = gateway
        .invoke(&AgentId::new("writer", "0.1"), &input("write"))
        .await
        .unwrap_err();

    match error {
        GatewayError::Status {
            agent,
            status_code,
            detail,
        } => {
            assert_eq!(agent, "writer:0.1");
            assert_eq!(status_code, 503);
            assert_eq!(detail, "overloaded");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_response_body_maps_to_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/writer/0.1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let gateway = HttpAgentGateway::new(host_of(&server), false, None);
    let error = gateway
        .invoke(&AgentId::new("writer", "0.1"), &input("write"))
        .await
        .unwrap_err();

    assert!(matches!(error, GatewayError::Decode(_)));
}

#[tokio::test]
async fn streamed_invoke_decodes_the_event_sequence() {
    let server = MockServer::start().await;

    let body = concat!(
        "event: invoke-stream\n",
        "data: {}\n",
        "\n",
        "event: partial-response\n",
        "data: {\"output_partial\":\"the \"}\n",
        "\n",
        "event: extra-data\n",
        "data: {\"items\":[{\"key\":\"trace\",\"value\":\"t-1\"}]}\n",
        "\n",
        "event: partial-response\n",
        "data: {\"output_partial\":\"answer\"}\n",
        "\n",
        "event: final-response\n",
        "data: {\"output_raw\":\"the answer\"}\n",
        "\n",
    );

    Mock::given(method("POST"))
        .and(path("/researcher/0.1/sse"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let gateway = HttpAgentGateway::new(host_of(&server), false, None);
    let mut stream = gateway
        .invoke_stream(&AgentId::new("researcher", "0.1"), &input("find data"))
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event.unwrap());
    }

    assert_eq!(events.len(), 5);
    assert!(matches!(events[0], AgentEvent::StreamStart));
    assert_eq!(
        events[1],
        AgentEvent::Partial {
            text: "the ".into()
        }
    );
    assert!(matches!(events[2], AgentEvent::ExtraData { .. }));
    match events.last().unwrap() {
        AgentEvent::Final { response } => assert_eq!(response.output_raw, "the answer"),
        other => panic!("expected terminal final event, got {other:?}"),
    }
}

#[tokio::test]
async fn streamed_error_event_is_terminal() {
    let server = MockServer::start().await;

    let body = concat!(
        "event: invoke-stream\n",
        "data: {}\n",
        "\n",
        "event: error\n",
        "data: {\"status_code\":500,\"detail\":\"agent crashed\"}\n",
        "\n",
        "event: partial-response\n",
        "data: {\"output_partial\":\"never seen\"}\n",
        "\n",
    );

    Mock::given(method("POST"))
        .and(path("/researcher/0.1/sse"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let gateway = HttpAgentGateway::new(host_of(&server), false, None);
    let mut stream = gateway
        .invoke_stream(&AgentId::new("researcher", "0.1"), &input("find data"))
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event.unwrap());
    }

    // The stream stops at the terminal error; nothing after it is surfaced.
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[1],
        AgentEvent::Error {
            status_code: 500,
            detail: "agent crashed".into(),
        }
    );
}

#[tokio::test]
async fn streaming_endpoint_rejection_surfaces_before_any_event() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/researcher/0.1/sse"))
        .respond_with(ResponseTemplate::new(401).set_body_string("missing key"))
        .mount(&server)
        .await;

    let gateway = HttpAgentGateway::new(host_of(&server), false, None);
    // `invoke_stream`'s Ok type is a boxed trait-object stream that is not
    // `Debug`, so `unwrap_err()` (which needs `T: Debug`) won't compile here;
    // `.err().expect(..)` extracts the error with identical semantics.
    let error = gateway
        .invoke_stream(&AgentId::new("researcher", "0.1"), &input("find data"))
        .await
        .err()
        .expect("expected a status error");

    assert!(matches!(
        error,
        GatewayError::Status {
            status_code: 401,
            ..
        }
    ));
}
