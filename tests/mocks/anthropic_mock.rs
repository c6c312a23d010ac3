use llm_broker::config::AnthropicInstanceConfig;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const TEST_ANTHROPIC_KEY: &str = "sk-ant-test-0123456789";

/// 指向 mock 服务器的 Anthropic 实例配置
pub fn anthropic_instance(name: &str, server: &MockServer) -> AnthropicInstanceConfig {
    AnthropicInstanceConfig {
        name: name.to_string(),
        enabled: true,
        api_key: TEST_ANTHROPIC_KEY.to_string(),
        base_url: server.uri(),
        timeout_seconds: 5,
        api_version: "2023-06-01".to_string(),
        default_model: None,
    }
}

async fn mount_models(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("x-api-key", TEST_ANTHROPIC_KEY))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"id": "claude-3-haiku-20240307", "type": "model"}],
            "has_more": false
        })))
        .mount(server)
        .await;
}

/// 设置 Anthropic Messages API mock 服务器
///
/// 请求必须带 `x-api-key` 与 `anthropic-version` 头
pub async fn setup_anthropic_mock(text: &str) -> MockServer {
    let server = MockServer::start().await;
    mount_models(&server).await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", TEST_ANTHROPIC_KEY))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(create_messages_response(
            "claude-3-haiku-20240307",
            text,
        )))
        .mount(&server)
        .await;

    server
}

/// 设置返回 SSE 事件流的 Anthropic mock
///
/// `error_type` 不为空时,在文本之后发送一个 error 事件代替 `message_stop`
pub async fn setup_anthropic_streaming_mock(chunks: &[&str], error_type: Option<&str>) -> MockServer {
    let server = MockServer::start().await;
    mount_models(&server).await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(create_streaming_response(chunks, error_type).into_bytes(), "text/event-stream"),
        )
        .mount(&server)
        .await;

    server
}

fn create_messages_response(model: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "msg_test123",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": text}],
        "model": model,
        "stop_reason": "end_turn",
        "stop_sequence": null,
        "usage": {"input_tokens": 12, "output_tokens": 6}
    })
}

fn push_event(body: &mut String, event: &str, data: serde_json::Value) {
    body.push_str(&format!("event: {}\ndata: {}\n\n", event, data));
}

fn create_streaming_response(chunks: &[&str], error_type: Option<&str>) -> String {
    let mut body = String::new();

    push_event(
        &mut body,
        "message_start",
        serde_json::json!({
            "type": "message_start",
            "message": {"id": "msg_stream", "type": "message", "role": "assistant", "content": [],
                        "model": "claude-3-haiku-20240307", "usage": {"input_tokens": 12, "output_tokens": 1}}
        }),
    );
    push_event(
        &mut body,
        "content_block_start",
        serde_json::json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
    );
    push_event(&mut body, "ping", serde_json::json!({"type": "ping"}));

    for chunk in chunks {
        push_event(
            &mut body,
            "content_block_delta",
            serde_json::json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": chunk}}),
        );
    }

    match error_type {
        Some(error_type) => push_event(
            &mut body,
            "error",
            serde_json::json!({"type": "error", "error": {"type": error_type, "message": "Overloaded"}}),
        ),
        None => {
            push_event(
                &mut body,
                "content_block_stop",
                serde_json::json!({"type": "content_block_stop", "index": 0}),
            );
            push_event(
                &mut body,
                "message_delta",
                serde_json::json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 6}}),
            );
            push_event(&mut body, "message_stop", serde_json::json!({"type": "message_stop"}));
        }
    }

    body
}
