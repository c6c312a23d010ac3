use llm_broker::config::ProviderInstanceConfig;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const TEST_API_KEY: &str = "sk-test-0123456789abcdef";

/// 指向 mock 服务器的 OpenAI 兼容实例配置
pub fn openai_instance(name: &str, server: &MockServer) -> ProviderInstanceConfig {
    ProviderInstanceConfig {
        name: name.to_string(),
        enabled: true,
        api_key: TEST_API_KEY.to_string(),
        base_url: format!("{}/v1", server.uri()),
        timeout_seconds: 5,
        default_model: None,
    }
}

/// 挂载 `GET /v1/models`,用于 provider 初始化
async fn mount_models(server: &MockServer, status: u16) {
    let template = if status == 200 {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": "list",
            "data": [{"id": "gpt-4", "object": "model"}]
        }))
    } else {
        ResponseTemplate::new(status).set_body_json(serde_json::json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        }))
    };

    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(template)
        .mount(server)
        .await;
}

/// 设置返回固定内容的 OpenAI mock 服务器
///
/// # 参数
/// - `content`: 助手回复内容
/// - `expected_calls`: chat completions 预期调用次数,`None` 表示不校验
pub async fn setup_openai_mock(content: &str, expected_calls: Option<u64>) -> MockServer {
    let server = MockServer::start().await;
    mount_models(&server, 200).await;

    let mock = Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", format!("Bearer {}", TEST_API_KEY).as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(create_chat_completion_response("gpt-4", content)),
        );
    let mock = match expected_calls {
        Some(n) => mock.expect(n),
        None => mock,
    };
    mock.mount(&server).await;

    server
}

/// 设置应答模型名与请求不同的 mock,模拟厂商返回带日期的快照名
pub async fn setup_openai_snapshot_mock(served_model: &str) -> MockServer {
    let server = MockServer::start().await;
    mount_models(&server, 200).await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(create_chat_completion_response(served_model, "ok")),
        )
        .mount(&server)
        .await;

    server
}

/// 设置把最后一条用户消息原样返回的 mock,用于校验批处理顺序
pub async fn setup_openai_echo_mock() -> MockServer {
    let server = MockServer::start().await;
    mount_models(&server, 200).await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(|req: &wiremock::Request| {
            let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap_or_default();
            let prompt = body["messages"]
                .as_array()
                .and_then(|messages| messages.last())
                .and_then(|m| m["content"].as_str())
                .unwrap_or_default()
                .to_string();
            ResponseTemplate::new(200).set_body_json(create_chat_completion_response("gpt-4", &prompt))
        })
        .mount(&server)
        .await;

    server
}

/// 设置 chat completions 固定返回错误状态码的 mock
///
/// # 参数
/// - `status`: chat completions 返回的状态码
/// - `init_status`: `/v1/models` 返回的状态码
/// - `retry_after`: 可选的 `Retry-After` 响应头(秒)
pub async fn setup_openai_error_mock(status: u16, init_status: u16, retry_after: Option<u64>) -> MockServer {
    let server = MockServer::start().await;
    mount_models(&server, init_status).await;

    let mut template = ResponseTemplate::new(status).set_body_json(serde_json::json!({
        "error": {
            "message": format!("upstream returned {}", status),
            "type": "server_error",
            "code": status
        }
    }));
    if let Some(secs) = retry_after {
        template = template.append_header("Retry-After", secs.to_string().as_str());
    }

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(template)
        .mount(&server)
        .await;

    server
}

/// 设置返回 SSE 流的 OpenAI mock
pub async fn setup_openai_streaming_mock(chunks: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    mount_models(&server, 200).await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("Cache-Control", "no-cache")
                .set_body_raw(create_streaming_response(chunks).into_bytes(), "text/event-stream"),
        )
        .mount(&server)
        .await;

    server
}

/// 创建非流式 ChatCompletion 响应
pub fn create_chat_completion_response(model: &str, content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-test123",
        "object": "chat.completion",
        "created": 1234567890,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": content
            },
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": 1000,
            "completion_tokens": 500,
            "total_tokens": 1500
        }
    })
}

/// 创建流式 SSE 响应字符串
fn create_streaming_response(chunks: &[&str]) -> String {
    let mut sse_body = String::new();

    let role_chunk = serde_json::json!({
        "id": "chatcmpl-stream123",
        "object": "chat.completion.chunk",
        "created": 1234567890,
        "model": "gpt-4",
        "choices": [{"index": 0, "delta": {"role": "assistant", "content": ""}, "finish_reason": null}]
    });
    sse_body.push_str(&format!("data: {}\n\n", role_chunk));

    for chunk in chunks {
        let content_chunk = serde_json::json!({
            "id": "chatcmpl-stream123",
            "object": "chat.completion.chunk",
            "created": 1234567890,
            "model": "gpt-4",
            "choices": [{"index": 0, "delta": {"content": chunk}, "finish_reason": null}]
        });
        sse_body.push_str(&format!("data: {}\n\n", content_chunk));
    }

    sse_body.push_str("data: [DONE]\n\n");
    sse_body
}
