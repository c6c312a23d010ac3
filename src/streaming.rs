use crate::error::{AppError, Result};
use crate::models::{anthropic::StreamEvent, openai::ChatCompletionChunk};
use eventsource_stream::{EventStreamError, Eventsource};
use futures::future;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;

/// Incremental text chunks from a streaming completion
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Outcome of parsing one SSE event
#[derive(Debug)]
enum Step {
    Text(String),
    Skip,
    Done,
    Error(AppError),
}

/// Convert an OpenAI-style SSE response into text chunks.
/// Ends at `[DONE]` or after the first error.
pub fn openai_text_stream(response: reqwest::Response, provider: String) -> TextStream {
    text_stream(response, provider, parse_openai_event)
}

/// Convert an Anthropic Messages SSE response into text chunks.
/// Ends at `message_stop` or after the first error.
pub fn anthropic_text_stream(response: reqwest::Response, provider: String) -> TextStream {
    text_stream(response, provider, parse_anthropic_event)
}

fn text_stream(
    response: reqwest::Response,
    provider: String,
    parse: fn(&str, &str) -> Step,
) -> TextStream {
    let stream = response
        .bytes_stream()
        .eventsource()
        .map(move |event| match event {
            Ok(event) => parse(&provider, &event.data),
            Err(EventStreamError::Transport(e)) => Step::Error(AppError::HttpRequest(e)),
            Err(e) => Step::Error(AppError::ConversionError(format!(
                "{}: malformed event stream: {}",
                provider, e
            ))),
        })
        .scan(false, |finished, step| {
            if *finished {
                return future::ready(None);
            }
            let item = match step {
                Step::Text(text) => Some(Some(Ok(text))),
                Step::Skip => Some(None),
                Step::Done => None,
                Step::Error(e) => {
                    *finished = true;
                    Some(Some(Err(e)))
                }
            };
            future::ready(item)
        })
        .filter_map(future::ready);

    Box::pin(stream)
}

fn parse_openai_event(provider: &str, data: &str) -> Step {
    let data = data.trim();
    if data == "[DONE]" {
        return Step::Done;
    }
    if data.is_empty() {
        return Step::Skip;
    }

    match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|text| !text.is_empty())
            .map_or(Step::Skip, Step::Text),
        Err(e) => Step::Error(AppError::ConversionError(format!(
            "{}: invalid stream chunk: {}",
            provider, e
        ))),
    }
}

fn parse_anthropic_event(provider: &str, data: &str) -> Step {
    let event: StreamEvent = match serde_json::from_str(data) {
        Ok(event) => event,
        Err(e) => {
            return Step::Error(AppError::ConversionError(format!(
                "{}: invalid stream event: {}",
                provider, e
            )))
        }
    };

    match event.event_type.as_str() {
        "content_block_delta" => event
            .delta
            .and_then(|delta| delta.text)
            .filter(|text| !text.is_empty())
            .map_or(Step::Skip, Step::Text),
        "message_stop" => Step::Done,
        "error" => {
            let (error_type, message) = event
                .error
                .map(|e| (e.error_type, e.message))
                .unwrap_or_else(|| ("unknown_error".to_string(), "stream error".to_string()));
            Step::Error(anthropic_stream_error(provider, &error_type, message))
        }
        _ => Step::Skip,
    }
}

fn anthropic_stream_error(provider: &str, error_type: &str, message: String) -> AppError {
    let provider = provider.to_string();
    match error_type {
        "overloaded_error" | "api_error" => AppError::ServiceUnavailable { provider, message },
        "rate_limit_error" => AppError::RateLimited {
            provider,
            message,
            retry_after_secs: None,
        },
        "authentication_error" | "permission_error" => AppError::Authentication { provider, message },
        "invalid_request_error" | "not_found_error" | "request_too_large" => {
            AppError::BadRequest { provider, message }
        }
        _ => AppError::Unknown {
            provider,
            status: None,
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_openai_event() {
        let chunk = r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        assert!(matches!(parse_openai_event("p", chunk), Step::Text(t) if t == "Hel"));

        let role_only = r#"{"id":"c1","choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert!(matches!(parse_openai_event("p", role_only), Step::Skip));

        assert!(matches!(parse_openai_event("p", "[DONE]"), Step::Done));
        assert!(matches!(parse_openai_event("p", "{oops"), Step::Error(_)));
    }

    #[test]
    fn test_parse_anthropic_event() {
        let delta = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#;
        assert!(matches!(parse_anthropic_event("p", delta), Step::Text(t) if t == "Hi"));

        let ping = r#"{"type":"ping"}"#;
        assert!(matches!(parse_anthropic_event("p", ping), Step::Skip));

        let stop = r#"{"type":"message_stop"}"#;
        assert!(matches!(parse_anthropic_event("p", stop), Step::Done));
    }

    #[test]
    fn test_anthropic_error_event_is_classified() {
        let overloaded = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        match parse_anthropic_event("claude", overloaded) {
            Step::Error(e) => {
                assert_eq!(e.kind(), ErrorKind::ServiceUnavailable);
                assert!(e.to_string().contains("Overloaded"));
            }
            other => panic!("expected error, got {:?}", other),
        }
    }
}
