#![allow(dead_code)]

pub mod anthropic_mock;
pub mod openai_mock;

pub use anthropic_mock::{anthropic_instance, setup_anthropic_mock, setup_anthropic_streaming_mock};
pub use openai_mock::{
    openai_instance, setup_openai_echo_mock, setup_openai_error_mock, setup_openai_mock,
    setup_openai_snapshot_mock, setup_openai_streaming_mock,
};
