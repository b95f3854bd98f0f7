pub mod error;
pub mod factory;
pub mod openai;
pub mod provider;
pub mod sse;

pub use error::{ApiError, SseParseError, StreamError};
pub use factory::{DefaultProviderFactory, ProviderFactory};
pub use openai::OpenAiChatProvider;
pub use provider::{CompletionRequest, CompletionStream, Provider, StreamChunk};

pub(crate) const HTTP_TIMEOUT_SECS: u64 = 300;
