mod types;

pub mod sse;
pub mod stub;

#[cfg(test)]
pub(crate) mod scripted;

#[cfg(feature = "google")]
pub mod google;
#[cfg(feature = "openai")]
pub mod openai;

pub use types::{ChatChunk, ChatRequest, ChatStream, Provider, StartFuture};
