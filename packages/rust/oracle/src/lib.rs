//! Classification oracle client.
//!
//! The sorter treats the language model as an opaque oracle: prompt text in,
//! free text out. [`Oracle`] is the capability the core consumes;
//! [`ChatOracle`] is the production implementation speaking the
//! OpenAI-compatible chat-completions protocol.

mod chat;

use std::future::Future;

use lipidsort_shared::Result;

pub use chat::{ChatOracle, ChatOracleOptions};

/// A synchronous-in-spirit text oracle: one prompt, one reply.
///
/// Callers await each reply before issuing the next prompt. Transport
/// failures are errors; whatever text comes back, however malformed, is a
/// successful reply for the response parser to deal with.
pub trait Oracle {
    fn ask(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;
}

