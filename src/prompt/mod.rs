//! Prompt construction
//!
//! Semantic requests, the placeholder template engine, and the generators that render
//! instruction strings for the language model.

mod generators;
mod repr;
mod request;
pub mod system;
pub mod template;

pub use generators::{
    ComplexQueryGenerator, Generator, PromptGenerator, QueryGenerator, TableToNaturalGenerator,
};
pub(crate) use repr::quote;
pub use request::{ComplexQueryRequest, DbParams, Fields, NarrationRequest, QueryRequest};
pub use template::{Template, Values};
