//! Natural-language to form/table definitions.
//!
//! A use case goes to a generation model, the reply is cleaned, parsed
//! (repaired when needed), normalized into a [`dsl::Definition`] and stored
//! under an id.

pub mod api;
pub mod config;
pub mod convert;
pub mod dsl;
pub mod edit;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod store;

pub use api::{ApiResponse, FormService};
pub use config::Config;
pub use error::{ErrorBody, FormgenError, SchemaError};
pub use pipeline::Pipeline;
