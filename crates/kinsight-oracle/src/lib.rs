//! Oracle abstraction: the single boundary behind which all natural-language
//! reasoning lives.
//!
//! Every call site declares a template with an explicit output JSON Schema.
//! Outputs failing validation are an [`OracleError::ContractViolation`],
//! never silently coerced. Retries reuse identical inputs, which is safe
//! because stage inputs are fully captured by artifact references.

mod http;
mod retry;
mod schema;
mod scripted;
mod types;

pub use http::HttpOracle;
pub use retry::RetryingOracle;
pub use schema::validate_output;
pub use scripted::ScriptedOracle;
pub use types::{Oracle, OracleError, OracleRequest, OracleResponse, TemplateId};
