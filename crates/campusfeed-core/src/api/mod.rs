//! HTTP seams for the external content sources.
//!
//! Content comes from two places:
//! - a serverless search function, invoked with `{index, categories}` and
//!   answering with a double-encoded search envelope
//! - a document table, read with a filtered scan on `documentType`
//!
//! Both are exposed as traits so the content client can be driven by fakes.

pub mod dynamo;
pub mod error;
pub mod lambda;

pub use dynamo::{DocumentTable, DynamoTable};
pub use error::FetchError;
pub use lambda::{decode_search_envelope, LambdaInvoker, SearchFunction, SearchRequest};
