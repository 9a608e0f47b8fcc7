//! Client for the tax-law assistant backend
//!
//! The backend answers `/chat` requests with an answer plus the statute
//! sections and articles it matched. This module owns the wire types, the
//! `ChatBackend` seam the conversation controller talks through, and the
//! reqwest implementation used at runtime.

pub mod errors;
pub mod http;
pub mod provider;
pub mod types;

pub use errors::*;
pub use http::HttpBackend;
pub use provider::*;
pub use types::*;
