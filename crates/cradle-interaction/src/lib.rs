//! Cradle interaction layer.
//!
//! Everything that faces the content-generation service: the streaming
//! response assembler, the paced reveal scheduler, and the HTTP clients
//! for content generation and the credit ledger.

pub mod assembler;
pub mod client;
pub mod credit_client;
pub mod reveal;

pub use assembler::{ContentKind, StreamAssembler};
pub use client::HttpContentService;
pub use credit_client::HttpCreditLedger;
pub use reveal::{RevealScheduler, RevealTiming};
