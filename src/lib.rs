pub mod annotate;
pub mod error;
pub mod files;
pub mod filter;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod qc;
pub mod reference;
pub mod summary;
pub mod types;
pub mod variants;

#[cfg(feature = "plotting")]
pub mod plotting;
