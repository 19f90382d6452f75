pub mod domain;
pub mod error;
pub mod metrics;
pub mod protocol;
