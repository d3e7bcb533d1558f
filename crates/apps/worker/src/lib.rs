#![deny(clippy::unwrap_used)]
#![allow(
    clippy::cognitive_complexity,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod analyzer;
pub mod context;
pub mod fetcher;
pub mod handlers;
pub mod jobs;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;
