#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::struct_excessive_bools
)]
mod database;
mod face;

pub use database::*;
pub use face::*;
