pub mod flush;
pub mod loader;
pub mod photo;
pub mod progress;
pub mod session;

pub mod common;
