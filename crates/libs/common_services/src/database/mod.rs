mod error;
mod repositories;
mod stores;
mod utils;

pub use error::*;
pub use repositories::*;
pub use stores::*;
pub use utils::*;
