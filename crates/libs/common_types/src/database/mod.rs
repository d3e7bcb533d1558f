mod discovered_face;
mod face_job;
mod photo;

pub use discovered_face::*;
pub use face_job::*;
pub use photo::*;
