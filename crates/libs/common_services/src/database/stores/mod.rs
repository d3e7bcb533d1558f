mod discovered_face_store;
mod face_job_store;
mod photo_store;

pub use discovered_face_store::*;
pub use face_job_store::*;
pub use photo_store::*;
