pub mod clustering;
pub mod dbscan;
