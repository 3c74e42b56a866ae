pub mod conclusion;
pub mod records;
pub mod snapshot;
