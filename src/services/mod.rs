pub mod mastery;
pub mod selector;
pub mod sessions;
pub mod sm2;
pub mod summary;
