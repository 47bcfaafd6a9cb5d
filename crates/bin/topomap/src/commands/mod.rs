pub mod build;
pub mod diff;
pub mod render;
pub mod stats;
pub mod validate;
