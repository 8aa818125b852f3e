//! Application services layer scaffolding.

pub mod content;
pub mod error;
pub mod feed;
pub mod pagination;
pub mod render;
