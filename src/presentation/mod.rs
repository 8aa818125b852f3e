//! View models and template bindings for the public pages.

pub mod views;
