//! edicola: a blog front-end over a headless content API.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
