//! folio: published-content snapshot cache, request routing and view-model
//! binding.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
