//! Core library for csv-to-playlist
pub mod config;
pub mod error;
pub mod models;
pub mod input;
pub mod api;
pub mod uploader;

pub use error::{Error, Result};
