//! Client for a food and health tracking backend: photo → nutrition analysis
//! through a multimodal model, plus typed access to the backend REST API.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

pub use error::{ClientError, ClientResult};
