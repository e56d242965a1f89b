pub mod client;
pub mod utils;

pub use client::{ClientOptions, FetchError, ScrapingClient};
pub use reqwest::StatusCode;
