pub mod client;
pub mod error;
pub mod normalize;
pub mod types;

pub use client::{TvMazeClient, UpdateWindow};
pub use error::CatalogError;
