mod export;
mod models;

pub use models::*;
