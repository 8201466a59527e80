pub mod parser;
pub mod chunker;
pub mod context;
pub mod error;
pub mod config;
pub mod backend;
pub mod analysis;
pub mod aggregate;
pub mod stream;
pub mod evaluation;
pub mod sample;
