pub mod barrier;
pub mod context;
pub mod error;
pub mod scanner;
pub mod source;
pub mod types;
