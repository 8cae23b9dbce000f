pub mod broadcast;
pub mod config;
pub mod console;
pub mod duplex;
pub mod error;
pub mod runtime;
