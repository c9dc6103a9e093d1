// Lettertree - Newsletter Ingestion Core
//
// This crate receives forwarded newsletter emails from the email worker,
// extracts structured content from them and stores them per subscriber.
//
// Inbound pipeline lives in domains/newsletter/; infrastructure seams in kernel/.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
