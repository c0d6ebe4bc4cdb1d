//! docroute - document field extraction with confidence-based routing.
//!
//! Submits documents to an external analysis service, compares the
//! extracted field's confidence against a threshold, and either accepts the
//! value or files the document for human review.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod gateway;
pub mod http_client;
pub mod models;
pub mod retry;
pub mod review;
pub mod server;
pub mod services;
pub mod storage;
