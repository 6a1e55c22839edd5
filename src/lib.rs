//! Payment bridge between clients and Indonesian payment gateways.
//!
//! Creates payments at Xendit or Nicepay, persists the outcome into a
//! normalized Postgres schema and offers an in-memory async job queue.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod payments;
pub mod services;
pub mod workers;
