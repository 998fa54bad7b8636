//! # Biblioteca Backend Library
//!
//! Core library of a university digital library: a book catalog backed by
//! object storage, threaded reviews, and access gated by academic period and
//! enrollment, served as a JSON API.
//!
//! ## Core Components
//!
//! - [`reviews`]: review creation rules and thread forest assembly
//! - [`registry`]: academic periods, enrollments and the access gate
//! - [`catalog`]: categories, books, search and pagination, favorites, read/download log
//! - [`dashboard`]: admin totals
//! - [`storage`]: the object storage gateway (S3 or in-memory)
//! - [`accounts`], [`auth`]: user accounts, password changes, admin bootstrap, hashing and JWTs
//! - [`config`]: layered configuration
//! - [`db`]: connection pool and schema
//! - [`error`]: the application error type and its HTTP mapping
//! - [`middleware`], [`routes`]: the HTTP surface
//! - [`metrics`], [`state`], [`types`]: counters, shared state and DTOs

pub mod accounts;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod registry;
pub mod reviews;
pub mod routes;
pub mod state;
pub mod storage;
pub mod types;

#[cfg(test)]
mod tests;
