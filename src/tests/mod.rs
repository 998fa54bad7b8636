//! Crate-level tests over a real SQLite database in a temporary directory.
//!
//! - **support**: database, fixture and HTTP helpers shared by the modules below
//! - **registry_tests**: periods, enrollments and the access gate
//! - **review_tests**: review creation rules and tree listing
//! - **catalog_tests**: categories, book search, uploads, favorites and the activity log
//! - **account_tests**: password changes, admin bootstrap and user listing
//! - **api_tests**: end-to-end HTTP flows through the router
//! - **config_tests**, **error_tests**, **db_tests**: ambient layers

mod support;

mod api_tests;
