//! Categories and books: admin creation, public search and lookup, plus the
//! per-reader favorites list and the read/download log.

pub mod activity;
pub mod books;
pub mod categories;
pub mod favorites;

pub use books::{BookFile, BookQuery, NewBook, Page, PageQuery};
