//! Interpretation of directory listings for filesystems backed by FTP
//! servers or HTTP autoindex pages.
//!
//! Listings are parsed line by line with a chain of dialects, entries are
//! handed to an enumeration [`Filler`] or a [`CacheWriter`], and single
//! entries can be resolved by name. [`PathEncoder`] builds the server URLs
//! the listings are fetched from.

#[macro_use]
extern crate log;
#[macro_use]
extern crate bitflags;

pub mod cache;
mod charset;
mod config;
pub mod dialect;
mod error;
pub mod listing;
pub mod path;
mod record;
mod utils;

pub use self::{
    cache::{CacheEntry, MemoryCache},
    charset::Charsets,
    config::{Config, SourceKind},
    dialect::{Dialect, Parsed},
    error::Error,
    listing::{CacheWriter, DirEntry, Filler, ListingParser, ReadDir, Request},
    path::PathEncoder,
    record::{FileMode, FileRecord, FileType},
};
