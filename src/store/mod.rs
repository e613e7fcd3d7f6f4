//! # Generic Store Engine
//!
//! A store is a typed [`StoreHeader`] in front of a byte space that lives either in a
//! growable memory buffer or in a file. Two record disciplines are implemented over
//! that byte space:
//!
//! * [`IndexStore`] - fixed-size elements addressed by a logical index. Element `i`
//!   lives at `(i - first_index) * element_size` within the data region and appends
//!   must target exactly `last_index + 1`.
//! * [`VlrStore`] - length-prefixed blobs (`[len: u32][payload]`) addressed by the
//!   cumulative byte offset returned from `append`.
//!
//! ## File Layout
//!
//! ```text
//! +----------------+---------------------------------------+
//! | Header (64B)   | Data region                           |
//! +----------------+---------------------------------------+
//! ```
//!
//! The header is written at creation and rewritten by [`IndexStore::commit`] /
//! [`VlrStore::commit`]. Appends to file-backed stores go through a write-behind
//! buffer (see [`StoreConfig`]), so data written since the last commit is not
//! durable. Committing is the only durability checkpoint.
//!
//! Both disciplines can be copied wholesale, or by sub-range, into memory with
//! `load_into_memory`. Partial loads are read-only.

mod backing;
mod base;
mod config;
mod header;
mod index;
mod stream;
mod vlr;

pub use base::{Location, OpenMode};
pub use config::{StoreConfig, DEFAULT_INITIAL_ALLOCATION, DEFAULT_WRITE_BUFFER};
pub(crate) use header::unix_now;
pub use header::{StoreHeader, StoreKind, LABEL_LEN, MAGIC, SIZE_HEADER};
pub use index::{IndexStore, DELETED_FLAG};
pub use stream::{IndexStream, VlrStream};
pub use vlr::{VlrStore, LENGTH_PREFIX};
