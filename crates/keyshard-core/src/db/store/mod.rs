//! Ordered range stores.
//!
//! The splitter and readers talk to storage through [`OrderedRangeStore`]
//! only: one paged, ordered range fetch plus partition discovery. Each
//! backend ships one adapter; [`MemoryStore`] is the bundled one.

mod cursor;
mod memory;

use crate::{
    db::{query::RangeQuery, record::Record},
    error::{ErrorClass, ErrorDetail, ErrorOrigin, InternalError},
    key::Key,
};
use derive_more::Deref;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error as ThisError;

pub(crate) use cursor::CursorToken;
pub use memory::MemoryStore;

///
/// StoreError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum StoreError {
    #[error("invalid resume cursor: {reason}")]
    InvalidCursor { reason: String },

    #[error("page size must be at least 1")]
    InvalidPageSize,

    #[error("store backend failure: {message}")]
    Backend { message: String },
}

impl StoreError {
    pub(crate) fn invalid_cursor(reason: impl Into<String>) -> Self {
        Self::InvalidCursor {
            reason: reason.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidCursor { .. } => ErrorClass::Corruption,
            Self::InvalidPageSize => ErrorClass::Unsupported,
            Self::Backend { .. } => ErrorClass::Internal,
        }
    }
}

impl From<StoreError> for InternalError {
    fn from(err: StoreError) -> Self {
        Self::with_detail(
            err.class(),
            ErrorOrigin::Store,
            err.to_string(),
            ErrorDetail::Store(err),
        )
    }
}

///
/// ResumeCursor
///
/// Opaque, store-issued token marking the position after the last row of a
/// page. Callers only carry it between fetches (and through serialized
/// readers); its bytes mean something to the issuing store alone.
///

#[derive(Clone, Debug, Deref, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResumeCursor(#[serde(with = "serde_bytes")] Vec<u8>);

impl ResumeCursor {
    #[must_use]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

///
/// Page
///
/// One batch of rows in query order. `next_cursor` resumes after the last
/// row; `more` is false once the backend has nothing further to return.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,
    pub next_cursor: Option<ResumeCursor>,
    pub more: bool,
}

///
/// OrderedRangeStore
///
/// Backend able to run ordered, optionally keys-only range queries with
/// cursor-based paging, scoped by partition.
///

pub trait OrderedRangeStore: Send + Sync {
    /// Fetch at most `limit` rows of `query`, resuming after `cursor`.
    ///
    /// A cursor is only valid for the query shape that produced it, except
    /// that the lower primary-key bound may be tightened between fetches.
    fn fetch_page(
        &self,
        query: &RangeQuery,
        limit: usize,
        cursor: Option<&ResumeCursor>,
    ) -> Result<Page, InternalError>;

    /// Partition names that hold rows of `entity`, in ascending order.
    /// The default partition is reported as the empty string.
    fn partitions(&self, entity: &str) -> Result<Vec<String>, InternalError>;
}

///
/// KeyScan
///
/// Lazy iterator over the primary keys of a query, fetched page by page.
/// The scan stops for good after the first backend error.
///

pub struct KeyScan<'a> {
    store: &'a dyn OrderedRangeStore,
    query: RangeQuery,
    page_size: usize,
    buffer: VecDeque<Key>,
    cursor: Option<ResumeCursor>,
    more: bool,
    pages: u64,
}

impl<'a> KeyScan<'a> {
    #[must_use]
    pub fn new(store: &'a dyn OrderedRangeStore, query: RangeQuery, page_size: usize) -> Self {
        Self {
            store,
            query,
            page_size,
            buffer: VecDeque::new(),
            cursor: None,
            more: true,
            pages: 0,
        }
    }

    /// Pages fetched so far.
    #[must_use]
    pub const fn pages(&self) -> u64 {
        self.pages
    }
}

impl Iterator for KeyScan<'_> {
    type Item = Result<Key, InternalError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(key) = self.buffer.pop_front() {
                return Some(Ok(key));
            }
            if !self.more {
                return None;
            }

            let page = match self
                .store
                .fetch_page(&self.query, self.page_size, self.cursor.as_ref())
            {
                Ok(page) => page,
                Err(err) => {
                    self.more = false;
                    return Some(Err(err));
                }
            };
            self.pages += 1;

            self.more = page.more && page.next_cursor.is_some();
            self.cursor = page.next_cursor;
            self.buffer
                .extend(page.records.into_iter().map(|record| record.into_parts().0));
        }
    }
}
