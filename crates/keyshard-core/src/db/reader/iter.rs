use crate::{
    db::{
        filter::RecordPredicate,
        reader::ShardReader,
        record::Record,
        store::{OrderedRangeStore, ResumeCursor},
    },
    error::InternalError,
    key::Key,
    model::EntityModel,
    obs::sink::{self, MetricsEvent},
};
use std::{collections::VecDeque, sync::Arc};

///
/// ShardIter
///
/// Lazy iterator over one reader's `(key, record)` pairs in ascending key
/// order, range by range. Every yielded (or locally filtered) record moves
/// the reader's checkpoint forward.
///
/// A store error is returned as an item and leaves the reader at its last
/// consumed record; calling `next` again retries the same fetch.
///

pub struct ShardIter<'a> {
    reader: &'a mut ShardReader,
    model: Arc<EntityModel>,
    store: &'a dyn OrderedRangeStore,
    predicate: Option<RecordPredicate>,
    buffer: VecDeque<Record>,
    pending_cursor: Option<ResumeCursor>,
    page_more: bool,
    page_open: bool,
    page_filtered: u64,
    finished: bool,
}

impl<'a> ShardIter<'a> {
    pub(super) fn new(
        reader: &'a mut ShardReader,
        model: Arc<EntityModel>,
        store: &'a dyn OrderedRangeStore,
        predicate: Option<RecordPredicate>,
    ) -> Self {
        Self {
            reader,
            model,
            store,
            predicate,
            buffer: VecDeque::new(),
            pending_cursor: None,
            page_more: false,
            page_open: false,
            page_filtered: 0,
            finished: false,
        }
    }

    /// Serialized reader state as of the last consumed record.
    pub fn checkpoint(&self) -> Result<serde_json::Value, InternalError> {
        self.reader.to_json()
    }

    /// Borrow the underlying reader.
    #[must_use]
    pub fn reader(&self) -> &ShardReader {
        &*self.reader
    }

    // Hand out buffered rows, moving the checkpoint past each one.
    fn next_buffered(&mut self) -> Option<(Key, Record)> {
        while let Some(record) = self.buffer.pop_front() {
            if let Some(range) = &self.reader.current_key_range {
                self.reader.current_key_range = Some(range.advance_past(record.key()));
            }
            let keep = self
                .predicate
                .as_ref()
                .is_none_or(|predicate| predicate(&record));
            if !keep {
                self.page_filtered += 1;
            }
            if self.buffer.is_empty() {
                self.close_page();
            }

            if keep {
                return Some((record.key().clone(), record));
            }
        }

        None
    }

    // Commit a fully consumed page: keep its cursor, or close the range.
    fn close_page(&mut self) {
        if !self.page_open {
            return;
        }
        self.page_open = false;
        self.reader.resume_cursor = self.pending_cursor.take();

        if self.page_filtered > 0 {
            sink::record(MetricsEvent::RowsFiltered {
                entity_path: self.model.path(),
                rows_filtered: self.page_filtered,
            });
            self.page_filtered = 0;
        }

        if !self.page_more {
            self.reader.finish_current_range();
        }
    }

    fn fetch_next_page(&mut self) -> Result<bool, InternalError> {
        let Some(range) = self.reader.next_range(self.store)? else {
            return Ok(false);
        };
        let query = range.make_ascending_query(&self.model, false, &self.reader.filters)?;

        let page = self.store.fetch_page(
            &query,
            self.reader.batch_size,
            self.reader.resume_cursor.as_ref(),
        )?;

        let mut rows = 0u64;
        for record in page.records {
            rows += 1;
            self.buffer.push_back(record);
        }

        tracing::trace!(
            entity = self.model.path(),
            partition = range.partition().unwrap_or_default(),
            rows,
            more = page.more,
            "reader page fetched"
        );
        sink::record(MetricsEvent::PageFetched {
            entity_path: self.model.path(),
            rows,
        });
        sink::record(MetricsEvent::RowsScanned {
            entity_path: self.model.path(),
            rows_scanned: rows,
        });

        // The narrowed range now covers everything before this page.
        self.reader.resume_cursor = None;
        self.page_more = page.more && page.next_cursor.is_some();
        self.pending_cursor = page.next_cursor;
        self.page_open = true;

        Ok(true)
    }
}

impl Iterator for ShardIter<'_> {
    type Item = Result<(Key, Record), InternalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            if let Some(item) = self.next_buffered() {
                return Some(Ok(item));
            }
            self.close_page();

            match self.fetch_next_page() {
                Ok(true) => {}
                Ok(false) => {
                    self.finished = true;
                    tracing::debug!(entity = self.model.path(), "shard reader exhausted");
                    sink::record(MetricsEvent::ReaderExhausted {
                        entity_path: self.model.path(),
                    });

                    return None;
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
