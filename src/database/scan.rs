//! Table and index scans
//!
//! Both scans own their store iterator and close it when dropped, so a
//! stream that is exhausted, limited or aborted releases it on the spot.

use std::rc::Rc;
use std::sync::Arc;

use crate::document::encoding::prefix_end;
use crate::document::StoredDocument;
use crate::engine::{iterator_error, IteratorOptions, Store, StoreIterator};
use crate::errors::{DbError, DbResult};
use crate::observability::MetricsRegistry;
use crate::planner::IndexRange;
use crate::stream::{BoxedDocument, Stream};

use super::table::decode_record;

/// Wraps a scan into a document stream
pub fn into_stream<'a, I>(scan: I) -> Stream<'a>
where
    I: Iterator<Item = DbResult<StoredDocument>> + 'a,
{
    Stream::new(Box::new(
        scan.map(|doc| doc.map(|d| Box::new(d) as BoxedDocument<'a>)),
    ))
}

/// Every document of a table in key order
pub struct TableScan {
    table: String,
    it: Box<dyn StoreIterator>,
    started: bool,
    done: bool,
    scanned: u64,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl TableScan {
    pub(crate) fn new(
        table: &str,
        it: Box<dyn StoreIterator>,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        Self {
            table: table.to_string(),
            it,
            started: false,
            done: false,
            scanned: 0,
            metrics,
        }
    }
}

impl Iterator for TableScan {
    type Item = DbResult<StoredDocument>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.started {
            self.it.next();
        } else {
            // Empty pivot: first key going forward, last key in reverse
            self.it.seek(&[]);
            self.started = true;
        }

        let item = match self.it.item() {
            Some(item) => item,
            None => {
                self.done = true;
                return iterator_error(self.it.as_ref()).err().map(Err);
            }
        };

        self.scanned += 1;
        let record = decode_record(&self.table, item.key(), item.value());
        if record.is_err() {
            self.done = true;
        }
        Some(record)
    }
}

impl Drop for TableScan {
    fn drop(&mut self) {
        let _ = self.it.close();
        if let Some(metrics) = &self.metrics {
            metrics.add_documents_scanned(self.scanned);
        }
    }
}

/// Documents reached through index entries within a range
pub struct IndexScan {
    table: String,
    it: Box<dyn StoreIterator>,
    index_store: Rc<dyn Store>,
    table_store: Rc<dyn Store>,
    range: IndexRange,
    reverse: bool,
    started: bool,
    done: bool,
    scanned: u64,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl IndexScan {
    pub(crate) fn new(
        table: &str,
        it: Box<dyn StoreIterator>,
        index_store: Rc<dyn Store>,
        table_store: Rc<dyn Store>,
        range: IndexRange,
        reverse: bool,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        Self {
            table: table.to_string(),
            it,
            index_store,
            table_store,
            range,
            reverse,
            started: false,
            done: false,
            scanned: 0,
            metrics,
        }
    }

    fn position(&mut self) -> DbResult<()> {
        if !self.reverse {
            let pivot = self.range.lower.clone().unwrap_or_default();
            self.it.seek(&pivot);
            return Ok(());
        }

        // Every key below prefix_end(upper) is within the upper bound
        let pivot = self
            .range
            .upper
            .as_deref()
            .and_then(prefix_end)
            .unwrap_or_default();
        self.it.seek(&pivot);

        // A failed reverse seek means the pivot is either below the first
        // key (nothing in range) or past the last key (start from the end)
        if !pivot.is_empty()
            && !self.it.valid()
            && self.it.err().is_none()
            && self.is_past_last_key(&pivot)?
        {
            self.it.seek(&[]);
        }
        Ok(())
    }

    /// True when no index entry sorts at or after `pivot`
    fn is_past_last_key(&self, pivot: &[u8]) -> DbResult<bool> {
        let mut forward = self.index_store.iterator(IteratorOptions::forward())?;
        forward.seek(pivot);
        let past = !forward.valid();
        let failed = iterator_error(forward.as_ref());
        forward.close()?;
        failed.map(|_| past)
    }

    /// Advances to the next in-range entry and returns its table key
    fn next_table_key(&mut self) -> Option<DbResult<Vec<u8>>> {
        loop {
            if self.started {
                self.it.next();
            } else {
                self.started = true;
                if let Err(err) = self.position() {
                    self.done = true;
                    return Some(Err(err));
                }
            }

            let item = match self.it.item() {
                Some(item) => item,
                None => {
                    self.done = true;
                    return iterator_error(self.it.as_ref()).err().map(Err);
                }
            };

            let key = item.key();
            if self.reverse {
                if !self.range.below_upper(key) {
                    continue;
                }
                if !self.range.above_lower(key) {
                    self.done = true;
                    return None;
                }
            } else if !self.range.below_upper(key) {
                self.done = true;
                return None;
            }

            return Some(Ok(item.value_copy()));
        }
    }

    fn fetch(&self, table_key: &[u8]) -> DbResult<StoredDocument> {
        let bytes = self.table_store.get(table_key).map_err(|err| {
            if err.is_key_not_found() {
                DbError::data_corruption(format!(
                    "index entry points at a missing document in table '{}'",
                    self.table
                ))
            } else {
                err
            }
        })?;
        decode_record(&self.table, table_key, &bytes)
    }
}

impl Iterator for IndexScan {
    type Item = DbResult<StoredDocument>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let record = match self.next_table_key()? {
            Ok(table_key) => {
                self.scanned += 1;
                self.fetch(&table_key)
            }
            Err(err) => Err(err),
        };
        if record.is_err() {
            self.done = true;
        }
        Some(record)
    }
}

impl Drop for IndexScan {
    fn drop(&mut self) {
        let _ = self.it.close();
        if let Some(metrics) = &self.metrics {
            metrics.add_documents_scanned(self.scanned);
        }
    }
}
