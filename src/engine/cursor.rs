//! Generic store iterator over a backend cursor
//!
//! Backends only provide a raw bidirectional cursor. `CursorIterator` adds
//! the iterator contract on top: cancellation checks on every step, sticky
//! errors, reverse seeking and idempotent close.

use std::cmp::Ordering;

use crate::errors::{DbError, DbResult};

use super::cancel::CancellationToken;
use super::{Item, StoreIterator};

/// Key/value pair returned by a raw cursor
pub type Entry = (Vec<u8>, Vec<u8>);

/// Bidirectional cursor provided by a backend
pub trait RawCursor {
    fn first(&mut self) -> DbResult<Option<Entry>>;

    fn last(&mut self) -> DbResult<Option<Entry>>;

    /// Moves to the first key >= `key`
    fn seek(&mut self, key: &[u8]) -> DbResult<Option<Entry>>;

    fn next(&mut self) -> DbResult<Option<Entry>>;

    fn prev(&mut self) -> DbResult<Option<Entry>>;
}

/// Store iterator built on a raw cursor
pub struct CursorIterator<C: RawCursor> {
    cursor: Option<C>,
    cancel: CancellationToken,
    reverse: bool,
    current: Option<Entry>,
    err: Option<DbError>,
}

impl<C: RawCursor> CursorIterator<C> {
    pub fn new(cursor: C, cancel: CancellationToken, reverse: bool) -> Self {
        Self {
            cursor: Some(cursor),
            cancel,
            reverse,
            current: None,
            err: None,
        }
    }

    fn position(&mut self, pivot: &[u8]) -> DbResult<Option<Entry>> {
        self.cancel.check()?;
        let cursor = match self.cursor.as_mut() {
            Some(cursor) => cursor,
            None => return Ok(None),
        };

        if !self.reverse {
            return if pivot.is_empty() {
                cursor.first()
            } else {
                cursor.seek(pivot)
            };
        }

        if pivot.is_empty() {
            return cursor.last();
        }

        // Land on the first key >= pivot, then walk back past larger keys.
        // A pivot beyond every key leaves the iterator exhausted.
        let mut entry = cursor.seek(pivot)?;
        while let Some((key, _)) = &entry {
            if key.as_slice().cmp(pivot) != Ordering::Greater {
                break;
            }
            entry = cursor.prev()?;
        }
        Ok(entry)
    }

    fn advance(&mut self) -> DbResult<Option<Entry>> {
        self.cancel.check()?;
        match self.cursor.as_mut() {
            Some(cursor) if self.reverse => cursor.prev(),
            Some(cursor) => cursor.next(),
            None => Ok(None),
        }
    }

    fn record(&mut self, result: DbResult<Option<Entry>>) {
        match result {
            Ok(entry) => self.current = entry,
            Err(err) => {
                self.current = None;
                self.err = Some(err);
            }
        }
    }
}

impl<C: RawCursor> StoreIterator for CursorIterator<C> {
    fn seek(&mut self, pivot: &[u8]) {
        if self.err.is_some() {
            return;
        }
        let result = self.position(pivot);
        self.record(result);
    }

    fn valid(&self) -> bool {
        self.err.is_none() && self.current.is_some()
    }

    fn next(&mut self) {
        if !self.valid() {
            return;
        }
        let result = self.advance();
        self.record(result);
    }

    fn err(&self) -> Option<&DbError> {
        self.err.as_ref()
    }

    fn item(&self) -> Option<Item<'_>> {
        if self.err.is_some() {
            return None;
        }
        self.current
            .as_ref()
            .map(|(key, value)| Item::new(key, value))
    }

    fn close(&mut self) -> DbResult<()> {
        self.cursor = None;
        self.current = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::ops::Bound;

    /// Cursor over a fixed map, re-seeking from the remembered key
    struct MapCursor {
        data: BTreeMap<Vec<u8>, Vec<u8>>,
        pos: Option<Vec<u8>>,
    }

    impl MapCursor {
        fn new(keys: &[u8]) -> Self {
            let data = keys.iter().map(|k| (vec![*k], vec![*k * 10])).collect();
            Self { data, pos: None }
        }

        fn land(&mut self, entry: Option<(&Vec<u8>, &Vec<u8>)>) -> DbResult<Option<Entry>> {
            let entry = entry.map(|(k, v)| (k.clone(), v.clone()));
            self.pos = entry.as_ref().map(|(k, _)| k.clone());
            Ok(entry)
        }
    }

    impl RawCursor for MapCursor {
        fn first(&mut self) -> DbResult<Option<Entry>> {
            let data = self.data.clone();
            self.land(data.iter().next())
        }

        fn last(&mut self) -> DbResult<Option<Entry>> {
            let data = self.data.clone();
            self.land(data.iter().next_back())
        }

        fn seek(&mut self, key: &[u8]) -> DbResult<Option<Entry>> {
            let data = self.data.clone();
            self.land(data.range(key.to_vec()..).next())
        }

        fn next(&mut self) -> DbResult<Option<Entry>> {
            let data = self.data.clone();
            let pos = self.pos.clone().unwrap_or_default();
            self.land(data.range((Bound::Excluded(pos), Bound::Unbounded)).next())
        }

        fn prev(&mut self) -> DbResult<Option<Entry>> {
            let data = self.data.clone();
            let pos = self.pos.clone().unwrap_or_default();
            self.land(data.range(..pos).next_back())
        }
    }

    fn reverse_iter() -> CursorIterator<MapCursor> {
        CursorIterator::new(MapCursor::new(&[1, 3, 5, 7]), CancellationToken::new(), true)
    }

    fn current_key(it: &CursorIterator<MapCursor>) -> Option<u8> {
        it.item().map(|item| item.key()[0])
    }

    #[test]
    fn test_reverse_seek_between_keys() {
        let mut it = reverse_iter();
        it.seek(&[6]);
        assert_eq!(current_key(&it), Some(5));
    }

    #[test]
    fn test_reverse_seek_exact_key() {
        let mut it = reverse_iter();
        it.seek(&[5]);
        assert_eq!(current_key(&it), Some(5));
    }

    #[test]
    fn test_reverse_seek_empty_pivot_lands_on_last() {
        let mut it = reverse_iter();
        it.seek(&[]);
        assert_eq!(current_key(&it), Some(7));
    }

    #[test]
    fn test_reverse_seek_below_first_is_exhausted() {
        let mut it = reverse_iter();
        it.seek(&[0]);
        assert!(!it.valid());
        assert!(it.err().is_none());
    }

    #[test]
    fn test_reverse_seek_beyond_last_is_exhausted() {
        let mut it = reverse_iter();
        it.seek(&[9]);
        assert!(!it.valid());
    }

    #[test]
    fn test_reverse_walk() {
        let mut it = reverse_iter();
        it.seek(&[]);
        let mut keys = Vec::new();
        while it.valid() {
            keys.push(current_key(&it).unwrap());
            it.next();
        }
        assert_eq!(keys, vec![7, 5, 3, 1]);
    }

    #[test]
    fn test_cancel_mid_iteration_sticks() {
        let token = CancellationToken::new();
        let mut it = CursorIterator::new(MapCursor::new(&[1, 2, 3]), token.clone(), false);
        it.seek(&[]);
        assert!(it.valid());

        token.cancel();
        it.next();
        assert!(!it.valid());
        assert!(it.err().unwrap().is_cancelled());
        assert!(it.item().is_none());

        // Seek does not clear the error
        it.seek(&[]);
        assert!(!it.valid());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut it = CursorIterator::new(MapCursor::new(&[1]), CancellationToken::new(), false);
        it.seek(&[]);
        assert!(it.close().is_ok());
        assert!(it.close().is_ok());
        assert!(!it.valid());
    }
}
