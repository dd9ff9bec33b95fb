//! Lazy document streams
//!
//! A `Stream` is a pull-based chain of document iterators. Nothing is read
//! from storage until a terminal operation (`count`, `iterate`,
//! `into_documents`) pulls from it. Terminal operations consume the stream.
//!
//! Every stage drops its upstream as soon as it is exhausted, limited or
//! errored. Dropping a storage-backed source closes its store iterator, so
//! resources are released on every exit path.

mod order;

pub use order::SortDirection;

pub(crate) use order::sort_key;

use crate::document::{Document, FieldBuffer, FieldPath};
use crate::errors::DbResult;

/// A boxed document produced by a stream
pub type BoxedDocument<'a> = Box<dyn Document + 'a>;

/// The iterator type every stage is built from
pub type DocumentIter<'a> = Box<dyn Iterator<Item = DbResult<BoxedDocument<'a>>> + 'a>;

/// A lazily evaluated sequence of documents
pub struct Stream<'a> {
    source: DocumentIter<'a>,
}

impl<'a> Stream<'a> {
    pub fn new(source: DocumentIter<'a>) -> Self {
        Self { source }
    }

    pub fn empty() -> Self {
        Self::new(Box::new(std::iter::empty()))
    }

    /// A stream over owned documents
    pub fn from_documents(docs: Vec<FieldBuffer>) -> Self {
        Self::new(Box::new(
            docs.into_iter()
                .map(|d| Ok(Box::new(d) as BoxedDocument<'a>)),
        ))
    }

    /// Keeps documents for which `predicate` returns true
    pub fn filter<F>(self, predicate: F) -> Stream<'a>
    where
        F: FnMut(&dyn Document) -> DbResult<bool> + 'a,
    {
        Stream::new(Box::new(Filter {
            upstream: Upstream::new(self.source),
            predicate,
        }))
    }

    /// Transforms each document
    pub fn map<F>(self, f: F) -> Stream<'a>
    where
        F: FnMut(BoxedDocument<'a>) -> DbResult<BoxedDocument<'a>> + 'a,
    {
        Stream::new(Box::new(Map {
            upstream: Upstream::new(self.source),
            f,
        }))
    }

    /// Skips the first `n` documents
    pub fn offset(self, n: usize) -> Stream<'a> {
        if n == 0 {
            return self;
        }
        Stream::new(Box::new(Offset {
            upstream: Upstream::new(self.source),
            remaining: n,
        }))
    }

    /// Stops after `n` documents and releases the upstream immediately
    pub fn limit(self, n: usize) -> Stream<'a> {
        Stream::new(Box::new(Limit {
            upstream: Upstream::new(self.source),
            remaining: n,
        }))
    }

    /// Sorts by `path`, buffering at most `max_documents` documents
    pub fn order_by(self, path: FieldPath, direction: SortDirection, max_documents: usize) -> Stream<'a> {
        Stream::new(Box::new(order::OrderBy::new(
            self.source,
            path,
            direction,
            max_documents,
        )))
    }

    /// Counts the documents, consuming the stream
    pub fn count(self) -> DbResult<u64> {
        let mut count = 0u64;
        for doc in self.source {
            doc?;
            count += 1;
        }
        Ok(count)
    }

    /// Calls `f` for each document. Stops at the first error.
    pub fn iterate<F>(self, mut f: F) -> DbResult<()>
    where
        F: FnMut(&dyn Document) -> DbResult<()>,
    {
        for doc in self.source {
            let doc = doc?;
            f(doc.as_ref())?;
        }
        Ok(())
    }

    /// Materializes every document
    pub fn into_documents(self) -> DbResult<Vec<FieldBuffer>> {
        let mut docs = Vec::new();
        self.iterate(|doc| {
            docs.push(FieldBuffer::copy_from(doc)?);
            Ok(())
        })?;
        Ok(docs)
    }
}

impl<'a> Iterator for Stream<'a> {
    type Item = DbResult<BoxedDocument<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.source.next()
    }
}

/// Upstream handle that is dropped on exhaustion or error
struct Upstream<'a> {
    source: Option<DocumentIter<'a>>,
}

impl<'a> Upstream<'a> {
    fn new(source: DocumentIter<'a>) -> Self {
        Self {
            source: Some(source),
        }
    }

    fn pull(&mut self) -> Option<DbResult<BoxedDocument<'a>>> {
        let next = self.source.as_mut()?.next();
        match next {
            Some(Ok(doc)) => Some(Ok(doc)),
            Some(Err(err)) => {
                self.release();
                Some(Err(err))
            }
            None => {
                self.release();
                None
            }
        }
    }

    fn release(&mut self) {
        self.source = None;
    }
}

struct Filter<'a, F> {
    upstream: Upstream<'a>,
    predicate: F,
}

impl<'a, F> Iterator for Filter<'a, F>
where
    F: FnMut(&dyn Document) -> DbResult<bool>,
{
    type Item = DbResult<BoxedDocument<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let doc = match self.upstream.pull()? {
                Ok(doc) => doc,
                Err(err) => return Some(Err(err)),
            };
            match (self.predicate)(doc.as_ref()) {
                Ok(true) => return Some(Ok(doc)),
                Ok(false) => continue,
                Err(err) => {
                    self.upstream.release();
                    return Some(Err(err));
                }
            }
        }
    }
}

struct Map<'a, F> {
    upstream: Upstream<'a>,
    f: F,
}

impl<'a, F> Iterator for Map<'a, F>
where
    F: FnMut(BoxedDocument<'a>) -> DbResult<BoxedDocument<'a>>,
{
    type Item = DbResult<BoxedDocument<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let doc = match self.upstream.pull()? {
            Ok(doc) => doc,
            Err(err) => return Some(Err(err)),
        };
        let mapped = (self.f)(doc);
        if mapped.is_err() {
            self.upstream.release();
        }
        Some(mapped)
    }
}

struct Offset<'a> {
    upstream: Upstream<'a>,
    remaining: usize,
}

impl<'a> Iterator for Offset<'a> {
    type Item = DbResult<BoxedDocument<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            if let Err(err) = self.upstream.pull()? {
                return Some(Err(err));
            }
            self.remaining -= 1;
        }
        self.upstream.pull()
    }
}

struct Limit<'a> {
    upstream: Upstream<'a>,
    remaining: usize,
}

impl<'a> Iterator for Limit<'a> {
    type Item = DbResult<BoxedDocument<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            self.upstream.release();
            return None;
        }
        let item = self.upstream.pull()?;
        self.remaining -= 1;
        if self.remaining == 0 {
            self.upstream.release();
        }
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Value;
    use crate::errors::DbError;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    fn numbers(n: i64) -> Stream<'static> {
        Stream::from_documents(
            (1..=n)
                .map(|i| FieldBuffer::from_json(&json!({ "n": i })))
                .collect(),
        )
    }

    fn values(stream: Stream<'_>) -> Vec<i64> {
        stream
            .into_documents()
            .unwrap()
            .iter()
            .map(|d| match d.get("n") {
                Some(Value::Integer(i)) => *i,
                _ => panic!("missing n"),
            })
            .collect()
    }

    /// Source counting pulls and recording when it is dropped
    struct Tracked {
        next: i64,
        end: i64,
        pulls: Rc<Cell<usize>>,
        dropped: Rc<Cell<bool>>,
    }

    impl Iterator for Tracked {
        type Item = DbResult<BoxedDocument<'static>>;

        fn next(&mut self) -> Option<Self::Item> {
            if self.next > self.end {
                return None;
            }
            self.pulls.set(self.pulls.get() + 1);
            let doc = FieldBuffer::from_json(&json!({ "n": self.next }));
            self.next += 1;
            Some(Ok(Box::new(doc)))
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.dropped.set(true);
        }
    }

    #[test]
    fn test_filter() {
        let stream = numbers(10).filter(|d| Ok(d.get_by_field("n")?.convert_to_int()? % 2 == 0));
        assert_eq!(values(stream), vec![2, 4, 6, 8, 10]);
    }

    #[test]
    fn test_map() {
        let stream = numbers(3).map(|d| {
            let mut buf = FieldBuffer::copy_from(d.as_ref())?;
            let n = buf.get_by_field("n")?.convert_to_int()?;
            buf.set("n", Value::Integer(n * 10));
            Ok(Box::new(buf) as BoxedDocument<'static>)
        });
        assert_eq!(values(stream), vec![10, 20, 30]);
    }

    #[test]
    fn test_limit_releases_source_without_draining() {
        let pulls = Rc::new(Cell::new(0));
        let dropped = Rc::new(Cell::new(false));
        let source = Tracked {
            next: 1,
            end: 100,
            pulls: pulls.clone(),
            dropped: dropped.clone(),
        };

        let mut stream = Stream::new(Box::new(source)).limit(3);
        let mut seen = 0;
        for doc in &mut stream {
            doc.unwrap();
            seen += 1;
        }

        assert_eq!(seen, 3);
        assert_eq!(pulls.get(), 3);
        assert!(dropped.get());
    }

    #[test]
    fn test_offset_then_limit() {
        assert_eq!(values(numbers(10).offset(3).limit(4)), vec![4, 5, 6, 7]);
        assert_eq!(values(numbers(5).offset(3).limit(4)), vec![4, 5]);
        assert!(values(numbers(5).offset(5).limit(4)).is_empty());
        assert!(values(numbers(5).limit(0)).is_empty());
    }

    #[test]
    fn test_count() {
        assert_eq!(numbers(7).count().unwrap(), 7);
        assert_eq!(Stream::empty().count().unwrap(), 0);
    }

    #[test]
    fn test_error_stops_pipeline_and_releases_upstream() {
        let dropped = Rc::new(Cell::new(false));
        let source = Tracked {
            next: 1,
            end: 10,
            pulls: Rc::new(Cell::new(0)),
            dropped: dropped.clone(),
        };

        let stream = Stream::new(Box::new(source)).filter(|d| {
            if d.get_by_field("n")? == Value::Integer(2) {
                return Err(DbError::type_mismatch("boom"));
            }
            Ok(true)
        });

        let mut seen = 0;
        let err = stream
            .iterate(|_| {
                seen += 1;
                Ok(())
            })
            .unwrap_err();
        assert_eq!(seen, 1);
        assert!(err.message().contains("boom"));
        assert!(dropped.get());
    }

    #[test]
    fn test_iterate_callback_error_propagates() {
        let err = numbers(5)
            .iterate(|_| Err(DbError::execution_limit("stop")))
            .unwrap_err();
        assert!(err.message().contains("stop"));
    }
}
