//! Lazy, pull-based streams of `(tag, packet)` rows.

use std::fmt;

use podprint_core::{Error, Packet, Tag};

/// One pipeline row.
pub type Row = (Tag, Packet);

/// A row stream. Each row is produced only when the consumer pulls it.
pub struct Stream {
    rows: Box<dyn Iterator<Item = Result<Row, Error>> + Send>,
}

impl Stream {
    pub fn new(rows: impl Iterator<Item = Result<Row, Error>> + Send + 'static) -> Self {
        Self { rows: Box::new(rows) }
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    /// Collect every row, stopping at the first error.
    pub fn try_collect(self) -> Result<Vec<Row>, Error> {
        self.collect()
    }
}

impl Iterator for Stream {
    type Item = Result<Row, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_rows_are_pulled_lazily() {
        let produced = Arc::new(AtomicUsize::new(0));
        let counter = produced.clone();
        let mut stream = Stream::new((0..3).map(move |i| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok((Tag::from([("i".to_string(), i.to_string())]), Packet::new()))
        }));

        assert_eq!(produced.load(Ordering::SeqCst), 0);
        stream.next().unwrap().unwrap();
        assert_eq!(produced.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_try_collect_stops_at_error() {
        let rows = vec![Ok((Tag::new(), Packet::new())), Err(Error::InvalidArgument("bad".into()))];
        let result = Stream::new(rows.into_iter()).try_collect();
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_empty() {
        assert_eq!(Stream::empty().try_collect().unwrap().len(), 0);
    }
}
