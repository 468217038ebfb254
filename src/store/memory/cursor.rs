use crate::errors::StoreError;
use crate::store::DocumentCursor;
use async_trait::async_trait;
use bson::Document;
use std::collections::VecDeque;

/// A forward-only cursor over materialized results.
#[derive(Debug, Clone, Default)]
pub struct MemoryCursor {
    docs: VecDeque<Document>,
    closed: bool,
}

impl MemoryCursor {
    #[must_use]
    pub fn new(docs: Vec<Document>) -> Self {
        Self { docs: docs.into(), closed: false }
    }

    pub fn advance(&mut self) -> Option<Document> {
        if self.closed { None } else { self.docs.pop_front() }
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Remaining documents, consuming the cursor.
    #[must_use]
    pub fn to_vec(self) -> Vec<Document> {
        if self.closed { Vec::new() } else { self.docs.into() }
    }
}

impl Iterator for MemoryCursor {
    type Item = Document;
    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }
}

#[async_trait]
impl DocumentCursor for MemoryCursor {
    async fn next_document(&mut self) -> Result<Option<Document>, StoreError> {
        if self.closed {
            return Err(StoreError::CursorClosed);
        }
        Ok(self.docs.pop_front())
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.closed = true;
        self.docs.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn drains_then_reports_closed() {
        let mut c = MemoryCursor::new(vec![doc! {"a": 1}, doc! {"a": 2}]);
        assert_eq!(c.next_document().await.unwrap(), Some(doc! {"a": 1}));
        c.close().await.unwrap();
        c.close().await.unwrap();
        assert!(c.is_closed());
        assert!(matches!(c.next_document().await, Err(StoreError::CursorClosed)));
        assert!(c.advance().is_none());
    }

    #[test]
    fn iterates_synchronously() {
        let c = MemoryCursor::new(vec![doc! {"a": 1}, doc! {"a": 2}]);
        assert_eq!(c.count(), 2);
        let c = MemoryCursor::new(vec![doc! {"a": 1}]);
        assert_eq!(c.to_vec(), vec![doc! {"a": 1}]);
    }
}
