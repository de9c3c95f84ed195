//! Dynamic batch accumulation.
//!
//! A `BatchAccumulator` is owned by one element instance and buffers bound
//! statements until the configured size is reached. It needs no locking.

use crate::cql::statement::{BatchStatement, BoundStatement, Consistency};

/// Where the accumulator stands after an `add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Fewer than `batch_size` statements are buffered.
    Accumulating,
    /// Exactly `batch_size` statements are buffered; the caller must flush.
    ReadyToFlush,
}

#[derive(Debug)]
pub struct BatchAccumulator {
    batch_size: usize,
    statements: Vec<BoundStatement>,
}

impl BatchAccumulator {
    /// Create an accumulator; a size of 0 is treated as 1.
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            statements: Vec::with_capacity(batch_size),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Change the flush threshold. Buffered statements are kept.
    pub fn set_batch_size(&mut self, batch_size: usize) {
        self.batch_size = batch_size.max(1);
    }

    /// Buffer a statement and report whether a flush is due.
    pub fn add(&mut self, statement: BoundStatement) -> BatchState {
        self.statements.push(statement);
        tracing::debug!(
            buffered = self.statements.len(),
            batch_size = self.batch_size,
            "statement added to batch"
        );
        self.state()
    }

    pub fn state(&self) -> BatchState {
        if self.statements.len() >= self.batch_size {
            BatchState::ReadyToFlush
        } else {
            BatchState::Accumulating
        }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state() == BatchState::ReadyToFlush
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Take every buffered statement as one unlogged batch.
    ///
    /// The buffer is empty afterwards whatever happens to the batch.
    pub fn flush(&mut self, consistency: Option<Consistency>) -> BatchStatement {
        let statements = std::mem::replace(&mut self.statements, Vec::with_capacity(self.batch_size));
        tracing::debug!(statements = statements.len(), "flushing batch");
        BatchStatement {
            statements,
            consistency,
        }
    }

    /// Drop buffered statements without executing them.
    pub fn reset(&mut self) {
        self.statements.clear();
    }
}

impl Default for BatchAccumulator {
    fn default() -> Self {
        Self::new(1)
    }
}
