use core::fmt;

/// Errors reported by queue configuration and inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The requested capacity cannot be backed by a single allocation, or
    /// textual input was negative.
    #[error("invalid ring capacity: {requested}")]
    InvalidCapacity { requested: i128 },
    /// The queue has no backing store yet (capacity 0).
    #[error("ring capacity has not been configured")]
    NotConfigured,
    /// `peek` on a queue holding no elements.
    #[error("ring is empty")]
    Empty,
}

/// A rejected enqueue. The item is handed back to the caller untouched.
#[derive(Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EnqueueError<T> {
    /// Every slot is occupied; the queue never overwrites unread items.
    #[error("ring is full")]
    Full(T),
    /// The queue has capacity 0.
    #[error("ring capacity has not been configured")]
    NotConfigured(T),
}

impl<T> EnqueueError<T> {
    /// Recover the item that could not be enqueued.
    #[inline(always)]
    pub fn into_inner(self) -> T {
        match self {
            EnqueueError::Full(item) | EnqueueError::NotConfigured(item) => item,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, EnqueueError::Full(_))
    }
}

// Hand-written so `T` needs no `Debug` bound; payloads are often opaque records.
impl<T> fmt::Debug for EnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnqueueError::Full(_) => f.write_str("Full(..)"),
            EnqueueError::NotConfigured(_) => f.write_str("NotConfigured(..)"),
        }
    }
}

/// Malformed environment configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is not a valid integer")]
    Parse { var: &'static str, value: String },
    #[error("{var}: {source}")]
    Capacity {
        var: &'static str,
        #[source]
        source: QueueError,
    },
}
