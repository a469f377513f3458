//! Fixed-capacity single-producer/single-consumer ring queue for handing
//! audio command records to a real-time consumer without steady-state
//! allocation.
//!
//! ```
//! use audio_cmd_ring::RingQueue;
//!
//! let mut queue = RingQueue::with_capacity(4).unwrap();
//! let (mut producer, mut consumer) = queue.split();
//! producer.enqueue(1u32).unwrap();
//! assert_eq!(consumer.try_dequeue(), Some(1));
//! assert_eq!(consumer.try_dequeue(), None);
//! ```

pub mod affinity;
pub mod config;
pub mod error;
pub mod payload;
pub mod ring;
pub mod runtime;
mod sync;

pub use error::{ConfigError, EnqueueError, QueueError};
pub use ring::{Consumer, Producer, RingQueue};
