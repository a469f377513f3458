//! Fixed-capacity single-producer/single-consumer ring queue.
//!
//! The queue hands records from one producer context to one consumer context
//! without allocating after [`RingQueue::set_capacity`]. Synchronisation is a
//! single occupancy counter:
//!
//! - the producer writes the slot, then publishes it with a release increment;
//! - the consumer acquires the counter before reading, then releases the slot
//!   back with a decrement once the value has been moved out.
//!
//! `tail` is written only by the producer and `head` only by the consumer.
//! More than one writer per index is unsupported, which the API enforces:
//! concurrent use goes through [`RingQueue::split`], which yields exactly one
//! non-clonable [`Producer`] and one [`Consumer`] while holding the queue
//! mutably borrowed, so reconfiguration cannot race with them either.

use core::fmt;
use core::mem::MaybeUninit;

use crate::error::{EnqueueError, QueueError};
use crate::sync::{self, AtomicUsize, Ordering, UnsafeCell};

/// Cache-aligned wrapper to reduce false sharing across producer/consumer.
#[repr(align(64))]
pub struct CacheAligned<T>(pub T);

type Slot<T> = UnsafeCell<MaybeUninit<T>>;

/// Ring queue of `T` records.
///
/// Shared references hand out `&T` through `peek`, so the queue (and a
/// consumer handle) is only `Sync` when `T` is:
///
/// ```compile_fail
/// fn assert_sync<S: Sync>() {}
/// assert_sync::<audio_cmd_ring::RingQueue<std::cell::Cell<u32>>>();
/// ```
///
/// ```compile_fail
/// fn assert_sync<S: Sync>() {}
/// assert_sync::<audio_cmd_ring::Consumer<'static, std::cell::Cell<u32>>>();
/// ```
///
/// The split halves still cross threads with only `T: Send`:
///
/// ```
/// fn assert_send<S: Send>() {}
/// assert_send::<audio_cmd_ring::Producer<'static, std::cell::Cell<u32>>>();
/// assert_send::<audio_cmd_ring::Consumer<'static, std::cell::Cell<u32>>>();
/// ```
pub struct RingQueue<T> {
    storage: Box<[Slot<T>]>,
    /// Next slot to read. Consumer-owned.
    head: CacheAligned<AtomicUsize>,
    /// Next slot to write. Producer-owned.
    tail: CacheAligned<AtomicUsize>,
    /// Occupied slots; the only cross-thread publication point.
    count: CacheAligned<AtomicUsize>,
}

// SAFETY: values of `T` move between threads through the queue, so `T: Send`
// is required. Slot access is partitioned by the occupancy counter: the
// producer only touches free slots, the consumer only occupied ones.
unsafe impl<T: Send> Send for RingQueue<T> {}
// SAFETY: `&RingQueue` exposes `peek`, which lends `&T` to whichever thread
// holds the shared reference. Several threads may do so at once, so `T`
// itself must be `Sync`.
unsafe impl<T: Send + Sync> Sync for RingQueue<T> {}

impl<T> RingQueue<T> {
    /// An unconfigured queue: capacity 0, no backing store.
    pub fn new() -> Self {
        Self {
            storage: Box::new([]),
            head: CacheAligned(AtomicUsize::new(0)),
            tail: CacheAligned(AtomicUsize::new(0)),
            count: CacheAligned(AtomicUsize::new(0)),
        }
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, QueueError> {
        let mut queue = Self::new();
        queue.set_capacity(capacity)?;
        Ok(queue)
    }

    /// Largest capacity whose backing store fits in a single allocation.
    pub const fn max_capacity() -> usize {
        let slot = core::mem::size_of::<Slot<T>>();
        if slot == 0 {
            isize::MAX as usize
        } else {
            isize::MAX as usize / slot
        }
    }

    /// Replace the backing store with `capacity` fresh slots.
    ///
    /// Destructive: every element still queued is dropped and the indices
    /// reset. A capacity of 0 releases the store and leaves the queue
    /// unconfigured. If the new store cannot be allocated the queue is left
    /// exactly as it was.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<(), QueueError> {
        let invalid = QueueError::InvalidCapacity {
            requested: capacity as i128,
        };
        if capacity > Self::max_capacity() {
            return Err(invalid);
        }
        let fresh = sync::uninit_slots(capacity).ok_or(invalid)?;

        self.drop_live();
        let previous = self.storage.len();
        // Old store is freed on assignment.
        self.storage = fresh;
        self.reset_indices();

        log::debug!("ring capacity reconfigured: {previous} -> {capacity}");
        Ok(())
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Snapshot of the occupancy counter.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.count.0.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` when every slot is occupied. An unconfigured queue is never full.
    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.capacity() != 0 && self.len() == self.capacity()
    }

    #[inline(always)]
    pub fn enqueue(&mut self, item: T) -> Result<(), EnqueueError<T>> {
        // SAFETY: `&mut self` excludes every other producer and consumer.
        unsafe { self.push(item) }
    }

    #[inline(always)]
    pub fn try_dequeue(&mut self) -> Option<T> {
        // SAFETY: `&mut self` excludes every other producer and consumer.
        unsafe { self.pop() }
    }

    /// The oldest element, left in place.
    pub fn peek(&self) -> Result<&T, QueueError> {
        // SAFETY: with `&self` alive no `&mut` method can move `head` or
        // take the element out, and handles from `split` cannot coexist.
        unsafe { self.front() }
    }

    /// Empty the queue without reallocating. Discarded elements are dropped.
    pub fn clear(&mut self) {
        let discarded = self.drop_live();
        self.reset_indices();
        log::trace!("ring cleared, {discarded} element(s) discarded");
    }

    /// Split into the producer and consumer halves.
    ///
    /// Both handles borrow the queue mutably, so `set_capacity` and `clear`
    /// are unavailable until they are dropped.
    pub fn split(&mut self) -> (Producer<'_, T>, Consumer<'_, T>) {
        let queue: &Self = self;
        (Producer { queue }, Consumer { queue })
    }

    /// Write `item` at `tail` and publish it.
    ///
    /// # Safety
    /// The caller must be the only producer for the duration of the call.
    #[inline(always)]
    unsafe fn push(&self, item: T) -> Result<(), EnqueueError<T>> {
        let capacity = self.capacity();
        if capacity == 0 {
            return Err(EnqueueError::NotConfigured(item));
        }
        // Acquire pairs with the consumer's release in `pop`: the slot we are
        // about to overwrite has been fully read.
        if self.count.0.load(Ordering::Acquire) == capacity {
            return Err(EnqueueError::Full(item));
        }

        let tail = self.tail.0.load(Ordering::Relaxed);
        self.storage[tail].with_mut(|slot| unsafe {
            (*slot).write(item);
        });
        self.tail.0.store(next_index(tail, capacity), Ordering::Relaxed);
        self.count.0.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Move the element at `head` out and release its slot.
    ///
    /// # Safety
    /// The caller must be the only consumer for the duration of the call.
    #[inline(always)]
    unsafe fn pop(&self) -> Option<T> {
        // Acquire pairs with the producer's release in `push`.
        if self.count.0.load(Ordering::Acquire) == 0 {
            return None;
        }
        let capacity = self.capacity();
        let head = self.head.0.load(Ordering::Relaxed);
        let item = self.storage[head].with(|slot| unsafe { (*slot).assume_init_read() });
        self.head.0.store(next_index(head, capacity), Ordering::Relaxed);
        self.count.0.fetch_sub(1, Ordering::AcqRel);
        Some(item)
    }

    /// # Safety
    /// The caller must be the only consumer, and must not call `pop` while
    /// the returned reference is alive.
    #[inline(always)]
    unsafe fn front(&self) -> Result<&T, QueueError> {
        if self.capacity() == 0 {
            return Err(QueueError::NotConfigured);
        }
        if self.count.0.load(Ordering::Acquire) == 0 {
            return Err(QueueError::Empty);
        }
        let head = self.head.0.load(Ordering::Relaxed);
        Ok(self.storage[head].with(|slot| unsafe { (*slot).assume_init_ref() }))
    }

    /// Drop every live element in place. Returns how many were dropped.
    fn drop_live(&mut self) -> usize {
        let capacity = self.capacity();
        let live = self.count.0.load(Ordering::Acquire);
        let mut idx = self.head.0.load(Ordering::Relaxed);
        for _ in 0..live {
            // SAFETY: slots in the occupied region hold initialised values and
            // the indices are reset right after, so none is dropped twice.
            self.storage[idx].with_mut(|slot| unsafe { (*slot).assume_init_drop() });
            idx = next_index(idx, capacity);
        }
        live
    }

    fn reset_indices(&mut self) {
        self.head.0.store(0, Ordering::Relaxed);
        self.tail.0.store(0, Ordering::Relaxed);
        self.count.0.store(0, Ordering::Release);
    }
}

#[inline(always)]
fn next_index(idx: usize, capacity: usize) -> usize {
    let next = idx + 1;
    if next == capacity {
        0
    } else {
        next
    }
}

impl<T> Default for RingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for RingQueue<T> {
    fn drop(&mut self) {
        self.drop_live();
    }
}

impl<T> fmt::Debug for RingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

/// Writing half of a split [`RingQueue`].
pub struct Producer<'a, T> {
    queue: &'a RingQueue<T>,
}

// SAFETY: a single producer handle exists per split; it only touches `tail`
// and free slots.
unsafe impl<T: Send> Send for Producer<'_, T> {}

impl<T> Producer<'_, T> {
    #[inline(always)]
    pub fn enqueue(&mut self, item: T) -> Result<(), EnqueueError<T>> {
        // SAFETY: `&mut self` on the unique producer handle.
        unsafe { self.queue.push(item) }
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }
}

/// Reading half of a split [`RingQueue`].
pub struct Consumer<'a, T> {
    queue: &'a RingQueue<T>,
}

// SAFETY: a single consumer handle exists per split; it only touches `head`
// and occupied slots.
unsafe impl<T: Send> Send for Consumer<'_, T> {}

impl<T> Consumer<'_, T> {
    #[inline(always)]
    pub fn try_dequeue(&mut self) -> Option<T> {
        // SAFETY: `&mut self` on the unique consumer handle.
        unsafe { self.queue.pop() }
    }

    /// The oldest element, left in place. The borrow keeps `try_dequeue`
    /// from running, and the producer never writes an occupied slot.
    pub fn peek(&self) -> Result<&T, QueueError> {
        // SAFETY: unique consumer; `pop` needs `&mut self`.
        unsafe { self.queue.front() }
    }

    /// Move queued items into `out` until it is full or the queue is empty.
    /// Returns the number of items moved. Never allocates.
    pub fn drain_into<const N: usize>(&mut self, out: &mut heapless::Vec<T, N>) -> usize {
        let room = out.capacity() - out.len();
        let mut moved = 0;
        while moved < room {
            let Some(item) = self.try_dequeue() else {
                break;
            };
            // Cannot fail: at most `room` items are pushed.
            let _ = out.push(item);
            moved += 1;
        }
        moved
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::rc::Rc;
    use std::thread;

    fn fill(queue: &mut RingQueue<u32>, items: impl IntoIterator<Item = u32>) {
        for i in items {
            queue.enqueue(i).expect("queue has room");
        }
    }

    fn drain(queue: &mut RingQueue<u32>) -> Vec<u32> {
        std::iter::from_fn(|| queue.try_dequeue()).collect()
    }

    #[test]
    fn new_queue_is_unconfigured() {
        let mut queue = RingQueue::<u32>::new();
        assert_eq!(queue.capacity(), 0);
        assert!(queue.is_empty());
        assert!(!queue.is_full());
        assert_eq!(queue.try_dequeue(), None);
        assert_eq!(queue.peek(), Err(QueueError::NotConfigured));
        assert_eq!(queue.enqueue(1), Err(EnqueueError::NotConfigured(1)));
    }

    #[test]
    fn fifo_order() {
        let mut queue = RingQueue::with_capacity(16).unwrap();
        fill(&mut queue, 0..10);
        assert_eq!(queue.len(), 10);
        assert_eq!(drain(&mut queue), (0..10).collect::<Vec<_>>());
        assert!(queue.is_empty());
    }

    #[test]
    fn fill_then_drain_at_several_capacities() {
        for capacity in [1usize, 4, 1024] {
            let mut queue = RingQueue::with_capacity(capacity).unwrap();
            fill(&mut queue, 0..capacity as u32);
            assert!(queue.is_full());
            assert_eq!(queue.len(), capacity);
            assert_eq!(drain(&mut queue), (0..capacity as u32).collect::<Vec<_>>());
            assert_eq!(queue.len(), 0);
        }
    }

    #[test]
    fn tail_wraps_past_end() {
        let mut queue = RingQueue::with_capacity(4).unwrap();
        fill(&mut queue, [1, 2, 3]);
        assert_eq!(queue.try_dequeue(), Some(1));
        assert_eq!(queue.try_dequeue(), Some(2));
        fill(&mut queue, [4, 5, 6]);
        assert!(queue.is_full());
        assert_eq!(drain(&mut queue), vec![3, 4, 5, 6]);
    }

    #[test]
    fn full_queue_rejects_and_keeps_state() {
        let mut queue = RingQueue::with_capacity(2).unwrap();
        fill(&mut queue, [10, 20]);
        let err = queue.enqueue(30).unwrap_err();
        assert_eq!(err, EnqueueError::Full(30));
        assert_eq!(queue.len(), 2);
        assert_eq!(drain(&mut queue), vec![10, 20]);
    }

    #[test]
    fn count_tracks_successful_operations() {
        let mut queue = RingQueue::with_capacity(3).unwrap();
        let (mut enqueued, mut dequeued) = (0usize, 0usize);
        for step in 0u32..200 {
            if step % 3 == 2 {
                if queue.try_dequeue().is_some() {
                    dequeued += 1;
                }
            } else if queue.enqueue(step).is_ok() {
                enqueued += 1;
            }
            assert_eq!(queue.len(), enqueued - dequeued);
            assert!(queue.len() <= queue.capacity());
        }
    }

    #[test]
    fn peek_reads_head_not_slot_zero() {
        let mut queue = RingQueue::with_capacity(3).unwrap();
        assert_eq!(queue.peek(), Err(QueueError::Empty));
        fill(&mut queue, [7, 8]);
        queue.try_dequeue();
        assert_eq!(queue.peek(), Ok(&8));
        fill(&mut queue, [9, 10]);
        queue.try_dequeue();
        queue.try_dequeue();
        assert_eq!(queue.peek(), Ok(&10));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn clear_empties_without_reallocating() {
        let mut queue = RingQueue::with_capacity(4).unwrap();
        fill(&mut queue, [1, 2, 3]);
        queue.clear();
        assert_eq!(queue.capacity(), 4);
        assert_eq!(queue.try_dequeue(), None);
        fill(&mut queue, [4, 5, 6, 7]);
        assert_eq!(drain(&mut queue), vec![4, 5, 6, 7]);
    }

    #[test]
    fn set_capacity_discards_contents() {
        let mut queue = RingQueue::with_capacity(4).unwrap();
        fill(&mut queue, [1, 2, 3]);
        queue.set_capacity(8).unwrap();
        assert_eq!(queue.capacity(), 8);
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.try_dequeue(), None);

        queue.set_capacity(0).unwrap();
        assert_eq!(queue.enqueue(1), Err(EnqueueError::NotConfigured(1)));
    }

    #[test]
    fn oversized_capacity_rejected() {
        let mut queue = RingQueue::<u64>::new();
        let requested = usize::MAX;
        assert_eq!(
            queue.set_capacity(requested),
            Err(QueueError::InvalidCapacity {
                requested: requested as i128
            })
        );
        assert_eq!(queue.capacity(), 0);
    }

    #[test]
    fn unallocatable_capacity_leaves_queue_intact() {
        let mut queue = RingQueue::<u64>::with_capacity(2).unwrap();
        queue.enqueue(11).unwrap();

        let requested = RingQueue::<u64>::max_capacity();
        assert_eq!(
            queue.set_capacity(requested),
            Err(QueueError::InvalidCapacity {
                requested: requested as i128
            })
        );
        assert_eq!(queue.capacity(), 2);
        assert_eq!(queue.try_dequeue(), Some(11));
    }

    #[test]
    fn zero_sized_items_take_any_capacity_at_once() {
        let capacity = RingQueue::<()>::max_capacity();
        let mut queue = RingQueue::<()>::with_capacity(capacity).unwrap();
        assert_eq!(queue.capacity(), capacity);

        for _ in 0..3 {
            queue.enqueue(()).unwrap();
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.try_dequeue(), Some(()));
        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn sharing_requires_sync_items() {
        fn assert_sync<S: Sync>() {}
        fn assert_send<S: Send>() {}

        assert_sync::<RingQueue<u32>>();
        assert_sync::<Consumer<'static, u32>>();
        assert_send::<Producer<'static, std::cell::Cell<u32>>>();
        assert_send::<Consumer<'static, std::cell::Cell<u32>>>();
        assert_send::<RingQueue<std::cell::Cell<u32>>>();
    }

    #[test]
    fn drain_into_full_batch_leaves_queue_untouched() {
        let mut queue = RingQueue::with_capacity(4).unwrap();
        fill(&mut queue, [1, 2]);
        let (_, mut consumer) = queue.split();

        let mut batch: heapless::Vec<u32, 2> = heapless::Vec::new();
        batch.push(0).unwrap();
        assert_eq!(consumer.drain_into(&mut batch), 1);
        assert_eq!(batch.as_slice(), &[0, 1]);

        assert_eq!(consumer.drain_into(&mut batch), 0);
        assert_eq!(consumer.len(), 1);
        assert_eq!(consumer.peek(), Ok(&2));
    }

    #[test]
    fn discarded_elements_are_dropped_once() {
        let token = Rc::new(());
        let mut queue = RingQueue::with_capacity(4).unwrap();

        for _ in 0..3 {
            queue.enqueue(Rc::clone(&token)).unwrap();
        }
        queue.clear();
        assert_eq!(Rc::strong_count(&token), 1);

        for _ in 0..4 {
            queue.enqueue(Rc::clone(&token)).unwrap();
        }
        drop(queue.try_dequeue());
        queue.set_capacity(2).unwrap();
        assert_eq!(Rc::strong_count(&token), 1);

        queue.enqueue(Rc::clone(&token)).unwrap();
        queue.enqueue(Rc::clone(&token)).unwrap();
        drop(queue);
        assert_eq!(Rc::strong_count(&token), 1);
    }

    #[test]
    fn drain_into_respects_batch_bound() {
        let mut queue = RingQueue::with_capacity(8).unwrap();
        fill(&mut queue, 0..6);
        let (_, mut consumer) = queue.split();

        let mut batch: heapless::Vec<u32, 4> = heapless::Vec::new();
        assert_eq!(consumer.drain_into(&mut batch), 4);
        assert_eq!(batch.as_slice(), &[0, 1, 2, 3]);
        assert_eq!(consumer.drain_into(&mut batch), 0);

        batch.clear();
        assert_eq!(consumer.drain_into(&mut batch), 2);
        assert_eq!(batch.as_slice(), &[4, 5]);
        assert!(consumer.is_empty());
    }

    #[test]
    fn split_handles_share_state() {
        let mut queue = RingQueue::with_capacity(2).unwrap();
        {
            let (mut producer, mut consumer) = queue.split();
            producer.enqueue(1).unwrap();
            producer.enqueue(2).unwrap();
            assert!(producer.is_full());
            assert!(producer.enqueue(3).unwrap_err().is_full());
            assert_eq!(consumer.peek(), Ok(&1));
            assert_eq!(consumer.try_dequeue(), Some(1));
            assert_eq!(producer.len(), 1);
        }
        assert_eq!(queue.try_dequeue(), Some(2));
    }

    #[test]
    fn spsc_threads_deliver_every_item_once() {
        const MESSAGES: u64 = 100_000;
        let mut queue = RingQueue::with_capacity(64).unwrap();
        let (mut producer, mut consumer) = queue.split();

        let received = thread::scope(|s| {
            s.spawn(move || {
                for i in 0..MESSAGES {
                    let mut item = i;
                    while let Err(err) = producer.enqueue(item) {
                        item = err.into_inner();
                        std::hint::spin_loop();
                    }
                }
            });

            let consumer = s.spawn(move || {
                let mut received = Vec::with_capacity(MESSAGES as usize);
                while received.len() < MESSAGES as usize {
                    match consumer.try_dequeue() {
                        Some(v) => received.push(v),
                        None => std::hint::spin_loop(),
                    }
                }
                // Two consecutive misses after the producer is done.
                assert_eq!(consumer.try_dequeue(), None);
                assert_eq!(consumer.try_dequeue(), None);
                received
            });
            consumer.join().unwrap()
        });

        assert_eq!(received, (0..MESSAGES).collect::<Vec<_>>());
        assert!(queue.is_empty());
    }
}
