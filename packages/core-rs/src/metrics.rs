use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

static MARSHALLED_BYTES: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static LIVE_FOREIGN_BUFFERS: Cell<usize> = const { Cell::new(0) };
}

pub(crate) fn record_marshalled_bytes(bytes: usize) {
    MARSHALLED_BYTES.fetch_add(bytes, Ordering::Relaxed);
}

/// Bytes copied across the native boundary, both directions.
pub fn marshalled_bytes_total() -> u64 {
    MARSHALLED_BYTES.load(Ordering::Relaxed) as u64
}

pub fn take_marshalled_bytes() -> u64 {
    MARSHALLED_BYTES.swap(0, Ordering::Relaxed) as u64
}

pub fn reset_marshalled_bytes() {
    MARSHALLED_BYTES.store(0, Ordering::Relaxed);
}

pub(crate) fn foreign_buffer_acquired() {
    LIVE_FOREIGN_BUFFERS.with(|live| live.set(live.get() + 1));
}

pub(crate) fn foreign_buffer_released() {
    LIVE_FOREIGN_BUFFERS.with(|live| live.set(live.get().saturating_sub(1)));
}

/// Foreign buffers currently held by native calls on this thread. Native
/// calls never outlive their scope, so this is zero between calls.
pub fn live_foreign_buffers() -> usize {
    LIVE_FOREIGN_BUFFERS.with(Cell::get)
}
