use crate::metrics;
use std::mem;

/// Storage handed to a native routine. Creation and drop are tracked in
/// [`metrics::live_foreign_buffers`] so every exit path, errors included,
/// can be checked for leaks.
pub(crate) struct ForeignBuffer<T: Copy + Default> {
    data: Vec<T>,
}

impl<T: Copy + Default> ForeignBuffer<T> {
    fn track(data: Vec<T>) -> Self {
        metrics::foreign_buffer_acquired();
        ForeignBuffer { data }
    }

    pub(crate) fn zeroed(len: usize) -> Self {
        Self::track(vec![T::default(); len])
    }

    /// Marshals a copy of `src`.
    pub(crate) fn copy_of(src: &[T]) -> Self {
        metrics::record_marshalled_bytes(mem::size_of_val(src));
        Self::track(src.to_vec())
    }

    /// Takes over storage the caller already owns, no copy.
    pub(crate) fn adopt(data: Vec<T>) -> Self {
        Self::track(data)
    }

    pub(crate) fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Hands the storage back to Rust. The handle is still released.
    pub(crate) fn into_vec(mut self) -> Vec<T> {
        let data = mem::take(&mut self.data);
        metrics::record_marshalled_bytes(mem::size_of_val(data.as_slice()));
        data
    }
}

impl<T: Copy + Default> Drop for ForeignBuffer<T> {
    fn drop(&mut self) {
        metrics::foreign_buffer_released();
    }
}
