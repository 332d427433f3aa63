use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Size-keyed pool of scratch vectors.
///
/// Buffers are checked out for the exclusive use of one caller and checked back in once
/// their contents have been consumed. A checked-out buffer is always reset to `fill`, so
/// callers never observe what a previous user left behind.
#[derive(Debug)]
pub struct ScratchPool<T> {
    free: Mutex<FxHashMap<usize, Vec<Vec<T>>>>,
}

impl<T: Clone> Default for ScratchPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> ScratchPool<T> {
    pub fn new() -> Self {
        Self {
            free: Mutex::new(FxHashMap::default()),
        }
    }

    /// Returns a buffer of `len` elements, all set to `fill`.
    pub fn checkout(&self, len: usize, fill: T) -> Vec<T> {
        let recycled = self.free.lock().get_mut(&len).and_then(Vec::pop);
        match recycled {
            Some(mut buffer) => {
                buffer.fill(fill);
                buffer
            }
            None => vec![fill; len],
        }
    }

    /// Hands a buffer back for reuse.
    pub fn checkin(&self, buffer: Vec<T>) {
        self.free.lock().entry(buffer.len()).or_default().push(buffer);
    }

    /// Number of idle buffers of length `len`.
    pub fn idle(&self, len: usize) -> usize {
        self.free.lock().get(&len).map_or(0, Vec::len)
    }
}
