use std::sync::Mutex;

/// Free-list of fixed-size read-buffer slabs, one per live connection at any
/// time, reused across the connection's lifetime. Keeps steady-state
/// connection churn allocation-free after warm-up.
pub struct BufferPool {
    slab_len: usize,
    free: Mutex<Vec<Box<[u8]>>>,
}

impl BufferPool {
    pub fn new(slab_len: usize) -> Self {
        Self { slab_len, free: Mutex::new(Vec::new()) }
    }

    pub fn acquire(&self) -> Box<[u8]> {
        self.free
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop()
            .unwrap_or_else(|| vec![0u8; self.slab_len].into_boxed_slice())
    }

    pub fn release(&self, slab: Box<[u8]>) {
        if slab.len() == self.slab_len {
            self.free.lock().unwrap_or_else(|e| e.into_inner()).push(slab);
        }
    }

    #[cfg(test)]
    pub fn pooled_len(&self) -> usize {
        self.free.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_slabs_are_reused_and_counted() {
        let pool = BufferPool::new(16);
        assert_eq!(pool.pooled_len(), 0);

        let a = pool.acquire();
        let b = pool.acquire();
        assert_eq!(pool.pooled_len(), 0);

        pool.release(a);
        pool.release(b);
        assert_eq!(pool.pooled_len(), 2);

        let reused = pool.acquire();
        assert_eq!(reused.len(), 16);
        assert_eq!(pool.pooled_len(), 1);
    }

    #[test]
    fn mismatched_slab_len_is_dropped_not_pooled() {
        let pool = BufferPool::new(16);
        pool.release(vec![0u8; 8].into_boxed_slice());
        assert_eq!(pool.pooled_len(), 0);
    }
}
