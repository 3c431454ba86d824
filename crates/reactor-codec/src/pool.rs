use std::sync::Mutex;

/// Free-list of scratch `Vec<u8>` buffers used by encoders to stage small
/// frames without allocating on every write. Frames larger than
/// `suggested_len` bypass the pool and allocate directly; the length is a
/// sizing suggestion, not a hard cap.
pub struct SmallBufPool {
    suggested_len: usize,
    free: Mutex<Vec<Vec<u8>>>,
}

impl SmallBufPool {
    pub fn new(suggested_len: usize) -> Self {
        Self { suggested_len, free: Mutex::new(Vec::new()) }
    }

    pub fn acquire(&self, needed: usize) -> Vec<u8> {
        if needed > self.suggested_len {
            return Vec::with_capacity(needed);
        }
        self.free.lock().unwrap_or_else(|e| e.into_inner()).pop().unwrap_or_else(|| {
            Vec::with_capacity(self.suggested_len)
        })
    }

    pub fn release(&self, mut buf: Vec<u8>) {
        if buf.capacity() >= self.suggested_len {
            buf.clear();
            self.free.lock().unwrap_or_else(|e| e.into_inner()).push(buf);
        }
    }
}
