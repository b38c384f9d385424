//! Reusable carrier pools (SPEC_FULL §4.6): request carriers, response carriers, byte buffers,
//! and string builders, each a thin `parking_lot::Mutex<Vec<T>>` wrapper. Bounded and low-churn,
//! so a plain mutex-guarded `Vec` is preferred here over a lock-free queue.

use std::collections::HashMap;

use bytes::BytesMut;
use parking_lot::Mutex;

const MIN_BUFFER_CAPACITY: usize = 32 * 1024;
const MAX_BUFFER_CAPACITY: usize = 64 * 1024;

/// A reusable, fixed-shape request carrier. `reset()` clears field contents but keeps the
/// `headers` map's allocated capacity so the next borrower doesn't repay the allocation cost.
#[derive(Debug, Default)]
pub struct RequestCarrier {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: BytesMut,
}

impl RequestCarrier {
    pub fn reset(&mut self) {
        self.method.clear();
        self.url.clear();
        self.headers.clear();
        self.body.clear();
    }
}

/// A reusable response carrier with the same clear-but-keep-capacity reset semantics.
#[derive(Debug, Default)]
pub struct ResponseCarrier {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: BytesMut,
}

impl ResponseCarrier {
    pub fn reset(&mut self) {
        self.status = 0;
        self.headers.clear();
        self.body.clear();
    }
}

/// Generic pool over a `Mutex<Vec<T>>`. `acquire` pops a recycled value (or builds one via
/// `default`), `release` clears it with the caller-supplied reset and pushes it back if the
/// pool hasn't hit its cap.
pub struct Pool<T> {
    items: Mutex<Vec<T>>,
    cap: usize,
}

impl<T> Pool<T> {
    pub fn new(cap: usize) -> Self {
        Pool { items: Mutex::new(Vec::with_capacity(cap.min(64))), cap }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn acquire(&self) -> T
    where
        T: Default,
    {
        self.items.lock().pop().unwrap_or_default()
    }

    /// Returns `item` to the pool after `reset` has run, unless the pool is already full, in
    /// which case it is dropped so the pool never grows past `cap`.
    pub fn release_with(&self, mut item: T, reset: impl FnOnce(&mut T)) {
        reset(&mut item);
        let mut guard = self.items.lock();
        if guard.len() < self.cap {
            guard.push(item);
        }
    }
}

impl Pool<RequestCarrier> {
    pub fn release(&self, item: RequestCarrier) {
        self.release_with(item, RequestCarrier::reset);
    }
}

impl Pool<ResponseCarrier> {
    pub fn release(&self, item: ResponseCarrier) {
        self.release_with(item, ResponseCarrier::reset);
    }
}

/// Pool of reusable byte buffers. Only buffers whose *capacity* falls within
/// `[MIN_BUFFER_CAPACITY, MAX_BUFFER_CAPACITY]` are accepted back — undersized buffers aren't
/// worth pooling and oversized ones would pin memory the pool doesn't need.
pub struct BufferPool {
    items: Mutex<Vec<BytesMut>>,
    cap: usize,
}

impl BufferPool {
    pub fn new(cap: usize) -> Self {
        BufferPool { items: Mutex::new(Vec::with_capacity(cap.min(64))), cap }
    }

    pub fn acquire(&self) -> BytesMut {
        self.items.lock().pop().unwrap_or_else(|| BytesMut::with_capacity(MIN_BUFFER_CAPACITY))
    }

    pub fn release(&self, mut buf: BytesMut) {
        buf.clear();
        let within_band = (MIN_BUFFER_CAPACITY..=MAX_BUFFER_CAPACITY).contains(&buf.capacity());
        if !within_band {
            return;
        }
        let mut guard = self.items.lock();
        if guard.len() < self.cap {
            guard.push(buf);
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pool of reusable `String` builders, e.g. for header-value or cache-key formatting in the
/// request pipeline.
pub struct StringBuilderPool {
    items: Mutex<Vec<String>>,
    cap: usize,
}

impl StringBuilderPool {
    pub fn new(cap: usize) -> Self {
        StringBuilderPool { items: Mutex::new(Vec::with_capacity(cap.min(64))), cap }
    }

    pub fn acquire(&self) -> String {
        self.items.lock().pop().unwrap_or_default()
    }

    pub fn release(&self, mut s: String) {
        s.clear();
        let mut guard = self.items.lock();
        if guard.len() < self.cap {
            guard.push(s);
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// All four carrier pools bundled together, sized once at client construction.
pub struct Carriers {
    pub requests: Pool<RequestCarrier>,
    pub responses: Pool<ResponseCarrier>,
    pub buffers: BufferPool,
    pub strings: StringBuilderPool,
}

impl Carriers {
    pub fn new(cap: usize) -> Self {
        Carriers {
            requests: Pool::new(cap),
            responses: Pool::new(cap),
            buffers: BufferPool::new(cap),
            strings: StringBuilderPool::new(cap),
        }
    }
}
