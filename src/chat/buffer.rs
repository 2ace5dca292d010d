// src/chat/buffer.rs

use std::time::{Duration, Instant};

/// Flush once the pending text reaches this size.
const MIN_FLUSH_CHARS: usize = 2;
/// Flush at least this often while deltas keep arriving.
const FLUSH_INTERVAL: Duration = Duration::from_millis(50);
/// Emit a scroll side effect each time the displayed text grows past a
/// multiple of this.
const SCROLL_EVERY: usize = 150;

/// Hybrid time/content buffering of streamed deltas: small chunks coalesce,
/// newlines and sentence enders flush immediately, and a 50ms deadline keeps
/// the display moving even on slow trickle.
pub struct ChunkBuffer {
    pending: String,
    displayed_len: usize,
    last_flush: Instant,
    last_scroll_mark: usize,
}

impl ChunkBuffer {
    pub fn new(now: Instant) -> Self {
        Self {
            pending: String::new(),
            displayed_len: 0,
            last_flush: now,
            last_scroll_mark: 0,
        }
    }

    /// Accumulate one delta. Returns the text to append to the display when
    /// the flush policy triggers.
    pub fn push(&mut self, chunk: &str, now: Instant) -> Option<String> {
        self.pending.push_str(chunk);

        let punctuated = chunk.contains('\n')
            || chunk.contains('.')
            || chunk.contains('!')
            || chunk.contains('?');
        let should_flush = self.pending.chars().count() >= MIN_FLUSH_CHARS
            || punctuated
            || now.duration_since(self.last_flush) >= FLUSH_INTERVAL;

        if should_flush { self.take(now) } else { None }
    }

    /// Flush whatever is still pending (end of stream).
    pub fn drain(&mut self, now: Instant) -> Option<String> {
        self.take(now)
    }

    /// True once per crossed 150-char boundary of displayed text.
    pub fn should_scroll(&mut self) -> bool {
        let mark = self.displayed_len / SCROLL_EVERY;
        if mark > self.last_scroll_mark {
            self.last_scroll_mark = mark;
            true
        } else {
            false
        }
    }

    pub fn displayed_len(&self) -> usize {
        self.displayed_len
    }

    fn take(&mut self, now: Instant) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        self.last_flush = now;
        self.displayed_len += self.pending.chars().count();
        Some(std::mem::take(&mut self.pending))
    }
}
