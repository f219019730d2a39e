//! Two-buffer read/write rotation for chaining fullscreen passes.
//!
//! ```text
//! scene resolve → A
//! pass 0: A → B   swap
//! pass 1: B → A   swap
//! final:  current_read() → back target
//! ```

use super::core::{RenderBackend, RenderTarget2D, TextureDesc};

/// A pair of interchangeable buffers: one is read, the other written.
///
/// After every pass that wrote `current_write()`, call [`swap`](Self::swap) so
/// the freshly written buffer becomes the next pass's input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingPong<T = RenderTarget2D> {
    buffers: [T; 2],
    read: usize,
}

impl<T> PingPong<T> {
    #[must_use]
    pub fn from_pair(first: T, second: T) -> Self {
        Self {
            buffers: [first, second],
            read: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn current_read(&self) -> &T {
        &self.buffers[self.read]
    }

    #[inline]
    #[must_use]
    pub fn current_write(&self) -> &T {
        &self.buffers[1 - self.read]
    }

    #[inline]
    pub fn swap(&mut self) {
        self.read = 1 - self.read;
    }

    /// Makes the first buffer the read side again.
    #[inline]
    pub fn reset(&mut self) {
        self.read = 0;
    }
}

impl PingPong<RenderTarget2D> {
    pub fn new<B: RenderBackend + ?Sized>(backend: &mut B, desc: TextureDesc) -> Self {
        let first = RenderTarget2D::new(backend, desc);
        let second = RenderTarget2D::new(backend, desc);
        Self::from_pair(first, second)
    }

    pub fn resize<B: RenderBackend + ?Sized>(&self, backend: &mut B, width: u32, height: u32) {
        for buffer in &self.buffers {
            buffer.resize(backend, width, height);
        }
    }

    pub fn dispose<B: RenderBackend + ?Sized>(self, backend: &mut B) {
        for buffer in self.buffers {
            buffer.dispose(backend);
        }
    }
}
