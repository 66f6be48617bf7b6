//! Wrapper for a wgpu buffer object.

use crate::context::Context;
use bytemuck::Pod;
use log::warn;

// wgpu rejects empty bindings, so every buffer holds at least this many bytes.
const MIN_BUFFER_SIZE: u64 = 16;

/// A GPU buffer that is rewritten in place, and only reallocated when new contents outgrow
/// it.
pub struct GpuBuffer {
    label: &'static str,
    usage: wgpu::BufferUsages,
    buffer: wgpu::Buffer,
    len: usize,
}

impl GpuBuffer {
    /// Uploads `data` into a new buffer.
    pub fn new<T: Pod>(
        ctxt: &Context,
        label: &'static str,
        data: &[T],
        usage: wgpu::BufferUsages,
    ) -> GpuBuffer {
        let usage = usage | wgpu::BufferUsages::COPY_DST;
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let buffer = GpuBuffer::allocate(ctxt, label, bytes, usage);

        GpuBuffer {
            label,
            usage,
            buffer,
            len: bytes.len(),
        }
    }

    fn allocate(
        ctxt: &Context,
        label: &'static str,
        bytes: &[u8],
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        if (bytes.len() as u64) < MIN_BUFFER_SIZE {
            let mut padded = bytes.to_vec();
            padded.resize(MIN_BUFFER_SIZE as usize, 0);
            ctxt.create_buffer_init(Some(label), &padded, usage)
        } else {
            ctxt.create_buffer_init(Some(label), bytes, usage)
        }
    }

    /// Writes `data` at the start of the buffer.
    ///
    /// Returns `true` if the buffer had to be reallocated, in which case any bind group
    /// referencing it must be recreated.
    pub fn write<T: Pod>(&mut self, ctxt: &Context, data: &[T]) -> bool {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        self.len = bytes.len();

        if (bytes.len() as u64) <= self.buffer.size() {
            if !bytes.is_empty() {
                ctxt.write_buffer(&self.buffer, 0, bytes);
            }
            false
        } else {
            warn!(
                "reallocating `{}`: {} bytes needed, {} available",
                self.label,
                bytes.len(),
                self.buffer.size()
            );
            self.buffer = GpuBuffer::allocate(ctxt, self.label, bytes, self.usage);
            true
        }
    }

    /// The wgpu buffer.
    #[inline]
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Number of meaningful bytes, which may be less than the allocation.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the buffer holds no meaningful bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// A slice over the meaningful bytes, as bound to vertex and index slots.
    #[inline]
    pub fn slice(&self) -> wgpu::BufferSlice<'_> {
        self.buffer.slice(..(self.len.max(4) as u64))
    }
}
