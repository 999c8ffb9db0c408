use super::{DeviceId, SgTable};
use crate::error::Errno;

/// A referenced DMA-BUF. Released by moving it into [`DmaBufOps::put`].
#[derive(Debug, PartialEq, Eq)]
pub struct DmaBuf {
    pub handle: u64,
    /// Size advertised by the exporter, in bytes.
    pub size: u64,
}

/// An attachment of a [`DmaBuf`] to a device. Released by moving it into [`DmaBufOps::detach`].
#[derive(Debug, PartialEq, Eq)]
pub struct Attachment {
    pub handle: u64,
    pub device: DeviceId,
}

/// The buffer-sharing primitives of the hosting environment.
///
/// Teardown calls do not report failure; they mirror the void-returning kernel primitives.
pub trait DmaBufOps: Send + Sync {
    /// Resolve a shareable buffer handle (a file descriptor) to a referenced buffer.
    fn get(&self, fd: i32) -> Result<DmaBuf, Errno>;

    fn attach(&self, buf: &DmaBuf, device: DeviceId) -> Result<Attachment, Errno>;

    /// Map `attach` for bidirectional device access.
    fn map_attachment(&self, attach: &Attachment) -> Result<SgTable, Errno>;

    fn unmap_attachment(&self, attach: &Attachment, sgt: SgTable);

    fn detach(&self, buf: &DmaBuf, attach: Attachment);

    fn put(&self, buf: DmaBuf);
}

// ===============================================================================================
// Scoped guards
// ===============================================================================================
//
// Each guard releases exactly what it acquired when dropped. Declared in acquisition order,
// Rust drops them in reverse: unmap, detach, put.

/// A referenced buffer, put on drop.
pub struct BufferRef<'a> {
    ops: &'a dyn DmaBufOps,
    buf: Option<DmaBuf>,
}

impl<'a> BufferRef<'a> {
    /// # Errors
    /// Forwards the error from [`DmaBufOps::get`].
    pub fn get(ops: &'a dyn DmaBufOps, fd: i32) -> Result<Self, Errno> {
        let buf = ops.get(fd)?;
        Ok(Self { ops, buf: Some(buf) })
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.buf.as_ref().map_or(0, |b| b.size)
    }

    /// Attach this buffer to `device`.
    ///
    /// # Errors
    /// Forwards the error from [`DmaBufOps::attach`]; the buffer stays referenced until this
    /// guard drops.
    pub fn attach(&self, device: DeviceId) -> Result<AttachmentRef<'_>, Errno> {
        let Some(buf) = self.buf.as_ref() else {
            return Err(Errno::EBADF);
        };
        let attach = self.ops.attach(buf, device)?;
        Ok(AttachmentRef {
            ops: self.ops,
            buf,
            attach: Some(attach),
        })
    }
}

impl Drop for BufferRef<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.ops.put(buf);
        }
    }
}

/// An attachment, detached on drop. Borrows the buffer it belongs to, so it cannot outlive it.
pub struct AttachmentRef<'a> {
    ops: &'a dyn DmaBufOps,
    buf: &'a DmaBuf,
    attach: Option<Attachment>,
}

impl AttachmentRef<'_> {
    /// Map the attachment for device access.
    ///
    /// # Errors
    /// Forwards the error from [`DmaBufOps::map_attachment`].
    pub fn map(&self) -> Result<Mapping<'_>, Errno> {
        let Some(attach) = self.attach.as_ref() else {
            return Err(Errno::EBADF);
        };
        let sgt = self.ops.map_attachment(attach)?;
        Ok(Mapping {
            ops: self.ops,
            attach,
            sgt: Some(sgt),
        })
    }
}

impl Drop for AttachmentRef<'_> {
    fn drop(&mut self) {
        if let Some(attach) = self.attach.take() {
            self.ops.detach(self.buf, attach);
        }
    }
}

/// A mapped attachment, unmapped on drop.
pub struct Mapping<'a> {
    ops: &'a dyn DmaBufOps,
    attach: &'a Attachment,
    sgt: Option<SgTable>,
}

impl Mapping<'_> {
    #[must_use]
    pub fn pages(&self) -> Option<&SgTable> {
        self.sgt.as_ref()
    }
}

impl Drop for Mapping<'_> {
    fn drop(&mut self) {
        if let Some(sgt) = self.sgt.take() {
            self.ops.unmap_attachment(self.attach, sgt);
        }
    }
}
