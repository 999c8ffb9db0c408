use crate::driver::ioctl::{
    DMABUF_GET_PAGES_ARGS_SIZE, DmabufGetPagesArgs, GET_PAGES_ARGS_SIZE,
    GPU_PTR_TRANSLATOR_IOCTL_DMABUF_GET_PAGES, GPU_PTR_TRANSLATOR_IOCTL_GET_PAGES, GetPagesArgs,
    PM_ENTRY_BYTES, PageMapEntry,
};
use crate::error::{TranslatorError, TranslatorResult};
use crate::translate::Translation;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::RawFd;
use std::os::unix::fs::FileExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::sync::Arc;

pub const DEFAULT_DEVICE_PATH: &str = "/dev/gpu_ptr_translator";

/// A handle to the translator's control node.
///
/// Cheap to clone; the descriptor is shared and closed when the last clone drops.
#[derive(Clone, Debug)]
pub struct TranslatorClient {
    pub file: Arc<File>,
}

impl TranslatorClient {
    /// Opens `/dev/gpu_ptr_translator`.
    ///
    /// # Errors
    /// `Io` if the node cannot be opened (module not loaded, permissions).
    pub fn open() -> TranslatorResult<Self> {
        Self::open_path(DEFAULT_DEVICE_PATH)
    }

    /// # Errors
    /// `Io` if `path` cannot be opened for reading.
    pub fn open_path(path: impl AsRef<Path>) -> TranslatorResult<Self> {
        // The node is read-only; ioctls only need a readable descriptor.
        let file = OpenOptions::new().read(true).open(path)?;

        Ok(Self {
            file: Arc::new(file),
        })
    }

    /// Issue an ioctl whose argument block is exactly `N` bytes.
    ///
    /// # Safety
    /// `cmd` must be a command whose encoded size is `N`.
    unsafe fn ioctl<const N: usize>(&self, cmd: u32, arg: &mut [u8; N]) -> TranslatorResult<()> {
        let ret = unsafe { libc::ioctl(self.file.as_raw_fd(), cmd as _, arg.as_mut_ptr()) };
        if ret < 0 {
            return Err(TranslatorError::Io(io::Error::last_os_error()));
        }
        Ok(())
    }

    /// Translate a GPU virtual range to its first bus address and segment count.
    ///
    /// # Errors
    /// `Io` carrying the service's errno.
    pub fn get_pages(&self, vaddr: u64, length: u64) -> TranslatorResult<Translation> {
        let mut raw: [u8; GET_PAGES_ARGS_SIZE] = GetPagesArgs {
            vaddr,
            length,
            ..Default::default()
        }
        .encode();
        unsafe {
            self.ioctl(GPU_PTR_TRANSLATOR_IOCTL_GET_PAGES, &mut raw)?;
        }
        let out = GetPagesArgs::decode(&raw);
        Ok(Translation {
            paddr: out.paddr,
            nents: out.nents,
        })
    }

    /// Translate a range backed by the DMA-BUF `dmabuf_fd`.
    ///
    /// # Errors
    /// `Io` carrying the service's errno.
    pub fn dmabuf_get_pages(
        &self,
        vaddr: u64,
        length: u64,
        dmabuf_fd: RawFd,
    ) -> TranslatorResult<Translation> {
        let mut raw: [u8; DMABUF_GET_PAGES_ARGS_SIZE] = DmabufGetPagesArgs {
            vaddr,
            length,
            dmabuf_fd,
            ..Default::default()
        }
        .encode();
        unsafe {
            self.ioctl(GPU_PTR_TRANSLATOR_IOCTL_DMABUF_GET_PAGES, &mut raw)?;
        }
        let out = DmabufGetPagesArgs::decode(&raw);
        Ok(Translation {
            paddr: out.paddr,
            nents: out.nents,
        })
    }

    /// Read the page-map entry of the page at `vaddr` (which must be page aligned).
    ///
    /// # Errors
    /// `Io` carrying the service's errno, or `Inconsistent` on a short read.
    pub fn read_pagemap_entry(&self, vaddr: u64) -> TranslatorResult<PageMapEntry> {
        let mut raw = [0u8; PM_ENTRY_BYTES];
        let n = self.file.read_at(&mut raw, vaddr)?;
        if n != PM_ENTRY_BYTES {
            return Err(TranslatorError::Inconsistent(format!(
                "short pagemap read: {n} of {PM_ENTRY_BYTES} bytes"
            )));
        }
        Ok(PageMapEntry::from_bytes(raw))
    }
}

impl AsRawFd for TranslatorClient {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}
