pub mod dmabuf;
pub mod pagemap;
pub mod pages;

use crate::error::{TranslatorError, TranslatorResult};
use crate::provider::{DmaBufOps, RdmaInterface, SgTable};
use log::{debug, info};
use std::fmt;
use std::sync::Arc;

/// Everything a request handler needs, bound once at start-up and immutable afterwards.
///
/// Handlers receive it by reference; there is no ambient global.
pub struct TranslatorContext {
    rdma: Arc<dyn RdmaInterface>,
    dmabuf: Arc<dyn DmaBufOps>,
    page_shift: u32,
}

impl TranslatorContext {
    #[must_use]
    pub fn new(rdma: Arc<dyn RdmaInterface>, dmabuf: Arc<dyn DmaBufOps>, page_shift: u32) -> Self {
        Self {
            rdma,
            dmabuf,
            page_shift,
        }
    }

    #[must_use]
    pub fn rdma(&self) -> &dyn RdmaInterface {
        &*self.rdma
    }

    #[must_use]
    pub fn dmabuf(&self) -> &dyn DmaBufOps {
        &*self.dmabuf
    }

    #[must_use]
    pub const fn page_shift(&self) -> u32 {
        self.page_shift
    }

    #[must_use]
    pub const fn page_size(&self) -> u64 {
        1 << self.page_shift
    }
}

impl fmt::Debug for TranslatorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslatorContext")
            .field("page_shift", &self.page_shift)
            .finish_non_exhaustive()
    }
}

/// The externally visible result of a translation: first bus address and segment count.
///
/// `nents == 0` implies `paddr == 0`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Translation {
    pub paddr: u64,
    pub nents: u32,
}

impl Translation {
    /// Summarise a scatter/gather table, logging every segment for diagnostics.
    ///
    /// # Errors
    /// `Inconsistent` if the table has more segments than the response can count.
    pub fn from_pages(sgt: &SgTable, tag: &str, vaddr: u64, length: u64) -> TranslatorResult<Self> {
        let nents = u32::try_from(sgt.nents()).map_err(|_| {
            TranslatorError::Inconsistent(format!("{} segments overflow the count", sgt.nents()))
        })?;
        info!("{tag}: Get 0x{vaddr:016x} (len: {length}) mapped to {nents} pages");

        let Some(first) = sgt.first() else {
            return Ok(Self::default());
        };
        for (i, sg) in sgt.iter().enumerate() {
            debug!(
                "{tag}: segment_{i} dma_address 0x{:x} length 0x{:x} dma_length 0x{:x}",
                sg.dma_address, sg.length, sg.dma_length
            );
        }
        Ok(Self {
            paddr: first.dma_address,
            nents,
        })
    }
}
