use super::{Pid, SgTable};
use crate::error::Errno;
use log::error;

/// Pinned-page descriptor returned by [`RdmaInterface::get_pages`].
///
/// Deliberately neither `Clone` nor `Copy`: the only way to give it back is to move it into
/// [`RdmaInterface::put_pages`], so a descriptor can be released at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct P2pInfo {
    /// Provider-private handle identifying the pinning.
    pub handle: u64,
    pub va: u64,
    pub size: u64,
    pub pid: Pid,
    pub pages: SgTable,
}

/// The peer-to-peer memory interface exported by the GPU driver.
///
/// Implementations serialize internally; callers share one instance across threads without
/// extra locking.
pub trait RdmaInterface: Send + Sync {
    /// Page size backing the range `[va, va + len)`.
    fn get_page_size(&self, va: u64, len: u64, pid: Pid) -> Result<u64, Errno>;

    /// Pin the range and return its bus-address layout.
    fn get_pages(&self, va: u64, len: u64, pid: Pid) -> Result<P2pInfo, Errno>;

    /// Unpin a range previously returned by `get_pages`.
    fn put_pages(&self, info: P2pInfo) -> Result<(), Errno>;
}

/// A scoped pinning. The pages are returned to the Provider exactly once: either through
/// [`PinnedPages::release`], which reports the outcome, or on drop, which logs it.
pub struct PinnedPages<'a> {
    rdma: &'a dyn RdmaInterface,
    info: Option<P2pInfo>,
}

impl<'a> PinnedPages<'a> {
    /// Pin `[va, va + len)` through the Provider.
    ///
    /// # Errors
    /// Forwards the Provider's error unchanged; nothing is held on failure.
    pub fn acquire(
        rdma: &'a dyn RdmaInterface,
        va: u64,
        len: u64,
        pid: Pid,
    ) -> Result<Self, Errno> {
        let info = rdma.get_pages(va, len, pid)?;
        Ok(Self {
            rdma,
            info: Some(info),
        })
    }

    /// The scatter/gather table of the pinned range.
    #[must_use]
    pub fn pages(&self) -> &SgTable {
        // `info` is only taken by `release`/`drop`, both of which consume the guard.
        static EMPTY: SgTable = SgTable {
            segments: Vec::new(),
        };
        self.info.as_ref().map_or(&EMPTY, |info| &info.pages)
    }

    /// Give the pages back and report the Provider's verdict.
    ///
    /// # Errors
    /// Returns the Provider's `put_pages` error.
    pub fn release(mut self) -> Result<(), Errno> {
        match self.info.take() {
            Some(info) => self.rdma.put_pages(info),
            None => Ok(()),
        }
    }
}

impl Drop for PinnedPages<'_> {
    fn drop(&mut self) {
        if let Some(info) = self.info.take() {
            let va = info.va;
            if let Err(e) = self.rdma.put_pages(info) {
                error!("Could not put pages back for VA 0x{va:016x}: {e}");
            }
        }
    }
}
