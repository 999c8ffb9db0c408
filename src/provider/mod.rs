pub mod dmabuf;
pub mod rdma;

/// One contiguous bus-addressable run of a scatter/gather table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Segment {
    /// Address the device uses to reach this run.
    pub dma_address: u64,
    /// CPU-side length in bytes.
    pub length: u32,
    /// Length as seen by the device after IOMMU merging.
    pub dma_length: u32,
}

impl Segment {
    #[must_use]
    pub const fn new(dma_address: u64, length: u32) -> Self {
        Self {
            dma_address,
            length,
            dma_length: length,
        }
    }
}

/// Ordered scatter/gather table handed back by the Provider or a DMA-BUF mapping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SgTable {
    pub segments: Vec<Segment>,
}

impl SgTable {
    #[must_use]
    pub const fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    #[must_use]
    pub fn nents(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn first(&self) -> Option<&Segment> {
        self.segments.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }
}

impl From<Vec<Segment>> for SgTable {
    fn from(segments: Vec<Segment>) -> Self {
        Self { segments }
    }
}

/// Process identity passed to the Provider. `None` means "the calling context".
pub type Pid = Option<i32>;

/// Identity of the registered control endpoint, used as the DMA-BUF attach target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u64);

pub use dmabuf::{Attachment, DmaBuf, DmaBufOps};
pub use rdma::{P2pInfo, PinnedPages, RdmaInterface};
