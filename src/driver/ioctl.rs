#![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]

use crate::utils::iowr;

// ===============================================================================================
// Constants
// ===============================================================================================

pub const GPU_PTR_TRANSLATOR_IOCTL_MAGIC: u32 = b'G' as u32;

/// Wire size of [`GetPagesArgs`]; matches the C layout including tail padding.
pub const GET_PAGES_ARGS_SIZE: usize = 32;

/// Wire size of [`DmabufGetPagesArgs`]; matches the C layout including interior and tail padding.
pub const DMABUF_GET_PAGES_ARGS_SIZE: usize = 40;

pub const GPU_PTR_TRANSLATOR_IOCTL_GET_PAGES: u32 =
    iowr(GPU_PTR_TRANSLATOR_IOCTL_MAGIC, 1, GET_PAGES_ARGS_SIZE);

pub const GPU_PTR_TRANSLATOR_IOCTL_DMABUF_GET_PAGES: u32 =
    iowr(GPU_PTR_TRANSLATOR_IOCTL_MAGIC, 2, DMABUF_GET_PAGES_ARGS_SIZE);

// ===============================================================================================
// Commands
// ===============================================================================================

/// The command table. Anything that does not decode to a variant is an unknown command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    GetPages,
    DmabufGetPages,
}

impl Command {
    #[must_use]
    pub const fn from_code(cmd: u32) -> Option<Self> {
        match cmd {
            GPU_PTR_TRANSLATOR_IOCTL_GET_PAGES => Some(Self::GetPages),
            GPU_PTR_TRANSLATOR_IOCTL_DMABUF_GET_PAGES => Some(Self::DmabufGetPages),
            _ => None,
        }
    }

    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::GetPages => GPU_PTR_TRANSLATOR_IOCTL_GET_PAGES,
            Self::DmabufGetPages => GPU_PTR_TRANSLATOR_IOCTL_DMABUF_GET_PAGES,
        }
    }

    /// Exact byte size the caller's argument buffer must have.
    #[must_use]
    pub const fn arg_size(self) -> usize {
        match self {
            Self::GetPages => GET_PAGES_ARGS_SIZE,
            Self::DmabufGetPages => DMABUF_GET_PAGES_ARGS_SIZE,
        }
    }
}

// ===============================================================================================
// Argument blocks
// ===============================================================================================
//
// All fields are little-endian at fixed offsets. Padding is written as zero and ignored when
// decoding.

fn get_u64(buf: &[u8], off: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[off..off + 8]);
    u64::from_le_bytes(raw)
}

fn get_u32(buf: &[u8], off: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[off..off + 4]);
    u32::from_le_bytes(raw)
}

fn put_u64(buf: &mut [u8], off: usize, val: u64) {
    buf[off..off + 8].copy_from_slice(&val.to_le_bytes());
}

fn put_u32(buf: &mut [u8], off: usize, val: u32) {
    buf[off..off + 4].copy_from_slice(&val.to_le_bytes());
}

/// `GET_PAGES`: translate a GPU virtual range.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct GetPagesArgs {
    /// [in] GPU virtual address to translate.
    pub vaddr: u64,
    /// [in] Length of the region in bytes.
    pub length: u64,
    /// [out] DMA address of the first segment.
    pub paddr: u64,
    /// [out] Number of scatter/gather segments.
    pub nents: u32,
}

impl GetPagesArgs {
    const VADDR: usize = 0;
    const LENGTH: usize = 8;
    const PADDR: usize = 16;
    const NENTS: usize = 24;

    #[must_use]
    pub fn decode(buf: &[u8; GET_PAGES_ARGS_SIZE]) -> Self {
        Self {
            vaddr: get_u64(buf, Self::VADDR),
            length: get_u64(buf, Self::LENGTH),
            paddr: get_u64(buf, Self::PADDR),
            nents: get_u32(buf, Self::NENTS),
        }
    }

    #[must_use]
    pub fn encode(&self) -> [u8; GET_PAGES_ARGS_SIZE] {
        let mut buf = [0u8; GET_PAGES_ARGS_SIZE];
        put_u64(&mut buf, Self::VADDR, self.vaddr);
        put_u64(&mut buf, Self::LENGTH, self.length);
        put_u64(&mut buf, Self::PADDR, self.paddr);
        put_u32(&mut buf, Self::NENTS, self.nents);
        buf
    }
}

/// `DMABUF_GET_PAGES`: translate a range backed by a DMA-BUF.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct DmabufGetPagesArgs {
    /// [in] GPU virtual address.
    pub vaddr: u64,
    /// [in] Length of the region in bytes.
    pub length: u64,
    /// [in] DMA-BUF file descriptor.
    pub dmabuf_fd: i32,
    /// [out] DMA address of the first segment.
    pub paddr: u64,
    /// [out] Number of scatter/gather segments.
    pub nents: u32,
}

impl DmabufGetPagesArgs {
    const VADDR: usize = 0;
    const LENGTH: usize = 8;
    const DMABUF_FD: usize = 16;
    const PADDR: usize = 24;
    const NENTS: usize = 32;

    #[must_use]
    pub fn decode(buf: &[u8; DMABUF_GET_PAGES_ARGS_SIZE]) -> Self {
        Self {
            vaddr: get_u64(buf, Self::VADDR),
            length: get_u64(buf, Self::LENGTH),
            dmabuf_fd: get_u32(buf, Self::DMABUF_FD) as i32,
            paddr: get_u64(buf, Self::PADDR),
            nents: get_u32(buf, Self::NENTS),
        }
    }

    #[must_use]
    pub fn encode(&self) -> [u8; DMABUF_GET_PAGES_ARGS_SIZE] {
        let mut buf = [0u8; DMABUF_GET_PAGES_ARGS_SIZE];
        put_u64(&mut buf, Self::VADDR, self.vaddr);
        put_u64(&mut buf, Self::LENGTH, self.length);
        put_u32(&mut buf, Self::DMABUF_FD, self.dmabuf_fd as u32);
        put_u64(&mut buf, Self::PADDR, self.paddr);
        put_u32(&mut buf, Self::NENTS, self.nents);
        buf
    }
}

// ===============================================================================================
// Page-map entries
// ===============================================================================================

/// Size in bytes of one page-map record on the read interface.
pub const PM_ENTRY_BYTES: usize = 8;
pub const PM_PFRAME_BITS: u32 = 55;
pub const PM_PFRAME_MASK: u64 = (1 << PM_PFRAME_BITS) - 1;
/// Page is physically mapped.
pub const PM_PRESENT: u64 = 1 << 63;

/// A page-table-style record: frame number in bits 0..=54, presence flag in bit 63.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PageMapEntry(pub u64);

impl PageMapEntry {
    #[must_use]
    pub const fn new(dma_address: u64, page_shift: u32, flags: u64) -> Self {
        Self(((dma_address >> page_shift) & PM_PFRAME_MASK) | flags)
    }

    #[must_use]
    pub const fn frame(self) -> u64 {
        self.0 & PM_PFRAME_MASK
    }

    #[must_use]
    pub const fn is_present(self) -> bool {
        self.0 & PM_PRESENT != 0
    }

    #[must_use]
    pub const fn to_bytes(self) -> [u8; PM_ENTRY_BYTES] {
        self.0.to_le_bytes()
    }

    #[must_use]
    pub const fn from_bytes(raw: [u8; PM_ENTRY_BYTES]) -> Self {
        Self(u64::from_le_bytes(raw))
    }
}
