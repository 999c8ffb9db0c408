use super::TranslatorContext;
use crate::driver::ioctl::{PM_ENTRY_BYTES, PM_PRESENT, PageMapEntry};
use crate::driver::user::{UserMemory, copy_to_user};
use crate::error::{TranslatorError, TranslatorResult};
use crate::provider::PinnedPages;
use crate::utils::is_aligned;
use log::{error, warn};

/// Validate a page-map read of `count` bytes at stream offset `pos`.
///
/// Returns the number of entries requested, which is 0 or 1 on success.
///
/// # Errors
/// `InvalidArgument` for misaligned offset, count or page, `NotSupported` for multi-entry reads.
pub fn check_read(pos: u64, count: usize, page_size: u64) -> TranslatorResult<usize> {
    let entry = PM_ENTRY_BYTES as u64;

    if !is_aligned(pos, entry) {
        warn!("pagemap read: offset {pos} not aligned to entry size {PM_ENTRY_BYTES}");
        return Err(TranslatorError::InvalidArgument(format!(
            "offset {pos} not aligned to entry size {PM_ENTRY_BYTES}"
        )));
    }
    if count % PM_ENTRY_BYTES != 0 {
        warn!("pagemap read: count {count} not aligned to entry size {PM_ENTRY_BYTES}");
        return Err(TranslatorError::InvalidArgument(format!(
            "count {count} not aligned to entry size {PM_ENTRY_BYTES}"
        )));
    }
    if count == 0 {
        return Ok(0);
    }

    let entries = count / PM_ENTRY_BYTES;
    if entries != 1 {
        warn!("pagemap read: only single-entry queries are supported, got {entries}");
        return Err(TranslatorError::NotSupported(format!(
            "{entries} entries requested, only 1 per read"
        )));
    }

    if !is_aligned(pos, page_size) {
        warn!("pagemap read: VA {pos} not aligned to PAGE_SIZE {page_size}");
        return Err(TranslatorError::InvalidArgument(format!(
            "VA 0x{pos:x} not aligned to page size {page_size}"
        )));
    }

    Ok(entries)
}

/// Read one page-map entry for the page at virtual address `pos` into `buf`.
///
/// The whole of `buf` is the requested count. On success returns the number of bytes produced
/// (0 for an empty read, otherwise one entry). The pinned page is released on every path; if the
/// entry was delivered but the release failed, the release error is returned.
///
/// # Errors
/// See [`check_read`]; plus `Provider` when pinning fails, `Inconsistent` when the Provider does
/// not report exactly one segment, `Fault` when the entry cannot be copied out and `Cleanup` when
/// only the release failed.
pub fn read_entry(
    ctx: &TranslatorContext,
    pos: u64,
    buf: &mut dyn UserMemory,
) -> TranslatorResult<usize> {
    let page_size = ctx.page_size();
    if check_read(pos, buf.len(), page_size)? == 0 {
        return Ok(0);
    }

    let pinned = PinnedPages::acquire(ctx.rdma(), pos, page_size, None).map_err(|e| {
        error!("pagemap read: get_pages failed for VA 0x{pos:x}: {e}");
        TranslatorError::Provider(e)
    })?;

    let entry = match pinned.pages().segments.as_slice() {
        [seg] => Ok(PageMapEntry::new(
            seg.dma_address,
            ctx.page_shift(),
            PM_PRESENT,
        )),
        other => {
            error!(
                "pagemap read: get_pages returned {} segments, expected 1",
                other.len()
            );
            Err(TranslatorError::Inconsistent(format!(
                "{} segments for a single page",
                other.len()
            )))
        }
    };

    let delivered = entry.and_then(|pme| copy_to_user(buf, &pme.to_bytes()));

    let released = pinned.release().map_err(|e| {
        error!("pagemap read: could not put pages back for VA 0x{pos:x}: {e}");
        TranslatorError::Cleanup(e)
    });

    delivered?;
    released?;
    Ok(PM_ENTRY_BYTES)
}
