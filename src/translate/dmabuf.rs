use super::{TranslatorContext, Translation};
use crate::driver::ioctl::{DMABUF_GET_PAGES_ARGS_SIZE, DmabufGetPagesArgs};
use crate::driver::user::{UserMemory, copy_from_user, copy_to_user};
use crate::error::{TranslatorError, TranslatorResult};
use crate::provider::DeviceId;
use crate::provider::dmabuf::BufferRef;
use log::{error, warn};

/// Resolve a DMA-BUF backed range by attaching the buffer to `device` and mapping it.
///
/// Every acquired reference is released in reverse order before this returns: unmap, detach,
/// put. That holds on the success path and on every failure path.
///
/// # Errors
/// [`TranslatorError::DmaBuf`] carrying the errno of the first failing primitive.
pub fn translate_dmabuf(
    ctx: &TranslatorContext,
    device: DeviceId,
    vaddr: u64,
    length: u64,
    dmabuf_fd: i32,
) -> TranslatorResult<Translation> {
    let buffer = BufferRef::get(ctx.dmabuf(), dmabuf_fd).map_err(|e| {
        error!("Get dmabuf (fd: {dmabuf_fd}) failed: {e}");
        TranslatorError::DmaBuf(e)
    })?;

    if buffer.size() < length {
        // Not fatal: the caller-supplied length is still used.
        warn!(
            "DMA-BUF size ({}) is smaller than requested length ({length})",
            buffer.size()
        );
    }

    let attachment = buffer.attach(device).map_err(|e| {
        error!("Attach dmabuf failed: {e}");
        TranslatorError::DmaBuf(e)
    })?;

    let mapping = attachment.map().map_err(|e| {
        error!("Map dmabuf attachment failed: {e}");
        TranslatorError::DmaBuf(e)
    })?;

    let tag = format!("DMA-BUF (fd: {dmabuf_fd})");
    match mapping.pages() {
        Some(sgt) => Translation::from_pages(sgt, &tag, vaddr, length),
        None => Ok(Translation::default()),
    }
}

/// `DMABUF_GET_PAGES` handler. The response is copied back only if mapping succeeded.
///
/// # Errors
/// `Fault` on copy-in/copy-out failure, `DmaBuf` when a sharing primitive fails.
pub fn dmabuf_get_pages(
    ctx: &TranslatorContext,
    device: DeviceId,
    arg: &mut dyn UserMemory,
) -> TranslatorResult<()> {
    let raw = copy_from_user::<DMABUF_GET_PAGES_ARGS_SIZE>(arg)?;
    let mut params = DmabufGetPagesArgs::decode(&raw);

    let translation = translate_dmabuf(
        ctx,
        device,
        params.vaddr,
        params.length,
        params.dmabuf_fd,
    )?;

    params.paddr = translation.paddr;
    params.nents = translation.nents;
    copy_to_user(arg, &params.encode())
}
