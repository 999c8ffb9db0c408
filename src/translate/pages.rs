use super::{TranslatorContext, Translation};
use crate::driver::ioctl::{GET_PAGES_ARGS_SIZE, GetPagesArgs};
use crate::driver::user::{UserMemory, copy_from_user, copy_to_user};
use crate::error::{TranslatorError, TranslatorResult};
use crate::provider::PinnedPages;
use log::{error, info};

/// Resolve `[vaddr, vaddr + length)` through the RDMA Provider.
///
/// The outer `Result` covers everything up to and including segment extraction. The inner one
/// is the outcome of giving the pages back, which happens unconditionally once they were
/// pinned; the caller decides how to report it.
///
/// # Errors
/// Forwards Provider failures from `get_page_size` and `get_pages` as
/// [`TranslatorError::Provider`].
pub fn translate_range(
    ctx: &TranslatorContext,
    vaddr: u64,
    length: u64,
) -> TranslatorResult<(Translation, TranslatorResult<()>)> {
    let page_size = ctx
        .rdma()
        .get_page_size(vaddr, length, None)
        .map_err(|e| {
            error!("Get page size: 0x{vaddr:016x} (len: {length:x}) failed: {e}");
            TranslatorError::Provider(e)
        })?;
    info!("PAGE_SIZE: {page_size}");

    let pinned = PinnedPages::acquire(ctx.rdma(), vaddr, length, None).map_err(|e| {
        error!("Get pages: 0x{vaddr:016x} (len: {length:x}) failed: {e}");
        TranslatorError::Provider(e)
    })?;

    let translation = Translation::from_pages(pinned.pages(), "PEER   ", vaddr, length);

    let released = pinned.release().map_err(|e| {
        error!("Could not put pages back: {e}");
        TranslatorError::Cleanup(e)
    });

    Ok((translation?, released))
}

/// `GET_PAGES` handler.
///
/// The response is written whenever translation succeeded. A failure to release the pinned
/// pages is then reported as the call's result even though the caller already has the data.
///
/// # Errors
/// `Fault` on copy-in/copy-out failure, `Provider` on lookup failure, `Cleanup` when only the
/// release failed.
pub fn get_pages(ctx: &TranslatorContext, arg: &mut dyn UserMemory) -> TranslatorResult<()> {
    let raw = copy_from_user::<GET_PAGES_ARGS_SIZE>(arg)?;
    let mut params = GetPagesArgs::decode(&raw);

    let (translation, released) = translate_range(ctx, params.vaddr, params.length)?;

    params.paddr = translation.paddr;
    params.nents = translation.nents;
    copy_to_user(arg, &params.encode())?;

    released
}
