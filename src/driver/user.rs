//! Caller-owned memory.
//!
//! Requests arrive in, and responses leave through, memory the service does not own. Every
//! access can fault, so it goes through [`UserMemory`] instead of a plain slice.

use crate::error::{Errno, Transfer, TranslatorError, TranslatorResult};
use log::error;

pub trait UserMemory {
    /// Size of the caller's buffer in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the first `dst.len()` bytes of the caller's buffer into `dst`.
    ///
    /// # Errors
    /// `EFAULT` if the range is not readable.
    fn copy_in(&self, dst: &mut [u8]) -> Result<(), Errno>;

    /// Copy `src` to the start of the caller's buffer.
    ///
    /// # Errors
    /// `EFAULT` if the range is not writable.
    fn copy_out(&mut self, src: &[u8]) -> Result<(), Errno>;
}

impl UserMemory for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn copy_in(&self, dst: &mut [u8]) -> Result<(), Errno> {
        let src = self.get(..dst.len()).ok_or(Errno::EFAULT)?;
        dst.copy_from_slice(src);
        Ok(())
    }

    fn copy_out(&mut self, src: &[u8]) -> Result<(), Errno> {
        let dst = self.get_mut(..src.len()).ok_or(Errno::EFAULT)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl UserMemory for Vec<u8> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn copy_in(&self, dst: &mut [u8]) -> Result<(), Errno> {
        self.as_slice().copy_in(dst)
    }

    fn copy_out(&mut self, src: &[u8]) -> Result<(), Errno> {
        self.as_mut_slice().copy_out(src)
    }
}

/// Read a fixed-size argument block. The caller's buffer must be exactly `N` bytes.
pub(crate) fn copy_from_user<const N: usize>(arg: &dyn UserMemory) -> TranslatorResult<[u8; N]> {
    if arg.len() != N {
        error!(
            "copy_from_user: argument is {} bytes, expected {N}",
            arg.len()
        );
        return Err(TranslatorError::Fault(Transfer::CopyIn));
    }
    let mut raw = [0u8; N];
    arg.copy_in(&mut raw).map_err(|e| {
        error!("copy_from_user failed for {N} bytes: {e}");
        TranslatorError::Fault(Transfer::CopyIn)
    })?;
    Ok(raw)
}

pub(crate) fn copy_to_user(arg: &mut dyn UserMemory, src: &[u8]) -> TranslatorResult<()> {
    arg.copy_out(src).map_err(|e| {
        error!("copy_to_user failed for {} bytes: {e}", src.len());
        TranslatorError::Fault(Transfer::CopyOut)
    })
}
