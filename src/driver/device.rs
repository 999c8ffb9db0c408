use crate::driver::ioctl::Command;
use crate::driver::user::UserMemory;
use crate::error::{TranslatorError, TranslatorResult};
use crate::provider::DeviceId;
use crate::translate::{TranslatorContext, dmabuf, pagemap, pages};
use crate::utils::{ioc_dir, ioc_nr, ioc_size, ioc_type};
use log::{debug, warn};
use std::any::Any;
use std::sync::Arc;

/// Per-open state of the control endpoint, the analogue of a kernel `struct file`.
pub struct OpenFile {
    /// Current stream position; on the read interface this is a GPU virtual address.
    pub pos: u64,
    device: DeviceId,
    private_data: Option<Box<dyn Any + Send>>,
}

impl OpenFile {
    #[must_use]
    pub fn new(device: DeviceId) -> Self {
        Self {
            pos: 0,
            device,
            private_data: None,
        }
    }

    #[must_use]
    pub const fn device(&self) -> DeviceId {
        self.device
    }

    pub fn set_private_data(&mut self, data: Box<dyn Any + Send>) {
        self.private_data = Some(data);
    }

    #[must_use]
    pub fn private_data(&self) -> Option<&(dyn Any + Send)> {
        self.private_data.as_deref()
    }
}

impl std::fmt::Debug for OpenFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenFile")
            .field("pos", &self.pos)
            .field("device", &self.device)
            .field("has_private_data", &self.private_data.is_some())
            .finish()
    }
}

/// Operations the hosting environment routes to a registered endpoint.
pub trait FileOperations: Send + Sync {
    /// # Errors
    /// Implementation defined.
    fn open(&self, file: &mut OpenFile) -> TranslatorResult<()>;

    /// # Errors
    /// Implementation defined.
    fn release(&self, file: &mut OpenFile) -> TranslatorResult<()>;

    /// Reposition the stream. `whence` is `SEEK_SET` or `SEEK_CUR`.
    ///
    /// # Errors
    /// `InvalidArgument` for any other `whence` or a position outside `0..=i64::MAX`.
    fn llseek(&self, file: &mut OpenFile, offset: i64, whence: i32) -> TranslatorResult<u64>;

    /// Read from the current position; the length of `buf` is the requested count.
    ///
    /// # Errors
    /// Implementation defined.
    fn read(&self, file: &mut OpenFile, buf: &mut dyn UserMemory) -> TranslatorResult<usize>;

    /// Execute a control command against the argument block `arg`.
    ///
    /// # Errors
    /// `UnknownCommand` for codes outside the command table, otherwise the handler's error.
    fn unlocked_ioctl(
        &self,
        file: &mut OpenFile,
        cmd: u32,
        arg: &mut dyn UserMemory,
    ) -> TranslatorResult<()>;
}

/// The translator's endpoint: routes reads and commands to the translate handlers.
///
/// Holds only the shared, immutable context, so one instance serves every caller concurrently.
#[derive(Debug, Clone)]
pub struct TranslatorDevice {
    ctx: Arc<TranslatorContext>,
}

impl TranslatorDevice {
    #[must_use]
    pub const fn new(ctx: Arc<TranslatorContext>) -> Self {
        Self { ctx }
    }

    #[must_use]
    pub fn context(&self) -> &TranslatorContext {
        &self.ctx
    }
}

impl FileOperations for TranslatorDevice {
    fn open(&self, file: &mut OpenFile) -> TranslatorResult<()> {
        file.private_data = None;
        debug!("open: device {:?}", file.device);
        Ok(())
    }

    fn release(&self, file: &mut OpenFile) -> TranslatorResult<()> {
        file.private_data = None;
        debug!("release: device {:?}", file.device);
        Ok(())
    }

    fn llseek(&self, file: &mut OpenFile, offset: i64, whence: i32) -> TranslatorResult<u64> {
        let base = match whence {
            libc::SEEK_SET => 0,
            libc::SEEK_CUR => i64::try_from(file.pos).map_err(|_| {
                TranslatorError::InvalidArgument(format!("position {} out of range", file.pos))
            })?,
            _ => {
                return Err(TranslatorError::InvalidArgument(format!(
                    "unsupported whence {whence}"
                )));
            }
        };

        let pos = base
            .checked_add(offset)
            .and_then(|p| u64::try_from(p).ok())
            .ok_or_else(|| {
                TranslatorError::InvalidArgument(format!("seek to {base} + {offset} out of range"))
            })?;

        file.pos = pos;
        Ok(pos)
    }

    fn read(&self, file: &mut OpenFile, buf: &mut dyn UserMemory) -> TranslatorResult<usize> {
        // The position is a virtual address, not a cursor: it is left where it is.
        pagemap::read_entry(&self.ctx, file.pos, buf)
    }

    fn unlocked_ioctl(
        &self,
        file: &mut OpenFile,
        cmd: u32,
        arg: &mut dyn UserMemory,
    ) -> TranslatorResult<()> {
        match Command::from_code(cmd) {
            Some(Command::GetPages) => pages::get_pages(&self.ctx, arg),
            Some(Command::DmabufGetPages) => dmabuf::dmabuf_get_pages(&self.ctx, file.device, arg),
            None => {
                warn!(
                    "Unknown ioctl command 0x{cmd:x} (dir {}, type 0x{:x}, nr {}, size {})",
                    ioc_dir(cmd),
                    ioc_type(cmd),
                    ioc_nr(cmd),
                    ioc_size(cmd)
                );
                Err(TranslatorError::UnknownCommand(cmd))
            }
        }
    }
}
