use crate::error::{TranslatorError, TranslatorResult};
use bitflags::bitflags;

pub const DEFAULT_ENDPOINT_NAME: &str = "gpu_ptr_translator";
pub const DEFAULT_INTERFACE_SYMBOL: &str = "amdkfd_query_rdma_interface";
pub const DEFAULT_PAGE_SHIFT: u32 = 12;
/// Accepted range for `page_shift`: 4 KiB up to 1 GiB pages.
pub const MIN_PAGE_SHIFT: u32 = 12;
pub const MAX_PAGE_SHIFT: u32 = 30;

bitflags! {
    /// Access permissions of the control endpoint node, in `st_mode` bit positions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EndpointMode: u32 {
        const USER_READ = libc::S_IRUSR as u32;
        const USER_WRITE = libc::S_IWUSR as u32;
        const GROUP_READ = libc::S_IRGRP as u32;
        const GROUP_WRITE = libc::S_IWGRP as u32;
        const OTHER_READ = libc::S_IROTH as u32;
        const OTHER_WRITE = libc::S_IWOTH as u32;

        /// `r--r--r--`
        const READ_ONLY = Self::USER_READ.bits() | Self::GROUP_READ.bits() | Self::OTHER_READ.bits();
        /// `rw-rw-rw-`
        const READ_WRITE = Self::READ_ONLY.bits()
            | Self::USER_WRITE.bits()
            | Self::GROUP_WRITE.bits()
            | Self::OTHER_WRITE.bits();
    }
}

impl Default for EndpointMode {
    fn default() -> Self {
        Self::READ_ONLY
    }
}

/// Start-up configuration of the translator service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Name of the control node (`/dev/<name>`).
    pub endpoint_name: String,
    /// Symbol under which the GPU driver exports its RDMA interface query.
    pub interface_symbol: String,
    pub mode: EndpointMode,
    /// log2 of the host page size used by the page-map reader.
    pub page_shift: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint_name: DEFAULT_ENDPOINT_NAME.to_string(),
            interface_symbol: DEFAULT_INTERFACE_SYMBOL.to_string(),
            mode: EndpointMode::READ_ONLY,
            page_shift: DEFAULT_PAGE_SHIFT,
        }
    }
}

impl ServiceConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn endpoint_name(mut self, name: impl Into<String>) -> Self {
        self.endpoint_name = name.into();
        self
    }

    #[must_use]
    pub fn interface_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.interface_symbol = symbol.into();
        self
    }

    #[must_use]
    pub const fn mode(mut self, mode: EndpointMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub const fn page_shift(mut self, shift: u32) -> Self {
        self.page_shift = shift;
        self
    }

    #[must_use]
    pub const fn page_size(&self) -> u64 {
        1 << self.page_shift
    }

    /// # Errors
    /// `InvalidArgument` if `page_shift` is outside `MIN_PAGE_SHIFT..=MAX_PAGE_SHIFT`.
    pub fn validate(&self) -> TranslatorResult<()> {
        if !(MIN_PAGE_SHIFT..=MAX_PAGE_SHIFT).contains(&self.page_shift) {
            return Err(TranslatorError::InvalidArgument(format!(
                "page shift {} outside {MIN_PAGE_SHIFT}..={MAX_PAGE_SHIFT}",
                self.page_shift
            )));
        }
        Ok(())
    }
}
