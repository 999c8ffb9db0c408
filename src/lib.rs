//! GPU pointer translation service.
//!
//! Resolves GPU virtual address ranges, optionally backed by a DMA-BUF, to the bus addresses
//! and scatter/gather layout behind them. The service side ([`driver`], [`translate`]) is written
//! against the [`provider`] traits; [`client`] talks to a loaded instance through its device node.

pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod provider;
pub mod translate;
pub mod utils;

pub use config::{EndpointMode, ServiceConfig};
pub use error::{Errno, TranslatorError, TranslatorResult};
pub use translate::{Translation, TranslatorContext};
