pub mod device;
pub mod ioctl;
pub mod module;
pub mod user;

pub use device::{FileOperations, OpenFile, TranslatorDevice};
pub use module::{EndpointSpec, HostEnvironment, InterfaceQuery, TranslatorModule};
pub use user::UserMemory;
