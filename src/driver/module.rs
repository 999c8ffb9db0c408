use crate::config::{EndpointMode, ServiceConfig};
use crate::driver::device::{FileOperations, TranslatorDevice};
use crate::error::{Errno, TranslatorError, TranslatorResult};
use crate::provider::{DeviceId, DmaBufOps, RdmaInterface};
use crate::translate::TranslatorContext;
use log::{error, info};
use std::sync::Arc;

/// The exported query function behind the interface symbol.
pub trait InterfaceQuery: Send + Sync {
    /// # Errors
    /// The driver's errno when it refuses to hand out its interface.
    fn query_rdma_interface(&self) -> Result<Arc<dyn RdmaInterface>, Errno>;
}

/// Name and permissions of the control node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSpec {
    pub name: String,
    pub mode: EndpointMode,
}

/// What the translator needs from whatever hosts it.
pub trait HostEnvironment: Send + Sync {
    /// Take a reference on an exported symbol. `None` when the exporting driver is not loaded.
    fn symbol_request(&self, name: &str) -> Option<Arc<dyn InterfaceQuery>>;

    /// Drop the reference taken by `symbol_request`.
    fn symbol_put(&self, name: &str);

    fn dma_buf_ops(&self) -> Arc<dyn DmaBufOps>;

    /// Create the named control node and route its operations to `ops`.
    ///
    /// # Errors
    /// The host's errno, e.g. `EBUSY` when the name is taken.
    fn register_endpoint(
        &self,
        spec: &EndpointSpec,
        ops: Arc<dyn FileOperations>,
    ) -> Result<DeviceId, Errno>;

    fn deregister_endpoint(&self, device: DeviceId);
}

/// A loaded translator: Provider bound, endpoint registered.
///
/// Tearing down (via [`TranslatorModule::unload`] or drop) removes the endpoint before the
/// Provider reference is released, so no new request can reach a half torn-down dependency.
pub struct TranslatorModule {
    host: Arc<dyn HostEnvironment>,
    config: ServiceConfig,
    device: Option<DeviceId>,
    context: Option<Arc<TranslatorContext>>,
}

impl TranslatorModule {
    /// Bind the RDMA interface and register the control endpoint.
    ///
    /// # Errors
    /// `InvalidArgument` for an unusable configuration, `InterfaceUnavailable` if the symbol
    /// cannot be resolved, `Provider` if the query fails, `Registration` if the endpoint cannot
    /// be created. Nothing stays referenced on failure.
    pub fn load(host: Arc<dyn HostEnvironment>, config: ServiceConfig) -> TranslatorResult<Self> {
        if let Err(e) = config.validate() {
            error!("Rejecting configuration: {e}");
            return Err(e);
        }

        let symbol = config.interface_symbol.as_str();

        let Some(query) = host.symbol_request(symbol) else {
            error!("Can not get symbol {symbol}, please load amdgpu driver");
            return Err(TranslatorError::InterfaceUnavailable(symbol.to_string()));
        };

        let rdma = match query.query_rdma_interface() {
            Ok(rdma) => rdma,
            Err(e) => {
                error!("Can not get RDMA Interface (result = {e})");
                host.symbol_put(symbol);
                return Err(TranslatorError::Provider(e));
            }
        };

        let context = Arc::new(TranslatorContext::new(
            rdma,
            host.dma_buf_ops(),
            config.page_shift,
        ));
        let ops: Arc<dyn FileOperations> = Arc::new(TranslatorDevice::new(Arc::clone(&context)));

        let spec = EndpointSpec {
            name: config.endpoint_name.clone(),
            mode: config.mode,
        };
        let device = match host.register_endpoint(&spec, ops) {
            Ok(device) => device,
            Err(e) => {
                error!("Can not register device (result = {e})");
                drop(context);
                host.symbol_put(symbol);
                return Err(TranslatorError::Registration(e));
            }
        };

        info!("GPU Ptr Translator loaded (/dev/{})", config.endpoint_name);

        Ok(Self {
            host,
            config,
            device: Some(device),
            context: Some(context),
        })
    }

    /// Identity of the registered endpoint.
    #[must_use]
    pub const fn device(&self) -> Option<DeviceId> {
        self.device
    }

    #[must_use]
    pub fn context(&self) -> Option<&Arc<TranslatorContext>> {
        self.context.as_ref()
    }

    #[must_use]
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Deregister the endpoint, then release the Provider reference.
    pub fn unload(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        let Some(device) = self.device.take() else {
            return;
        };
        self.host.deregister_endpoint(device);
        self.host.symbol_put(&self.config.interface_symbol);
        self.context = None;
        info!("GPU Translator unloaded");
    }
}

impl Drop for TranslatorModule {
    fn drop(&mut self) {
        self.teardown();
    }
}
