#![allow(dead_code)]

use gpu_ptr_translator::config::ServiceConfig;
use gpu_ptr_translator::driver::{
    EndpointSpec, FileOperations, HostEnvironment, InterfaceQuery, OpenFile, TranslatorDevice,
    UserMemory,
};
use gpu_ptr_translator::error::Errno;
use gpu_ptr_translator::provider::{
    Attachment, DeviceId, DmaBuf, DmaBufOps, P2pInfo, Pid, RdmaInterface, Segment, SgTable,
};
use gpu_ptr_translator::translate::TranslatorContext;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const DEVICE: DeviceId = DeviceId(0x6770);

/// Bus window the mock Provider maps unconfigured addresses into.
pub const BUS_BASE: u64 = 0x80_0000_0000;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ===============================================================================================
// RDMA Provider
// ===============================================================================================

/// Recording RDMA Provider with per-call failure injection.
///
/// Unless a layout is registered for an address, `get_pages(va, len)` reports a single segment
/// at `BUS_BASE + va`.
#[derive(Default)]
pub struct MockRdma {
    pub page_size: AtomicU64,
    layouts: Mutex<HashMap<u64, Vec<Segment>>>,
    outstanding: Mutex<HashSet<u64>>,
    next_handle: AtomicU64,

    pub page_size_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub put_calls: AtomicUsize,

    pub fail_page_size: Mutex<Option<Errno>>,
    pub fail_get_pages: Mutex<Option<Errno>>,
    pub fail_put_pages: Mutex<Option<Errno>>,
}

impl MockRdma {
    pub fn new() -> Arc<Self> {
        let rdma = Self::default();
        rdma.page_size.store(4096, Ordering::Relaxed);
        Arc::new(rdma)
    }

    pub fn set_layout(&self, va: u64, segments: Vec<Segment>) {
        self.layouts.lock().unwrap().insert(va, segments);
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.lock().unwrap().len()
    }

    pub fn provider_calls(&self) -> usize {
        self.page_size_calls.load(Ordering::SeqCst)
            + self.get_calls.load(Ordering::SeqCst)
            + self.put_calls.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }
}

impl RdmaInterface for MockRdma {
    fn get_page_size(&self, _va: u64, _len: u64, _pid: Pid) -> Result<u64, Errno> {
        self.page_size_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = *self.fail_page_size.lock().unwrap() {
            return Err(e);
        }
        Ok(self.page_size.load(Ordering::Relaxed))
    }

    fn get_pages(&self, va: u64, len: u64, pid: Pid) -> Result<P2pInfo, Errno> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = *self.fail_get_pages.lock().unwrap() {
            return Err(e);
        }
        let segments = self
            .layouts
            .lock()
            .unwrap()
            .get(&va)
            .cloned()
            .unwrap_or_else(|| vec![Segment::new(BUS_BASE + va, len as u32)]);

        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
        self.outstanding.lock().unwrap().insert(handle);
        Ok(P2pInfo {
            handle,
            va,
            size: len,
            pid,
            pages: SgTable::new(segments),
        })
    }

    fn put_pages(&self, info: P2pInfo) -> Result<(), Errno> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        assert!(
            self.outstanding.lock().unwrap().remove(&info.handle),
            "put_pages on handle {} that is not outstanding",
            info.handle
        );
        match *self.fail_put_pages.lock().unwrap() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ===============================================================================================
// DMA-BUF subsystem
// ===============================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufEvent {
    Get(u64),
    Attach(u64),
    Map(u64),
    Unmap(u64),
    Detach(u64),
    Put(u64),
}

/// Recording DMA-BUF subsystem. Buffers are registered per fd; handles are unique per call so
/// concurrent sequences can be told apart.
#[derive(Default)]
pub struct MockDmaBuf {
    buffers: Mutex<HashMap<i32, (u64, Vec<Segment>)>>,
    next_handle: AtomicU64,
    pub events: Mutex<Vec<BufEvent>>,
    pub fail_attach: Mutex<Option<Errno>>,
    pub fail_map: Mutex<Option<Errno>>,
}

impl MockDmaBuf {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_buffer(&self, fd: i32, size: u64, segments: Vec<Segment>) {
        self.buffers.lock().unwrap().insert(fd, (size, segments));
    }

    pub fn events(&self) -> Vec<BufEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, ev: BufEvent) {
        self.events.lock().unwrap().push(ev);
    }

    fn handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Counts of acquire events minus their matching releases: (buffers, attachments, mappings).
    pub fn balance(&self) -> (i64, i64, i64) {
        let mut bal = (0, 0, 0);
        for ev in self.events() {
            match ev {
                BufEvent::Get(_) => bal.0 += 1,
                BufEvent::Put(_) => bal.0 -= 1,
                BufEvent::Attach(_) => bal.1 += 1,
                BufEvent::Detach(_) => bal.1 -= 1,
                BufEvent::Map(_) => bal.2 += 1,
                BufEvent::Unmap(_) => bal.2 -= 1,
            }
        }
        bal
    }
}

impl DmaBufOps for MockDmaBuf {
    fn get(&self, fd: i32) -> Result<DmaBuf, Errno> {
        let size = self
            .buffers
            .lock()
            .unwrap()
            .get(&fd)
            .map(|(size, _)| *size)
            .ok_or(Errno::EBADF)?;
        let handle = (u64::from(fd as u32) << 32) | self.handle();
        self.record(BufEvent::Get(handle));
        Ok(DmaBuf { handle, size })
    }

    fn attach(&self, buf: &DmaBuf, device: DeviceId) -> Result<Attachment, Errno> {
        if let Some(e) = *self.fail_attach.lock().unwrap() {
            return Err(e);
        }
        self.record(BufEvent::Attach(buf.handle));
        Ok(Attachment {
            handle: buf.handle,
            device,
        })
    }

    fn map_attachment(&self, attach: &Attachment) -> Result<SgTable, Errno> {
        if let Some(e) = *self.fail_map.lock().unwrap() {
            return Err(e);
        }
        let fd = (attach.handle >> 32) as i32;
        let segments = self.buffers.lock().unwrap()[&fd].1.clone();
        self.record(BufEvent::Map(attach.handle));
        Ok(SgTable::new(segments))
    }

    fn unmap_attachment(&self, attach: &Attachment, _sgt: SgTable) {
        self.record(BufEvent::Unmap(attach.handle));
    }

    fn detach(&self, buf: &DmaBuf, attach: Attachment) {
        assert_eq!(buf.handle, attach.handle);
        self.record(BufEvent::Detach(attach.handle));
    }

    fn put(&self, buf: DmaBuf) {
        self.record(BufEvent::Put(buf.handle));
    }
}

// ===============================================================================================
// Caller memory
// ===============================================================================================

/// Caller buffer that can be made to fault on either direction.
pub struct FaultyMemory {
    pub data: Vec<u8>,
    pub fail_in: bool,
    pub fail_out: bool,
}

impl FaultyMemory {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            fail_in: false,
            fail_out: false,
        }
    }
}

impl UserMemory for FaultyMemory {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn copy_in(&self, dst: &mut [u8]) -> Result<(), Errno> {
        if self.fail_in {
            return Err(Errno::EFAULT);
        }
        self.data.copy_in(dst)
    }

    fn copy_out(&mut self, src: &[u8]) -> Result<(), Errno> {
        if self.fail_out {
            return Err(Errno::EFAULT);
        }
        self.data.copy_out(src)
    }
}

// ===============================================================================================
// Service fixtures
// ===============================================================================================

pub struct Fixture {
    pub rdma: Arc<MockRdma>,
    pub dmabuf: Arc<MockDmaBuf>,
    pub device: TranslatorDevice,
}

impl Fixture {
    pub fn new() -> Self {
        init_logging();
        let rdma = MockRdma::new();
        let dmabuf = MockDmaBuf::new();
        let ctx = TranslatorContext::new(
            rdma.clone(),
            dmabuf.clone(),
            ServiceConfig::default().page_shift,
        );
        Self {
            rdma,
            dmabuf,
            device: TranslatorDevice::new(Arc::new(ctx)),
        }
    }

    pub fn open(&self) -> OpenFile {
        let mut file = OpenFile::new(DEVICE);
        self.device.open(&mut file).unwrap();
        file
    }
}

// ===============================================================================================
// Host environment
// ===============================================================================================

pub struct MockQuery {
    pub rdma: Arc<MockRdma>,
    pub fail: Option<Errno>,
}

impl InterfaceQuery for MockQuery {
    fn query_rdma_interface(&self) -> Result<Arc<dyn RdmaInterface>, Errno> {
        match self.fail {
            Some(e) => Err(e),
            None => Ok(self.rdma.clone()),
        }
    }
}

/// Host that records every lifecycle call in order.
pub struct MockHost {
    pub rdma: Arc<MockRdma>,
    pub dmabuf: Arc<MockDmaBuf>,
    pub symbol_present: bool,
    pub query_fail: Option<Errno>,
    pub register_fail: Option<Errno>,
    pub events: Mutex<Vec<String>>,
    pub endpoint: Mutex<Option<(EndpointSpec, Arc<dyn FileOperations>)>>,
    pub symbol_refs: AtomicUsize,
}

impl MockHost {
    pub fn new() -> Self {
        init_logging();
        Self {
            rdma: MockRdma::new(),
            dmabuf: MockDmaBuf::new(),
            symbol_present: true,
            query_fail: None,
            register_fail: None,
            events: Mutex::new(Vec::new()),
            endpoint: Mutex::new(None),
            symbol_refs: AtomicUsize::new(0),
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, ev: String) {
        self.events.lock().unwrap().push(ev);
    }
}

impl HostEnvironment for MockHost {
    fn symbol_request(&self, name: &str) -> Option<Arc<dyn InterfaceQuery>> {
        self.record(format!("symbol_request {name}"));
        if !self.symbol_present {
            return None;
        }
        self.symbol_refs.fetch_add(1, Ordering::SeqCst);
        Some(Arc::new(MockQuery {
            rdma: self.rdma.clone(),
            fail: self.query_fail,
        }))
    }

    fn symbol_put(&self, name: &str) {
        self.record(format!("symbol_put {name}"));
        self.symbol_refs.fetch_sub(1, Ordering::SeqCst);
    }

    fn dma_buf_ops(&self) -> Arc<dyn DmaBufOps> {
        self.dmabuf.clone()
    }

    fn register_endpoint(
        &self,
        spec: &EndpointSpec,
        ops: Arc<dyn FileOperations>,
    ) -> Result<DeviceId, Errno> {
        self.record(format!("register {} {:o}", spec.name, spec.mode.bits()));
        if let Some(e) = self.register_fail {
            return Err(e);
        }
        *self.endpoint.lock().unwrap() = Some((spec.clone(), ops));
        Ok(DEVICE)
    }

    fn deregister_endpoint(&self, device: DeviceId) {
        self.record(format!("deregister {:x}", device.0));
        self.endpoint.lock().unwrap().take();
    }
}
