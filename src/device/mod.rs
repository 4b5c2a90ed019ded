//! Device aggregate: command plumbing shared by every subsystem.
//!
//! [`DeviceCore`] owns the transport, the family command table and the locks
//! that serialize access to the physical device. [`DaqDevice`] owns the
//! subsystem devices a family provides and is what applications hold.
//!
//! ```text
//!   DaqDevice ─┬─ AiDevice ──┐
//!              ├─ AoDevice ──┤
//!              ├─ ...        ├──► DeviceCore ──► UsbTransport
//!              └─ DaqODevice ┘      (cmd lock, trigger lock, engines)
//! ```

pub mod commands;
pub mod info;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, trace, warn};

use crate::config::UlConfig;
use crate::error::{Result, UlError};
use crate::events::{EventCallback, EventHub};
use crate::memory;
use crate::scan::{Direction, ScanEngine};
use crate::subsystem::{
    AiBackend, AiDevice, AoBackend, AoDevice, CtrBackend, CtrDevice, DaqIBackend, DaqIDevice,
    DaqOBackend, DaqODevice, DioBackend, DioDevice, TmrBackend, TmrDevice,
};
use crate::transport::UsbTransport;
use crate::types::{DaqEventType, MemRegion};

pub use commands::{CmdKey, CommandTable};
pub use info::{
    AiInfo, AoInfo, CtrCapability, CtrInfo, DaqIInfo, DaqOInfo, DevInfo, DioInfo, DioPortInfo,
    MemRegionInfo, ScanCaps, TmrInfo,
};

/// Shared state of one physical device.
pub struct DeviceCore {
    info: DevInfo,
    transport: Arc<dyn UsbTransport>,
    commands: &'static CommandTable,
    config: UlConfig,
    cmd_lock: Mutex<()>,
    trigger_lock: Mutex<()>,
    connected: AtomicBool,
    events: Arc<EventHub>,
    input: Arc<ScanEngine>,
    output: Arc<ScanEngine>,
}

impl DeviceCore {
    /// Core for a device reachable through `transport`. Not yet connected.
    pub fn new(
        info: DevInfo,
        transport: Arc<dyn UsbTransport>,
        commands: &'static CommandTable,
        config: UlConfig,
    ) -> Self {
        let events = Arc::new(EventHub::new(info.event_types));
        let input = Arc::new(ScanEngine::new(
            "in",
            Direction::Input,
            Arc::clone(&transport),
            Arc::clone(&events),
            config.clone(),
        ));
        let output = Arc::new(ScanEngine::new(
            "out",
            Direction::Output,
            Arc::clone(&transport),
            Arc::clone(&events),
            config.clone(),
        ));
        debug!(
            product = %info.product_name,
            family = commands.name(),
            "Created device core"
        );
        Self {
            info,
            transport,
            commands,
            config,
            cmd_lock: Mutex::new(()),
            trigger_lock: Mutex::new(()),
            connected: AtomicBool::new(false),
            events,
            input,
            output,
        }
    }

    /// Device-wide information.
    pub fn info(&self) -> &DevInfo {
        &self.info
    }

    /// Runtime configuration.
    pub fn config(&self) -> &UlConfig {
        &self.config
    }

    /// Transport handle.
    pub fn transport(&self) -> &Arc<dyn UsbTransport> {
        &self.transport
    }

    /// Event registrations.
    pub fn events(&self) -> &Arc<EventHub> {
        &self.events
    }

    /// Engine shared by every input scan.
    pub fn input_engine(&self) -> &Arc<ScanEngine> {
        &self.input
    }

    /// Engine shared by every output scan.
    pub fn output_engine(&self) -> &Arc<ScanEngine> {
        &self.output
    }

    /// True between `connect` and `disconnect`.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Fails unless the device is connected and still present.
    pub fn check_connected(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(UlError::NoConnectionEstablished);
        }
        if !self.transport.is_connected() {
            return Err(UlError::DevNotConnected);
        }
        Ok(())
    }

    /// Serializes trigger setup across subsystems sharing a trigger line.
    pub fn trigger_lock(&self) -> MutexGuard<'_, ()> {
        self.trigger_lock.lock()
    }

    /// Host-to-device command.
    pub fn send_cmd(&self, key: CmdKey, value: u16, index: u16, data: &[u8]) -> Result<()> {
        let request = self.commands.get(key)?;
        let _guard = self.cmd_lock.lock();
        trace!(?key, request, value, index, len = data.len(), "send_cmd");
        self.transport
            .send_cmd(request, value, index, data, self.config.transfer.command_timeout())
    }

    /// Device-to-host command. Returns the number of bytes received.
    pub fn query_cmd(&self, key: CmdKey, value: u16, index: u16, buf: &mut [u8]) -> Result<usize> {
        let request = self.commands.get(key)?;
        let _guard = self.cmd_lock.lock();
        let n = self
            .transport
            .query_cmd(request, value, index, buf, self.config.transfer.command_timeout())?;
        trace!(?key, request, value, index, received = n, "query_cmd");
        Ok(n)
    }

    /// Query that must return exactly `len` bytes.
    pub fn query_exact(&self, key: CmdKey, value: u16, index: u16, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let n = self.query_cmd(key, value, index, &mut buf)?;
        if n != len {
            warn!(?key, expected = len, received = n, "Short command reply");
            return Err(UlError::DeadDev);
        }
        Ok(buf)
    }
}

/// One DAQ device and the subsystems its family provides.
pub struct DaqDevice {
    core: Arc<DeviceCore>,
    ai: Option<Arc<AiDevice>>,
    ao: Option<Arc<AoDevice>>,
    dio: Option<Arc<DioDevice>>,
    ctr: Option<Arc<CtrDevice>>,
    tmr: Option<Arc<TmrDevice>>,
    daqi: Option<Arc<DaqIDevice>>,
    daqo: Option<Arc<DaqODevice>>,
}

impl DaqDevice {
    /// Shared core.
    pub fn core(&self) -> &Arc<DeviceCore> {
        &self.core
    }

    /// Device-wide information.
    pub fn dev_info(&self) -> &DevInfo {
        self.core.info()
    }

    /// True between `connect` and `disconnect`.
    pub fn is_connected(&self) -> bool {
        self.core.is_connected()
    }

    /// Open the session: load calibration tables and read the live digital
    /// directions. Connecting twice is a no-op.
    pub fn connect(&self) -> Result<()> {
        if self.core.is_connected() {
            return Ok(());
        }
        if !self.core.transport().is_connected() {
            return Err(UlError::DevNotConnected);
        }
        self.core.set_connected(true);

        let result = self.load_device_state();
        if let Err(e) = result {
            warn!(error = %e, "Connect failed");
            self.core.set_connected(false);
            return Err(e);
        }
        info!(product = %self.core.info().product_name, "Connected");
        Ok(())
    }

    fn load_device_state(&self) -> Result<()> {
        if let Some(ai) = &self.ai {
            ai.load_calibration()?;
        }
        if let Some(ao) = &self.ao {
            ao.load_calibration()?;
        }
        if let Some(dio) = &self.dio {
            dio.load_directions()?;
        }
        Ok(())
    }

    /// Stop every scan, drop loaded queues and close the session.
    ///
    /// Teardown always completes; the first stop error is returned after.
    pub fn disconnect(&self) -> Result<()> {
        let input = self.core.input_engine().stop_any();
        let output = self.core.output_engine().stop_any();
        if let Some(tmr) = &self.tmr {
            tmr.stop_all();
        }
        if let Some(ai) = &self.ai {
            ai.clear_queue();
        }
        self.core.set_connected(false);
        info!(product = %self.core.info().product_name, "Disconnected");
        input.and(output)
    }

    /// Analog input subsystem.
    pub fn ai(&self) -> Result<&Arc<AiDevice>> {
        self.ai.as_ref().ok_or(UlError::BadDevType)
    }

    /// Analog output subsystem.
    pub fn ao(&self) -> Result<&Arc<AoDevice>> {
        self.ao.as_ref().ok_or(UlError::BadDevType)
    }

    /// Digital I/O subsystem.
    pub fn dio(&self) -> Result<&Arc<DioDevice>> {
        self.dio.as_ref().ok_or(UlError::BadDevType)
    }

    /// Counter subsystem.
    pub fn ctr(&self) -> Result<&Arc<CtrDevice>> {
        self.ctr.as_ref().ok_or(UlError::BadDevType)
    }

    /// Timer subsystem.
    pub fn tmr(&self) -> Result<&Arc<TmrDevice>> {
        self.tmr.as_ref().ok_or(UlError::BadDevType)
    }

    /// Synchronous input subsystem.
    pub fn daqi(&self) -> Result<&Arc<DaqIDevice>> {
        self.daqi.as_ref().ok_or(UlError::BadDevType)
    }

    /// Synchronous output subsystem.
    pub fn daqo(&self) -> Result<&Arc<DaqODevice>> {
        self.daqo.as_ref().ok_or(UlError::BadDevType)
    }

    /// Read device memory.
    pub fn mem_read(&self, region: MemRegion, address: u32, buf: &mut [u8]) -> Result<usize> {
        memory::mem_read(&self.core, region, address, buf)
    }

    /// Write device memory.
    pub fn mem_write(&self, region: MemRegion, address: u32, data: &[u8]) -> Result<usize> {
        memory::mem_write(&self.core, region, address, data)
    }

    /// Register a scan event callback.
    ///
    /// Fails with `ERR_ALREADY_ACTIVE` while a scan of a direction the
    /// events belong to is running.
    pub fn enable_event(
        &self,
        types: DaqEventType,
        param: u64,
        callback: EventCallback,
    ) -> Result<()> {
        self.check_events_idle(types)?;
        self.core.events().enable(types, param, callback)
    }

    /// Remove scan event callbacks.
    pub fn disable_event(&self, types: DaqEventType) -> Result<()> {
        self.core.events().disable(types)
    }

    fn check_events_idle(&self, types: DaqEventType) -> Result<()> {
        let input = DaqEventType::ON_DATA_AVAILABLE
            | DaqEventType::ON_INPUT_SCAN_ERROR
            | DaqEventType::ON_END_OF_INPUT_SCAN;
        let output = DaqEventType::ON_OUTPUT_SCAN_ERROR | DaqEventType::ON_END_OF_OUTPUT_SCAN;
        if (types.intersects(input) && self.core.input_engine().is_busy())
            || (types.intersects(output) && self.core.output_engine().is_busy())
        {
            return Err(UlError::AlreadyActive);
        }
        Ok(())
    }

    /// Blink the device LED `flash_count` times.
    pub fn flash_led(&self, flash_count: u8) -> Result<()> {
        self.core.check_connected()?;
        self.core
            .send_cmd(CmdKey::Blink, 0, 0, &[flash_count])
    }
}

impl Drop for DaqDevice {
    fn drop(&mut self) {
        if self.core.is_connected() {
            if let Err(e) = self.disconnect() {
                warn!(error = %e, "Disconnect on drop failed");
            }
        }
    }
}

/// Assembles a [`DaqDevice`] from subsystem capabilities and backends.
///
/// Family drivers use this with their own backends; tests use it to build
/// devices with arbitrary capabilities over a mock transport.
pub struct DaqDeviceBuilder {
    core: Arc<DeviceCore>,
    ai: Option<Arc<AiDevice>>,
    ao: Option<Arc<AoDevice>>,
    dio: Option<Arc<DioDevice>>,
    ctr: Option<Arc<CtrDevice>>,
    tmr: Option<Arc<TmrDevice>>,
    daqi: Option<Arc<DaqIDevice>>,
    daqo: Option<Arc<DaqODevice>>,
}

impl DaqDeviceBuilder {
    /// Builder over a fresh core.
    pub fn new(core: DeviceCore) -> Self {
        Self {
            core: Arc::new(core),
            ai: None,
            ao: None,
            dio: None,
            ctr: None,
            tmr: None,
            daqi: None,
            daqo: None,
        }
    }

    /// Core the subsystems will share; backends keep a clone.
    pub fn core(&self) -> &Arc<DeviceCore> {
        &self.core
    }

    /// Add analog input.
    pub fn with_ai(mut self, info: AiInfo, backend: Arc<dyn AiBackend>) -> Self {
        self.ai = Some(Arc::new(AiDevice::new(Arc::clone(&self.core), info, backend)));
        self
    }

    /// Add analog output.
    pub fn with_ao(mut self, info: AoInfo, backend: Arc<dyn AoBackend>) -> Self {
        self.ao = Some(Arc::new(AoDevice::new(Arc::clone(&self.core), info, backend)));
        self
    }

    /// Add digital I/O.
    pub fn with_dio(mut self, info: DioInfo, backend: Arc<dyn DioBackend>) -> Self {
        self.dio = Some(Arc::new(DioDevice::new(Arc::clone(&self.core), info, backend)));
        self
    }

    /// Add counters.
    pub fn with_ctr(mut self, info: CtrInfo, backend: Arc<dyn CtrBackend>) -> Self {
        self.ctr = Some(Arc::new(CtrDevice::new(Arc::clone(&self.core), info, backend)));
        self
    }

    /// Add pulse timers.
    pub fn with_tmr(mut self, info: TmrInfo, backend: Arc<dyn TmrBackend>) -> Self {
        self.tmr = Some(Arc::new(TmrDevice::new(Arc::clone(&self.core), info, backend)));
        self
    }

    /// Add synchronous input over the subsystems added so far.
    pub fn with_daqi(mut self, info: DaqIInfo, backend: Arc<dyn DaqIBackend>) -> Self {
        self.daqi = Some(Arc::new(DaqIDevice::new(
            Arc::clone(&self.core),
            info,
            backend,
            self.ai.clone(),
            self.dio.clone(),
            self.ctr.clone(),
        )));
        self
    }

    /// Add synchronous output over the subsystems added so far.
    pub fn with_daqo(mut self, info: DaqOInfo, backend: Arc<dyn DaqOBackend>) -> Self {
        self.daqo = Some(Arc::new(DaqODevice::new(
            Arc::clone(&self.core),
            info,
            backend,
            self.ao.clone(),
            self.dio.clone(),
        )));
        self
    }

    /// Finish the device.
    pub fn build(self) -> DaqDevice {
        DaqDevice {
            core: self.core,
            ai: self.ai,
            ao: self.ao,
            dio: self.dio,
            ctr: self.ctr,
            tmr: self.tmr,
            daqi: self.daqi,
            daqo: self.daqo,
        }
    }
}
