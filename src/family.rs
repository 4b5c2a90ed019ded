//! Device families and the product-id registry that opens them.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::config::UlConfig;
use crate::device::DaqDevice;
use crate::error::{Result, UlError};
use crate::transport::UsbTransport;
use crate::{usb1808, usb24xx};

/// Identifies one physical device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaqDeviceDescriptor {
    /// USB product id
    pub product_id: u16,
    /// Serial number or MAC address
    pub unique_id: String,
}

impl DaqDeviceDescriptor {
    /// Descriptor for `product_id` / `unique_id`.
    pub fn new(product_id: u16, unique_id: impl Into<String>) -> Self {
        Self {
            product_id,
            unique_id: unique_id.into(),
        }
    }
}

type FamilyFactory = Box<dyn Fn(&str, Arc<dyn UsbTransport>, UlConfig) -> Result<DaqDevice> + Send + Sync>;

/// Factories keyed by USB product id.
pub struct FamilyRegistry {
    factories: HashMap<u16, FamilyFactory>,
}

impl Default for FamilyRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl FamilyRegistry {
    /// Registry without any family.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry holding every family this crate drives.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        for model in [usb1808::Model::Usb1808, usb1808::Model::Usb1808X] {
            registry.register(model.product_id(), move |uid, transport, config| {
                usb1808::open(model, uid, transport, config)
            });
        }
        for model in [usb24xx::Model::Usb2408, usb24xx::Model::Usb2416] {
            registry.register(model.product_id(), move |uid, transport, config| {
                usb24xx::open(model, uid, transport, config)
            });
        }
        registry
    }

    /// Register (or replace) the factory of `product_id`.
    pub fn register<F>(&mut self, product_id: u16, factory: F)
    where
        F: Fn(&str, Arc<dyn UsbTransport>, UlConfig) -> Result<DaqDevice> + Send + Sync + 'static,
    {
        self.factories.insert(product_id, Box::new(factory));
    }

    /// True when `product_id` has a factory.
    pub fn supports(&self, product_id: u16) -> bool {
        self.factories.contains_key(&product_id)
    }

    /// Registered product ids, ascending.
    pub fn product_ids(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self.factories.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Open the device `descriptor` names. Unknown products fail with
    /// `ERR_BAD_DEV_TYPE`.
    pub fn create(
        &self,
        descriptor: &DaqDeviceDescriptor,
        transport: Arc<dyn UsbTransport>,
        config: UlConfig,
    ) -> Result<DaqDevice> {
        let factory = self
            .factories
            .get(&descriptor.product_id)
            .ok_or(UlError::BadDevType)?;
        debug!(
            product_id = format_args!("{:#06x}", descriptor.product_id),
            unique_id = %descriptor.unique_id,
            "Creating device"
        );
        factory(&descriptor.unique_id, transport, config)
    }
}

static BUILTIN: Lazy<FamilyRegistry> = Lazy::new(FamilyRegistry::with_builtin);

/// Open a device of any built-in family.
pub fn create_device(
    descriptor: &DaqDeviceDescriptor,
    transport: Arc<dyn UsbTransport>,
    config: UlConfig,
) -> Result<DaqDevice> {
    BUILTIN.create(descriptor, transport, config)
}
