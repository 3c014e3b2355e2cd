//! # Physical Device Selection
//!
//! [`PhysicalDeviceBuilder`] borrows anything implementing [`DeviceSource`] (normally the
//! [`vulkanalia::Instance`]), accumulates [`SelectionCriteria`] through chained calls, and
//! returns the first enumerated device that satisfies them.

use std::{collections::HashSet, marker::PhantomData};

use log::{debug, info};
use vulkanalia::prelude::v1_0::*;

use super::{error::DeviceError, queue::QueueFamilyIndices};

/// The queries device selection needs from the Vulkan runtime.
pub trait DeviceSource {
    /// Copyable, non-owning handle to one physical device.
    type Handle: Copy;

    /// Lists the physical devices in the order the runtime reports them.
    fn physical_devices(&self) -> Result<Vec<Self::Handle>, DeviceError>;

    fn properties(&self, device: Self::Handle) -> DeviceProperties;

    /// Names of every extension the device supports.
    fn extensions(&self, device: Self::Handle) -> Result<Vec<String>, DeviceError>;

    /// Capability flags of each queue family, indexed by family.
    fn queue_families(&self, device: Self::Handle) -> Vec<vk::QueueFlags>;
}

impl DeviceSource for Instance {
    type Handle = vk::PhysicalDevice;

    fn physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>, DeviceError> {
        Ok(unsafe { self.enumerate_physical_devices() }?)
    }

    fn properties(&self, device: vk::PhysicalDevice) -> DeviceProperties {
        let properties = unsafe { self.get_physical_device_properties(device) };

        DeviceProperties {
            id: properties.device_id,
            name: properties.device_name.to_string_lossy().into_owned(),
            device_type: properties.device_type,
        }
    }

    fn extensions(&self, device: vk::PhysicalDevice) -> Result<Vec<String>, DeviceError> {
        // vulkanalia performs the count-then-fill pair of calls internally.
        let extensions = unsafe { self.enumerate_device_extension_properties(device, None) }?;

        Ok(extensions
            .iter()
            .map(|e| e.extension_name.to_string_lossy().into_owned())
            .collect())
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFlags> {
        unsafe { self.get_physical_device_queue_family_properties(device) }
            .iter()
            .map(|family| family.queue_flags)
            .collect()
    }
}

/// The subset of `VkPhysicalDeviceProperties` used for reporting and matching.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceProperties {
    pub id: u32,
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
}

impl DeviceProperties {
    pub fn is_discrete(&self) -> bool {
        self.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
    }
}

/// Criteria accumulated by [`PhysicalDeviceBuilder`].
///
/// Duplicate names are kept as given; matching only tests membership per entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionCriteria {
    pub required_extensions: Vec<String>,
    /// Accepted but not yet used to rank devices.
    pub preferred_extensions: Vec<String>,
    pub require_discrete: bool,
    /// Accepted but not yet used to rank devices.
    pub prefer_discrete: bool,
}

/// A physical device chosen by [`PhysicalDeviceBuilder::build`].
///
/// The handle stays valid for as long as the source it was enumerated from, which the `'a`
/// lifetime tracks.
#[derive(Clone, Debug)]
pub struct SelectedDevice<'a, H> {
    handle: H,
    properties: DeviceProperties,
    queue_families: QueueFamilyIndices,
    _source: PhantomData<&'a ()>,
}

impl<H: Copy> SelectedDevice<'_, H> {
    pub fn handle(&self) -> H {
        self.handle
    }

    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }
}

/// Chooses a physical device from a borrowed [`DeviceSource`].
///
/// ```ignore
/// let device = PhysicalDeviceBuilder::new(&instance)
///     .require_extension("VK_KHR_swapchain")
///     .prefer_discrete()
///     .build()?;
/// ```
pub struct PhysicalDeviceBuilder<'a, S: DeviceSource> {
    source: &'a S,
    criteria: SelectionCriteria,
}

impl<'a, S: DeviceSource> PhysicalDeviceBuilder<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            criteria: SelectionCriteria::default(),
        }
    }

    #[cfg(test)]
    fn criteria(&self) -> &SelectionCriteria {
        &self.criteria
    }

    pub fn require_extension(mut self, name: impl Into<String>) -> Self {
        self.criteria.required_extensions.push(name.into());
        self
    }

    pub fn require_extensions<I>(mut self, names: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.criteria
            .required_extensions
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn prefer_extension(mut self, name: impl Into<String>) -> Self {
        self.criteria.preferred_extensions.push(name.into());
        self
    }

    pub fn prefer_extensions<I>(mut self, names: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.criteria
            .preferred_extensions
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Only discrete GPUs qualify. While set, required extensions are not checked.
    pub fn require_discrete(mut self) -> Self {
        self.criteria.require_discrete = true;
        self
    }

    pub fn prefer_discrete(mut self) -> Self {
        self.criteria.prefer_discrete = true;
        self
    }

    /// Enumerates the source's devices and returns the first suitable one.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::NoDevicesFound`]
    /// - [`DeviceError::NoSuitableDeviceFound`]
    /// - [`DeviceError::Vulkan`] if enumerating devices or their extensions fails.
    pub fn build(self) -> Result<SelectedDevice<'a, S::Handle>, DeviceError> {
        let criteria = &self.criteria;
        if criteria.prefer_discrete || !criteria.preferred_extensions.is_empty() {
            debug!(
                "Preferences are recorded but not ranked (discrete: {}, extensions: {:?})",
                criteria.prefer_discrete, criteria.preferred_extensions
            );
        }

        let devices = self.source.physical_devices()?;
        if devices.is_empty() {
            return Err(DeviceError::NoDevicesFound);
        }

        info!("Devices found:");
        for &device in &devices {
            let properties = self.source.properties(device);
            info!(
                "{} {} {:?}",
                properties.id, properties.name, properties.device_type
            );
        }

        for device in devices {
            let properties = self.source.properties(device);
            if self.is_suitable(device, &properties)? {
                info!(
                    "Selected device: {} {} {:?}",
                    properties.id, properties.name, properties.device_type
                );

                let queue_families =
                    QueueFamilyIndices::from_flags(&self.source.queue_families(device));
                debug!("Queue families for {}: {queue_families:?}", properties.name);

                return Ok(SelectedDevice {
                    handle: device,
                    properties,
                    queue_families,
                    _source: PhantomData,
                });
            }
        }

        Err(DeviceError::NoSuitableDeviceFound)
    }

    fn is_suitable(
        &self,
        device: S::Handle,
        properties: &DeviceProperties,
    ) -> Result<bool, DeviceError> {
        // A discrete requirement decides on its own; required extensions are skipped here. This
        // lets a discrete GPU without a required extension through and is kept as-is for now.
        if self.criteria.require_discrete {
            return Ok(properties.is_discrete());
        }

        let supported = self.supported_extensions(device)?;

        let mut all_supported = true;
        for required in &self.criteria.required_extensions {
            let found = supported.contains(required.as_str());
            info!(
                "- {required} ({})",
                if found { "Supported" } else { "NOT supported" }
            );
            if !found {
                all_supported = false;
                break;
            }
        }

        Ok(all_supported)
    }

    fn supported_extensions(&self, device: S::Handle) -> Result<HashSet<String>, DeviceError> {
        Ok(self.source.extensions(device)?.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, sync::Mutex};

    use log::{Level, LevelFilter, Log, Metadata, Record};

    use super::*;

    static RECORDS: Mutex<Vec<(Level, String)>> = Mutex::new(Vec::new());

    struct CaptureLogger;

    impl Log for CaptureLogger {
        fn enabled(&self, _: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            RECORDS
                .lock()
                .unwrap()
                .push((record.level(), record.args().to_string()));
        }

        fn flush(&self) {}
    }

    static LOGGER: CaptureLogger = CaptureLogger;

    /// Levels of every captured record whose message equals `message`.
    fn levels_of(message: &str) -> Vec<Level> {
        RECORDS
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, text)| text == message)
            .map(|(level, _)| *level)
            .collect()
    }

    struct FakeDevice {
        id: u32,
        name: &'static str,
        device_type: vk::PhysicalDeviceType,
        extensions: &'static [&'static str],
        queue_families: Vec<vk::QueueFlags>,
    }

    /// Devices are addressed by their index in `devices`.
    #[derive(Default)]
    struct FakeSource {
        devices: Vec<FakeDevice>,
        enumerate_error: Option<vk::ErrorCode>,
        extension_queries: RefCell<Vec<usize>>,
    }

    impl FakeSource {
        fn new(devices: Vec<FakeDevice>) -> Self {
            Self {
                devices,
                ..Default::default()
            }
        }
    }

    impl DeviceSource for FakeSource {
        type Handle = usize;

        fn physical_devices(&self) -> Result<Vec<usize>, DeviceError> {
            match self.enumerate_error {
                Some(code) => Err(code.into()),
                None => Ok((0..self.devices.len()).collect()),
            }
        }

        fn properties(&self, device: usize) -> DeviceProperties {
            let device = &self.devices[device];
            DeviceProperties {
                id: device.id,
                name: device.name.to_owned(),
                device_type: device.device_type,
            }
        }

        fn extensions(&self, device: usize) -> Result<Vec<String>, DeviceError> {
            self.extension_queries.borrow_mut().push(device);
            Ok(self.devices[device]
                .extensions
                .iter()
                .map(|e| e.to_string())
                .collect())
        }

        fn queue_families(&self, device: usize) -> Vec<vk::QueueFlags> {
            self.devices[device].queue_families.clone()
        }
    }

    fn igpu_then_dgpu() -> FakeSource {
        FakeSource::new(vec![
            FakeDevice {
                id: 1,
                name: "IGPU",
                device_type: vk::PhysicalDeviceType::INTEGRATED_GPU,
                extensions: &["A"],
                queue_families: vec![
                    vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
                ],
            },
            FakeDevice {
                id: 2,
                name: "DGPU",
                device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
                extensions: &["A", "B"],
                queue_families: Vec::new(),
            },
        ])
    }

    fn selected_id(source: &FakeSource, builder: PhysicalDeviceBuilder<'_, FakeSource>) -> u32 {
        let device = builder.build().unwrap();
        assert_eq!(source.properties(device.handle()).id, device.properties().id);
        device.properties().id
    }

    #[test]
    fn no_criteria_selects_first_device() {
        let source = igpu_then_dgpu();

        assert_eq!(selected_id(&source, PhysicalDeviceBuilder::new(&source)), 1);
    }

    #[test]
    fn required_extension_skips_devices_without_it() {
        let source = igpu_then_dgpu();
        let builder = PhysicalDeviceBuilder::new(&source).require_extension("B");

        assert_eq!(selected_id(&source, builder), 2);
    }

    #[test]
    fn require_discrete_selects_first_discrete() {
        let source = igpu_then_dgpu();
        let builder = PhysicalDeviceBuilder::new(&source)
            .require_extension("B")
            .require_discrete();

        assert_eq!(selected_id(&source, builder), 2);
    }

    #[test]
    fn require_discrete_ignores_required_extensions() {
        let source = igpu_then_dgpu();
        let builder = PhysicalDeviceBuilder::new(&source)
            .require_extension("MISSING")
            .require_discrete();

        assert_eq!(selected_id(&source, builder), 2);
        assert!(source.extension_queries.borrow().is_empty());
    }

    #[test]
    fn require_discrete_without_discrete_device_fails() {
        let source = FakeSource::new(vec![FakeDevice {
            id: 7,
            name: "CPU",
            device_type: vk::PhysicalDeviceType::CPU,
            extensions: &[],
            queue_families: Vec::new(),
        }]);

        let result = PhysicalDeviceBuilder::new(&source).require_discrete().build();

        assert_eq!(result.unwrap_err(), DeviceError::NoSuitableDeviceFound);
    }

    #[test]
    fn missing_required_extension_fails() {
        let source = igpu_then_dgpu();

        let result = PhysicalDeviceBuilder::new(&source)
            .require_extensions(["A", "C"])
            .build();

        assert_eq!(result.unwrap_err(), DeviceError::NoSuitableDeviceFound);
    }

    #[test]
    fn extension_names_are_case_sensitive() {
        let source = igpu_then_dgpu();

        let result = PhysicalDeviceBuilder::new(&source)
            .require_extension("b")
            .build();

        assert_eq!(result.unwrap_err(), DeviceError::NoSuitableDeviceFound);
    }

    #[test]
    fn duplicate_required_extension_matches_like_single() {
        let source = igpu_then_dgpu();
        let builder = PhysicalDeviceBuilder::new(&source)
            .require_extension("A")
            .require_extension("A");

        assert_eq!(
            builder.criteria().required_extensions,
            ["A".to_owned(), "A".to_owned()]
        );
        assert_eq!(selected_id(&source, builder), 1);
    }

    #[test]
    fn no_devices_fails_regardless_of_criteria() {
        let source = FakeSource::new(Vec::new());

        let plain = PhysicalDeviceBuilder::new(&source).build();
        let strict = PhysicalDeviceBuilder::new(&source)
            .require_discrete()
            .require_extension("A")
            .build();

        assert_eq!(plain.unwrap_err(), DeviceError::NoDevicesFound);
        assert_eq!(strict.unwrap_err(), DeviceError::NoDevicesFound);
    }

    #[test]
    fn stops_at_first_suitable_device() {
        let source = igpu_then_dgpu();

        PhysicalDeviceBuilder::new(&source)
            .require_extension("A")
            .build()
            .unwrap();

        assert_eq!(*source.extension_queries.borrow(), [0]);
    }

    #[test]
    fn preferences_do_not_change_selection() {
        let source = igpu_then_dgpu();
        let builder = PhysicalDeviceBuilder::new(&source)
            .prefer_discrete()
            .prefer_extension("B")
            .prefer_extensions(vec![String::from("C")]);

        assert_eq!(builder.criteria().preferred_extensions, ["B", "C"]);
        assert!(builder.criteria().prefer_discrete);
        assert_eq!(selected_id(&source, builder), 1);
    }

    #[test]
    fn require_extensions_preserves_order() {
        let source = igpu_then_dgpu();
        let builder = PhysicalDeviceBuilder::new(&source)
            .require_extension("B")
            .require_extensions(["A", "B"]);

        assert_eq!(builder.criteria().required_extensions, ["B", "A", "B"]);
    }

    #[test]
    fn enumeration_error_propagates() {
        let source = FakeSource {
            enumerate_error: Some(vk::ErrorCode::INITIALIZATION_FAILED),
            ..igpu_then_dgpu()
        };

        let result = PhysicalDeviceBuilder::new(&source).build();

        assert_eq!(
            result.unwrap_err(),
            DeviceError::Vulkan(vk::ErrorCode::INITIALIZATION_FAILED)
        );
    }

    #[test]
    fn resolves_queue_families_of_selected_device() {
        let source = igpu_then_dgpu();

        let device = PhysicalDeviceBuilder::new(&source).build().unwrap();

        assert!(device.queue_families().is_complete());
        assert_eq!(device.queue_families().graphics, Some(0));
    }

    #[test]
    fn extension_support_is_reported_at_info() {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(LevelFilter::Trace);

        let source = FakeSource::new(vec![FakeDevice {
            id: 3,
            name: "REPORTED",
            device_type: vk::PhysicalDeviceType::VIRTUAL_GPU,
            extensions: &["VK_TEST_reported"],
            queue_families: Vec::new(),
        }]);

        PhysicalDeviceBuilder::new(&source)
            .require_extension("VK_TEST_reported")
            .build()
            .unwrap();
        let result = PhysicalDeviceBuilder::new(&source)
            .require_extension("VK_TEST_unreported")
            .build();

        assert_eq!(result.unwrap_err(), DeviceError::NoSuitableDeviceFound);
        assert_eq!(levels_of("- VK_TEST_reported (Supported)"), [Level::Info]);
        assert_eq!(
            levels_of("- VK_TEST_unreported (NOT supported)"),
            [Level::Info]
        );
    }
}
