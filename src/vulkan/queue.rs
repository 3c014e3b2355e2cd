use vulkanalia::vk;

/// Indices of the first queue family offering each capability on a physical device.
///
/// Device selection does not consult these yet; they are resolved for the chosen device so the
/// logical device can be built from them later.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub compute: Option<u32>,
    pub transfer: Option<u32>,
    pub sparse_binding: Option<u32>,
}

impl QueueFamilyIndices {
    /// Scans queue family flags in order and records the first family per capability.
    pub fn from_flags(families: &[vk::QueueFlags]) -> Self {
        let first = |flag: vk::QueueFlags| {
            families
                .iter()
                .position(|flags| flags.contains(flag))
                .map(|index| index as u32)
        };

        Self {
            graphics: first(vk::QueueFlags::GRAPHICS),
            compute: first(vk::QueueFlags::COMPUTE),
            transfer: first(vk::QueueFlags::TRANSFER),
            sparse_binding: first(vk::QueueFlags::SPARSE_BINDING),
        }
    }

    /// Sparse binding is optional.
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.compute.is_some() && self.transfer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_first_family_per_capability() {
        let families = [
            vk::QueueFlags::TRANSFER,
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            vk::QueueFlags::COMPUTE,
        ];

        let indices = QueueFamilyIndices::from_flags(&families);

        assert_eq!(indices.graphics, Some(1));
        assert_eq!(indices.compute, Some(1));
        assert_eq!(indices.transfer, Some(0));
        assert_eq!(indices.sparse_binding, None);
        assert!(indices.is_complete());
    }

    #[test]
    fn incomplete_without_transfer() {
        let families = [vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE];

        let indices = QueueFamilyIndices::from_flags(&families);

        assert!(!indices.is_complete());
    }

    #[test]
    fn no_families_resolves_nothing() {
        assert_eq!(QueueFamilyIndices::from_flags(&[]), QueueFamilyIndices::default());
    }
}
