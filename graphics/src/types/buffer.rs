//! Buffer types and descriptors.

use bitflags::bitflags;

bitflags! {
    /// Usage flags for device-local buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be bound as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be bound as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer can hold indirect draw arguments.
        const INDIRECT = 1 << 2;
        /// Buffer can be read as storage from graphics stages.
        const GRAPHICS_STORAGE_READ = 1 << 3;
        /// Buffer can be read as storage from compute stages.
        const COMPUTE_STORAGE_READ = 1 << 4;
        /// Buffer can be written as storage from compute stages.
        const COMPUTE_STORAGE_WRITE = 1 << 5;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Descriptor for creating a device-local buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u32,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(size: u32, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Direction of data moved through a transfer buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransferBufferUsage {
    /// Host writes, device reads (uploads).
    #[default]
    Upload,
    /// Device writes, host reads (readbacks).
    Download,
}

/// Descriptor for creating a host-visible staging buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TransferBufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u32,
    /// Transfer direction.
    pub usage: TransferBufferUsage,
}

impl TransferBufferDescriptor {
    /// Describe an upload staging buffer.
    pub fn upload(size: u32) -> Self {
        Self {
            label: None,
            size,
            usage: TransferBufferUsage::Upload,
        }
    }

    /// Describe a readback staging buffer.
    pub fn download(size: u32) -> Self {
        Self {
            label: None,
            size,
            usage: TransferBufferUsage::Download,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Width of the elements in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexElementSize {
    /// 16-bit indices.
    Sixteen,
    /// 32-bit indices.
    #[default]
    ThirtyTwo,
}

impl IndexElementSize {
    /// Size of one index in bytes.
    pub fn bytes(self) -> u32 {
        match self {
            Self::Sixteen => 2,
            Self::ThirtyTwo => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_descriptor_builder() {
        let desc = BufferDescriptor::new(256, BufferUsage::VERTEX | BufferUsage::INDEX)
            .with_label("mesh");
        assert_eq!(desc.size, 256);
        assert!(desc.usage.contains(BufferUsage::INDEX));
        assert_eq!(desc.label.as_deref(), Some("mesh"));
    }

    #[test]
    fn test_transfer_buffer_directions() {
        assert_eq!(
            TransferBufferDescriptor::upload(64).usage,
            TransferBufferUsage::Upload
        );
        assert_eq!(
            TransferBufferDescriptor::download(64).usage,
            TransferBufferUsage::Download
        );
    }

    #[test]
    fn test_index_element_size() {
        assert_eq!(IndexElementSize::Sixteen.bytes(), 2);
        assert_eq!(IndexElementSize::default().bytes(), 4);
    }
}
