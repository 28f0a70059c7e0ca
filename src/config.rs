//! Konfigurasi registry

/// Kapasitas default: mulai sederhana dengan 2, seperti flip buffer
pub const DEFAULT_CAPACITY: usize = 2;

/// Batas atas kapasitas per buffer (1M slot)
pub const MAX_CAPACITY: usize = 1 << 20;

/// Registry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Kapasitas untuk `create_default_buffer`
    pub default_capacity: usize,
    /// Permintaan kapasitas di atas ini ditolak dengan `Error::Capacity`
    pub max_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_capacity: DEFAULT_CAPACITY,
            max_capacity: MAX_CAPACITY,
        }
    }
}

impl RegistryConfig {
    pub fn with_default_capacity(mut self, capacity: usize) -> Self {
        self.default_capacity = capacity;
        self
    }

    pub fn with_max_capacity(mut self, max: usize) -> Self {
        self.max_capacity = max;
        self
    }
}
