//! Core module: Lock-Free SPSC Ring Buffer dan Fan-In Registry
//!
//! Prinsip desain:
//! - Lock-Free: Hanya atomic operations, tidak ada Mutex/RwLock
//! - No-Allocation: Semua buffer pre-allocated saat create/set_capacity
//! - Role separation: Producer/Consumer handle, bukan konvensi di dokumentasi

mod registry;
mod ring_buffer;
mod stamped;

pub use registry::{BufferRegistry, RegistryConsumer, RegistryProducer};
pub use ring_buffer::{Consumer, Producer, RingBuffer, View};
pub use stamped::Stamped;
