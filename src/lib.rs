//! Kurir - Lock-Free SPSC Ring Buffer dengan Fan-In Registry
//!
//! Arsitektur:
//! - Lock-Free: satu atomic counter per buffer sebagai titik sinkronisasi
//! - Realtime-safe: `put` tidak pernah block, alokasi, atau retry
//! - Fan-In: banyak buffer digabung menjadi satu stream terurut
//! - Snapshot: consumer bisa membekukan view untuk scan multi-langkah

pub mod config;
pub mod core;
pub mod error;

pub use crate::config::RegistryConfig;
pub use crate::core::{
    BufferRegistry, Consumer, Producer, RegistryConsumer, RegistryProducer, RingBuffer, Stamped,
    View,
};
pub use crate::error::{BufferId, Error, Overflow, PutError, Result};
