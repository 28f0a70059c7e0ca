//! Error types untuk ring buffer dan registry
//!
//! Semua error bersifat sinkron dan lokal. Tidak ada operasi yang gagal
//! meninggalkan state dalam kondisi rusak: setiap kegagalan adalah no-op.

use std::fmt;

use thiserror::Error;

/// Identitas buffer di dalam registry
pub type BufferId = i32;

/// Error non-generic untuk operasi consumer dan administrasi
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// Tidak ada item untuk get/peek/remove
    #[error("buffer is empty")]
    Empty,
    /// Offset peek melewati jumlah item yang tersedia
    #[error("peek offset {offset} out of range (size {size})")]
    OutOfRange { offset: usize, size: usize },
    /// Operasi registry pada id yang tidak terdaftar
    #[error("no buffer registered with id {0}")]
    InvalidId(BufferId),
    /// create_buffer dengan id yang sudah ada
    #[error("buffer id {0} is already registered")]
    DuplicateId(BufferId),
    /// Kapasitas melebihi batas yang diizinkan
    #[error("capacity {requested} exceeds maximum {max}")]
    Capacity { requested: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Buffer penuh saat `put`.
///
/// Item dikembalikan ke caller supaya realtime thread tidak perlu
/// men-drop (dan mungkin dealokasi) di hot path.
#[derive(Clone, Copy, PartialEq, Eq, Error)]
#[error("buffer full, item rejected")]
pub struct Overflow<T>(pub T);

impl<T> Overflow<T> {
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

// Debug manual: tidak butuh T: Debug (sama seperti std::sync::mpsc::SendError)
impl<T> fmt::Debug for Overflow<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overflow").finish_non_exhaustive()
    }
}

/// Error `put` via registry
#[derive(Clone, Copy, PartialEq, Eq, Error)]
pub enum PutError<T> {
    /// Buffer tujuan penuh, item tidak ditulis
    #[error("buffer full, item rejected")]
    Overflow(T),
    /// Id tidak terdaftar
    #[error("no buffer registered with id {id}")]
    InvalidId { id: BufferId, item: T },
}

impl<T> PutError<T> {
    /// Ambil kembali item yang ditolak
    #[inline]
    pub fn into_inner(self) -> T {
        match self {
            Self::Overflow(item) => item,
            Self::InvalidId { item, .. } => item,
        }
    }

    #[inline]
    pub fn is_overflow(&self) -> bool {
        matches!(self, Self::Overflow(_))
    }
}

impl<T> From<Overflow<T>> for PutError<T> {
    fn from(err: Overflow<T>) -> Self {
        Self::Overflow(err.0)
    }
}

impl<T> fmt::Debug for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow(_) => f.debug_tuple("Overflow").finish_non_exhaustive(),
            Self::InvalidId { id, .. } => f
                .debug_struct("InvalidId")
                .field("id", id)
                .finish_non_exhaustive(),
        }
    }
}
