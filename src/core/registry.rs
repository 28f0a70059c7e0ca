//! Fan-In Registry: banyak ring buffer, satu stream terurut
//!
//! Setiap sumber realtime punya buffer sendiri (keyed by id). Consumer
//! menggabungkan semuanya dengan selalu mengambil head terkecil di antara
//! buffer yang tidak kosong.
//!
//! Tie-break: buffer di-scan dengan id naik, dan kandidat hanya menggantikan
//! pilihan saat ini jika *strictly* lebih kecil. Head yang sama besar
//! selalu diambil dari id terkecil.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::ring_buffer::{Consumer, Producer, RingBuffer, View};
use crate::config::RegistryConfig;
use crate::error::{BufferId, Error, PutError, Result};

/// Pemilik semua buffer. Operasi administrasi butuh `&mut self`,
/// jadi hanya bisa jalan saat tidak ada handle producer/consumer yang hidup.
pub struct BufferRegistry<T> {
    buffers: BTreeMap<BufferId, RingBuffer<T>>,
    config: RegistryConfig,
}

impl<T> Default for BufferRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BufferRegistry<T> {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            buffers: BTreeMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Membuat dan mendaftarkan buffer baru.
    ///
    /// Gagal dengan `DuplicateId` jika id sudah ada; buffer lama tidak disentuh.
    pub fn create_buffer(&mut self, id: BufferId, capacity: usize) -> Result<&mut RingBuffer<T>> {
        let max = self.config.max_capacity;
        let slot = match self.buffers.entry(id) {
            Entry::Occupied(_) => {
                warn!("buffer {} already registered, create rejected", id);
                return Err(Error::DuplicateId(id));
            }
            Entry::Vacant(slot) => slot,
        };

        if capacity > max {
            warn!("buffer {}: capacity {} exceeds max {}", id, capacity, max);
            return Err(Error::Capacity {
                requested: capacity,
                max,
            });
        }

        let ring = RingBuffer::new(id, capacity)?;
        debug!("created buffer {} (capacity {})", id, capacity);
        Ok(slot.insert(ring))
    }

    /// `create_buffer` dengan `config.default_capacity`
    pub fn create_default_buffer(&mut self, id: BufferId) -> Result<&mut RingBuffer<T>> {
        self.create_buffer(id, self.config.default_capacity)
    }

    /// Hapus buffer. Item yang belum dibaca ikut di-drop.
    pub fn delete_buffer(&mut self, id: BufferId) -> Result<()> {
        match self.buffers.remove(&id) {
            Some(ring) => {
                debug!("deleted buffer {} ({} unread items dropped)", id, ring.len());
                Ok(())
            }
            None => {
                warn!("delete: no buffer {}", id);
                Err(Error::InvalidId(id))
            }
        }
    }

    pub fn find_buffer(&self, id: BufferId) -> Option<&RingBuffer<T>> {
        self.buffers.get(&id)
    }

    pub fn find_buffer_mut(&mut self, id: BufferId) -> Option<&mut RingBuffer<T>> {
        self.buffers.get_mut(&id)
    }

    pub fn set_capacity(&mut self, id: BufferId, capacity: usize) -> Result<()> {
        let max = self.config.max_capacity;
        let Some(ring) = self.buffers.get_mut(&id) else {
            warn!("set_capacity: no buffer {}", id);
            return Err(Error::InvalidId(id));
        };
        if capacity > max {
            warn!("buffer {}: capacity {} exceeds max {}", id, capacity, max);
            return Err(Error::Capacity {
                requested: capacity,
                max,
            });
        }
        ring.set_capacity(capacity)?;
        debug!("buffer {} capacity set to {}", id, capacity);
        Ok(())
    }

    /// Reset semua buffer (size, snapshot, cursor)
    pub fn clear(&mut self) {
        for ring in self.buffers.values_mut() {
            ring.clear();
        }
        debug!("cleared {} buffers", self.buffers.len());
    }

    /// Jumlah buffer terdaftar
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Id terdaftar, urut naik
    pub fn ids(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.buffers.keys().copied()
    }

    /// Pecah menjadi satu producer (semua buffer) dan satu consumer.
    pub fn split(&mut self) -> (RegistryProducer<'_, T>, RegistryConsumer<'_, T>) {
        let (producers, consumers) = self.split_producers();
        (RegistryProducer { producers }, consumers)
    }

    /// Satu `Producer` per buffer (urut id naik), supaya setiap sumber
    /// realtime bisa memegang buffer-nya sendiri di thread terpisah.
    pub fn split_producers(&mut self) -> (Vec<Producer<'_, T>>, RegistryConsumer<'_, T>) {
        let (producers, consumers): (Vec<_>, Vec<_>) =
            self.buffers.values_mut().map(RingBuffer::split).unzip();
        (producers, RegistryConsumer { consumers })
    }

    pub fn producer(&mut self) -> RegistryProducer<'_, T> {
        RegistryProducer {
            producers: self.buffers.values_mut().map(RingBuffer::producer).collect(),
        }
    }

    pub fn consumer(&mut self) -> RegistryConsumer<'_, T> {
        RegistryConsumer {
            consumers: self.buffers.values_mut().map(RingBuffer::consumer).collect(),
        }
    }
}

impl<T> std::fmt::Debug for BufferRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferRegistry")
            .field("buffers", &self.buffers.values().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

/// Write side registry: `put` by id
pub struct RegistryProducer<'a, T> {
    // Urut id naik (dari BTreeMap)
    producers: Vec<Producer<'a, T>>,
}

impl<'a, T> RegistryProducer<'a, T> {
    /// Push item ke buffer `id`.
    ///
    /// Overflow diteruskan apa adanya, tidak pernah di-retry.
    #[inline]
    pub fn put(&mut self, id: BufferId, item: T) -> std::result::Result<(), PutError<T>> {
        match self.producers.binary_search_by_key(&id, |p| p.id()) {
            Ok(index) => self.producers[index].put(item).map_err(PutError::from),
            Err(_) => Err(PutError::InvalidId { id, item }),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.producers.iter().map(|p| p.id())
    }
}

/// Read side registry: merge semua buffer menjadi satu stream terurut
pub struct RegistryConsumer<'a, T> {
    // Urut id naik (dari BTreeMap), ini yang menentukan tie-break
    consumers: Vec<Consumer<'a, T>>,
}

impl<'a, T> RegistryConsumer<'a, T> {
    /// Total item di semua buffer. `View::Live` me-refresh snapshot
    /// setiap buffer. Best-effort: tidak atomic lintas buffer.
    pub fn size(&mut self, view: View) -> usize {
        self.consumers.iter_mut().map(|c| c.size(view)).sum()
    }

    pub fn is_empty(&self, view: View) -> bool {
        self.consumers.iter().all(|c| c.is_empty(view))
    }

    /// Buang semua item yang belum dibaca di setiap buffer
    pub fn clear_read(&mut self) {
        for consumer in &mut self.consumers {
            consumer.clear_read();
        }
    }

    /// Consumer satu buffer
    pub fn buffer_mut(&mut self, id: BufferId) -> Option<&mut Consumer<'a, T>> {
        let index = self.consumers.binary_search_by_key(&id, |c| c.id()).ok()?;
        Some(&mut self.consumers[index])
    }

    pub fn ids(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.consumers.iter().map(|c| c.id())
    }
}

impl<'a, T: PartialOrd> RegistryConsumer<'a, T> {
    /// Index buffer dengan head terkecil (id terkecil jika seri)
    fn least(&self, view: View) -> Option<usize> {
        let mut least: Option<(usize, &T)> = None;
        for (index, consumer) in self.consumers.iter().enumerate() {
            if consumer.is_empty(view) {
                continue;
            }
            let Ok(head) = consumer.peek(0) else {
                continue;
            };
            pick_least(&mut least, index, head);
        }
        least.map(|(index, _)| index)
    }

    /// Ambil head terkecil dari semua buffer
    pub fn get(&mut self, view: View) -> Result<T> {
        let index = self.least(view).ok_or(Error::Empty)?;
        self.consumers[index].get()
    }

    /// Seperti `get`, tapi nilainya dibuang
    pub fn remove(&mut self, view: View) -> Result<()> {
        let index = self.least(view).ok_or(Error::Empty)?;
        self.consumers[index].remove()
    }

    /// Item yang akan dikembalikan oleh `get` ke-(n+1), tanpa mengubah buffer.
    ///
    /// Seleksi terkecil diulang n+1 kali sambil menghitung berapa item
    /// setiap buffer yang sudah "dikonsumsi secara virtual". O(n x B).
    pub fn peek(&self, view: View, n: usize) -> Result<&T> {
        let mut taken = vec![0usize; self.consumers.len()];

        for step in 0..=n {
            let mut least: Option<(usize, &T)> = None;
            for (index, consumer) in self.consumers.iter().enumerate() {
                if taken[index] >= consumer.available(view) {
                    continue;
                }
                let Ok(head) = consumer.peek(taken[index]) else {
                    continue;
                };
                pick_least(&mut least, index, head);
            }

            let (index, head) = least.ok_or(Error::Empty)?;
            if step == n {
                return Ok(head);
            }
            taken[index] += 1;
        }

        Err(Error::Empty)
    }
}

/// Kandidat hanya menang jika strictly lebih kecil
#[inline]
fn pick_least<'t, T: PartialOrd>(least: &mut Option<(usize, &'t T)>, index: usize, head: &'t T) {
    let replace = match *least {
        None => true,
        Some((_, best)) => head < best,
    };
    if replace {
        *least = Some((index, head));
    }
}
