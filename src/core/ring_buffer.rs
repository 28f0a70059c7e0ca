//! Lock-Free Single-Producer Single-Consumer (SPSC) Ring Buffer
//!
//! Satu-satunya state yang dibagi antara producer dan consumer adalah `size`.
//! Producer hanya menambah `size`, consumer hanya mengurangi.
//! Cursor tulis milik producer, cursor baca milik consumer, jadi keduanya
//! tidak butuh sinkronisasi. Tidak ada Mutex, tidak ada alokasi di hot path.
//!
//! Peran dipisah lewat handle: [`Producer`] hanya bisa `put`, [`Consumer`]
//! hanya bisa membaca. Operasi administrasi (`clear`, `set_capacity`) butuh
//! `&mut RingBuffer`, jadi tidak bisa dipanggil selama ada handle yang hidup.

use std::cell::{Cell, UnsafeCell};
use std::fmt;
use std::marker::PhantomData;
use std::mem::{self, MaybeUninit};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::DEFAULT_CAPACITY;
use crate::error::{BufferId, Error, Overflow, Result};

/// Slot dalam ring buffer
struct Slot<T> {
    data: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    const fn new() -> Self {
        Self {
            data: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

/// Padding untuk cache line isolation (64 bytes pada x86-64)
#[repr(C, align(64))]
struct CacheLinePadded<T> {
    value: T,
}

impl<T> CacheLinePadded<T> {
    const fn new(value: T) -> Self {
        Self { value }
    }
}

/// State milik consumer
#[derive(Debug, Default, Clone, Copy)]
struct ReadState {
    index: usize,
    snapshot: usize,
}

/// Cara consumer membaca `size`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    /// Atomic load dari `size`. `Consumer::size` juga me-refresh snapshot.
    #[default]
    Live,
    /// Nilai cache dari refresh `Live` terakhir
    Snapshot,
}

/// Lock-Free SPSC Ring Buffer
///
/// `size`, cursor tulis, dan state baca ada di cache line terpisah
/// untuk menghindari false sharing antara producer dan consumer.
#[repr(C)]
pub struct RingBuffer<T> {
    // Shared: producer fetch_add (Release), consumer fetch_sub (Release)
    size: CacheLinePadded<AtomicUsize>,
    // Producer side
    write_index: CacheLinePadded<UnsafeCell<usize>>,
    // Consumer side
    read: CacheLinePadded<UnsafeCell<ReadState>>,
    slots: Box<[Slot<T>]>,
    id: BufferId,
}

// SAFETY: RingBuffer aman untuk Send/Sync karena:
// - Hanya satu Producer (menulis write_index dan slot kosong)
// - Hanya satu Consumer (menulis ReadState dan membaca slot terisi)
// - `size` dengan Release/Acquire menjamin visibility isi slot
// - Lewat `&RingBuffer` saja tidak ada akses ke isi slot
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    /// Membuat ring buffer baru dengan kapasitas tetap.
    ///
    /// Alokasi hanya terjadi sekali saat inisialisasi. Kapasitas 0 valid:
    /// buffer seperti itu selalu penuh.
    pub fn new(id: BufferId, capacity: usize) -> Result<Self> {
        Ok(Self {
            size: CacheLinePadded::new(AtomicUsize::new(0)),
            write_index: CacheLinePadded::new(UnsafeCell::new(0)),
            read: CacheLinePadded::new(UnsafeCell::new(ReadState::default())),
            slots: Self::allocate(capacity)?,
            id,
        })
    }

    /// Ring buffer dengan kapasitas default (2)
    pub fn with_default_capacity(id: BufferId) -> Self {
        Self {
            size: CacheLinePadded::new(AtomicUsize::new(0)),
            write_index: CacheLinePadded::new(UnsafeCell::new(0)),
            read: CacheLinePadded::new(UnsafeCell::new(ReadState::default())),
            slots: (0..DEFAULT_CAPACITY).map(|_| Slot::new()).collect(),
            id,
        }
    }

    fn allocate(capacity: usize) -> Result<Box<[Slot<T>]>> {
        let slot_size = mem::size_of::<Slot<T>>().max(1);
        let max = isize::MAX as usize / slot_size;
        if capacity > max {
            return Err(Error::Capacity {
                requested: capacity,
                max,
            });
        }
        Ok((0..capacity).map(|_| Slot::new()).collect())
    }

    #[inline(always)]
    pub fn id(&self) -> BufferId {
        self.id
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Jumlah item belum dibaca (live)
    #[inline]
    pub fn len(&self) -> usize {
        self.size.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pecah buffer menjadi handle producer dan consumer.
    ///
    /// Borrow `&mut self` menjamin hanya ada satu pasang handle.
    pub fn split(&mut self) -> (Producer<'_, T>, Consumer<'_, T>) {
        let ring: &Self = self;
        (Producer::new(ring), Consumer::new(ring))
    }

    /// Handle producer saja (misal untuk pemakaian satu thread)
    pub fn producer(&mut self) -> Producer<'_, T> {
        Producer::new(self)
    }

    /// Handle consumer saja
    pub fn consumer(&mut self) -> Consumer<'_, T> {
        Consumer::new(self)
    }

    /// Reset total: size, snapshot, kedua cursor. Item yang belum dibaca di-drop.
    pub fn clear(&mut self) {
        self.drop_unread();
        *self.size.value.get_mut() = 0;
        *self.write_index.value.get_mut() = 0;
        *self.read.value.get_mut() = ReadState::default();
    }

    /// Alokasi ulang storage. Item yang belum dibaca di-drop, cursor di-reset.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        let slots = Self::allocate(capacity)?;
        self.clear();
        self.slots = slots;
        Ok(())
    }

    fn drop_unread(&mut self) {
        let size = *self.size.value.get_mut();
        let capacity = self.slots.len();
        let mut index = self.read.value.get_mut().index;
        for _ in 0..size {
            // SAFETY: `size` slot mulai dari cursor baca sudah ditulis producer
            unsafe { self.slots[index].data.get_mut().assume_init_drop() };
            index = wrap_next(index, capacity);
        }
    }
}

impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        self.drop_unread();
    }
}

impl<T> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("id", &self.id)
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

#[inline(always)]
fn wrap_next(index: usize, capacity: usize) -> usize {
    if index + 1 >= capacity {
        0
    } else {
        index + 1
    }
}

/// Write side. Hanya satu per buffer.
pub struct Producer<'a, T> {
    ring: &'a RingBuffer<T>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<'a, T> Producer<'a, T> {
    fn new(ring: &'a RingBuffer<T>) -> Self {
        Self {
            ring,
            _not_sync: PhantomData,
        }
    }

    /// Push item ke buffer.
    ///
    /// Jika penuh, item dikembalikan dalam `Overflow` dan tidak ada state
    /// yang berubah. Zero-allocation, lock-free, tidak pernah retry.
    #[inline(always)]
    pub fn put(&mut self, item: T) -> std::result::Result<(), Overflow<T>> {
        let ring = self.ring;
        let capacity = ring.slots.len();

        // Acquire: consumer sudah selesai membaca slot yang akan ditimpa
        if ring.size.value.load(Ordering::Acquire) >= capacity {
            return Err(Overflow(item));
        }

        // SAFETY: write_index hanya disentuh producer, dan handle ini unik
        let write = unsafe { &mut *ring.write_index.value.get() };

        // SAFETY: slot di cursor tulis tidak terhitung di `size`,
        // jadi consumer tidak sedang membacanya
        unsafe {
            (*ring.slots[*write].data.get()).write(item);
        }
        *write = wrap_next(*write, capacity);

        // Release: isi slot visible sebelum size bertambah
        let prev = ring.size.value.fetch_add(1, Ordering::Release);
        debug_assert!(prev < capacity, "producer grew size past capacity");

        Ok(())
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.ring.size.value.load(Ordering::Acquire) >= self.ring.capacity()
    }

    pub fn id(&self) -> BufferId {
        self.ring.id
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

impl<T> fmt::Debug for Producer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer").field("id", &self.ring.id).finish()
    }
}

/// Read side. Hanya satu per buffer.
pub struct Consumer<'a, T> {
    ring: &'a RingBuffer<T>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<'a, T> Consumer<'a, T> {
    fn new(ring: &'a RingBuffer<T>) -> Self {
        Self {
            ring,
            _not_sync: PhantomData,
        }
    }

    #[inline(always)]
    fn state(&self) -> &ReadState {
        // SAFETY: ReadState hanya disentuh consumer, dan handle ini unik
        unsafe { &*self.ring.read.value.get() }
    }

    #[inline(always)]
    fn state_mut(&mut self) -> &mut ReadState {
        // SAFETY: sama seperti `state`, ditambah `&mut self`
        unsafe { &mut *self.ring.read.value.get() }
    }

    /// Pop item dari buffer.
    ///
    /// `Err(Empty)` jika kosong. Nilai "nol" yang sah tidak pernah
    /// tertukar dengan buffer kosong.
    #[inline(always)]
    pub fn get(&mut self) -> Result<T> {
        let ring = self.ring;

        // Acquire: isi slot yang dihitung `size` sudah visible
        if ring.size.value.load(Ordering::Acquire) == 0 {
            return Err(Error::Empty);
        }

        let capacity = ring.slots.len();
        let state = self.state_mut();

        // SAFETY: slot di cursor baca sudah ditulis dan tidak sedang ditulis
        let item = unsafe { (*ring.slots[state.index].data.get()).assume_init_read() };
        state.index = wrap_next(state.index, capacity);
        state.snapshot = state.snapshot.saturating_sub(1);

        // Release: read di atas selesai sebelum slot boleh ditimpa producer
        let prev = ring.size.value.fetch_sub(1, Ordering::Release);
        debug_assert!(prev > 0, "consumer shrank size below zero");

        Ok(item)
    }

    /// Referensi ke item `n` posisi di depan cursor baca. Tidak mengubah state.
    #[inline]
    pub fn peek(&self, n: usize) -> Result<&T> {
        let size = self.ring.size.value.load(Ordering::Acquire);
        if size == 0 {
            return Err(Error::Empty);
        }
        if n >= size {
            return Err(Error::OutOfRange { offset: n, size });
        }

        // n < size <= capacity, jadi satu kali wrap cukup
        let capacity = self.ring.slots.len();
        let mut index = self.state().index + n;
        if index >= capacity {
            index -= capacity;
        }

        // SAFETY: slot terhitung di `size`, producer tidak akan menimpanya
        // selama borrow `&self` ini hidup (get/remove butuh `&mut self`)
        Ok(unsafe { (*self.ring.slots[index].data.get()).assume_init_ref() })
    }

    /// Seperti `get`, tapi nilainya dibuang
    #[inline]
    pub fn remove(&mut self) -> Result<()> {
        self.get().map(drop)
    }

    /// Jumlah item. `View::Live` sekaligus menyimpan snapshot untuk
    /// scan multi-langkah berikutnya; `View::Snapshot` tidak menyentuh live state.
    #[inline]
    pub fn size(&mut self, view: View) -> usize {
        match view {
            View::Snapshot => self.state().snapshot,
            View::Live => {
                let size = self.ring.size.value.load(Ordering::Acquire);
                self.state_mut().snapshot = size;
                size
            }
        }
    }

    /// Jumlah item menurut view, tanpa refresh snapshot
    #[inline]
    pub fn available(&self, view: View) -> usize {
        match view {
            View::Snapshot => self.state().snapshot,
            View::Live => self.ring.size.value.load(Ordering::Acquire),
        }
    }

    #[inline]
    pub fn is_empty(&self, view: View) -> bool {
        self.available(view) == 0
    }

    /// Buang semua item yang belum dibaca dari sisi consumer.
    ///
    /// Tidak ada versi producer: producer hanya boleh menambah `size`,
    /// consumer hanya boleh mengurangi. Item yang di-publish bersamaan
    /// dengan panggilan ini tetap ada.
    pub fn clear_read(&mut self) {
        let ring = self.ring;
        let size = ring.size.value.load(Ordering::Acquire);
        let capacity = ring.slots.len();
        let state = self.state_mut();

        for _ in 0..size {
            // SAFETY: `size` slot mulai dari cursor baca sudah terisi
            unsafe { (*ring.slots[state.index].data.get()).assume_init_drop() };
            state.index = wrap_next(state.index, capacity);
        }
        state.snapshot = 0;

        if size > 0 {
            let prev = ring.size.value.fetch_sub(size, Ordering::Release);
            debug_assert!(prev >= size, "consumer shrank size below zero");
        }
    }

    pub fn id(&self) -> BufferId {
        self.ring.id
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

impl<T> fmt::Debug for Consumer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("id", &self.ring.id)
            .field("snapshot", &self.state().snapshot)
            .finish()
    }
}
