//! # Shared State Segment
//!
//! The canonical state published into a named, memory-mapped segment so
//! observer processes can poll it.
//!
//! ## Layout
//!
//! ```text
//! offset 0   u32  lock word        (0 = free, 1 = held)
//! offset 4   u32  generation       (bumped by every locked write)
//! offset 8   PublishedState, 104 bytes
//! ```
//!
//! Writers take the lock word for exactly one read-modify-write and release
//! it through [`SegmentLock`]'s `Drop`. Readers opened with [`SegmentReader`]
//! never take the lock and may observe a snapshot torn across one merge.

// SAFETY: This module requires unsafe to view the header words of a shared
// mapping as atomics. The mapping is page aligned and outlives every view.
#![allow(unsafe_code)]

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use bytemuck::{Pod, Zeroable};
use memmap2::{Mmap, MmapMut};
use parking_lot::Mutex;

use crate::error::{CoreError, CoreResult};
use crate::state::{StateDelta, VehicleState};
use crate::store::StateStore;

/// Offset of the lock word.
pub const LOCK_OFFSET: usize = 0;
/// Offset of the generation counter.
pub const GENERATION_OFFSET: usize = 4;
/// Offset of the published state.
pub const PAYLOAD_OFFSET: usize = 8;
/// Total size of the segment.
pub const SEGMENT_SIZE: usize = PAYLOAD_OFFSET + PublishedState::SIZE;

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;
const SPINS_BEFORE_YIELD: u32 = 64;

/// Fixed-layout image of [`VehicleState`] as stored in the segment.
///
/// Total size: 104 bytes
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct PublishedState {
    /// Throttle position.
    pub throttle: f64,
    /// Brake position.
    pub brake: f64,
    /// Steering position.
    pub steer: f64,
    /// Speed in m/s.
    pub speed: f64,
    /// Heading in radians.
    pub heading: f64,
    /// Position X.
    pub x: f64,
    /// Position Y.
    pub y: f64,
    /// Engine speed.
    pub rpm: f64,
    /// Engine power.
    pub power: f64,
    /// Engine torque.
    pub torque: f64,
    /// Fuel level.
    pub fuel: f64,
    /// Current gear.
    pub gear: i32,
    /// Reverse flag (0/1).
    pub reverse: u32,
    /// Shutdown flag (0/1).
    pub shutdown: u32,
    /// Explicit padding to 8-byte alignment.
    pub _padding: [u8; 4],
}

const _: () = assert!(std::mem::size_of::<PublishedState>() == PublishedState::SIZE);

impl PublishedState {
    /// Size in bytes.
    pub const SIZE: usize = 104;

    /// Builds the image of `state`.
    #[must_use]
    pub fn from_state(state: &VehicleState) -> Self {
        Self {
            throttle: state.throttle,
            brake: state.brake,
            steer: state.steer,
            speed: state.speed,
            heading: state.heading,
            x: state.x,
            y: state.y,
            rpm: state.rpm,
            power: state.power,
            torque: state.torque,
            fuel: state.fuel,
            gear: state.gear,
            reverse: u32::from(state.reverse),
            shutdown: u32::from(state.shutdown),
            _padding: [0; 4],
        }
    }

    /// Reconstructs the state from its image.
    #[must_use]
    pub fn to_state(&self) -> VehicleState {
        VehicleState {
            throttle: self.throttle,
            brake: self.brake,
            steer: self.steer,
            reverse: self.reverse != 0,
            speed: self.speed,
            gear: self.gear,
            heading: self.heading,
            x: self.x,
            y: self.y,
            rpm: self.rpm,
            power: self.power,
            torque: self.torque,
            fuel: self.fuel,
            shutdown: self.shutdown != 0,
        }
    }
}

/// Splits the 8-byte header into its lock word and generation counter.
fn header_words(header: &mut [u8]) -> (&AtomicU32, &AtomicU32) {
    assert!(header.len() >= PAYLOAD_OFFSET, "segment header truncated");
    let base = header.as_mut_ptr();
    // SAFETY: `header` starts at the beginning of a page-aligned mapping, so
    // both words are 4-byte aligned and in bounds. Every process touches
    // these bytes only through atomic operations, and the returned
    // references borrow `header`, so they cannot outlive the mapping.
    unsafe {
        (
            AtomicU32::from_ptr(base.add(LOCK_OFFSET).cast::<u32>()),
            AtomicU32::from_ptr(base.add(GENERATION_OFFSET).cast::<u32>()),
        )
    }
}

/// Holds the cross-process lock word. Releases it on drop.
struct SegmentLock<'a> {
    word: &'a AtomicU32,
}

impl<'a> SegmentLock<'a> {
    fn acquire(word: &'a AtomicU32) -> Self {
        let mut spins = 0u32;
        while word
            .compare_exchange_weak(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            if spins < SPINS_BEFORE_YIELD {
                spins += 1;
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
        Self { word }
    }
}

impl Drop for SegmentLock<'_> {
    fn drop(&mut self) {
        self.word.store(UNLOCKED, Ordering::Release);
    }
}

fn check_len(path: &Path, file: &File) -> CoreResult<()> {
    let len = file
        .metadata()
        .map_err(|e| CoreError::segment(path, e))?
        .len();
    if len < SEGMENT_SIZE as u64 {
        return Err(CoreError::SegmentTooSmall {
            path: path.to_path_buf(),
            len,
            expected: SEGMENT_SIZE,
        });
    }
    Ok(())
}

/// Read-write attachment to the shared segment.
///
/// Implements [`StateStore`]: every call takes the cross-process lock for one
/// read or one merge.
pub struct SharedStateStore {
    path: PathBuf,
    map: Mutex<MmapMut>,
}

impl SharedStateStore {
    /// Creates (or truncates) the segment at `path` and publishes
    /// [`VehicleState::initial`].
    pub fn create(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| CoreError::segment(path, e))?;
        file.set_len(SEGMENT_SIZE as u64)
            .map_err(|e| CoreError::segment(path, e))?;

        let mut map = Self::map_file(path, &file)?;
        map.fill(0);
        map[PAYLOAD_OFFSET..SEGMENT_SIZE]
            .copy_from_slice(bytemuck::bytes_of(&PublishedState::from_state(&VehicleState::initial())));
        map.flush().map_err(|e| CoreError::segment(path, e))?;

        tracing::info!(path = %path.display(), size = SEGMENT_SIZE, "shared segment created");
        Ok(Self {
            path: path.to_path_buf(),
            map: Mutex::new(map),
        })
    }

    /// Attaches read-write to an existing segment.
    pub fn attach(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| CoreError::segment(path, e))?;
        check_len(path, &file)?;
        let map = Self::map_file(path, &file)?;
        Ok(Self {
            path: path.to_path_buf(),
            map: Mutex::new(map),
        })
    }

    fn map_file(path: &Path, file: &File) -> CoreResult<MmapMut> {
        // SAFETY: the segment is only ever resized by `create`, before any
        // other process can have mapped the new file.
        unsafe { MmapMut::map_mut(file) }.map_err(|e| CoreError::segment(path, e))
    }

    /// Backing file of the segment.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Generation counter of the last locked write.
    #[must_use]
    pub fn generation(&self) -> u32 {
        let mut map = self.map.lock();
        let (header, _) = map.split_at_mut(PAYLOAD_OFFSET);
        let (_, generation) = header_words(header);
        generation.load(Ordering::Acquire)
    }

    /// Removes the backing file. Existing mappings stay valid.
    pub fn unlink(&self) -> CoreResult<()> {
        fs::remove_file(&self.path).map_err(|e| CoreError::segment(&self.path, e))?;
        tracing::info!(path = %self.path.display(), "shared segment unlinked");
        Ok(())
    }

    /// Runs `f` on the published state under the lock. When `f` returns
    /// `true` the state is written back and the generation bumped.
    fn with_locked<R>(&self, f: impl FnOnce(&mut VehicleState) -> (R, bool)) -> R {
        let mut map = self.map.lock();
        let (header, payload) = map.split_at_mut(PAYLOAD_OFFSET);
        let (lock_word, generation) = header_words(header);
        let _lock = SegmentLock::acquire(lock_word);

        let slot = &mut payload[..PublishedState::SIZE];
        let mut state = bytemuck::pod_read_unaligned::<PublishedState>(slot).to_state();
        let (result, dirty) = f(&mut state);
        if dirty {
            slot.copy_from_slice(bytemuck::bytes_of(&PublishedState::from_state(&state)));
            generation.fetch_add(1, Ordering::Release);
        }
        result
    }
}

impl StateStore for SharedStateStore {
    fn read_snapshot(&self) -> VehicleState {
        self.with_locked(|state| (*state, false))
    }

    fn merge(&self, delta: &StateDelta) {
        self.with_locked(|state| {
            state.merge(delta);
            ((), true)
        });
    }

    fn mark_shutdown(&self) {
        self.with_locked(|state| {
            state.mark_shutdown();
            ((), true)
        });
    }
}

impl std::fmt::Debug for SharedStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStateStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Read-only view of the segment for observers.
///
/// Reads do not take the lock.
pub struct SegmentReader {
    map: Mmap,
}

impl SegmentReader {
    /// Opens the segment at `path` read-only.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| CoreError::segment(path, e))?;
        check_len(path, &file)?;
        // SAFETY: the mapping is read-only and the file is never shrunk
        // while mapped.
        let map = unsafe { Mmap::map(&file) }.map_err(|e| CoreError::segment(path, e))?;
        Ok(Self { map })
    }

    /// Copies the published state out without locking.
    #[must_use]
    pub fn snapshot(&self) -> VehicleState {
        bytemuck::pod_read_unaligned::<PublishedState>(&self.map[PAYLOAD_OFFSET..SEGMENT_SIZE])
            .to_state()
    }

    /// Generation counter as last seen in the mapping.
    #[must_use]
    pub fn generation(&self) -> u32 {
        bytemuck::pod_read_unaligned::<u32>(&self.map[GENERATION_OFFSET..PAYLOAD_OFFSET])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::EngineUpdate;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_published_state_size() {
        assert_eq!(std::mem::size_of::<PublishedState>(), PublishedState::SIZE);
        assert_eq!(SEGMENT_SIZE, 112);
    }

    #[test]
    fn test_create_publishes_initial_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment");

        let store = SharedStateStore::create(&path).unwrap();
        assert_eq!(store.read_snapshot(), VehicleState::initial());
        assert_eq!(store.generation(), 0);

        let reader = SegmentReader::open(&path).unwrap();
        assert_eq!(reader.snapshot(), VehicleState::initial());
    }

    #[test]
    fn test_round_trip_through_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment");
        let store = SharedStateStore::create(&path).unwrap();

        store.merge(&StateDelta::Engine(EngineUpdate {
            throttle: 0.4,
            steer: -0.3,
            reverse: true,
            speed: 3.25,
            heading: 1.5,
            x: -12.0,
            y: 7.5,
            rpm: 1800.0,
            power: 12_000.0,
            torque: 64.0,
            ..EngineUpdate::default()
        }));
        store.merge(&StateDelta::Gear(-1));
        store.merge(&StateDelta::Fuel(63.5));
        store.mark_shutdown();

        let reader = SegmentReader::open(&path).unwrap();
        assert_eq!(reader.snapshot(), store.read_snapshot());
        assert_eq!(reader.generation(), 4);

        let seen = reader.snapshot();
        assert!(seen.reverse);
        assert!(seen.shutdown);
        assert_eq!(seen.gear, -1);
        assert_eq!(seen.fuel, 63.5);
        assert_eq!(seen.x, -12.0);
    }

    #[test]
    fn test_two_attachments_serialise_merges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment");
        let owner = SharedStateStore::create(&path).unwrap();
        let first = Arc::new(SharedStateStore::attach(&path).unwrap());
        let second = Arc::new(SharedStateStore::attach(&path).unwrap());

        let bump = |store: Arc<SharedStateStore>| {
            thread::spawn(move || {
                for _ in 0..1000 {
                    store.with_locked(|state| {
                        state.x += 1.0;
                        ((), true)
                    });
                }
            })
        };
        let a = bump(Arc::clone(&first));
        let b = bump(Arc::clone(&second));
        a.join().unwrap();
        b.join().unwrap();

        assert_eq!(owner.read_snapshot().x, 2000.0);
        assert_eq!(owner.generation(), 2000);
    }

    #[test]
    fn test_attach_rejects_short_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment");
        fs::write(&path, [0u8; 16]).unwrap();

        assert!(matches!(
            SharedStateStore::attach(&path),
            Err(CoreError::SegmentTooSmall { len: 16, .. })
        ));
        assert!(matches!(
            SegmentReader::open(&path),
            Err(CoreError::SegmentTooSmall { .. })
        ));
    }

    #[test]
    fn test_unlink_keeps_mapping_alive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment");
        let store = SharedStateStore::create(&path).unwrap();
        let reader = SegmentReader::open(&path).unwrap();

        store.mark_shutdown();
        store.unlink().unwrap();

        assert!(!path.exists());
        assert!(reader.snapshot().shutdown);
    }

    #[test]
    fn test_open_missing_segment() {
        assert!(matches!(
            SegmentReader::open("/nonexistent/drivetrain_segment"),
            Err(CoreError::Segment { .. })
        ));
    }
}
