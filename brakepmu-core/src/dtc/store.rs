//! Persisted DTC registry
//!
//! The in-memory mask is an atomic word, so fault-source calls and
//! tester-driven clears may interleave without losing bits. Persistence is
//! serialized by an async mutex around the storage; each write stores the
//! mask as it is once the lock is held, so the newest state always lands
//! last.

use brakepmu_hal::storage::{NvStorage, StorageError};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use portable_atomic::{AtomicU32, Ordering};

use super::code::{bit_for, VALID_MASK};
use crate::config::DtcStoreConfig;

/// Length of the persisted snapshot (little-endian mask)
pub const SNAPSHOT_LEN: usize = 4;

/// Errors from DTC registry operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DtcError {
    /// Code index outside the defined range; nothing changed
    InvalidCode(u8),
    /// The in-memory change stands but the snapshot was not written
    Persist(StorageError),
}

/// Effect of a set or clear on the mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    /// The bit flipped and the snapshot was written
    Changed,
    /// The bit already had the requested value; nothing was written
    Unchanged,
}

/// DTC registry backed by non-volatile storage
pub struct DtcStore<M: RawMutex, S> {
    mask: AtomicU32,
    storage: Mutex<M, S>,
    config: DtcStoreConfig,
}

impl<M: RawMutex, S> DtcStore<M, S> {
    /// Create a registry with an all-clear mask
    ///
    /// Call [`DtcStore::init`] before use to restore the persisted state.
    pub const fn new(storage: S, config: DtcStoreConfig) -> Self {
        Self {
            mask: AtomicU32::new(0),
            storage: Mutex::new(storage),
            config,
        }
    }

    /// Whether the code at `index` is active; false when out of range
    pub fn is_set(&self, code: impl Into<u8>) -> bool {
        match bit_for(code.into()) {
            Some(bit) => self.mask.load(Ordering::Acquire) & bit != 0,
            None => false,
        }
    }

    /// Raw mask
    pub fn get_mask(&self) -> u32 {
        self.mask.load(Ordering::Acquire)
    }

    /// Replace the raw mask
    ///
    /// Not range-filtered and not persisted.
    pub fn set_mask(&self, mask: u32) {
        self.mask.store(mask, Ordering::Release);
    }

    /// Consume the registry and return the storage
    pub fn into_storage(self) -> S {
        self.storage.into_inner()
    }
}

impl<M: RawMutex, S: NvStorage> DtcStore<M, S> {
    /// Restore the mask from the persisted snapshot
    ///
    /// A snapshot with bits outside the defined codes (an erased device
    /// reads all ones) is treated as blank. On a blank snapshot or a read
    /// failure the mask starts all-clear. Returns the restored mask.
    pub async fn init(&self) -> Result<u32, DtcError> {
        let mut snapshot = [0u8; SNAPSHOT_LEN];
        let read = {
            let mut storage = self.storage.lock().await;
            storage
                .read(self.config.snapshot_address, &mut snapshot)
                .await
        };

        match read {
            Ok(()) => {
                let mask = u32::from_le_bytes(snapshot);
                if mask & !VALID_MASK != 0 {
                    warn!("DTC snapshot {=u32:#x} is blank or corrupt, starting clear", mask);
                    self.mask.store(0, Ordering::Release);
                    return Ok(0);
                }
                self.mask.store(mask, Ordering::Release);
                info!("DTC mask restored: {=u32:#x}", mask);
                Ok(mask)
            }
            Err(e) => {
                error!("DTC snapshot read failed: {:?}", e);
                self.mask.store(0, Ordering::Release);
                Err(DtcError::Persist(e))
            }
        }
    }

    /// Mark a code active
    ///
    /// Persists only when the bit was previously clear.
    pub async fn set(&self, code: impl Into<u8>) -> Result<Transition, DtcError> {
        let index = code.into();
        let bit = bit_for(index).ok_or(DtcError::InvalidCode(index))?;

        let old = self.mask.fetch_or(bit, Ordering::AcqRel);
        if old & bit != 0 {
            return Ok(Transition::Unchanged);
        }

        debug!("DTC {} set", index);
        self.persist().await?;
        Ok(Transition::Changed)
    }

    /// Mark a code resolved
    ///
    /// Persists only when the bit was previously set.
    pub async fn clear(&self, code: impl Into<u8>) -> Result<Transition, DtcError> {
        let index = code.into();
        let bit = bit_for(index).ok_or(DtcError::InvalidCode(index))?;

        let old = self.mask.fetch_and(!bit, Ordering::AcqRel);
        if old & bit == 0 {
            return Ok(Transition::Unchanged);
        }

        debug!("DTC {} cleared", index);
        self.persist().await?;
        Ok(Transition::Changed)
    }

    /// Clear every code and persist unconditionally
    pub async fn clear_all(&self) -> Result<(), DtcError> {
        self.mask.store(0, Ordering::Release);
        self.persist().await
    }

    /// Write the current mask to the snapshot address
    async fn persist(&self) -> Result<(), DtcError> {
        let mut storage = self.storage.lock().await;
        let mask = self.mask.load(Ordering::Acquire);
        storage
            .write(self.config.snapshot_address, &mask.to_le_bytes())
            .await
            .map_err(|e| {
                error!("DTC snapshot write of {=u32:#x} failed: {:?}", mask, e);
                DtcError::Persist(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtc::DtcCode;
    use brakepmu_hal::mock::RamStorage;
    use embassy_futures::join::{join, join3};
    use embassy_futures::{block_on, yield_now};
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use proptest::prelude::*;

    type TestStore = DtcStore<CriticalSectionRawMutex, RamStorage>;

    fn store_with(storage: RamStorage) -> TestStore {
        DtcStore::new(storage, DtcStoreConfig::default())
    }

    /// Storage whose writes suspend once before landing
    #[derive(Default)]
    struct YieldingStorage {
        inner: RamStorage,
    }

    impl NvStorage for YieldingStorage {
        async fn read(&mut self, address: u16, buffer: &mut [u8]) -> Result<(), StorageError> {
            self.inner.read(address, buffer).await
        }

        async fn write(&mut self, address: u16, data: &[u8]) -> Result<(), StorageError> {
            yield_now().await;
            self.inner.write(address, data).await
        }

        fn capacity(&self) -> usize {
            self.inner.capacity()
        }
    }

    fn snapshot(storage: &RamStorage) -> u32 {
        u32::from_le_bytes(storage.memory[..SNAPSHOT_LEN].try_into().unwrap())
    }

    #[test]
    fn test_set_then_clear() {
        let store = store_with(RamStorage::new());
        block_on(async {
            assert_eq!(
                store.set(DtcCode::BuckCUndervoltage).await,
                Ok(Transition::Changed)
            );
            assert!(store.is_set(DtcCode::BuckCUndervoltage));
            assert_eq!(
                store.clear(DtcCode::BuckCUndervoltage).await,
                Ok(Transition::Changed)
            );
            assert!(!store.is_set(DtcCode::BuckCUndervoltage));
        });
    }

    #[test]
    fn test_out_of_range_is_noop() {
        let store = store_with(RamStorage::new());
        block_on(async {
            store.set(DtcCode::BuckAUndervoltage).await.unwrap();
            assert_eq!(store.set(4u8).await, Err(DtcError::InvalidCode(4)));
            assert_eq!(store.clear(200u8).await, Err(DtcError::InvalidCode(200)));
        });
        assert!(!store.is_set(4u8));
        assert_eq!(store.get_mask(), 0b0001);
        assert_eq!(store.into_storage().writes, 1);
    }

    #[test]
    fn test_interleaved_updates_persist_newest_mask() {
        let store: DtcStore<CriticalSectionRawMutex, YieldingStorage> =
            DtcStore::new(YieldingStorage::default(), DtcStoreConfig::default());

        let (a, b) = block_on(join(
            store.set(DtcCode::BuckAUndervoltage),
            store.set(DtcCode::BuckBUndervoltage),
        ));
        assert_eq!((a, b), (Ok(Transition::Changed), Ok(Transition::Changed)));
        assert_eq!(store.get_mask(), 0b0011);

        let (a, c, d) = block_on(join3(
            store.clear(DtcCode::BuckAUndervoltage),
            store.set(DtcCode::BuckCUndervoltage),
            store.set(DtcCode::BuckDUndervoltage),
        ));
        assert!(a.is_ok() && c.is_ok() && d.is_ok());
        assert_eq!(store.get_mask(), 0b1110);

        let storage = store.into_storage().inner;
        assert_eq!(snapshot(&storage), 0b1110);
        assert_eq!(storage.writes, 5);
    }

    #[test]
    fn test_persists_only_on_transition() {
        let store = store_with(RamStorage::new());
        block_on(async {
            store.set(DtcCode::BuckBUndervoltage).await.unwrap();
            assert_eq!(
                store.set(DtcCode::BuckBUndervoltage).await,
                Ok(Transition::Unchanged)
            );
            assert_eq!(
                store.clear(DtcCode::BuckDUndervoltage).await,
                Ok(Transition::Unchanged)
            );
        });
        let storage = store.into_storage();
        assert_eq!(storage.writes, 1);
        assert_eq!(snapshot(&storage), 0b0010);
    }

    #[test]
    fn test_clear_all_persists_unconditionally() {
        let store = store_with(RamStorage::new());
        block_on(async {
            store.clear_all().await.unwrap();
            store.set(DtcCode::BuckAUndervoltage).await.unwrap();
            store.clear_all().await.unwrap();
        });
        assert_eq!(store.get_mask(), 0);
        let storage = store.into_storage();
        assert_eq!(storage.writes, 3);
        assert_eq!(snapshot(&storage), 0);
    }

    #[test]
    fn test_init_restores_snapshot() {
        let storage = RamStorage::with_contents(0, &0x0000_0005u32.to_le_bytes());
        let store = store_with(storage);
        assert_eq!(block_on(store.init()), Ok(5));
        assert!(store.is_set(0u8));
        assert!(!store.is_set(1u8));
        assert!(store.is_set(2u8));
    }

    #[test]
    fn test_init_at_configured_address() {
        let storage = RamStorage::with_contents(0x40, &0x0000_0008u32.to_le_bytes());
        let store: TestStore = DtcStore::new(
            storage,
            DtcStoreConfig {
                snapshot_address: 0x40,
            },
        );
        assert_eq!(block_on(store.init()), Ok(8));
        assert!(store.is_set(DtcCode::BuckDUndervoltage));
    }

    #[test]
    fn test_init_on_erased_device_starts_clear() {
        let store = store_with(RamStorage::new());
        store.set_mask(0b0110);
        assert_eq!(block_on(store.init()), Ok(0));
        assert_eq!(store.get_mask(), 0);
    }

    #[test]
    fn test_init_read_failure_starts_clear() {
        let mut storage = RamStorage::with_contents(0, &1u32.to_le_bytes());
        storage.fail_reads = Some(StorageError::Timeout);
        let store = store_with(storage);
        store.set_mask(0b1000);
        assert_eq!(
            block_on(store.init()),
            Err(DtcError::Persist(StorageError::Timeout))
        );
        assert_eq!(store.get_mask(), 0);
    }

    #[test]
    fn test_write_failure_is_surfaced() {
        let mut storage = RamStorage::new();
        storage.fail_writes = Some(StorageError::Device);
        let store = store_with(storage);
        assert_eq!(
            block_on(store.set(DtcCode::BuckAUndervoltage)),
            Err(DtcError::Persist(StorageError::Device))
        );
        // The fault is still recorded in memory
        assert!(store.is_set(DtcCode::BuckAUndervoltage));
    }

    #[test]
    fn test_set_mask_does_not_persist() {
        let store = store_with(RamStorage::new());
        store.set_mask(0xDEAD_BEEF);
        assert_eq!(store.get_mask(), 0xDEAD_BEEF);
        assert_eq!(store.into_storage().writes, 0);
    }

    proptest! {
        #[test]
        fn prop_mask_roundtrip(mask in any::<u32>()) {
            let store = store_with(RamStorage::new());
            store.set_mask(mask);
            prop_assert_eq!(store.get_mask(), mask);
        }

        #[test]
        fn prop_set_clear_any_index(index in any::<u8>()) {
            let store = store_with(RamStorage::new());
            let valid = index < DtcCode::COUNT;

            let set = block_on(store.set(index));
            prop_assert_eq!(set.is_ok(), valid);
            prop_assert_eq!(store.is_set(index), valid);

            let clear = block_on(store.clear(index));
            prop_assert_eq!(clear.is_ok(), valid);
            prop_assert!(!store.is_set(index));
            prop_assert_eq!(store.get_mask(), 0);
        }
    }
}
