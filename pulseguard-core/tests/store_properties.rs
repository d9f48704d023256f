//! Durable ring store invariants and persistence across restarts

use proptest::prelude::*;

use pulseguard_core::{
    constants::{MS_PER_DAY, RECORD_BYTES, HEADER_BYTES},
    FileMedium, MemoryMedium, Reading, RingStore, StoreError,
};

const CAP: usize = 8;
const BYTES: usize = HEADER_BYTES + CAP * RECORD_BYTES;

fn reading() -> impl Strategy<Value = Reading> {
    (30.0f32..220.0, 70.0f32..100.0).prop_map(|(bpm, spo2)| Reading::new(bpm, spo2))
}

proptest! {
    #[test]
    fn count_tracks_appends_and_rejects_overflow(
        readings in prop::collection::vec(reading(), 0..20),
    ) {
        let mut store: RingStore<_, CAP> = RingStore::open(MemoryMedium::<BYTES>::new(), 0).unwrap();

        for (i, r) in readings.iter().enumerate() {
            let before: Vec<Reading> = store.drain().collect();
            match store.append(*r, i as u64) {
                Ok(slot) => {
                    prop_assert_eq!(slot, i);
                    prop_assert_eq!(store.len(), i + 1);
                }
                Err(e) => {
                    prop_assert_eq!(e, StoreError::Full { capacity: CAP });
                    prop_assert_eq!(before.len(), CAP);
                    prop_assert_eq!(store.drain().collect::<Vec<_>>(), before);
                }
            }
            prop_assert!(store.len() <= CAP);
        }

        let expected: Vec<Reading> = readings.iter().copied().take(CAP).collect();
        prop_assert_eq!(store.drain().collect::<Vec<_>>(), expected);
        prop_assert_eq!(store.first_write().is_some(), !store.is_empty());
        if !readings.is_empty() {
            prop_assert_eq!(store.first_write(), Some(0));
        }
    }

    #[test]
    fn clear_empties_drain(readings in prop::collection::vec(reading(), 1..=CAP)) {
        let mut store: RingStore<_, CAP> = RingStore::open(MemoryMedium::<BYTES>::new(), 0).unwrap();
        for r in &readings {
            store.append(*r, 5).unwrap();
        }

        prop_assert_eq!(store.drain().count(), readings.len());
        store.clear();
        prop_assert_eq!(store.drain().count(), 0);
        prop_assert_eq!(store.len(), 0);
        prop_assert_eq!(store.first_write(), None);
    }

    #[test]
    fn expiry_boundary(t0 in 0u64..1_000_000_000, n in 1usize..=CAP) {
        let mut store: RingStore<_, CAP> = RingStore::open(MemoryMedium::<BYTES>::new(), 0).unwrap();
        for _ in 0..n {
            store.append(Reading::new(60.0, 95.0), t0).unwrap();
        }

        prop_assert_eq!(store.expire_if_stale(t0 + MS_PER_DAY - 1), None);
        prop_assert_eq!(store.len(), n);
        prop_assert_eq!(store.expire_if_stale(t0 + MS_PER_DAY), Some(n));
        prop_assert!(store.is_empty());
        prop_assert_eq!(store.expire_if_stale(t0 + 2 * MS_PER_DAY), None);
    }

    #[test]
    fn reopen_recovers_exact_backlog(readings in prop::collection::vec(reading(), 0..=CAP)) {
        let mut store: RingStore<_, CAP> = RingStore::open(MemoryMedium::<BYTES>::new(), 0).unwrap();
        for r in &readings {
            store.append(*r, 1).unwrap();
        }

        let reopened: RingStore<_, CAP> = RingStore::open(store.into_medium(), 42).unwrap();
        prop_assert_eq!(reopened.drain().collect::<Vec<_>>(), readings.clone());
        let expected_first = if readings.is_empty() { None } else { Some(42) };
        prop_assert_eq!(reopened.first_write(), expected_first);
    }
}

#[test]
fn file_backed_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pulseguard.store");

    {
        let medium = FileMedium::open(&path, BYTES).unwrap();
        let mut store: RingStore<_, CAP> = RingStore::open(medium, 0).unwrap();
        store.append(Reading::new(71.5, 98.0), 10).unwrap();
        store.append(Reading::new(88.0, 96.5), 20).unwrap();
    }

    let medium = FileMedium::open(&path, BYTES).unwrap();
    let mut store: RingStore<_, CAP> = RingStore::open(medium, 1_000).unwrap();
    assert_eq!(
        store.drain().collect::<Vec<_>>(),
        vec![Reading::new(71.5, 98.0), Reading::new(88.0, 96.5)]
    );
    assert_eq!(store.first_write(), Some(1_000));

    store.clear();
    drop(store);

    let medium = FileMedium::open(&path, BYTES).unwrap();
    let store: RingStore<_, CAP> = RingStore::open(medium, 0).unwrap();
    assert!(store.is_empty());
}

#[test]
fn file_too_small_for_capacity_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let medium = FileMedium::open(dir.path().join("tiny.store"), 16).unwrap();

    let err = RingStore::<_, CAP>::open(medium, 0).err();
    assert_eq!(err, Some(StoreError::MediumTooSmall { required: BYTES, available: 16 }));
}
