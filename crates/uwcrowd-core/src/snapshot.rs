//! The snapshot store: current displayed state of every location.
//!
//! # Ownership
//!
//! The store is built once from the registry and its key set never
//! changes, so the outer map is immutable and shared without a lock. Each
//! entry sits behind its own [`RwLock`]; writes to different locations
//! never contend. Construction hands out exactly one [`SlotWriter`] per
//! location. The writer is not `Clone`, so the worker that owns it is the
//! only task that can ever write that key.
//!
//! # Consistency
//!
//! `people` and `percent_full` are computed from the same value and
//! stored in a single assignment under the entry's write lock, so a reader
//! never sees one without the other. A full [`Snapshot`] is assembled one
//! entry at a time; different entries may come from different update
//! rounds, which is fine because each one is self-consistent.

use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, RwLock};
use uwcrowd_types::{CorrectedBaseline, DisplayState, LocationId, LocationView, Snapshot};

use crate::correction::{percent_full, whole_people};
use crate::registry::LocationRegistry;

/// One location's stored state plus bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryRecord {
    /// What the dashboard shows.
    pub display: DisplayState,
    /// Number of writes since startup (0 for the initial state).
    pub updates: u64,
    /// When the entry was last written.
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Slot {
    capacity: Option<NonZeroU32>,
    baseline: CorrectedBaseline,
    record: RwLock<EntryRecord>,
}

/// Build a display state whose percentage always matches its headcount.
pub fn display_state(people: u32, capacity: Option<NonZeroU32>) -> DisplayState {
    DisplayState {
        people,
        percent_full: percent_full(f64::from(people), capacity),
    }
}

/// Shared handle to the store. Cheap to clone; clones see the same entries.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    slots: Arc<BTreeMap<LocationId, Arc<Slot>>>,
    changed: Arc<Notify>,
    version: Arc<AtomicU64>,
}

impl SnapshotStore {
    /// Build the store with one entry per registered location, initialised
    /// from the corrected baseline rounded to whole people.
    ///
    /// Returns the store and one writer per location, in key order.
    pub fn from_registry(registry: &LocationRegistry) -> (Self, Vec<SlotWriter>) {
        let now = Utc::now();
        let changed = Arc::new(Notify::new());
        let version = Arc::new(AtomicU64::new(0));

        let mut slots = BTreeMap::new();
        let mut writers = Vec::with_capacity(registry.len());
        for location in registry.iter() {
            let people = whole_people(location.baseline.corrected_count);
            let slot = Arc::new(Slot {
                capacity: location.capacity,
                baseline: location.baseline,
                record: RwLock::new(EntryRecord {
                    display: display_state(people, location.capacity),
                    updates: 0,
                    updated_at: now,
                }),
            });
            writers.push(SlotWriter {
                id: location.id.clone(),
                slot: Arc::clone(&slot),
                changed: Arc::clone(&changed),
                version: Arc::clone(&version),
            });
            slots.insert(location.id.clone(), slot);
        }

        let store = Self {
            slots: Arc::new(slots),
            changed,
            version,
        };
        (store, writers)
    }

    /// Copy the displayed state of every location.
    ///
    /// Each entry's read lock is held only long enough to copy it.
    pub async fn snapshot(&self) -> Snapshot {
        let mut out = BTreeMap::new();
        for (id, slot) in self.slots.iter() {
            let display = slot.record.read().await.display;
            out.insert(id.clone(), display);
        }
        Snapshot(out)
    }

    /// Copy one location's record.
    pub async fn entry(&self, id: &str) -> Option<EntryRecord> {
        let slot = self.slots.get(id)?;
        Some(*slot.record.read().await)
    }

    /// Copy every location's record, in key order.
    pub async fn entries(&self) -> Vec<(LocationId, EntryRecord)> {
        let mut out = Vec::with_capacity(self.slots.len());
        for (id, slot) in self.slots.iter() {
            out.push((id.clone(), *slot.record.read().await));
        }
        out
    }

    /// Everything known about one location.
    pub async fn view(&self, id: &str) -> Option<LocationView> {
        let (key, slot) = self.slots.get_key_value(id)?;
        let record = *slot.record.read().await;
        Some(LocationView {
            id: key.clone(),
            display: record.display,
            baseline: slot.baseline,
            capacity: slot.capacity.map(NonZeroU32::get),
            updates: record.updates,
            updated_at: record.updated_at,
        })
    }

    /// Total number of writes across all locations. Increases on every
    /// write, so a reader can tell whether anything changed since it last
    /// looked.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Wait until some writer has written since the last call returned.
    ///
    /// A write that happens while nobody is waiting is remembered, so the
    /// next call returns immediately.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }

    /// Identifiers of every location, in key order.
    pub fn ids(&self) -> impl Iterator<Item = &LocationId> {
        self.slots.keys()
    }

    /// Number of locations.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the store has no locations.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Exclusive write access to one location's entry.
#[derive(Debug)]
pub struct SlotWriter {
    id: LocationId,
    slot: Arc<Slot>,
    changed: Arc<Notify>,
    version: Arc<AtomicU64>,
}

impl SlotWriter {
    /// The location this writer owns.
    pub const fn id(&self) -> &LocationId {
        &self.id
    }

    /// The location's capacity.
    pub fn capacity(&self) -> Option<NonZeroU32> {
        self.slot.capacity
    }

    /// Replace the displayed headcount.
    ///
    /// `percent_full` is derived here, under the same lock, so the stored
    /// pair is always consistent. Returns the state that was stored.
    pub async fn write(&self, people: u32) -> DisplayState {
        let display = display_state(people, self.slot.capacity);
        {
            let mut record = self.slot.record.write().await;
            *record = EntryRecord {
                display,
                updates: record.updates.saturating_add(1),
                updated_at: Utc::now(),
            };
        }
        self.version.fetch_add(1, Ordering::AcqRel);
        self.changed.notify_one();
        display
    }
}
