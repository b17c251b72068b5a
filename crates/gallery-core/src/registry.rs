//! Fixed-capacity slot registry
//!
//! Provides [`SlotRegistry`], the eight ordered slots of a gallery and the
//! per-slot exclusion tokens ([`SlotGuard`]) that keep two pipelines off the
//! same slot.

use crate::error::GalleryError;
use crate::placeholder::DisplayRef;
use crate::types::{RecordId, SLOT_COUNT};
use parking_lot::Mutex;
use url::Url;

/// One display position
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Slot {
    /// Image shown in the slot
    pub display: DisplayRef,
    /// Linked metadata record, if known
    pub record_id: Option<RecordId>,
}

impl Slot {
    /// Slot showing a blob
    #[inline]
    #[must_use]
    pub fn with_image(url: Url, record_id: Option<RecordId>) -> Self {
        Self {
            display: DisplayRef::Blob(url),
            record_id,
        }
    }

    /// Check if the slot shows the placeholder
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.display.is_placeholder()
    }
}

#[derive(Debug)]
struct RegistryState {
    slots: Vec<Slot>,
    busy: [bool; SLOT_COUNT],
    /// Bumped whenever the whole registry is rewritten
    epoch: u64,
}

/// Ordered collection of exactly [`SLOT_COUNT`] slots
///
/// Operations on different ordinals never interact. Operations on one
/// ordinal are serialized by [`SlotGuard`]s; a second acquire on a held slot
/// fails with `SlotBusy`.
#[derive(Debug)]
pub struct SlotRegistry {
    state: Mutex<RegistryState>,
}

impl Default for SlotRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotRegistry {
    /// Create registry with every slot empty
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                slots: vec![Slot::default(); SLOT_COUNT],
                busy: [false; SLOT_COUNT],
                epoch: 0,
            }),
        }
    }

    /// Number of slots
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        SLOT_COUNT
    }

    /// Always false; the registry is never resized
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Lowest ordinal showing the placeholder
    #[must_use]
    pub fn find_first_empty(&self) -> Option<usize> {
        self.state.lock().slots.iter().position(Slot::is_empty)
    }

    /// Copy of one slot
    ///
    /// # Errors
    /// - `GalleryError::InvalidSlot` if the ordinal is out of range
    pub fn get(&self, ordinal: usize) -> Result<Slot, GalleryError> {
        check(ordinal)?;
        Ok(self.state.lock().slots[ordinal].clone())
    }

    /// Copy of all slots, in ordinal order
    #[must_use]
    pub fn snapshot(&self) -> Vec<Slot> {
        self.state.lock().slots.clone()
    }

    /// Number of slots showing an image
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.state.lock().slots.iter().filter(|s| !s.is_empty()).count()
    }

    /// Replace a slot's image and record link
    ///
    /// # Errors
    /// - `GalleryError::InvalidSlot` if the ordinal is out of range
    pub fn set_image(
        &self,
        ordinal: usize,
        url: Url,
        record_id: Option<RecordId>,
    ) -> Result<(), GalleryError> {
        check(ordinal)?;
        self.state.lock().slots[ordinal] = Slot::with_image(url, record_id);
        Ok(())
    }

    /// Reset a slot to the placeholder
    ///
    /// # Errors
    /// - `GalleryError::InvalidSlot` if the ordinal is out of range
    pub fn reset(&self, ordinal: usize) -> Result<(), GalleryError> {
        check(ordinal)?;
        self.state.lock().slots[ordinal] = Slot::default();
        Ok(())
    }

    /// Reset every slot to the placeholder
    ///
    /// Pipelines still holding a guard from before the reset can no longer
    /// write their slot.
    pub fn reset_all(&self) {
        let mut state = self.state.lock();
        state.slots.iter_mut().for_each(|slot| *slot = Slot::default());
        state.epoch += 1;
    }

    /// Current rewrite epoch
    #[inline]
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    /// Rewrite every free slot from `images`, padding with placeholders
    ///
    /// Slots held by a pipeline keep their state and are skipped, as are
    /// images already shown in a held slot. At most [`SLOT_COUNT`] images are
    /// placed. Guards stay valid; only [`Self::reset_all`] invalidates them.
    ///
    /// # Errors
    /// - `GalleryError::OwnerChanged` if the registry was reset since `epoch`
    ///   was read
    pub fn load(&self, epoch: u64, images: Vec<Slot>) -> Result<usize, GalleryError> {
        let mut state = self.state.lock();
        if state.epoch != epoch {
            return Err(GalleryError::OwnerChanged);
        }
        let held: Vec<DisplayRef> = (0..SLOT_COUNT)
            .filter(|&ordinal| state.busy[ordinal] && !state.slots[ordinal].is_empty())
            .map(|ordinal| state.slots[ordinal].display.clone())
            .collect();
        let mut images = images
            .into_iter()
            .filter(|image| !held.contains(&image.display));
        let mut loaded = 0;
        for ordinal in 0..SLOT_COUNT {
            if state.busy[ordinal] {
                continue;
            }
            state.slots[ordinal] = match images.next() {
                Some(image) => {
                    loaded += 1;
                    image
                }
                None => Slot::default(),
            };
        }
        Ok(loaded)
    }

    /// Check if a pipeline holds the slot
    #[must_use]
    pub fn is_busy(&self, ordinal: usize) -> bool {
        ordinal < SLOT_COUNT && self.state.lock().busy[ordinal]
    }

    /// Take the exclusion token for one slot
    ///
    /// # Errors
    /// - `GalleryError::InvalidSlot` if the ordinal is out of range
    /// - `GalleryError::SlotBusy` if another pipeline holds the slot
    pub fn try_acquire(&self, ordinal: usize) -> Result<SlotGuard<'_>, GalleryError> {
        check(ordinal)?;
        let mut state = self.state.lock();
        if state.busy[ordinal] {
            return Err(GalleryError::SlotBusy(ordinal));
        }
        state.busy[ordinal] = true;
        Ok(SlotGuard {
            registry: self,
            ordinal,
            epoch: state.epoch,
        })
    }

    /// Take the exclusion token for the lowest empty slot
    ///
    /// # Errors
    /// - `GalleryError::SlotsFull` if no slot shows the placeholder
    /// - `GalleryError::SlotBusy` if every empty slot is held by a pipeline
    pub fn claim_first_empty(&self) -> Result<SlotGuard<'_>, GalleryError> {
        let mut state = self.state.lock();
        let mut first_busy = None;
        for ordinal in 0..SLOT_COUNT {
            if !state.slots[ordinal].is_empty() {
                continue;
            }
            if state.busy[ordinal] {
                first_busy.get_or_insert(ordinal);
                continue;
            }
            state.busy[ordinal] = true;
            return Ok(SlotGuard {
                registry: self,
                ordinal,
                epoch: state.epoch,
            });
        }
        Err(first_busy.map_or(GalleryError::SlotsFull(SLOT_COUNT), GalleryError::SlotBusy))
    }

    fn release(&self, ordinal: usize) {
        self.state.lock().busy[ordinal] = false;
    }

    fn write(&self, ordinal: usize, epoch: u64, slot: Slot) -> Result<(), GalleryError> {
        let mut state = self.state.lock();
        if state.epoch != epoch {
            return Err(GalleryError::OwnerChanged);
        }
        // a reload may already have placed this image in a free slot
        if !slot.is_empty() {
            for other in 0..SLOT_COUNT {
                if other != ordinal
                    && !state.busy[other]
                    && state.slots[other].display == slot.display
                {
                    state.slots[other] = Slot::default();
                }
            }
        }
        state.slots[ordinal] = slot;
        Ok(())
    }
}

/// Exclusive hold on one slot, released on drop
#[derive(Debug)]
#[must_use = "dropping the guard releases the slot immediately"]
pub struct SlotGuard<'a> {
    registry: &'a SlotRegistry,
    ordinal: usize,
    epoch: u64,
}

impl SlotGuard<'_> {
    /// Held ordinal
    #[inline]
    #[must_use]
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Copy of the held slot
    #[must_use]
    pub fn slot(&self) -> Slot {
        self.registry.state.lock().slots[self.ordinal].clone()
    }

    /// Bind an image and record to the held slot
    ///
    /// # Errors
    /// - `GalleryError::OwnerChanged` if the registry was rewritten since the
    ///   guard was taken
    pub fn set_image(&self, url: Url, record_id: Option<RecordId>) -> Result<(), GalleryError> {
        self.registry
            .write(self.ordinal, self.epoch, Slot::with_image(url, record_id))
    }

    /// Reset the held slot to the placeholder
    ///
    /// # Errors
    /// - `GalleryError::OwnerChanged` if the registry was rewritten since the
    ///   guard was taken
    pub fn reset(&self) -> Result<(), GalleryError> {
        self.registry.write(self.ordinal, self.epoch, Slot::default())
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.registry.release(self.ordinal);
    }
}

fn check(ordinal: usize) -> Result<(), GalleryError> {
    if ordinal < SLOT_COUNT {
        Ok(())
    } else {
        Err(GalleryError::InvalidSlot(ordinal))
    }
}
