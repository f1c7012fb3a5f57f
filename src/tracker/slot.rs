use image::GrayImage;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::face_landmarks::{LandmarkModel, LandmarkParams};
use crate::geometry::Rect;
use crate::tracker::candidates::DetectionCandidate;

/// What happened to one slot during a frame's update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotUpdate {
    /// Inactive and nothing left to claim
    Idle,
    /// Claimed candidate `candidate`; `activated` tells whether initialisation succeeded
    Claimed { candidate: usize, activated: bool },
    /// Continued tracking from its own state
    Tracked { success: bool },
}

/// Per-slot result of the parallel update, merged once every slot is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotReport {
    pub slot: usize,
    /// The slot was reclaimed for exceeding the failure bound before updating
    pub reclaimed: bool,
    pub update: SlotUpdate,
}

/// One tracked face bound to its own landmark engine instance.
pub struct TrackingSlot {
    model: Box<dyn LandmarkModel>,
    active: bool,
    consecutive_failures: u32,
}

impl TrackingSlot {
    pub fn new(model: Box<dyn LandmarkModel>) -> Self {
        Self {
            model,
            active: false,
            consecutive_failures: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn model(&self) -> &dyn LandmarkModel {
        self.model.as_ref()
    }

    /// Forgets the tracked face and returns the slot to the pool.
    pub fn deactivate(&mut self) {
        self.model.reset();
        self.active = false;
        self.consecutive_failures = 0;
    }

    #[cfg(test)]
    pub(crate) fn force_state(&mut self, active: bool, consecutive_failures: u32) {
        self.active = active;
        self.consecutive_failures = consecutive_failures;
    }

    /// Advances the slot by one frame.
    ///
    /// A slot over the failure bound is reclaimed first, so it can pick up a new
    /// candidate in the same frame. An idle slot walks the candidate list and takes
    /// the first one nobody else has claimed; an active slot keeps tracking on its own.
    pub(crate) fn update(
        &mut self,
        index: usize,
        frame: &GrayImage,
        candidates: &[DetectionCandidate],
        params: &LandmarkParams,
        max_failures_in_a_row: u32,
    ) -> SlotReport {
        let reclaimed = self.consecutive_failures > max_failures_in_a_row;
        if reclaimed {
            self.deactivate();
        }

        let update = if self.active {
            let success = self.model.detect_landmarks(frame, None, params);
            if success {
                self.consecutive_failures = 0;
            } else {
                self.consecutive_failures += 1;
            }
            SlotUpdate::Tracked { success }
        } else {
            match candidates.iter().position(|c| c.try_claim()) {
                Some(candidate) => {
                    self.model.reset();
                    let activated =
                        self.model
                            .detect_landmarks(frame, Some(&candidates[candidate].region), params);
                    if activated {
                        self.active = true;
                        self.consecutive_failures = 0;
                    } else {
                        self.model.reset();
                    }
                    SlotUpdate::Claimed {
                        candidate,
                        activated,
                    }
                }
                None => SlotUpdate::Idle,
            }
        };

        trace!(slot = index, reclaimed, ?update, "slot updated");

        SlotReport {
            slot: index,
            reclaimed,
            update,
        }
    }
}

/// Fixed-capacity collection of tracking slots, owned for the whole session.
pub struct SlotPool {
    slots: Vec<TrackingSlot>,
}

impl SlotPool {
    /// Creates `capacity` inactive slots, asking `factory` for each slot's engine.
    pub fn initialize<F>(capacity: usize, mut factory: F) -> Result<Self>
    where
        F: FnMut(usize) -> Result<Box<dyn LandmarkModel>>,
    {
        if capacity == 0 {
            return Err(Error::Config("slot pool needs at least one slot".into()));
        }

        let slots = (0..capacity)
            .map(|i| factory(i).map(TrackingSlot::new))
            .collect::<Result<Vec<_>>>()?;

        debug!(capacity, "slot pool initialised");
        Ok(Self { slots })
    }

    /// Builds a pool with one slot per engine instance.
    pub fn from_models(models: Vec<Box<dyn LandmarkModel>>) -> Result<Self> {
        let mut models = models.into_iter();
        let capacity = models.len();
        Self::initialize(capacity, |_| {
            models
                .next()
                .ok_or_else(|| Error::Config("ran out of landmark models".into()))
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn all_active(&self) -> bool {
        self.slots.iter().all(TrackingSlot::is_active)
    }

    pub fn num_active(&self) -> usize {
        self.slots.iter().filter(|s| s.is_active()).count()
    }

    pub fn deactivate(&mut self, slot: usize, reason: &str) {
        if let Some(s) = self.slots.get_mut(slot) {
            debug!(slot, reason, "deactivating slot");
            s.deactivate();
        }
    }

    /// Bounding boxes of the slots currently tracking a face.
    pub fn active_boxes(&self) -> Vec<Rect> {
        self.slots
            .iter()
            .filter(|s| s.is_active())
            .map(|s| s.model().bounding_box())
            .collect()
    }

    pub fn slots(&self) -> &[TrackingSlot] {
        &self.slots
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [TrackingSlot] {
        &mut self.slots
    }
}
