//! [`DirtyRegionTracker`] – two-cycle dirty rectangle.
//!
//! A layer that paints moving people must invalidate both where they are
//! now and where they were, otherwise the cells they vacated keep their old
//! cost.  The tracker remembers one rectangle from the previous cycle and
//! folds it into the current one.
//!
//! Each cycle:
//!
//! 1. the people box is unioned into the caller's box;
//! 2. on the first cycle, that union becomes the remembered box;
//! 3. on later cycles, the box the caller *supplied* (before step 1) is
//!    remembered for next time and the previously remembered box is unioned
//!    into the result.
//!
//! Note the asymmetry: the first cycle remembers the union, later cycles
//! remember only the caller-supplied box.

use socnav_types::BoundingBox;

/// Per-layer memory of the previous cycle's rectangle.
#[derive(Debug, Clone, Default)]
pub struct DirtyRegionTracker {
    previous: BoundingBox,
    has_previous: bool,
}

impl DirtyRegionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expand `caller` in place so it covers `current` and last cycle's
    /// remembered rectangle.
    pub fn fold(&mut self, current: &BoundingBox, caller: &mut BoundingBox) {
        let supplied = *caller;
        caller.expand_to_box(current);

        if !self.has_previous {
            self.previous = *caller;
            self.has_previous = true;
            return;
        }

        let stale = std::mem::replace(&mut self.previous, supplied);
        caller.expand_to_box(&stale);
    }

    /// The rectangle that will be folded into the next cycle, if any.
    pub fn previous(&self) -> Option<BoundingBox> {
        self.has_previous.then_some(self.previous)
    }

    /// Forget history; the next [`fold`][Self::fold] behaves as the first.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> BoundingBox {
        BoundingBox::new(min_x, min_y, max_x, max_y)
    }

    #[test]
    fn first_fold_returns_union_and_remembers_it() {
        let mut tracker = DirtyRegionTracker::new();
        assert!(tracker.previous().is_none());

        let people = b(5.0, 5.0, 6.0, 6.0);
        let mut caller = b(0.0, 0.0, 1.0, 1.0);
        tracker.fold(&people, &mut caller);

        assert_eq!(caller, b(0.0, 0.0, 6.0, 6.0));
        assert_eq!(tracker.previous(), Some(b(0.0, 0.0, 6.0, 6.0)));
    }

    #[test]
    fn second_cycle_still_covers_first_caller_box() {
        let mut tracker = DirtyRegionTracker::new();

        let b1 = b(0.0, 0.0, 2.0, 2.0);
        let mut caller = b1;
        tracker.fold(&b(1.0, 1.0, 1.0, 1.0), &mut caller);

        // Disjoint second-cycle caller box; people moved far away.
        let b2 = b(10.0, 10.0, 12.0, 12.0);
        let mut caller = b2;
        tracker.fold(&b(20.0, 20.0, 20.0, 20.0), &mut caller);

        assert!(caller.contains(&b1), "stale region not invalidated: {caller:?}");
        assert!(caller.contains(&b2));
        assert!(caller.contains(&b(20.0, 20.0, 20.0, 20.0)));
    }

    #[test]
    fn later_cycles_remember_the_supplied_box() {
        let mut tracker = DirtyRegionTracker::new();
        let mut caller = b(0.0, 0.0, 1.0, 1.0);
        tracker.fold(&BoundingBox::empty(), &mut caller);

        let supplied = b(3.0, 3.0, 4.0, 4.0);
        let mut caller = supplied;
        tracker.fold(&b(8.0, 8.0, 9.0, 9.0), &mut caller);

        assert_eq!(caller, b(0.0, 0.0, 9.0, 9.0));
        // The people box of this cycle is not part of the remembered box.
        assert_eq!(tracker.previous(), Some(supplied));

        let mut caller = b(3.0, 3.0, 4.0, 4.0);
        tracker.fold(&BoundingBox::empty(), &mut caller);
        assert_eq!(caller, supplied);
    }

    #[test]
    fn empty_inputs_stay_empty() {
        let mut tracker = DirtyRegionTracker::new();
        for _ in 0..3 {
            let mut caller = BoundingBox::empty();
            tracker.fold(&BoundingBox::empty(), &mut caller);
            assert!(caller.is_empty());
        }
    }

    #[test]
    fn reset_restores_first_cycle_behaviour() {
        let mut tracker = DirtyRegionTracker::new();
        let mut caller = b(0.0, 0.0, 1.0, 1.0);
        tracker.fold(&BoundingBox::empty(), &mut caller);
        tracker.reset();
        assert!(tracker.previous().is_none());

        let mut caller = b(5.0, 5.0, 6.0, 6.0);
        tracker.fold(&b(7.0, 7.0, 7.0, 7.0), &mut caller);
        assert_eq!(caller, b(5.0, 5.0, 7.0, 7.0));
        assert_eq!(tracker.previous(), Some(b(5.0, 5.0, 7.0, 7.0)));
    }
}
