use crate::events::EventClass;

/// Event classes currently subscribed.
///
/// Mutated only by the lifecycle methods on `MotionEngine`; the set of
/// registered physical sensors is always derivable from these flags plus the
/// heading strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActiveSubscriptions {
    pub accel: bool,
    pub orientation: bool,
    pub heading: bool,
}

impl ActiveSubscriptions {
    pub fn any_active(&self) -> bool {
        self.accel || self.orientation || self.heading
    }

    pub fn contains(&self, class: EventClass) -> bool {
        match class {
            EventClass::Accel => self.accel,
            EventClass::Orientation => self.orientation,
            EventClass::Heading => self.heading,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
