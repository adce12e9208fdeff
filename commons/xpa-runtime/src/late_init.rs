//! Back-filling unset desired fields from observed state.

use std::collections::{BTreeMap, HashMap};

/// Whether a desired-state field counts as unset.
pub trait Unset {
    fn is_unset(&self) -> bool;
}

impl<T> Unset for Option<T> {
    fn is_unset(&self) -> bool {
        self.is_none()
    }
}

impl<T> Unset for Vec<T> {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl Unset for String {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> Unset for BTreeMap<K, V> {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V, S> Unset for HashMap<K, V, S> {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl Unset for bool {
    fn is_unset(&self) -> bool {
        !*self
    }
}

macro_rules! unset_numbers {
    ($($t:ty),*) => {
        $(impl Unset for $t {
            fn is_unset(&self) -> bool {
                *self == 0 as $t
            }
        })*
    };
}

unset_numbers!(i32, i64, u32, u64, f64);

/// An observed value is only adopted when it carries information.
pub trait Observed {
    fn is_informative(&self) -> bool;
}

impl<T: Observed> Observed for Option<T> {
    fn is_informative(&self) -> bool {
        self.as_ref().is_some_and(Observed::is_informative)
    }
}

impl Observed for String {
    fn is_informative(&self) -> bool {
        !self.is_empty()
    }
}

impl<T> Observed for Vec<T> {
    fn is_informative(&self) -> bool {
        !self.is_empty()
    }
}

impl<K, V> Observed for BTreeMap<K, V> {
    fn is_informative(&self) -> bool {
        !self.is_empty()
    }
}

macro_rules! observed_always {
    ($($t:ty),*) => {
        $(impl Observed for $t {
            fn is_informative(&self) -> bool {
                true
            }
        })*
    };
}

observed_always!(bool, i32, i64, u32, u64, f64);

/// Assigns observed values into unset targets and remembers whether any
/// assignment happened.
#[derive(Debug, Default)]
pub struct LateInitializer {
    changed: bool,
}

impl LateInitializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `observed` into `target` when `target` is unset.
    pub fn field<T: Unset + Observed>(&mut self, target: &mut T, observed: T) {
        if target.is_unset() && observed.is_informative() {
            *target = observed;
            self.changed = true;
        }
    }

    /// Adopt a whole observed struct when the target is absent.
    pub fn whole<T>(&mut self, target: &mut Option<T>, observed: Option<T>) {
        if target.is_none() && observed.is_some() {
            *target = observed;
            self.changed = true;
        }
    }

    /// Materialize a nested optional struct so leaf fields can be assigned.
    /// The container is removed again if nothing was assigned into it.
    pub fn nested<T: Default>(
        &mut self,
        target: &mut Option<T>,
        fill: impl FnOnce(&mut LateInitializer, &mut T),
    ) {
        let was_none = target.is_none();
        let mut inner = LateInitializer::new();
        let value = target.get_or_insert_with(T::default);
        fill(&mut inner, value);
        if inner.changed {
            self.changed = true;
        } else if was_none {
            *target = None;
        }
    }

    /// Record an assignment made outside the helpers.
    pub fn mark(&mut self) {
        self.changed = true;
    }

    pub fn changed(&self) -> bool {
        self.changed
    }
}
