//! Named, range-checked parameter sets.
//!
//! Every formula and every effect stage declares its parameters as a static
//! table of [`ParamSpec`]s. A [`ParamSet`] holds the live values for one
//! instance in a fixed array indexed by table position, so the audio path reads
//! parameters by constant index and never touches a map.
//!
//! Out-of-range input is clamped into `[min, max]`; NaN falls back to the default.

use core::fmt;

/// Most parameters any formula or stage declares.
pub const MAX_PARAMS: usize = 8;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: f32,
    pub min: f32,
    pub max: f32,
}

impl ParamSpec {
    pub const fn new(name: &'static str, default: f32, min: f32, max: f32) -> Self {
        Self { name, default, min, max }
    }

    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            self.default
        } else {
            value.clamp(self.min, self.max)
        }
    }
}

/// Mixer-level output gain, shared by every formula (always index 0).
pub const GAIN: ParamSpec = ParamSpec::new("gain", 0.2, 0.0, 1.0);

/// Dry/wet blend shared by the stages that have one.
pub const MIX: ParamSpec = ParamSpec::new("mix", 0.3, 0.0, 1.0);

/// Outcome of assigning a value by name.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Assign {
    /// No parameter with that name.
    Unknown,
    /// The clamped value equals the current one.
    Unchanged(usize),
    /// The value at this index changed.
    Changed(usize),
}

impl Assign {
    #[inline]
    pub fn is_known(self) -> bool {
        !matches!(self, Assign::Unknown)
    }

    #[inline]
    pub fn changed(self) -> Option<usize> {
        match self {
            Assign::Changed(i) => Some(i),
            _ => None,
        }
    }
}

/// Live values for one parameter table.
#[derive(Clone)]
pub struct ParamSet {
    specs: &'static [ParamSpec],
    values: [f32; MAX_PARAMS],
}

impl ParamSet {
    pub fn new(specs: &'static [ParamSpec]) -> Self {
        debug_assert!(specs.len() <= MAX_PARAMS);
        let mut values = [0.0; MAX_PARAMS];
        for (v, s) in values.iter_mut().zip(specs) {
            *v = s.default;
        }
        Self { specs, values }
    }

    #[inline]
    pub fn specs(&self) -> &'static [ParamSpec] {
        self.specs
    }

    #[inline]
    pub fn get(&self, index: usize) -> f32 {
        self.values[index]
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.specs.iter().position(|s| s.name == name)
    }

    pub fn value_of(&self, name: &str) -> Option<f32> {
        self.index_of(name).map(|i| self.values[i])
    }

    pub fn set(&mut self, name: &str, value: f32) -> Assign {
        match self.index_of(name) {
            Some(i) => self.set_index(i, value),
            None => Assign::Unknown,
        }
    }

    pub fn set_index(&mut self, index: usize, value: f32) -> Assign {
        let v = self.specs[index].clamp(value);
        if v.to_bits() == self.values[index].to_bits() {
            Assign::Unchanged(index)
        } else {
            self.values[index] = v;
            Assign::Changed(index)
        }
    }

    /// `(name, value)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        self.specs.iter().zip(self.values.iter()).map(|(s, v)| (s.name, *v))
    }
}

impl fmt::Debug for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Look up the static name for `key` in a table, so commands can carry `&'static str`.
pub fn static_name(specs: &'static [ParamSpec], key: &str) -> Option<&'static str> {
    specs.iter().find(|s| s.name == key).map(|s| s.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    static TABLE: [ParamSpec; 2] = [GAIN, ParamSpec::new("freq", 110.0, 20.0, 2000.0)];

    #[test]
    fn defaults_are_loaded() {
        let p = ParamSet::new(&TABLE);
        assert_eq!(p.get(0), 0.2);
        assert_eq!(p.value_of("freq"), Some(110.0));
        assert_eq!(p.value_of("nope"), None);
    }

    #[test]
    fn values_are_clamped_not_rejected() {
        let mut p = ParamSet::new(&TABLE);
        assert_eq!(p.set("freq", 1.0e6), Assign::Changed(1));
        assert_eq!(p.get(1), 2000.0);
        assert_eq!(p.set("freq", -5.0), Assign::Changed(1));
        assert_eq!(p.get(1), 20.0);
        assert_eq!(p.set("freq", f32::NAN), Assign::Changed(1));
        assert_eq!(p.get(1), 110.0);
    }

    #[test]
    fn repeated_assignment_reports_unchanged() {
        let mut p = ParamSet::new(&TABLE);
        assert_eq!(p.set("gain", 0.5), Assign::Changed(0));
        assert_eq!(p.set("gain", 0.5), Assign::Unchanged(0));
        assert_eq!(p.set("bogus", 0.5), Assign::Unknown);
        assert!(!Assign::Unknown.is_known());
    }

    #[test]
    fn static_name_resolves_table_entries() {
        assert_eq!(static_name(&TABLE, "freq"), Some("freq"));
        assert_eq!(static_name(&TABLE, "fc"), None);
    }
}
