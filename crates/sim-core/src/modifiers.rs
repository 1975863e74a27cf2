//! Effect modifier bundles.
//!
//! Programs and upgrades each carry an [`EffectModifiers`] value. A company's
//! bundle for one tick is the composition of all of them, starting from
//! [`EffectModifiers::identity`]. Composition multiplies the multiplicative
//! fields and sums the additive ones, so it is associative and order-free.

use serde::{Deserialize, Serialize};

/// Field addressed by a single catalog effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModifierTarget {
    Demand,
    Capacity,
    Quality,
    Marketing,
    VariableCost,
    FixedCost,
    LabourCost,
    QualityAdd,
    AwarenessAdd,
    ReputationAdd,
    EfficiencyAdd,
}

impl ModifierTarget {
    /// Whether magnitudes for this target are multipliers (vs. additive deltas).
    pub fn is_multiplicative(self) -> bool {
        !matches!(
            self,
            ModifierTarget::QualityAdd
                | ModifierTarget::AwarenessAdd
                | ModifierTarget::ReputationAdd
                | ModifierTarget::EfficiencyAdd
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectModifiers {
    pub demand: f64,
    pub capacity: f64,
    pub quality: f64,
    pub marketing: f64,
    pub variable_cost: f64,
    pub fixed_cost: f64,
    pub labour_cost: f64,
    pub quality_add: f64,
    pub awareness_add: f64,
    pub reputation_add: f64,
    pub efficiency_add: f64,
}

impl Default for EffectModifiers {
    fn default() -> Self {
        Self::identity()
    }
}

impl EffectModifiers {
    pub const fn identity() -> Self {
        Self {
            demand: 1.0,
            capacity: 1.0,
            quality: 1.0,
            marketing: 1.0,
            variable_cost: 1.0,
            fixed_cost: 1.0,
            labour_cost: 1.0,
            quality_add: 0.0,
            awareness_add: 0.0,
            reputation_add: 0.0,
            efficiency_add: 0.0,
        }
    }

    /// A bundle that changes only `target`.
    pub fn single(target: ModifierTarget, magnitude: f64) -> Self {
        let mut m = Self::identity();
        match target {
            ModifierTarget::Demand => m.demand = magnitude,
            ModifierTarget::Capacity => m.capacity = magnitude,
            ModifierTarget::Quality => m.quality = magnitude,
            ModifierTarget::Marketing => m.marketing = magnitude,
            ModifierTarget::VariableCost => m.variable_cost = magnitude,
            ModifierTarget::FixedCost => m.fixed_cost = magnitude,
            ModifierTarget::LabourCost => m.labour_cost = magnitude,
            ModifierTarget::QualityAdd => m.quality_add = magnitude,
            ModifierTarget::AwarenessAdd => m.awareness_add = magnitude,
            ModifierTarget::ReputationAdd => m.reputation_add = magnitude,
            ModifierTarget::EfficiencyAdd => m.efficiency_add = magnitude,
        }
        m
    }

    #[must_use]
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            demand: self.demand * other.demand,
            capacity: self.capacity * other.capacity,
            quality: self.quality * other.quality,
            marketing: self.marketing * other.marketing,
            variable_cost: self.variable_cost * other.variable_cost,
            fixed_cost: self.fixed_cost * other.fixed_cost,
            labour_cost: self.labour_cost * other.labour_cost,
            quality_add: self.quality_add + other.quality_add,
            awareness_add: self.awareness_add + other.awareness_add,
            reputation_add: self.reputation_add + other.reputation_add,
            efficiency_add: self.efficiency_add + other.efficiency_add,
        }
    }

    /// Replace non-finite fields with their identity values.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let id = Self::identity();
        let f = |v: f64, d: f64| if v.is_finite() { v } else { d };
        Self {
            demand: f(self.demand, id.demand),
            capacity: f(self.capacity, id.capacity),
            quality: f(self.quality, id.quality),
            marketing: f(self.marketing, id.marketing),
            variable_cost: f(self.variable_cost, id.variable_cost),
            fixed_cost: f(self.fixed_cost, id.fixed_cost),
            labour_cost: f(self.labour_cost, id.labour_cost),
            quality_add: f(self.quality_add, 0.0),
            awareness_add: f(self.awareness_add, 0.0),
            reputation_add: f(self.reputation_add, 0.0),
            efficiency_add: f(self.efficiency_add, 0.0),
        }
    }
}

impl<'a> FromIterator<&'a EffectModifiers> for EffectModifiers {
    fn from_iter<I: IntoIterator<Item = &'a EffectModifiers>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::identity(), |acc, m| acc.compose(m))
    }
}

impl FromIterator<EffectModifiers> for EffectModifiers {
    fn from_iter<I: IntoIterator<Item = EffectModifiers>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::identity(), |acc, m| acc.compose(&m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: &EffectModifiers, b: &EffectModifiers) -> bool {
        let pairs = [
            (a.demand, b.demand),
            (a.capacity, b.capacity),
            (a.quality, b.quality),
            (a.marketing, b.marketing),
            (a.variable_cost, b.variable_cost),
            (a.fixed_cost, b.fixed_cost),
            (a.labour_cost, b.labour_cost),
            (a.quality_add, b.quality_add),
            (a.awareness_add, b.awareness_add),
            (a.reputation_add, b.reputation_add),
            (a.efficiency_add, b.efficiency_add),
        ];
        pairs.iter().all(|(x, y)| (x - y).abs() < 1e-9)
    }

    fn arb_modifiers() -> impl Strategy<Value = EffectModifiers> {
        (
            (0.5f64..1.5, 0.5f64..1.5, 0.5f64..1.5, 0.5f64..1.5),
            (-0.2f64..0.2, -0.2f64..0.2),
        )
            .prop_map(|((d, c, q, v), (qa, ra))| EffectModifiers {
                demand: d,
                capacity: c,
                quality: q,
                variable_cost: v,
                quality_add: qa,
                reputation_add: ra,
                ..EffectModifiers::identity()
            })
    }

    #[test]
    fn single_targets_one_field() {
        let m = EffectModifiers::single(ModifierTarget::Capacity, 1.2);
        assert_eq!(m.capacity, 1.2);
        assert_eq!(m.demand, 1.0);
        let a = EffectModifiers::single(ModifierTarget::ReputationAdd, 0.05);
        assert_eq!(a.reputation_add, 0.05);
        assert!(!ModifierTarget::ReputationAdd.is_multiplicative());
    }

    #[test]
    fn fold_composes_all() {
        let parts = [
            EffectModifiers::single(ModifierTarget::Capacity, 1.1),
            EffectModifiers::single(ModifierTarget::Capacity, 1.2),
            EffectModifiers::single(ModifierTarget::QualityAdd, 0.1),
            EffectModifiers::single(ModifierTarget::QualityAdd, 0.05),
        ];
        let m: EffectModifiers = parts.iter().collect();
        assert!((m.capacity - 1.32).abs() < 1e-12);
        assert!((m.quality_add - 0.15).abs() < 1e-12);
    }

    #[test]
    fn sanitized_drops_nan() {
        let mut m = EffectModifiers::identity();
        m.demand = f64::NAN;
        m.awareness_add = f64::INFINITY;
        let s = m.sanitized();
        assert_eq!(s.demand, 1.0);
        assert_eq!(s.awareness_add, 0.0);
    }

    proptest! {
        #[test]
        fn identity_is_neutral(m in arb_modifiers()) {
            prop_assert!(close(&m.compose(&EffectModifiers::identity()), &m));
            prop_assert!(close(&EffectModifiers::identity().compose(&m), &m));
        }

        #[test]
        fn compose_is_associative(a in arb_modifiers(), b in arb_modifiers(), c in arb_modifiers()) {
            let left = a.compose(&b).compose(&c);
            let right = a.compose(&b.compose(&c));
            prop_assert!(close(&left, &right));
        }
    }
}
