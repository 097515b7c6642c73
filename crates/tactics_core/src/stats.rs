//! Unit statistics and stat modifiers.
//!
//! A unit carries an immutable base [`Stats`] and a current snapshot. The
//! resource pools (HP, MP, Stamina) in the snapshot move with damage, healing
//! and costs; the combat stats are recomputed from base plus every active
//! [`StatModifier`].

use serde::{Deserialize, Serialize};

use crate::math::{fixed_decimal, scale, Fixed};

/// Full stat block. Missing fields deserialize to their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    /// Hit points.
    pub hp: u32,
    /// Magic points.
    pub mp: u32,
    /// Stamina.
    pub stamina: u32,
    /// Physical attack.
    pub atk: u32,
    /// Physical defense.
    pub def: u32,
    /// Magical attack.
    pub matk: u32,
    /// Magical defense.
    pub mdef: u32,
    /// Speed; fills the ATB gauge.
    pub spd: u32,
    /// Movement points per turn.
    pub mov: u32,
    /// Chance to hit with basic attacks, 0-100.
    pub hit_chance: u32,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            hp: 100,
            mp: 50,
            stamina: 50,
            atk: 20,
            def: 10,
            matk: 15,
            mdef: 10,
            spd: 10,
            mov: 4,
            hit_chance: 95,
        }
    }
}

impl Stats {
    /// Read a combat stat.
    #[must_use]
    pub const fn get(&self, stat: StatKind) -> u32 {
        match stat {
            StatKind::Atk => self.atk,
            StatKind::Def => self.def,
            StatKind::Matk => self.matk,
            StatKind::Mdef => self.mdef,
            StatKind::Spd => self.spd,
            StatKind::Mov => self.mov,
            StatKind::HitChance => self.hit_chance,
        }
    }

    fn set(&mut self, stat: StatKind, value: u32) {
        let slot = match stat {
            StatKind::Atk => &mut self.atk,
            StatKind::Def => &mut self.def,
            StatKind::Matk => &mut self.matk,
            StatKind::Mdef => &mut self.mdef,
            StatKind::Spd => &mut self.spd,
            StatKind::Mov => &mut self.mov,
            StatKind::HitChance => &mut self.hit_chance,
        };
        *slot = value;
    }

    /// Recompute combat stats from `base` plus `modifiers`, keeping this
    /// snapshot's resource pools.
    ///
    /// Flat amounts are summed onto the base first, then the product of the
    /// multipliers is applied, rounding down. Combat stats floor at 0 and hit
    /// chance is clamped to 0-100. Resource pools are clamped to the base
    /// maximums.
    #[must_use]
    pub fn recomputed<'a>(
        &self,
        base: &Stats,
        modifiers: impl IntoIterator<Item = &'a StatModifier>,
    ) -> Stats {
        let mut deltas = [0i64; StatKind::ALL.len()];
        let mut factors = [Fixed::ONE; StatKind::ALL.len()];
        for modifier in modifiers {
            let i = modifier.stat.index();
            deltas[i] += i64::from(modifier.amount);
            factors[i] = factors[i].saturating_mul(modifier.multiplier);
        }

        let mut next = *base;
        for stat in StatKind::ALL {
            let i = stat.index();
            let value = scale(i64::from(base.get(stat)) + deltas[i], factors[i]).max(0);
            let value = u32::try_from(value).unwrap_or(u32::MAX);
            next.set(stat, value);
        }
        next.hit_chance = next.hit_chance.min(100);

        next.hp = self.hp.min(base.hp);
        next.mp = self.mp.min(base.mp);
        next.stamina = self.stamina.min(base.stamina);
        next
    }
}

/// Stats that modifiers can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatKind {
    /// Physical attack.
    Atk,
    /// Physical defense.
    Def,
    /// Magical attack.
    Matk,
    /// Magical defense.
    Mdef,
    /// Speed.
    Spd,
    /// Movement points.
    Mov,
    /// Hit chance percentage.
    HitChance,
}

impl StatKind {
    /// Every modifiable stat.
    pub const ALL: [StatKind; 7] = [
        StatKind::Atk,
        StatKind::Def,
        StatKind::Matk,
        StatKind::Mdef,
        StatKind::Spd,
        StatKind::Mov,
        StatKind::HitChance,
    ];

    const fn index(self) -> usize {
        self as usize
    }
}

/// Change to one stat: a flat amount and a multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatModifier {
    /// Stat being changed.
    pub stat: StatKind,
    /// Signed amount added to the base value.
    #[serde(default)]
    pub amount: i32,
    /// Factor applied after the flat amounts (`1.0` leaves the stat alone).
    #[serde(with = "fixed_decimal", default = "unit_multiplier")]
    pub multiplier: Fixed,
}

const fn unit_multiplier() -> Fixed {
    Fixed::ONE
}

impl StatModifier {
    /// Flat modifier.
    #[must_use]
    pub const fn new(stat: StatKind, amount: i32) -> Self {
        Self {
            stat,
            amount,
            multiplier: Fixed::ONE,
        }
    }

    /// Pure multiplier, e.g. `0.5` halves the stat.
    #[must_use]
    pub const fn scaled(stat: StatKind, multiplier: Fixed) -> Self {
        Self {
            stat,
            amount: 0,
            multiplier,
        }
    }

    /// Set the multiplier.
    #[must_use]
    pub const fn with_multiplier(mut self, multiplier: Fixed) -> Self {
        self.multiplier = multiplier;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recompute_applies_modifiers() {
        let base = Stats::default();
        let current = base;
        let mods = [
            StatModifier::new(StatKind::Atk, 5),
            StatModifier::new(StatKind::Atk, 3),
            StatModifier::new(StatKind::Def, -4),
        ];
        let next = current.recomputed(&base, &mods);
        assert_eq!(next.atk, base.atk + 8);
        assert_eq!(next.def, base.def - 4);
        assert_eq!(next.spd, base.spd);
    }

    #[test]
    fn test_recompute_applies_multipliers_after_flat() {
        let base = Stats {
            atk: 20,
            spd: 15,
            ..Stats::default()
        };
        let mods = [
            StatModifier::new(StatKind::Atk, 10),
            StatModifier::scaled(StatKind::Atk, Fixed::from_num(1.5)),
            StatModifier::scaled(StatKind::Spd, Fixed::from_num(0.5)),
        ];
        let next = base.recomputed(&base, &mods);
        assert_eq!(next.atk, 45);
        // 7.5 rounds down.
        assert_eq!(next.spd, 7);
        assert_eq!(next.def, base.def);
    }

    #[test]
    fn test_modifier_multiplier_defaults_in_ron() {
        let flat: StatModifier = ron::from_str("(stat: Def, amount: -3)").unwrap();
        assert_eq!(flat, StatModifier::new(StatKind::Def, -3));

        let halved: StatModifier = ron::from_str("(stat: Mov, multiplier: 0.5)").unwrap();
        assert_eq!(halved, StatModifier::scaled(StatKind::Mov, Fixed::from_num(0.5)));
    }

    #[test]
    fn test_recompute_floors_and_clamps() {
        let base = Stats {
            def: 3,
            hit_chance: 90,
            ..Stats::default()
        };
        let mods = [
            StatModifier::new(StatKind::Def, -10),
            StatModifier::new(StatKind::HitChance, 50),
        ];
        let next = base.recomputed(&base, &mods);
        assert_eq!(next.def, 0);
        assert_eq!(next.hit_chance, 100);
    }

    #[test]
    fn test_recompute_keeps_resources() {
        let base = Stats::default();
        let mut current = base;
        current.hp = 40;
        current.mp = 7;
        let next = current.recomputed(&base, &[]);
        assert_eq!(next.hp, 40);
        assert_eq!(next.mp, 7);
        assert_eq!(next.stamina, base.stamina);
    }
}
