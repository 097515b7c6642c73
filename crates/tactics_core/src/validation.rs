//! Command validation as an ordered chain of independent rules.
//!
//! Rules run in order and the first failure wins. None of them mutate the
//! combat, so validating a command is always safe to repeat.

use tracing::trace;

use crate::combat::Combat;
use crate::command::Action;
use crate::error::ValidationError;
use crate::grid::Position;
use crate::ids::{SkillId, UnitId};
use crate::inventory::{InventoryProvider, ItemTarget};
use crate::skill::{Skill, TargetFilter};
use crate::unit::Unit;

/// Everything a rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    /// Combat being acted on.
    pub combat: &'a Combat,
    /// Action under validation.
    pub action: &'a Action,
}

impl<'a> ValidationContext<'a> {
    /// The acting unit, or `ActorNotFound`.
    pub fn actor(&self) -> Result<&'a Unit, ValidationError> {
        let id = self.action.actor();
        self.combat
            .unit(id)
            .ok_or_else(|| ValidationError::ActorNotFound(id.clone()))
    }
}

/// A single validation rule.
pub trait ValidationRule {
    /// Rule name for logs.
    fn name(&self) -> &'static str;

    /// Check the action. Must not mutate anything.
    fn check(&self, ctx: &ValidationContext<'_>) -> Result<(), ValidationError>;
}

/// Ordered, short-circuiting list of rules.
pub struct ValidationChain {
    rules: Vec<Box<dyn ValidationRule + Send + Sync>>,
}

impl std::fmt::Debug for ValidationChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.rules.iter().map(|r| r.name())).finish()
    }
}

impl Default for ValidationChain {
    fn default() -> Self {
        Self::standard()
    }
}

impl ValidationChain {
    /// An empty chain that accepts everything.
    #[must_use]
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Status, resources, range, then target legality.
    #[must_use]
    pub fn standard() -> Self {
        Self::empty()
            .with_rule(StatusBlockingRule)
            .with_rule(ResourceCostRule)
            .with_rule(RangeRule)
            .with_rule(TargetLegalityRule)
    }

    /// Append a rule.
    #[must_use]
    pub fn with_rule(mut self, rule: impl ValidationRule + Send + Sync + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Rule names in evaluation order.
    pub fn rule_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|r| r.name())
    }

    /// Run every rule until one fails.
    pub fn validate(&self, combat: &Combat, action: &Action) -> Result<(), ValidationError> {
        let ctx = ValidationContext { combat, action };
        for rule in &self.rules {
            if let Err(err) = rule.check(&ctx) {
                trace!(rule = rule.name(), action = action.name(), %err, "Validation failed");
                return Err(err);
            }
        }
        Ok(())
    }
}

/// Actor must exist, be alive, and not be blocked by a status. Wait only
/// needs the actor to exist.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusBlockingRule;

impl ValidationRule for StatusBlockingRule {
    fn name(&self) -> &'static str {
        "status_blocking"
    }

    fn check(&self, ctx: &ValidationContext<'_>) -> Result<(), ValidationError> {
        let actor = ctx.actor()?;
        if matches!(ctx.action, Action::Wait { .. }) {
            return Ok(());
        }
        if actor.is_eliminated() {
            return Err(ValidationError::ActorEliminated(actor.id().clone()));
        }
        match ctx.action {
            Action::Move { .. } | Action::Flee { .. } if !actor.can_move() => {
                Err(ValidationError::MovementBlocked(actor.id().clone()))
            }
            Action::Attack { .. } | Action::UseItem { .. } if !actor.can_act() => {
                Err(ValidationError::ActionBlocked(actor.id().clone()))
            }
            Action::UseSkill { .. } => {
                if !actor.can_act() {
                    Err(ValidationError::ActionBlocked(actor.id().clone()))
                } else if !actor.can_use_skills() {
                    Err(ValidationError::Silenced(actor.id().clone()))
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }
}

/// Action budget, skill costs and cooldowns, item stock.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceCostRule;

impl ValidationRule for ResourceCostRule {
    fn name(&self) -> &'static str {
        "resource_cost"
    }

    fn check(&self, ctx: &ValidationContext<'_>) -> Result<(), ValidationError> {
        let actor = ctx.actor()?;
        let needs_action = !matches!(ctx.action, Action::Move { .. } | Action::Wait { .. });
        if needs_action && actor.actions_remaining() == 0 {
            return Err(ValidationError::NoActionsLeft(actor.id().clone()));
        }

        match ctx.action {
            Action::UseSkill { skill, .. } => {
                let skill = known_skill(actor, skill)?;
                if actor.mp() < skill.mp_cost {
                    return Err(ValidationError::InsufficientMp {
                        required: skill.mp_cost,
                        available: actor.mp(),
                    });
                }
                if actor.stamina() < skill.stamina_cost {
                    return Err(ValidationError::InsufficientStamina {
                        required: skill.stamina_cost,
                        available: actor.stamina(),
                    });
                }
                if !skill.is_ready() {
                    return Err(ValidationError::OnCooldown {
                        skill: skill.id.clone(),
                        remaining: skill.cooldown,
                    });
                }
                Ok(())
            }
            Action::UseItem { item, .. } => {
                if ctx.combat.item(item).is_none() {
                    return Err(ValidationError::UnknownItem(item.clone()));
                }
                let in_stock = ctx
                    .combat
                    .inventory(actor.team_id())
                    .is_some_and(|bag| bag.has_item(item));
                if in_stock {
                    Ok(())
                } else {
                    Err(ValidationError::ItemUnavailable(item.clone()))
                }
            }
            _ => Ok(()),
        }
    }
}

fn known_skill<'a>(actor: &'a Unit, id: &SkillId) -> Result<&'a Skill, ValidationError> {
    actor
        .skill(id)
        .ok_or_else(|| ValidationError::UnknownSkill(id.clone()))
}

/// Reachability for moves, Manhattan range for everything targeted.
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeRule;

impl RangeRule {
    fn within(
        from: Option<Position>,
        target: Option<&Unit>,
        range: u32,
    ) -> Result<(), ValidationError> {
        // Missing targets and positions are reported by the legality rule.
        let (Some(from), Some(to)) = (from, target.and_then(Unit::position)) else {
            return Ok(());
        };
        let distance = from.manhattan(to);
        if distance > range {
            return Err(ValidationError::OutOfRange { distance, range });
        }
        Ok(())
    }
}

impl ValidationRule for RangeRule {
    fn name(&self) -> &'static str {
        "range"
    }

    fn check(&self, ctx: &ValidationContext<'_>) -> Result<(), ValidationError> {
        let actor = ctx.actor()?;
        let combat = ctx.combat;
        match ctx.action {
            Action::Move { destination, .. } => {
                if !combat.grid().in_bounds(*destination) {
                    return Err(ValidationError::DestinationOutOfBounds(*destination));
                }
                let Some(start) = actor.position() else {
                    return Err(ValidationError::InvalidTarget {
                        target: actor.id().clone(),
                        reason: "actor has no position".into(),
                    });
                };
                let occupied = combat.occupied_positions(Some(actor.id()));
                combat
                    .pathfinder()
                    .path_within_budget(
                        combat.grid(),
                        start,
                        *destination,
                        actor.movement_remaining(),
                        &occupied,
                    )
                    .map(|_| ())
                    .map_err(ValidationError::Unreachable)
            }
            Action::Attack { target, .. } => {
                Self::within(actor.position(), combat.unit(target), actor.weapon_range())
            }
            Action::UseSkill { skill, targets, .. } => {
                let skill = known_skill(actor, skill)?;
                targets
                    .iter()
                    .try_for_each(|t| Self::within(actor.position(), combat.unit(t), skill.range))
            }
            Action::UseItem { item, target, .. } => match combat.item(item) {
                Some(def) => Self::within(actor.position(), combat.unit(target), def.range),
                None => Ok(()),
            },
            Action::Flee { .. } | Action::Wait { .. } => Ok(()),
        }
    }
}

/// Targets must exist and fit the action's target class.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetLegalityRule;

impl TargetLegalityRule {
    fn living_target<'a>(combat: &'a Combat, id: &UnitId) -> Result<&'a Unit, ValidationError> {
        let unit = combat
            .unit(id)
            .ok_or_else(|| ValidationError::TargetNotFound(id.clone()))?;
        if unit.is_eliminated() {
            return Err(ValidationError::TargetEliminated(id.clone()));
        }
        Ok(unit)
    }

    fn invalid(target: &UnitId, reason: &str) -> ValidationError {
        ValidationError::InvalidTarget {
            target: target.clone(),
            reason: reason.to_string(),
        }
    }
}

impl ValidationRule for TargetLegalityRule {
    fn name(&self) -> &'static str {
        "target_legality"
    }

    fn check(&self, ctx: &ValidationContext<'_>) -> Result<(), ValidationError> {
        let actor = ctx.actor()?;
        let combat = ctx.combat;
        match ctx.action {
            Action::Attack { target, .. } => {
                let unit = Self::living_target(combat, target)?;
                if unit.team_id() == actor.team_id() {
                    return Err(Self::invalid(target, "cannot attack an ally"));
                }
                Ok(())
            }
            Action::UseSkill { skill, targets, .. } => {
                let skill = known_skill(actor, skill)?;
                if targets.is_empty() {
                    return if skill.target_filter == TargetFilter::SelfOnly {
                        Ok(())
                    } else {
                        Err(ValidationError::NoTarget)
                    };
                }
                for target in targets {
                    let unit = Self::living_target(combat, target)?;
                    let allowed = match skill.target_filter {
                        TargetFilter::Enemies => unit.team_id() != actor.team_id(),
                        TargetFilter::Allies => unit.team_id() == actor.team_id(),
                        TargetFilter::SelfOnly => unit.id() == actor.id(),
                        TargetFilter::All => true,
                    };
                    if !allowed {
                        return Err(Self::invalid(target, "skill cannot target this unit"));
                    }
                }
                Ok(())
            }
            Action::UseItem { item, target, .. } => {
                let Some(def) = combat.item(item) else {
                    return Err(ValidationError::UnknownItem(item.clone()));
                };
                match def.effect.target() {
                    ItemTarget::LivingAlly => {
                        let unit = Self::living_target(combat, target)?;
                        if unit.team_id() != actor.team_id() {
                            return Err(Self::invalid(target, "item only works on allies"));
                        }
                    }
                    ItemTarget::LivingEnemy => {
                        let unit = Self::living_target(combat, target)?;
                        if unit.team_id() == actor.team_id() {
                            return Err(Self::invalid(target, "item only works on enemies"));
                        }
                    }
                    ItemTarget::EliminatedAlly => {
                        let unit = combat
                            .unit(target)
                            .ok_or_else(|| ValidationError::TargetNotFound(target.clone()))?;
                        if unit.team_id() != actor.team_id() {
                            return Err(Self::invalid(target, "item only works on allies"));
                        }
                        if unit.is_alive() {
                            return Err(Self::invalid(target, "target is not eliminated"));
                        }
                    }
                }
                Ok(())
            }
            Action::Flee { .. } => {
                if !combat.config().allow_flee {
                    return Err(ValidationError::FleeNotAllowed);
                }
                if combat.has_fled(actor.team_id()) {
                    return Err(ValidationError::AlreadyFled(actor.team_id().clone()));
                }
                Ok(())
            }
            Action::Move { .. } | Action::Wait { .. } => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CombatConfig;
    use crate::grid::Grid;
    use crate::ids::TeamId;
    use crate::inventory::{Bag, ItemCatalog};
    use crate::skill::SkillCategory;
    use crate::stats::Stats;
    use crate::status::{Status, StatusType};
    use crate::team::Team;

    fn p(x: u32, y: u32) -> Position {
        Position::new(x, y)
    }

    fn combat_with(config: CombatConfig) -> Combat {
        let red = TeamId::new("red");
        let blue = TeamId::new("blue");
        let bolt = Skill::new("bolt", "Bolt", SkillCategory::Magic, 3, TargetFilter::Enemies)
            .with_costs(20, 0);
        let focus = Skill::new("focus", "Focus", SkillCategory::Buff, 0, TargetFilter::SelfOnly);
        Combat::with_config("c", Grid::new(8, 8), config)
            .with_team(
                Team::new(red.clone(), "Red", "red", false)
                    .with_unit(
                        Unit::new(UnitId::new("mage"), "Mage", red.clone(), Stats::default())
                            .with_position(p(0, 0))
                            .with_skill(&bolt)
                            .with_skill(&focus),
                    )
                    .with_unit(
                        Unit::new(UnitId::new("knight"), "Knight", red, Stats::default())
                            .with_position(p(1, 0)),
                    ),
            )
            .with_team(Team::new(blue.clone(), "Blue", "blue", true).with_unit(
                Unit::new(UnitId::new("orc"), "Orc", blue, Stats::default()).with_position(p(2, 0)),
            ))
            .with_items(ItemCatalog::standard())
            .with_inventory("red", Bag::new().with("potion", 1))
    }

    fn combat() -> Combat {
        combat_with(CombatConfig::default())
    }

    fn check(combat: &Combat, action: Action) -> Result<(), ValidationError> {
        ValidationChain::standard().validate(combat, &action)
    }

    fn skill(actor: &str, skill: &str, targets: &[&str]) -> Action {
        Action::UseSkill {
            actor: UnitId::new(actor),
            skill: skill.into(),
            targets: targets.iter().map(|t| UnitId::new(*t)).collect(),
        }
    }

    #[test]
    fn test_rule_order() {
        let names: Vec<_> = ValidationChain::standard().rule_names().collect();
        assert_eq!(names, vec!["status_blocking", "resource_cost", "range", "target_legality"]);
    }

    #[test]
    fn test_unknown_and_eliminated_actor() {
        let mut combat = combat();
        let ghost = Action::Wait { actor: UnitId::new("ghost") };
        assert_eq!(
            check(&combat, ghost),
            Err(ValidationError::ActorNotFound(UnitId::new("ghost")))
        );

        combat.unit_mut(&UnitId::new("mage")).unwrap().receive_damage(1000);
        let flee = Action::Flee { actor: UnitId::new("mage") };
        assert_eq!(
            check(&combat, flee),
            Err(ValidationError::ActorEliminated(UnitId::new("mage")))
        );
        assert!(check(&combat, Action::Wait { actor: UnitId::new("mage") }).is_ok());
    }

    #[test]
    fn test_stun_blocks_everything_but_wait() {
        let mut combat = combat();
        let mage = UnitId::new("mage");
        combat.unit_mut(&mage).unwrap().add_status(Status::new(StatusType::Stun, 1, 0));

        assert_eq!(
            check(&combat, Action::Attack { actor: mage.clone(), target: "orc".into() }),
            Err(ValidationError::ActionBlocked(mage.clone()))
        );
        assert_eq!(
            check(&combat, Action::Move { actor: mage.clone(), destination: p(0, 1) }),
            Err(ValidationError::MovementBlocked(mage.clone()))
        );
        assert!(check(&combat, Action::Wait { actor: mage }).is_ok());
    }

    #[test]
    fn test_silence_blocks_skills_only() {
        let mut combat = combat();
        let mage = UnitId::new("mage");
        combat.unit_mut(&mage).unwrap().add_status(Status::new(StatusType::Silence, 2, 0));
        assert_eq!(
            check(&combat, skill("mage", "bolt", &["orc"])),
            Err(ValidationError::Silenced(mage.clone()))
        );
        assert!(check(&combat, Action::Move { actor: mage, destination: p(0, 1) }).is_ok());
    }

    #[test]
    fn test_insufficient_mp_and_cooldown() {
        let mut combat = combat();
        let mage = UnitId::new("mage");
        combat.unit_mut(&mage).unwrap().consume_mp(40).unwrap();
        assert_eq!(
            check(&combat, skill("mage", "bolt", &["orc"])),
            Err(ValidationError::InsufficientMp { required: 20, available: 10 })
        );

        let mut combat = self::combat();
        let unit = combat.unit_mut(&mage).unwrap();
        let bolt = unit.skill_mut(&"bolt".into()).unwrap();
        bolt.cooldown_max = 2;
        bolt.trigger_cooldown();
        assert_eq!(
            check(&combat, skill("mage", "bolt", &["orc"])),
            Err(ValidationError::OnCooldown { skill: "bolt".into(), remaining: 2 })
        );
    }

    #[test]
    fn test_no_actions_left() {
        let mut combat = combat();
        let mage = UnitId::new("mage");
        combat.unit_mut(&mage).unwrap().spend_action();
        assert_eq!(
            check(&combat, Action::Flee { actor: mage.clone() }),
            Err(ValidationError::NoActionsLeft(mage.clone()))
        );
        // Movement does not need an action.
        assert!(check(&combat, Action::Move { actor: mage, destination: p(0, 1) }).is_ok());
    }

    #[test]
    fn test_range_checks() {
        let combat = combat();
        assert_eq!(
            check(&combat, Action::Attack { actor: "mage".into(), target: "orc".into() }),
            Err(ValidationError::OutOfRange { distance: 2, range: 1 })
        );
        assert!(check(&combat, skill("mage", "bolt", &["orc"])).is_ok());
        assert_eq!(
            check(&combat, Action::Move { actor: "mage".into(), destination: p(8, 0) }),
            Err(ValidationError::DestinationOutOfBounds(p(8, 0)))
        );
        assert!(matches!(
            check(&combat, Action::Move { actor: "mage".into(), destination: p(1, 0) }),
            Err(ValidationError::Unreachable(_))
        ));
    }

    #[test]
    fn test_target_legality() {
        let combat = combat();
        assert!(matches!(
            check(&combat, Action::Attack { actor: "knight".into(), target: "mage".into() }),
            Err(ValidationError::InvalidTarget { .. })
        ));
        assert_eq!(
            check(&combat, Action::Attack { actor: "knight".into(), target: "nobody".into() }),
            Err(ValidationError::TargetNotFound("nobody".into()))
        );
        assert_eq!(check(&combat, skill("mage", "bolt", &[])), Err(ValidationError::NoTarget));
        assert!(check(&combat, skill("mage", "focus", &[])).is_ok());
        assert!(matches!(
            check(&combat, skill("mage", "bolt", &["knight"])),
            Err(ValidationError::InvalidTarget { .. })
        ));
    }

    #[test]
    fn test_item_rules() {
        let mut combat = combat();
        let use_item = |item: &str, target: &str| Action::UseItem {
            actor: "mage".into(),
            item: item.into(),
            target: target.into(),
        };
        assert!(check(&combat, use_item("potion", "knight")).is_ok());
        assert_eq!(
            check(&combat, use_item("ether", "knight")),
            Err(ValidationError::ItemUnavailable("ether".into()))
        );
        assert_eq!(
            check(&combat, use_item("elixir", "knight")),
            Err(ValidationError::UnknownItem("elixir".into()))
        );

        combat.inventory_mut(&"red".into()).add(&"phoenix-down".into(), 1);
        assert!(matches!(
            check(&combat, use_item("phoenix-down", "knight")),
            Err(ValidationError::InvalidTarget { .. })
        ));
        combat.unit_mut(&"knight".into()).unwrap().receive_damage(1000);
        assert!(check(&combat, use_item("phoenix-down", "knight")).is_ok());
    }

    #[test]
    fn test_spent_item_is_unavailable() {
        let mut combat = combat();
        let drink = Action::UseItem {
            actor: "mage".into(),
            item: "potion".into(),
            target: "knight".into(),
        };
        assert!(check(&combat, drink.clone()).is_ok());

        combat.inventory_mut(&"red".into()).consume(&"potion".into(), 1).unwrap();
        assert_eq!(
            check(&combat, drink),
            Err(ValidationError::ItemUnavailable("potion".into()))
        );
    }

    #[test]
    fn test_flee_rules() {
        let mut combat = combat_with(CombatConfig {
            allow_flee: false,
            ..CombatConfig::default()
        });
        assert_eq!(
            check(&combat, Action::Flee { actor: "mage".into() }),
            Err(ValidationError::FleeNotAllowed)
        );

        combat = self::combat();
        combat.mark_fled(&"red".into());
        assert_eq!(
            check(&combat, Action::Flee { actor: "mage".into() }),
            Err(ValidationError::AlreadyFled("red".into()))
        );
    }

    #[test]
    fn test_validation_never_mutates() {
        let combat = combat();
        let before = combat.state_hash();
        let _ = check(&combat, skill("mage", "bolt", &["orc"]));
        let _ = check(&combat, Action::Move { actor: "mage".into(), destination: p(5, 5) });
        assert_eq!(combat.state_hash(), before);
    }
}
