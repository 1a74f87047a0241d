//! Autonomous Entity Behavior
//!
//! Pursuit: every entity whose kind `pursues_players` steers toward the
//! nearest `pursuit_target`. Planning is a pure function of the registry so
//! the result depends only on positions and registry order.

use crate::core::math::{Quat, Vec3};
use crate::game::entity::Entity;
use crate::game::registry::EntityRegistry;

/// Velocity and facing chosen for one pursuer this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PursuitStep {
    /// Registry slot of the pursuer
    pub slot: usize,
    /// New linear velocity
    pub velocity: Vec3,
    /// New facing, if the pursuer moves horizontally
    pub rotation: Option<Quat>,
}

/// Nearest pursuit target to `from` and its distance.
///
/// Only strictly smaller distances replace the current best, so ties go to
/// the target that comes first in registry order.
pub fn nearest_target<'a>(registry: &'a EntityRegistry, from: &Entity) -> Option<(&'a Entity, f32)> {
    let mut best: Option<(&Entity, f32)> = None;

    for candidate in registry.iter() {
        if candidate.id == from.id || !candidate.capabilities().pursuit_target {
            continue;
        }
        let distance = from.position.distance(candidate.position);
        match best {
            Some((_, d)) if distance >= d => {}
            _ => best = Some((candidate, distance)),
        }
    }

    best
}

/// Plan one pursuit step for every pursuer, in registry order.
pub fn plan_pursuit(registry: &EntityRegistry, speed: f32) -> Vec<PursuitStep> {
    let mut steps = Vec::new();

    for (slot, pursuer) in registry.iter().enumerate() {
        if !pursuer.capabilities().pursues_players {
            continue;
        }

        let step = match nearest_target(registry, pursuer) {
            Some((target, _)) => {
                let dir = (target.position - pursuer.position).normalize();
                let velocity = Vec3::new(dir.x * speed, dir.y, dir.z * speed);
                PursuitStep {
                    slot,
                    velocity,
                    rotation: Quat::facing(velocity),
                }
            }
            // Nothing to chase: stop horizontally, let gravity act
            None => PursuitStep {
                slot,
                velocity: Vec3::new(0.0, pursuer.velocity.y, 0.0),
                rotation: None,
            },
        };
        steps.push(step);
    }

    steps
}
