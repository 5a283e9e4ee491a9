use rapier2d::prelude::*;
use tracing::warn;

use crate::creature::Creature;
use crate::design::Design;

// Actuator constants
pub const ACTION_LIMIT: Real = 0.5;
pub const SPRING_CONSTANT: Real = 100.0;
/// Force per m/s of extension rate, opposing the muscle's lengthening.
pub const MUSCLE_DAMPING: Real = 10.0;
pub const MIN_MUSCLE_LENGTH: Real = 1.0e-4;

/// Length the muscle is driven towards for a given action.
pub fn target_length(rest_length: Real, action: Real) -> Real {
    let action = if action.is_nan() { 0.0 } else { action };
    rest_length * (1.0 + action.clamp(-ACTION_LIMIT, ACTION_LIMIT))
}

/// Signed damped spring force, positive when the muscle pulls its bones
/// together. `extension_rate` is the rate of change of the muscle length.
pub fn spring_force(
    current_length: Real,
    target_length: Real,
    extension_rate: Real,
    max_force: Real,
) -> Real {
    let force = SPRING_CONSTANT * (current_length - target_length)
        + MUSCLE_DAMPING * extension_rate;
    if force.is_nan() {
        return 0.0;
    }
    force.clamp(-max_force, max_force)
}

#[derive(Debug, Clone)]
pub struct MuscleSlot {
    pub id: String,
    /// `None` when the design referenced a missing bone; the slot stays inert.
    pub bodies: Option<(RigidBodyHandle, RigidBodyHandle)>,
    pub max_force: Real,
    pub rest_length: Real,
}

/// Turns one action per muscle into spring forces between bone pairs.
#[derive(Debug, Clone)]
pub struct MuscleActuator {
    muscles: Vec<MuscleSlot>,
    last_forces: Vec<Real>,
}

impl MuscleActuator {
    pub fn new(design: &Design, creature: &Creature) -> Self {
        let muscles: Vec<MuscleSlot> = design
            .muscles
            .iter()
            .map(|spec| {
                let bodies = match (creature.body(&spec.bone_a), creature.body(&spec.bone_b)) {
                    (Some(a), Some(b)) if a != b => Some((a, b)),
                    (Some(_), Some(_)) => {
                        warn!(muscle = %spec.id, "muscle connects a bone to itself; slot left inert");
                        None
                    }
                    _ => {
                        warn!(
                            muscle = %spec.id,
                            bone_a = %spec.bone_a,
                            bone_b = %spec.bone_b,
                            "muscle references a missing bone; slot left inert"
                        );
                        None
                    }
                };
                let max_force = if spec.max_force.is_finite() {
                    spec.max_force.abs()
                } else {
                    warn!(muscle = %spec.id, "non-finite max force; muscle disabled");
                    0.0
                };
                MuscleSlot {
                    id: spec.id.clone(),
                    bodies,
                    max_force,
                    rest_length: spec.rest_length,
                }
            })
            .collect();

        let last_forces = vec![0.0; muscles.len()];
        Self {
            muscles,
            last_forces,
        }
    }

    /// One action slot per design muscle, resolved or not.
    pub fn muscle_count(&self) -> usize {
        self.muscles.len()
    }

    pub fn muscles(&self) -> &[MuscleSlot] {
        &self.muscles
    }

    /// Force applied by each muscle on the last call to `apply_forces`.
    pub fn last_forces(&self) -> &[Real] {
        &self.last_forces
    }

    /// Current centre-to-centre length, or the rest length when the bodies
    /// are unavailable.
    pub fn muscle_length(&self, index: usize, bodies: &RigidBodySet) -> Option<Real> {
        let slot = self.muscles.get(index)?;
        let length = slot
            .bodies
            .and_then(|(a, b)| Some((bodies.get(a)?, bodies.get(b)?)))
            .map(|(a, b)| (b.translation() - a.translation()).norm())
            .unwrap_or(slot.rest_length);
        Some(length)
    }

    pub fn muscle_lengths(&self, bodies: &RigidBodySet) -> Vec<Real> {
        (0..self.muscles.len())
            .filter_map(|i| self.muscle_length(i, bodies))
            .collect()
    }

    /// Clear the forces left on actuated bodies by the previous step.
    pub fn release(&mut self, bodies: &mut RigidBodySet) {
        for (a, b) in self.muscles.iter().filter_map(|slot| slot.bodies) {
            for handle in [a, b] {
                if let Some(body) = bodies.get_mut(handle) {
                    body.reset_forces(false);
                }
            }
        }
        self.last_forces.iter_mut().for_each(|force| *force = 0.0);
    }

    /// Apply one step worth of muscle forces. Returns `false`, applying
    /// nothing, when `actions` does not have one entry per muscle.
    pub fn apply_forces(&mut self, actions: &[Real], bodies: &mut RigidBodySet) -> bool {
        self.release(bodies);

        if actions.len() != self.muscles.len() {
            warn!(
                expected = self.muscles.len(),
                actual = actions.len(),
                "action vector length does not match muscle count; no forces applied"
            );
            return false;
        }

        for (index, (slot, &action)) in self.muscles.iter().zip(actions).enumerate() {
            let Some((handle_a, handle_b)) = slot.bodies else {
                continue;
            };
            let (Some(body_a), Some(body_b)) = (bodies.get(handle_a), bodies.get(handle_b)) else {
                continue;
            };

            let delta = body_b.translation() - body_a.translation();
            let current_length = delta.norm();
            if current_length < MIN_MUSCLE_LENGTH {
                continue;
            }
            let direction = delta / current_length;
            let extension_rate = (body_b.linvel() - body_a.linvel()).dot(&direction);

            let target = target_length(slot.rest_length, action);
            let force = spring_force(current_length, target, extension_rate, slot.max_force);
            self.last_forces[index] = force;

            let half = direction * (force / 2.0);
            if let Some(body) = bodies.get_mut(handle_a) {
                body.wake_up(true);
                body.add_force(half, true);
            }
            if let Some(body) = bodies.get_mut(handle_b) {
                body.wake_up(true);
                body.add_force(-half, true);
            }
        }
        true
    }
}
