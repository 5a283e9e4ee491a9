use rapier2d::prelude::*;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::design::{BoneSpec, Design, JointSpec};
use crate::physics::{PhysicsWorld, GROUP_CREATURE, GROUP_WORLD};

// Bone physics properties
pub const BONE_LINEAR_DAMPING: Real = 0.1;
pub const BONE_ANGULAR_DAMPING: Real = 0.1;
pub const BONE_FRICTION: Real = 0.8;
pub const BONE_RESTITUTION: Real = 0.1;

/// Wrap an angle into `(-π, π]`.
pub fn wrap_angle(angle: Real) -> Real {
    use std::f32::consts::{PI, TAU};
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

#[derive(Debug, Clone)]
pub struct CreatureBone {
    pub id: String,
    pub handle: RigidBodyHandle,
    pub half_extents: [Real; 2],
    /// Design pose, used when the creature is reset.
    pub rest_position: Vector<Real>,
    pub rest_angle: Real,
}

#[derive(Debug, Clone)]
pub struct CreatureJoint {
    pub id: String,
    pub handle: ImpulseJointHandle,
    pub body_a: RigidBodyHandle,
    pub body_b: RigidBodyHandle,
    /// Angle of bone B minus angle of bone A in the design pose.
    pub reference_angle: Real,
    /// Limits relative to the reference angle, when enabled.
    pub limits: Option<[Real; 2]>,
}

/// Live bodies and constraints built from a [`Design`].
#[derive(Debug)]
pub struct Creature {
    bones: Vec<CreatureBone>,
    index: HashMap<String, usize>,
    joints: Vec<CreatureJoint>,
}

impl Creature {
    /// Build every bone and joint of `design` inside `physics`.
    ///
    /// Joints referencing unknown bones, or connecting a bone to itself, are
    /// logged and skipped; the rest of the creature is still built.
    pub fn build(design: &Design, physics: &mut PhysicsWorld) -> Self {
        let mut bones = Vec::with_capacity(design.bones.len());
        let mut index = HashMap::with_capacity(design.bones.len());

        for spec in &design.bones {
            if index.contains_key(&spec.id) {
                warn!(bone = %spec.id, "duplicate bone id; keeping the first definition");
                continue;
            }
            let bone = Self::insert_bone(spec, physics);
            index.insert(spec.id.clone(), bones.len());
            bones.push(bone);
        }

        let mut creature = Self {
            bones,
            index,
            joints: Vec::with_capacity(design.joints.len()),
        };

        for spec in &design.joints {
            if let Some(joint) = creature.insert_joint(spec, design, physics) {
                creature.joints.push(joint);
            }
        }

        debug!(
            design = %design.name,
            bones = creature.bones.len(),
            joints = creature.joints.len(),
            "built creature"
        );
        creature
    }

    fn insert_bone(spec: &BoneSpec, physics: &mut PhysicsWorld) -> CreatureBone {
        let rest_position = vector![spec.position[0], spec.position[1]];
        let body = RigidBodyBuilder::dynamic()
            .translation(rest_position)
            .rotation(spec.angle)
            .linear_damping(BONE_LINEAR_DAMPING)
            .angular_damping(BONE_ANGULAR_DAMPING)
            .build();
        let handle = physics.rigid_body_set.insert(body);

        let half_extents = [spec.size[0] / 2.0, spec.size[1] / 2.0];
        let collider = ColliderBuilder::cuboid(half_extents[0], half_extents[1])
            .density(spec.density)
            .friction(BONE_FRICTION)
            .restitution(BONE_RESTITUTION)
            .collision_groups(InteractionGroups::new(
                Group::from_bits_truncate(GROUP_CREATURE),
                Group::from_bits_truncate(GROUP_WORLD),
            ))
            .build();
        physics
            .collider_set
            .insert_with_parent(collider, handle, &mut physics.rigid_body_set);

        CreatureBone {
            id: spec.id.clone(),
            handle,
            half_extents,
            rest_position,
            rest_angle: spec.angle,
        }
    }

    fn insert_joint(
        &self,
        spec: &JointSpec,
        design: &Design,
        physics: &mut PhysicsWorld,
    ) -> Option<CreatureJoint> {
        let (Some(bone_a), Some(bone_b)) = (design.bone(&spec.bone_a), design.bone(&spec.bone_b))
        else {
            warn!(
                joint = %spec.id,
                bone_a = %spec.bone_a,
                bone_b = %spec.bone_b,
                "joint references a missing bone; skipping"
            );
            return None;
        };
        if spec.bone_a == spec.bone_b {
            warn!(joint = %spec.id, "joint connects a bone to itself; skipping");
            return None;
        }
        let body_a = self.body(&spec.bone_a)?;
        let body_b = self.body(&spec.bone_b)?;

        let reference_angle = bone_b.angle - bone_a.angle;
        let limits = spec.enable_limit.then(|| spec.limits());

        let mut builder = RevoluteJointBuilder::new()
            .local_anchor1(point![spec.anchor_a[0], spec.anchor_a[1]])
            .local_anchor2(point![spec.anchor_b[0], spec.anchor_b[1]])
            .contacts_enabled(false);
        if let Some(limits) = limits {
            builder = builder.limits(limits);
        }
        let mut joint = builder.build();
        // Rotating the first frame by the reference angle makes the joint read
        // zero in the design pose, so limits are relative to that pose.
        joint.data.local_frame1 = Isometry::new(
            vector![spec.anchor_a[0], spec.anchor_a[1]],
            reference_angle,
        );

        let handle = physics
            .impulse_joint_set
            .insert(body_a, body_b, joint, true);

        Some(CreatureJoint {
            id: spec.id.clone(),
            handle,
            body_a,
            body_b,
            reference_angle,
            limits,
        })
    }

    pub fn body(&self, bone_id: &str) -> Option<RigidBodyHandle> {
        self.index.get(bone_id).map(|&i| self.bones[i].handle)
    }

    pub fn bones(&self) -> &[CreatureBone] {
        &self.bones
    }

    /// Bone id to body handle map.
    pub fn bodies(&self) -> HashMap<&str, RigidBodyHandle> {
        self.bones
            .iter()
            .map(|bone| (bone.id.as_str(), bone.handle))
            .collect()
    }

    /// Joint id to constraint handle map.
    pub fn joints(&self) -> HashMap<&str, ImpulseJointHandle> {
        self.joints
            .iter()
            .map(|joint| (joint.id.as_str(), joint.handle))
            .collect()
    }

    pub fn creature_joints(&self) -> &[CreatureJoint] {
        &self.joints
    }

    /// Current centre of every bone, in design order.
    pub fn joint_positions(&self, bodies: &RigidBodySet) -> Vec<Vector<Real>> {
        self.bones
            .iter()
            .filter_map(|bone| bodies.get(bone.handle))
            .map(|body| *body.translation())
            .collect()
    }

    /// Angle of each joint relative to its design pose.
    pub fn joint_angles(&self, bodies: &RigidBodySet) -> Vec<(String, Real)> {
        self.joints
            .iter()
            .filter_map(|joint| {
                let a = bodies.get(joint.body_a)?;
                let b = bodies.get(joint.body_b)?;
                let angle = b.rotation().angle() - a.rotation().angle() - joint.reference_angle;
                Some((joint.id.clone(), wrap_angle(angle)))
            })
            .collect()
    }

    /// Remove every body (and with it every collider and joint).
    pub fn despawn(self, physics: &mut PhysicsWorld) {
        for bone in self.bones {
            physics.remove_body(bone.handle);
        }
    }
}
