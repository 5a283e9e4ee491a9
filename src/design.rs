use rapier2d::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

// Defaults used by the sample designs
pub const DEFAULT_BONE_DENSITY: Real = 1.0;
pub const DEFAULT_MUSCLE_MAX_FORCE: Real = 500.0;
pub const DEFAULT_JOINT_LIMIT: Real = std::f32::consts::FRAC_PI_4;

/// One rigid rectangular segment of a creature.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BoneSpec {
    pub id: String,
    /// Centre of the bone in design coordinates.
    pub position: [Real; 2],
    /// Full width and height of the bone.
    pub size: [Real; 2],
    /// Rotation in radians.
    pub angle: Real,
    pub density: Real,
}

/// Revolute connection between two bones.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct JointSpec {
    pub id: String,
    pub bone_a: String,
    pub bone_b: String,
    /// Anchor in bone A's local frame.
    pub anchor_a: [Real; 2],
    /// Anchor in bone B's local frame.
    pub anchor_b: [Real; 2],
    #[serde(default)]
    pub lower_angle: Option<Real>,
    #[serde(default)]
    pub upper_angle: Option<Real>,
    #[serde(default)]
    pub enable_limit: bool,
}

impl JointSpec {
    /// Limits relative to the design pose, falling back to ±45°.
    pub fn limits(&self) -> [Real; 2] {
        [
            self.lower_angle.unwrap_or(-DEFAULT_JOINT_LIMIT),
            self.upper_angle.unwrap_or(DEFAULT_JOINT_LIMIT),
        ]
    }
}

/// Spring actuator pulling two bone centres towards a target length.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MuscleSpec {
    pub id: String,
    pub bone_a: String,
    pub bone_b: String,
    pub max_force: Real,
    pub rest_length: Real,
}

/// Problems found by [`Design::validate`]. None of them stop a simulation;
/// offending joints and muscles are skipped when the body is built.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DesignIssue {
    #[error("duplicate bone id `{0}`")]
    DuplicateBone(String),
    #[error("duplicate joint id `{0}`")]
    DuplicateJoint(String),
    #[error("duplicate muscle id `{0}`")]
    DuplicateMuscle(String),
    #[error("`{element}` references missing bone `{bone}`")]
    MissingBone { element: String, bone: String },
    #[error("`{0}` connects a bone to itself")]
    SelfReference(String),
    #[error("bone `{0}` must have a positive size and density")]
    DegenerateBone(String),
}

/// Declarative description of a creature.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Design {
    pub name: String,
    pub bones: Vec<BoneSpec>,
    #[serde(default)]
    pub joints: Vec<JointSpec>,
    #[serde(default)]
    pub muscles: Vec<MuscleSpec>,
}

impl Design {
    pub fn bone(&self, id: &str) -> Option<&BoneSpec> {
        self.bones.iter().find(|bone| bone.id == id)
    }

    /// Mean of all bone centres in design coordinates.
    pub fn centroid(&self) -> Vector<Real> {
        if self.bones.is_empty() {
            return Vector::zeros();
        }
        let sum = self
            .bones
            .iter()
            .fold(Vector::zeros(), |acc: Vector<Real>, bone| {
                acc + vector![bone.position[0], bone.position[1]]
            });
        sum / self.bones.len() as Real
    }

    /// Collect every invariant violation in the design.
    pub fn validate(&self) -> Vec<DesignIssue> {
        let mut issues = Vec::new();

        let mut bone_ids = HashSet::new();
        for bone in &self.bones {
            if !bone_ids.insert(bone.id.as_str()) {
                issues.push(DesignIssue::DuplicateBone(bone.id.clone()));
            }
            if !(bone.size[0] > 0.0 && bone.size[1] > 0.0 && bone.density > 0.0) {
                issues.push(DesignIssue::DegenerateBone(bone.id.clone()));
            }
        }

        let check_pair = |element: &str, a: &str, b: &str, issues: &mut Vec<DesignIssue>| {
            for bone in [a, b] {
                if !bone_ids.contains(bone) {
                    issues.push(DesignIssue::MissingBone {
                        element: element.to_string(),
                        bone: bone.to_string(),
                    });
                }
            }
            if a == b {
                issues.push(DesignIssue::SelfReference(element.to_string()));
            }
        };

        let mut joint_ids = HashSet::new();
        for joint in &self.joints {
            if !joint_ids.insert(joint.id.as_str()) {
                issues.push(DesignIssue::DuplicateJoint(joint.id.clone()));
            }
            check_pair(&joint.id, &joint.bone_a, &joint.bone_b, &mut issues);
        }

        let mut muscle_ids = HashSet::new();
        for muscle in &self.muscles {
            if !muscle_ids.insert(muscle.id.as_str()) {
                issues.push(DesignIssue::DuplicateMuscle(muscle.id.clone()));
            }
            check_pair(&muscle.id, &muscle.bone_a, &muscle.bone_b, &mut issues);
        }

        issues
    }

    /// A horizontal chain of `segments` bones, each jointed to the next with
    /// ±45° limits and a muscle between consecutive bone centres.
    pub fn worm(segments: usize) -> Self {
        const SEGMENT_LENGTH: Real = 1.0;
        const SEGMENT_THICKNESS: Real = 0.4;

        let bones: Vec<BoneSpec> = (0..segments)
            .map(|i| BoneSpec {
                id: format!("bone-{i}"),
                position: [i as Real * SEGMENT_LENGTH, 0.0],
                size: [SEGMENT_LENGTH, SEGMENT_THICKNESS],
                angle: 0.0,
                density: DEFAULT_BONE_DENSITY,
            })
            .collect();

        let joints = (1..segments)
            .map(|i| JointSpec {
                id: format!("joint-{}", i - 1),
                bone_a: format!("bone-{}", i - 1),
                bone_b: format!("bone-{i}"),
                anchor_a: [SEGMENT_LENGTH / 2.0, 0.0],
                anchor_b: [-SEGMENT_LENGTH / 2.0, 0.0],
                lower_angle: Some(-DEFAULT_JOINT_LIMIT),
                upper_angle: Some(DEFAULT_JOINT_LIMIT),
                enable_limit: true,
            })
            .collect();

        let muscles = (1..segments)
            .map(|i| MuscleSpec {
                id: format!("muscle-{}", i - 1),
                bone_a: format!("bone-{}", i - 1),
                bone_b: format!("bone-{i}"),
                max_force: DEFAULT_MUSCLE_MAX_FORCE,
                rest_length: SEGMENT_LENGTH,
            })
            .collect();

        Self {
            name: format!("worm-{segments}"),
            bones,
            joints,
            muscles,
        }
    }
}
