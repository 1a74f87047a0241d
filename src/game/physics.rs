//! Physics Adapter
//!
//! Thin contract over the `rapier3d` rigid-body engine: create bodies, step
//! the world by a fixed increment, and read/write transforms and velocities.
//!
//! The world is not safe for concurrent access. It is owned by the
//! simulation and only touched from the simulation task.
//!
//! `rapier3d` is compiled with `enhanced-determinism`; combined with a fixed
//! `dt` and insertion-ordered body creation, stepping is reproducible.

use rapier3d::na::{Quaternion, UnitQuaternion};
use rapier3d::prelude::*;

use crate::config::PhysicsConfig;
use crate::core::math::{Quat, Vec3};

/// Opaque handle to a body in the [`PhysicsWorld`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyHandle(RigidBodyHandle);

#[cfg(test)]
impl BodyHandle {
    /// Handle that refers to no body.
    pub(crate) fn dangling() -> Self {
        Self(RigidBodyHandle::invalid())
    }
}

/// Position and rotation of a body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// World-space translation
    pub position: Vec3,
    /// Unit rotation
    pub rotation: Quat,
}

/// Physics initialization errors. All of them are fatal.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PhysicsError {
    /// Configuration cannot produce a usable world.
    #[error("Invalid physics config: {0}")]
    InvalidConfig(String),
}

/// Shape and material shared by every entity body.
#[derive(Debug, Clone, Copy)]
struct BodyTemplate {
    half_extents: Vec3,
    mass: f32,
    friction: f32,
}

/// The shared rigid-body world.
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_params: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    template: BodyTemplate,
}

impl PhysicsWorld {
    /// Create the world and its static ground collider.
    pub fn new(config: &PhysicsConfig) -> Result<Self, PhysicsError> {
        validate(config)?;

        let mut world = Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vector![config.gravity.x, config.gravity.y, config.gravity.z],
            integration_params: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            template: BodyTemplate {
                half_extents: config.body_half_extents,
                mass: config.mass,
                friction: config.friction,
            },
        };

        // Top face of the ground at y = 0
        let half = config.ground_half_extents;
        let ground = ColliderBuilder::cuboid(half.x, half.y, half.z)
            .translation(vector![0.0, -half.y, 0.0])
            .build();
        world.collider_set.insert(ground);

        Ok(world)
    }

    /// Create a dynamic body at `position`.
    ///
    /// Rotation is locked to the Y axis so bodies turn but never tip.
    pub fn create_body(&mut self, position: Vec3) -> BodyHandle {
        let rb = RigidBodyBuilder::dynamic()
            .translation(vector![position.x, position.y, position.z])
            .enabled_rotations(false, true, false)
            .build();
        let handle = self.rigid_body_set.insert(rb);

        let half = self.template.half_extents;
        let collider = ColliderBuilder::cuboid(half.x, half.y, half.z)
            .mass(self.template.mass)
            .friction(self.template.friction)
            .friction_combine_rule(CoefficientCombineRule::Min)
            .build();
        self.collider_set
            .insert_with_parent(collider, handle, &mut self.rigid_body_set);

        BodyHandle(handle)
    }

    /// Advance every body by exactly `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        self.integration_params.dt = dt;

        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
    }

    /// Overwrite a body's linear velocity. Unknown handles are ignored.
    pub fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec3) {
        if let Some(rb) = self.rigid_body_set.get_mut(handle.0) {
            rb.set_linvel(vector![velocity.x, velocity.y, velocity.z], true);
        }
    }

    /// Overwrite a body's rotation. The quaternion is normalized first;
    /// callers must reject degenerate quaternions (see [`Quat::is_valid_rotation`]).
    pub fn set_rotation(&mut self, handle: BodyHandle, rotation: Quat) {
        if let Some(rb) = self.rigid_body_set.get_mut(handle.0) {
            let q = Quaternion::new(rotation.w, rotation.x, rotation.y, rotation.z);
            rb.set_rotation(UnitQuaternion::from_quaternion(q), true);
        }
    }

    /// Current position and rotation.
    pub fn transform(&self, handle: BodyHandle) -> Option<Transform> {
        let rb = self.rigid_body_set.get(handle.0)?;
        let t = rb.translation();
        let r = rb.rotation().quaternion().coords;
        Some(Transform {
            position: Vec3::new(t.x, t.y, t.z),
            rotation: Quat::new(r.x, r.y, r.z, r.w),
        })
    }

    /// Current linear velocity.
    pub fn linear_velocity(&self, handle: BodyHandle) -> Option<Vec3> {
        let v = self.rigid_body_set.get(handle.0)?.linvel();
        Some(Vec3::new(v.x, v.y, v.z))
    }

    /// Number of dynamic bodies.
    #[cfg(test)]
    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }
}

fn validate(config: &PhysicsConfig) -> Result<(), PhysicsError> {
    if !config.gravity.is_finite() {
        return Err(PhysicsError::InvalidConfig("gravity must be finite".into()));
    }
    if !config.spawn_position.is_finite() {
        return Err(PhysicsError::InvalidConfig("spawn position must be finite".into()));
    }
    for (name, half) in [
        ("ground_half_extents", config.ground_half_extents),
        ("body_half_extents", config.body_half_extents),
    ] {
        if !half.is_finite() || half.x <= 0.0 || half.y <= 0.0 || half.z <= 0.0 {
            return Err(PhysicsError::InvalidConfig(format!("{} must be positive", name)));
        }
    }
    if !(config.mass.is_finite() && config.mass > 0.0) {
        return Err(PhysicsError::InvalidConfig("mass must be positive".into()));
    }
    if !(config.friction.is_finite() && config.friction >= 0.0) {
        return Err(PhysicsError::InvalidConfig("friction must be >= 0".into()));
    }
    Ok(())
}
