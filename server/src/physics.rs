//! Playfield physics on top of rapier2d.
//!
//! The world holds four fixed boundary segments (floor, ceiling, left and
//! right wall), one dynamic ball and up to one paddle per side. Paddles ride
//! on a prismatic joint attached to their wall so they can only move
//! vertically. Ball contact with a side wall is reported as a score for the
//! opposite side.

use pong_shared::protocol::{PaddlePositions, Positions, Side};
use pong_shared::vec2::Vec2;
use rapier2d::prelude::*;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use crate::error::PhysicsError;
use crate::slots::SideSlots;

/// Gap between a paddle face and its wall
const PADDLE_WALL_DISTANCE: f32 = 0.2;
/// Joint motor force cap; the motor brakes towards zero speed
const PADDLE_MOTOR_MAX_FORCE: f32 = 2.0;
const PADDLE_MOTOR_FACTOR: f32 = 1.0;

/// Callback invoked with the side that scored.
pub type BallScoredCallback = Box<dyn FnMut(Side) + Send>;

/// Paddle dimensions in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaddleSize {
    pub width: f32,
    pub height: f32,
}

/// Operations the game session needs from the physics layer.
pub trait Physics {
    /// Create the paddle for `side`, centered vertically and jointed to its wall.
    fn add_paddle(&mut self, side: Side, size: PaddleSize) -> Result<(), PhysicsError>;

    /// Destroy the paddle for `side` together with its collider and joint.
    fn remove_paddle(&mut self, side: Side) -> Result<(), PhysicsError>;

    /// Teleport the ball and set its linear velocity.
    fn position_ball(&mut self, position: Vec2, velocity: Vec2);

    /// Advance the simulation by `period` seconds using `accuracy` solver
    /// iterations. Returns the scoring sides in the order contacts began.
    fn tick(&mut self, period: f32, accuracy: usize) -> Vec<Side>;

    fn ball_and_paddle_positions(&self) -> Positions;

    /// Apply `direction` as a force at the paddle's center of mass for the
    /// next tick.
    fn give_impulse_to_paddle(&mut self, side: Side, direction: Vec2) -> Result<(), PhysicsError>;

    /// Replace the ball-scored callback.
    fn on_ball_scored(&mut self, callback: BallScoredCallback);
}

/// True when `{a, b}` is the pair `{x, y}` in either order.
pub fn pair_matches<T: PartialEq>(a: T, b: T, x: T, y: T) -> bool {
    (a == x && b == y) || (a == y && b == x)
}

#[derive(Debug, Clone, Copy)]
struct Material {
    density: f32,
    friction: f32,
    restitution: f32,
}

const BALL_MATERIAL: Material = Material {
    density: 1.0,
    friction: 1.0,
    restitution: 1.0,
};

const PADDLE_MATERIAL: Material = Material {
    density: 5.0,
    friction: 1.0,
    restitution: 1.0,
};

const BOUNDARY_MATERIAL: Material = Material {
    density: 1.0,
    friction: 1.0,
    restitution: 1.0,
};

fn build_collider(shape: ColliderBuilder, material: Material) -> Collider {
    shape
        .density(material.density)
        .friction(material.friction)
        .restitution(material.restitution)
        .build()
}

fn to_vec2(v: &Vector<Real>) -> Vec2 {
    Vec2::new(v.x, v.y)
}

#[derive(Debug, Clone, Copy)]
struct Boundary {
    body: RigidBodyHandle,
    collider: ColliderHandle,
}

/// Collects contact starts during a step. Drained right after.
#[derive(Default)]
struct ContactCollector {
    started: Mutex<Vec<(ColliderHandle, ColliderHandle)>>,
}

impl ContactCollector {
    fn drain(&self) -> Vec<(ColliderHandle, ColliderHandle)> {
        let mut started = self.started.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *started)
    }
}

impl EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if let CollisionEvent::Started(a, b, _) = event {
            self.started
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((a, b));
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

/// The rapier world plus the handles of every game object in it.
pub struct PhysicsWorld {
    width: f32,
    height: f32,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    contacts: ContactCollector,
    ball_body: RigidBodyHandle,
    ball_collider: ColliderHandle,
    left_wall: Boundary,
    right_wall: Boundary,
    paddles: SideSlots<RigidBodyHandle>,
    ball_scored: BallScoredCallback,
}

impl PhysicsWorld {
    /// Build the playfield. Dimensions must be positive; callers validate
    /// them through `FieldConfig::validate`.
    pub fn new(width: f32, height: f32, ball_radius: f32) -> Self {
        debug_assert!(width > 0.0 && height > 0.0 && ball_radius > 0.0);

        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();

        let ball_body = bodies.insert(
            RigidBodyBuilder::dynamic()
                .translation(vector![width / 2.0, height / 2.0])
                .ccd_enabled(true)
                .can_sleep(true)
                .build(),
        );
        let ball = ColliderBuilder::ball(ball_radius)
            .active_events(ActiveEvents::COLLISION_EVENTS);
        let ball_collider = colliders.insert_with_parent(
            build_collider(ball, BALL_MATERIAL),
            ball_body,
            &mut bodies,
        );

        let horizontal = (point![0.0, 0.0], point![width, 0.0]);
        let vertical = (point![0.0, 0.0], point![0.0, height]);

        // floor
        add_boundary(
            &mut bodies,
            &mut colliders,
            vector![0.0, height],
            horizontal,
        );
        // ceiling
        add_boundary(&mut bodies, &mut colliders, vector![0.0, 0.0], horizontal);
        let left_wall = add_boundary(&mut bodies, &mut colliders, vector![0.0, 0.0], vertical);
        let right_wall = add_boundary(&mut bodies, &mut colliders, vector![width, 0.0], vertical);

        Self {
            width,
            height,
            gravity: vector![0.0, 0.0],
            integration_parameters: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies,
            colliders,
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            contacts: ContactCollector::default(),
            ball_body,
            ball_collider,
            left_wall,
            right_wall,
            paddles: SideSlots::new(),
            ball_scored: Box::new(|_| {}),
        }
    }

    fn scoring_side(&self, a: ColliderHandle, b: ColliderHandle) -> Option<Side> {
        if pair_matches(a, b, self.left_wall.collider, self.ball_collider) {
            Some(Side::Right)
        } else if pair_matches(a, b, self.right_wall.collider, self.ball_collider) {
            Some(Side::Left)
        } else {
            None
        }
    }
}

fn add_boundary(
    bodies: &mut RigidBodySet,
    colliders: &mut ColliderSet,
    origin: Vector<Real>,
    (from, to): (Point<Real>, Point<Real>),
) -> Boundary {
    let body = bodies.insert(RigidBodyBuilder::fixed().translation(origin).build());
    let collider = colliders.insert_with_parent(
        build_collider(ColliderBuilder::segment(from, to), BOUNDARY_MATERIAL),
        body,
        bodies,
    );
    Boundary { body, collider }
}

impl Physics for PhysicsWorld {
    fn add_paddle(&mut self, side: Side, size: PaddleSize) -> Result<(), PhysicsError> {
        if self.paddles.contains(side) {
            return Err(PhysicsError::PaddleExists(side));
        }

        // Distance from the wall line to the paddle center
        let offset = size.width / 2.0 + PADDLE_WALL_DISTANCE;
        let (wall, x, anchor_x) = match side {
            Side::Left => (self.left_wall.body, offset, offset),
            Side::Right => (self.right_wall.body, self.width - offset, -offset),
        };
        let mid = self.height / 2.0;

        let paddle = RigidBodyBuilder::dynamic().translation(vector![x, mid]);
        let body = self.bodies.insert(paddle.build());
        self.colliders.insert_with_parent(
            build_collider(
                ColliderBuilder::cuboid(size.width / 2.0, size.height / 2.0),
                PADDLE_MATERIAL,
            ),
            body,
            &mut self.bodies,
        );

        let joint = PrismaticJointBuilder::new(Vector::y_axis())
            .local_anchor1(point![anchor_x, mid])
            .local_anchor2(point![0.0, 0.0])
            .contacts_enabled(false)
            .motor_velocity(0.0, PADDLE_MOTOR_FACTOR)
            .motor_max_force(PADDLE_MOTOR_MAX_FORCE)
            .build();
        self.impulse_joints.insert(wall, body, joint, true);

        tracing::debug!("Paddle added on the {} side", side);
        self.paddles
            .insert(side, body)
            .map_err(|_| PhysicsError::PaddleExists(side))
    }

    fn remove_paddle(&mut self, side: Side) -> Result<(), PhysicsError> {
        let body = self
            .paddles
            .take(side)
            .ok_or(PhysicsError::PaddleNotFound(side))?;
        // Removing the body takes its collider and joint with it
        self.bodies.remove(
            body,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        tracing::debug!("Paddle removed from the {} side", side);
        Ok(())
    }

    fn position_ball(&mut self, position: Vec2, velocity: Vec2) {
        if let Some(ball) = self.bodies.get_mut(self.ball_body) {
            ball.set_translation(vector![position.x, position.y], true);
            ball.set_linvel(vector![velocity.x, velocity.y], true);
        }
    }

    fn tick(&mut self, period: f32, accuracy: usize) -> Vec<Side> {
        self.integration_parameters.dt = period;
        self.integration_parameters.num_solver_iterations =
            NonZeroUsize::new(accuracy).unwrap_or(NonZeroUsize::MIN);

        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &self.contacts,
        );

        for (_, body) in self.bodies.iter_mut() {
            body.reset_forces(false);
        }

        let mut scored = Vec::new();
        for (a, b) in self.contacts.drain() {
            if let Some(side) = self.scoring_side(a, b) {
                (self.ball_scored)(side);
                scored.push(side);
            }
        }
        scored
    }

    fn ball_and_paddle_positions(&self) -> Positions {
        let position_of = |handle: RigidBodyHandle| {
            self.bodies.get(handle).map(|rb| to_vec2(rb.translation()))
        };
        Positions {
            ball: position_of(self.ball_body).unwrap_or(Vec2::ZERO),
            paddles: PaddlePositions {
                left: self.paddles.get(Side::Left).and_then(|h| position_of(*h)),
                right: self.paddles.get(Side::Right).and_then(|h| position_of(*h)),
            },
        }
    }

    fn give_impulse_to_paddle(&mut self, side: Side, direction: Vec2) -> Result<(), PhysicsError> {
        let handle = *self
            .paddles
            .get(side)
            .ok_or(PhysicsError::PaddleNotFound(side))?;
        if let Some(paddle) = self.bodies.get_mut(handle) {
            paddle.add_force(vector![direction.x, direction.y], true);
        }
        Ok(())
    }

    fn on_ball_scored(&mut self, callback: BallScoredCallback) {
        self.ball_scored = callback;
    }
}
