use crate::vector::Vector2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a body, unique within one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a body participates in integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyKind {
    /// Integrates forces and gravity.
    Dynamic,
    /// Moves at its set velocity and ignores forces.
    Kinematic,
    /// Never moves.
    Static,
}

/// Collision geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Circle { radius: f64 },
    Aabb { half_extents: Vector2 },
}

impl Shape {
    /// Half extents of the shape's bounding box.
    #[must_use]
    pub fn half_extents(&self) -> Vector2 {
        match *self {
            Shape::Circle { radius } => Vector2::new(radius, radius),
            Shape::Aabb { half_extents } => half_extents,
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        let h = self.half_extents();
        anyhow::ensure!(
            h.x.is_finite() && h.y.is_finite() && h.x > 0.0 && h.y > 0.0,
            "shape extents must be positive and finite, got {:?}",
            self
        );
        Ok(())
    }
}

/// A rigid body owned by the physics engine.
///
/// Mass is positive for dynamic bodies; friction and restitution always lie in
/// `[0, 1]`. The setters keep those invariants after construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsObject {
    pub id: ObjectId,
    pub kind: BodyKind,
    pub shape: Shape,
    pub position: Vector2,
    pub velocity: Vector2,
    /// Accumulated force, cleared at the end of every step.
    pub force: Vector2,
    mass: f64,
    friction: f64,
    restitution: f64,
}

impl PhysicsObject {
    pub fn new(
        id: ObjectId,
        kind: BodyKind,
        shape: Shape,
        position: Vector2,
        mass: f64,
        friction: f64,
        restitution: f64,
    ) -> anyhow::Result<Self> {
        shape.validate()?;
        anyhow::ensure!(position.is_finite(), "body {} has a non-finite position", id);
        if kind == BodyKind::Dynamic {
            anyhow::ensure!(
                mass.is_finite() && mass > 0.0,
                "dynamic body {} needs a positive mass, got {}",
                id,
                mass
            );
        }
        anyhow::ensure!(
            friction.is_finite() && restitution.is_finite(),
            "body {} has non-finite material coefficients",
            id
        );
        Ok(Self {
            id,
            kind,
            shape,
            position,
            velocity: Vector2::ZERO,
            force: Vector2::ZERO,
            mass: if mass.is_finite() && mass > 0.0 { mass } else { 0.0 },
            friction: friction.clamp(0.0, 1.0),
            restitution: restitution.clamp(0.0, 1.0),
        })
    }

    #[must_use]
    pub fn with_velocity(mut self, velocity: Vector2) -> Self {
        self.velocity = velocity;
        self
    }

    #[must_use]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    #[must_use]
    pub fn friction(&self) -> f64 {
        self.friction
    }

    #[must_use]
    pub fn restitution(&self) -> f64 {
        self.restitution
    }

    pub fn set_mass(&mut self, mass: f64) -> anyhow::Result<()> {
        if self.kind == BodyKind::Dynamic {
            anyhow::ensure!(
                mass.is_finite() && mass > 0.0,
                "dynamic body {} needs a positive mass, got {}",
                self.id,
                mass
            );
        }
        self.mass = mass;
        Ok(())
    }

    pub fn set_friction(&mut self, friction: f64) {
        if friction.is_finite() {
            self.friction = friction.clamp(0.0, 1.0);
        }
    }

    pub fn set_restitution(&mut self, restitution: f64) {
        if restitution.is_finite() {
            self.restitution = restitution.clamp(0.0, 1.0);
        }
    }

    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.kind == BodyKind::Dynamic
    }

    /// Zero for kinematic and static bodies, so they absorb no correction.
    #[must_use]
    pub fn inverse_mass(&self) -> f64 {
        if self.is_dynamic() {
            1.0 / self.mass
        } else {
            0.0
        }
    }

    #[must_use]
    pub fn kinetic_energy(&self) -> f64 {
        if self.is_dynamic() {
            0.5 * self.mass * self.velocity.length_squared()
        } else {
            0.0
        }
    }

    /// Axis-aligned bounds as `(min, max)`.
    #[must_use]
    pub fn bounds(&self) -> (Vector2, Vector2) {
        let h = self.shape.half_extents();
        (self.position - h, self.position + h)
    }
}
