//! Deterministic 2D physics sandbox.
//!
//! The engine exclusively owns its bodies. Callers influence them only through
//! [`PhysicsEngine::apply_force`], [`PhysicsEngine::set_velocity`] and the reset
//! helpers. Collision pairs are always resolved in increasing id-pair order,
//! so a run is reproducible regardless of thread count.

pub mod collision;
pub mod joint;
pub mod proximity;

pub use joint::DistanceJoint;
pub use proximity::{count_neighbors, signal, NeighborSummary};

use crate::config::PhysicsConfig;
use crate::fixed::QFormat;
use edgeswarm_data::{BodyKind, ObjectId, PhysicsObject, Shape, Vector2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Aggregate motion metrics over the dynamic bodies.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FitnessMetrics {
    /// Σ½m|v|² over the current dynamic bodies.
    pub total_kinetic_energy: f64,
    pub mean_speed: f64,
    pub max_speed: f64,
    /// Kinetic energy summed over every step since the last metrics reset.
    pub kinetic_energy_sum: f64,
    /// Highest speed observed since the last metrics reset.
    pub max_speed_seen: f64,
}

/// Outcome of one [`PhysicsEngine::simulate_step`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StepReport {
    pub substeps: u32,
    pub resolved_pairs: usize,
    /// Pairs waiting for the next step because the pair budget ran out.
    pub deferred_pairs: usize,
    pub numeric_faults: u64,
    /// The timestep was invalid and nothing moved.
    pub skipped: bool,
}

/// Cumulative counters since the engine was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineDiagnostics {
    pub steps: u64,
    pub skipped_steps: u64,
    pub numeric_faults: u64,
    pub resolved_pairs: u64,
    pub deferred_pairs: u64,
    pub rejected_commands: u64,
}

pub struct PhysicsEngine {
    config: PhysicsConfig,
    fixed: Option<QFormat>,
    objects: BTreeMap<ObjectId, PhysicsObject>,
    joints: Vec<DistanceJoint>,
    pending_pairs: VecDeque<(ObjectId, ObjectId)>,
    next_id: u32,
    kinetic_energy_sum: f64,
    max_speed_seen: f64,
    diagnostics: EngineDiagnostics,
    time: f64,
}

impl PhysicsEngine {
    pub fn new(config: PhysicsConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(config.gravity.is_finite(), "gravity must be finite");
        anyhow::ensure!(config.substeps >= 1, "substeps must be at least 1");
        let fixed = if config.fixed_point {
            Some(QFormat::new(config.fixed_point_frac_bits)?)
        } else {
            None
        };
        Ok(Self {
            config,
            fixed,
            objects: BTreeMap::new(),
            joints: Vec::new(),
            pending_pairs: VecDeque::new(),
            next_id: 0,
            kinetic_energy_sum: 0.0,
            max_speed_seen: 0.0,
            diagnostics: EngineDiagnostics::default(),
            time: 0.0,
        })
    }

    #[must_use]
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Inserts a fully built body. Its id must not be in use.
    pub fn add_object(&mut self, object: PhysicsObject) -> anyhow::Result<ObjectId> {
        let id = object.id;
        anyhow::ensure!(
            !self.objects.contains_key(&id),
            "object id {} is already in use",
            id
        );
        self.next_id = self.next_id.max(id.0.saturating_add(1));
        self.objects.insert(id, object);
        Ok(id)
    }

    /// Creates a body with the next free id and the configured default material.
    pub fn spawn(
        &mut self,
        kind: BodyKind,
        shape: Shape,
        position: Vector2,
        mass: f64,
    ) -> anyhow::Result<ObjectId> {
        let object = PhysicsObject::new(
            ObjectId(self.next_id),
            kind,
            shape,
            position,
            mass,
            self.config.default_friction,
            self.config.default_restitution,
        )?;
        self.add_object(object)
    }

    /// Removes a body together with its joints and any deferred pairs.
    pub fn remove_object(&mut self, id: ObjectId) -> Option<PhysicsObject> {
        let removed = self.objects.remove(&id)?;
        self.joints.retain(|j| !j.involves(id));
        self.pending_pairs.retain(|&(a, b)| a != id && b != id);
        Some(removed)
    }

    #[must_use]
    pub fn object(&self, id: ObjectId) -> Option<&PhysicsObject> {
        self.objects.get(&id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &PhysicsObject> {
        self.objects.values()
    }

    /// Copies of all bodies in id order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PhysicsObject> {
        self.objects.values().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Adds to the force accumulated for the next step. Only dynamic bodies
    /// accept forces; non-finite forces are rejected and counted.
    pub fn apply_force(&mut self, id: ObjectId, force: Vector2) -> bool {
        if !force.is_finite() {
            self.reject_command(id, "force");
            return false;
        }
        match self.objects.get_mut(&id) {
            Some(obj) if obj.is_dynamic() => {
                obj.force += force;
                true
            }
            _ => false,
        }
    }

    /// Sets the velocity of a dynamic or kinematic body.
    pub fn set_velocity(&mut self, id: ObjectId, velocity: Vector2) -> bool {
        if !velocity.is_finite() {
            self.reject_command(id, "velocity");
            return false;
        }
        match self.objects.get_mut(&id) {
            Some(obj) if obj.kind != BodyKind::Static => {
                obj.velocity = velocity;
                true
            }
            _ => false,
        }
    }

    pub fn set_position(&mut self, id: ObjectId, position: Vector2) -> bool {
        if !position.is_finite() {
            self.reject_command(id, "position");
            return false;
        }
        match self.objects.get_mut(&id) {
            Some(obj) => {
                obj.position = position;
                true
            }
            None => false,
        }
    }

    /// Puts a body back at `position` at rest with no pending force.
    pub fn reset_body(&mut self, id: ObjectId, position: Vector2) -> bool {
        if !self.set_position(id, position) {
            return false;
        }
        if let Some(obj) = self.objects.get_mut(&id) {
            obj.velocity = Vector2::ZERO;
            obj.force = Vector2::ZERO;
        }
        true
    }

    fn reject_command(&mut self, id: ObjectId, what: &str) {
        self.diagnostics.rejected_commands += 1;
        self.diagnostics.numeric_faults += 1;
        tracing::debug!(object = %id, command = what, "Rejected non-finite command");
    }

    /// Connects two bodies with a distance joint. The rest length defaults to
    /// their current separation.
    pub fn add_joint(
        &mut self,
        a: ObjectId,
        b: ObjectId,
        rest_length: Option<f64>,
    ) -> anyhow::Result<()> {
        anyhow::ensure!(a != b, "a joint needs two distinct bodies");
        let (Some(oa), Some(ob)) = (self.objects.get(&a), self.objects.get(&b)) else {
            anyhow::bail!("joint references a missing body ({} or {})", a, b);
        };
        let rest_length = rest_length.unwrap_or_else(|| oa.position.distance(ob.position));
        anyhow::ensure!(
            rest_length.is_finite() && rest_length >= 0.0,
            "joint rest length must be finite and non-negative"
        );
        self.joints.push(DistanceJoint { a, b, rest_length });
        Ok(())
    }

    #[must_use]
    pub fn joints(&self) -> &[DistanceJoint] {
        &self.joints
    }

    /// Builds a static base with two jointed dynamic links along +x.
    /// Returns `[base, elbow, hand]`.
    pub fn add_two_link_arm(
        &mut self,
        base: Vector2,
        link_length: f64,
        link_radius: f64,
        link_mass: f64,
    ) -> anyhow::Result<[ObjectId; 3]> {
        anyhow::ensure!(
            link_length.is_finite() && link_length > 0.0,
            "link length must be positive"
        );
        let shape = Shape::Circle {
            radius: link_radius,
        };
        let root = self.spawn(BodyKind::Static, shape, base, 0.0)?;
        let elbow = self.spawn(
            BodyKind::Dynamic,
            shape,
            base + Vector2::new(link_length, 0.0),
            link_mass,
        )?;
        let hand = self.spawn(
            BodyKind::Dynamic,
            shape,
            base + Vector2::new(2.0 * link_length, 0.0),
            link_mass,
        )?;
        self.add_joint(root, elbow, Some(link_length))?;
        self.add_joint(elbow, hand, Some(link_length))?;
        Ok([root, elbow, hand])
    }

    /// Advances the world by `dt` seconds.
    ///
    /// A non-finite or non-positive `dt` leaves the world untouched and returns
    /// a skipped report.
    pub fn simulate_step(&mut self, dt: f64) -> StepReport {
        if !dt.is_finite() || dt <= 0.0 {
            self.diagnostics.skipped_steps += 1;
            tracing::warn!(dt, "Skipped physics step with invalid timestep");
            return StepReport {
                skipped: true,
                ..StepReport::default()
            };
        }

        let substeps = if self.config.low_power {
            1
        } else {
            self.config.substeps.max(1)
        };
        let h = dt / f64::from(substeps);
        let mut budget = self.pair_budget();
        let mut report = StepReport {
            substeps,
            ..StepReport::default()
        };

        for _ in 0..substeps {
            report.numeric_faults += self.integrate(h);
            report.resolved_pairs += self.resolve_collisions(&mut budget);
            joint::relax(&mut self.objects, &self.joints, self.config.joint_iterations);
            report.numeric_faults += self.sanitize();
        }
        report.deferred_pairs = self.pending_pairs.len();

        for obj in self.objects.values_mut() {
            obj.force = Vector2::ZERO;
        }
        self.accumulate_metrics();
        self.time += dt;

        self.diagnostics.steps += 1;
        self.diagnostics.numeric_faults += report.numeric_faults;
        self.diagnostics.resolved_pairs += report.resolved_pairs as u64;
        self.diagnostics.deferred_pairs += report.deferred_pairs as u64;
        if report.numeric_faults > 0 {
            tracing::debug!(
                faults = report.numeric_faults,
                step = self.diagnostics.steps,
                "Sanitized non-finite body state"
            );
        }
        if report.deferred_pairs > 0 {
            tracing::debug!(
                deferred = report.deferred_pairs,
                "Collision budget exhausted, pairs deferred"
            );
        }
        report
    }

    fn pair_budget(&self) -> Option<usize> {
        let budget = self.config.max_collision_pairs;
        if self.config.low_power {
            let cap = self.config.low_power_max_pairs;
            Some(budget.map_or(cap, |b| b.min(cap)))
        } else {
            budget
        }
    }

    fn integrate(&mut self, h: f64) -> u64 {
        let gravity = self.config.gravity;
        let damping = 1.0 / (1.0 + self.config.linear_damping * h);
        let fixed = self.fixed;
        self.objects
            .par_iter_mut()
            .map(|(_, obj)| match fixed {
                Some(q) => integrate_body_fixed(obj, gravity, damping, h, q),
                None => integrate_body(obj, gravity, damping, h),
            })
            .sum()
    }

    /// Candidate pairs in increasing `(a, b)` id order.
    fn broad_phase(&self) -> Vec<(ObjectId, ObjectId)> {
        let bodies: Vec<&PhysicsObject> = self.objects.values().collect();
        let mut pairs = Vec::new();
        for (i, a) in bodies.iter().enumerate() {
            for b in &bodies[i + 1..] {
                if collision::can_collide(a, b) && collision::bounds_overlap(a, b) {
                    pairs.push((a.id, b.id));
                }
            }
        }
        pairs
    }

    /// Resolves deferred pairs first, then fresh ones, until the budget runs out.
    /// Pairs over budget wait for the next call.
    fn resolve_collisions(&mut self, budget: &mut Option<usize>) -> usize {
        let mut queue: Vec<(ObjectId, ObjectId)> = self.pending_pairs.drain(..).collect();
        let mut queued: BTreeSet<(ObjectId, ObjectId)> = queue.iter().copied().collect();
        for pair in self.broad_phase() {
            if queued.insert(pair) {
                queue.push(pair);
            }
        }

        let mut resolved = 0;
        for (a, b) in queue {
            match budget {
                Some(0) => {
                    self.pending_pairs.push_back((a, b));
                    continue;
                }
                Some(remaining) => *remaining -= 1,
                None => {}
            }
            self.resolve_pair(a, b);
            resolved += 1;
        }
        resolved
    }

    fn resolve_pair(&mut self, a: ObjectId, b: ObjectId) {
        let (Some(mut oa), Some(mut ob)) =
            (self.objects.get(&a).copied(), self.objects.get(&b).copied())
        else {
            return;
        };
        if let Some(contact) = collision::detect(&oa, &ob) {
            collision::resolve(&mut oa, &mut ob, &contact);
            self.objects.insert(a, oa);
            self.objects.insert(b, ob);
        }
    }

    fn sanitize(&mut self) -> u64 {
        self.objects
            .values_mut()
            .map(|obj| u64::from(obj.position.sanitize() + obj.velocity.sanitize()))
            .sum()
    }

    fn accumulate_metrics(&mut self) {
        for obj in self.objects.values().filter(|o| o.is_dynamic()) {
            self.kinetic_energy_sum += obj.kinetic_energy();
            self.max_speed_seen = self.max_speed_seen.max(obj.velocity.length());
        }
    }

    /// Deferred collision pairs still waiting.
    #[must_use]
    pub fn pending_pairs(&self) -> usize {
        self.pending_pairs.len()
    }

    pub fn clear_pending_pairs(&mut self) {
        self.pending_pairs.clear();
    }

    /// Clears the running kinetic-energy and max-speed accumulators.
    pub fn reset_metrics(&mut self) {
        self.kinetic_energy_sum = 0.0;
        self.max_speed_seen = 0.0;
    }

    #[must_use]
    pub fn get_fitness_metrics(&self) -> FitnessMetrics {
        let mut metrics = FitnessMetrics {
            kinetic_energy_sum: self.kinetic_energy_sum,
            max_speed_seen: self.max_speed_seen,
            ..FitnessMetrics::default()
        };
        let mut count = 0usize;
        let mut speed_sum = 0.0;
        for obj in self.objects.values().filter(|o| o.is_dynamic()) {
            let speed = obj.velocity.length();
            metrics.total_kinetic_energy += obj.kinetic_energy();
            metrics.max_speed = metrics.max_speed.max(speed);
            speed_sum += speed;
            count += 1;
        }
        if count > 0 {
            metrics.mean_speed = speed_sum / count as f64;
        }
        metrics
    }

    /// Neighbor count and mean signal of `id` over `candidates` within `range`.
    #[must_use]
    pub fn neighbors(&self, id: ObjectId, candidates: &[ObjectId], range: f64) -> NeighborSummary {
        let Some(me) = self.objects.get(&id) else {
            return NeighborSummary::default();
        };
        NeighborSummary::from_distances(
            candidates
                .iter()
                .filter(|&&other| other != id)
                .filter_map(|other| self.objects.get(other))
                .map(|other| me.position.distance(other.position)),
            range,
        )
    }

    #[must_use]
    pub fn diagnostics(&self) -> EngineDiagnostics {
        self.diagnostics
    }

    /// Simulated seconds since creation.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }
}

/// Semi-implicit Euler: velocity first, then position with the new velocity.
fn integrate_body(obj: &mut PhysicsObject, gravity: Vector2, damping: f64, h: f64) -> u64 {
    match obj.kind {
        BodyKind::Static => {}
        BodyKind::Kinematic => obj.position += obj.velocity * h,
        BodyKind::Dynamic => {
            let acceleration = obj.force * obj.inverse_mass() + gravity;
            obj.velocity = (obj.velocity + acceleration * h) * damping;
            obj.position += obj.velocity * h;
        }
    }
    u64::from(obj.position.sanitize() + obj.velocity.sanitize())
}

/// Same scheme as [`integrate_body`] carried out in the engine's Q format.
fn integrate_body_fixed(
    obj: &mut PhysicsObject,
    gravity: Vector2,
    damping: f64,
    h: f64,
    q: QFormat,
) -> u64 {
    let dt = q.to_fixed(h);
    let step = |p: f64, v: i32| q.add(q.to_fixed(p), q.mul(v, dt));
    match obj.kind {
        BodyKind::Static => {}
        BodyKind::Kinematic => {
            let vx = q.to_fixed(obj.velocity.x);
            let vy = q.to_fixed(obj.velocity.y);
            obj.position = Vector2::new(
                q.to_float(step(obj.position.x, vx)),
                q.to_float(step(obj.position.y, vy)),
            );
        }
        BodyKind::Dynamic => {
            let acceleration = obj.force * obj.inverse_mass() + gravity;
            let damping = q.to_fixed(damping);
            let vx = q.mul(
                q.add(q.to_fixed(obj.velocity.x), q.mul(q.to_fixed(acceleration.x), dt)),
                damping,
            );
            let vy = q.mul(
                q.add(q.to_fixed(obj.velocity.y), q.mul(q.to_fixed(acceleration.y), dt)),
                damping,
            );
            obj.velocity = Vector2::new(q.to_float(vx), q.to_float(vy));
            obj.position = Vector2::new(
                q.to_float(step(obj.position.x, vx)),
                q.to_float(step(obj.position.y, vy)),
            );
        }
    }
    u64::from(obj.position.sanitize() + obj.velocity.sanitize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> PhysicsEngine {
        PhysicsEngine::new(PhysicsConfig {
            linear_damping: 0.0,
            ..PhysicsConfig::default()
        })
        .unwrap()
    }

    fn ball(engine: &mut PhysicsEngine, x: f64, y: f64) -> ObjectId {
        engine
            .spawn(
                BodyKind::Dynamic,
                Shape::Circle { radius: 0.5 },
                Vector2::new(x, y),
                1.0,
            )
            .unwrap()
    }

    #[test]
    fn test_semi_implicit_euler() {
        let mut engine = PhysicsEngine::new(PhysicsConfig {
            gravity: Vector2::new(0.0, -10.0),
            linear_damping: 0.0,
            substeps: 1,
            ..PhysicsConfig::default()
        })
        .unwrap();
        let id = ball(&mut engine, 0.0, 0.0);
        engine.simulate_step(0.1);
        let body = engine.object(id).unwrap();
        assert!((body.velocity.y + 1.0).abs() < 1e-12);
        // Position uses the updated velocity.
        assert!((body.position.y + 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_force_is_cleared_after_step() {
        let mut engine = engine();
        let id = ball(&mut engine, 0.0, 0.0);
        assert!(engine.apply_force(id, Vector2::new(6.0, 0.0)));
        engine.simulate_step(0.5);
        let v1 = engine.object(id).unwrap().velocity;
        assert!((v1.x - 3.0).abs() < 1e-12);
        assert_eq!(engine.object(id).unwrap().force, Vector2::ZERO);
        engine.simulate_step(0.5);
        assert!((engine.object(id).unwrap().velocity.x - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_static_and_kinematic_ignore_forces() {
        let mut engine = engine();
        let wall = engine
            .spawn(
                BodyKind::Static,
                Shape::Aabb {
                    half_extents: Vector2::new(1.0, 1.0),
                },
                Vector2::new(10.0, 0.0),
                0.0,
            )
            .unwrap();
        let belt = engine
            .spawn(
                BodyKind::Kinematic,
                Shape::Circle { radius: 0.5 },
                Vector2::new(-10.0, 0.0),
                0.0,
            )
            .unwrap();
        assert!(!engine.apply_force(wall, Vector2::new(1.0, 0.0)));
        assert!(!engine.apply_force(belt, Vector2::new(1.0, 0.0)));
        assert!(!engine.set_velocity(wall, Vector2::new(1.0, 0.0)));
        assert!(engine.set_velocity(belt, Vector2::new(2.0, 0.0)));
        engine.simulate_step(1.0);
        assert_eq!(engine.object(wall).unwrap().position, Vector2::new(10.0, 0.0));
        assert!((engine.object(belt).unwrap().position.x + 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_dt_skips_step() {
        let mut engine = engine();
        let id = ball(&mut engine, 1.0, 1.0);
        engine.set_velocity(id, Vector2::new(1.0, 0.0));
        for dt in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let report = engine.simulate_step(dt);
            assert!(report.skipped);
        }
        assert_eq!(engine.object(id).unwrap().position, Vector2::new(1.0, 1.0));
        assert_eq!(engine.diagnostics().skipped_steps, 4);
    }

    #[test]
    fn test_non_finite_force_rejected() {
        let mut engine = engine();
        let id = ball(&mut engine, 0.0, 0.0);
        assert!(!engine.apply_force(id, Vector2::new(f64::NAN, 0.0)));
        assert_eq!(engine.diagnostics().rejected_commands, 1);
        engine.simulate_step(0.1);
        assert!(engine.object(id).unwrap().position.is_finite());
    }

    #[test]
    fn test_overflow_is_sanitized() {
        let mut engine = engine();
        let id = ball(&mut engine, 0.0, 0.0);
        engine.set_velocity(id, Vector2::new(f64::MAX, 0.0));
        engine.apply_force(id, Vector2::new(f64::MAX, 0.0));
        let report = engine.simulate_step(1.0);
        assert!(report.numeric_faults > 0);
        let body = engine.object(id).unwrap();
        assert!(body.position.is_finite() && body.velocity.is_finite());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut engine = engine();
        let id = ball(&mut engine, 0.0, 0.0);
        let copy = *engine.object(id).unwrap();
        assert!(engine.add_object(copy).is_err());
    }

    #[test]
    fn test_overlapping_bodies_separate() {
        let mut engine = engine();
        let a = ball(&mut engine, 0.0, 0.0);
        let b = ball(&mut engine, 0.6, 0.0);
        let report = engine.simulate_step(1.0 / 60.0);
        assert!(report.resolved_pairs >= 1);
        let pa = engine.object(a).unwrap().position;
        let pb = engine.object(b).unwrap().position;
        assert!(pa.distance(pb) >= 1.0 - 1e-9);
    }

    #[test]
    fn test_pair_budget_defers_without_dropping() {
        let mut engine = PhysicsEngine::new(PhysicsConfig {
            max_collision_pairs: Some(1),
            substeps: 1,
            linear_damping: 0.0,
            ..PhysicsConfig::default()
        })
        .unwrap();
        // Three mutually overlapping bodies give three pairs.
        ball(&mut engine, 0.0, 0.0);
        ball(&mut engine, 0.1, 0.0);
        ball(&mut engine, 0.0, 0.1);
        let first = engine.simulate_step(1.0 / 60.0);
        assert_eq!(first.resolved_pairs, 1);
        assert_eq!(first.deferred_pairs, 2);
        let second = engine.simulate_step(1.0 / 60.0);
        assert_eq!(second.resolved_pairs, 1);
        assert!(engine.diagnostics().deferred_pairs >= 2);

        engine.clear_pending_pairs();
        assert_eq!(engine.pending_pairs(), 0);
    }

    #[test]
    fn test_low_power_single_substep() {
        let mut engine = PhysicsEngine::new(PhysicsConfig {
            low_power: true,
            substeps: 4,
            ..PhysicsConfig::default()
        })
        .unwrap();
        ball(&mut engine, 0.0, 0.0);
        assert_eq!(engine.simulate_step(0.1).substeps, 1);
    }

    #[test]
    fn test_remove_object_drops_joints() {
        let mut engine = engine();
        let [_, elbow, hand] = engine
            .add_two_link_arm(Vector2::ZERO, 1.0, 0.1, 1.0)
            .unwrap();
        assert_eq!(engine.joints().len(), 2);
        assert!(engine.remove_object(hand).is_some());
        assert_eq!(engine.joints().len(), 1);
        assert!(engine.remove_object(hand).is_none());
        assert!(engine.object(elbow).is_some());
    }

    #[test]
    fn test_two_link_arm_holds_rest_length() {
        let mut engine = PhysicsEngine::new(PhysicsConfig {
            gravity: Vector2::new(0.0, -9.81),
            ..PhysicsConfig::default()
        })
        .unwrap();
        let [base, elbow, hand] = engine
            .add_two_link_arm(Vector2::ZERO, 1.0, 0.1, 1.0)
            .unwrap();
        for _ in 0..240 {
            engine.simulate_step(1.0 / 60.0);
        }
        let p = |id| engine.object(id).unwrap().position;
        assert_eq!(p(base), Vector2::ZERO);
        assert!((p(base).distance(p(elbow)) - 1.0).abs() < 0.05);
        assert!((p(elbow).distance(p(hand)) - 1.0).abs() < 0.05);
        // The arm swung down under gravity.
        assert!(p(elbow).y + p(hand).y < 0.0);
    }

    #[test]
    fn test_fitness_metrics() {
        let mut engine = engine();
        let a = ball(&mut engine, 0.0, 0.0);
        let b = ball(&mut engine, 5.0, 0.0);
        engine.set_velocity(a, Vector2::new(3.0, 4.0));
        engine.set_velocity(b, Vector2::new(0.0, 1.0));
        let metrics = engine.get_fitness_metrics();
        assert!((metrics.total_kinetic_energy - 13.0).abs() < 1e-12);
        assert!((metrics.mean_speed - 3.0).abs() < 1e-12);
        assert!((metrics.max_speed - 5.0).abs() < 1e-12);

        engine.simulate_step(0.01);
        assert!(engine.get_fitness_metrics().max_speed_seen > 4.9);
        engine.reset_metrics();
        assert_eq!(engine.get_fitness_metrics().kinetic_energy_sum, 0.0);
    }

    #[test]
    fn test_neighbors_within_range() {
        let mut engine = engine();
        let a = ball(&mut engine, 0.0, 0.0);
        let b = ball(&mut engine, 1.0, 0.0);
        let c = ball(&mut engine, 9.0, 0.0);
        let summary = engine.neighbors(a, &[a, b, c], 5.0);
        assert_eq!(summary.count, 1);
        assert!((summary.avg_signal - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_fixed_point_mode_tracks_float() {
        let config = PhysicsConfig {
            linear_damping: 0.0,
            ..PhysicsConfig::default()
        };
        let mut float = PhysicsEngine::new(config.clone()).unwrap();
        let mut fixed = PhysicsEngine::new(PhysicsConfig {
            fixed_point: true,
            fixed_point_frac_bits: 16,
            ..config
        })
        .unwrap();
        let a = ball(&mut float, 0.0, 0.0);
        let b = ball(&mut fixed, 0.0, 0.0);
        for _ in 0..60 {
            float.apply_force(a, Vector2::new(1.0, 0.5));
            fixed.apply_force(b, Vector2::new(1.0, 0.5));
            float.simulate_step(1.0 / 60.0);
            fixed.simulate_step(1.0 / 60.0);
        }
        let pa = float.object(a).unwrap().position;
        let pb = fixed.object(b).unwrap().position;
        assert!(pa.distance(pb) < 0.01, "{pa:?} vs {pb:?}");
    }
}
