use edgeswarm_data::{ObjectId, PhysicsObject};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const JOINT_EPSILON: f64 = 1e-9;

/// Keeps two bodies at a fixed distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceJoint {
    pub a: ObjectId,
    pub b: ObjectId,
    pub rest_length: f64,
}

impl DistanceJoint {
    #[must_use]
    pub fn involves(&self, id: ObjectId) -> bool {
        self.a == id || self.b == id
    }

    /// Current deviation from the rest length, if both bodies exist.
    #[must_use]
    pub fn error(&self, objects: &BTreeMap<ObjectId, PhysicsObject>) -> Option<f64> {
        let a = objects.get(&self.a)?;
        let b = objects.get(&self.b)?;
        Some(a.position.distance(b.position) - self.rest_length)
    }
}

/// Iterative relaxation over all joints.
///
/// Each pass projects every joint's bodies toward the rest length, split by
/// inverse mass, and removes the relative velocity along the joint axis.
pub fn relax(
    objects: &mut BTreeMap<ObjectId, PhysicsObject>,
    joints: &[DistanceJoint],
    iterations: u32,
) {
    for _ in 0..iterations {
        for joint in joints {
            let (Some(&a), Some(&b)) = (objects.get(&joint.a), objects.get(&joint.b)) else {
                continue;
            };
            let inv_a = a.inverse_mass();
            let inv_b = b.inverse_mass();
            let inv_sum = inv_a + inv_b;
            if inv_sum <= 0.0 {
                continue;
            }
            let delta = b.position - a.position;
            let dist = delta.length();
            if dist < JOINT_EPSILON {
                continue;
            }
            let axis = delta * (1.0 / dist);
            let stretch = dist - joint.rest_length;
            let relative_speed = (b.velocity - a.velocity).dot(axis);

            if let Some(body) = objects.get_mut(&joint.a) {
                body.position += axis * (stretch * inv_a / inv_sum);
                body.velocity += axis * (relative_speed * inv_a / inv_sum);
            }
            if let Some(body) = objects.get_mut(&joint.b) {
                body.position -= axis * (stretch * inv_b / inv_sum);
                body.velocity -= axis * (relative_speed * inv_b / inv_sum);
            }
        }
    }
}
