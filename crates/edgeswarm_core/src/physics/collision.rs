//! Broad phase, narrow phase and impulse response.

use edgeswarm_data::{PhysicsObject, Shape, Vector2};

const CONTACT_EPSILON: f64 = 1e-9;

/// Contact between two bodies. `normal` points from the first body to the second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub normal: Vector2,
    pub penetration: f64,
}

impl Contact {
    fn flipped(self) -> Self {
        Self {
            normal: -self.normal,
            penetration: self.penetration,
        }
    }
}

/// Bounding-box overlap test used by the broad phase.
#[must_use]
pub fn bounds_overlap(a: &PhysicsObject, b: &PhysicsObject) -> bool {
    let (a_min, a_max) = a.bounds();
    let (b_min, b_max) = b.bounds();
    a_min.x <= b_max.x && a_max.x >= b_min.x && a_min.y <= b_max.y && a_max.y >= b_min.y
}

/// Pairs that can interact: at least one body must be dynamic.
#[must_use]
pub fn can_collide(a: &PhysicsObject, b: &PhysicsObject) -> bool {
    a.is_dynamic() || b.is_dynamic()
}

/// Exact contact test for a pair whose bounds overlap.
#[must_use]
pub fn detect(a: &PhysicsObject, b: &PhysicsObject) -> Option<Contact> {
    match (a.shape, b.shape) {
        (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) => {
            circle_circle(a.position, ra, b.position, rb)
        }
        (Shape::Aabb { half_extents }, Shape::Circle { radius }) => {
            box_circle(a.position, half_extents, b.position, radius)
        }
        (Shape::Circle { radius }, Shape::Aabb { half_extents }) => {
            box_circle(b.position, half_extents, a.position, radius).map(Contact::flipped)
        }
        (Shape::Aabb { half_extents: ha }, Shape::Aabb { half_extents: hb }) => {
            box_box(a.position, ha, b.position, hb)
        }
    }
}

fn circle_circle(pa: Vector2, ra: f64, pb: Vector2, rb: f64) -> Option<Contact> {
    let delta = pb - pa;
    let dist = delta.length();
    let reach = ra + rb;
    if dist >= reach {
        return None;
    }
    let normal = if dist > CONTACT_EPSILON {
        delta * (1.0 / dist)
    } else {
        Vector2::new(0.0, 1.0)
    };
    Some(Contact {
        normal,
        penetration: reach - dist,
    })
}

/// Normal points from the box towards the circle.
fn box_circle(center: Vector2, half: Vector2, circle: Vector2, radius: f64) -> Option<Contact> {
    let local = circle - center;
    let closest = Vector2::new(local.x.clamp(-half.x, half.x), local.y.clamp(-half.y, half.y));
    let inside = closest == local;

    if inside {
        // Circle centre is inside the box: push out through the nearest face.
        let dx = half.x - local.x.abs();
        let dy = half.y - local.y.abs();
        let (normal, depth) = if dx < dy {
            (Vector2::new(local.x.signum_or_one(), 0.0), dx)
        } else {
            (Vector2::new(0.0, local.y.signum_or_one()), dy)
        };
        return Some(Contact {
            normal,
            penetration: depth + radius,
        });
    }

    let offset = local - closest;
    let dist = offset.length();
    if dist >= radius {
        return None;
    }
    Some(Contact {
        normal: offset * (1.0 / dist.max(CONTACT_EPSILON)),
        penetration: radius - dist,
    })
}

fn box_box(pa: Vector2, ha: Vector2, pb: Vector2, hb: Vector2) -> Option<Contact> {
    let delta = pb - pa;
    let overlap_x = ha.x + hb.x - delta.x.abs();
    let overlap_y = ha.y + hb.y - delta.y.abs();
    if overlap_x <= 0.0 || overlap_y <= 0.0 {
        return None;
    }
    if overlap_x < overlap_y {
        Some(Contact {
            normal: Vector2::new(delta.x.signum_or_one(), 0.0),
            penetration: overlap_x,
        })
    } else {
        Some(Contact {
            normal: Vector2::new(0.0, delta.y.signum_or_one()),
            penetration: overlap_y,
        })
    }
}

trait SignumOrOne {
    fn signum_or_one(self) -> f64;
}

impl SignumOrOne for f64 {
    fn signum_or_one(self) -> f64 {
        if self < 0.0 {
            -1.0
        } else {
            1.0
        }
    }
}

/// Separates the pair and applies normal and friction impulses.
///
/// Bodies with zero inverse mass absorb no correction. Restitution and
/// friction use the smaller coefficient of the pair.
pub fn resolve(a: &mut PhysicsObject, b: &mut PhysicsObject, contact: &Contact) {
    let inv_a = a.inverse_mass();
    let inv_b = b.inverse_mass();
    let inv_sum = inv_a + inv_b;
    if inv_sum <= 0.0 {
        return;
    }
    let n = contact.normal;

    let correction = n * (contact.penetration / inv_sum);
    a.position -= correction * inv_a;
    b.position += correction * inv_b;

    let relative = b.velocity - a.velocity;
    let closing = relative.dot(n);
    if closing >= 0.0 {
        return;
    }

    let restitution = a.restitution().min(b.restitution());
    let jn = -(1.0 + restitution) * closing / inv_sum;
    let impulse = n * jn;
    a.velocity -= impulse * inv_a;
    b.velocity += impulse * inv_b;

    let relative = b.velocity - a.velocity;
    let tangential = relative - n * relative.dot(n);
    let speed = tangential.length();
    if speed < CONTACT_EPSILON {
        return;
    }
    let t = tangential * (1.0 / speed);
    let limit = a.friction().min(b.friction()) * jn;
    let jt = (-relative.dot(t) / inv_sum).clamp(-limit, limit);
    a.velocity -= t * (jt * inv_a);
    b.velocity += t * (jt * inv_b);
}
