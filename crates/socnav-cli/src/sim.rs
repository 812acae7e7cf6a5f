//! Simulated perception feed: people pacing back and forth along corridors,
//! plus one static non-person object.

use chrono::{DateTime, Utc};
use socnav_types::{AgentObservation, AgentSnapshot, ObjectClass, Vec3};

/// Half-length of each corridor (metres).
const CORRIDOR_HALF_LENGTH: f64 = 4.0;
/// Spacing between corridors along y (metres).
const CORRIDOR_SPACING: f64 = 1.5;
const WALKING_SPEED: f64 = 1.2;
/// Class tag of the static clutter object.
const CLUTTER_CLASS: ObjectClass = ObjectClass(2);

#[derive(Debug, Clone, Copy)]
struct Walker {
    x: f64,
    y: f64,
    vx: f64,
}

/// Deterministic generator of feed batches.
pub struct PeopleSimulator {
    walkers: Vec<Walker>,
    frame_id: String,
    person_class: ObjectClass,
}

impl PeopleSimulator {
    pub fn new(people: usize, frame_id: impl Into<String>, person_class: ObjectClass) -> Self {
        let walkers = (0..people)
            .map(|i| {
                let direction = if i % 2 == 0 { 1.0 } else { -1.0 };
                Walker {
                    x: -CORRIDOR_HALF_LENGTH + (i as f64 * 0.7) % (2.0 * CORRIDOR_HALF_LENGTH),
                    y: i as f64 * CORRIDOR_SPACING,
                    vx: direction * WALKING_SPEED,
                }
            })
            .collect();
        Self {
            walkers,
            frame_id: frame_id.into(),
            person_class,
        }
    }

    /// Advance every walker by `dt` seconds, turning around at corridor ends.
    pub fn step(&mut self, dt: f64) {
        for w in &mut self.walkers {
            w.x += w.vx * dt;
            if w.x > CORRIDOR_HALF_LENGTH {
                w.x = 2.0 * CORRIDOR_HALF_LENGTH - w.x;
                w.vx = -w.vx;
            } else if w.x < -CORRIDOR_HALF_LENGTH {
                w.x = -2.0 * CORRIDOR_HALF_LENGTH - w.x;
                w.vx = -w.vx;
            }
        }
    }

    /// Current state as a feed batch stamped `stamp`.
    pub fn snapshot(&self, stamp: DateTime<Utc>) -> AgentSnapshot {
        let mut observations: Vec<AgentObservation> = self
            .walkers
            .iter()
            .map(|w| {
                AgentObservation::new(
                    self.person_class,
                    Vec3::new(w.x, w.y, 0.0),
                    Vec3::new(w.vx, 0.0, 0.0),
                )
            })
            .collect();
        observations.push(AgentObservation::new(
            CLUTTER_CLASS,
            Vec3::new(0.0, -2.0, 0.0),
            Vec3::zero(),
        ));
        let mut snapshot = AgentSnapshot::new(stamp, observations);
        snapshot.frame_id = self.frame_id.clone();
        snapshot
    }
}
