use crate::gameplay::collision::Aabb;
use bevy::prelude::*;

/// Distance under which a patrol snaps onto its waypoint instead of stepping.
pub const PATROL_ARRIVAL_EPSILON: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnemyMotion {
    /// Ping-pong between `from` and `to`. `target` is the endpoint currently approached.
    Patrol { from: Vec2, to: Vec2, target: Vec2 },
    /// Closed path around `base`. `frequency` scales the vertical phase; 1.0 traces a circle.
    Oscillator {
        base: Vec2,
        amplitude: f32,
        frequency: f32,
        phase: f32,
    },
}

impl EnemyMotion {
    pub fn patrol(from: Vec2, to: Vec2) -> Self {
        Self::Patrol {
            from,
            to,
            target: to,
        }
    }

    pub fn oscillator(base: Vec2, amplitude: f32, frequency: f32) -> Self {
        Self::Oscillator {
            base,
            amplitude,
            frequency,
            phase: 0.0,
        }
    }

    /// Where an enemy with this motion sits before its first step.
    pub fn start_position(&self) -> Vec2 {
        match *self {
            Self::Patrol { from, .. } => from,
            Self::Oscillator {
                base,
                amplitude,
                frequency,
                phase,
            } => oscillator_point(base, amplitude, frequency, phase),
        }
    }

    pub fn update(&mut self, position: &mut Vec2, speed: f32, dt: f32) {
        match self {
            Self::Patrol { from, to, target } => {
                if *from == *to {
                    return;
                }
                let step = speed * dt;
                let remaining = target.distance(*position);
                if remaining <= step + PATROL_ARRIVAL_EPSILON {
                    *position = *target;
                    *target = if *target == *to { *from } else { *to };
                } else {
                    *position += (*target - *position) / remaining * step;
                }
            }
            Self::Oscillator {
                base,
                amplitude,
                frequency,
                phase,
            } => {
                if *amplitude <= 0.0 {
                    *position = *base;
                    return;
                }
                *phase += speed * dt / *amplitude;
                *position = oscillator_point(*base, *amplitude, *frequency, *phase);
            }
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Patrol { .. } => "patrol",
            Self::Oscillator { .. } => "oscillator",
        }
    }
}

fn oscillator_point(base: Vec2, amplitude: f32, frequency: f32, phase: f32) -> Vec2 {
    base + Vec2::new(phase.cos(), (phase * frequency).sin()) * amplitude
}

/// Plain enemy state stepped by the enemies plugin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyBody {
    pub position: Vec2,
    pub speed: f32,
    pub half_extents: Vec2,
    pub motion: EnemyMotion,
}

impl EnemyBody {
    pub fn new(motion: EnemyMotion, speed: f32, half_extents: Vec2) -> Self {
        Self {
            position: motion.start_position(),
            speed,
            half_extents,
            motion,
        }
    }

    pub fn update(&mut self, dt: f32) {
        self.motion.update(&mut self.position, self.speed, dt);
    }

    pub fn hitbox(&self) -> Aabb {
        Aabb::from_center_half_extents(self.position, self.half_extents)
    }
}
