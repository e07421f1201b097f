//! Longitudinal dynamics of the cable car along its rail.
//!
//! The car is a scalar distance plus a signed speed. Position and heading are
//! read back from the [`Track`]; every mutation keeps the distance inside
//! `[0, track.total_length()]` and the speed inside `[-max_speed, max_speed]`.

use crate::gameplay::collision::{rotated_rect_corners, Aabb};
use crate::gameplay::track::Track;
use bevy::prelude::*;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CableCarParams {
    pub max_speed: f32,
    pub acceleration: f32,
    pub friction: f32,
    pub gravity_accel: f32,
    pub gravity_enabled: bool,
    pub gravity_direction: Vec2,
    /// Speeds below this magnitude snap to zero after an update. Zero disables.
    pub dead_zone_speed: f32,
    pub collision_base_impulse: f32,
    pub collision_relative_factor: f32,
    pub collision_tick_seconds: f32,
    pub half_extents: Vec2,
    pub starting_passengers: u32,
}

impl Default for CableCarParams {
    fn default() -> Self {
        Self {
            max_speed: 400.0,
            acceleration: 500.0,
            friction: 60.0,
            gravity_accel: 150.0,
            gravity_enabled: true,
            gravity_direction: Vec2::NEG_Y,
            dead_zone_speed: 0.5,
            collision_base_impulse: 100.0,
            collision_relative_factor: 0.8,
            collision_tick_seconds: 0.16,
            half_extents: Vec2::new(20.0, 30.0),
            starting_passengers: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TrackBound {
    Moving,
    #[default]
    AtStart,
    AtEnd,
}

#[derive(Debug, Clone)]
pub struct CableCar {
    track: Arc<Track>,
    params: CableCarParams,
    distance_along_track: f32,
    speed: f32,
    heading: f32,
    passengers: u32,
}

impl CableCar {
    pub fn new(track: Arc<Track>, params: CableCarParams) -> Self {
        let heading = heading_of(track.tangent_at_distance(0.0));
        Self {
            track,
            params,
            distance_along_track: 0.0,
            speed: 0.0,
            heading,
            passengers: params.starting_passengers,
        }
    }

    pub fn reset(&mut self) {
        self.distance_along_track = 0.0;
        self.speed = 0.0;
        self.heading = heading_of(self.track.tangent_at_distance(0.0));
        self.passengers = self.params.starting_passengers;
    }

    pub fn set_params(&mut self, params: CableCarParams) {
        self.params = params;
        self.speed = self.clamp_speed(self.speed);
    }

    pub fn track(&self) -> &Arc<Track> {
        &self.track
    }

    pub fn params(&self) -> &CableCarParams {
        &self.params
    }

    pub fn distance_along_track(&self) -> f32 {
        self.distance_along_track
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Radians, from the rail tangent at the current distance.
    pub fn heading(&self) -> f32 {
        self.heading
    }

    pub fn passengers(&self) -> u32 {
        self.passengers
    }

    pub fn position(&self) -> Vec2 {
        self.track.position_at_distance(self.distance_along_track)
    }

    pub fn progress(&self) -> f32 {
        self.track.progress_at_distance(self.distance_along_track)
    }

    pub fn bound(&self) -> TrackBound {
        if self.distance_along_track <= 0.0 {
            TrackBound::AtStart
        } else if self.distance_along_track >= self.track.total_length() {
            TrackBound::AtEnd
        } else {
            TrackBound::Moving
        }
    }

    pub fn accelerate(&mut self, dt: f32) {
        self.speed = self.clamp_speed(self.speed + self.params.acceleration * dt);
    }

    pub fn decelerate(&mut self, dt: f32) {
        self.speed = self.clamp_speed(self.speed - self.params.acceleration * dt);
    }

    pub fn apply_friction(&mut self, dt: f32) {
        let drop = self.params.friction * dt;
        if self.speed > 0.0 {
            self.speed = (self.speed - drop).max(0.0);
        } else if self.speed < 0.0 {
            self.speed = (self.speed + drop).min(0.0);
        }
    }

    /// Rail-constrained gravity: the downhill component of the tangent pulls the car.
    pub fn apply_gravity(&mut self, dt: f32) {
        if !self.params.gravity_enabled {
            return;
        }
        let tangent = self.track.tangent_at_distance(self.distance_along_track);
        let along_tangent = self.params.gravity_direction.dot(tangent) * self.params.gravity_accel;
        self.speed = self.clamp_speed(self.speed + along_tangent * dt);
    }

    pub fn update(&mut self, dt: f32) {
        self.apply_gravity(dt);

        self.distance_along_track += self.speed * dt;
        self.clamp_to_track();

        self.heading = heading_of(self.track.tangent_at_distance(self.distance_along_track));

        if self.speed.abs() < self.params.dead_zone_speed {
            self.speed = 0.0;
        }
    }

    pub fn hit_enemy(&mut self, enemy_speed: f32) {
        self.passengers = self.passengers.saturating_sub(1);

        let relative = enemy_speed - self.speed;
        let impulse =
            relative.abs() * self.params.collision_relative_factor + self.params.collision_base_impulse;
        let direction = if relative != 0.0 {
            relative.signum()
        } else if self.speed > 0.0 {
            -1.0
        } else {
            1.0
        };

        self.speed = self.clamp_speed(self.speed + direction * impulse);
        self.distance_along_track += self.speed * self.params.collision_tick_seconds;
        self.clamp_to_track();
    }

    pub fn hitbox_corners(&self) -> [Vec2; 4] {
        rotated_rect_corners(self.position(), self.params.half_extents, self.heading)
    }

    /// Axis-aligned bounds of the rotated car body.
    pub fn hitbox(&self) -> Aabb {
        Aabb::from_corners(self.hitbox_corners())
    }

    pub fn snapshot(&self) -> CableCarSnapshot {
        let position = self.position();
        CableCarSnapshot {
            distance_along_track: self.distance_along_track,
            total_length: self.track.total_length(),
            speed: self.speed,
            heading_rad: self.heading,
            position: [position.x, position.y],
            passengers: self.passengers,
            bound: self.bound(),
        }
    }

    /// A non-positive or NaN `max_speed` pins the car at rest.
    fn clamp_speed(&self, speed: f32) -> f32 {
        let max_speed = self.params.max_speed.max(0.0);
        speed.clamp(-max_speed, max_speed)
    }

    fn clamp_to_track(&mut self) {
        let total_length = self.track.total_length();
        if self.distance_along_track < 0.0 {
            self.distance_along_track = 0.0;
            self.speed = 0.0;
        } else if self.distance_along_track > total_length {
            self.distance_along_track = total_length;
            self.speed = 0.0;
        }
    }
}

/// Serializable view of the car, dumped by the debug tooling.
#[derive(Debug, Clone, Serialize)]
pub struct CableCarSnapshot {
    pub distance_along_track: f32,
    pub total_length: f32,
    pub speed: f32,
    pub heading_rad: f32,
    pub position: [f32; 2],
    pub passengers: u32,
    pub bound: TrackBound,
}

fn heading_of(tangent: Vec2) -> f32 {
    tangent.y.atan2(tangent.x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_4;

    const EPS: f32 = 1.0e-4;

    fn flat_track() -> Arc<Track> {
        Arc::new(Track::new(vec![Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0)]).unwrap())
    }

    fn flat_params() -> CableCarParams {
        CableCarParams {
            gravity_enabled: false,
            ..CableCarParams::default()
        }
    }

    fn car_with_speed(speed: f32) -> CableCar {
        let mut car = CableCar::new(flat_track(), flat_params());
        car.speed = speed;
        car
    }

    #[test]
    fn accelerate_clamps_to_max_speed() {
        let mut car = car_with_speed(100.0);
        car.accelerate(1.0);
        assert_eq!(car.speed(), 400.0);

        car.decelerate(2.0);
        assert_eq!(car.speed(), -400.0);
    }

    #[test]
    fn accelerate_then_decelerate_is_symmetric() {
        for &(start, dt) in &[(0.0, 0.016), (-120.0, 0.1), (37.5, 0.25), (250.0, 0.2)] {
            let mut car = car_with_speed(start);
            car.accelerate(dt);
            car.decelerate(dt);
            assert!((car.speed() - start).abs() < EPS, "start {start} dt {dt}");
        }
    }

    #[test]
    fn friction_never_flips_direction() {
        let mut car = car_with_speed(30.0);
        car.apply_friction(0.1);
        assert!((car.speed() - 24.0).abs() < EPS);
        car.apply_friction(10.0);
        assert_eq!(car.speed(), 0.0);

        let mut reversing = car_with_speed(-5.0);
        reversing.apply_friction(1.0);
        assert_eq!(reversing.speed(), 0.0);

        let mut still = car_with_speed(0.0);
        still.apply_friction(1.0);
        assert_eq!(still.speed(), 0.0);
    }

    #[test]
    fn update_at_end_of_track_stops_the_car() {
        let mut car = car_with_speed(50.0);
        car.distance_along_track = 100.0;
        car.update(1.0);
        assert_eq!(car.distance_along_track(), 100.0);
        assert_eq!(car.speed(), 0.0);
        assert_eq!(car.bound(), TrackBound::AtEnd);
    }

    #[test]
    fn update_keeps_distance_on_the_rail() {
        for &(speed, dt) in &[(400.0, 1_000.0), (-400.0, 3.0), (399.0, 0.2), (-12.0, 0.5)] {
            let mut car = car_with_speed(speed);
            car.distance_along_track = 40.0;
            car.update(dt);
            let distance = car.distance_along_track();
            assert!((0.0..=100.0).contains(&distance), "distance {distance}");
        }
    }

    #[test]
    fn car_only_leaves_a_bound_under_renewed_force() {
        let mut car = car_with_speed(-80.0);
        car.distance_along_track = 10.0;
        car.update(1.0);
        assert_eq!(car.bound(), TrackBound::AtStart);
        assert_eq!(car.speed(), 0.0);

        car.update(1.0);
        assert_eq!(car.bound(), TrackBound::AtStart);

        car.accelerate(0.1);
        car.update(0.1);
        assert_eq!(car.bound(), TrackBound::Moving);
        assert!((car.distance_along_track() - 5.0).abs() < EPS);
    }

    #[test]
    fn dead_zone_snaps_creeping_speed() {
        let mut car = car_with_speed(0.3);
        car.distance_along_track = 50.0;
        car.update(0.016);
        assert_eq!(car.speed(), 0.0);

        let mut disabled = CableCar::new(
            flat_track(),
            CableCarParams {
                dead_zone_speed: 0.0,
                ..flat_params()
            },
        );
        disabled.speed = 0.3;
        disabled.distance_along_track = 50.0;
        disabled.update(0.016);
        assert_eq!(disabled.speed(), 0.3);
    }

    #[test]
    fn hit_at_rest_kicks_forward() {
        let mut car = car_with_speed(0.0);
        car.distance_along_track = 50.0;
        car.hit_enemy(0.0);
        assert_eq!(car.speed(), 100.0);
        assert_eq!(car.passengers(), 4);
        assert!((car.distance_along_track() - 66.0).abs() < EPS);
    }

    #[test]
    fn hit_while_moving_forward_against_a_still_enemy_pushes_back() {
        let mut car = car_with_speed(200.0);
        car.distance_along_track = 50.0;
        car.hit_enemy(0.0);
        // relative = -200, impulse = 260, direction -1
        assert!((car.speed() + 60.0).abs() < EPS);
        assert!((car.distance_along_track() - 40.4).abs() < EPS);
    }

    #[test]
    fn hit_with_equal_speed_uses_the_tie_break() {
        let mut car = car_with_speed(120.0);
        car.distance_along_track = 50.0;
        car.hit_enemy(120.0);
        assert!((car.speed() - 20.0).abs() < EPS);
    }

    #[test]
    fn hit_clamps_speed_and_position() {
        let mut car = car_with_speed(390.0);
        car.distance_along_track = 95.0;
        car.hit_enemy(900.0);
        assert_eq!(car.distance_along_track(), 100.0);
        assert_eq!(car.speed(), 0.0);
    }

    #[test]
    fn passengers_floor_at_zero() {
        let mut car = car_with_speed(0.0);
        car.distance_along_track = 50.0;
        for _ in 0..8 {
            car.hit_enemy(10.0);
        }
        assert_eq!(car.passengers(), 0);
        car.reset();
        assert_eq!(car.passengers(), 5);
        assert_eq!(car.distance_along_track(), 0.0);
    }

    #[test]
    fn non_positive_max_speed_keeps_the_car_at_rest() {
        let mut car = car_with_speed(120.0);
        for max_speed in [0.0, -5.0, f32::NAN] {
            car.set_params(CableCarParams {
                max_speed,
                ..flat_params()
            });
            assert_eq!(car.speed(), 0.0);
            car.accelerate(0.016);
            car.decelerate(0.016);
            car.hit_enemy(50.0);
            car.update(0.016);
            assert_eq!(car.speed(), 0.0, "max_speed {max_speed}");
        }
    }

    #[test]
    fn gravity_pulls_downhill() {
        let slope = Arc::new(
            Track::new(vec![Vec2::new(0.0, 100.0), Vec2::new(100.0, 0.0)]).unwrap(),
        );
        let mut car = CableCar::new(slope, CableCarParams::default());
        car.update(0.1);
        // dot((0,-1), (1,-1)/sqrt2) * 150 * 0.1
        let expected = FRAC_PI_4.cos() * 150.0 * 0.1;
        assert!((car.speed() - expected).abs() < EPS);
        assert!(car.distance_along_track() > 0.0);
        assert!((car.heading() + FRAC_PI_4).abs() < EPS);
    }

    #[test]
    fn gravity_is_optional() {
        let slope = Arc::new(
            Track::new(vec![Vec2::new(0.0, 100.0), Vec2::new(100.0, 0.0)]).unwrap(),
        );
        let mut car = CableCar::new(slope, flat_params());
        car.update(1.0);
        assert_eq!(car.speed(), 0.0);
        assert_eq!(car.distance_along_track(), 0.0);
    }

    #[test]
    fn hitbox_wraps_the_rotated_body() {
        let diagonal = Arc::new(
            Track::new(vec![Vec2::new(0.0, 0.0), Vec2::new(100.0, 100.0)]).unwrap(),
        );
        let mut car = CableCar::new(diagonal, flat_params());
        car.speed = 50.0;
        car.update(0.5);

        let hitbox = car.hitbox();
        for corner in car.hitbox_corners() {
            assert!(hitbox.min.x <= corner.x + EPS && corner.x <= hitbox.max.x + EPS);
            assert!(hitbox.min.y <= corner.y + EPS && corner.y <= hitbox.max.y + EPS);
        }
        // 45 degrees: both extents equal (20 + 30) * sqrt(2)
        let expected = 50.0 * std::f32::consts::SQRT_2;
        assert!((hitbox.size().x - expected).abs() < 1e-2);
        assert!((hitbox.size().y - expected).abs() < 1e-2);
        assert!((hitbox.center() - car.position()).length() < 1e-2);
    }

    #[test]
    fn tightening_max_speed_reclamps_current_speed() {
        let mut car = car_with_speed(350.0);
        car.set_params(CableCarParams {
            max_speed: 200.0,
            ..flat_params()
        });
        assert_eq!(car.speed(), 200.0);
    }
}
