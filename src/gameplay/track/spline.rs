//! Rail geometry: Catmull-Rom resampling of level waypoints and arc-length lookup.
//!
//! A [`Track`] is built once per level and never mutated. Everything downstream
//! (cable car position, heading, rail mesh) reads it by distance along the rail.

use bevy::prelude::*;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Parameter step used while walking each Catmull-Rom window.
pub const CATMULL_ROM_STEP: f32 = 0.01;
/// Waypoint count at which the rail switches from straight segments to a spline.
pub const MIN_SMOOTHED_POINTS: usize = 4;
const MIN_TRACK_POINTS: usize = 2;
const DEGENERATE_SEGMENT_EPSILON: f32 = 1.0e-6;

#[derive(Debug, Clone, PartialEq)]
pub enum TrackError {
    TooFewPoints { found: usize },
    NonFinitePoint { index: usize },
}

impl Display for TrackError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewPoints { found } => write!(
                f,
                "a track needs at least {MIN_TRACK_POINTS} points, got {found}"
            ),
            Self::NonFinitePoint { index } => {
                write!(f, "track point {index} has a non-finite coordinate")
            }
        }
    }
}

impl Error for TrackError {}

#[derive(Debug, Clone)]
pub struct Track {
    control_points: Vec<Vec2>,
    polyline: Vec<Vec2>,
    segment_lengths: Vec<f32>,
    /// Arc length at the end of each segment.
    cumulative_lengths: Vec<f32>,
    /// Unit direction per segment; degenerate segments borrow a neighbour's.
    directions: Vec<Vec2>,
    total_length: f32,
}

impl Track {
    pub fn new(control_points: Vec<Vec2>) -> Result<Self, TrackError> {
        if control_points.len() < MIN_TRACK_POINTS {
            return Err(TrackError::TooFewPoints {
                found: control_points.len(),
            });
        }
        if let Some(index) = control_points
            .iter()
            .position(|point| !point.is_finite())
        {
            return Err(TrackError::NonFinitePoint { index });
        }

        let polyline = if control_points.len() >= MIN_SMOOTHED_POINTS {
            resample_catmull_rom(&control_points)
        } else {
            control_points.clone()
        };

        let segment_lengths: Vec<f32> = polyline
            .windows(2)
            .map(|pair| pair[0].distance(pair[1]))
            .collect();

        let mut cumulative_lengths = Vec::with_capacity(segment_lengths.len());
        let mut running = 0.0_f32;
        for length in &segment_lengths {
            running += *length;
            cumulative_lengths.push(running);
        }
        let total_length: f32 = segment_lengths.iter().sum();

        let directions = resolve_segment_directions(&polyline);

        Ok(Self {
            control_points,
            polyline,
            segment_lengths,
            cumulative_lengths,
            directions,
            total_length,
        })
    }

    pub fn control_points(&self) -> &[Vec2] {
        &self.control_points
    }

    pub fn polyline(&self) -> &[Vec2] {
        &self.polyline
    }

    pub fn total_length(&self) -> f32 {
        self.total_length
    }

    pub fn start(&self) -> Vec2 {
        self.polyline[0]
    }

    pub fn end(&self) -> Vec2 {
        self.polyline[self.polyline.len() - 1]
    }

    /// Fraction of the rail covered at `distance`, in `[0, 1]`.
    pub fn progress_at_distance(&self, distance: f32) -> f32 {
        if self.total_length <= 0.0 {
            return 1.0;
        }
        (distance / self.total_length).clamp(0.0, 1.0)
    }

    /// Segment containing `distance` and the offset into it. Only meaningful
    /// for `0 < distance < total_length`.
    fn locate(&self, distance: f32) -> (usize, f32) {
        let last = self.segment_lengths.len() - 1;
        let index = self
            .cumulative_lengths
            .partition_point(|segment_end| *segment_end < distance)
            .min(last);
        let segment_start = self.cumulative_lengths[index] - self.segment_lengths[index];
        (index, (distance - segment_start).max(0.0))
    }

    pub fn position_at_distance(&self, distance: f32) -> Vec2 {
        if distance <= 0.0 {
            return self.start();
        }
        if distance >= self.total_length {
            return self.end();
        }

        let (index, offset) = self.locate(distance);
        let length = self.segment_lengths[index];
        if length <= DEGENERATE_SEGMENT_EPSILON {
            return self.polyline[index];
        }
        self.polyline[index].lerp(self.polyline[index + 1], (offset / length).min(1.0))
    }

    /// Unit direction of the segment under `distance`. Piecewise constant.
    pub fn tangent_at_distance(&self, distance: f32) -> Vec2 {
        if distance <= 0.0 {
            return self.directions[0];
        }
        if distance >= self.total_length {
            return self.directions[self.directions.len() - 1];
        }
        let (index, _) = self.locate(distance);
        self.directions[index]
    }
}

pub fn catmull_rom(p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2, t: f32) -> Vec2 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}

fn resample_catmull_rom(control_points: &[Vec2]) -> Vec<Vec2> {
    let mut padded = Vec::with_capacity(control_points.len() + 2);
    padded.push(control_points[0]);
    padded.extend_from_slice(control_points);
    padded.push(control_points[control_points.len() - 1]);

    let samples_per_window = (1.0 / CATMULL_ROM_STEP).ceil() as usize + 1;
    let mut polyline = Vec::with_capacity((padded.len() - 3) * samples_per_window + 1);
    for window in padded.windows(4) {
        let mut t = 0.0_f32;
        while t < 1.0 {
            polyline.push(catmull_rom(window[0], window[1], window[2], window[3], t));
            t += CATMULL_ROM_STEP;
        }
    }
    polyline.push(padded[padded.len() - 2]);
    polyline
}

fn resolve_segment_directions(polyline: &[Vec2]) -> Vec<Vec2> {
    let raw: Vec<Option<Vec2>> = polyline
        .windows(2)
        .map(|pair| {
            let delta = pair[1] - pair[0];
            if delta.length() <= DEGENERATE_SEGMENT_EPSILON {
                None
            } else {
                Some(delta.normalize())
            }
        })
        .collect();

    (0..raw.len())
        .map(|index| {
            raw[index]
                .or_else(|| raw[index + 1..].iter().flatten().next().copied())
                .or_else(|| raw[..index].iter().rev().flatten().next().copied())
                .unwrap_or(Vec2::X)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1.0e-3;

    fn wavy_track() -> Track {
        Track::new(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(120.0, 40.0),
            Vec2::new(260.0, -30.0),
            Vec2::new(400.0, 60.0),
            Vec2::new(520.0, 0.0),
        ])
        .expect("valid track")
    }

    #[test]
    fn rejects_fewer_than_two_points() {
        assert_eq!(
            Track::new(vec![Vec2::ZERO]).unwrap_err(),
            TrackError::TooFewPoints { found: 1 }
        );
        assert_eq!(
            Track::new(Vec::new()).unwrap_err(),
            TrackError::TooFewPoints { found: 0 }
        );
    }

    #[test]
    fn rejects_non_finite_points() {
        let error = Track::new(vec![Vec2::ZERO, Vec2::new(f32::NAN, 1.0)]).unwrap_err();
        assert_eq!(error, TrackError::NonFinitePoint { index: 1 });
        assert!(error.to_string().contains("point 1"));
    }

    #[test]
    fn straight_two_point_track() {
        let track = Track::new(vec![Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0)]).unwrap();
        assert_eq!(track.polyline().len(), 2);
        assert_eq!(track.total_length(), 100.0);
        assert_eq!(track.position_at_distance(50.0), Vec2::new(50.0, 0.0));
        assert_eq!(track.tangent_at_distance(50.0), Vec2::new(1.0, 0.0));
    }

    #[test]
    fn two_point_length_is_exact_distance() {
        let p0 = Vec2::new(3.0, -7.0);
        let p1 = Vec2::new(-41.5, 18.25);
        let track = Track::new(vec![p0, p1]).unwrap();
        assert_eq!(track.total_length(), p0.distance(p1));
    }

    #[test]
    fn three_points_are_kept_verbatim() {
        let points = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
        ];
        let track = Track::new(points.clone()).unwrap();
        assert_eq!(track.polyline(), points.as_slice());
        assert_eq!(track.total_length(), 20.0);
        assert_eq!(track.tangent_at_distance(15.0), Vec2::Y);
    }

    #[test]
    fn total_length_matches_segment_sum() {
        let track = wavy_track();
        let sum: f32 = track.segment_lengths.iter().sum();
        assert_eq!(track.total_length(), sum);
        assert!(track.total_length() >= 0.0);
        assert_eq!(track.segment_lengths.len(), track.polyline().len() - 1);
    }

    #[test]
    fn spline_is_dense_and_hits_the_waypoints() {
        let track = wavy_track();
        let windows = track.control_points().len() - 1;
        let samples = track.polyline().len() - 1;
        assert!(samples >= windows * 100 && samples <= windows * 101);

        assert_eq!(track.start(), Vec2::new(0.0, 0.0));
        assert_eq!(track.end(), Vec2::new(520.0, 0.0));
        for waypoint in track.control_points() {
            let nearest = track
                .polyline()
                .iter()
                .map(|point| point.distance(*waypoint))
                .fold(f32::MAX, f32::min);
            assert!(nearest < EPS, "waypoint {waypoint} is {nearest} away");
        }
    }

    #[test]
    fn catmull_rom_interpolates_inner_points() {
        let p0 = Vec2::new(-1.0, 2.0);
        let p1 = Vec2::new(0.0, 0.0);
        let p2 = Vec2::new(4.0, 1.0);
        let p3 = Vec2::new(6.0, -3.0);
        assert!((catmull_rom(p0, p1, p2, p3, 0.0) - p1).length() < 1e-6);
        assert!((catmull_rom(p0, p1, p2, p3, 1.0) - p2).length() < 1e-5);
    }

    #[test]
    fn position_endpoints_and_clamping() {
        let track = wavy_track();
        let polyline = track.polyline();
        assert_eq!(track.position_at_distance(0.0), polyline[0]);
        assert_eq!(track.position_at_distance(-25.0), polyline[0]);
        assert_eq!(
            track.position_at_distance(track.total_length()),
            polyline[polyline.len() - 1]
        );
        assert_eq!(
            track.position_at_distance(track.total_length() + 500.0),
            polyline[polyline.len() - 1]
        );
    }

    #[test]
    fn lookup_moves_forward_along_the_rail() {
        let track = wavy_track();
        let steps = 997;
        let mut previous = (0_usize, 0.0_f32);
        for step in 1..steps {
            let distance = track.total_length() * step as f32 / steps as f32;
            let (index, offset) = track.locate(distance);
            assert!(
                index > previous.0 || (index == previous.0 && offset >= previous.1),
                "lookup went backwards at {distance}"
            );
            let arc = track.segment_lengths[..index].iter().sum::<f32>() + offset;
            assert!((arc - distance).abs() < 0.05);
            previous = (index, offset);
        }
    }

    #[test]
    fn tangents_are_unit_length() {
        let track = wavy_track();
        for step in 0..=200 {
            let distance = track.total_length() * step as f32 / 200.0;
            let tangent = track.tangent_at_distance(distance);
            assert!((tangent.length() - 1.0).abs() < EPS);
        }
    }

    #[test]
    fn degenerate_segments_fall_back_to_a_neighbour_direction() {
        let track = Track::new(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 50.0),
        ])
        .unwrap();
        assert_eq!(track.tangent_at_distance(0.0), Vec2::Y);
        assert_eq!(track.tangent_at_distance(25.0), Vec2::Y);
        assert_eq!(track.position_at_distance(25.0), Vec2::new(0.0, 25.0));

        let collapsed = Track::new(vec![Vec2::ONE, Vec2::ONE]).unwrap();
        assert_eq!(collapsed.total_length(), 0.0);
        assert_eq!(collapsed.tangent_at_distance(0.0), Vec2::X);
        assert_eq!(collapsed.position_at_distance(10.0), Vec2::ONE);
        assert_eq!(collapsed.progress_at_distance(0.0), 1.0);
    }

    #[test]
    fn repeated_waypoints_in_a_spline_never_produce_nan() {
        let track = Track::new(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(50.0, 20.0),
            Vec2::new(100.0, 0.0),
        ])
        .unwrap();
        for step in 0..=100 {
            let distance = track.total_length() * step as f32 / 100.0;
            assert!(track.tangent_at_distance(distance).is_finite());
            assert!(track.position_at_distance(distance).is_finite());
        }
    }
}
