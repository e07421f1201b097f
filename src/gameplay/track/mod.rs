mod rail;
pub mod spline;

pub use spline::{Track, TrackError};

use crate::config::{GameConfig, LevelConfig};
use crate::states::{GameState, LevelProgress, RunSummary};
use bevy::prelude::*;
use rail::{build_rail_profile, build_rail_strip_mesh};
use std::sync::Arc;

const RAIL_THICKNESS: f32 = 6.0;
const RAIL_Z: f32 = 1.0;
const STATION_SIZE: Vec2 = Vec2::new(18.0, 70.0);
const STATION_Z: f32 = 0.5;
const PYLON_SPACING: f32 = 320.0;
const PYLON_SIZE: Vec2 = Vec2::new(8.0, 120.0);
const PYLON_Z: f32 = 0.2;

pub struct TrackGameplayPlugin;

impl Plugin for TrackGameplayPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(GameState::Loading), load_active_track)
            .add_systems(OnExit(GameState::Results), cleanup_track_scene);
    }
}

/// Track of the level currently being played.
#[derive(Resource, Debug, Clone)]
pub struct ActiveTrack {
    pub level_id: String,
    pub level_name: String,
    pub track: Arc<Track>,
}

impl ActiveTrack {
    pub fn from_level(level: &LevelConfig) -> Result<Self, TrackError> {
        Ok(Self {
            level_id: level.id.clone(),
            level_name: level.name.clone(),
            track: Arc::new(Track::new(level.track_points())?),
        })
    }
}

#[derive(Component)]
struct TrackVisual;

#[allow(clippy::too_many_arguments)]
fn load_active_track(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<ColorMaterial>>,
    config: Res<GameConfig>,
    progress: Res<LevelProgress>,
    existing_visuals: Query<Entity, With<TrackVisual>>,
    mut run_summary: ResMut<RunSummary>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    for entity in &existing_visuals {
        commands.entity(entity).try_despawn();
    }

    let level_index = progress.level_index.unwrap_or(0);
    let Some(level) = config.level_at(level_index) else {
        error!("Level index {level_index} is out of range; returning to results.");
        *run_summary = RunSummary::default();
        next_state.set(GameState::Results);
        return;
    };

    let active_track = match ActiveTrack::from_level(level) {
        Ok(active_track) => active_track,
        Err(error) => {
            error!("Failed to build track for level `{}`: {error}", level.id);
            *run_summary = RunSummary {
                level_id: level.id.clone(),
                level_name: level.name.clone(),
                ..default()
            };
            next_state.set(GameState::Results);
            return;
        }
    };

    let track = &active_track.track;
    info!(
        "Loaded level `{}` \"{}\": {} waypoints, {} polyline points, length {:.1}, {} enemies.",
        level.id,
        level.name,
        track.control_points().len(),
        track.polyline().len(),
        track.total_length(),
        level.enemies.len()
    );

    spawn_track_scene(&mut commands, &mut meshes, &mut materials, track);
    commands.insert_resource(active_track);
}

fn spawn_track_scene(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<ColorMaterial>,
    track: &Track,
) {
    let profile = build_rail_profile(track.polyline(), RAIL_THICKNESS);
    commands.spawn((
        Name::new("TrackRail"),
        TrackVisual,
        Mesh2d(meshes.add(build_rail_strip_mesh(&profile, 0.0))),
        MeshMaterial2d(materials.add(ColorMaterial::from(Color::srgb(0.74, 0.78, 0.82)))),
        Transform::from_xyz(0.0, 0.0, RAIL_Z),
    ));

    for (label, point, color) in [
        ("TrackStartStation", track.start(), Color::srgb(0.30, 0.66, 0.42)),
        ("TrackEndStation", track.end(), Color::srgb(0.86, 0.70, 0.28)),
    ] {
        commands.spawn((
            Name::new(label),
            TrackVisual,
            Sprite::from_color(color, STATION_SIZE),
            Transform::from_xyz(point.x, point.y, STATION_Z),
        ));
    }

    let pylon_count = (track.total_length() / PYLON_SPACING).floor() as usize;
    for index in 1..=pylon_count {
        let point = track.position_at_distance(index as f32 * PYLON_SPACING);
        commands.spawn((
            Name::new("TrackPylon"),
            TrackVisual,
            Sprite::from_color(Color::srgb(0.24, 0.27, 0.31), PYLON_SIZE),
            Transform::from_xyz(point.x, point.y - PYLON_SIZE.y * 0.5, PYLON_Z),
        ));
    }
}

fn cleanup_track_scene(mut commands: Commands, visuals: Query<Entity, With<TrackVisual>>) {
    for entity in &visuals {
        commands.entity(entity).try_despawn();
    }
    commands.remove_resource::<ActiveTrack>();
}
