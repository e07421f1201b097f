use crate::gameplay::track::ActiveTrack;
use crate::gameplay::vehicle::{PlayerCableCar, VehicleTelemetry};
use crate::gameplay::GameplaySet;
use crate::states::{BestLevelTimes, GameState, LevelProgress};
use bevy::prelude::*;

const HUD_PANEL_Z_INDEX: i32 = 190;
const HUD_PANEL_BG: Color = Color::srgba(0.06, 0.09, 0.12, 0.86);
const HUD_PANEL_BORDER: Color = Color::srgba(0.58, 0.68, 0.76, 0.92);
const HUD_TEXT_PRIMARY: Color = Color::srgb(0.94, 0.97, 1.0);
const HUD_TEXT_MUTED: Color = Color::srgb(0.76, 0.83, 0.9);
const HUD_BAR_WIDTH_PX: f32 = 260.0;
const HUD_PAUSED_Z_INDEX: i32 = 250;

pub struct GameHudPlugin;

impl Plugin for GameHudPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(GameState::InRun), spawn_game_hud)
            .add_systems(OnExit(GameState::Results), cleanup_game_hud)
            .add_systems(OnEnter(GameState::Pause), spawn_pause_banner)
            .add_systems(OnExit(GameState::Pause), cleanup_pause_banner)
            .add_systems(Update, update_game_hud.in_set(GameplaySet::Presentation));
    }
}

#[derive(Component)]
struct GameHudRoot;

#[derive(Component)]
struct PauseBannerRoot;

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
enum HudTextKind {
    Level,
    Timer,
    Passengers,
    Motion,
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
enum HudBarKind {
    Passengers,
    Progress,
}

fn spawn_game_hud(mut commands: Commands, existing_hud: Query<Entity, With<GameHudRoot>>) {
    if !existing_hud.is_empty() {
        return;
    }

    commands
        .spawn((
            Name::new("GameHudRoot"),
            GameHudRoot,
            Node {
                position_type: PositionType::Absolute,
                left: Val::Px(12.0),
                top: Val::Px(10.0),
                ..default()
            },
            ZIndex(HUD_PANEL_Z_INDEX),
        ))
        .with_children(|root| {
            root.spawn((
                Name::new("GameHudMainPanel"),
                Node {
                    width: Val::Px(340.0),
                    flex_direction: FlexDirection::Column,
                    row_gap: Val::Px(6.0),
                    padding: UiRect::all(Val::Px(12.0)),
                    border: UiRect::all(Val::Px(1.0)),
                    ..default()
                },
                BackgroundColor(HUD_PANEL_BG),
                BorderColor::all(HUD_PANEL_BORDER),
            ))
            .with_children(|panel| {
                spawn_hud_text(panel, HudTextKind::Level, "Level", 26.0, HUD_TEXT_PRIMARY);
                spawn_hud_text(panel, HudTextKind::Timer, "Time 0.00s", 18.0, HUD_TEXT_PRIMARY);
                spawn_hud_text(
                    panel,
                    HudTextKind::Passengers,
                    "Passengers 0",
                    18.0,
                    HUD_TEXT_PRIMARY,
                );
                spawn_hud_bar(panel, HudBarKind::Passengers, Color::srgb(0.38, 0.90, 0.34));
                spawn_hud_text(
                    panel,
                    HudTextKind::Motion,
                    "Speed 0.0 | Progress 0%",
                    16.0,
                    HUD_TEXT_MUTED,
                );
                spawn_hud_bar(panel, HudBarKind::Progress, Color::srgb(0.35, 0.62, 0.95));
            });
        });
}

fn spawn_hud_text(
    panel: &mut ChildSpawnerCommands,
    kind: HudTextKind,
    initial: &str,
    font_size: f32,
    color: Color,
) {
    panel.spawn((
        kind,
        Text::new(initial),
        TextFont {
            font_size,
            ..default()
        },
        TextColor(color),
    ));
}

fn spawn_hud_bar(panel: &mut ChildSpawnerCommands, kind: HudBarKind, fill_color: Color) {
    panel
        .spawn((
            Node {
                width: Val::Px(HUD_BAR_WIDTH_PX),
                height: Val::Px(12.0),
                border: UiRect::all(Val::Px(1.0)),
                ..default()
            },
            BackgroundColor(Color::srgba(0.02, 0.03, 0.04, 0.84)),
            BorderColor::all(Color::srgba(0.56, 0.64, 0.70, 0.9)),
        ))
        .with_children(|bar| {
            bar.spawn((
                kind,
                Node {
                    width: Val::Px(0.0),
                    height: Val::Percent(100.0),
                    ..default()
                },
                BackgroundColor(fill_color),
            ));
        });
}

fn cleanup_game_hud(mut commands: Commands, hud_query: Query<Entity, With<GameHudRoot>>) {
    for entity in &hud_query {
        commands.entity(entity).try_despawn();
    }
}

fn update_game_hud(
    telemetry: Res<VehicleTelemetry>,
    progress: Res<LevelProgress>,
    best_times: Res<BestLevelTimes>,
    active_track: Option<Res<ActiveTrack>>,
    player_query: Query<&PlayerCableCar>,
    mut text_query: Query<(&HudTextKind, &mut Text)>,
    mut bar_query: Query<(&HudBarKind, &mut Node)>,
) {
    let starting_passengers = player_query
        .single()
        .map(|player| player.car.params().starting_passengers)
        .unwrap_or(0);
    let passenger_fraction = fraction(telemetry.passengers as f32, starting_passengers as f32);
    let progress_fraction = telemetry.progress.clamp(0.0, 1.0);

    for (kind, mut node) in &mut bar_query {
        let fill = match kind {
            HudBarKind::Passengers => passenger_fraction,
            HudBarKind::Progress => progress_fraction,
        };
        node.width = Val::Px(HUD_BAR_WIDTH_PX * fill);
    }

    let (level_id, level_name) = active_track
        .as_ref()
        .map(|track| (track.level_id.as_str(), track.level_name.as_str()))
        .unwrap_or(("", "n/a"));
    let best_suffix = best_times
        .get(level_id)
        .map(|best| format!(" (best {best:.2}s)"))
        .unwrap_or_default();

    for (kind, mut text) in &mut text_query {
        *text = match kind {
            HudTextKind::Level => Text::new(level_name.to_string()),
            HudTextKind::Timer => Text::new(format!("Time {:.2}s{best_suffix}", progress.elapsed_s)),
            HudTextKind::Passengers => Text::new(format!(
                "Passengers {} / {starting_passengers}",
                telemetry.passengers
            )),
            HudTextKind::Motion => Text::new(format!(
                "Speed {:.1} | Progress {:.0}% | {:.0} / {:.0}",
                telemetry.speed,
                progress_fraction * 100.0,
                telemetry.distance,
                telemetry.total_length
            )),
        };
    }
}

fn fraction(value: f32, max: f32) -> f32 {
    if max <= 0.0 {
        0.0
    } else {
        (value / max).clamp(0.0, 1.0)
    }
}

fn spawn_pause_banner(mut commands: Commands) {
    commands
        .spawn((
            Name::new("PauseBanner"),
            PauseBannerRoot,
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                ..default()
            },
            BackgroundColor(Color::srgba(0.01, 0.02, 0.03, 0.55)),
            ZIndex(HUD_PAUSED_Z_INDEX),
        ))
        .with_children(|parent| {
            parent.spawn((
                Text::new("PAUSED\nEsc - Resume | Enter - End Level"),
                TextFont {
                    font_size: 30.0,
                    ..default()
                },
                TextColor(HUD_TEXT_PRIMARY),
            ));
        });
}

fn cleanup_pause_banner(mut commands: Commands, banner_query: Query<Entity, With<PauseBannerRoot>>) {
    for entity in &banner_query {
        commands.entity(entity).try_despawn();
    }
}
