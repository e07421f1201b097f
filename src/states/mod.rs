use crate::config::GameConfig;
use crate::gameplay::track::ActiveTrack;
use crate::gameplay::vehicle::PlayerCableCar;
use crate::gameplay::GameplaySet;
use bevy::app::AppExit;
use bevy::prelude::*;
use std::collections::HashMap;

#[derive(States, Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum GameState {
    #[default]
    Boot,
    Loading,
    InRun,
    Pause,
    Results,
}

pub struct GameStatePlugin;

impl Plugin for GameStatePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LevelProgress>()
            .init_resource::<RunSummary>()
            .init_resource::<BestLevelTimes>()
            .add_systems(Startup, setup_camera)
            .add_systems(OnEnter(GameState::Boot), enter_boot)
            .add_systems(
                Update,
                boot_to_loading
                    .run_if(in_state(GameState::Boot))
                    .run_if(resource_exists::<GameConfig>),
            )
            .add_systems(OnEnter(GameState::Loading), enter_loading)
            .add_systems(
                Update,
                loading_to_in_run.run_if(in_state(GameState::Loading)),
            )
            .add_systems(OnEnter(GameState::InRun), enter_in_run)
            .add_systems(
                Update,
                (advance_level_timer, check_level_outcome)
                    .chain()
                    .in_set(GameplaySet::Progress),
            )
            .add_systems(
                Update,
                in_run_controls.run_if(in_state(GameState::InRun)),
            )
            .add_systems(OnEnter(GameState::Pause), enter_pause)
            .add_systems(Update, pause_controls.run_if(in_state(GameState::Pause)))
            .add_systems(OnEnter(GameState::Results), enter_results)
            .add_systems(OnExit(GameState::Results), cleanup_results_screen)
            .add_systems(
                Update,
                results_controls.run_if(in_state(GameState::Results)),
            );
    }
}

#[derive(Component)]
struct ResultsScreenRoot;

/// Which level is being played and how long the current attempt has run.
#[derive(Resource, Debug, Clone, Default)]
pub struct LevelProgress {
    pub level_index: Option<usize>,
    pub elapsed_s: f32,
}

#[derive(Resource, Debug, Clone, Default)]
pub struct RunSummary {
    pub level_id: String,
    pub level_name: String,
    pub elapsed_s: f32,
    pub passengers: u32,
    pub completed: bool,
    pub was_game_over: bool,
    pub new_best: bool,
}

/// Fastest completion per level id for this session.
#[derive(Resource, Debug, Clone, Default)]
pub struct BestLevelTimes(pub HashMap<String, f32>);

impl BestLevelTimes {
    /// Returns true when `elapsed_s` beats (or sets) the record.
    pub fn record(&mut self, level_id: &str, elapsed_s: f32) -> bool {
        match self.0.get_mut(level_id) {
            Some(best) if *best <= elapsed_s => false,
            Some(best) => {
                *best = elapsed_s;
                true
            }
            None => {
                self.0.insert(level_id.to_string(), elapsed_s);
                true
            }
        }
    }

    pub fn get(&self, level_id: &str) -> Option<f32> {
        self.0.get(level_id).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelOutcome {
    Running,
    Completed,
    OutOfPassengers,
}

/// Completion wins over an empty car on the same frame.
pub fn evaluate_level_outcome(
    progress: f32,
    passengers: u32,
    end_run_when_out_of_passengers: bool,
) -> LevelOutcome {
    if progress >= 1.0 {
        LevelOutcome::Completed
    } else if passengers == 0 && end_run_when_out_of_passengers {
        LevelOutcome::OutOfPassengers
    } else {
        LevelOutcome::Running
    }
}

/// Level to load after leaving the results screen.
pub fn level_after_results(config: &GameConfig, current: usize, summary: &RunSummary) -> usize {
    if summary.completed {
        config.next_level_index(current)
    } else {
        current
    }
}

fn setup_camera(mut commands: Commands) {
    commands.spawn(Camera2d);
}

fn enter_boot() {
    info!("Entered state: Boot");
}

fn boot_to_loading(
    config: Res<GameConfig>,
    mut progress: ResMut<LevelProgress>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    progress.level_index = Some(resolve_level_index(&config, progress.level_index));
    next_state.set(GameState::Loading);
}

/// Level to load from `Boot`: the current one while it still exists, else the
/// configured starting level, else the first level.
pub fn resolve_level_index(config: &GameConfig, current: Option<usize>) -> usize {
    if let Some(index) = current {
        if config.level_at(index).is_some() {
            return index;
        }
        warn!("Level index {index} no longer exists after a config reload.");
    }

    let starting_level = &config.game.app.starting_level;
    config.level_index(starting_level).unwrap_or_else(|| {
        warn!("Starting level `{starting_level}` not found; falling back to the first level.");
        0
    })
}

fn enter_loading(mut progress: ResMut<LevelProgress>) {
    progress.elapsed_s = 0.0;
    info!("Entered state: Loading");
}

fn loading_to_in_run(
    active_track: Option<Res<ActiveTrack>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if active_track.is_some() {
        next_state.set(GameState::InRun);
    }
}

fn enter_in_run(active_track: Option<Res<ActiveTrack>>) {
    match active_track {
        Some(active_track) => info!(
            "Entered state: InRun (level `{}` \"{}\")",
            active_track.level_id, active_track.level_name
        ),
        None => info!("Entered state: InRun"),
    }
}

fn advance_level_timer(time: Res<Time>, mut progress: ResMut<LevelProgress>) {
    progress.elapsed_s += time.delta_secs();
}

fn check_level_outcome(
    config: Res<GameConfig>,
    progress: Res<LevelProgress>,
    active_track: Option<Res<ActiveTrack>>,
    player_query: Query<&PlayerCableCar>,
    mut best_times: ResMut<BestLevelTimes>,
    mut run_summary: ResMut<RunSummary>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    let Some(active_track) = active_track else {
        return;
    };
    let Ok(player) = player_query.single() else {
        return;
    };

    let outcome = evaluate_level_outcome(
        player.car.progress(),
        player.car.passengers(),
        config.game.app.end_run_when_out_of_passengers,
    );
    if outcome == LevelOutcome::Running {
        return;
    }

    let completed = outcome == LevelOutcome::Completed;
    *run_summary = RunSummary {
        level_id: active_track.level_id.clone(),
        level_name: active_track.level_name.clone(),
        elapsed_s: progress.elapsed_s,
        passengers: player.car.passengers(),
        completed,
        was_game_over: !completed,
        new_best: completed && best_times.record(&active_track.level_id, progress.elapsed_s),
    };

    if completed {
        info!(
            "Level `{}` completed in {:.2}s with {} passengers.",
            run_summary.level_id, run_summary.elapsed_s, run_summary.passengers
        );
    } else {
        info!(
            "Out of passengers on level `{}` after {:.2}s.",
            run_summary.level_id, run_summary.elapsed_s
        );
    }
    next_state.set(GameState::Results);
}

fn in_run_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if keyboard.just_pressed(KeyCode::Escape) {
        next_state.set(GameState::Pause);
    }
}

fn enter_pause() {
    info!("Entered state: Pause");
}

fn pause_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    progress: Res<LevelProgress>,
    active_track: Option<Res<ActiveTrack>>,
    player_query: Query<&PlayerCableCar>,
    mut run_summary: ResMut<RunSummary>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if keyboard.just_pressed(KeyCode::Escape) {
        next_state.set(GameState::InRun);
        return;
    }

    if keyboard.just_pressed(KeyCode::Enter) {
        let (level_id, level_name) = active_track
            .map(|track| (track.level_id.clone(), track.level_name.clone()))
            .unwrap_or_default();
        let passengers = player_query
            .single()
            .map(|player| player.car.passengers())
            .unwrap_or(0);
        *run_summary = RunSummary {
            level_id,
            level_name,
            elapsed_s: progress.elapsed_s,
            passengers,
            completed: false,
            was_game_over: false,
            new_best: false,
        };
        info!("Level abandoned from pause.");
        next_state.set(GameState::Results);
    }
}

fn enter_results(
    mut commands: Commands,
    run_summary: Res<RunSummary>,
    best_times: Res<BestLevelTimes>,
) {
    let title = if run_summary.completed {
        "LEVEL COMPLETE"
    } else if run_summary.was_game_over {
        "GAME OVER"
    } else {
        "LEVEL ENDED"
    };
    let best_line = match best_times.get(&run_summary.level_id) {
        Some(best) if run_summary.new_best => format!("Best: {best:.2}s (new record)"),
        Some(best) => format!("Best: {best:.2}s"),
        None => "Best: --".to_string(),
    };
    let continue_line = if run_summary.completed {
        "Space - Next Level"
    } else {
        "Space - Retry Level"
    };
    let summary_text = format!(
        "Level: {name} ({id})\n\
Time: {elapsed:.2}s\n\
Passengers: {passengers}\n\
{best_line}\n\n\
{continue_line}\n\
Q - Quit",
        name = run_summary.level_name,
        id = run_summary.level_id,
        elapsed = run_summary.elapsed_s,
        passengers = run_summary.passengers,
    );

    commands
        .spawn((
            Name::new("ResultsOverlay"),
            ResultsScreenRoot,
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                ..default()
            },
            BackgroundColor(Color::srgba(0.01, 0.02, 0.03, 0.90)),
            ZIndex(300),
        ))
        .with_children(|parent| {
            parent
                .spawn((
                    Node {
                        width: Val::Percent(50.0),
                        max_width: Val::Px(720.0),
                        min_width: Val::Px(420.0),
                        flex_direction: FlexDirection::Column,
                        row_gap: Val::Px(10.0),
                        padding: UiRect::all(Val::Px(16.0)),
                        border: UiRect::all(Val::Px(1.0)),
                        ..default()
                    },
                    BackgroundColor(Color::srgba(0.08, 0.10, 0.13, 0.96)),
                    BorderColor::all(Color::srgba(0.56, 0.62, 0.68, 0.92)),
                ))
                .with_children(|panel| {
                    panel.spawn((
                        Text::new(title),
                        TextFont {
                            font_size: 48.0,
                            ..default()
                        },
                        TextColor(Color::srgb(0.94, 0.97, 1.00)),
                    ));
                    panel.spawn((
                        Text::new(summary_text),
                        TextFont {
                            font_size: 22.0,
                            ..default()
                        },
                        TextColor(Color::srgb(0.90, 0.94, 0.98)),
                    ));
                });
        });

    info!("Entered state: Results");
}

fn cleanup_results_screen(
    mut commands: Commands,
    results_screen_query: Query<Entity, With<ResultsScreenRoot>>,
) {
    for entity in &results_screen_query {
        commands.entity(entity).try_despawn();
    }
}

fn results_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    config: Option<Res<GameConfig>>,
    run_summary: Res<RunSummary>,
    mut progress: ResMut<LevelProgress>,
    mut next_state: ResMut<NextState<GameState>>,
    mut exit: MessageWriter<AppExit>,
) {
    if keyboard.just_pressed(KeyCode::Space) {
        if let (Some(config), Some(current)) = (config, progress.level_index) {
            progress.level_index = Some(level_after_results(&config, current, &run_summary));
        }
        next_state.set(GameState::Boot);
    }

    if keyboard.just_pressed(KeyCode::KeyQ) {
        exit.write(AppExit::Success);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GameFile, LevelsFile, VehiclesFile};

    fn two_level_config() -> GameConfig {
        let game: GameFile = toml::from_str(
            r#"
            [app]
            window_title = "t"
            starting_level = "a"
            vehicle = "v"
            "#,
        )
        .expect("game");
        let vehicles: VehiclesFile = toml::from_str(
            r#"
            [[vehicles]]
            id = "v"
            max_speed = 400.0
            acceleration = 500.0
            friction = 60.0
            gravity_accel = 150.0
            "#,
        )
        .expect("vehicles");
        let levels: LevelsFile = toml::from_str(
            r#"
            [[levels]]
            id = "a"
            name = "A"
            track = [[0.0, 0.0], [10.0, 0.0]]

            [[levels]]
            id = "b"
            name = "B"
            track = [[0.0, 0.0], [10.0, 0.0]]
            "#,
        )
        .expect("levels");
        GameConfig::from_files(game, vehicles, levels).expect("config")
    }

    #[test]
    fn completion_beats_an_empty_car() {
        assert_eq!(evaluate_level_outcome(1.0, 0, true), LevelOutcome::Completed);
        assert_eq!(evaluate_level_outcome(0.4, 0, true), LevelOutcome::OutOfPassengers);
        assert_eq!(evaluate_level_outcome(0.4, 0, false), LevelOutcome::Running);
        assert_eq!(evaluate_level_outcome(0.99, 3, true), LevelOutcome::Running);
    }

    #[test]
    fn results_advance_only_after_completion() {
        let config = two_level_config();
        let completed = RunSummary {
            completed: true,
            ..default()
        };
        let game_over = RunSummary {
            was_game_over: true,
            ..default()
        };

        assert_eq!(level_after_results(&config, 0, &completed), 1);
        assert_eq!(level_after_results(&config, 1, &completed), 0);
        assert_eq!(level_after_results(&config, 1, &game_over), 1);
    }

    #[test]
    fn stale_level_index_falls_back_to_the_starting_level() {
        let config = two_level_config();
        assert_eq!(resolve_level_index(&config, None), 0);
        assert_eq!(resolve_level_index(&config, Some(1)), 1);
        assert_eq!(resolve_level_index(&config, Some(5)), 0);
    }

    #[test]
    fn best_times_keep_the_fastest_run() {
        let mut best = BestLevelTimes::default();
        assert!(best.record("a", 12.0));
        assert!(!best.record("a", 13.5));
        assert!(best.record("a", 9.25));
        assert_eq!(best.get("a"), Some(9.25));
        assert_eq!(best.get("b"), None);
    }
}
