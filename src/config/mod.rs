use crate::gameplay::enemies::EnemyMotion;
use crate::gameplay::vehicle::CableCarParams;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = "config";

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, load_game_config)
            .add_systems(Update, reload_game_config_hotkey)
            .add_systems(
                Update,
                apply_window_title.run_if(resource_exists_and_changed::<GameConfig>),
            );
    }
}

fn load_game_config(mut commands: Commands) {
    let config = GameConfig::load_from_dir(Path::new(CONFIG_DIR)).unwrap_or_else(|error| {
        panic!("failed to load configuration from `{CONFIG_DIR}`: {error}");
    });

    log_config_summary("Loaded", &config);
    info!("Press F5 to hot-reload config files from `{CONFIG_DIR}`.");

    commands.insert_resource(config);
}

fn reload_game_config_hotkey(
    keyboard: Res<ButtonInput<KeyCode>>,
    game_config: Option<ResMut<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::F5) {
        return;
    }

    let Some(mut current_config) = game_config else {
        warn!("Config hot-reload requested, but `GameConfig` resource is not initialized yet.");
        return;
    };

    match GameConfig::load_from_dir(Path::new(CONFIG_DIR)) {
        Ok(new_config) => {
            *current_config = new_config;
            log_config_summary("Hot-reloaded", &current_config);
        }
        Err(error) => {
            error!("Config hot-reload failed; keeping previous config: {error}");
        }
    }
}

fn apply_window_title(
    config: Res<GameConfig>,
    mut window_query: Query<&mut Window, With<PrimaryWindow>>,
) {
    let Ok(mut window) = window_query.single_mut() else {
        return;
    };
    if window.title != config.game.app.window_title {
        window.title = config.game.app.window_title.clone();
    }
}

fn log_config_summary(prefix: &str, config: &GameConfig) {
    let enemy_count: usize = config
        .levels
        .levels
        .iter()
        .map(|level| level.enemies.len())
        .sum();
    info!(
        "{prefix} config: {} levels ({} enemies total), {} vehicles, starting level `{}`, vehicle `{}`.",
        config.levels.levels.len(),
        enemy_count,
        config.vehicles_by_id.len(),
        config.game.app.starting_level,
        config.game.app.vehicle
    );
}

#[derive(Resource, Debug, Clone)]
pub struct GameConfig {
    pub game: GameFile,
    pub vehicles: VehiclesFile,
    pub levels: LevelsFile,
    pub vehicles_by_id: HashMap<String, VehicleConfig>,
    pub levels_by_id: HashMap<String, LevelConfig>,
}

impl GameConfig {
    pub fn load_from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        let game: GameFile = read_toml(&config_dir.join("game.toml"))?;
        let vehicles: VehiclesFile = read_toml(&config_dir.join("vehicles.toml"))?;
        let levels: LevelsFile = read_toml(&config_dir.join("levels.toml"))?;
        Self::from_files(game, vehicles, levels)
    }

    pub fn from_files(
        game: GameFile,
        vehicles: VehiclesFile,
        levels: LevelsFile,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            vehicles_by_id: to_index("vehicles.toml::vehicles", &vehicles.vehicles)?,
            levels_by_id: to_index("levels.toml::levels", &levels.levels)?,
            game,
            vehicles,
            levels,
        };

        config.validate_references()?;
        Ok(config)
    }

    /// Vehicle tuning selected by `game.toml::app.vehicle`.
    pub fn active_vehicle(&self) -> Option<&VehicleConfig> {
        self.vehicles_by_id.get(&self.game.app.vehicle)
    }

    /// Position of a level in `levels.toml` play order.
    pub fn level_index(&self, level_id: &str) -> Option<usize> {
        self.levels
            .levels
            .iter()
            .position(|level| level.id == level_id)
    }

    pub fn level_at(&self, index: usize) -> Option<&LevelConfig> {
        self.levels.levels.get(index)
    }

    /// Index of the level after `index`, wrapping to the first.
    pub fn next_level_index(&self, index: usize) -> usize {
        let count = self.levels.levels.len();
        if count == 0 {
            0
        } else {
            (index + 1) % count
        }
    }

    fn validate_references(&self) -> Result<(), ConfigError> {
        if self.levels.levels.is_empty() {
            return Err(ConfigError::Validation(
                "levels.toml::levels must contain at least one level".to_string(),
            ));
        }

        if !self.levels_by_id.contains_key(&self.game.app.starting_level) {
            return Err(ConfigError::Validation(format!(
                "game.toml::app.starting_level references unknown level id `{}`",
                self.game.app.starting_level
            )));
        }

        if !self.vehicles_by_id.contains_key(&self.game.app.vehicle) {
            return Err(ConfigError::Validation(format!(
                "game.toml::app.vehicle references unknown vehicle id `{}`",
                self.game.app.vehicle
            )));
        }

        let enemy_half_extents = self.game.enemies.half_extents;
        if enemy_half_extents[0] <= 0.0 || enemy_half_extents[1] <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::enemies.half_extents must be > 0 on both axes".to_string(),
            ));
        }
        if self.game.camera.follow_smoothing_hz < 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::camera.follow_smoothing_hz must be >= 0".to_string(),
            ));
        }
        if self.game.camera.zoom <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::camera.zoom must be > 0".to_string(),
            ));
        }

        for (index, vehicle) in self.vehicles.vehicles.iter().enumerate() {
            validate_vehicle(index, vehicle)?;
        }

        for (index, level) in self.levels.levels.iter().enumerate() {
            validate_level(index, level)?;
        }

        Ok(())
    }
}

pub fn validate_vehicle(index: usize, vehicle: &VehicleConfig) -> Result<(), ConfigError> {
    let positive = [
        ("max_speed", vehicle.max_speed),
        ("acceleration", vehicle.acceleration),
        ("half_extents[0]", vehicle.half_extents[0]),
        ("half_extents[1]", vehicle.half_extents[1]),
    ];
    for (field, value) in positive {
        if !(value > 0.0) {
            return Err(ConfigError::Validation(format!(
                "vehicles.toml::vehicles[{index}].{field} must be > 0"
            )));
        }
    }

    let non_negative = [
        ("friction", vehicle.friction),
        ("gravity_accel", vehicle.gravity_accel),
        ("dead_zone_speed", vehicle.dead_zone_speed),
        ("collision_base_impulse", vehicle.collision_base_impulse),
        ("collision_relative_factor", vehicle.collision_relative_factor),
        ("collision_tick_seconds", vehicle.collision_tick_seconds),
    ];
    for (field, value) in non_negative {
        if !(value >= 0.0) {
            return Err(ConfigError::Validation(format!(
                "vehicles.toml::vehicles[{index}].{field} must be >= 0"
            )));
        }
    }

    let gravity_direction = Vec2::from_array(vehicle.gravity_direction);
    if !gravity_direction.is_finite() || gravity_direction.length_squared() <= f32::EPSILON {
        return Err(ConfigError::Validation(format!(
            "vehicles.toml::vehicles[{index}].gravity_direction must be a finite non-zero vector"
        )));
    }

    Ok(())
}

fn validate_level(index: usize, level: &LevelConfig) -> Result<(), ConfigError> {
    if level.name.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "levels.toml::levels[{index}].name cannot be empty"
        )));
    }

    if level.track.len() < 2 {
        return Err(ConfigError::Validation(format!(
            "levels.toml::levels[{index}].track must contain at least 2 points (found {})",
            level.track.len()
        )));
    }
    if let Some(point_index) = level
        .track
        .iter()
        .position(|point| !Vec2::from_array(*point).is_finite())
    {
        return Err(ConfigError::Validation(format!(
            "levels.toml::levels[{index}].track[{point_index}] must be finite"
        )));
    }

    for (enemy_index, enemy) in level.enemies.iter().enumerate() {
        let field_prefix = format!("levels.toml::levels[{index}].enemies[{enemy_index}]");
        if !(enemy.speed() >= 0.0) {
            return Err(ConfigError::Validation(format!(
                "{field_prefix}.speed must be >= 0"
            )));
        }
        match enemy {
            EnemyConfig::Patrol { from, to, .. } => {
                if !Vec2::from_array(*from).is_finite() || !Vec2::from_array(*to).is_finite() {
                    return Err(ConfigError::Validation(format!(
                        "{field_prefix} patrol endpoints must be finite"
                    )));
                }
            }
            EnemyConfig::Oscillator {
                base,
                amplitude,
                frequency,
                ..
            } => {
                if !Vec2::from_array(*base).is_finite() {
                    return Err(ConfigError::Validation(format!(
                        "{field_prefix}.base must be finite"
                    )));
                }
                if !(*amplitude > 0.0) {
                    return Err(ConfigError::Validation(format!(
                        "{field_prefix}.amplitude must be > 0"
                    )));
                }
                if !frequency.is_finite() {
                    return Err(ConfigError::Validation(format!(
                        "{field_prefix}.frequency must be finite"
                    )));
                }
            }
        }
    }

    Ok(())
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },
    Validation(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse `{}`: {source}", path.display())
            }
            Self::Validation(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

fn to_index<T>(label: &str, rows: &[T]) -> Result<HashMap<String, T>, ConfigError>
where
    T: HasId + Clone,
{
    let mut map = HashMap::new();

    for row in rows {
        let id = row.id();
        if id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{label} contains an empty id"
            )));
        }

        if map.insert(id.to_string(), row.clone()).is_some() {
            return Err(ConfigError::Validation(format!(
                "{label} contains duplicate id `{id}`"
            )));
        }
    }

    Ok(map)
}

trait HasId {
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameFile {
    pub app: AppConfig,
    #[serde(default)]
    pub enemies: EnemyDefaultsConfig,
    #[serde(default)]
    pub camera: CameraConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub window_title: String,
    pub starting_level: String,
    pub vehicle: String,
    #[serde(default)]
    pub debug_overlay: bool,
    #[serde(default = "default_true")]
    pub end_run_when_out_of_passengers: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnemyDefaultsConfig {
    #[serde(default = "default_enemy_half_extents")]
    pub half_extents: [f32; 2],
}

impl Default for EnemyDefaultsConfig {
    fn default() -> Self {
        Self {
            half_extents: default_enemy_half_extents(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_camera_follow_smoothing_hz")]
    pub follow_smoothing_hz: f32,
    #[serde(default = "default_camera_zoom")]
    pub zoom: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            follow_smoothing_hz: default_camera_follow_smoothing_hz(),
            zoom: default_camera_zoom(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_enemy_half_extents() -> [f32; 2] {
    [20.0, 10.0]
}

fn default_camera_follow_smoothing_hz() -> f32 {
    6.0
}

fn default_camera_zoom() -> f32 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehiclesFile {
    pub vehicles: Vec<VehicleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleConfig {
    pub id: String,
    pub max_speed: f32,
    pub acceleration: f32,
    pub friction: f32,
    pub gravity_accel: f32,
    #[serde(default = "default_true")]
    pub gravity_enabled: bool,
    #[serde(default = "default_gravity_direction")]
    pub gravity_direction: [f32; 2],
    #[serde(default = "default_dead_zone_speed")]
    pub dead_zone_speed: f32,
    #[serde(default = "default_collision_base_impulse")]
    pub collision_base_impulse: f32,
    #[serde(default = "default_collision_relative_factor")]
    pub collision_relative_factor: f32,
    #[serde(default = "default_collision_tick_seconds")]
    pub collision_tick_seconds: f32,
    #[serde(default = "default_vehicle_half_extents")]
    pub half_extents: [f32; 2],
    #[serde(default = "default_starting_passengers")]
    pub starting_passengers: u32,
}

impl VehicleConfig {
    pub fn params(&self) -> CableCarParams {
        CableCarParams {
            max_speed: self.max_speed,
            acceleration: self.acceleration,
            friction: self.friction,
            gravity_accel: self.gravity_accel,
            gravity_enabled: self.gravity_enabled,
            gravity_direction: Vec2::from_array(self.gravity_direction).normalize_or(Vec2::NEG_Y),
            dead_zone_speed: self.dead_zone_speed,
            collision_base_impulse: self.collision_base_impulse,
            collision_relative_factor: self.collision_relative_factor,
            collision_tick_seconds: self.collision_tick_seconds,
            half_extents: Vec2::from_array(self.half_extents),
            starting_passengers: self.starting_passengers,
        }
    }
}

fn default_gravity_direction() -> [f32; 2] {
    [0.0, -1.0]
}

fn default_dead_zone_speed() -> f32 {
    0.5
}

fn default_collision_base_impulse() -> f32 {
    100.0
}

fn default_collision_relative_factor() -> f32 {
    0.8
}

fn default_collision_tick_seconds() -> f32 {
    0.16
}

fn default_vehicle_half_extents() -> [f32; 2] {
    [20.0, 30.0]
}

fn default_starting_passengers() -> u32 {
    5
}

impl HasId for VehicleConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LevelsFile {
    pub levels: Vec<LevelConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LevelConfig {
    pub id: String,
    pub name: String,
    pub track: Vec<[f32; 2]>,
    #[serde(default)]
    pub enemies: Vec<EnemyConfig>,
}

impl LevelConfig {
    pub fn track_points(&self) -> Vec<Vec2> {
        self.track.iter().copied().map(Vec2::from_array).collect()
    }
}

impl HasId for LevelConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnemyConfig {
    Patrol {
        speed: f32,
        from: [f32; 2],
        to: [f32; 2],
    },
    Oscillator {
        speed: f32,
        base: [f32; 2],
        amplitude: f32,
        #[serde(default = "default_oscillator_frequency")]
        frequency: f32,
    },
}

impl EnemyConfig {
    pub fn speed(&self) -> f32 {
        match self {
            Self::Patrol { speed, .. } | Self::Oscillator { speed, .. } => *speed,
        }
    }

    pub fn motion(&self) -> EnemyMotion {
        match self {
            Self::Patrol { from, to, .. } => {
                EnemyMotion::patrol(Vec2::from_array(*from), Vec2::from_array(*to))
            }
            Self::Oscillator {
                base,
                amplitude,
                frequency,
                ..
            } => EnemyMotion::oscillator(Vec2::from_array(*base), *amplitude, *frequency),
        }
    }
}

fn default_oscillator_frequency() -> f32 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAME_TOML: &str = r#"
        [app]
        window_title = "Cable Car"
        starting_level = "meadow"
        vehicle = "classic"
        debug_overlay = true
    "#;

    const VEHICLES_TOML: &str = r#"
        [[vehicles]]
        id = "classic"
        max_speed = 400.0
        acceleration = 500.0
        friction = 60.0
        gravity_accel = 150.0
    "#;

    const LEVELS_TOML: &str = r#"
        [[levels]]
        id = "meadow"
        name = "Meadow"
        track = [[0.0, 0.0], [200.0, 40.0], [400.0, 0.0], [600.0, 80.0]]

        [[levels.enemies]]
        kind = "patrol"
        speed = 80.0
        from = [100.0, 60.0]
        to = [300.0, 60.0]

        [[levels.enemies]]
        kind = "oscillator"
        speed = 120.0
        base = [500.0, 40.0]
        amplitude = 50.0

        [[levels]]
        id = "ridge"
        name = "Ridge"
        track = [[0.0, 0.0], [300.0, 150.0]]
    "#;

    fn parse_files(game: &str, vehicles: &str, levels: &str) -> (GameFile, VehiclesFile, LevelsFile) {
        (
            toml::from_str(game).expect("game.toml"),
            toml::from_str(vehicles).expect("vehicles.toml"),
            toml::from_str(levels).expect("levels.toml"),
        )
    }

    fn load(game: &str, vehicles: &str, levels: &str) -> Result<GameConfig, ConfigError> {
        let (game, vehicles, levels) = parse_files(game, vehicles, levels);
        GameConfig::from_files(game, vehicles, levels)
    }

    #[test]
    fn sample_files_load_with_defaults() {
        let config = load(GAME_TOML, VEHICLES_TOML, LEVELS_TOML).expect("valid config");

        assert!(config.game.app.end_run_when_out_of_passengers);
        assert_eq!(config.game.enemies.half_extents, [20.0, 10.0]);
        assert_eq!(config.levels_by_id.len(), 2);

        let params = config.active_vehicle().expect("active vehicle").params();
        assert_eq!(params, CableCarParams::default());

        let meadow = &config.levels_by_id["meadow"];
        assert_eq!(meadow.track_points().len(), 4);
        assert!(matches!(
            meadow.enemies[1],
            EnemyConfig::Oscillator { frequency, .. } if frequency == 1.0
        ));
        assert_eq!(meadow.enemies[0].motion().kind_label(), "patrol");
    }

    #[test]
    fn level_order_wraps_around() {
        let config = load(GAME_TOML, VEHICLES_TOML, LEVELS_TOML).expect("valid config");
        assert_eq!(config.level_index("ridge"), Some(1));
        assert_eq!(config.next_level_index(0), 1);
        assert_eq!(config.next_level_index(1), 0);
        assert!(config.level_index("missing").is_none());
    }

    #[test]
    fn validation_fails_for_unknown_vehicle() {
        let game = GAME_TOML.replace("vehicle = \"classic\"", "vehicle = \"gondola\"");
        let message = load(&game, VEHICLES_TOML, LEVELS_TOML)
            .expect_err("validation should fail")
            .to_string();
        assert!(message.contains("app.vehicle"));
        assert!(message.contains("gondola"));
    }

    #[test]
    fn validation_fails_for_short_track() {
        let levels = LEVELS_TOML.replace("[[0.0, 0.0], [300.0, 150.0]]", "[[0.0, 0.0]]");
        let message = load(GAME_TOML, VEHICLES_TOML, &levels)
            .expect_err("validation should fail")
            .to_string();
        assert_eq!(
            message,
            "levels.toml::levels[1].track must contain at least 2 points (found 1)"
        );
    }

    #[test]
    fn validation_fails_for_non_positive_speed_and_amplitude() {
        let vehicles = VEHICLES_TOML.replace("max_speed = 400.0", "max_speed = 0.0");
        let message = load(GAME_TOML, &vehicles, LEVELS_TOML)
            .expect_err("zero max speed")
            .to_string();
        assert!(message.contains("vehicles[0].max_speed must be > 0"));

        let levels = LEVELS_TOML.replace("amplitude = 50.0", "amplitude = 0.0");
        let message = load(GAME_TOML, VEHICLES_TOML, &levels)
            .expect_err("zero amplitude")
            .to_string();
        assert!(message.contains("levels[0].enemies[1].amplitude must be > 0"));

        let levels = LEVELS_TOML.replace("speed = 80.0", "speed = -1.0");
        let message = load(GAME_TOML, VEHICLES_TOML, &levels)
            .expect_err("negative enemy speed")
            .to_string();
        assert!(message.contains("levels[0].enemies[0].speed must be >= 0"));
    }

    #[test]
    fn validation_fails_for_duplicate_level_ids() {
        let levels = LEVELS_TOML.replace("id = \"ridge\"", "id = \"meadow\"");
        let message = load(GAME_TOML, VEHICLES_TOML, &levels)
            .expect_err("validation should fail")
            .to_string();
        assert_eq!(message, "levels.toml::levels contains duplicate id `meadow`");
    }

    #[test]
    fn unknown_enemy_kind_is_a_parse_error() {
        let levels = LEVELS_TOML.replace("kind = \"patrol\"", "kind = \"spinner\"");
        assert!(toml::from_str::<LevelsFile>(&levels).is_err());
    }

    #[test]
    fn missing_file_reports_its_path() {
        let error = GameConfig::load_from_dir(Path::new("definitely/not/a/config/dir"))
            .expect_err("missing dir");
        assert!(matches!(error, ConfigError::Io { .. }));
        assert!(error.to_string().contains("game.toml"));
        assert!(error.source().is_some());
    }

    #[test]
    fn shipped_config_files_are_valid() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join(CONFIG_DIR);
        let config = GameConfig::load_from_dir(&dir).expect("shipped config");
        assert!(config.levels.levels.len() >= 2);
    }
}
