use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use renderer::{run_window, FileStore, RunConfig};
use scene::{load_saved_state, SceneConfig, Sizing, StateStore};
use sceneconfig::SceneFile;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, RunArgs};
use crate::paths::AppPaths;

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    let paths = AppPaths::discover()?;
    tracing::debug!(
        config = %paths.config_dir().display(),
        data = %paths.data_dir().display(),
        "resolved cubekeep paths"
    );

    match cli.command {
        Some(Command::Where) => {
            println!("config: {}", paths.config_dir().display());
            println!("data:   {}", paths.data_dir().display());
            println!("state:  {}", state_dir(&cli.run, &paths).display());
            Ok(())
        }
        Some(Command::ShowConfig) => {
            let config = resolve_scene_config(&cli.run, &paths)?;
            print!("{}", describe_config(&config));
            Ok(())
        }
        Some(Command::ShowState) => {
            let store = FileStore::new(state_dir(&cli.run, &paths));
            match load_saved_state(Some(&store as &dyn StateStore), &cli.run.canvas) {
                Some(saved) => {
                    let json = serde_json::to_string_pretty(&saved)
                        .context("failed to encode saved state")?;
                    println!("{json}");
                }
                None => println!("no saved state for canvas '{}'", cli.run.canvas),
            }
            Ok(())
        }
        None => run_preview(&cli.run, &paths),
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run_preview(args: &RunArgs, paths: &AppPaths) -> Result<()> {
    let scene = resolve_scene_config(args, paths)?;
    let state_dir = state_dir(args, paths);
    let store = match fs::create_dir_all(&state_dir) {
        Ok(()) => Some(FileStore::new(&state_dir)),
        Err(err) => {
            tracing::warn!(
                dir = %state_dir.display(),
                error = %err,
                "state directory unavailable; running without persistence"
            );
            None
        }
    };

    tracing::info!(
        canvas = %args.canvas,
        persist = %scene.persist_policy,
        state = %state_dir.display(),
        "starting cube preview"
    );
    run_window(
        RunConfig {
            canvas_id: args.canvas.clone(),
            title: format!("cubekeep: {}", args.canvas),
            window_size: args.window_size,
            scene,
        },
        store,
    )
}

fn state_dir(args: &RunArgs, paths: &AppPaths) -> PathBuf {
    args.state_dir
        .clone()
        .unwrap_or_else(|| paths.state_dir())
}

/// Defaults, then the overrides file, then command-line flags.
pub fn resolve_scene_config(args: &RunArgs, paths: &AppPaths) -> Result<SceneConfig> {
    let mut config = SceneConfig::default();

    let file_path = match &args.config {
        Some(path) => Some(path.clone()),
        None => {
            let path = paths.config_file();
            path.is_file().then_some(path)
        }
    };
    if let Some(path) = file_path {
        let file = SceneFile::load(&path)
            .with_context(|| format!("failed to load scene config {}", path.display()))?;
        config = file
            .apply(config)
            .with_context(|| format!("invalid scene config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "applied scene config file");
    }

    let config = config.merge(args.overrides());
    config
        .validate()
        .context("invalid scene configuration from command-line flags")?;
    Ok(config)
}

fn describe_config(config: &SceneConfig) -> String {
    let position = config.directional_light_position;
    let size = match config.sizing {
        Sizing::Container => "container".to_string(),
        Sizing::Fixed { width, height } => format!("{width}x{height}"),
    };
    let mut out = String::new();
    let _ = writeln!(out, "camera_fov = {}", config.camera_fov);
    let _ = writeln!(out, "camera_near = {}", config.camera_near);
    let _ = writeln!(out, "camera_far = {}", config.camera_far);
    let _ = writeln!(out, "light_color = \"{}\"", config.light_color);
    let _ = writeln!(out, "ambient_intensity = {}", config.ambient_intensity);
    let _ = writeln!(
        out,
        "directional_light_position = [{}, {}, {}]",
        position.x, position.y, position.z
    );
    let _ = writeln!(out, "cube_size = {}", config.cube_size);
    let _ = writeln!(out, "cube_color = \"{}\"", config.cube_color);
    let _ = writeln!(out, "rotation_speed = {}", config.rotation_speed);
    let _ = writeln!(out, "pixel_ratio_cap = {}", config.pixel_ratio_cap);
    let _ = writeln!(out, "size = \"{size}\"");
    let _ = writeln!(out, "persist = \"{}\"", config.persist_policy);
    out
}
