use std::path::PathBuf;

use clap::{Parser, Subcommand};
use scene::{PersistPolicy, SceneConfigOverrides, Sizing};
use sceneconfig::parse_sizing;

#[derive(Parser, Debug)]
#[command(
    name = "cubekeep",
    author,
    version,
    about = "Rotating cube whose orientation is kept across restarts"
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Canvas id the scene is bound to; also names the saved-state key.
    #[arg(long, value_name = "ID", default_value = "three-js-canvas")]
    pub canvas: String,

    /// Scene overrides TOML file (defaults to `scene.toml` in the config directory).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Render size: `container` to follow the window, or `WIDTHxHEIGHT`.
    #[arg(long, value_name = "SIZE", value_parser = parse_sizing)]
    pub size: Option<Sizing>,

    /// When to save the cube transform: `every-frame`, `on-cleanup`, or `never`.
    #[arg(long, value_name = "POLICY", value_parser = parse_persist)]
    pub persist: Option<PersistPolicy>,

    /// Radians added to the x and y rotation each frame.
    #[arg(long, value_name = "RADIANS")]
    pub speed: Option<f64>,

    /// Upper bound on the device pixel ratio.
    #[arg(long, value_name = "RATIO")]
    pub pixel_ratio_cap: Option<f64>,

    /// Directory for saved cube state (defaults to `state/` in the data directory).
    #[arg(long, value_name = "PATH")]
    pub state_dir: Option<PathBuf>,

    /// Initial window size in logical pixels (e.g. `800x600`).
    #[arg(
        long,
        value_name = "WIDTHxHEIGHT",
        value_parser = parse_window_size,
        default_value = "800x600"
    )]
    pub window_size: (u32, u32),
}

impl RunArgs {
    pub fn overrides(&self) -> SceneConfigOverrides {
        SceneConfigOverrides {
            rotation_speed: self.speed,
            pixel_ratio_cap: self.pixel_ratio_cap,
            sizing: self.size,
            persist_policy: self.persist,
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the merged scene configuration and exit.
    ShowConfig,
    /// Print the saved cube state for the canvas, if any.
    ShowState,
    /// Print resolved config and data directories.
    Where,
}

pub fn parse() -> Cli {
    Cli::parse()
}

fn parse_persist(value: &str) -> Result<PersistPolicy, String> {
    value.parse()
}

pub fn parse_window_size(value: &str) -> Result<(u32, u32), String> {
    match parse_sizing(value)? {
        Sizing::Fixed { width, height } => Ok((width, height)),
        Sizing::Container => Err(format!("window size must be WIDTHxHEIGHT, got '{value}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "cubekeep",
            "--speed",
            "0.02",
            "--persist",
            "frame",
            "--size",
            "640x480",
        ])
        .unwrap();
        let overrides = cli.run.overrides();
        assert_eq!(overrides.rotation_speed, Some(0.02));
        assert_eq!(overrides.persist_policy, Some(PersistPolicy::EveryFrame));
        assert_eq!(
            overrides.sizing,
            Some(Sizing::Fixed {
                width: 640,
                height: 480
            })
        );
        assert_eq!(overrides.camera_fov, None);
        assert_eq!(cli.run.canvas, "three-js-canvas");
        assert_eq!(cli.run.window_size, (800, 600));
        assert!(cli.command.is_none());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Cli::try_parse_from(["cubekeep", "--persist", "sometimes"]).is_err());
        assert!(Cli::try_parse_from(["cubekeep", "--window-size", "container"]).is_err());
        assert!(Cli::try_parse_from(["cubekeep", "--speed", "fast"]).is_err());
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["cubekeep", "--canvas", "hero", "show-state"]).unwrap();
        assert_eq!(cli.run.canvas, "hero");
        assert!(matches!(cli.command, Some(Command::ShowState)));
    }
}
