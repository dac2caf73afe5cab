// scenecraft: a small 3D scene editor and camera-path recorder

mod animation;
mod app;
mod camera;
mod config;
mod error;
mod export;
mod geometry;
mod gui;
mod input;
mod material;
mod math;
mod renderer;
mod scene;
mod scene_file;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use winit::event_loop::EventLoop;

use crate::config::Config;
use crate::material::MaterialCache;
use crate::scene::Scene;
use crate::scene_file::SceneDescription;

#[derive(Parser, Debug)]
#[command(name = "scenecraft", version, about = "Author and fly through 3D scenes")]
struct Args {
    /// Configuration file (RON)
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Scene description to open instead of the built-in demo
    #[arg(short, long)]
    scene: Option<PathBuf>,

    /// Directory that exported frames are written to
    #[arg(long)]
    export_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    if let Some(dir) = args.export_dir {
        config.export.directory = dir;
    }

    let (description, base_dir) = match &args.scene {
        Some(path) => {
            let description = SceneDescription::load(path)
                .with_context(|| format!("loading scene {}", path.display()))?;
            (description, path.parent().map(PathBuf::from))
        }
        None => {
            log::info!("No scene given, opening the demo scene");
            (scene_file::demo(), None)
        }
    };

    let mut scene = Scene::new();
    let mut materials = MaterialCache::new();
    let start_camera = description.build(&mut scene, &mut materials, base_dir.as_deref())?;

    let event_loop = EventLoop::new()?;
    let app = app::App::new(config, scene, materials, start_camera, &event_loop).await?;
    app.run(event_loop)?;
    Ok(())
}
