use anyhow::Result;

use crate::config::SceneConfig;

mod animation;
mod assets;
mod camera;
mod config;
mod demo;
mod engine;
mod geometry;
mod input;
mod model;
mod particles;
mod rendering;
mod scene_graph;
mod viewport;
mod window;

fn main() -> Result<()> {
    pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let config = match std::env::args_os().nth(1) {
        Some(path) => SceneConfig::load(path)?,
        None => SceneConfig::default(),
    };

    window::run(config)
}
