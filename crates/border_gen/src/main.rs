use std::io::Write;

use anyhow::{Context, Result};
use border_gen::config::{Command, Config};
use border_gen::{convert, BatchDriver, Pipeline};
use clap::Parser;
use geoset::GeometrySet;
use log::{info, warn};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();

    // Conversion works on files only; no dataset needed.
    if let Command::Convert { root, encode_names } = &config.command {
        let converted = convert::convert_tree(root, *encode_names)?;
        info!("Converted {converted} images under {}", root.display());
        return Ok(());
    }

    let dataset = GeometrySet::load(&config.dataset).context("loading country data")?;

    match &config.command {
        Command::Languages => {
            let mut out = std::io::stdout().lock();
            for language in dataset.languages() {
                writeln!(out, "{language}")?;
            }
        }
        Command::List => {
            let mut out = std::io::stdout().lock();
            for name in dataset.names(&config.language) {
                writeln!(out, "\t- {name}")?;
            }
        }
        Command::Update { threaded } => {
            let pipeline = Pipeline::new(&dataset, config.pipeline_options())?;
            let result = BatchDriver::new(&pipeline)
                .threaded(*threaded)
                .run(&config.assets)?;

            if !result.is_success() {
                warn!("{} images were not updated", result.failures.len());
            }
        }
        Command::UpdateFile { path, name } => {
            let pipeline = Pipeline::new(&dataset, config.pipeline_options())?;
            let entity = pipeline.update_file(path, name.as_deref())?;
            info!("Updated {} with {}", path.display(), entity.name);
        }
        Command::Plot { name, out } => {
            let pipeline = Pipeline::new(&dataset, config.pipeline_options())?;

            match out {
                Some(path) => {
                    let entity = pipeline.render_entity(name, path)?;
                    info!("Plotted {} to {}", entity.name, path.display());
                }
                None => {
                    let entity = pipeline.resolver().resolve(name)?;
                    let framing = geoset::build(&entity, pipeline.padding())?;
                    info!(
                        "Center coordinates of {}: {:.4}, {:.4}",
                        entity.name,
                        framing.center.x(),
                        framing.center.y()
                    );

                    let bytes = pipeline.renderer().render_to_png_bytes(&entity, &framing)?;
                    std::io::stdout().lock().write_all(&bytes)?;
                }
            }
        }
        Command::Convert { .. } => unreachable!(),
    }

    Ok(())
}
