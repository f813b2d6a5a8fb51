use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::codec::NameCodec;
use crate::pipeline::PipelineOptions;
use crate::render::DEFAULT_SIZE;

/// `border_gen` - country silhouette generator for the flag/country guessing game.
///
/// Resolves country and continent names against a world-borders GeoJSON
/// dataset and renders them as orthographic map images, either one at a
/// time or across the whole asset tree.
#[derive(Parser, Debug)]
#[command(name = "border_gen", version, about, long_about = None)]
pub struct Config {
    /// GeoJSON FeatureCollection with `name_<lang>` properties.
    #[arg(
        long,
        global = true,
        env = "BORDER_GEN_DATASET",
        default_value = "country_border_generator/custom.geojson"
    )]
    pub dataset: PathBuf,

    /// Asset tree: one folder per category, one placeholder image per entity.
    #[arg(
        long,
        global = true,
        env = "BORDER_GEN_ASSETS",
        default_value = "Flagdle/assets/country"
    )]
    pub assets: PathBuf,

    /// Language of the display names returned by lookups.
    #[arg(long, global = true, env = "BORDER_GEN_LANGUAGE", default_value = "en")]
    pub language: String,

    /// How asset filename stems are encoded.
    #[arg(
        long,
        global = true,
        value_enum,
        env = "BORDER_GEN_NAME_CODEC",
        default_value_t = NameCodec::Plain
    )]
    pub name_codec: NameCodec,

    /// Scale factor applied to the geometry extent (1.2 = 20% margin).
    #[arg(long, global = true, default_value_t = 1.2)]
    pub padding: f64,

    /// Output image side in pixels.
    #[arg(long, global = true, default_value_t = DEFAULT_SIZE)]
    pub size: u32,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Regenerate every image of the asset tree in place.
    Update {
        /// Run each category on its own worker thread (one at a time).
        #[arg(long, default_value_t = false)]
        threaded: bool,
    },

    /// Regenerate a single image in place.
    UpdateFile {
        path: PathBuf,

        /// Look the entity up under this name instead of the file name.
        #[arg(long = "as")]
        name: Option<String>,
    },

    /// Render one entity; PNG bytes go to stdout unless `--out` is given.
    Plot {
        name: String,

        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print every country name in the selected language.
    List,

    /// Print the language codes available in the dataset.
    Languages,

    /// Convert every PNG under a folder to WEBP.
    Convert {
        root: PathBuf,

        /// Encode the output file stems (icons keep their name).
        #[arg(long, value_enum)]
        encode_names: Option<NameCodec>,
    },
}

impl Config {
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            language: self.language.clone(),
            codec: self.name_codec,
            padding: self.padding,
            size: self.size,
            asset_root: Some(self.assets.clone()),
        }
    }
}
