use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "rbxavatar")]
#[command(version, about = "Download Roblox avatar images, 3D models and body-part reports")]
pub struct Args {
    /// Root folder for everything that gets downloaded. `~` is expanded.
    #[arg(short, long, global = true, default_value = "downloads")]
    pub output: String,

    /// JSON file overriding endpoints, delays and defaults.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output (request URLs, mirror attempts).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Resolve usernames to user IDs.
    Lookup {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Search users by keyword.
    Search {
        keyword: String,
        /// Maximum results (the API caps this at 25).
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },

    /// Download 2D thumbnails. USERS are IDs or usernames, comma-separated or not.
    Images {
        #[arg(required = true)]
        users: Vec<String>,
        /// Thumbnail sizes, e.g. `150x150,420x420`. Defaults to the config.
        #[arg(short, long, value_delimiter = ',')]
        sizes: Vec<String>,
        /// Also download a thumbnail for every worn item.
        #[arg(long)]
        items: bool,
    },

    /// Download the 3D model (OBJ, MTL, textures) with its reports.
    Model {
        #[arg(required = true)]
        users: Vec<String>,
        #[arg(long)]
        no_textures: bool,
    },

    /// Download everything: thumbnails, 3D model, extended info and mapping files.
    Package {
        #[arg(required = true)]
        users: Vec<String>,
        #[arg(long)]
        no_textures: bool,
        /// Also download a thumbnail for every worn item.
        #[arg(long)]
        items: bool,
    },

    /// Rewrite the body-part mapping files of an existing package.
    Map { package_dir: PathBuf },

    /// Print the structure of a local OBJ file.
    Analyze {
        obj_file: PathBuf,
        /// Print the full structure as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Analyze every avatar folder below ROOT (defaults to the output folder).
    Scan { root: Option<PathBuf> },
}
