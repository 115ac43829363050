use clap::Parser;
use log::info;
use std::fs;
use std::path::Path;
use stylecast_lib::generate::stylecast;
use stylecast_lib::sass::{self, SassOptions};
use stylecast_lib::source_map::DefaultFetcher;
use stylecast_lib::tree_builder::{BuildOptions, DEFAULT_MAX_DEPTH};
use url::Url;

const STYLECAST_INTRO: &str = r#"
       _____ __        __                     __
      / ___// /___  __/ /__  _________ ______/ /_
      \__ \/ __/ / / / / _ \/ ___/ __ `/ ___/ __/
     ___/ / /_/ /_/ / /  __/ /__/ /_/ (__  ) /_
    /____/\__/\__, /_/\___/\___/\__,_/____/\__/
             /____/

    Stylecast - authored SCSS back out of rendered pages
"#;

#[derive(Parser)]
#[command(name = "stylecast")]
#[command(about = "Reconstruct the authored SCSS behind an element of an HTML page")]
struct Args {
    /// Input HTML file.
    input: String,

    /// Element to start from.
    #[arg(long, default_value = "/html[1]/body[1]")]
    xpath: String,

    /// URL stylesheet links resolve against. Defaults to the input's file:// URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Levels of descendants to include.
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    depth: usize,

    /// Use the full property allow-list instead of authored properties.
    #[arg(long)]
    no_source_map: bool,

    #[arg(long)]
    no_media_mixins: bool,

    #[arg(long)]
    no_hover_mixin: bool,

    #[arg(long)]
    no_font_size_mixin: bool,

    /// Print the style tree as JSON instead of SCSS.
    #[arg(long)]
    json: bool,
}

fn file_url(input: &str) -> Option<String> {
    let path = fs::canonicalize(Path::new(input)).ok()?;
    Url::from_file_path(path).ok().map(|u| u.to_string())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    eprintln!("{}", STYLECAST_INTRO);

    // parse the args given in terminal
    let args: Args = Args::parse();

    let html_content = match fs::read_to_string(&args.input) {
        Ok(html_content) => html_content,
        Err(e) => {
            eprintln!("Error reading HTML file: {}", e);
            std::process::exit(1);
        }
    };

    let Some(base_url) = args.base_url.clone().or_else(|| file_url(&args.input)) else {
        eprintln!("Could not build a base URL for {}; pass --base-url", args.input);
        std::process::exit(1);
    };
    info!("base URL {base_url}");

    let fetcher = match DefaultFetcher::new() {
        Ok(fetcher) => fetcher,
        Err(e) => {
            eprintln!("Error creating HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let options = BuildOptions {
        max_depth: args.depth,
        use_source_map: !args.no_source_map,
    };
    let tree = match stylecast::build_tree(&html_content, &base_url, &args.xpath, fetcher, options) {
        Ok(tree) => tree,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&tree) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error encoding style tree: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        let sass_options = SassOptions {
            emit_media_query_mixins: !args.no_media_mixins,
            emit_hover_mixin: !args.no_hover_mixin,
            emit_font_size_mixin: !args.no_font_size_mixin,
        };
        print!("{}", sass::serialize(&tree, &sass_options));
    }
}
