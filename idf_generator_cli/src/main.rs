use clap::{Arg, Command};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libidf_generator::config::Config;
use libidf_generator::process::process_instrument;

fn make_template_config(path: &Path) {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).unwrap();
    let mut file = File::create(path).expect("Could create template config file!");
    file.write_all(yaml_str.as_bytes())
        .expect("Failed to write yaml data to file!");
}

/// Log to the terminal and to a file next to the working directory
fn init_logger() {
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from("./idf_generator.log"))
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!("[{date_short} {time_short}] - [{^{level}}] - {payload}{eol}"),
            )))
            .truncate(true)
            .build()
            .expect("Could not create log file!"),
    );
    let logger = Arc::new(
        spdlog::Logger::builder()
            .sinks(spdlog::default_logger().sinks().to_owned())
            .sink(file_sink)
            .flush_level_filter(spdlog::LevelFilter::All)
            .build()
            .expect("Could not create logger!"),
    );
    spdlog::set_default_logger(logger);
}

fn main() {
    // Create a cli
    let matches = Command::new("idf_generator_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .global(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    init_logger();

    // Parse the cli
    let config_path = match matches.get_one::<String>("path") {
        Some(path) => PathBuf::from(path),
        None => {
            spdlog::error!("A configuration path is required; use -p <config.yml>");
            return;
        }
    };

    if let Some(("new", _)) = matches.subcommand() {
        spdlog::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        make_template_config(&config_path);
        spdlog::info!("Done.");
        return;
    }

    // Load our config
    spdlog::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            spdlog::error!("{e}");
            return;
        }
    };
    spdlog::info!("Config successfully loaded.");
    spdlog::info!("Output Path: {}", config.output_path.to_string_lossy());
    spdlog::info!("Instruments: {:?}", config.instruments);
    if let Some(path) = &config.vulcan_survey_path {
        spdlog::info!("VULCAN Survey: {}", path.to_string_lossy());
    }
    if let Some(path) = &config.basis_nexus_111 {
        spdlog::info!("BASIS Si111 NeXus: {}", path.to_string_lossy());
    }
    if let Some(path) = &config.basis_nexus_311 {
        spdlog::info!("BASIS Si311 NeXus: {}", path.to_string_lossy());
    }
    if let Some(stamp) = config.last_modified() {
        spdlog::info!("Last Modified: {stamp}");
    }

    // One step per instrument
    let pb = ProgressBar::new(config.instruments.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}") {
        pb.set_style(style);
    }
    let mut n_written = 0;
    for kind in config.instruments.iter() {
        pb.set_message(kind.to_string());
        match process_instrument(&config, *kind) {
            Ok(paths) => {
                for path in paths.iter() {
                    spdlog::info!("Wrote {}", path.to_string_lossy());
                }
                n_written += paths.len();
            }
            Err(e) => {
                spdlog::error!("Generating {kind} failed with error: {e}");
                pb.abandon();
                return;
            }
        }
        pb.inc(1);
    }
    pb.finish();

    spdlog::info!("Successfully generated {n_written} definition file(s)!");
    spdlog::info!("Done.");
}
