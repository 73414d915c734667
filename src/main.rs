//! plughost - opens a filter-graph document, reports what's in it and
//! optionally writes it back out.
//!
//! Usage: `plughost [--save OUT] [FILE]`.  Without FILE the most recently
//! opened document is used.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use plughost::config::Settings;
use plughost::notify::GraphEvent;
use plughost::plugin::{InternalFormat, PluginManager};
use plughost::Document;

#[derive(Debug, Default)]
struct Args {
    save: Option<PathBuf>,
    file: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--save" => {
                let out = args.next().ok_or("--save needs an output path")?;
                parsed.save = Some(PathBuf::from(out));
            }
            "-h" | "--help" => {
                return Err("usage: plughost [--save OUT] [FILE]".to_string());
            }
            _ if parsed.file.is_none() => parsed.file = Some(PathBuf::from(arg)),
            _ => return Err(format!("unexpected argument '{}'", arg)),
        }
    }
    Ok(parsed)
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting plughost");

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = Settings::load();

    let mut manager = PluginManager::new();
    manager.register_format(Box::new(InternalFormat));
    log::info!("{} plugins available", manager.available_plugins().len());

    let mut doc = Document::new(
        Box::new(manager),
        settings.host.processing(),
        settings.host.default_bpm,
    )?;

    let Some(file) = args
        .file
        .or_else(|| settings.last_document_opened().map(Path::to_path_buf))
    else {
        log::info!("No document to open");
        return Ok(());
    };

    let events = doc.subscribe();
    doc.load_document(&file)?;
    for event in events.try_iter() {
        if let GraphEvent::PluginError { name, message } = event {
            log::warn!("'{}' was not loaded: {}", name, message);
        }
    }

    log::info!("Document '{}'", doc.document_title());
    for node in doc.graph().nodes() {
        log::info!(
            "  [{}] {} ({}), {} in / {} out",
            node.id(),
            node.properties.plugin_name,
            node.properties.plugin_type,
            node.num_input_channels(),
            node.num_output_channels()
        );
    }
    log::info!(
        "  {} connections, {} MIDI mappings",
        doc.graph().num_connections(),
        doc.midi_mappings().len()
    );

    let recent = match args.save {
        Some(out) => {
            doc.save_document(&out)?;
            out
        }
        None => file,
    };
    settings.set_last_document_opened(&recent);
    settings.save()?;
    Ok(())
}
