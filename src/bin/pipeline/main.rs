extern crate dotenv;
extern crate failure;
extern crate serde_json;
extern crate shader_pipeline;
extern crate structopt;
extern crate yansi;
#[macro_use]
extern crate log;
extern crate chrono;
extern crate fern;

use shader_pipeline::config::{load_config, Config};
use shader_pipeline::error::{Error, ErrorKind, Result};
use shader_pipeline::utilities::read_file_string;
use shader_pipeline::{
    execute_requests, pretty_error, CompileContext, CompilerRegistry, ShaderCompilationRequest,
};
use failure::ResultExt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use structopt::StructOpt;

const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

#[derive(StructOpt, Debug)]
#[structopt(name = "Shader Pipeline")]
struct Options {
    /// Activate debug mode
    #[structopt(short = "x", long = "debug")]
    debug: bool,

    /// Verbose mode (-v, -vv, -vvv, etc.)
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: u8,

    /// Configuration file (TOML)
    #[structopt(short = "c", long = "config", parse(from_os_str))]
    config: Option<PathBuf>,

    /// Print the compiler catalog as JSON and exit
    #[structopt(short = "l", long = "list")]
    list: bool,

    /// Output directory for responses (printed to stdout when omitted)
    #[structopt(short = "o", long = "output", parse(from_os_str))]
    output: Option<PathBuf>,

    /// Worker threads (defaults to worker_count from the config)
    #[structopt(short = "t", long = "threads")]
    threads: Option<u32>,

    /// Request files (JSON)
    #[structopt(name = "REQUEST", parse(from_os_str))]
    requests: Vec<PathBuf>,
}

fn main() {
    if let Err(err) = process() {
        let err = failure::Error::from(err);
        let separator = "---------------------------------------------------------";
        let mut message = "=========================================================\n".to_string();
        message.push_str(&format!(
            "Shader Pipeline encountered an {}",
            yansi::Paint::red("error")
        ));
        message.push_str("\n");
        message.push_str(separator);
        message.push_str("\n");
        message.push_str(&format!("{}", yansi::Paint::yellow(pretty_error(&err))));
        message.push_str("\n");
        message.push_str(separator);

        error!("{}", message);
        eprintln!("{}", message);
        std::process::exit(1);
    }
}

fn process() -> Result<()> {
    let opt = Options::from_args();

    let verbosity = if opt.debug {
        u64::from(opt.verbose) + 1
    } else {
        u64::from(opt.verbose)
    };
    setup_logging(verbosity)?;

    info!(
        "Shader Pipeline v{} starting up!",
        VERSION.unwrap_or("UNKNOWN")
    );
    debug!("{:?}", opt);

    dotenv::from_filename("pipeline.env").ok();

    let config = match opt.config {
        Some(ref path) => load_config(path)?,
        None => Config::default(),
    };
    let config = config.apply_env()?;
    config.validate()?;
    debug!("{:?}", config);

    let registry = CompilerRegistry::builtin(&config)?;

    if opt.list {
        let metadata = serde_json::to_string_pretty(&registry.metadata())?;
        println!("{}", metadata);
        return Ok(());
    }

    if opt.requests.is_empty() {
        warn!("No request files given; nothing to do.");
        return Ok(());
    }

    let mut requests = Vec::with_capacity(opt.requests.len());
    for path in &opt.requests {
        let text = read_file_string(path).with_context(|_| ErrorKind::path(path))?;
        let request: ShaderCompilationRequest = serde_json::from_str(&text)?;
        requests.push(request);
    }

    let context = CompileContext::new(&config);
    let threads = opt.threads.unwrap_or(config.worker_count);
    info!(
        "Executing {} request(s) on {} worker(s)",
        requests.len(),
        threads
    );

    let results = execute_requests(&registry, &context, &requests, threads);

    let mut infrastructure_failures = 0;
    for (path, result) in opt.requests.iter().zip(results.into_iter()) {
        match result {
            Ok(result) => {
                let json = serde_json::to_string_pretty(&result.to_response())?;
                let destination = match opt.output {
                    Some(ref output_dir) => {
                        let output_path = response_path(path, output_dir);
                        write_response(&output_path, &json)?;
                        format!("{:?}", output_path)
                    }
                    None => {
                        println!("{}", json);
                        "stdout".to_string()
                    }
                };
                match result.failed_step() {
                    Some(step) => warn!(
                        "{:?}: step {} failed, response written to {}",
                        path,
                        step + 1,
                        destination
                    ),
                    None => info!("{:?}: succeeded, response written to {}", path, destination),
                }
            }
            Err(err) => {
                infrastructure_failures += 1;
                error!(
                    "{:?}: {}",
                    path,
                    pretty_error(&failure::Error::from(err))
                );
            }
        }
    }

    if infrastructure_failures > 0 {
        return Err(Error::from(ErrorKind::Process(format!(
            "{} request(s) could not be executed",
            infrastructure_failures
        ))));
    }

    Ok(())
}

/// `<output_dir>/<stem>.response.json`
fn response_path(request_path: &Path, output_dir: &Path) -> PathBuf {
    let stem = request_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "request".to_string());
    output_dir.join(format!("{}.response.json", stem))
}

fn write_response(path: &Path, json: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(json.as_bytes())?;
    writer.flush()?;
    Ok(())
}

fn setup_logging(verbosity: u64) -> Result<()> {
    std::fs::create_dir_all(Path::new("./logs"))?;

    let mut base_config = fern::Dispatch::new();
    base_config = match verbosity {
        0 => base_config
            .level(log::LevelFilter::Info)
            .level_for("scoped_threadpool", log::LevelFilter::Warn),
        1 => base_config.level(log::LevelFilter::Debug),
        _2_or_more => base_config.level(log::LevelFilter::Trace),
    };

    // Separate file config so we can include year, month and day in file logs
    let file_config = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .chain(
            std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open("logs/pipeline.log")?,
        );

    let console_config = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().format("%H:%M"),
                record.target(),
                record.level(),
                message
            ))
        })
        // stdout carries --list and response output
        .chain(::std::io::stderr());

    base_config
        .chain(file_config)
        .chain(console_config)
        .apply()
        .map_err(|err| {
            Error::from(ErrorKind::Config(format!(
                "failed to initialize logging: {}",
                err
            )))
        })?;

    Ok(())
}
