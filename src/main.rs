//! Command-line interface for reverse-uroman.

use clap::{Parser, ValueEnum};
use reverse_uroman::{ConversionError, ReverseUroman, RomFormat, rom_format};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, BufRead, BufReader, BufWriter, IsTerminal, Write};
use std::path::PathBuf;
use std::{fs, time};
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use unicode_width::UnicodeWidthStr;

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
enum CliRomFormat {
    #[default]
    Str,
    Edges,
    Alts,
    Lattice,
}

impl From<CliRomFormat> for RomFormat {
    fn from(cli_format: CliRomFormat) -> Self {
        match cli_format {
            CliRomFormat::Str => RomFormat::Str,
            CliRomFormat::Edges => RomFormat::Edges,
            CliRomFormat::Alts => RomFormat::Alts,
            CliRomFormat::Lattice => RomFormat::Lattice,
        }
    }
}

#[derive(Error, Debug)]
enum CliError {
    #[error("Failed to open input file '{path}': {source}")]
    InputFileOpen { path: PathBuf, source: io::Error },

    #[error("Failed to create output file '{path}': {source}")]
    OutputFileCreate { path: PathBuf, source: io::Error },

    #[error("Data directory '{0}' does not exist or is not a directory")]
    DataDir(PathBuf),

    #[error("No target script given; pass --script (e.g. --script Arabic)")]
    MissingScript,

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("REPL error: {0}")]
    Repl(#[from] ReadlineError),

    #[error("Conversion failed: {0}")]
    Conversion(#[from] ConversionError),
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Romanized text to convert.
    #[arg(value_name = "DIRECT_INPUT")]
    direct_input: Vec<String>,

    /// Input file path (default: stdin).
    #[arg(short, long, value_name = "FILE")]
    input_filename: Option<PathBuf>,

    /// Output file path (default: stdout).
    #[arg(short, long, value_name = "FILE")]
    output_filename: Option<PathBuf>,

    /// Target script name (e.g., 'Arabic', 'Swahili', 'Turkish', 'Devanagari').
    #[arg(short = 's', long)]
    script: Option<String>,

    /// Output format. 'edges' provides offsets, 'lattice' every candidate edge.
    #[arg(short = 'f', long, value_enum, default_value_t = CliRomFormat::default())]
    rom_format: CliRomFormat,

    /// Directory with reverse_*.txt rule tables (default: built-in tables).
    #[arg(long, value_name = "DIR", env = "REVERSE_UROMAN_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Maximum number of cached conversion results.
    #[arg(long, value_name = "N", default_value_t = reverse_uroman::DEFAULT_CACHE_CAPACITY)]
    cache_size: usize,

    /// Limit conversion to the first n lines of a file.
    #[arg(long)]
    max_lines: Option<usize>,

    /// Decodes Unicode escape notation, e.g., \\u0073 to s.
    #[arg(short = 'd', long, action = clap::ArgAction::SetTrue)]
    decode_unicode: bool,

    /// Enable parallel file processing.
    #[arg(short = 'p', long = "use-parallel", action = clap::ArgAction::SetTrue)]
    use_parallel: bool,

    /// Run and display a few samples.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    sample: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(err) = run() {
        if let CliError::Io(e) = &err
            && e.kind() == io::ErrorKind::BrokenPipe
        {
            return;
        }
        if let CliError::Conversion(ConversionError::Io(e)) = &err
            && e.kind() == io::ErrorKind::BrokenPipe
        {
            return;
        }

        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn build_engine(cli: &Cli) -> Result<ReverseUroman, CliError> {
    let mut builder = ReverseUroman::builder().cache_capacity(cli.cache_size);
    if let Some(dir) = &cli.data_dir {
        if !dir.is_dir() {
            return Err(CliError::DataDir(dir.clone()));
        }
        builder = builder.data_dir(dir);
    }
    Ok(builder.build())
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let uroman = build_engine(&cli)?;

    if cli.sample && cli.direct_input.is_empty() && cli.input_filename.is_none() {
        show_samples(&uroman);
        return Ok(());
    }

    let script = cli.script.as_deref().ok_or(CliError::MissingScript)?;

    if cli.direct_input.is_empty() && cli.input_filename.is_none() && io::stdin().is_terminal() {
        run_repl(&uroman, &cli, script)?;
        return Ok(());
    }

    let mut writer = get_writer(&cli.output_filename)?;

    if !cli.direct_input.is_empty() {
        process_direct_input(&uroman, &cli, script, &mut writer)?;
    }

    if cli.input_filename.is_some() || cli.direct_input.is_empty() {
        process_stream(&uroman, &cli, script, &mut writer)?;
    }

    writer.flush()?;

    if cli.sample {
        eprintln!(
            "Note: The --sample option was ignored because input was provided via other flags."
        );
    }

    Ok(())
}

fn process_direct_input(
    uroman: &ReverseUroman,
    cli: &Cli,
    script: &str,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let rom_format = Some(cli.rom_format.into());
    for s in &cli.direct_input {
        let result = if !cli.decode_unicode {
            uroman.convert_with_format(s, script, rom_format)
        } else {
            uroman.convert_escaped_with_format(s, script, rom_format)
        };
        writeln!(writer, "{}", result.to_string()?)?;
    }
    Ok(())
}

fn process_stream(
    uroman: &ReverseUroman,
    cli: &Cli,
    script: &str,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let reader = get_reader(&cli.input_filename)?;

    if cli.use_parallel {
        uroman.convert_file_parallel(
            reader,
            writer,
            script,
            cli.rom_format.into(),
            cli.max_lines,
            cli.decode_unicode,
        )?;
    } else {
        uroman.convert_file(
            reader,
            writer,
            script,
            cli.rom_format.into(),
            cli.max_lines,
            cli.decode_unicode,
        )?;
    }
    Ok(())
}

fn get_reader(path: &Option<PathBuf>) -> Result<Box<dyn BufRead>, CliError> {
    match path {
        Some(p) => {
            let file = fs::File::open(p).map_err(|e| CliError::InputFileOpen {
                path: p.clone(),
                source: e,
            })?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn get_writer(path: &Option<PathBuf>) -> Result<Box<dyn Write>, CliError> {
    match path {
        Some(p) => {
            let file = fs::File::create(p).map_err(|e| CliError::OutputFileCreate {
                path: p.clone(),
                source: e,
            })?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}

fn run_repl(uroman: &ReverseUroman, cli: &Cli, script: &str) -> Result<(), CliError> {
    let mut rl = DefaultEditor::new()?;

    let history_path = || -> Option<PathBuf> {
        let mut path = dirs::cache_dir()?;
        path.push("reverse-uroman");
        fs::create_dir_all(&path).ok()?;
        path.push("history.txt");
        Some(path)
    };

    if let Some(path) = history_path()
        && rl.load_history(&path).is_err()
    {}

    println!("Target script: {script}. Type ':script NAME' to switch, ':exit' to quit.");
    let mut script = script.to_string();

    loop {
        let readline = rl.readline(&format!("{script}>> "));

        match readline {
            Ok(line) => {
                rl.add_history_entry(&line)?;
                let trimmed = line.trim();

                if trimmed == ":exit" || trimmed == ":quit" {
                    break;
                }

                if let Some(name) = script_command(trimmed) {
                    if name.is_empty() {
                        println!("{script}");
                    } else {
                        if uroman.script(name).is_none() {
                            eprintln!("Note: no descriptor for script '{name}'; fallbacks only");
                        }
                        script = name.to_string();
                    }
                    continue;
                }

                if trimmed.is_empty() {
                    continue;
                }

                match uroman
                    .convert_with_format(&line, &script, Some(cli.rom_format.into()))
                    .to_string()
                {
                    Ok(output) => println!("{output}"),
                    Err(e) => eprintln!("Error formatting output: {e}"),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Interrupted. To exit, press Ctrl-D or type :exit.");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Exiting.");
                break;
            }
            Err(err) => {
                eprintln!("REPL Error: {err}");
                break;
            }
        }
    }

    if let Some(path) = history_path()
        && let Err(err) = rl.save_history(&path)
    {
        eprintln!("Warning: could not save history to {path:?}: {err}");
    }

    Ok(())
}

/// Parses the REPL command `:script [NAME]`, returning the (possibly empty) name.
fn script_command(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(":script")?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// Spaces that pad `text` to `width` terminal columns.
fn sample_padding(text: &str, width: usize) -> String {
    " ".repeat(width.saturating_sub(UnicodeWidthStr::width(text)))
}

fn show_samples(uroman: &ReverseUroman) {
    println!("Running sample conversions with reverse-uroman:");
    println!("-----------------------------------------------");

    let samples = [
        ("Arabic", "salam alaykum"),
        ("Arabic", "shukran habibi"),
        ("Arabic", "marhaba, kayf?"),
        ("Swahili", "jambo rafiki"),
        ("Swahili", "ngombe"),
        ("Turkish", "Istanbul cok guzel"),
        ("Turkish", "Eskisehir"),
        ("Devanagari", "namaste bharat"),
    ];

    let max_width: usize = 20;
    let mut total_duration_ns: u128 = 0;

    for (script, text) in samples.iter() {
        let start = time::Instant::now();
        let converted = uroman
            .convert_string::<rom_format::Str>(text, script)
            .to_string();
        let duration = start.elapsed();
        total_duration_ns += duration.as_nanos();

        let padding = sample_padding(text, max_width);
        println!("[{script:<10}] {text}{padding} -> {converted}");
    }

    println!("-----------------------------------------------");

    let num_samples = samples.len() as u128;
    if num_samples > 0 {
        let avg_duration_ns = total_duration_ns / num_samples;
        let avg_duration_us = avg_duration_ns as f64 / 1_000.0;
        let avg_duration_ms = avg_duration_us / 1_000.0;

        println!(
            "Avg. processing time: {avg_duration_ms:.3} ms ({avg_duration_us:.1} μs) per sample"
        );
    }
}
