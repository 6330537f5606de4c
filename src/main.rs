use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use clap::{Args as ClapArgs, Parser, Subcommand};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use rustddl::builder::{BuildOptions, SchemaBuilder};
use rustddl::document::Document;
use rustddl::pg::{PgRenderer, default_type_table};

/// Tooling for database schemas written in compact schema notation.
#[derive(Parser, Debug)]
#[command(name = "rustddl", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile schema notation files into a PostgreSQL DDL script
    Compile(CompileArgs),
    /// Rebuild the schema from a live database and print it as DDL
    #[cfg(feature = "inspect")]
    Inspect(InspectArgs),
}

#[derive(ClapArgs, Debug)]
struct CompileArgs {
    /// Path to a schema file, or to a directory containing schema files
    input: PathBuf,

    /// Write the DDL script here instead of stdout; the file must not
    /// already exist
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Input text encoding (only the UTF-8 family is supported)
    #[arg(long, default_value = "utf-8")]
    encoding: String,

    /// Do not scan the input directory recursively
    #[arg(long)]
    non_recursive: bool,

    /// Add an index on every non-unique foreign-key field
    #[arg(long)]
    fk_index: bool,

    /// Suppress progress output
    #[arg(short, long)]
    silent: bool,
}

#[cfg(feature = "inspect")]
#[derive(ClapArgs, Debug)]
struct InspectArgs {
    /// Connection string, e.g. `host=localhost user=postgres`
    dsn: String,

    /// Write the DDL script here instead of stdout; the file must not
    /// already exist
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Input-path problems, distinct from schema-definition errors: these
/// abort before any compilation starts.
#[derive(Debug, Error)]
enum InputError {
    #[error("schema source path \"{0}\" does not exist")]
    Missing(PathBuf),
    #[error("schema source path \"{0}\" is neither a file nor a directory")]
    NotFileOrDirectory(PathBuf),
    #[error("failed to read directory: {0}")]
    Io(#[from] std::io::Error),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let code = match args.command {
        Command::Compile(args) => run_compile(&args),
        #[cfg(feature = "inspect")]
        Command::Inspect(args) => run_inspect(&args),
    };

    process::exit(code);
}

struct Progress {
    silent: bool,
}

impl Progress {
    fn say(&self, message: &str) {
        if !self.silent {
            println!("{message}");
        }
    }
}

fn run_compile(args: &CompileArgs) -> i32 {
    let progress = Progress {
        silent: args.silent,
    };

    let files = match collect_files(&args.input, !args.non_recursive) {
        Ok(files) => files,
        Err(error) => {
            eprintln!("ERROR: {error}");
            return 1;
        }
    };

    let started = Instant::now();

    let mut builder = SchemaBuilder::with_options(BuildOptions {
        add_fk_indexes: args.fk_index,
    });

    progress.say("Loading schema:");
    for path in &files {
        progress.say(&format!("  {}", path.display()));

        let source = match read_source(path, &args.encoding) {
            Ok(source) => source,
            Err(error) => {
                eprintln!("ERROR: {error}");
                return 1;
            }
        };

        let loaded = Document::from_yaml(&source)
            .and_then(|document| builder.accumulate(&document));
        if let Err(error) = loaded {
            eprintln!("ERROR: {error}");
            return 1;
        }
    }

    let schema = match builder.finalize() {
        Ok(schema) => schema,
        Err(error) => {
            eprintln!("ERROR: {error}");
            return 1;
        }
    };
    progress.say("done.");

    progress.say("Generating DDL:");
    let renderer = PgRenderer {
        restrict_types: Some(default_type_table()),
        ..PgRenderer::default()
    };
    let ddl = match renderer.render(&schema) {
        Ok(ddl) => ddl,
        Err(error) => {
            eprintln!("ERROR: {error}");
            return 1;
        }
    };
    progress.say("done.");

    if let Err(error) = write_output(args.output.as_deref(), &ddl) {
        eprintln!("ERROR: {error}");
        return 1;
    }

    progress.say(&format!(
        "Compiled in {:.3} ms.",
        started.elapsed().as_secs_f64() * 1000.0
    ));

    0
}

#[cfg(feature = "inspect")]
fn run_inspect(args: &InspectArgs) -> i32 {
    use rustddl::inspect::DbInspector;

    let schema = DbInspector::connect(&args.dsn).and_then(|mut inspector| inspector.inspect());
    let schema = match schema {
        Ok(schema) => schema,
        Err(error) => {
            eprintln!("ERROR: {error}");
            return 1;
        }
    };

    // Introspected types are already canonical engine names, so no
    // restriction table applies here.
    let ddl = match PgRenderer::default().render(&schema) {
        Ok(ddl) => ddl,
        Err(error) => {
            eprintln!("ERROR: {error}");
            return 1;
        }
    };

    if let Err(error) = write_output(args.output.as_deref(), &ddl) {
        eprintln!("ERROR: {error}");
        return 1;
    }

    0
}

/// All schema files under `path`: the file itself, or the files of a
/// directory. Directory entries are visited in sorted order so
/// multi-file loads are reproducible.
fn collect_files(path: &Path, recursive: bool) -> Result<Vec<PathBuf>, InputError> {
    if !path.exists() {
        return Err(InputError::Missing(path.to_path_buf()));
    }
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(InputError::NotFileOrDirectory(path.to_path_buf()));
    }

    let mut files = Vec::new();
    walk(path, recursive, &mut files)?;
    Ok(files)
}

fn walk(dir: &Path, recursive: bool, files: &mut Vec<PathBuf>) -> Result<(), InputError> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            if recursive {
                walk(&entry, recursive, files)?;
            }
        } else if entry.is_file() {
            files.push(entry);
        }
    }

    Ok(())
}

fn read_source(path: &Path, encoding: &str) -> Result<String, String> {
    match encoding.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => {}
        other => return Err(format!("unsupported encoding \"{other}\"")),
    }

    let bytes = fs::read(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let bytes = bytes
        .strip_prefix(b"\xef\xbb\xbf")
        .unwrap_or(&bytes)
        .to_vec();

    String::from_utf8(bytes).map_err(|_| format!("{} is not valid UTF-8", path.display()))
}

/// Write the script to a fresh file, or to stdout when no path is
/// given. An existing file is never overwritten.
fn write_output(path: Option<&Path>, ddl: &str) -> Result<(), String> {
    let Some(path) = path else {
        println!("{ddl}");
        return Ok(());
    };

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| format!("failed to create {}: {e}", path.display()))?;

    writeln!(file, "{ddl}").map_err(|e| format!("failed to write {}: {e}", path.display()))
}
