use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use ariadne::{Color, Label, Report, ReportKind, Source};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use spindle_common::manifest::{self, SpindleManifest};
use spindle_common::Diagnostic;
use spindle_compiler::reader::ScriptBundle;
use spindle_compiler::{compile, CompileOptions};

/// Spindle dialogue compiler.
///
/// Compiles a reader bundle (parsed narrative scripts as JSON) into a
/// dialogue database.
#[derive(Parser)]
#[command(
    name = "spindlec",
    version,
    about,
    long_about = "Spindle dialogue compiler.\n\nCompiles a reader bundle (parsed narrative scripts as JSON) into a\n.dialogue.json database for the dialogue runtime.\n\nExamples:\n  spindlec story.json              Compile to story.dialogue.json\n  spindlec story.json -o out.json  Compile to custom output path\n  spindlec story.json --check      Check for errors only\n  spindlec story.json --emit-db    Print database JSON to stdout"
)]
struct Cli {
    /// Input reader bundle.
    input: PathBuf,

    /// Output file path (default: <input>.dialogue.json).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Check for errors without writing the database.
    #[arg(long)]
    check: bool,

    /// Suppress warning output.
    #[arg(short, long)]
    quiet: bool,

    /// Emit database JSON to stdout instead of writing to file.
    #[arg(long = "emit-db")]
    emit_db: bool,

    /// Emit statement trees to stdout (debug).
    #[arg(long = "emit-ast")]
    emit_ast: bool,

    /// Log compiler progress (same as RUST_LOG=debug).
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let json = match fs::read_to_string(&cli.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: could not read '{}': {}", cli.input.display(), e);
            process::exit(1);
        }
    };

    // === Manifest ===
    // Spindle.toml is looked up from the bundle's directory upwards.
    let abs_input = fs::canonicalize(&cli.input).unwrap_or_else(|_| cli.input.clone());
    let base_dir = abs_input
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let manifest = match manifest::find_and_load_manifest(&abs_input) {
        Ok(m) => m,
        Err(manifest::ManifestError::NotFound(_)) => SpindleManifest::defaults(base_dir.clone()),
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    tracing::debug!(root = %manifest.root_dir.display(), "using manifest");

    // === Reader bundle ===
    let units = match ScriptBundle::from_json(&json).and_then(ScriptBundle::into_units) {
        Ok(units) => units,
        Err(e) => {
            eprintln!("error: {}: {}", cli.input.display(), e);
            process::exit(1);
        }
    };

    if cli.emit_ast {
        for unit in &units {
            println!("// {}", unit.file);
            for tree in &unit.trees {
                println!("{:#?}", tree);
            }
        }
        return;
    }

    // === Registration + lowering ===
    let options = CompileOptions::from_manifest(&manifest);
    let output = compile(&units, &options);

    let mut sources = SourceCache::new(base_dir);
    for diag in output.diagnostics.diagnostics() {
        if diag.is_error() || !cli.quiet {
            print_diagnostic(diag, &mut sources);
        }
    }
    let failed = output.diagnostics.has_errors();

    if cli.check {
        if failed {
            process::exit(1);
        }
        println!("No errors found.");
        return;
    }

    let json = match serde_json::to_string_pretty(&output.database) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("error: failed to serialize database: {}", e);
            process::exit(1);
        }
    };

    if cli.emit_db {
        println!("{}", json);
    } else {
        let output_path = cli.output.unwrap_or_else(|| {
            let mut p = cli.input.clone();
            p.set_extension("dialogue.json");
            p
        });

        match fs::write(&output_path, &json) {
            Ok(()) => {
                println!(
                    "Compiled {} -> {} ({} conversations, {} bytes)",
                    cli.input.display(),
                    output_path.display(),
                    output.database.conversations.len(),
                    json.len()
                );
            }
            Err(e) => {
                eprintln!("error: could not write '{}': {}", output_path.display(), e);
                process::exit(1);
            }
        }
    }

    // Dropped conversations still fail the build.
    if failed {
        process::exit(1);
    }
}

/// Script sources read on demand, resolved against the bundle's directory.
struct SourceCache {
    base_dir: PathBuf,
    files: HashMap<String, Option<String>>,
}

impl SourceCache {
    fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            files: HashMap::new(),
        }
    }

    fn get(&mut self, file: &str) -> Option<&str> {
        let base_dir = &self.base_dir;
        self.files
            .entry(file.to_string())
            .or_insert_with(|| fs::read_to_string(base_dir.join(file)).ok())
            .as_deref()
    }
}

fn print_diagnostic(diag: &Diagnostic, sources: &mut SourceCache) {
    let kind = if diag.is_error() {
        ReportKind::Error
    } else {
        ReportKind::Warning
    };

    let located = match diag.span {
        Some(ref span) => sources.get(&span.file).and_then(|source| {
            span.byte_range(source)
                .map(|range| (span.file.as_str(), source, range))
        }),
        None => None,
    };

    if let Some((file_name, source, range)) = located {
        let color = if diag.is_error() {
            Color::Red
        } else {
            Color::Yellow
        };
        let label = match diag.conversation {
            Some(ref conversation) => format!("in node '{}'", conversation),
            None => diag.message.clone(),
        };

        let mut report = Report::build(kind, file_name, range.start)
            .with_message(&diag.message)
            .with_label(
                Label::new((file_name, range))
                    .with_message(label)
                    .with_color(color),
            );

        if let Some(ref suggestion) = diag.suggestion {
            report = report.with_help(suggestion);
        }

        if let Err(e) = report
            .finish()
            .eprint((file_name, Source::from(source)))
        {
            eprintln!("error: could not render diagnostic: {}", e);
        }
    } else {
        eprintln!("{}", diag);
        if let Some(ref suggestion) = diag.suggestion {
            eprintln!("   = help: {}", suggestion);
        }
        eprintln!();
    }
}
