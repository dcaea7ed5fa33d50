use std::{fs, process};

use clap::{Parser, Subcommand};

use dtx_cli::config::Config;
use dtx_cli::{data, facade};

#[derive(Parser)]
#[command(name = "dtx", about = "Word document template renderer and validator")]
struct Cli {
    /// Path to a TOML config file (defaults are used if omitted).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a template against a single JSON data file
    Render {
        /// Input .docx template
        template: String,
        /// JSON file with render data
        data: String,
        /// Output .docx path
        output: String,
    },
    /// Validate a template without any render data
    Validate {
        /// Input .docx template
        template: String,
        /// Emit the report as JSON instead of a human-readable summary
        #[arg(long)]
        json: bool,
    },
    /// Render a template against many JSON data files
    Batch {
        /// Input .docx template
        template: String,
        /// Directory of `<name>.json` data files
        data_dir: String,
        /// Directory to write `<name>.docx` into
        output_dir: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(std::path::Path::new(path)).unwrap_or_else(|e| {
            eprintln!("Error reading config '{path}': {e}");
            process::exit(1);
        }),
        None => Config::default(),
    };
    config.init_tracing();

    match cli.command {
        Command::Render { template, data, output } => render_cmd(&template, &data, &output, &config),
        Command::Validate { template, json } => validate_cmd(&template, json),
        Command::Batch { template, data_dir, output_dir } => {
            batch_cmd(&template, &data_dir, &output_dir, &config)
        }
    }
}

fn read_template(path: &str) -> Vec<u8> {
    fs::read(path).unwrap_or_else(|e| {
        eprintln!("Error reading '{path}': {e}");
        process::exit(1);
    })
}

fn render_cmd(template: &str, data_path: &str, output: &str, config: &Config) {
    let input = read_template(template);
    let data_text = fs::read_to_string(data_path).unwrap_or_else(|e| {
        eprintln!("Error reading '{data_path}': {e}");
        process::exit(1);
    });
    let json: serde_json::Value = serde_json::from_str(&data_text).unwrap_or_else(|e| {
        eprintln!("Error parsing '{data_path}': {e}");
        process::exit(1);
    });
    let record = data::record_from_json(json);

    let result = facade::render(&input, record, config).unwrap_or_else(|e| {
        eprintln!("Render failed: {e}");
        process::exit(1);
    });

    for warning in &result.warnings {
        tracing::warn!(message = %warning.message, "directive render warning");
    }

    fs::write(output, result.bytes).unwrap_or_else(|e| {
        eprintln!("Error writing '{output}': {e}");
        process::exit(1);
    });

    println!(
        "Rendered {template} -> {output} ({} warning{})",
        result.warnings.len(),
        if result.warnings.len() == 1 { "" } else { "s" }
    );
}

fn validate_cmd(template: &str, as_json: bool) {
    let input = read_template(template);
    let report = facade::validate(&input).unwrap_or_else(|e| {
        eprintln!("Validate failed: {e}");
        process::exit(1);
    });

    if as_json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Error serializing report: {e}");
                process::exit(1);
            }
        }
    } else {
        println!(
            "{} diagnostic(s), complexity score {}",
            report.diagnostics.len(),
            report.statistics.complexity()
        );
        for d in &report.diagnostics {
            println!(
                "  [{:?}] {}:{} {}",
                d.severity, d.start_line, d.start_col, d.message
            );
        }
    }

    if report.has_errors() {
        process::exit(1);
    }
}

fn batch_cmd(template: &str, data_dir: &str, output_dir: &str, config: &Config) {
    let input = read_template(template);
    fs::create_dir_all(output_dir).unwrap_or_else(|e| {
        eprintln!("Error creating '{output_dir}': {e}");
        process::exit(1);
    });

    let mut names = Vec::new();
    let mut records = Vec::new();
    let entries = fs::read_dir(data_dir).unwrap_or_else(|e| {
        eprintln!("Error reading '{data_dir}': {e}");
        process::exit(1);
    });
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("Error reading '{}': {e}", path.display());
                continue;
            }
        };
        let json: serde_json::Value = match serde_json::from_str(&text) {
            Ok(j) => j,
            Err(e) => {
                eprintln!("Error parsing '{}': {e}", path.display());
                continue;
            }
        };
        names.push(path.file_stem().unwrap().to_string_lossy().to_string());
        records.push(data::record_from_json(json));
    }

    let results = facade::render_batch(&input, records, config);

    let mut failures = 0;
    for (name, result) in names.into_iter().zip(results) {
        match result {
            Ok(success) => {
                let out_path = std::path::Path::new(output_dir).join(format!("{name}.docx"));
                if let Err(e) = fs::write(&out_path, success.bytes) {
                    eprintln!("Error writing '{}': {e}", out_path.display());
                    failures += 1;
                }
            }
            Err(e) => {
                eprintln!("Render failed for '{name}': {e}");
                failures += 1;
            }
        }
    }

    println!("Batch complete with {failures} failure(s)");
    if failures > 0 {
        process::exit(1);
    }
}
