//! appc - thin CLI exerciser for the app-tree compiler front-end.

mod cli;

use std::path::Path;
use std::process::ExitCode;

use appc_core::{Pipeline, PipelineConfig, PipelineError};
use cli::{output as cli_output, Cli, Commands, OutputFormat};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse_args();

    match run(&cli) {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<bool, Box<dyn std::error::Error>> {
    match &cli.command {
        Commands::Check { app_root, format, config } => run_check(app_root, format, config.as_deref(), cli),
        Commands::EmitOverlay { app_root, workdir, config } => {
            run_emit_overlay(app_root, workdir, config.as_deref(), cli)
        }
        Commands::Metadata { app_root, config } => run_metadata(app_root, config.as_deref()),
        Commands::Init { force } => run_init(*force),
    }
}

fn load_config(app_root: &Path, config_path: Option<&Path>) -> PipelineConfig {
    match config_path {
        Some(path) => PipelineConfig::from_appc_toml(path.parent().unwrap_or(app_root))
            .unwrap_or_else(|_| PipelineConfig::auto_detect(app_root)),
        None => PipelineConfig::auto_detect(app_root),
    }
}

fn run_check(
    app_root: &Path,
    format: &OutputFormat,
    config_path: Option<&Path>,
    cli: &Cli,
) -> Result<bool, Box<dyn std::error::Error>> {
    let config = load_config(app_root, config_path);
    let pipeline = Pipeline::new(&config);

    let output = match pipeline.run() {
        Ok(output) => output,
        Err(PipelineError::Diagnostics(diagnostics)) => {
            print_diagnostics(&diagnostics, &[], &config.app_root, format);
            return Ok(true);
        }
        Err(e) => return Err(Box::new(e)),
    };

    let error_count = output.diagnostics.iter().filter(|d| d.severity == appc_core::Severity::Error).count();
    let warning_count = output.diagnostics.len() - error_count;

    print_diagnostics(&output.diagnostics, &output.files, &config.app_root, format);

    if !cli.quiet && matches!(format, OutputFormat::Pretty) {
        cli_output::print_summary(output.metadata.services.len(), error_count, warning_count);
    }

    Ok(error_count > 0)
}

fn print_diagnostics(
    diagnostics: &[appc_core::Diagnostic],
    files: &[appc_core::SourceFile],
    app_root: &Path,
    format: &OutputFormat,
) {
    let path_for = |file_id: u32| -> String {
        files
            .get(file_id as usize)
            .map(|f| f.relative_path(app_root))
            .unwrap_or_else(|| "<unknown>".to_string())
    };

    match format {
        OutputFormat::Pretty => {
            for d in diagnostics {
                cli_output::print_diagnostic(d, &path_for(d.position.file));
            }
        }
        OutputFormat::Compact => {
            for d in diagnostics {
                println!("{}", d.format(&path_for(d.position.file)));
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "diagnostics": diagnostics.iter().map(|d| {
                    serde_json::json!({
                        "file": path_for(d.position.file),
                        "line": d.position.line,
                        "column": d.position.column,
                        "severity": d.severity.as_str(),
                        "message": d.message,
                    })
                }).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        }
    }
}

fn run_emit_overlay(
    app_root: &Path,
    workdir: &Path,
    config_path: Option<&Path>,
    cli: &Cli,
) -> Result<bool, Box<dyn std::error::Error>> {
    let config = load_config(app_root, config_path);
    let pipeline = Pipeline::new(&config);
    let output = pipeline.run()?;

    let error_count = output.diagnostics.iter().filter(|d| d.severity == appc_core::Severity::Error).count();
    print_diagnostics(&output.diagnostics, &output.files, &config.app_root, &OutputFormat::Pretty);

    if error_count > 0 {
        return Ok(true);
    }

    std::fs::create_dir_all(workdir)?;
    let mut written = 0usize;
    for file_id in output.overlay.files() {
        let Some(source) = output.files.get(file_id as usize) else { continue };
        let rendered = output.overlay.render(file_id, source.bytes.as_ref());
        let rel = source.relative_path(&config.app_root);
        let dest = workdir.join(&rel);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&dest, rendered)?;
        written += 1;
    }

    if !cli.quiet {
        println!("wrote {written} rewritten files to {}", workdir.display());
    }

    Ok(false)
}

fn run_metadata(app_root: &Path, config_path: Option<&Path>) -> Result<bool, Box<dyn std::error::Error>> {
    let config = load_config(app_root, config_path);
    let pipeline = Pipeline::new(&config);
    let output = pipeline.run()?;
    println!("{}", output.metadata.to_json()?);
    Ok(false)
}

fn run_init(force: bool) -> Result<bool, Box<dyn std::error::Error>> {
    let config_path = Path::new("appc.toml");

    if config_path.exists() && !force {
        eprintln!("Configuration file already exists. Use --force to overwrite.");
        return Ok(true);
    }

    let config = PipelineConfig::default();
    std::fs::write(config_path, config.to_toml()?)?;
    println!("Created appc.toml configuration file");

    Ok(false)
}
