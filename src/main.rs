use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgAction, Parser};
use heck::ToSnakeCase;
use oapi_client_generator::{Generator, GeneratorSettings};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Paths to Swagger 2.0 or OpenAPI 3 documents (JSON or YAML)
    #[arg(required = true)]
    specs: Vec<PathBuf>,
    /// Output directory, one `<name>.rs` per document
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,
    /// Base URL baked into the clients instead of the documents' own
    #[arg(long)]
    base_url: Option<String>,
    /// Name of the generated client struct
    #[arg(long, default_value = "Client")]
    client_name: String,
    /// Run the generator and report problems without writing anything
    #[arg(long)]
    check: bool,
    /// More logging (-v debug, -vv trace); RUST_LOG wins when set
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => "info".to_string(),
            1 => "info,oapi_client_generator=debug".to_string(),
            _ => "debug,oapi_client_generator=trace".to_string(),
        },
    };
    let filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `<snake_case stem>.rs` for one document.
fn output_name(spec: &Path) -> String {
    let stem = spec
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_snake_case())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "client".to_owned());
    format!("{}.rs", stem)
}

/// Two documents may not write the same output file.
fn check_output_names(specs: &[PathBuf]) -> anyhow::Result<()> {
    let mut claimed: HashMap<String, &Path> = HashMap::new();
    for spec in specs {
        let name = output_name(spec);
        if let Some(first) = claimed.get(&name) {
            anyhow::bail!(
                "{} and {} would both write {}",
                first.display(),
                spec.display(),
                name
            );
        }
        claimed.insert(name, spec);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = GeneratorSettings::new().with_client_name(&cli.client_name);
    if let Some(base_url) = &cli.base_url {
        settings = settings.with_base_endpoint(base_url);
    }
    let generator = Generator::new(settings);
    check_output_names(&cli.specs)?;

    if !cli.check {
        std::fs::create_dir_all(&cli.out_dir)
            .with_context(|| format!("failed to create {}", cli.out_dir.display()))?;
    }

    let mut failed = 0;
    for (spec, outcome) in generator.generate_all(&cli.specs) {
        let generation = match outcome {
            Ok(generation) => generation,
            Err(err) => {
                error!(spec = %spec.display(), "{}", err);
                failed += 1;
                continue;
            }
        };
        let file_name = output_name(&spec);
        let files = generation
            .to_files(&file_name)
            .with_context(|| format!("failed to emit {}", spec.display()))?;

        if cli.check {
            info!(
                spec = %spec.display(),
                models = generation.models.len(),
                operations = generation.client.operations.len(),
                skipped = generation.diagnostics.len(),
                "checked"
            );
            continue;
        }
        for (name, content) in files {
            let path = cli.out_dir.join(&name);
            std::fs::write(&path, content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(spec = %spec.display(), out = %path.display(), "wrote client");
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} documents failed", failed, cli.specs.len());
    }
    Ok(())
}
