use clap::Parser;
use ordo_cli::{run, Args};
use ordo_config::ConfigLoader;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ConfigLoader::new(&args.config).load_validated()?;

    // Initialize tracing
    ordo_logging::init_logging(&config.logging)?;
    tracing::info!("Starting ordo with config dir: {}", args.config.display());

    let output = run(&args, &config)?;
    println!("{}", output);

    Ok(())
}
