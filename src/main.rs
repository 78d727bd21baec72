//! Wire-rod quality predictor - main entry point

use clap::Parser;
use wirerod_quality::cli::{
    cmd_generate, cmd_info, cmd_interactive, cmd_predict, cmd_serve, cmd_train, load_config, Cli,
    Commands,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wirerod=info,wirerod_quality=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Some(Commands::Train { data, output, policy, seed, trees, holdout_csv, show }) => {
            let config = load_config(config_path)?;
            cmd_train(
                &config,
                &data,
                output.as_deref(),
                policy,
                seed,
                trees,
                holdout_csv.as_deref(),
                show,
            )?;
        }
        Some(Commands::Predict { model, input, output }) => {
            let config = load_config(config_path)?;
            cmd_predict(&config, model.as_deref(), input.as_deref(), output.as_deref())?;
        }
        Some(Commands::Serve { model, port, host }) => {
            let config = load_config(config_path)?;
            cmd_serve(&config, model.as_deref(), host.as_deref(), port).await?;
        }
        Some(Commands::Generate { output, rows, seed, noise }) => {
            cmd_generate(&output, rows, seed, noise)?;
        }
        Some(Commands::Info { data, model }) => {
            cmd_info(data.as_deref(), model.as_deref())?;
        }
        None => {
            let config = load_config(config_path)?;
            cmd_interactive(&config).await?;
        }
    }

    Ok(())
}
