use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gce_host::{GceDriver, HostConfig, HostDriver};

/// Manage a Compute Engine docker host. Configuration comes from `GCE_*`
/// environment variables (or a `.env` file).
#[derive(Debug, Parser)]
#[command(name = "gce-hostctl", version)]
struct Cli {
    #[command(subcommand)]
    verb: Verb,
}

#[derive(Debug, Subcommand)]
enum Verb {
    /// Create disk and instance
    Create,
    /// Recreate the instance on the existing disk
    Start,
    /// Delete the instance, keep the disk
    Stop,
    /// Same as stop
    Kill,
    /// Delete and recreate the instance
    Restart,
    /// Delete instance and disk
    Remove,
    /// Print the lifecycle state
    State,
    /// Print the external address
    Ip,
    /// Print the docker daemon URL
    Url,
    /// Update the container runtime on the host
    Upgrade,
    /// Run a command on the host over ssh
    Ssh {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = HostConfig::from_env().context("failed to load host configuration")?;
    let driver = GceDriver::connect(&config)
        .await
        .context("failed to initialise gce driver")?;

    match cli.verb {
        Verb::Create => driver.create().await?,
        Verb::Start => driver.start().await?,
        Verb::Stop => driver.stop().await?,
        Verb::Kill => driver.kill().await?,
        Verb::Restart => driver.restart().await?,
        Verb::Remove => driver.remove().await?,
        Verb::State => println!("{}", driver.state().await?),
        Verb::Ip => println!("{}", driver.ip().await?),
        Verb::Url => println!("{}", driver.url().await?),
        Verb::Upgrade => driver.upgrade().await?,
        Verb::Ssh { args } => {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            let status = driver
                .ssh_command(&args)
                .await?
                .status()
                .await
                .context("failed to spawn ssh")?;
            if !status.success() {
                anyhow::bail!("ssh exited with {status}");
            }
        }
    }

    tracing::debug!(driver = driver.driver_name(), "done");
    Ok(())
}
