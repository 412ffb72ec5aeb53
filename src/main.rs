use anyhow::Result;
use clap::{Parser, Subcommand};

use shellmgr::server::rest::run_rest_server;
use shellmgr::shared::{config::Config, logging};

#[derive(Parser)]
#[command(name = "shellmgr")]
#[command(about = "shellmgr - SSH shell session manager", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST API server and session manager (default command)
    Serve {
        /// Host for API server
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port for API server
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the effective configuration as YAML
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load()?;

    let command = cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    });

    match command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }

            logging::init_logging(&config.log_dir, "shellmgr")?;
            run_rest_server(config).await?;
        }
        Commands::ShowConfig => {
            print!("{}", serde_yaml::to_string(&config)?);
        }
    }

    Ok(())
}
