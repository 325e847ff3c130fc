use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dispatch_core::{
    ActionRefused, ConfirmOutcome, Directory, DispatchController, ProposalOutcome, RefreshOutcome,
    RestClient,
};
use shared::domain::{OrderId, TripId};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod views;

use config::load_settings;

#[derive(Parser, Debug)]
#[command(name = "dispatch", about = "Dispatch pending orders into delivery trips")]
struct Cli {
    #[arg(long, default_value = "dispatch.toml")]
    config: PathBuf,
    /// Overrides `api_url` from the config file and environment.
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Signs in and prints the access token to export.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Shows the pending order grid.
    Orders,
    /// Proposes trips for the given orders, then confirms or rejects them.
    Dispatch {
        #[arg(long = "order", required = true)]
        orders: Vec<i64>,
        /// Proposed trip to leave unchecked before confirming.
        #[arg(long = "skip-trip")]
        skip_trips: Vec<i64>,
        #[arg(long)]
        reject: bool,
    },
    Trips,
    Vehicles,
    Products,
    Locations,
    Organizations,
    Users,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(&cli.config)?;
    if let Some(api_url) = cli.api_url {
        settings.api_url = api_url;
    }
    if let Some(token) = cli.token {
        settings.api_token = Some(token);
    }
    settings.validate()?;

    let mut client = RestClient::new(&settings.api_url, settings.request_timeout())
        .with_context(|| format!("failed to create client for {}", settings.api_url))?;
    if let Some(token) = settings.api_token.clone() {
        client = client.with_token(token);
    }
    let client = Arc::new(client);
    info!(api_url = %client.base_url(), "dispatch: using backend");

    match cli.command {
        Command::Login { username, password } => {
            let response = client.login(&username, &password).await?;
            println!("export DISPATCH_API_TOKEN={}", response.access_token);
        }
        Command::Orders => {
            let controller = DispatchController::new(client.clone())
                .with_request_timeout(settings.request_timeout());
            refresh(&controller).await?;
            let directory = load_directory(&client).await;
            print!(
                "{}",
                views::render_order_grid(&controller.snapshot().await, &directory)
            );
        }
        Command::Dispatch {
            orders,
            skip_trips,
            reject,
        } => {
            let controller = DispatchController::new(client.clone())
                .with_request_timeout(settings.request_timeout());
            run_dispatch(&controller, &client, &orders, &skip_trips, reject).await?;
        }
        Command::Trips => print!("{}", views::render_trips(&client.list_trips().await?)),
        Command::Vehicles => print!("{}", views::render_vehicles(&client.list_vehicles().await?)),
        Command::Products => print!("{}", views::render_products(&client.list_products().await?)),
        Command::Locations => {
            print!("{}", views::render_locations(&client.list_locations().await?))
        }
        Command::Organizations => print!(
            "{}",
            views::render_organizations(&client.list_organizations().await?)
        ),
        Command::Users => print!("{}", views::render_users(&client.list_users().await?)),
    }

    Ok(())
}

async fn refresh(controller: &DispatchController) -> Result<()> {
    match controller.refresh_orders().await {
        RefreshOutcome::Refreshed { count } => {
            info!(count, "dispatch: pending orders loaded");
            Ok(())
        }
        RefreshOutcome::Failed(message) => bail!(message),
        RefreshOutcome::Stale => bail!("order list was discarded"),
    }
}

async fn load_directory(client: &RestClient) -> Directory {
    match client.load_directory().await {
        Ok(directory) => directory,
        Err(err) => {
            warn!(error = %err, "dispatch: reference data unavailable; showing raw ids");
            Directory::default()
        }
    }
}

async fn run_dispatch(
    controller: &DispatchController,
    client: &RestClient,
    orders: &[i64],
    skip_trips: &[i64],
    reject: bool,
) -> Result<()> {
    refresh(controller).await?;
    for id in orders {
        if !controller.toggle_order(OrderId(*id)).await {
            warn!(order_id = id, "dispatch: order is not pending; skipped");
        }
    }

    let directory = load_directory(client).await;
    print!(
        "{}",
        views::render_order_grid(&controller.snapshot().await, &directory)
    );

    match controller.propose().await {
        Ok(ProposalOutcome::Reviewing { .. }) => {}
        Ok(ProposalOutcome::NoTrips) | Ok(ProposalOutcome::Failed(_)) => {
            let view = controller.snapshot().await;
            bail!(view.error.unwrap_or_else(|| "proposal failed".to_string()));
        }
        Ok(ProposalOutcome::Stale) => bail!("proposal was discarded"),
        Err(refused) => bail!(refused),
    }

    for id in skip_trips {
        if !controller.toggle_trip(TripId(*id)).await? {
            warn!(trip_id = id, "dispatch: trip is not part of the proposal");
        }
    }
    println!();
    print!("{}", views::render_proposal(&controller.snapshot().await));

    if reject {
        controller.reject().await?;
        println!("\nProposal rejected; orders remain pending.");
        return Ok(());
    }

    match controller.confirm().await {
        Ok(ConfirmOutcome::Confirmed { .. }) => {
            println!();
            print!("{}", views::render_thank_you(&controller.snapshot().await));
            Ok(())
        }
        Ok(ConfirmOutcome::Failed(message)) => bail!(message),
        Ok(ConfirmOutcome::Stale) => bail!("confirmation was discarded"),
        Err(ActionRefused::NothingToConfirm) => {
            bail!("every proposed trip was skipped; nothing to confirm")
        }
        Err(refused) => bail!(refused),
    }
}
