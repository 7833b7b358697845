// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! LiveMap Coach terminal dashboard.

use clap::{Parser, Subcommand};
use livemap_coach::dashboard::render::{render_activity_list, render_details};
use livemap_coach::dashboard::{ApiClient, Dashboard};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "livemap-dashboard")]
#[command(about = "Browse Strava activities and their GPS quality reports", long_about = None)]
#[command(version)]
struct Cli {
    /// Base URL of the LiveMap Coach API
    #[arg(
        long,
        env = "LIVEMAP_API_BASE",
        default_value = "http://localhost:8080",
        global = true
    )]
    api_base: String,

    /// Session token (the `token` query parameter after Strava login)
    #[arg(long, env = "LIVEMAP_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List synced activities
    List,

    /// Sync recent activities from Strava
    Sync {
        /// Activities to request from Strava (5-50)
        #[arg(long, default_value = "30")]
        per_page: u32,

        /// Sync every sport type, not only runs
        #[arg(long)]
        all_sports: bool,
    },

    /// Show track and quality for an activity (default: the newest)
    Show { id: Option<u64> },

    /// Ingest GPS streams for an activity, then show it
    Ingest { id: u64 },

    /// Print the URL that starts Strava login
    LoginUrl,
}

fn print_message(dashboard: &Dashboard) {
    if let Some(message) = &dashboard.message {
        println!("{}\n", message);
    }
}

async fn select_listed(dashboard: &mut Dashboard, id: Option<u64>) -> anyhow::Result<()> {
    dashboard.load_activities().await;
    match id {
        Some(id) => {
            if !dashboard.set_selected(id) {
                print_message(dashboard);
                anyhow::bail!("Activity {} is not in the loaded list", id);
            }
        }
        None if dashboard.selected_id().is_none() => {
            print_message(dashboard);
            anyhow::bail!("No activities to show. Run `sync` first.");
        }
        None => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = ApiClient::new(&cli.api_base, cli.token);
    let mut dashboard = Dashboard::new(client);

    match cli.command {
        Command::List => {
            dashboard.load_activities().await;
            print_message(&dashboard);
            print!("{}", render_activity_list(&dashboard));
        }
        Command::Sync {
            per_page,
            all_sports,
        } => {
            dashboard.set_per_page(per_page);
            dashboard.only_runs = !all_sports;
            dashboard.sync().await;
            print_message(&dashboard);
            print!("{}", render_activity_list(&dashboard));
        }
        Command::Show { id } => {
            select_listed(&mut dashboard, id).await?;
            if let Some(id) = dashboard.selected_id() {
                dashboard.load_details(id).await;
            }
            print_message(&dashboard);
            print!("{}", render_details(&dashboard));
        }
        Command::Ingest { id } => {
            select_listed(&mut dashboard, Some(id)).await?;
            dashboard.ingest_selected().await;
            print_message(&dashboard);
            print!("{}", render_details(&dashboard));
        }
        Command::LoginUrl => {
            println!("{}", dashboard.client().login_url());
        }
    }

    Ok(())
}
