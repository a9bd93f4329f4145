use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use powerwatch_dashboard::{
    config::DashboardConfig,
    pager::DEFAULT_PER_PAGE,
    views::{render_device, render_devices, render_error, render_metrics, render_user},
    AuthHook, DeviceDataHook, DevicesHook, FileTokenStore, GatewayClient, MetricsPager,
    TokenProvider,
};

#[derive(Parser)]
#[command(name = "powerwatch", version, about = "Power monitor dashboard")]
struct Cli {
    /// Gateway base URL, e.g. http://localhost:3000
    #[arg(long, global = true)]
    gateway_url: Option<String>,
    /// File holding the session token
    #[arg(long, global = true)]
    token_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account and start a session
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, env = "POWERWATCH_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Start a session
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "POWERWATCH_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the session and forget the stored token
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Exchange the stored token for a fresh one
    Refresh,
    /// Manage devices
    #[command(subcommand)]
    Devices(DevicesCommand),
    /// Show paginated telemetry for a device
    Data {
        device_id: i64,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
        per_page: u32,
        /// Page through results with n/p/s <size>/q on stdin
        #[arg(long, short)]
        interactive: bool,
    },
}

#[derive(Subcommand)]
enum DevicesCommand {
    /// List registered devices
    List,
    /// Register a device
    Add {
        #[arg(long)]
        key: String,
        #[arg(long, env = "POWERWATCH_DEVICE_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Show one device
    Show { id: i64 },
    /// Rename a device or change its status
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Remove a device
    Remove { id: i64 },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", render_error(&format!("{err:#}")));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = DashboardConfig::load(cli.gateway_url, cli.token_file)?;
    let tokens: Arc<dyn TokenProvider> = Arc::new(FileTokenStore::new(&config.token_path));
    let client = GatewayClient::new(&config.gateway_url, config.timeout, tokens)?;
    tracing::debug!(gateway = %client.base_url(), token_file = %config.token_path.display(), "dashboard ready");

    match cli.command {
        Command::Signup {
            username,
            email,
            password,
        } => {
            let auth = AuthHook::new(client);
            let response = auth
                .register(&username, email.as_deref(), &password)
                .await?;
            match auth.user() {
                Some(user) => println!("Signed up as {}", render_user(&user)),
                None => println!(
                    "{}",
                    response
                        .message
                        .unwrap_or_else(|| format!("Signed up as {username}"))
                ),
            }
        }
        Command::Login { username, password } => {
            let auth = AuthHook::new(client);
            let response = auth.login(&username, &password).await?;
            if response.access_token().is_none() {
                anyhow::bail!("login succeeded but no access token was issued");
            }
            let who = auth
                .user()
                .map(|user| render_user(&user))
                .unwrap_or(username);
            println!("Logged in as {who}");
        }
        Command::Logout => {
            AuthHook::new(client).logout().await?;
            println!("Logged out");
        }
        Command::Whoami => {
            let auth = AuthHook::new(client);
            auth.profile().await?;
            match auth.user() {
                Some(user) => println!("{}", render_user(&user)),
                None => println!("No user in session"),
            }
        }
        Command::Refresh => {
            AuthHook::new(client).refresh().await?;
            println!("Session refreshed");
        }
        Command::Devices(command) => run_devices(DevicesHook::new(client), command).await?,
        Command::Data {
            device_id,
            page,
            per_page,
            interactive,
        } => {
            let hook = DeviceDataHook::new(client);
            let mut pager = MetricsPager::new(per_page);
            if interactive {
                browse_metrics(&hook, device_id, pager).await?;
            } else {
                let data = hook
                    .get_device_data(device_id, page, pager.per_page())
                    .await?;
                pager.observe(&data);
                pager.go_to(page)?;
                println!("{}", render_metrics(device_id, &data, &pager));
            }
        }
    }
    Ok(())
}

async fn run_devices(hook: DevicesHook, command: DevicesCommand) -> anyhow::Result<()> {
    match command {
        DevicesCommand::List => {
            let devices = hook.get_devices().await?;
            println!("{}", render_devices(&devices));
        }
        DevicesCommand::Add {
            key,
            password,
            name,
        } => {
            let ack = hook.add_device(&key, &password, name.as_deref()).await?;
            println!(
                "{}",
                ack.message
                    .unwrap_or_else(|| "Device registered successfully".to_string())
            );
            println!("{}", render_devices(&hook.devices()));
        }
        DevicesCommand::Show { id } => {
            let device = hook.get_device(id).await?;
            println!("{}", render_device(&device));
        }
        DevicesCommand::Update { id, name, status } => {
            let mut changes = serde_json::Map::new();
            if let Some(name) = name {
                changes.insert("name".to_string(), name.into());
            }
            if let Some(status) = status {
                changes.insert("status".to_string(), status.into());
            }
            if changes.is_empty() {
                anyhow::bail!("nothing to update: pass --name and/or --status");
            }
            let ack = hook
                .update_device(id, &serde_json::Value::Object(changes))
                .await?;
            println!(
                "{}",
                ack.message.unwrap_or_else(|| format!("Device {id} updated"))
            );
            println!("{}", render_devices(&hook.devices()));
        }
        DevicesCommand::Remove { id } => {
            let ack = hook.remove_device(id).await?;
            println!(
                "{}",
                ack.message.unwrap_or_else(|| format!("Device {id} removed"))
            );
            println!("{}", render_devices(&hook.devices()));
        }
    }
    Ok(())
}

/// Re-fetches on every page or page-size change; fetch errors are shown
/// inline and the session continues.
async fn browse_metrics(
    hook: &DeviceDataHook,
    device_id: i64,
    mut pager: MetricsPager,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match hook
            .get_device_data(device_id, pager.page(), pager.per_page())
            .await
        {
            Ok(data) => {
                pager.observe(&data);
                println!("{}", render_metrics(device_id, &data, &pager));
            }
            Err(err) => println!("{}", render_error(&err.to_string())),
        }

        loop {
            let Some(line) = lines.next_line().await.context("read command")? else {
                return Ok(());
            };
            let mut parts = line.split_whitespace();
            let moved = match (parts.next(), parts.next()) {
                (Some("n"), _) => pager.next(),
                (Some("p"), _) => pager.previous(),
                (Some("s"), Some(size)) => match size.parse::<u32>() {
                    Ok(size) if size > 0 => {
                        pager.set_per_page(size);
                        true
                    }
                    _ => {
                        println!("{}", render_error("page size must be a positive number"));
                        false
                    }
                },
                (Some("q"), _) => return Ok(()),
                _ => {
                    println!("commands: n (next), p (previous), s <size>, q (quit)");
                    false
                }
            };
            if moved {
                break;
            }
        }
    }
}
