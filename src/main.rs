use std::env;
use std::time::Duration;

use guild_warden::config::{BotConfig, CONFIG_FILE};
use guild_warden::{BOT_NAME, Data, Error, commands, handlers, logging};
use poise::serenity_prelude::{self as serenity};
use serenity::GatewayIntents;
use tracing::{error, info};

/// Periodically drop occurrence windows that went quiet
fn spawn_sweeper(data: Data) {
    let period = Duration::from_secs(data.config.sweep_interval_seconds);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // A late tick is not worth a catch-up burst of sweeps
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            // Wall clock, matching the audit log timestamps the windows hold
            data.detector.sweep(chrono::Utc::now().timestamp_millis());
        }
    });
}

/// Main function to run the bot
async fn async_main() -> Result<(), Error> {
    // Initialize logging
    logging::init()?;

    // Load the configuration file, then apply environment overrides
    let config_path = env::var("CONFIG_FILE").unwrap_or_else(|_| CONFIG_FILE.to_string());
    let config = BotConfig::load(&config_path)?;
    info!(
        config = %config_path,
        policy_file = %config.policy_file,
        approved_guilds = config.approved_guilds.len(),
        log_channel = config.log_channel_id.is_some(),
        "Configuration loaded"
    );

    // Load environment variables
    let token = env::var("DISCORD_TOKEN").map_err(|_| "DISCORD_TOKEN must be set")?;

    // Set up the bot's data; the sweeper, framework and handler share it
    let data = Data::new(config);
    spawn_sweeper(data.clone());

    // Configure the Poise framework
    let framework_data = data.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            pre_command: |ctx| {
                Box::pin(async move {
                    // Log the start of command execution
                    logging::log_command_start(ctx);
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    // Log the end of command execution
                    logging::log_command_end(ctx);
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    // Failed owner checks land here too
                    logging::log_command_error(&error);
                })
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                logging::log_console("Registering commands");
                // Slash commands are global; guild gating happens in the command check
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(framework_data)
            })
        })
        .build();

    // GUILDS: channel and role creation
    // GUILD_MEMBERS: member removals (kicks)
    // GUILD_MODERATION: bans
    // GUILD_WEBHOOKS: webhook updates
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MODERATION
        | GatewayIntents::GUILD_WEBHOOKS;

    // Configure the Serenity client
    let mut client = serenity::ClientBuilder::new(token, intents)
        .event_handler(handlers::Handler::new(data))
        .framework(framework)
        .await?;

    // Start the bot
    info!("Starting {BOT_NAME}...");
    client.start().await?;

    Ok(())
}

fn main() {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to start runtime: {err}");
            std::process::exit(1);
        }
    };

    // Run the async main function and exit non-zero on any startup error
    if let Err(err) = runtime.block_on(async_main()) {
        error!("Fatal error: {err}");
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
