use serenity::prelude::*;

use dotenvy::dotenv;
use std::env;
use std::sync::Arc;
use tracing::{error, info};

use forum_warden::config::Config;
use forum_warden::directory::{Directory, HttpDirectory};
use forum_warden::handler::Handler;
use forum_warden::{Services, ServicesKey};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_default(),
        ))
        .init();

    let config = Config::load()?;

    // Member-leave handling needs the privileged members intent.
    let intents = GatewayIntents::non_privileged() | GatewayIntents::GUILD_MEMBERS;
    let mut client = Client::builder(&config.token, intents)
        .event_handler(Handler)
        .await?;

    let directory: Arc<dyn Directory> =
        Arc::new(HttpDirectory::new(client.cache_and_http.http.clone()));

    // An unresolvable forum id is a configuration error; refuse to start.
    let forum = directory.fetch_channel(config.forum_id).await?;
    match forum.guild() {
        Some(channel) => {
            info!(forum_id = %config.forum_id, guild_id = %channel.guild_id, "resolved help forum")
        }
        None => anyhow::bail!(
            "configured forum id {} is not a guild channel",
            config.forum_id
        ),
    }

    let services = Services::new(directory, config.forum_id);
    client.data.write().await.insert::<ServicesKey>(services);

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Could not register ctrl+c handler");
        info!("shutting down");
        shard_manager.lock().await.shutdown_all().await;
    });

    if let Err(why) = client.start().await {
        error!(error = %why, "An error occurred while running the client");
    }
    Ok(())
}
