use std::error::Error;
use std::sync::Arc;

use ::mongodb::{options::ClientOptions, Client};
use chrono_tz::Tz;
use dotenvy::dotenv;
use teloxide::{prelude::*, utils::command::BotCommands};

use crate::api::JikanClient;
use crate::config::Config;
use crate::gateway::Identity;
use crate::mongodb::MongoGateway;
use crate::session::Sessions;
use crate::view::{ActionOutcome, ScheduleView, ViewState, MESSAGE_LIMIT};

mod api;
mod broadcast;
mod config;
mod gateway;
mod keep_alive;
mod mongodb;
mod session;
mod view;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Commands:")]
enum Command {
    #[command(description = "load this season's schedule")]
    Start,
    #[command(description = "show the loaded schedule again")]
    Schedule,
    #[command(description = "sign in to manage subscriptions")]
    Login,
    #[command(description = "subscribe by anime id, e.g. /subscribe 52991")]
    Subscribe(String),
    #[command(description = "unsubscribe by anime id")]
    Unsubscribe(String),
    #[command(description = "list your subscriptions")]
    List,
    #[command(description = "set your timezone, e.g. /timezone Europe/Berlin")]
    Timezone(String),
    #[command(description = "show this help")]
    Help,
}

const NOT_LOADED: &str = "No schedule loaded yet. Use /start.";
const NO_SUBSCRIPTIONS: &str = "You are not following any anime yet.";

struct App {
    catalog: JikanClient,
    gateway: MongoGateway,
    sessions: Sessions,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    pretty_env_logger::init();

    let config = Config::from_env()?;

    if let Some(port) = config.keep_alive_port {
        keep_alive::keep_alive(port)?;
    }

    let bot = Bot::new(&config.bot_token);

    let client_options = ClientOptions::parse(&config.mongodb_uri).await?;
    let client = Client::with_options(client_options)?;
    let db = client.database(&config.database);

    log::info!("MongoDB connected, database {}", config.database);

    let app = Arc::new(App {
        catalog: JikanClient::new(&config.catalog_url)?,
        gateway: MongoGateway::new(&db),
        sessions: Sessions::new(config.zones),
    });

    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
                    answer(bot, msg, cmd, app.clone())
                }),
        );

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn identity(msg: &Message) -> Option<Identity> {
    msg.from.as_ref().map(|user| Identity {
        id: user.id.0,
        display_name: user.full_name(),
        is_bot: user.is_bot,
    })
}

fn parse_anime_id(raw: &str) -> Option<i64> {
    raw.trim().trim_start_matches('#').parse().ok()
}

async fn send_pages(bot: &Bot, chat: ChatId, view: &ScheduleView) -> ResponseResult<()> {
    for page in view.render_pages(MESSAGE_LIMIT) {
        bot.send_message(chat, page).await?;
    }

    Ok(())
}

async fn answer(
    bot: Bot,
    msg: Message,
    cmd: Command,
    app: Arc<App>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let chat = msg.chat.id;

    match cmd {
        Command::Start => {
            let view = app.sessions.remount(chat).await;
            let mut view = view.lock().await;

            send_pages(&bot, chat, &view).await?;
            view.mount(&app.catalog).await;
            send_pages(&bot, chat, &view).await?;
        }

        Command::Help => {
            bot.send_message(chat, Command::descriptions().to_string()).await?;
        }

        Command::Schedule => {
            let view = match app.sessions.get(chat).await {
                Some(view) => view,
                None => {
                    bot.send_message(chat, NOT_LOADED).await?;
                    return Ok(());
                }
            };
            let view = view.lock().await;

            // `/timezone` before `/start` leaves an unmounted view behind
            if view.is_mounted() {
                send_pages(&bot, chat, &view).await?;
            } else {
                bot.send_message(chat, NOT_LOADED).await?;
            }
        }

        Command::Login => {
            let Some(view) = app.sessions.get(chat).await else {
                bot.send_message(chat, NOT_LOADED).await?;
                return Ok(());
            };
            let mut view = view.lock().await;

            match view.login(&app.gateway, identity(&msg)).await {
                ActionOutcome::Applied => {
                    if let Some(user) = view.user() {
                        let message = format!(
                            "Welcome, {}! You follow {} anime this season.",
                            user.display_name,
                            view.subscribed().len()
                        );
                        bot.send_message(chat, message).await?;
                    }
                }
                ActionOutcome::Ignored => {
                    bot.send_message(chat, NOT_LOADED).await?;
                }
                // already logged; the view stays as it was
                ActionOutcome::Failed => {}
            }
        }

        Command::Subscribe(raw) => {
            change_subscription(&bot, chat, &app, &raw, true).await?;
        }

        Command::Unsubscribe(raw) => {
            change_subscription(&bot, chat, &app, &raw, false).await?;
        }

        Command::List => {
            let Some(view) = app.sessions.get(chat).await else {
                bot.send_message(chat, NO_SUBSCRIPTIONS).await?;
                return Ok(());
            };
            let view = view.lock().await;

            let mut anime_list = String::new();
            for (index, anime) in view.subscribed().into_iter().enumerate() {
                anime_list.push_str(&format!(
                    "{}. {}\n   {}\n",
                    index + 1,
                    anime.title,
                    view.broadcast_time(anime)
                ));
            }

            let message = if anime_list.is_empty() {
                NO_SUBSCRIPTIONS.to_string()
            } else {
                format!("Your subscriptions:\n\n{}", anime_list)
            };

            bot.send_message(chat, message).await?;
        }

        Command::Timezone(raw) => {
            let tz: Tz = match raw.trim().parse() {
                Ok(tz) => tz,
                Err(_) => {
                    bot.send_message(chat, "Unknown timezone. Example: /timezone Europe/Berlin")
                        .await?;
                    return Ok(());
                }
            };

            let view = match app.sessions.get(chat).await {
                Some(view) => view,
                None => app.sessions.remount(chat).await,
            };
            view.lock().await.set_viewer_timezone(tz);

            bot.send_message(chat, format!("Times are now shown in {}", tz.name())).await?;
        }
    }

    Ok(())
}

/// Applies a subscribe or unsubscribe and replies with the card's current state,
/// which stays the same when the store call fails.
async fn change_subscription(
    bot: &Bot,
    chat: ChatId,
    app: &App,
    raw: &str,
    subscribe: bool,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Some(anime_id) = parse_anime_id(raw) else {
        bot.send_message(chat, "Give the anime id, e.g. /subscribe 52991").await?;
        return Ok(());
    };
    let Some(view) = app.sessions.get(chat).await else {
        bot.send_message(chat, NOT_LOADED).await?;
        return Ok(());
    };
    let mut view = view.lock().await;

    if !matches!(view.state(), ViewState::Ready(_)) || view.user().is_none() {
        bot.send_message(chat, "Use /login to manage subscriptions.").await?;
        return Ok(());
    }

    let outcome = if subscribe {
        view.subscribe(&app.gateway, anime_id).await
    } else {
        view.unsubscribe(&app.gateway, anime_id).await
    };

    if outcome == ActionOutcome::Ignored {
        bot.send_message(chat, "No anime with that id in this season. Check the id.").await?;
        return Ok(());
    }

    let title = view
        .find(anime_id)
        .map_or_else(|| format!("#{}", anime_id), |a| a.title.clone());
    let status = if view.is_subscribed(anime_id) {
        format!("🔔 \"{}\": subscribed. /unsubscribe {}", title, anime_id)
    } else {
        format!("🔕 \"{}\": not subscribed. /subscribe {}", title, anime_id)
    };

    bot.send_message(chat, status).await?;

    Ok(())
}
