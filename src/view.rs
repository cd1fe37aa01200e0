//! Schedule view for a single chat.
//!
//! A view starts in [`ViewState::Loading`], is mounted exactly once and ends
//! up either [`ViewState::Ready`] or [`ViewState::Failed`]. Subscription
//! actions only apply to a ready view with a signed-in user, and a failed
//! action never changes what the view shows.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::api::{Anime, ScheduleFetcher};
use crate::broadcast::{Zones, MISSING_PLACEHOLDER};
use crate::gateway::{Identity, Subscription, SubscriptionGateway, User};

pub const FETCH_ERROR_MESSAGE: &str = "An error occurred while fetching anime data";

/// Telegram's limit for a single text message, in UTF-16 code units.
pub const MESSAGE_LIMIT: usize = 4096;

const HEADING: &str = "Currently Airing Anime";
const SKELETON_CARDS: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
   Loading,
   Failed(String),
   Ready(Schedule),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
   pub anime: Vec<Anime>,
   pub subscriptions: BTreeSet<i64>,
   pub user: Option<User>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
   Applied,
   /// Preconditions were not met; nothing was sent to the gateway.
   Ignored,
   /// The gateway call failed and was logged.
   Failed,
}

#[derive(Debug, Clone)]
pub struct ScheduleView {
   state: ViewState,
   zones: Zones,
   clock: fn() -> DateTime<Utc>,
}

impl ScheduleView {
   pub fn new(zones: Zones) -> Self {
      Self {
         state: ViewState::Loading,
         zones,
         clock: Utc::now,
      }
   }

   #[cfg(test)]
   pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
      self.clock = clock;
      self
   }

   pub fn state(&self) -> &ViewState {
      &self.state
   }

   /// False until `mount` has run.
   pub fn is_mounted(&self) -> bool {
      self.state != ViewState::Loading
   }

   pub fn zones(&self) -> Zones {
      self.zones
   }

   pub fn user(&self) -> Option<&User> {
      match &self.state {
         ViewState::Ready(schedule) => schedule.user.as_ref(),
         _ => None,
      }
   }

   pub fn is_subscribed(&self, anime_id: i64) -> bool {
      match &self.state {
         ViewState::Ready(schedule) => schedule.subscriptions.contains(&anime_id),
         _ => false,
      }
   }

   pub fn find(&self, anime_id: i64) -> Option<&Anime> {
      match &self.state {
         ViewState::Ready(schedule) => schedule.anime.iter().find(|a| a.mal_id == anime_id),
         _ => None,
      }
   }

   /// Anime the local subscription set currently holds, in list order.
   pub fn subscribed(&self) -> Vec<&Anime> {
      match &self.state {
         ViewState::Ready(schedule) => schedule
            .anime
            .iter()
            .filter(|a| schedule.subscriptions.contains(&a.mal_id))
            .collect(),
         _ => Vec::new(),
      }
   }

   pub fn set_viewer_timezone(&mut self, viewer: Tz) {
      self.zones.viewer = viewer;
   }

   /// Display string for an anime's broadcast slot in the viewer's zone.
   pub fn broadcast_time(&self, anime: &Anime) -> String {
      let broadcast = &anime.broadcast;

      self.zones.format(
         broadcast.day.as_deref(),
         broadcast.time.as_deref(),
         broadcast.timezone.as_deref(),
         (self.clock)(),
      )
   }

   /// Loads the season. Only the first call on a loading view does anything.
   pub async fn mount<F>(&mut self, fetcher: &F)
   where
      F: ScheduleFetcher + Sync,
   {
      if self.state != ViewState::Loading {
         return;
      }

      self.state = match fetcher.fetch_season().await {
         Ok(anime) => ViewState::Ready(Schedule {
            anime,
            subscriptions: BTreeSet::new(),
            user: None,
         }),
         Err(e) => {
            log::error!("Fetching the season failed: {}", e);
            ViewState::Failed(FETCH_ERROR_MESSAGE.to_string())
         }
      };
   }

   /// Signs in and replaces the local subscription set with the store's.
   pub async fn login<G>(&mut self, gateway: &G, identity: Option<Identity>) -> ActionOutcome
   where
      G: SubscriptionGateway + Sync,
   {
      let ViewState::Ready(schedule) = &mut self.state else {
         return ActionOutcome::Ignored;
      };

      let user = match gateway.sign_in(identity).await {
         Ok(user) => user,
         Err(e) => {
            log::error!("Login failed: {}", e);
            return ActionOutcome::Failed;
         }
      };

      match gateway.list_subscriptions(&user.uid).await {
         Ok(stored) => schedule.subscriptions = stored,
         Err(e) => log::warn!("Keeping local subscriptions for {}: {}", user.uid, e),
      }

      log::info!("{} signed in", user.uid);
      schedule.user = Some(user);

      ActionOutcome::Applied
   }

   pub async fn subscribe<G>(&mut self, gateway: &G, anime_id: i64) -> ActionOutcome
   where
      G: SubscriptionGateway + Sync,
   {
      let Some(anime) = self.find(anime_id) else {
         return ActionOutcome::Ignored;
      };
      let Some(user) = self.user() else {
         return ActionOutcome::Ignored;
      };

      let subscription = Subscription {
         user_id: user.uid.clone(),
         anime_id,
         anime_title: anime.title.clone(),
         broadcast_time: self.broadcast_time(anime),
      };

      if let Err(e) = gateway.create_subscription(&subscription).await {
         log::error!("Subscription failed: {}", e);
         return ActionOutcome::Failed;
      }

      if let ViewState::Ready(schedule) = &mut self.state {
         schedule.subscriptions.insert(anime_id);
      }

      ActionOutcome::Applied
   }

   pub async fn unsubscribe<G>(&mut self, gateway: &G, anime_id: i64) -> ActionOutcome
   where
      G: SubscriptionGateway + Sync,
   {
      let Some(user_id) = self.user().map(|u| u.uid.clone()) else {
         return ActionOutcome::Ignored;
      };

      if let Err(e) = gateway.delete_subscription(&user_id, anime_id).await {
         log::error!("Unsubscription failed: {}", e);
         return ActionOutcome::Failed;
      }

      if let ViewState::Ready(schedule) = &mut self.state {
         schedule.subscriptions.remove(&anime_id);
      }

      ActionOutcome::Applied
   }

   pub fn render(&self) -> String {
      self.render_pages(usize::MAX).concat()
   }

   /// Renders the view as messages of at most `limit` UTF-16 code units each.
   pub fn render_pages(&self, limit: usize) -> Vec<String> {
      match &self.state {
         ViewState::Loading => {
            let skeleton = (0..SKELETON_CARDS).map(|_| String::from("░░░░░░░░\n░░░░░░░░░░░░░░░░\n"));
            paginate(format!("{}\n\nLoading…\n", HEADING), skeleton, limit)
         }
         ViewState::Failed(message) => vec![format!("Error\n\n{}", message)],
         ViewState::Ready(schedule) => {
            let header = match &schedule.user {
               Some(user) => format!("{}\nWelcome, {}\n", HEADING, user.display_name),
               None => format!("{}\nLogin with /login to subscribe\n", HEADING),
            };

            let cards = schedule.anime.iter().map(|anime| self.render_card(schedule, anime));
            paginate(header, cards, limit)
         }
      }
   }

   fn render_card(&self, schedule: &Schedule, anime: &Anime) -> String {
      let mut card = format!(
         "\n{} [#{}]\nAirs: {}\nRating: {}\n",
         anime.title,
         anime.mal_id,
         self.broadcast_time(anime),
         format_score(anime.score),
      );

      if let Some(url) = anime.image_url() {
         card.push_str(url);
         card.push('\n');
      }

      if schedule.user.is_some() {
         if schedule.subscriptions.contains(&anime.mal_id) {
            card.push_str(&format!("🔕 /unsubscribe {}\n", anime.mal_id));
         } else {
            card.push_str(&format!("🔔 /subscribe {}\n", anime.mal_id));
         }
      }

      card
   }
}

pub fn format_score(score: Option<f64>) -> String {
   match score {
      Some(s) if s != 0.0 => format!("{:.2}", s),
      _ => MISSING_PLACEHOLDER.to_string(),
   }
}

/// Packs a header and cards into pages. A card longer than `limit` is cut.
fn paginate(header: String, cards: impl Iterator<Item = String>, limit: usize) -> Vec<String> {
   let mut pages = Vec::new();
   let mut page = truncate(header, limit);
   let mut page_len = utf16_len(&page);

   for card in cards {
      let card = truncate(card, limit);
      let card_len = utf16_len(&card);

      if page_len + card_len > limit && !page.is_empty() {
         pages.push(std::mem::take(&mut page));
         page_len = 0;
      }

      page.push_str(&card);
      page_len += card_len;
   }

   if !page.is_empty() {
      pages.push(page);
   }

   pages
}

fn utf16_len(text: &str) -> usize {
   text.encode_utf16().count()
}

/// Cuts `text` on a char boundary so it fits in `limit` UTF-16 code units.
fn truncate(text: String, limit: usize) -> String {
   if utf16_len(&text) <= limit {
      return text;
   }

   let mut used = 0;
   text.chars()
      .take_while(|c| {
         used += c.len_utf16();
         used <= limit
      })
      .collect()
}
