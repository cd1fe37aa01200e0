//! Identity and subscription storage seam.
//!
//! The view only talks to [`SubscriptionGateway`]; the MongoDB-backed
//! implementation lives in [`crate::mongodb`].

use std::collections::BTreeSet;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
   #[error("sign-in requires a message sender")]
   Anonymous,
   #[error("bots cannot sign in")]
   BotAccount,
   #[error(transparent)]
   Store(#[from] ::mongodb::error::Error),
}

/// Sender of a chat message, as reported by Telegram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
   pub id: u64,
   pub display_name: String,
   pub is_bot: bool,
}

/// Signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
   pub uid: String,
   pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
   pub user_id: String,
   pub anime_id: i64,
   pub anime_title: String,
   /// Display string computed when subscribing.
   pub broadcast_time: String,
}

pub fn subscription_key(user_id: &str, anime_id: i64) -> String {
   format!("{}_{}", user_id, anime_id)
}

impl Subscription {
   pub fn key(&self) -> String {
      subscription_key(&self.user_id, self.anime_id)
   }
}

/// Checks that an identity may sign in and turns it into a user.
pub fn authenticate(identity: Option<Identity>) -> Result<User, GatewayError> {
   let identity = identity.ok_or(GatewayError::Anonymous)?;

   if identity.is_bot {
      return Err(GatewayError::BotAccount);
   }

   Ok(User {
      uid: identity.id.to_string(),
      display_name: identity.display_name,
   })
}

#[trait_variant::make(SubscriptionGateway: Send)]
pub trait LocalSubscriptionGateway {
   /// Signs the sender in.
   async fn sign_in(&self, identity: Option<Identity>) -> Result<User, GatewayError>;

   /// Upserts the subscription document.
   async fn create_subscription(&self, subscription: &Subscription) -> Result<(), GatewayError>;

   /// Removes the subscription document if it exists.
   async fn delete_subscription(&self, user_id: &str, anime_id: i64) -> Result<(), GatewayError>;

   /// Anime ids the store holds for `user_id`.
   async fn list_subscriptions(&self, user_id: &str) -> Result<BTreeSet<i64>, GatewayError>;
}
