use std::collections::BTreeSet;

use ::mongodb::{Collection, Database};
use bson::doc;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::gateway::{self, GatewayError, Identity, Subscription, SubscriptionGateway, User};

pub const SUBSCRIPTIONS: &str = "subscriptions";
pub const USERS: &str = "users";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDocument {
   #[serde(rename = "_id")]
   pub id: String,
   pub user_id: String,
   pub anime_id: i64,
   pub anime_title: String,
   pub broadcast_time: String,
}

impl From<&Subscription> for SubscriptionDocument {
   fn from(subscription: &Subscription) -> Self {
      Self {
         id: subscription.key(),
         user_id: subscription.user_id.clone(),
         anime_id: subscription.anime_id,
         anime_title: subscription.anime_title.clone(),
         broadcast_time: subscription.broadcast_time.clone(),
      }
   }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDocument {
   #[serde(rename = "_id")]
   pub id: String,
   pub display_name: String,
   pub last_sign_in: bson::DateTime,
}

/// Subscription gateway backed by two MongoDB collections.
#[derive(Debug, Clone)]
pub struct MongoGateway {
   subscriptions: Collection<SubscriptionDocument>,
   users: Collection<UserDocument>,
}

impl MongoGateway {
   pub fn new(db: &Database) -> Self {
      Self {
         subscriptions: db.collection(SUBSCRIPTIONS),
         users: db.collection(USERS),
      }
   }
}

impl SubscriptionGateway for MongoGateway {
   async fn sign_in(&self, identity: Option<Identity>) -> Result<User, GatewayError> {
      let user = gateway::authenticate(identity).inspect_err(|e| {
         log::error!("Error signing in: {}", e);
      })?;

      self.users
         .update_one(
            doc! { "_id": &user.uid },
            doc! { "$set": {
               "displayName": &user.display_name,
               "lastSignIn": bson::DateTime::now(),
            }},
         )
         .upsert(true)
         .await
         .inspect_err(|e| log::error!("Error recording sign-in for {}: {}", user.uid, e))?;

      Ok(user)
   }

   async fn create_subscription(&self, subscription: &Subscription) -> Result<(), GatewayError> {
      let document = SubscriptionDocument::from(subscription);

      self.subscriptions
         .replace_one(doc! { "_id": &document.id }, &document)
         .upsert(true)
         .await
         .inspect_err(|e| log::error!("Error subscribing to anime {}: {}", document.id, e))?;

      Ok(())
   }

   async fn delete_subscription(&self, user_id: &str, anime_id: i64) -> Result<(), GatewayError> {
      let key = gateway::subscription_key(user_id, anime_id);

      let res = self.subscriptions
         .delete_one(doc! { "_id": &key })
         .await
         .inspect_err(|e| log::error!("Error unsubscribing from anime {}: {}", key, e))?;

      if res.deleted_count == 0 {
         log::debug!("Subscription {} was already absent", key);
      }

      Ok(())
   }

   async fn list_subscriptions(&self, user_id: &str) -> Result<BTreeSet<i64>, GatewayError> {
      let cursor = self.subscriptions
         .find(doc! { "userId": user_id })
         .await
         .inspect_err(|e| log::error!("Error listing subscriptions of {}: {}", user_id, e))?;

      let documents: Vec<SubscriptionDocument> = cursor
         .try_collect()
         .await
         .inspect_err(|e| log::error!("Error reading subscriptions of {}: {}", user_id, e))?;

      Ok(documents.into_iter().map(|d| d.anime_id).collect())
   }
}
