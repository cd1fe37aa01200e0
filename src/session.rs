use std::collections::HashMap;
use std::sync::Arc;

use teloxide::types::ChatId;
use tokio::sync::Mutex;

use crate::broadcast::Zones;
use crate::view::ScheduleView;

pub type SharedView = Arc<Mutex<ScheduleView>>;

/// In-memory views, one per chat. Nothing here outlives the process.
#[derive(Debug, Clone)]
pub struct Sessions {
   zones: Zones,
   views: Arc<Mutex<HashMap<ChatId, SharedView>>>,
}

impl Sessions {
   pub fn new(zones: Zones) -> Self {
      Self {
         zones,
         views: Arc::new(Mutex::new(HashMap::new())),
      }
   }

   /// Replaces the chat's view with a fresh, unmounted one.
   ///
   /// A viewer timezone chosen with `/timezone` carries over.
   pub async fn remount(&self, chat: ChatId) -> SharedView {
      // the registry lock is never held while waiting on a chat's view
      let zones = match self.get(chat).await {
         Some(previous) => previous.lock().await.zones(),
         None => self.zones,
      };

      let view = Arc::new(Mutex::new(ScheduleView::new(zones)));
      self.views.lock().await.insert(chat, view.clone());
      view
   }

   pub async fn get(&self, chat: ChatId) -> Option<SharedView> {
      self.views.lock().await.get(&chat).cloned()
   }
}
