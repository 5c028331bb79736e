use std::sync::Arc;
use nf_core::{HomeFeed, Store};

pub struct AppState {
    pub storage: Arc<dyn Store>,
    pub home_feed: HomeFeed,
}

impl AppState {
    pub fn new(storage: Arc<dyn Store>) -> Self {
        Self {
            storage,
            home_feed: HomeFeed::default(),
        }
    }

    pub fn with_home_feed(mut self, home_feed: HomeFeed) -> Self {
        self.home_feed = home_feed;
        self
    }
}
