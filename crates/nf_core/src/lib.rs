pub mod error;
pub mod feed;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
pub use feed::{select_home_feed, HomeFeed};
pub use storage::{ArticleReader, ArticleStorage, InteractionStorage, Store};
pub use types::{Article, Interaction, InteractionType, RegisterSession, RegisterUser};

pub mod prelude {
    pub use super::{Article, ArticleStorage, Error, HomeFeed, InteractionStorage, Result};
}
