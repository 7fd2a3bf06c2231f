mod article;
mod feed_item;
mod subscription;

pub use article::{Article, FeedRef};
pub use feed_item::{FeedItem, ParsedFeed};
pub use subscription::{NewSubscription, Subscription};
