mod fetcher;
mod opml_import;

pub use fetcher::{parse_feed, FeedFetcher, FeedSource};
pub use opml_import::{parse_opml, parse_opml_file};
