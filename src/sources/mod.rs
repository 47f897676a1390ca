pub mod browser;
pub mod extract;
pub mod traits;

pub use browser::{FeedSource, MAPS_CARD_SELECTOR, MAPS_FEED_SELECTOR};
pub use extract::{FieldRule, MapsExtractor, SelectorExtractor};
pub use traits::{ElementSource, Extract, SeenSet, SharedSeen};
