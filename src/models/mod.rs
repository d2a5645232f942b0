pub mod click;
pub mod url;

pub use click::{ClickEvent, ClickMetadata};
pub use url::{Liveness, NewUrlEntry, ShortenRequest, UrlEntry, UrlStats};
