pub mod db;
pub mod messenger;
pub mod summarizer;

pub use db::DbAdapter;
pub use messenger::HttpMessagingAdapter;
pub use summarizer::HttpSummarizerAdapter;
