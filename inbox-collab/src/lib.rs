pub mod consumer;
pub mod items;
pub mod notes;
pub mod outbound;
pub mod replies;
pub mod saved_replies;
pub mod sweeper;
pub mod tags;

pub use consumer::run;
pub use replies::{CreateReplyRequest, ReplyError, ReplyService};
