//! # Forum Stream
//!
//! Post-stream window state and the discussion page controller.
//!
//! ```text
//! DiscussionPage::open
//!     ├─ Backend::find("discussions", id | slug)
//!     ├─ PostStream::new(included posts)
//!     └─ PostStream::go_to_number(near)
//!            ├─ inside the loaded window -> Ready, no request
//!            └─ otherwise Loading -> Backend::find_all("posts", page[near]) -> Ready
//!
//! view scrolls -> DiscussionPage::on_position_change(start, end)
//!     ├─ PostStream::on_position_change
//!     └─ end > lastReadPostNumber ? set locally, then Backend::save
//! ```

mod backend;
mod error;
mod page;
mod state;

pub use backend::Backend;
pub use error::{Result, StreamError};
pub use page::{DiscussionPage, DiscussionView, DEFAULT_PAGE_SIZE};
pub use state::{PostStream, StreamStatus};
