mod middleware;
mod public;

pub use middleware::{REQUEST_ID_HEADER, RequestContext};
pub use public::{HttpState, SNAPSHOT_VERSION_HEADER, build_router};
