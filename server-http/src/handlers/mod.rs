mod events;
mod health;
mod keys;

pub use events::stream_events;
pub use health::health_check;
pub use keys::{create_key, delete_key, get_key, verify_key};

use axum::http::StatusCode;
use shared::Error;

/// Map the error taxonomy onto HTTP statuses. `CacheUnavailable` and
/// `Propagation` are recovered below this layer and never reach it.
pub(crate) fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::NotFound => StatusCode::NOT_FOUND,
        Error::Unauthorized => StatusCode::UNAUTHORIZED,
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
