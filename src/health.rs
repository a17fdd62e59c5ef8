//! Built-in health-check handler.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//!
//! ```rust,no_run
//! use echobin::{Router, health};
//!
//! let app = Router::new().any("/healthz", health::liveness);
//! ```

use crate::{Request, Response};

/// Always `200 OK` with body `OK`. Headers, query and body are ignored.
pub async fn liveness(_req: Request) -> Response {
    Response::text("OK")
}
