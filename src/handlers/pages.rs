use axum::response::Html;
use tracing::instrument;

use crate::pages::render_home_page;

/// Landing page
#[instrument]
pub async fn home_page() -> Html<String> {
    Html(render_home_page())
}
