use std::sync::Arc;

use chrono::Duration;

use cardauth_db::Database;

use crate::mail::Mailer;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub mailer: Arc<dyn Mailer>,
    /// Public URL of the web UI, linked from notification e-mails.
    pub app_url: String,
}
