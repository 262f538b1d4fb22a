//! The letter list.

use chrono::{DateTime, Local, Utc};

use crate::client::api_client::LettersApiClient;
use crate::client::app::Route;
use crate::client::notification::Notification;
use crate::client::session::Session;
use crate::core::letters::LetterSummary;

pub const HOME_HEADING: &str = "My Letters";

/// One card in the list. `content` stays empty: bodies are only fetched when
/// a letter is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LetterCard {
    pub id: String,
    pub title: String,
    pub last_modified: String,
    pub content: String,
}

impl From<LetterSummary> for LetterCard {
    fn from(summary: LetterSummary) -> Self {
        Self {
            id: summary.id,
            title: summary.name,
            last_modified: local_date(summary.modified_time),
            content: String::new(),
        }
    }
}

/// Date only, in the local timezone.
pub fn local_date(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%x").to_string()
}

pub struct HomeView {
    api: LettersApiClient,
    session: Session,
    letters: Vec<LetterCard>,
    notification: Option<Notification>,
}

impl HomeView {
    pub fn new(api: LettersApiClient, session: Session) -> Self {
        Self {
            api,
            session,
            letters: Vec::new(),
            notification: None,
        }
    }

    pub fn letters(&self) -> &[LetterCard] {
        &self.letters
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    /// Fetches the list. On failure the previous list is kept.
    pub async fn load(&mut self) {
        match self.api.list(&self.session).await {
            Ok(summaries) => {
                self.letters = summaries.into_iter().map(LetterCard::from).collect();
            }
            Err(e) => {
                tracing::error!(uid = %self.session.user().id, "Error fetching letters: {}", e);
                self.notification = Some(Notification::error("Error loading letters"));
            }
        }
    }

    /// Deletes one letter and drops it from the list without refetching.
    pub async fn delete(&mut self, id: &str) {
        match self.api.delete(&self.session, id).await {
            Ok(()) => self.letters.retain(|letter| letter.id != id),
            Err(e) => {
                tracing::error!(letter_id = %id, "Error deleting letter: {}", e);
                self.notification = Some(Notification::error("Error deleting letter"));
            }
        }
    }

    pub fn create(&self) -> Route {
        Route::NewLetter
    }

    pub fn open(&self, id: &str) -> Route {
        Route::Editor(id.to_string())
    }
}
