//! The letter editor: load, save and delete for a single letter.

use crate::client::api_client::LettersApiClient;
use crate::client::app::Route;
use crate::client::editor_codec::RichTextCodec;
use crate::client::notification::Notification;
use crate::client::session::Session;
use crate::core::letters::LetterDocument;

pub struct EditorView<C: RichTextCodec> {
    api: LettersApiClient,
    session: Session,
    codec: C,
    /// `None` until the letter has been saved once.
    id: Option<String>,
    title: String,
    content: C::State,
    notification: Option<Notification>,
}

impl<C: RichTextCodec> EditorView<C> {
    pub fn new(api: LettersApiClient, session: Session, codec: C, id: Option<String>) -> Self {
        let content = codec.empty();
        Self {
            api,
            session,
            codec,
            id,
            title: String::new(),
            content,
            notification: None,
        }
    }

    pub fn heading(&self) -> &'static str {
        if self.id.is_some() {
            "Edit Letter"
        } else {
            "New Letter"
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn content(&self) -> &C::State {
        &self.content
    }

    pub fn set_content(&mut self, content: C::State) {
        self.content = content;
    }

    /// Delete is only offered for letters that exist on the server.
    pub fn can_delete(&self) -> bool {
        self.id.is_some()
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    fn fail(&mut self, message: &str) {
        self.notification = Some(Notification::error(message));
    }

    /// Fetches the letter named by `id`. A new letter has nothing to load.
    pub async fn load(&mut self) {
        let Some(id) = self.id.clone() else {
            return;
        };

        let letter = match self.api.get(&self.session, &id).await {
            Ok(letter) => letter,
            Err(e) => {
                tracing::error!(letter_id = %id, "Error fetching letter: {}", e);
                return self.fail("Error loading letter");
            }
        };

        match self.codec.decode(&letter.content) {
            Ok(content) => {
                self.title = letter.title;
                self.content = content;
            }
            Err(e) => {
                tracing::error!(letter_id = %id, "Error fetching letter: {}", e);
                self.fail("Error loading letter");
            }
        }
    }

    /// Creates or overwrites the letter. Returns where to navigate, if anywhere:
    /// the first save of a new letter moves to its editor route. The view is
    /// borrowed for the whole request, so saves never overlap.
    pub async fn save(&mut self) -> Option<Route> {
        if self.title.trim().is_empty() {
            self.fail("Please enter a title for your letter");
            return None;
        }

        let letter = LetterDocument::new(self.title.clone(), self.codec.encode(&self.content));

        let result = match self.id.clone() {
            Some(id) => self
                .api
                .update(&self.session, &id, &letter)
                .await
                .map(|()| None),
            None => self
                .api
                .create(&self.session, &letter)
                .await
                .map(Some),
        };

        match result {
            Ok(created) => {
                self.notification = Some(Notification::success("Letter saved successfully"));
                created.map(|id| {
                    self.id = Some(id.clone());
                    Route::Editor(id)
                })
            }
            Err(e) => {
                tracing::error!("Error saving letter: {}", e);
                self.fail("Error saving letter");
                None
            }
        }
    }

    /// Deletes the letter and returns to the list on success.
    pub async fn delete(&mut self) -> Option<Route> {
        if !self.can_delete() {
            return None;
        }
        let id = self.id.clone()?;

        match self.api.delete(&self.session, &id).await {
            Ok(()) => Some(Route::Home),
            Err(e) => {
                tracing::error!(letter_id = %id, "Error deleting letter: {}", e);
                self.fail("Error deleting letter");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::api_client::test_server::{session, spawn};
    use crate::client::editor_codec::DraftRawCodec;
    use crate::client::notification::Severity;

    async fn new_editor() -> (EditorView<DraftRawCodec>, LettersApiClient) {
        let api = LettersApiClient::new(spawn().await);
        let view = EditorView::new(api.clone(), session("alice"), DraftRawCodec, None);
        (view, api)
    }

    #[tokio::test]
    async fn test_blank_title_never_sends_a_request() {
        // Nothing listens on this port: any request would come back as a
        // network error and "Error saving letter".
        let api = LettersApiClient::new("http://127.0.0.1:1");
        let mut view = EditorView::new(api, session("alice"), DraftRawCodec, None);
        view.set_title("   ");

        assert_eq!(view.save().await, None);
        assert_eq!(
            view.notification(),
            Some(&Notification::error("Please enter a title for your letter"))
        );
    }

    #[tokio::test]
    async fn test_first_save_creates_and_navigates() {
        let (mut view, api) = new_editor().await;
        assert_eq!(view.heading(), "New Letter");
        assert!(!view.can_delete());

        view.set_title("Mom");
        view.set_content("Dear Mom,\nHello".to_string());
        let route = view.save().await;

        let id = view.id().unwrap().to_string();
        assert_eq!(route, Some(Route::Editor(id.clone())));
        assert_eq!(view.heading(), "Edit Letter");
        assert_eq!(view.notification().unwrap().severity, Severity::Success);

        let stored = api.get(&session("alice"), &id).await.unwrap();
        assert_eq!(stored.title, "Mom");
        assert_eq!(stored.content["blocks"][1]["text"], "Hello");
    }

    #[tokio::test]
    async fn test_second_save_overwrites_and_stays() {
        let (mut view, api) = new_editor().await;
        view.set_title("Mom");
        view.save().await;

        view.set_content("second draft".to_string());
        assert_eq!(view.save().await, None);

        let listed = api.list(&session("alice")).await.unwrap();
        assert_eq!(listed.len(), 1);

        let mut reopened = EditorView::new(
            api,
            session("alice"),
            DraftRawCodec,
            view.id().map(str::to_string),
        );
        reopened.load().await;
        assert_eq!(reopened.title(), "Mom");
        assert_eq!(reopened.content(), "second draft");
    }

    #[tokio::test]
    async fn test_load_unknown_letter_notifies() {
        let api = LettersApiClient::new(spawn().await);
        let mut view =
            EditorView::new(api, session("alice"), DraftRawCodec, Some("gone".to_string()));

        view.load().await;
        assert_eq!(
            view.notification(),
            Some(&Notification::error("Error loading letter"))
        );
        assert_eq!(view.title(), "");
    }

    #[tokio::test]
    async fn test_delete_returns_home() {
        let (mut view, api) = new_editor().await;
        assert_eq!(view.delete().await, None);

        view.set_title("Mom");
        view.save().await;
        assert_eq!(view.delete().await, Some(Route::Home));
        assert!(api.list(&session("alice")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_save_notifies() {
        let api = LettersApiClient::new(spawn().await);
        let mut view =
            EditorView::new(api, session("alice"), DraftRawCodec, Some("gone".to_string()));
        view.set_title("Mom");

        // Overwriting a letter that does not exist fails on the server.
        assert_eq!(view.save().await, None);
        assert_eq!(
            view.notification(),
            Some(&Notification::error("Error saving letter"))
        );
    }
}
