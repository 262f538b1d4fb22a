// Command line front-end for the client views.
//
// Each command builds the view a user would be looking at, performs the one
// action the command names and prints the result. A failed action surfaces
// the view's notification as the error.

use anyhow::{anyhow, bail, Context, Result};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use super::api_client::LettersApiClient;
use super::app::{AppShell, Route};
use super::editor_codec::DraftRawCodec;
use super::firebase_auth::{FirebaseAuthClient, GoogleCredential, GOOGLE_SIGN_IN_SCOPE};
use super::notification::Notification;
use super::session::{Session, StaticToken, User};
use super::views::{EditorView, LoginView, HOME_HEADING};
use crate::config::ClientConfig;

/// Profile claims carried by a Firebase ID token.
#[derive(Debug, Deserialize)]
struct ProfileClaims {
    sub: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    picture: Option<String>,
}

/// Reads the profile out of an ID token without checking it. The server
/// verifies every token it receives; the client only needs the names.
fn user_from_id_token(token: &str) -> Result<User> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let claims = decode::<ProfileClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .context("LETTERS_ID_TOKEN is not a Firebase ID token")?
        .claims;
    Ok(User {
        id: claims.sub,
        email: claims.email,
        name: claims.name,
        photo_url: claims.picture,
    })
}

/// Builds a signed-in app shell from the configured credentials.
async fn signed_in_shell(config: &ClientConfig) -> Result<AppShell> {
    let session = if let Some(refresh_token) = &config.refresh_token {
        let auth = FirebaseAuthClient::new(config.require_api_key()?);
        auth.restore(refresh_token.as_str())
            .await
            .context("Could not restore the session; run `login` again")?
    } else if let Some(id_token) = &config.id_token {
        let user = user_from_id_token(id_token)?;
        Session::new(user, Arc::new(StaticToken::new(id_token.as_str())))
    } else {
        bail!("Not signed in: set LETTERS_REFRESH_TOKEN (printed by `login`) or LETTERS_ID_TOKEN");
    };

    let mut shell = AppShell::new(LettersApiClient::new(&config.api_url));
    shell.sign_in(session);
    Ok(shell)
}

fn fail_with(notification: Option<&Notification>) -> Result<()> {
    match notification {
        Some(n) if n.is_error() => Err(anyhow!(n.message.clone())),
        _ => Ok(()),
    }
}

fn editor_at(shell: &mut AppShell, route: Route) -> Result<EditorView<DraftRawCodec>> {
    shell.navigate(route);
    shell
        .editor_view(DraftRawCodec)
        .ok_or_else(|| anyhow!("Not signed in"))
}

/// Picks the credential passed on the command line. An ID token wins when
/// both are given.
pub fn credential_from_args(
    id_token: Option<String>,
    access_token: Option<String>,
) -> Result<GoogleCredential> {
    match (id_token, access_token) {
        (Some(token), _) => Ok(GoogleCredential::IdToken(token)),
        (None, Some(token)) => Ok(GoogleCredential::AccessToken(token)),
        (None, None) => bail!(
            "Pass --google-id-token or --google-access-token; the Google sign-in must grant {}",
            GOOGLE_SIGN_IN_SCOPE
        ),
    }
}

pub async fn login(config: &ClientConfig, credential: GoogleCredential) -> Result<()> {
    let view = LoginView::new(FirebaseAuthClient::new(config.require_api_key()?));
    let mut shell = AppShell::new(LettersApiClient::new(&config.api_url));

    let route = view.sign_in(shell.context_mut(), &credential).await?;
    shell.navigate(route);

    let session = shell
        .session()
        .ok_or_else(|| anyhow!("Sign-in did not produce a session"))?;
    let user = session.user();
    println!("Signed in as {} <{}>", user.name, user.email);
    if let Some(refresh_token) = session.refresh_token().await {
        println!("LETTERS_REFRESH_TOKEN={}", refresh_token);
    }
    Ok(())
}

pub async fn whoami(config: &ClientConfig) -> Result<()> {
    let shell = signed_in_shell(config).await?;
    let user = shell.user().ok_or_else(|| anyhow!("Not signed in"))?;
    println!("{} <{}> ({})", user.name, user.email, user.id);
    Ok(())
}

/// Ends the session. Credentials live in the environment, so the user is told
/// which variables to drop.
pub async fn logout(config: &ClientConfig) -> Result<()> {
    let mut shell = signed_in_shell(config).await?;
    let email = shell.user().map(|u| u.email.clone()).unwrap_or_default();

    let route = shell.logout().clone();
    println!("Signed out {}; next stop {}", email, route);
    println!("Remove LETTERS_REFRESH_TOKEN and LETTERS_ID_TOKEN from your environment.");
    Ok(())
}

pub async fn list(config: &ClientConfig) -> Result<()> {
    let shell = signed_in_shell(config).await?;
    let mut home = shell
        .home_view()
        .ok_or_else(|| anyhow!("Not signed in"))?;

    home.load().await;
    fail_with(home.notification())?;

    println!("{}", HOME_HEADING);
    if home.letters().is_empty() {
        println!("No letters yet.");
    }
    for card in home.letters() {
        println!("{}  {}  {}", card.id, card.last_modified, card.title);
    }
    Ok(())
}

pub async fn show(config: &ClientConfig, id: &str) -> Result<()> {
    let mut shell = signed_in_shell(config).await?;
    let mut editor = editor_at(&mut shell, Route::Editor(id.to_string()))?;

    editor.load().await;
    fail_with(editor.notification())?;

    println!("{}\n", editor.title());
    println!("{}", editor.content());
    Ok(())
}

/// Creates a letter, or overwrites `id` when given. The body comes from
/// `file`; without one an existing letter keeps its text.
pub async fn write(
    config: &ClientConfig,
    title: &str,
    id: Option<&str>,
    file: Option<&Path>,
) -> Result<()> {
    let mut shell = signed_in_shell(config).await?;
    let route = match id {
        Some(id) => Route::Editor(id.to_string()),
        None => Route::NewLetter,
    };
    let mut editor = editor_at(&mut shell, route)?;

    if id.is_some() {
        editor.load().await;
        fail_with(editor.notification())?;
    }
    if let Some(file) = file {
        let text = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;
        editor.set_content(text.trim_end_matches('\n').to_string());
    }
    editor.set_title(title);
    println!("{}: {}", editor.heading(), editor.title());

    let next = editor.save().await;
    fail_with(editor.notification())?;
    if let Some(route) = next {
        shell.navigate(route);
    }

    if let Some(notification) = editor.notification() {
        println!("{}", notification.message);
    }
    if let Some(id) = editor.id() {
        println!("{}", id);
    }
    Ok(())
}

pub async fn delete(config: &ClientConfig, id: &str) -> Result<()> {
    let mut shell = signed_in_shell(config).await?;
    let mut editor = editor_at(&mut shell, Route::Editor(id.to_string()))?;

    match editor.delete().await {
        Some(route) => {
            shell.navigate(route);
            println!("Deleted {}", id);
            Ok(())
        }
        None => fail_with(editor.notification()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::firebase::test_tokens;

    #[test]
    fn test_profile_read_from_id_token() {
        let user = user_from_id_token(&test_tokens::id_token("alice")).unwrap();
        assert_eq!(user.id, "alice");
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.name, "Test User");
    }

    #[test]
    fn test_expired_id_token_still_yields_profile() {
        let user = user_from_id_token(&test_tokens::expired_id_token("bob")).unwrap();
        assert_eq!(user.id, "bob");
    }

    #[test]
    fn test_garbage_id_token_is_rejected() {
        assert!(user_from_id_token("not-a-jwt").is_err());
    }

    #[test]
    fn test_credential_from_args() {
        assert!(matches!(
            credential_from_args(Some("jwt".into()), None).unwrap(),
            GoogleCredential::IdToken(t) if t == "jwt"
        ));
        assert!(matches!(
            credential_from_args(None, Some("ya29".into())).unwrap(),
            GoogleCredential::AccessToken(t) if t == "ya29"
        ));

        let err = credential_from_args(None, None).unwrap_err();
        assert!(err.to_string().contains(GOOGLE_SIGN_IN_SCOPE));
    }

    fn id_token_config(uid: &str) -> ClientConfig {
        let token = test_tokens::id_token(uid);
        ClientConfig::from_lookup(|key| (key == "LETTERS_ID_TOKEN").then(|| token.clone()))
    }

    #[tokio::test]
    async fn test_id_token_signs_the_shell_in() {
        let shell = signed_in_shell(&id_token_config("alice")).await.unwrap();
        assert_eq!(shell.user().map(|u| u.id.as_str()), Some("alice"));

        whoami(&id_token_config("alice")).await.unwrap();
        logout(&id_token_config("alice")).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_credentials_is_an_error() {
        let config = ClientConfig::from_lookup(|_| None);
        assert!(signed_in_shell(&config).await.is_err());
    }
}
