//! Terminal authorization presenter
//!
//! Prints the authorize URL and waits for the user to paste the URL the
//! browser was redirected to. An empty line aborts the flow.

use std::io::{BufRead, Write};

use async_trait::async_trait;
use threads_auth_common::auth::{
    AuthorizationCallback, AuthorizationPresenter, AuthorizationPrompt, PresenterError,
};
use tracing::debug;
use url::Url;

/// [`AuthorizationPresenter`] for interactive terminals
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePresenter;

impl ConsolePresenter {
    /// Create a console presenter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuthorizationPresenter for ConsolePresenter {
    async fn present_authorization(
        &self,
        prompt: &AuthorizationPrompt,
    ) -> Result<AuthorizationCallback, PresenterError> {
        let url = prompt.url.to_string();
        let redirect_uri = prompt.redirect_uri.clone();
        debug!(%redirect_uri, "presenting authorization prompt on the terminal");

        let line = tokio::task::spawn_blocking(move || prompt_for_redirect(&url, &redirect_uri))
            .await
            .map_err(|e| PresenterError::Failed(e.to_string()))??;

        parse_pasted_redirect(&line)
    }
}

#[allow(clippy::print_stderr)]
fn prompt_for_redirect(url: &str, redirect_uri: &str) -> Result<String, PresenterError> {
    let stderr = std::io::stderr();
    let mut out = stderr.lock();
    writeln!(out, "Open this URL in your browser and approve access:\n\n  {url}\n")
        .and_then(|()| {
            writeln!(
                out,
                "Then paste the full URL you were redirected to ({redirect_uri}...).\n\
                 Leave empty to cancel:"
            )
        })
        .and_then(|()| out.flush())
        .map_err(|e| PresenterError::Failed(format!("cannot write prompt: {e}")))?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| PresenterError::Failed(format!("cannot read redirect URL: {e}")))?;
    Ok(line)
}

/// Parse the redirect URL pasted by the user.
///
/// # Errors
/// Returns `PresenterError::Cancelled` for empty input or a denied consent,
/// `PresenterError::Failed` for anything that is not a usable redirect.
pub fn parse_pasted_redirect(line: &str) -> Result<AuthorizationCallback, PresenterError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(PresenterError::Cancelled);
    }

    let url = Url::parse(trimmed)
        .map_err(|e| PresenterError::Failed(format!("not a redirect URL: {e}")))?;
    AuthorizationCallback::from_redirect_url(&url)
}
