//! One-shot provisioning commands run from the command line instead of
//! starting the server: `--create-user EMAIL:PASSWORD` and
//! `--issue-token EMAIL [--scope SCOPE]...`.

use crate::{config::Args, models::user::SCOPE_DEPOSIT_WRITE, services::auth_service::AuthService};
use anyhow::{Context, Result, anyhow, bail};
use tracing::info;

/// Scopes an access token may be issued with.
const KNOWN_SCOPES: &[&str] = &[SCOPE_DEPOSIT_WRITE];

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    CreateUser { email: String, password: String },
    IssueToken { email: String, scopes: Vec<String> },
}

impl Command {
    /// Pick the command requested by `args`, if any.
    pub fn from_args(args: &Args) -> Result<Option<Self>> {
        if let Some(value) = &args.create_user {
            let (email, password) = value
                .split_once(':')
                .filter(|(email, password)| !email.is_empty() && !password.is_empty())
                .ok_or_else(|| anyhow!("--create-user expects EMAIL:PASSWORD"))?;
            return Ok(Some(Command::CreateUser {
                email: email.to_string(),
                password: password.to_string(),
            }));
        }

        if let Some(email) = &args.issue_token {
            if let Some(scope) = args
                .scopes
                .iter()
                .find(|s| !KNOWN_SCOPES.contains(&s.as_str()))
            {
                bail!("unknown scope `{}`", scope);
            }
            return Ok(Some(Command::IssueToken {
                email: email.clone(),
                scopes: args.scopes.clone(),
            }));
        }

        Ok(None)
    }

    /// Run the command and return the line to print: the new user's id or
    /// the token secret.
    pub async fn run(&self, auth: &AuthService) -> Result<String> {
        match self {
            Command::CreateUser { email, password } => {
                let user = auth
                    .create_user(email, password)
                    .await
                    .with_context(|| format!("creating user `{}`", email))?;
                info!(user = %user.id, "user created");
                Ok(user.id.to_string())
            }
            Command::IssueToken { email, scopes } => {
                let user = auth
                    .user_by_email(email)
                    .await?
                    .ok_or_else(|| anyhow!("no user `{}`", email))?;
                let scopes: Vec<&str> = scopes.iter().map(String::as_str).collect();
                let token = auth.issue_token(user.id, &scopes).await?;
                info!(user = %user.id, scopes = ?scopes, "access token issued");
                Ok(token)
            }
        }
    }
}
