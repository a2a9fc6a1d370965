//! Command-line front end for the admin panel session.
//!
//! Configuration comes from the environment (see [`SessionConfig::from_env`]).

use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use panel_auth::GuardOutcome;
use panel_observability::LogFormat;
use panel_session::{LoginCredentials, NavigationGate, SessionConfig, SessionManager};

const USAGE: &str = "usage: panel-session <command>

commands:
  status                      show the current session
  login <email> <password>    log in and verify admin access
  logout                      end the session
  refresh                     re-issue the credential
  profile                     reload the profile from the backend
  verify                      ask the backend whether access is still granted
  navigate <path>             run the route guards for <path>
  forgot-password <email>     request a password reset link";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    panel_observability::init_with(LogFormat::from_env());

    let config = SessionConfig::from_env()?;
    tracing::info!(api_url = %config.api_url, data_dir = ?config.data_dir, "starting panel session");

    let session = Arc::new(
        SessionManager::from_config(&config).context("failed to initialise the session manager")?,
    );

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        [] | ["status"] => print_json(&session.current())?,
        ["login", email, password] => {
            let identity = session.login(&LoginCredentials::new(*email, *password)).await?;
            print_json(&identity)?;
        }
        ["logout"] => {
            session.logout().await;
            print_json(&session.current())?;
        }
        ["refresh"] => print_json(&session.refresh().await?)?,
        ["profile"] => print_json(&session.load_profile().await?)?,
        ["verify"] => println!("{}", session.verifier().verify().await),
        ["navigate", path] => {
            let gate = NavigationGate::admin_panel(session.clone());
            let outcome = gate.routes().check(&session.current(), path);
            if let GuardOutcome::Deny { end_session: true, .. } = outcome {
                // awaited here so the backend call finishes before the process exits
                session.logout().await;
            }
            print_json(&outcome)?;
        }
        ["forgot-password", email] => print_json(&session.forgot_password(email).await?)?,
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{out}");
    Ok(())
}
