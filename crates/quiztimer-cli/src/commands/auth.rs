use clap::Subcommand;
use quiztimer_core::attempt::keyring_store::{self, API_TOKEN_KEY};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Store the API bearer token in the OS keyring
    SetToken {
        /// Bearer token sent with attempt requests
        token: String,
    },
    /// Remove the stored token
    Clear,
    /// Report whether a token is stored
    Status,
}

pub fn run(action: AuthAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AuthAction::SetToken { token } => {
            let token = token.trim();
            if token.is_empty() {
                return Err("token must not be empty".into());
            }
            keyring_store::set(API_TOKEN_KEY, token)?;
            println!("token stored");
        }
        AuthAction::Clear => {
            keyring_store::delete(API_TOKEN_KEY)?;
            println!("token cleared");
        }
        AuthAction::Status => {
            let stored = keyring_store::get(API_TOKEN_KEY)?.is_some();
            println!("{}", serde_json::json!({ "authenticated": stored }));
        }
    }
    Ok(())
}
