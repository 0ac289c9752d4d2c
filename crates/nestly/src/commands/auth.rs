//! `nestly auth`: PIN → access token, then persist it.

use dialoguer::Input;
use secrecy::ExposeSecret;
use tracing::info;

use nestly_config::Config;
use nestly_core::Nest;

use crate::cli::{AuthArgs, GlobalOpts};
use crate::error::CliError;

fn prompt_pin() -> Result<String, CliError> {
    let pin: String = Input::new()
        .with_prompt("PIN from the Nest authorization page")
        .interact_text()
        .map_err(|e| CliError::Validation {
            field: "pin".into(),
            reason: format!("prompt failed: {e}"),
        })?;
    Ok(pin.trim().to_owned())
}

pub async fn handle(
    args: &AuthArgs,
    nest: &Nest,
    mut cfg: Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (client_id, client_secret) = nestly_config::resolve_product_credentials(&cfg)?;

    let pin = match args.pin {
        Some(ref pin) => pin.trim().to_owned(),
        None => prompt_pin()?,
    };
    if pin.is_empty() {
        return Err(CliError::Validation {
            field: "pin".into(),
            reason: "PIN cannot be empty".into(),
        });
    }

    let access = nest.authorize(&pin, &client_id, &client_secret).await?;
    if let Some(expires_in) = access.expires_in {
        info!(expires_in_secs = expires_in.as_secs(), "token issued");
    }

    let location = if args.keyring {
        nestly_config::store_token_in_keyring(&access.token)?;
        "system keyring".to_owned()
    } else {
        cfg.token = Some(access.token.expose_secret().to_owned());
        let path = nestly_config::save_config(&cfg)?;
        path.display().to_string()
    };

    if !global.quiet {
        eprintln!("✓ Authorized; token saved to {location}");
    }
    Ok(())
}
