//! Credential check command.

use ic_directory::ClientFactory;

use crate::output::{prompt_password, success};
use crate::{CliError, CliResult};

use super::ConnectorHandle;

/// Checks a password for `principal`.
///
/// Rejected credentials are an error so the process exits non-zero.
pub fn run_check_credentials<F>(
    handle: &ConnectorHandle<F>,
    principal: &str,
    password: Option<String>,
) -> CliResult<()>
where
    F: ClientFactory,
    F::Client: 'static,
{
    let password = match password {
        Some(password) => password,
        None => prompt_password(&format!("Password for {principal}: "))?,
    };

    if handle.check_credentials(principal, &password)? {
        success(&format!("Credentials accepted for {principal}"));
        Ok(())
    } else {
        Err(CliError::Auth(format!("credentials rejected for {principal}")))
    }
}
