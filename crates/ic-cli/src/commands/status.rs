//! Connection status command.

use ic_directory::ClientFactory;

use crate::output::success;
use crate::CliResult;

use super::ConnectorHandle;

/// Binds with the service account and reports the result.
pub fn run_status<F>(handle: &ConnectorHandle<F>) -> CliResult<()>
where
    F: ClientFactory,
    F::Client: 'static,
{
    let connector = handle.connector();
    connector.test_connection()?;
    success(&format!("Connected ({})", connector.connector_type()));
    Ok(())
}
