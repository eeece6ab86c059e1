//! Organizational unit commands.

use ic_directory::{ClientFactory, OrganizationalUnit};
use tabled::Tabled;

use crate::config::OutputFormat;
use crate::output::output;
use crate::CliResult;

use super::ConnectorHandle;

/// Organizational unit representation for display.
#[derive(Debug, Clone, Tabled)]
pub struct OuRow {
    /// Unit name.
    pub name: String,
    /// Entry DN.
    pub dn: String,
}

impl From<&OrganizationalUnit> for OuRow {
    fn from(unit: &OrganizationalUnit) -> Self {
        Self {
            name: unit.name.clone(),
            dn: unit.dn.clone(),
        }
    }
}

/// Lists organizational units.
pub fn run_ous<F>(handle: &ConnectorHandle<F>, output_format: OutputFormat) -> CliResult<()>
where
    F: ClientFactory,
    F::Client: 'static,
{
    let units = handle.organizational_units()?;
    output(&units, output_format, |u| OuRow::from(u))
}
