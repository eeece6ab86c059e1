//! LDAP connections over `ldap3`.
//!
//! [`LdapClientFactory`] opens connections to the configured controllers in
//! failover order and binds them as the service account. Each
//! [`LdapClient`] is owned by one search or one write operation.
//!
//! ## Security Requirements
//!
//! `ssl` is the default protocol. A plain LDAP connection is logged as a
//! warning. Empty passwords are rejected before any bind is attempted, since
//! most servers treat them as an anonymous bind.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ldap3::asn1::{parse_tag, parse_uint};
use ldap3::controls::{Control, PagedResults, RawControl};
use ldap3::{LdapConn, LdapConnSettings, LdapResult, Mod, ResultEntry, Scope, SearchEntry};
use tracing::{debug, info, warn};

use crate::client::{
    AttributeValues, ClientFactory, DirectoryClient, DirectoryWriter, Modification, SearchResponse,
    SearchStatus,
};
use crate::config::{DirectoryConfig, SecurityProtocol};
use crate::dn::Dn;
use crate::entry::RawEntry;
use crate::error::{result_code, DirectoryError, DirectoryResult};
use crate::paging::{PagedResultsControl, PagedResultsResponse, PAGED_RESULTS_OID};

/// Requested attributes: all user attributes.
const ALL_USER_ATTRIBUTES: &str = "*";

// ============================================================================
// Client Factory
// ============================================================================

/// Opens [`LdapClient`]s from a [`DirectoryConfig`].
#[derive(Debug, Clone)]
pub struct LdapClientFactory {
    config: Arc<DirectoryConfig>,
}

impl LdapClientFactory {
    /// Creates a factory.
    pub fn new(config: Arc<DirectoryConfig>) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Opens a connection to the first reachable controller of `urls`.
    fn open(&self, urls: &[String]) -> DirectoryResult<(LdapConn, String)> {
        if self.config.security == SecurityProtocol::Plain {
            warn!("Directory connection is not encrypted (protocol 'plain')");
        }

        let mut last_error = None;

        for url in urls {
            let settings = LdapConnSettings::new().set_conn_timeout(self.config.connect_timeout);
            match LdapConn::with_settings(settings, url) {
                Ok(conn) => {
                    debug!(url = %url, "Connected to directory controller");
                    return Ok((conn, url.clone()));
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Directory controller unreachable, trying next");
                    last_error = Some(e.to_string());
                }
            }
        }

        Err(DirectoryError::connection(format!(
            "no directory controller reachable: {}",
            last_error.unwrap_or_else(|| "no hosts configured".to_string())
        )))
    }
}

impl ClientFactory for LdapClientFactory {
    type Client = LdapClient;

    fn connect(&self) -> DirectoryResult<LdapClient> {
        let (mut conn, url) = self.open(&self.config.provider_urls()?)?;

        conn.with_timeout(self.config.read_timeout)
            .simple_bind(
                &self.config.service_account_dn,
                &self.config.service_account_password,
            )?
            .success()?;

        info!(url = %url, bind_dn = %self.config.service_account_dn, "Bound to directory");

        Ok(LdapClient {
            conn,
            read_timeout: self.config.read_timeout,
        })
    }

    fn authenticate(&self, dn: &str, password: &str) -> DirectoryResult<()> {
        self.authenticate_at(&self.config.provider_urls()?, dn, password)
    }

    fn authenticate_at(&self, urls: &[String], dn: &str, password: &str) -> DirectoryResult<()> {
        if password.is_empty() {
            return Err(DirectoryError::from_result_code(
                result_code::INVALID_CREDENTIALS,
                "empty password",
            ));
        }

        let (mut conn, _) = self.open(urls)?;
        let outcome = conn
            .with_timeout(self.config.read_timeout)
            .simple_bind(dn, password)
            .map_err(DirectoryError::from)
            .and_then(|r| r.success().map(drop).map_err(DirectoryError::from));

        if let Err(e) = conn.unbind() {
            debug!(error = %e, "Unbind after credential check failed");
        }

        outcome.map_err(|e| {
            if e.is_invalid_credentials() {
                debug!(dn = %dn, "Directory rejected credentials");
            }
            e
        })
    }
}

// ============================================================================
// Client
// ============================================================================

/// A bound `ldap3` connection.
pub struct LdapClient {
    conn: LdapConn,
    read_timeout: Duration,
}

impl std::fmt::Debug for LdapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapClient")
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl DirectoryClient for LdapClient {
    fn search(
        &mut self,
        base: &Dn,
        filter: &str,
        control: &PagedResultsControl,
    ) -> DirectoryResult<SearchResponse> {
        let base = base.to_string();
        let ldap3::SearchResult(results, result) = self
            .conn
            .with_controls(vec![paged_request_control(control)])
            .with_timeout(self.read_timeout)
            .search(&base, Scope::Subtree, filter, vec![ALL_USER_ATTRIBUTES])?;

        let mut references = 0usize;
        let entries: Vec<RawEntry> = results
            .into_iter()
            .filter(|e: &ResultEntry| {
                let is_ref = e.is_ref();
                references += usize::from(is_ref);
                !is_ref
            })
            .map(|e| RawEntry::from(SearchEntry::construct(e)))
            .collect();

        let status = match result.rc {
            0 if references == 0 => SearchStatus::Complete,
            0 => SearchStatus::Referral(format!("{references} continuation reference(s)")),
            result_code::PARTIAL_RESULTS | result_code::REFERRAL => {
                let message = if result.refs.is_empty() {
                    result.text.clone()
                } else {
                    result.refs.join(" ")
                };
                SearchStatus::Referral(message)
            }
            code => return Err(DirectoryError::from_result_code(code, result.text)),
        };

        let paged = paged_response_control(&result.ctrls)?;

        Ok(SearchResponse {
            entries,
            paged,
            status,
        })
    }

    fn close(&mut self) -> DirectoryResult<()> {
        self.conn.unbind()?;
        Ok(())
    }
}

impl DirectoryWriter for LdapClient {
    fn add(&mut self, dn: &Dn, attributes: &[(String, AttributeValues)]) -> DirectoryResult<()> {
        let dn = dn.to_string();
        let attributes: Vec<(Vec<u8>, HashSet<Vec<u8>>)> = attributes
            .iter()
            .map(|(name, values)| (name.clone().into_bytes(), values.iter().cloned().collect()))
            .collect();
        let result = self.conn.with_timeout(self.read_timeout).add(&dn, attributes)?;
        expect_success(result)?;
        debug!(dn = %dn, "Entry added");
        Ok(())
    }

    fn modify(&mut self, dn: &Dn, changes: &[Modification]) -> DirectoryResult<()> {
        let dn = dn.to_string();
        let mods: Vec<Mod<Vec<u8>>> = changes.iter().map(to_mod).collect();
        let result = self.conn.with_timeout(self.read_timeout).modify(&dn, mods)?;
        expect_success(result)?;
        debug!(dn = %dn, changes = changes.len(), "Entry modified");
        Ok(())
    }

    fn delete(&mut self, dn: &Dn) -> DirectoryResult<()> {
        let dn = dn.to_string();
        let result = self.conn.with_timeout(self.read_timeout).delete(&dn)?;
        expect_success(result)?;
        debug!(dn = %dn, "Entry deleted");
        Ok(())
    }

    fn rename(&mut self, dn: &Dn, new_dn: &Dn) -> DirectoryResult<()> {
        let rdn = new_dn.rdn().ok_or_else(|| DirectoryError::InvalidDn {
            dn: new_dn.to_string(),
            reason: "cannot rename an entry to the root".to_string(),
        })?;
        let new_parent = new_dn.parent().filter(|parent| Some(parent) != dn.parent().as_ref());
        let new_superior = new_parent.as_ref().map(ToString::to_string);

        let old = dn.to_string();
        let result = self.conn.with_timeout(self.read_timeout).modifydn(
            &old,
            &rdn.to_string(),
            true,
            new_superior.as_deref(),
        )?;
        expect_success(result)?;
        debug!(dn = %old, new_dn = %new_dn, "Entry renamed");
        Ok(())
    }
}

fn to_mod(change: &Modification) -> Mod<Vec<u8>> {
    let attr = change.attribute().as_bytes().to_vec();
    let values: HashSet<Vec<u8>> = change.values().iter().cloned().collect();
    match change {
        Modification::Add(..) => Mod::Add(attr, values),
        Modification::Replace(..) => Mod::Replace(attr, values),
        Modification::Delete(..) => Mod::Delete(attr, values),
    }
}

/// Maps a write result onto an error carrying the server's result code.
fn expect_success(result: LdapResult) -> DirectoryResult<()> {
    match result.rc {
        0 => Ok(()),
        code => Err(DirectoryError::Operation {
            code,
            message: result.text,
        }),
    }
}

/// Converts the request control into its wire form.
fn paged_request_control(control: &PagedResultsControl) -> RawControl {
    let mut raw: RawControl = PagedResults {
        size: i32::try_from(control.size).unwrap_or(i32::MAX),
        cookie: control.cookie.clone(),
    }
    .into();
    raw.crit = control.critical;
    raw
}

/// Finds and decodes the paged results response control.
///
/// `realSearchControlValue ::= SEQUENCE { size INTEGER, cookie OCTET STRING }`
fn paged_response_control(ctrls: &[Control]) -> DirectoryResult<Option<PagedResultsResponse>> {
    let Some(Control(_, raw)) = ctrls.iter().find(|c| c.1.ctype == PAGED_RESULTS_OID) else {
        return Ok(None);
    };
    let Some(value) = raw.val.as_deref() else {
        return Err(DirectoryError::Control("paged results control has no value".into()));
    };
    decode_paged_response(value).map(Some)
}

fn decode_paged_response(value: &[u8]) -> DirectoryResult<PagedResultsResponse> {
    let malformed = |what: &str| DirectoryError::Control(format!("paged results control: {what}"));

    let (_, tag) = parse_tag(value).map_err(|_| malformed("not BER encoded"))?;
    let mut fields = tag
        .expect_constructed()
        .ok_or_else(|| malformed("expected a sequence"))?
        .into_iter();

    let size = fields
        .next()
        .and_then(|t| t.expect_primitive())
        .ok_or_else(|| malformed("missing size"))?;
    let (_, size) = parse_uint(&size).map_err(|_| malformed("invalid size"))?;
    let cookie = fields
        .next()
        .and_then(|t| t.expect_primitive())
        .ok_or_else(|| malformed("missing cookie"))?;

    Ok(PagedResultsResponse {
        result_size: u32::try_from(size).unwrap_or(u32::MAX),
        cookie,
    })
}
