//! In-memory directory used by the integration tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use ic_directory::{
    AttributeValues, ClientFactory, DirectoryClient, DirectoryError, DirectoryResult,
    DirectoryWriter, Dn, Modification, PagedResultsControl, PagedResultsResponse, RawEntry,
    SearchResponse, SearchStatus,
};

/// A recorded search call.
#[derive(Debug, Clone)]
pub struct SearchCall {
    pub base: Dn,
    pub filter: String,
    pub size: u32,
    pub cookie: Vec<u8>,
    pub critical: bool,
}

/// A recorded write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Add(String, Vec<(String, AttributeValues)>),
    Modify(String, Vec<Modification>),
    Delete(String),
    Rename(String, String),
}

/// Everything the fake observed.
#[derive(Debug, Default)]
pub struct Log {
    pub connects: usize,
    pub searches: Vec<SearchCall>,
    pub closes: usize,
    pub writes: Vec<Write>,
    /// Controller URLs of each bind, empty for the configured ones.
    pub binds: Vec<Vec<String>>,
}

/// A directory holding a fixed list of entries in server order.
///
/// Subtree searches return the entries under the base that match the
/// filter, paged by the requested size. The cookie is the big-endian offset
/// of the next entry. A base with nothing at or below it does not exist.
/// Writes are applied to the entries; new entries get an `entryUUID`.
#[derive(Clone, Default)]
pub struct FakeDirectory {
    entries: Rc<RefCell<Vec<RawEntry>>>,
    fail_on_search: Option<usize>,
    referrals: Rc<Vec<Dn>>,
    passwords: Rc<HashMap<String, String>>,
    unreachable: bool,
    log: Rc<RefCell<Log>>,
}

impl FakeDirectory {
    pub fn new(entries: Vec<RawEntry>) -> Self {
        Self {
            entries: Rc::new(RefCell::new(entries)),
            ..Self::default()
        }
    }

    /// Fails the `n`th search call (1-based) with a connection error.
    pub fn failing_on_search(mut self, n: usize) -> Self {
        self.fail_on_search = Some(n);
        self
    }

    /// Answers searches under `base` with a referral.
    pub fn with_referral(mut self, base: &str) -> Self {
        let mut referrals = (*self.referrals).clone();
        referrals.push(dn(base));
        self.referrals = Rc::new(referrals);
        self
    }

    pub fn with_password(mut self, bind_dn: &str, password: &str) -> Self {
        let mut passwords = (*self.passwords).clone();
        passwords.insert(bind_dn.to_string(), password.to_string());
        self.passwords = Rc::new(passwords);
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn client(&self) -> FakeClient {
        self.log.borrow_mut().connects += 1;
        FakeClient { dir: self.clone() }
    }

    pub fn connects(&self) -> usize {
        self.log.borrow().connects
    }

    pub fn searches(&self) -> Vec<SearchCall> {
        self.log.borrow().searches.clone()
    }

    pub fn closes(&self) -> usize {
        self.log.borrow().closes
    }

    pub fn writes(&self) -> Vec<Write> {
        self.log.borrow().writes.clone()
    }

    pub fn binds(&self) -> Vec<Vec<String>> {
        self.log.borrow().binds.clone()
    }

    /// The current state of the entry at `entry_dn`.
    pub fn entry(&self, entry_dn: &str) -> Option<RawEntry> {
        let target = dn(entry_dn);
        self.entries
            .borrow()
            .iter()
            .find(|e| dn(&e.dn) == target)
            .cloned()
    }

    fn bind(&self, bind_dn: &str, password: &str, urls: &[String]) -> DirectoryResult<()> {
        if self.unreachable {
            return Err(DirectoryError::connection("no directory controller reachable"));
        }
        self.log.borrow_mut().binds.push(urls.to_vec());
        match self.passwords.get(bind_dn) {
            Some(expected) if expected == password && !password.is_empty() => Ok(()),
            _ => Err(DirectoryError::from_result_code(49, "invalid credentials")),
        }
    }

    fn position(&self, entry_dn: &Dn) -> DirectoryResult<usize> {
        self.entries
            .borrow()
            .iter()
            .position(|e| dn(&e.dn) == *entry_dn)
            .ok_or_else(|| DirectoryError::from_result_code(32, "no such object"))
    }

    fn record(&self, write: Write) {
        self.log.borrow_mut().writes.push(write);
    }
}

impl ClientFactory for FakeDirectory {
    type Client = FakeClient;

    fn connect(&self) -> DirectoryResult<FakeClient> {
        if self.unreachable {
            return Err(DirectoryError::connection("no directory controller reachable"));
        }
        Ok(self.client())
    }

    fn authenticate(&self, bind_dn: &str, password: &str) -> DirectoryResult<()> {
        self.bind(bind_dn, password, &[])
    }

    fn authenticate_at(&self, urls: &[String], bind_dn: &str, password: &str) -> DirectoryResult<()> {
        self.bind(bind_dn, password, urls)
    }
}

pub struct FakeClient {
    dir: FakeDirectory,
}

impl DirectoryClient for FakeClient {
    fn search(
        &mut self,
        base: &Dn,
        filter: &str,
        control: &PagedResultsControl,
    ) -> DirectoryResult<SearchResponse> {
        let call_number = {
            let mut log = self.dir.log.borrow_mut();
            log.searches.push(SearchCall {
                base: base.clone(),
                filter: filter.to_string(),
                size: control.size,
                cookie: control.cookie.clone(),
                critical: control.critical,
            });
            log.searches.len()
        };
        if self.dir.fail_on_search == Some(call_number) {
            return Err(DirectoryError::connection("connection reset by peer"));
        }

        let all = self.dir.entries.borrow();
        if !all.iter().any(|e| dn(&e.dn).is_descendant_of(base)) {
            return Err(DirectoryError::from_result_code(32, "no such object"));
        }

        let parsed = parse_filter(filter);
        let matching: Vec<&RawEntry> = all
            .iter()
            .filter(|e| dn(&e.dn).is_descendant_of(base) && parsed.matches(e))
            .collect();

        let offset = if control.cookie.is_empty() {
            0
        } else {
            u32::from_be_bytes(control.cookie[..4].try_into().unwrap()) as usize
        };
        let end = (offset + control.size as usize).min(matching.len());
        let cookie = if end < matching.len() {
            u32::try_from(end).unwrap().to_be_bytes().to_vec()
        } else {
            Vec::new()
        };

        let status = if self.dir.referrals.iter().any(|r| base.is_descendant_of(r)) {
            SearchStatus::Referral("ldap://other.example.com/dc=other".to_string())
        } else {
            SearchStatus::Complete
        };

        Ok(SearchResponse {
            entries: matching[offset..end].iter().map(|e| (*e).clone()).collect(),
            paged: Some(PagedResultsResponse {
                result_size: u32::try_from(matching.len()).unwrap(),
                cookie,
            }),
            status,
        })
    }

    fn close(&mut self) -> DirectoryResult<()> {
        self.dir.log.borrow_mut().closes += 1;
        Ok(())
    }
}

impl DirectoryWriter for FakeClient {
    fn add(&mut self, entry_dn: &Dn, attributes: &[(String, AttributeValues)]) -> DirectoryResult<()> {
        self.dir.record(Write::Add(entry_dn.to_string(), attributes.to_vec()));
        if self.dir.position(entry_dn).is_ok() {
            return Err(DirectoryError::from_result_code(68, "entry already exists"));
        }
        let mut entry = RawEntry::new(entry_dn.to_string());
        for (attr, values) in attributes {
            entry.attributes.insert(attr.clone(), text(values));
        }
        let serial = self.dir.entries.borrow().len();
        entry = entry.with_attr("entryUUID", [format!("uuid-new-{serial}")]);
        self.dir.entries.borrow_mut().push(entry);
        Ok(())
    }

    fn modify(&mut self, entry_dn: &Dn, changes: &[Modification]) -> DirectoryResult<()> {
        self.dir.record(Write::Modify(entry_dn.to_string(), changes.to_vec()));
        let index = self.dir.position(entry_dn)?;
        let mut entries = self.dir.entries.borrow_mut();
        let mut entry = entries[index].clone();
        for change in changes {
            apply(&mut entry, change)?;
        }
        entries[index] = entry;
        Ok(())
    }

    fn delete(&mut self, entry_dn: &Dn) -> DirectoryResult<()> {
        self.dir.record(Write::Delete(entry_dn.to_string()));
        let index = self.dir.position(entry_dn)?;
        self.dir.entries.borrow_mut().remove(index);
        Ok(())
    }

    fn rename(&mut self, entry_dn: &Dn, new_dn: &Dn) -> DirectoryResult<()> {
        self.dir
            .record(Write::Rename(entry_dn.to_string(), new_dn.to_string()));
        let index = self.dir.position(entry_dn)?;
        let mut entries = self.dir.entries.borrow_mut();
        let entry = &mut entries[index];
        entry.dn = new_dn.to_string();
        if let Some(rdn) = new_dn.rdn() {
            entry.attributes.retain(|k, _| !k.eq_ignore_ascii_case(rdn.attr()));
            entry.attributes.insert(rdn.attr().to_string(), vec![rdn.value().to_string()]);
        }
        Ok(())
    }
}

fn text(values: &[Vec<u8>]) -> Vec<String> {
    values
        .iter()
        .map(|v| String::from_utf8_lossy(v).into_owned())
        .collect()
}

fn apply(entry: &mut RawEntry, change: &Modification) -> DirectoryResult<()> {
    let attr = change.attribute();
    let key = entry
        .attributes
        .keys()
        .find(|k| k.eq_ignore_ascii_case(attr))
        .cloned()
        .unwrap_or_else(|| attr.to_string());
    let mut current = entry.attributes.remove(&key).unwrap_or_default();
    let values = text(change.values());
    match change {
        Modification::Add(..) => {
            if values.iter().any(|v| current.contains(v)) {
                return Err(DirectoryError::from_result_code(20, "attribute or value exists"));
            }
            current.extend(values);
        }
        Modification::Replace(..) => current = values,
        Modification::Delete(..) => {
            if current.is_empty() || !values.iter().all(|v| current.contains(v)) {
                return Err(DirectoryError::from_result_code(16, "no such attribute"));
            }
            if values.is_empty() {
                current.clear();
            } else {
                current.retain(|v| !values.contains(v));
            }
        }
    }
    if !current.is_empty() {
        entry.attributes.insert(key, current);
    }
    Ok(())
}

pub fn dn(s: &str) -> Dn {
    Dn::parse(s).unwrap()
}

/// A person entry with `cn`, `uid`, `mail` and an `entryUUID`.
pub fn person(entry_dn: &str, uid: &str) -> RawEntry {
    RawEntry::new(entry_dn)
        .with_attr("objectClass", ["top", "inetOrgPerson"])
        .with_attr("uid", [uid])
        .with_attr("cn", [format!("User {uid}")])
        .with_attr("mail", [format!("{uid}@example.com")])
        .with_attr("entryUUID", [format!("uuid-{uid}")])
}

/// A group entry with `cn` and an `entryUUID`.
pub fn group(entry_dn: &str, name: &str) -> RawEntry {
    RawEntry::new(entry_dn)
        .with_attr("objectClass", ["top", "groupOfNames"])
        .with_attr("cn", [name])
        .with_attr("entryUUID", [format!("uuid-{name}")])
}

// ============================================================================
// Filter evaluation
// ============================================================================

enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Present(String),
    Equals(String, Vec<u8>),
}

impl Filter {
    fn matches(&self, entry: &RawEntry) -> bool {
        match self {
            Self::And(all) => all.iter().all(|f| f.matches(entry)),
            Self::Or(any) => any.iter().any(|f| f.matches(entry)),
            Self::Present(attr) => entry.has_attr(attr),
            Self::Equals(attr, value) => {
                let text = String::from_utf8_lossy(value);
                entry
                    .get_attrs(attr)
                    .iter()
                    .any(|v| v.eq_ignore_ascii_case(&text))
                    || entry.get_binary_attr(attr) == Some(value.as_slice())
            }
        }
    }
}

fn parse_filter(filter: &str) -> Filter {
    let (parsed, rest) = parse_one(filter);
    assert!(rest.is_empty(), "trailing input in filter {filter}");
    parsed
}

fn parse_one(s: &str) -> (Filter, &str) {
    let s = s.strip_prefix('(').expect("filter must start with '('");
    if let Some(rest) = s.strip_prefix('&') {
        let (children, rest) = parse_list(rest);
        return (Filter::And(children), rest);
    }
    if let Some(rest) = s.strip_prefix('|') {
        let (children, rest) = parse_list(rest);
        return (Filter::Or(children), rest);
    }
    let end = s.find(')').expect("unterminated filter item");
    let (attr, value) = s[..end].split_once('=').expect("filter item without '='");
    let item = if value == "*" {
        Filter::Present(attr.to_string())
    } else {
        Filter::Equals(attr.to_string(), unescape(value))
    };
    (item, &s[end + 1..])
}

fn parse_list(mut s: &str) -> (Vec<Filter>, &str) {
    let mut children = Vec::new();
    while !s.starts_with(')') {
        let (child, rest) = parse_one(s);
        children.push(child);
        s = rest;
    }
    (children, &s[1..])
}

fn unescape(value: &str) -> Vec<u8> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 <= bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap();
            out.push(u8::from_str_radix(hex, 16).unwrap());
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}
