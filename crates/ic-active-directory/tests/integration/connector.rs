//! Active Directory connector against the in-memory directory.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ic_active_directory::config::keys;
use ic_active_directory::{ActiveDirectoryConfig, ActiveDirectoryConnector};
use ic_connector::{Connector, ConnectorCapability, ConnectorConfig, CredentialValidator};
use ic_directory::config::keys as directory_keys;
use ic_directory::{DirectoryError, DirectoryIdentity, RawEntry};
use ic_model::{AccountStatusType, Identity, PasswordStatusType, Principal};

use crate::common::{
    days_ago, dn, group, guid_bytes, ou, replace, sid_bytes, user, BindCall, FakeAd, ALICE_GUID,
};

pub const ALICE: &str = "CN=Alice,OU=Staff,DC=example,DC=com";
pub const STAFF_ADMINS: &str = "CN=Staff Admins,OU=Groups,DC=example,DC=com";

pub fn settings() -> ConnectorConfig {
    ConnectorConfig::new()
        .with(directory_keys::HOSTNAME, "dc1.example.com")
        .with(directory_keys::SERVICE_ACCOUNT_USERNAME, "svc-icx")
        .with(directory_keys::SERVICE_ACCOUNT_PASSWORD, "secret")
}

pub fn connector(settings: &ConnectorConfig, dir: &FakeAd) -> ActiveDirectoryConnector<FakeAd> {
    let config = ActiveDirectoryConfig::from_connector_config(settings).unwrap();
    ActiveDirectoryConnector::with_factory(config, dir.clone())
}

pub fn directory(extra: Vec<RawEntry>) -> FakeAd {
    let mut entries = vec![
        ou("OU=Staff,DC=example,DC=com", "Staff"),
        ou("OU=Groups,DC=example,DC=com", "Groups"),
        user(ALICE, "alice", 512, ALICE_GUID.to_vec())
            .with_attr("userPrincipalName", ["alice@example.com"])
            .with_attr("memberOf", [STAFF_ADMINS])
            .with_attr("lastLogonTimestamp", [days_ago(1)])
            .with_attr("primaryGroupID", ["513"])
            .with_binary_attr("objectSid", sid_bytes(1104)),
        user("CN=Bob,OU=Staff,DC=example,DC=com", "bob", 514, guid_bytes(2)),
        user("CN=Carol,OU=Staff,DC=example,DC=com", "carol", 512, guid_bytes(3)),
        user("CN=svc-icx,OU=Staff,DC=example,DC=com", "svc-icx", 66048, guid_bytes(4)),
        user("CN=Administrator,CN=Users,DC=example,DC=com", "Administrator", 66048, guid_bytes(5)),
        group(STAFF_ADMINS, "Staff Admins", guid_bytes(10)).with_attr("member", [ALICE]),
        group("CN=Domain Users,CN=Users,DC=example,DC=com", "Domain Users", guid_bytes(11))
            .with_binary_attr("objectSid", sid_bytes(513)),
    ];
    entries.extend(extra);
    FakeAd::new(entries)
}

pub fn identities(connector: &ActiveDirectoryConnector<FakeAd>) -> Vec<DirectoryIdentity> {
    connector
        .directory()
        .identities()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

pub fn identity<'a>(identities: &'a [DirectoryIdentity], name: &str) -> &'a DirectoryIdentity {
    identities
        .iter()
        .find(|i| i.principal_name == name)
        .unwrap_or_else(|| panic!("no identity {name}"))
}

// ============================================================================
// Identities
// ============================================================================

#[test]
fn default_users_container_is_out_of_scope() {
    let dir = directory(Vec::new());
    let identities = identities(&connector(&settings(), &dir));
    let names: Vec<&str> = identities.iter().map(Principal::principal_name).collect();
    assert_eq!(names, vec!["alice", "bob", "carol", "svc-icx"]);

    let searches = dir.searches();
    let search = &searches[0];
    assert_eq!(search.base, dn("DC=example,DC=com"));
    assert_eq!(
        search.filter,
        "(&(!(objectClass=computer))(objectClass=user)(sAMAccountName=*))"
    );
}

#[test]
fn computers_are_not_identities() {
    let computer = RawEntry::new("CN=WS01,OU=Staff,DC=example,DC=com")
        .with_attr("objectClass", ["top", "person", "organizationalPerson", "user", "computer"])
        .with_attr("sAMAccountName", ["WS01$"])
        .with_attr("userAccountControl", ["4096"])
        .with_binary_attr("objectGUID", guid_bytes(20));
    let dir = directory(vec![computer]);
    let connector = connector(&settings(), &dir);

    let identities = identities(&connector);
    let names: Vec<&str> = identities.iter().map(Principal::principal_name).collect();
    assert_eq!(names, vec!["alice", "bob", "carol", "svc-icx"]);

    assert!(connector.identity_by_name("WS01$").unwrap_err().is_not_found());
}

#[test]
fn lookup_by_principal_name() {
    let dave = user("CN=Dave,OU=Staff,DC=example,DC=com", "dsmith", 512, guid_bytes(21))
        .with_attr("userPrincipalName", ["dave.smith@example.com"]);
    let dir = directory(vec![dave]);
    let connector = connector(&settings(), &dir);

    assert_eq!(connector.identity_by_name("alice@example.com").unwrap().principal_name, "alice");
    assert_eq!(connector.identity_by_name("dave.smith").unwrap().principal_name, "dsmith");
    assert_eq!(connector.identity_by_name("DSMITH").unwrap().principal_name, "dsmith");

    let qualified = "(&(!(objectClass=computer))(objectClass=user)(|(sAMAccountName=dave.smith)\
                     (userPrincipalName=dave.smith)(userPrincipalName=dave.smith@example.com)))";
    assert!(dir.searches().iter().any(|s| s.filter == qualified));
}

#[test]
fn included_default_users_are_listed() {
    let dir = directory(Vec::new());
    let settings = settings().with(keys::INCLUDE_DEFAULT_USERS, "true");
    let identities = identities(&connector(&settings, &dir));
    assert!(identities.iter().any(|i| i.principal_name == "Administrator"));
}

#[test]
fn binary_identifiers_are_decoded() {
    let dir = directory(Vec::new());
    let identities = identities(&connector(&settings(), &dir));
    let alice = identity(&identities, "alice");

    assert_eq!(alice.guid, "3f2504e0-4f89-11d3-9a0c-0305e82c3301");
    assert_eq!(
        alice.attribute("objectSid"),
        Some("S-1-5-21-1-2-3-1104")
    );
    assert_eq!(
        alice.attribute("ImmutableId"),
        Some(STANDARD.encode(ALICE_GUID).as_str())
    );
    assert_eq!(alice.full_name.as_deref(), Some("User alice"));
    assert!(alice.last_sign_on.is_some());
}

#[test]
fn account_and_password_status_follow_account_control() {
    let dir = directory(Vec::new());
    let identities = identities(&connector(&settings(), &dir));

    let alice = identity(&identities, "alice");
    assert_eq!(alice.account_status.status, AccountStatusType::Unlocked);
    assert_eq!(alice.password_status.status, PasswordStatusType::UpToDate);
    assert!(alice.account_status.expire.is_none());

    let bob = identity(&identities, "bob");
    assert_eq!(bob.account_status.status, AccountStatusType::Disabled);

    let svc = identity(&identities, "svc-icx");
    assert!(svc.password_status.never_expires);
    assert_eq!(svc.password_status.status, PasswordStatusType::Locked);
}

#[test]
fn password_change_and_lockout() {
    let dir = FakeAd::new(vec![
        replace(
            user("CN=Dan,OU=Staff,DC=example,DC=com", "dan", 512, guid_bytes(6)),
            "pwdLastSet",
            "0",
        ),
        user("CN=Eve,OU=Staff,DC=example,DC=com", "eve", 512, guid_bytes(7))
            .with_attr("lockoutTime", [days_ago(0)]),
        replace(
            user("CN=Fay,OU=Staff,DC=example,DC=com", "fay", 512, guid_bytes(8)),
            "accountExpires",
            &days_ago(2),
        ),
    ]);
    let identities = identities(&connector(&settings(), &dir));

    let dan = identity(&identities, "dan");
    assert_eq!(dan.password_status.status, PasswordStatusType::ChangeRequired);
    assert!(dan.password_status.last_change.is_none());

    let eve = identity(&identities, "eve");
    assert_eq!(eve.account_status.status, AccountStatusType::Locked);
    assert!(eve.account_status.locked.is_some());

    let fay = identity(&identities, "fay");
    assert_eq!(fay.account_status.status, AccountStatusType::Expired);
    assert_eq!(fay.password_status.status, PasswordStatusType::UpToDate);
}

#[test]
fn missing_account_control_fails_the_identity() {
    let dir = FakeAd::new(vec![RawEntry::new("CN=Ghost,OU=Staff,DC=example,DC=com")
        .with_attr("objectClass", ["user"])
        .with_attr("sAMAccountName", ["ghost"])
        .with_binary_attr("objectGUID", guid_bytes(9))]);
    let connector = connector(&settings(), &dir);

    let results: Vec<_> = connector.directory().identities().unwrap().collect();
    assert_eq!(results.len(), 1);
    match &results[0] {
        Err(DirectoryError::Mapper(message)) => assert!(message.contains("userAccountControl")),
        other => panic!("expected a mapping error, got {other:?}"),
    }
}

#[test]
fn lookup_by_guid_uses_binary_filter() {
    let dir = directory(Vec::new());
    let connector = connector(&settings(), &dir);

    let alice = connector
        .identity_by_guid("3F2504E0-4F89-11D3-9A0C-0305E82C3301")
        .unwrap();
    assert_eq!(alice.principal_name, "alice");

    let searches = dir.searches();
    let filter = &searches[0].filter;
    assert!(
        filter.starts_with("(&(!(objectClass=computer))(objectClass=user)(objectGUID=\\e0\\04\\25\\3f"),
        "{filter}"
    );

    let err = connector
        .identity_by_guid("00000000-0000-0000-0000-000000000000")
        .unwrap_err();
    assert!(err.is_not_found());
}

// ============================================================================
// Roles
// ============================================================================

#[test]
fn member_of_resolves_groups() {
    let dir = directory(Vec::new());
    let identities = identities(&connector(&settings(), &dir));
    let alice = identity(&identities, "alice");

    let admins = alice
        .roles
        .iter()
        .find(|r| r.principal_name == "Staff Admins")
        .unwrap();
    assert_eq!(admins.guid, uuid_of(10));
    assert!(alice.member_of("Staff Admins"));

    let bob = identity(&identities, "bob");
    assert!(bob.roles.is_empty());
}

#[test]
fn primary_group_is_resolved_from_the_object_sid() {
    let dir = directory(Vec::new());
    let identities = identities(&connector(&settings(), &dir));
    let alice = identity(&identities, "alice");

    let mut names: Vec<&str> = alice.roles.iter().map(|r| r.principal_name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["Domain Users", "Staff Admins"]);
    assert!(alice.member_of("Domain Users"));

    // objectSid of S-1-5-21-1-2-3-513
    assert!(dir.searches().iter().any(|s| s.filter
        == "(&(!(objectClass=computer))(objectClass=group)(objectSid=\\01\\05\\00\\00\\00\\00\\00\\05\\15\\00\\00\\00\\01\\00\\00\\00\\02\\00\\00\\00\\03\\00\\00\\00\\01\\02\\00\\00)"));
}

#[test]
fn roles_ignore_the_identity_scope() {
    let dir = directory(Vec::new());
    let connector = connector(&settings(), &dir);
    let roles: Vec<String> = connector
        .all_roles()
        .unwrap()
        .map(|r| r.unwrap().principal_name.clone())
        .collect();
    assert_eq!(roles, vec!["Staff Admins", "Domain Users"]);
    assert_eq!(connector.role_by_name("Domain Users").unwrap().guid, uuid_of(11));
}

fn uuid_of(n: u8) -> String {
    let hex = format!("{n:02x}").repeat(16);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

// ============================================================================
// Organizational Units
// ============================================================================

#[test]
fn default_containers_precede_organizational_units() {
    let dir = directory(Vec::new());
    let settings = settings()
        .with(keys::INCLUDE_DEFAULT_USERS, "true")
        .with(keys::INCLUDE_BUILTIN_GROUPS, "true");
    let connector = connector(&settings, &dir);

    let units: Vec<(String, String)> = connector
        .organizational_units()
        .unwrap()
        .map(|u| {
            let u = u.unwrap();
            (u.name, u.dn)
        })
        .collect();
    assert_eq!(
        units,
        vec![
            ("Default Users".to_string(), "CN=Users,DC=example,DC=com".to_string()),
            ("Default Groups".to_string(), "CN=Builtin,DC=example,DC=com".to_string()),
            ("Staff".to_string(), "OU=Staff,DC=example,DC=com".to_string()),
            ("Groups".to_string(), "OU=Groups,DC=example,DC=com".to_string()),
        ]
    );
}

#[test]
fn excluded_containers_are_not_listed() {
    let dir = directory(Vec::new());
    let connector = connector(&settings(), &dir);
    let names: Vec<String> = connector
        .organizational_units()
        .unwrap()
        .map(|u| u.unwrap().name)
        .collect();
    assert_eq!(names, vec!["Staff", "Groups"]);
}

// ============================================================================
// Child Domains
// ============================================================================

#[test]
fn child_domain_controllers() {
    let dir = directory(Vec::new());
    let settings = settings().with_all(
        keys::CHILD_DOMAIN_CONTROLLERS,
        ["dc1.emea.example.com", "dc2.apac.example.com:389"],
    );
    let connector = connector(&settings, &dir);

    assert_eq!(connector.domain_controller_for(&dn(ALICE)).unwrap(), None);
    assert_eq!(
        connector.provider_urls_for(&dn(ALICE)).unwrap(),
        vec!["ldaps://dc1.example.com:636"]
    );

    let emea = dn("CN=Hans,OU=Staff,DC=emea,DC=example,DC=com");
    assert_eq!(
        connector.domain_controller_for(&emea).unwrap().as_deref(),
        Some("dc1.emea.example.com")
    );
    assert_eq!(
        connector.provider_urls_for(&dn("CN=Li,DC=apac,DC=example,DC=com")).unwrap(),
        vec!["ldap://dc2.apac.example.com:389"]
    );
    assert_eq!(connector.controllers().len(), 2);

    assert!(connector
        .domain_controller_for(&dn("CN=Ana,DC=amer,DC=example,DC=com"))
        .is_err());
}

// ============================================================================
// Credentials
// ============================================================================

#[test]
fn credentials() {
    let dir = directory(Vec::new())
        .with_password(ALICE, "wonderland")
        .with_password("alice@example.com", "wonderland");
    let connector = connector(&settings(), &dir);

    let alice = connector.identity_by_name("alice").unwrap();
    assert!(connector.check_credentials(&alice, "wonderland").unwrap());
    assert!(!connector.check_credentials(&alice, "looking-glass").unwrap());
    assert!(!connector.check_credentials(&alice, "").unwrap());

    assert!(connector.supports_optimised_check());
    assert!(connector.check_credentials_optimised("alice", "wonderland").unwrap());
    assert!(connector
        .check_credentials_optimised("alice@example.com", "wonderland")
        .unwrap());
    assert_eq!(
        dir.binds()[3..],
        ["alice@example.com".to_string(), "alice@example.com".to_string()]
    );
    assert!(dir.bind_calls().iter().all(|b| b.urls.is_empty()));
}

#[test]
fn child_domain_credentials_bind_at_the_child_controller() {
    const HANS: &str = "CN=Hans,OU=Staff,DC=emea,DC=example,DC=com";
    let dir = directory(Vec::new()).with_password(HANS, "edelweiss");
    let settings = settings().with_all(keys::CHILD_DOMAIN_CONTROLLERS, ["dc1.emea.example.com"]);
    let connector = connector(&settings, &dir);

    let hans = DirectoryIdentity::new(Identity::new("", "hans"), dn(HANS));
    assert!(connector.check_credentials(&hans, "edelweiss").unwrap());
    assert!(!connector.check_credentials(&hans, "wrong").unwrap());

    assert_eq!(
        dir.bind_calls()[0],
        BindCall {
            name: HANS.to_string(),
            urls: vec!["ldaps://dc1.emea.example.com:636".to_string()],
        }
    );

    let stranger = DirectoryIdentity::new(
        Identity::new("", "ana"),
        dn("CN=Ana,DC=amer,DC=example,DC=com"),
    );
    assert!(connector.check_credentials(&stranger, "pw").is_err());
}

#[test]
fn connector_identity() {
    let dir = directory(Vec::new());
    let connector = connector(&settings(), &dir);
    assert_eq!(connector.connector_type(), "active-directory");
    assert!(!connector.is_read_only());
    assert!(connector.capabilities().contains(&ConnectorCapability::AccountLocking));
    assert_eq!(connector.config().domain, "example.com");
    assert_eq!(connector.config().directory.service_account_dn, "svc-icx@example.com");
}
