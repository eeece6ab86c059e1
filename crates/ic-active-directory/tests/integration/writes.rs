//! Writes and account operations against the in-memory directory.

use ic_active_directory::unicode_password;
use ic_connector::{Connector, ConnectorCapability, ConnectorError, ConnectorWriter};
use ic_directory::config::keys as directory_keys;
use ic_directory::{DirectoryError, Modification};
use ic_model::{AccountStatusType, Identity, PasswordStatusType, Role};

use crate::common::{days_ago, guid_bytes, replace, user, FakeAd, Write};
use crate::connector::{connector, directory, settings, ALICE, STAFF_ADMINS};

const STAFF: &str = "OU=Staff,DC=example,DC=com";

fn new_identity(name: &str, full_name: &str) -> Identity {
    let mut identity = Identity::new("", name);
    identity.full_name = Some(full_name.to_string());
    identity.set_attribute("ou", vec![STAFF.to_string()]);
    identity
}

fn text(values: &[&str]) -> Vec<Vec<u8>> {
    values.iter().map(|v| v.as_bytes().to_vec()).collect()
}

fn modifications(writes: &[Write]) -> Vec<(String, Vec<Modification>)> {
    writes
        .iter()
        .filter_map(|w| match w {
            Write::Modify(dn, changes) => Some((dn.clone(), changes.clone())),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Identities
// ============================================================================

#[test]
fn created_identities_are_enabled_once_the_password_is_set() {
    let dir = directory(Vec::new());
    let connector = connector(&settings(), &dir);
    let mut dave = new_identity("dave", "Dave Smith");
    dave.add_role(Role::new("", "Staff Admins"));
    dave.add_role(Role::new("", "Domain Users"));

    let created = ConnectorWriter::create_identity(&connector, &dave, Some("Pa55word!"), false).unwrap();

    const DAVE: &str = "CN=Dave Smith,OU=Staff,DC=example,DC=com";
    let writes = dir.writes();
    let Write::Add(added, attributes) = &writes[0] else {
        panic!("expected an add, got {:?}", writes[0]);
    };
    assert_eq!(added, DAVE);
    let value = |name: &str| {
        attributes
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, values)| values.clone())
            .unwrap_or_else(|| panic!("no {name}"))
    };
    assert_eq!(value("sAMAccountName"), text(&["dave"]));
    assert_eq!(value("userPrincipalName"), text(&["dave@example.com"]));
    assert_eq!(value("userAccountControl"), text(&["514"]));
    assert_eq!(value("objectClass"), text(&["top", "person", "organizationalPerson", "user"]));
    assert_eq!(value("cn"), text(&["Dave Smith"]));
    assert_eq!(value("displayName"), text(&["Dave Smith"]));
    assert!(attributes.iter().all(|(attr, _)| attr != "ou"));

    assert_eq!(
        modifications(&writes),
        vec![
            (
                STAFF_ADMINS.to_string(),
                vec![Modification::add("member", [DAVE])]
            ),
            (
                DAVE.to_string(),
                vec![Modification::replace("unicodePwd", [unicode_password("Pa55word!")])]
            ),
            (
                DAVE.to_string(),
                vec![
                    Modification::clear("pwdLastSet"),
                    Modification::add("pwdLastSet", ["-1"]),
                ]
            ),
            (
                DAVE.to_string(),
                vec![Modification::replace("userAccountControl", ["512"])]
            ),
        ]
    );

    assert_eq!(created.principal_name, "dave");
    assert_eq!(created.account_status.status, AccountStatusType::Unlocked);
    assert_eq!(created.password_status.status, PasswordStatusType::UpToDate);
    assert!(created.member_of("Staff Admins"));
}

#[test]
fn created_identities_without_a_password_stay_disabled() {
    let dir = directory(Vec::new());
    let connector = connector(&settings(), &dir);

    let created = connector.create_identity(&new_identity("erin", "Erin"), None, false).unwrap();

    assert_eq!(created.account_status.status, AccountStatusType::Disabled);
    assert_eq!(created.password_status.status, PasswordStatusType::ChangeRequired);
    assert_eq!(dir.writes().len(), 1);
}

#[test]
fn identities_outside_the_scope_are_not_created() {
    let dir = directory(Vec::new());
    let connector = connector(&settings(), &dir);

    let mut admin = Identity::new("", "admin2");
    admin.set_attribute("ou", vec!["CN=Users,DC=example,DC=com".to_string()]);
    let err = connector.create_identity(&admin, None, false).unwrap_err();

    assert!(matches!(err, DirectoryError::InvalidDn { .. }), "{err:?}");
    assert!(dir.writes().is_empty());
}

#[test]
fn updates_rename_and_revoke() {
    let dir = directory(Vec::new());
    let connector = connector(&settings(), &dir);
    let alice = connector.identity_by_name("alice").unwrap();

    let mut desired = alice.clone().into_inner();
    desired.full_name = Some("Alice Liddell".to_string());
    desired.set_attribute("title", vec!["Engineer".to_string()]);
    desired.roles.retain(|r| r.principal_name == "Domain Users");

    connector.update_identity(&alice, &desired).unwrap();

    assert_eq!(
        dir.writes(),
        vec![
            Write::Modify(
                ALICE.to_string(),
                vec![
                    Modification::add("title", ["Engineer"]),
                    Modification::replace("displayName", ["Alice Liddell"]),
                ]
            ),
            Write::Modify(
                STAFF_ADMINS.to_string(),
                vec![Modification::delete("member", [ALICE])]
            ),
            Write::Rename(
                ALICE.to_string(),
                "CN=Alice Liddell,OU=Staff,DC=example,DC=com".to_string()
            ),
        ]
    );
    assert!(dir.entry("CN=Alice Liddell,OU=Staff,DC=example,DC=com").is_some());
}

#[test]
fn deleted_identities_are_gone() {
    let dir = directory(Vec::new());
    let connector = connector(&settings(), &dir);
    let carol = connector.identity_by_name("carol").unwrap();

    connector.delete_identity(&carol).unwrap();

    assert_eq!(
        dir.writes(),
        vec![Write::Delete("CN=Carol,OU=Staff,DC=example,DC=com".to_string())]
    );
    assert!(connector.identity_by_name("carol").unwrap_err().is_not_found());
}

// ============================================================================
// Roles
// ============================================================================

#[test]
fn roles_are_created_in_the_users_container() {
    let dir = directory(Vec::new());
    let connector = connector(&settings(), &dir);

    let sales = ConnectorWriter::create_role(&connector, &Role::new("", "Sales")).unwrap();

    assert_eq!(sales.dn().to_string(), "CN=Sales,CN=Users,DC=example,DC=com");
    let writes = dir.writes();
    let Write::Add(_, attributes) = &writes[0] else {
        panic!("expected an add, got {:?}", writes[0]);
    };
    assert_eq!(
        attributes,
        &vec![
            ("objectClass".to_string(), text(&["top", "group"])),
            ("cn".to_string(), text(&["Sales"])),
            ("sAMAccountName".to_string(), text(&["Sales"])),
        ]
    );
}

// ============================================================================
// Passwords
// ============================================================================

#[test]
fn forced_password_change() {
    let dir = directory(Vec::new());
    let connector = connector(&settings(), &dir);
    let alice = connector.identity_by_name("alice").unwrap();

    ConnectorWriter::set_password(&connector, &alice, "x", true).unwrap();

    assert_eq!(unicode_password("x"), vec![0x22, 0, b'x', 0, 0x22, 0]);
    assert_eq!(
        modifications(&dir.writes()),
        vec![
            (ALICE.to_string(), vec![Modification::replace("unicodePwd", [unicode_password("x")])]),
            (ALICE.to_string(), vec![Modification::replace("pwdLastSet", ["0"])]),
        ]
    );
    let alice = connector.identity_by_name("alice").unwrap();
    assert_eq!(alice.password_status.status, PasswordStatusType::ChangeRequired);
}

#[test]
fn change_cannot_be_forced_on_passwords_that_never_expire() {
    let dir = directory(Vec::new());
    let connector = connector(&settings(), &dir);
    let svc = connector.identity_by_name("svc-icx").unwrap();

    let err = ConnectorWriter::set_password(&connector, &svc, "x", true).unwrap_err();

    assert!(matches!(err, ConnectorError::InvalidState(_)), "{err:?}");
    assert!(dir.writes().is_empty());
}

#[test]
fn password_change_replaces_the_old_password() {
    let gus = user("CN=Gus,OU=Staff,DC=example,DC=com", "gus", 512, guid_bytes(30))
        .with_binary_attr("unicodePwd", unicode_password("old"));
    let dir = directory(vec![gus]);
    let connector = connector(&settings(), &dir);
    let gus = connector.identity_by_name("gus").unwrap();

    connector.change_password(&gus, "old", "n3w").unwrap();
    assert_eq!(
        modifications(&dir.writes())[0].1,
        vec![
            Modification::delete("unicodePwd", [unicode_password("old")]),
            Modification::add("unicodePwd", [unicode_password("n3w")]),
        ]
    );

    let err = connector.change_password(&gus, "old", "again").unwrap_err();
    assert!(matches!(err, ConnectorError::Protocol(ref m) if m.contains("result code 16")), "{err:?}");
}

// ============================================================================
// Account State
// ============================================================================

#[test]
fn locking_follows_the_account_state() {
    let dir = directory(Vec::new());
    let connector = connector(&settings(), &dir);

    let alice = connector.identity_by_name("alice").unwrap();
    connector.lock_identity(&alice).unwrap();
    let alice = connector.identity_by_name("alice").unwrap();
    assert_eq!(alice.account_status.status, AccountStatusType::Locked);
    assert!(matches!(
        connector.lock_identity(&alice),
        Err(ConnectorError::InvalidState(_))
    ));

    connector.unlock_identity(&alice).unwrap();
    let alice = connector.identity_by_name("alice").unwrap();
    assert_eq!(alice.account_status.status, AccountStatusType::Unlocked);
    assert!(matches!(
        connector.unlock_identity(&alice),
        Err(ConnectorError::InvalidState(_))
    ));

    let writes = modifications(&dir.writes());
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].1[0].attribute(), "lockoutTime");
    assert_eq!(writes[1].1, vec![Modification::replace("lockoutTime", ["0"])]);
}

#[test]
fn expired_accounts_are_neither_locked_nor_unlocked() {
    let fay = replace(
        user("CN=Fay,OU=Staff,DC=example,DC=com", "fay", 512, guid_bytes(8)),
        "accountExpires",
        &days_ago(2),
    );
    let dir = FakeAd::new(vec![fay]);
    let connector = connector(&settings(), &dir);
    let fay = connector.identity_by_name("fay").unwrap();

    assert!(matches!(connector.lock_identity(&fay), Err(ConnectorError::InvalidState(_))));
    assert!(matches!(connector.unlock_identity(&fay), Err(ConnectorError::InvalidState(_))));
    assert!(dir.writes().is_empty());
}

#[test]
fn enabling_toggles_the_account_control_flag() {
    let dir = directory(Vec::new());
    let connector = connector(&settings(), &dir);

    let bob = connector.identity_by_name("bob").unwrap();
    assert!(matches!(connector.disable_identity(&bob), Err(ConnectorError::InvalidState(_))));
    connector.enable_identity(&bob).unwrap();

    let alice = connector.identity_by_name("alice").unwrap();
    assert!(matches!(connector.enable_identity(&alice), Err(ConnectorError::InvalidState(_))));
    connector.disable_identity(&alice).unwrap();

    assert_eq!(
        modifications(&dir.writes()),
        vec![
            (
                "CN=Bob,OU=Staff,DC=example,DC=com".to_string(),
                vec![Modification::replace("userAccountControl", ["512"])]
            ),
            (ALICE.to_string(), vec![Modification::replace("userAccountControl", ["514"])]),
        ]
    );
    let bob = connector.identity_by_name("bob").unwrap();
    assert_eq!(bob.account_status.status, AccountStatusType::Unlocked);
}

// ============================================================================
// Read-only connections
// ============================================================================

#[test]
fn plain_connections_are_read_only() {
    let dir = directory(Vec::new());
    let settings = settings().with(directory_keys::PROTOCOL, "plain");
    let connector = connector(&settings, &dir);

    assert!(connector.is_read_only());
    assert!(!connector.capabilities().contains(&ConnectorCapability::CreateIdentity));

    let alice = connector.identity_by_name("alice").unwrap();
    let err = connector.lock_identity(&alice).unwrap_err();
    assert!(matches!(err, ConnectorError::ReadOnly(_)), "{err:?}");
    let err = ConnectorWriter::create_identity(&connector, &new_identity("dave", "Dave"), None, false)
        .unwrap_err();
    assert!(matches!(err, ConnectorError::ReadOnly(_)), "{err:?}");
    assert!(dir.writes().is_empty());
}
