//! Directory writes against the in-memory directory.

use ic_connector::{Connector, ConnectorCapability, ConnectorWriter};
use ic_directory::{DirectoryError, Modification, SecurityProtocol};
use ic_model::{Identity, Principal, Role};

use crate::common::{dn, group, person, FakeDirectory, Write};
use crate::connector::{builder, connector, directory, groups, ADMINS, ALICE, CAROL, USERS};

const ENG: &str = "ou=eng,dc=example,dc=com";

fn text(values: &[&str]) -> Vec<Vec<u8>> {
    values.iter().map(|v| v.as_bytes().to_vec()).collect()
}

// ============================================================================
// Identities
// ============================================================================

#[test]
fn identities_are_created_with_roles_and_password() {
    let dir = directory(Vec::new());
    let connector = connector(builder().build().unwrap(), &dir);

    let mut dave = Identity::new("", "dave");
    dave.full_name = Some("Dave Jones".to_string());
    dave.email = Some("dave@example.com".to_string());
    dave.set_attribute("ou", vec![ENG.to_string()]);
    dave.set_attribute("telephoneNumber", vec!["555".to_string()]);
    dave.set_attribute("description", vec![" ".to_string()]);
    dave.add_role(Role::new("", "admins"));

    let created = connector.create_identity(&dave, Some("s3cret"), false).unwrap();

    const DAVE: &str = "CN=Dave Jones,ou=eng,dc=example,dc=com";
    assert_eq!(
        dir.writes(),
        vec![
            Write::Add(
                DAVE.to_string(),
                vec![
                    ("telephoneNumber".to_string(), text(&["555"])),
                    ("mail".to_string(), text(&["dave@example.com"])),
                    (
                        "objectClass".to_string(),
                        text(&["top", "person", "organizationalPerson", "inetOrgPerson"])
                    ),
                    ("cn".to_string(), text(&["Dave Jones"])),
                    ("uid".to_string(), text(&["dave"])),
                ]
            ),
            Write::Modify(ADMINS.to_string(), vec![Modification::add("member", [DAVE])]),
            Write::Modify(
                DAVE.to_string(),
                vec![Modification::replace("userPassword", ["s3cret"])]
            ),
        ]
    );

    assert_eq!(created.principal_name, "dave");
    assert!(created.guid.starts_with("uuid-new-"));
    assert_eq!(created.full_name.as_deref(), Some("Dave Jones"));
    assert_eq!(dir.entry(ADMINS).unwrap().get_attrs("member"), [DAVE]);
    assert_eq!(dir.connects(), dir.closes());
}

#[test]
fn existing_memberships_are_not_an_error() {
    let dir = FakeDirectory::new(vec![
        person(ALICE, "alice"),
        group(ADMINS, "admins").with_attr("member", [ALICE]),
    ]);
    let connector = connector(builder().build().unwrap(), &dir);
    let alice = connector.identity_by_name("alice").unwrap();

    let mut desired = alice.clone().into_inner();
    desired.add_role(Role::new("", "admins"));
    connector.update_identity(&alice, &desired).unwrap();

    assert_eq!(
        dir.writes(),
        vec![Write::Modify(ADMINS.to_string(), vec![Modification::add("member", [ALICE])])]
    );
}

#[test]
fn updates_write_changes_then_move_the_entry() {
    let dir = directory(Vec::new());
    let connector = connector(builder().build().unwrap(), &dir);
    let carol = connector.identity_by_name("carol").unwrap();

    let mut desired = carol.clone().into_inner();
    desired.email = Some("carol.king@example.com".to_string());
    desired.full_name = Some("Carol King".to_string());
    desired.set_attribute("title", vec!["Lead".to_string()]);
    desired.set_attribute("ou", vec![ENG.to_string()]);
    desired.add_role(Role::new("", "users"));

    connector.update_identity(&carol, &desired).unwrap();

    const MOVED: &str = "uid=carol,ou=eng,dc=example,dc=com";
    assert_eq!(
        dir.writes(),
        vec![
            Write::Modify(
                CAROL.to_string(),
                vec![
                    Modification::add("title", ["Lead"]),
                    Modification::replace("mail", ["carol.king@example.com"]),
                    Modification::replace("cn", ["Carol King"]),
                ]
            ),
            Write::Modify(USERS.to_string(), vec![Modification::add("member", [CAROL])]),
            Write::Rename(CAROL.to_string(), MOVED.to_string()),
        ]
    );

    let moved = connector.identity_by_name("carol").unwrap();
    assert_eq!(*moved.dn(), dn(MOVED));
    assert_eq!(moved.full_name.as_deref(), Some("Carol King"));
    assert_eq!(moved.attribute("title"), Some("Lead"));
}

#[test]
fn cleared_attributes_are_removed() {
    let dir = directory(vec![person(ALICE, "alice").with_attr("mobile", ["555"])]);
    let connector = connector(builder().build().unwrap(), &dir);
    let alice = connector.identity_by_name("alice").unwrap();

    let mut desired = alice.clone().into_inner();
    desired.set_attribute("mobile", Vec::new());
    desired.email = None;
    connector.update_identity(&alice, &desired).unwrap();

    assert_eq!(
        dir.writes(),
        vec![Write::Modify(
            ALICE.to_string(),
            vec![Modification::clear("mobile"), Modification::clear("mail")]
        )]
    );
    let entry = dir.entry(ALICE).unwrap();
    assert!(!entry.has_attr("mobile"));
    assert!(!entry.has_attr("mail"));
}

#[test]
fn moves_out_of_scope_are_refused() {
    let dir = directory(vec![person(ALICE, "alice")]);
    let connector = connector(builder().include(dn("ou=eng")).build().unwrap(), &dir);
    let alice = connector.identity_by_name("alice").unwrap();

    let mut desired = alice.clone().into_inner();
    desired.set_attribute("ou", vec!["ou=sales,dc=example,dc=com".to_string()]);
    let err = connector.update_identity(&alice, &desired).unwrap_err();

    assert!(matches!(err, DirectoryError::InvalidDn { .. }), "{err:?}");
    assert!(dir.writes().is_empty());
}

#[test]
fn deleted_identities_are_gone() {
    let dir = directory(vec![person(ALICE, "alice")]);
    let connector = connector(builder().build().unwrap(), &dir);
    let alice = connector.identity_by_name("alice").unwrap();

    ConnectorWriter::delete_identity(&connector, &alice).unwrap();

    assert_eq!(dir.writes(), vec![Write::Delete(ALICE.to_string())]);
    assert!(matches!(
        connector.identity_by_name("alice"),
        Err(DirectoryError::NotFound(_))
    ));
}

// ============================================================================
// Roles
// ============================================================================

#[test]
fn roles_are_created_and_renamed() {
    let dir = directory(Vec::new());
    let connector = connector(builder().build().unwrap(), &dir);

    let mut ops = Role::new("", "ops");
    ops.set_attribute("ou", vec!["ou=groups,dc=example,dc=com".to_string()]);
    ops.set_attribute("description", vec!["Operations".to_string()]);
    let created = connector.create_role(&ops).unwrap();

    assert_eq!(created.dn().to_string(), "CN=ops,ou=groups,dc=example,dc=com");
    assert_eq!(
        dir.writes(),
        vec![Write::Add(
            "CN=ops,ou=groups,dc=example,dc=com".to_string(),
            vec![
                ("description".to_string(), text(&["Operations"])),
                ("objectClass".to_string(), text(&["top", "groupOfNames"])),
                ("cn".to_string(), text(&["ops"])),
            ]
        )]
    );

    let users = connector.role_by_name("users").unwrap();
    let mut renamed = users.clone().into_inner();
    renamed.principal_name = "members".to_string();
    connector.update_role(&users, &renamed).unwrap();

    assert_eq!(
        dir.writes()[1],
        Write::Rename(USERS.to_string(), "cn=members,ou=groups,dc=example,dc=com".to_string())
    );
    assert_eq!(connector.role_by_name("members").unwrap().guid, "uuid-users");
}

#[test]
fn deleted_roles_are_gone() {
    let dir = directory(Vec::new());
    let connector = connector(builder().build().unwrap(), &dir);
    let guests = connector.role_by_name("guests").unwrap();

    ConnectorWriter::delete_role(&connector, &guests).unwrap();

    assert_eq!(
        dir.writes(),
        vec![Write::Delete("cn=guests,ou=groups,dc=example,dc=com".to_string())]
    );
    let remaining = connector.roles().unwrap().unwrap().count();
    assert_eq!(remaining, groups().len() - 1);
}

// ============================================================================
// Passwords
// ============================================================================

#[test]
fn passwords_are_replaced() {
    let dir = directory(vec![person(ALICE, "alice")]);
    let connector = connector(builder().build().unwrap(), &dir);
    let alice = connector.identity_by_name("alice").unwrap();

    ConnectorWriter::set_password(&connector, &alice, "n3w", true).unwrap();
    ConnectorWriter::change_password(&connector, &alice, "n3w", "n3wer").unwrap();

    assert_eq!(
        dir.writes(),
        vec![
            Write::Modify(ALICE.to_string(), vec![Modification::replace("userPassword", ["n3w"])]),
            Write::Modify(ALICE.to_string(), vec![Modification::replace("userPassword", ["n3wer"])]),
        ]
    );
}

#[test]
fn account_operations_are_not_supported() {
    let dir = directory(vec![person(ALICE, "alice")]);
    let connector = connector(builder().build().unwrap(), &dir);
    let alice = connector.identity_by_name("alice").unwrap();

    assert!(connector.lock_identity(&alice).is_err());
    assert!(connector.disable_identity(&alice).is_err());
    assert!(!connector.supports(ConnectorCapability::AccountLocking));
    assert!(dir.writes().is_empty());
}

// ============================================================================
// Read-only connections
// ============================================================================

#[test]
fn plain_connections_are_read_only() {
    let dir = directory(vec![person(ALICE, "alice")]);
    let connector = connector(
        builder().security(SecurityProtocol::Plain).build().unwrap(),
        &dir,
    );

    assert!(connector.is_read_only());
    assert!(Connector::is_read_only(&connector));
    assert!(!connector.supports(ConnectorCapability::CreateIdentity));

    let err = connector
        .create_identity(&Identity::new("", "dave"), None, false)
        .unwrap_err();
    assert!(matches!(err, DirectoryError::ReadOnly(_)), "{err:?}");
    assert_eq!(dir.connects(), 0);
    assert!(dir.writes().is_empty());
}

#[test]
fn secure_connections_are_writable() {
    let dir = directory(Vec::new());
    let connector = connector(builder().build().unwrap(), &dir);

    assert!(!Connector::is_read_only(&connector));
    for capability in [
        ConnectorCapability::CreateIdentity,
        ConnectorCapability::UpdateRole,
        ConnectorCapability::PasswordChange,
    ] {
        assert!(connector.supports(capability), "{capability:?}");
    }
}
