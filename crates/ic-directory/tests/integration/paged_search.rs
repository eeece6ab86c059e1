//! Paged search behavior against the in-memory directory.

use ic_directory::{
    DirectoryError, DirectoryResult, DnMapper, FnMapper, IncludeExcludeRules, PagedSearch,
    RawEntry, SearchBases, SearchRequest,
};

use crate::common::{dn, person, FakeDirectory};

const ALL: &str = "(objectClass=*)";

fn numbered(n: usize) -> Vec<RawEntry> {
    (0..n)
        .map(|i| person(&format!("uid=u{i:02},ou=people,dc=example,dc=com"), &format!("u{i:02}")))
        .collect()
}

fn base_rules() -> IncludeExcludeRules {
    IncludeExcludeRules::unrestricted(dn("dc=example,dc=com"))
}

fn collect<M>(search: PagedSearch<crate::common::FakeClient, M>) -> Vec<M::Output>
where
    M: ic_directory::ResultMapper,
{
    search.collect::<DirectoryResult<Vec<_>>>().unwrap()
}

#[test]
fn yields_every_entry_in_server_order() {
    let dir = FakeDirectory::new(numbered(7));
    let request = SearchRequest::new("(uid=*)").rules(base_rules()).page_size(3);

    let mut search = PagedSearch::new(dir.client(), request, DnMapper);
    let dns: Vec<String> = search.by_ref().collect::<DirectoryResult<_>>().unwrap();

    let expected: Vec<String> = numbered(7).into_iter().map(|e| e.dn).collect();
    assert_eq!(dns, expected);
    assert_eq!(search.pages_fetched(), 3);

    let calls = dir.searches();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|c| c.size == 3 && c.critical));
    assert!(calls[0].cookie.is_empty());
    assert!(!calls[1].cookie.is_empty());
    assert_ne!(calls[1].cookie, calls[2].cookie);
}

#[test]
fn exact_multiple_of_page_size_checks_the_last_cookie() {
    let dir = FakeDirectory::new(numbered(6));
    let request = SearchRequest::new("(uid=*)").rules(base_rules()).page_size(3);

    let search = PagedSearch::new(dir.client(), request, DnMapper);
    assert_eq!(collect(search).len(), 6);
    assert_eq!(dir.searches().len(), 2);
}

#[test]
fn scope_rules_filter_entries() {
    let dir = FakeDirectory::new(vec![
        person("uid=alice,ou=eng,dc=example,dc=com", "alice"),
        person("uid=bob,ou=contractors,ou=eng,dc=example,dc=com", "bob"),
        person("uid=carol,ou=sales,dc=example,dc=com", "carol"),
        person("uid=dave,ou=Eng,dc=Example,dc=com", "dave"),
    ]);
    let rules = IncludeExcludeRules::new(
        dn("dc=example,dc=com"),
        vec![dn("ou=eng")],
        vec![dn("ou=contractors,ou=eng")],
    );

    let search = PagedSearch::new(dir.client(), SearchRequest::new("(uid=*)").rules(rules), DnMapper);
    assert_eq!(
        collect(search),
        vec![
            "uid=alice,ou=eng,dc=example,dc=com".to_string(),
            "uid=dave,ou=Eng,dc=Example,dc=com".to_string(),
        ]
    );
}

#[test]
fn excludes_take_precedence_over_includes() {
    let dir = FakeDirectory::new(vec![
        person("uid=alice,ou=eng,dc=example,dc=com", "alice"),
        person("uid=carol,ou=sales,dc=example,dc=com", "carol"),
    ]);
    let rules = IncludeExcludeRules::new(
        dn("dc=example,dc=com"),
        vec![dn("ou=eng,dc=example,dc=com")],
        vec![dn("ou=eng,dc=example,dc=com")],
    );

    let search = PagedSearch::new(dir.client(), SearchRequest::new("(uid=*)").rules(rules), DnMapper);
    let dns = collect(search);
    assert!(!dns.iter().any(|d| d.contains("ou=eng")));
    // Every include is excluded, so the rest of the base stays in scope.
    assert_eq!(dns, vec!["uid=carol,ou=sales,dc=example,dc=com".to_string()]);
}

#[test]
fn fresh_searches_are_repeatable() {
    let dir = FakeDirectory::new(numbered(10));
    let run = || {
        let request = SearchRequest::new("(uid=*)").rules(base_rules()).page_size(4);
        collect(PagedSearch::new(dir.client(), request, DnMapper))
    };

    assert_eq!(run(), run());
    assert_eq!(dir.closes(), 2);
}

#[test]
fn skipped_entries_never_surface() {
    let dir = FakeDirectory::new(numbered(9));
    let mapper = FnMapper::new(|entry: &RawEntry| {
        let index: usize = entry.get_attr("uid").unwrap()[1..].parse().unwrap();
        Ok((index % 3 != 2).then_some(index))
    });
    let request = SearchRequest::new("(uid=*)").rules(base_rules()).page_size(2);

    let values = collect(PagedSearch::new(dir.client(), request, mapper));
    assert_eq!(values, vec![0, 1, 3, 4, 6, 7]);
}

#[test]
fn page_of_only_skipped_entries_continues_to_next_page() {
    let dir = FakeDirectory::new(numbered(6));
    let mapper = FnMapper::new(|entry: &RawEntry| {
        let index: usize = entry.get_attr("uid").unwrap()[1..].parse().unwrap();
        Ok((index >= 4).then_some(index))
    });
    let request = SearchRequest::new("(uid=*)").rules(base_rules()).page_size(2);

    let mut search = PagedSearch::new(dir.client(), request, mapper);
    assert!(search.has_next().unwrap());
    assert_eq!(search.pages_fetched(), 3);
    assert_eq!(search.next_entry().unwrap(), 4);
}

#[test]
fn empty_bases_search_the_default_base() {
    let dir = FakeDirectory::new(numbered(3));

    let implicit = collect(PagedSearch::new(
        dir.client(),
        SearchRequest::new("(uid=*)").rules(base_rules()),
        DnMapper,
    ));
    let explicit = collect(PagedSearch::new(
        dir.client(),
        SearchRequest::new("(uid=*)")
            .rules(base_rules())
            .bases(SearchBases::single(dn("dc=example,dc=com"))),
        DnMapper,
    ));

    assert_eq!(implicit, explicit);
    let calls = dir.searches();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].base, calls[1].base);
    assert_eq!(calls[0].base, dn("dc=example,dc=com"));
}

#[test]
fn global_search_starts_at_the_root() {
    let dir = FakeDirectory::new(numbered(2));
    let request = SearchRequest::new("(uid=*)").bases(SearchBases::global());

    assert_eq!(collect(PagedSearch::new(dir.client(), request, DnMapper)).len(), 2);
    assert!(dir.searches()[0].base.is_root());
}

#[test]
fn has_next_is_idempotent() {
    let dir = FakeDirectory::new(numbered(10));
    let request = SearchRequest::new("(uid=*)").rules(base_rules()).page_size(4);
    let mut search = PagedSearch::new(dir.client(), request, DnMapper);

    for _ in 0..5 {
        assert!(search.has_next().unwrap());
    }
    assert_eq!(dir.searches().len(), 1);
    assert_eq!(search.next_entry().unwrap(), "uid=u00,ou=people,dc=example,dc=com");
    assert_eq!(dir.searches().len(), 1);
}

#[test]
fn failure_on_second_page_surfaces_once_and_closes_once() {
    let dir = FakeDirectory::new(numbered(5)).failing_on_search(2);
    let request = SearchRequest::new("(uid=*)").rules(base_rules()).page_size(2);
    let mut search = PagedSearch::new(dir.client(), request, DnMapper);

    assert!(search.next().unwrap().is_ok());
    assert!(search.next().unwrap().is_ok());
    let err = search.next().unwrap().unwrap_err();
    assert!(err.is_connection_error());
    assert_eq!(dir.closes(), 1);

    assert!(search.next().is_none());
    assert!(matches!(search.next_entry(), Err(DirectoryError::NoSuchElement)));
    drop(search);
    assert_eq!(dir.closes(), 1);
}

#[test]
fn bases_are_searched_in_order_with_fresh_cookies() {
    let dir = FakeDirectory::new(vec![
        person("uid=a1,ou=a,dc=example,dc=com", "a1"),
        person("uid=a2,ou=a,dc=example,dc=com", "a2"),
        person("uid=a3,ou=a,dc=example,dc=com", "a3"),
        person("uid=b1,ou=b,dc=example,dc=com", "b1"),
    ]);
    let request = SearchRequest::new("(uid=*)")
        .rules(base_rules())
        .page_size(2)
        .bases(SearchBases::new(vec![
            dn("ou=b,dc=example,dc=com"),
            dn("ou=a,dc=example,dc=com"),
        ]));

    let dns = collect(PagedSearch::new(dir.client(), request, DnMapper));
    assert_eq!(
        dns,
        vec![
            "uid=b1,ou=b,dc=example,dc=com",
            "uid=a1,ou=a,dc=example,dc=com",
            "uid=a2,ou=a,dc=example,dc=com",
            "uid=a3,ou=a,dc=example,dc=com",
        ]
    );

    let calls = dir.searches();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1].base, dn("ou=a,dc=example,dc=com"));
    assert!(calls[1].cookie.is_empty());
    assert!(!calls[2].cookie.is_empty());
}

#[test]
fn referral_ends_the_base_unless_followed() {
    let entries = vec![
        person("uid=r1,ou=remote,dc=example,dc=com", "r1"),
        person("uid=r2,ou=remote,dc=example,dc=com", "r2"),
        person("uid=r3,ou=remote,dc=example,dc=com", "r3"),
        person("uid=l1,ou=local,dc=example,dc=com", "l1"),
    ];
    let bases = || {
        SearchBases::new(vec![
            dn("ou=remote,dc=example,dc=com"),
            dn("ou=local,dc=example,dc=com"),
        ])
    };

    let tolerant = FakeDirectory::new(entries.clone()).with_referral("ou=remote,dc=example,dc=com");
    let request = SearchRequest::new("(uid=*)").rules(base_rules()).page_size(2).bases(bases());
    let dns = collect(PagedSearch::new(tolerant.client(), request, DnMapper));
    assert_eq!(
        dns,
        vec![
            "uid=r1,ou=remote,dc=example,dc=com",
            "uid=r2,ou=remote,dc=example,dc=com",
            "uid=l1,ou=local,dc=example,dc=com",
        ]
    );

    let strict = FakeDirectory::new(entries).with_referral("ou=remote,dc=example,dc=com");
    let request = SearchRequest::new("(uid=*)")
        .rules(base_rules())
        .page_size(2)
        .bases(bases())
        .follow_referrals(true);
    let mut search = PagedSearch::new(strict.client(), request, DnMapper);
    assert!(matches!(search.next(), Some(Err(DirectoryError::Referral { .. }))));
    assert!(search.next().is_none());
    assert_eq!(strict.closes(), 1);
}

#[test]
fn mapper_error_ends_the_search() {
    let dir = FakeDirectory::new(numbered(4));
    let mapper = FnMapper::new(|entry: &RawEntry| {
        if entry.dn.starts_with("uid=u01") {
            Err(DirectoryError::mapping("bad entry"))
        } else {
            Ok(Some(entry.dn.clone()))
        }
    });
    let request = SearchRequest::new("(uid=*)").rules(base_rules());
    let results: Vec<_> = PagedSearch::new(dir.client(), request, mapper).collect();

    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(DirectoryError::Mapper(_))));
    assert_eq!(dir.closes(), 1);
}

#[test]
fn unfiltered_mapper_ignores_scope_rules() {
    let dir = FakeDirectory::new(vec![
        person("uid=alice,ou=eng,dc=example,dc=com", "alice"),
        person("uid=carol,ou=sales,dc=example,dc=com", "carol"),
    ]);
    let rules = IncludeExcludeRules::new(dn("dc=example,dc=com"), vec![dn("ou=eng")], Vec::new());
    let mapper = FnMapper::unfiltered(|entry: &RawEntry| Ok(Some(entry.dn.clone())));

    let search = PagedSearch::new(dir.client(), SearchRequest::new(ALL).rules(rules), mapper);
    assert_eq!(collect(search).len(), 2);
}
