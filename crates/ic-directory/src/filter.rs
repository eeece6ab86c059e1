//! LDAP search filter construction.
//!
//! Filters are built as strings and forwarded to the server unparsed.

/// Escapes a value for use in a filter (RFC 4515).
///
/// A value consisting of a single `*` is kept as the presence wildcard.
pub fn escape_filter_value(value: &str) -> String {
    if value == "*" {
        return value.to_string();
    }
    ldap3::ldap_escape(value).into_owned()
}

/// Builds `(<attr>=<value>)`, escaping `value`.
pub fn equals(attr: &str, value: &str) -> String {
    format!("({attr}={})", escape_filter_value(value))
}

/// Negates a filter.
pub fn not(filter: &str) -> String {
    format!("(!{filter})")
}

/// Builds `(&(objectClass=<class>)(<attr>=<value>))`, escaping `value`.
pub fn object_class_filter(object_class: &str, attr: &str, value: &str) -> String {
    object_class_filter_encoded(object_class, attr, &escape_filter_value(value))
}

/// Like [`object_class_filter`] for a value that is already encoded, such
/// as an escaped binary GUID.
pub fn object_class_filter_encoded(object_class: &str, attr: &str, encoded: &str) -> String {
    format!("(&(objectClass={object_class})({attr}={encoded}))")
}

/// Builds `(objectClass=<class>)`.
pub fn object_class(object_class: &str) -> String {
    format!("(objectClass={object_class})")
}

/// Combines filters with `&`. A single filter is returned unchanged and
/// nested `&` filters are merged into the outer one.
pub fn and<I, S>(filters: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parts: Vec<String> = filters
        .into_iter()
        .map(|f| f.as_ref().to_string())
        .filter(|f| !f.is_empty())
        .collect();
    match parts.as_slice() {
        [] => String::new(),
        [single] => single.clone(),
        _ => format!("(&{})", parts.iter().map(|p| conjuncts(p)).collect::<String>()),
    }
}

/// The operands of an `&` filter, or the filter itself.
fn conjuncts(filter: &str) -> &str {
    filter
        .strip_prefix("(&")
        .and_then(|inner| inner.strip_suffix(')'))
        .unwrap_or(filter)
}

/// Combines filters with `|`. A single filter is returned unchanged.
pub fn or<I, S>(filters: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parts: Vec<String> = filters
        .into_iter()
        .map(|f| f.as_ref().to_string())
        .filter(|f| !f.is_empty())
        .collect();
    match parts.as_slice() {
        [] => String::new(),
        [single] => single.clone(),
        _ => format!("(|{})", parts.concat()),
    }
}
