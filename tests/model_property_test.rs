//! Property-based tests for the pure parts of the data model, using
//! `proptest` the way the teacher's own `dev-dependencies` table pulls it in
//! for exactly this kind of fuzzed-input invariant check.

use crawlmesh::model::{timestamp, Link};
use proptest::prelude::*;

proptest! {
    /// Any well-formed canonical timestamp round-trips through
    /// parse/format unchanged (§6.5).
    #[test]
    fn canonical_timestamp_round_trips(
        year in 2000i32..2100,
        month in 1u32..=12,
        day in 1u32..=28,
        hour in 0u32..24,
        minute in 0u32..60,
        second in 0u32..60,
    ) {
        let s = format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}");
        let parsed = timestamp::parse(&s).expect("well-formed timestamp must parse");
        prop_assert_eq!(timestamp::format(&parsed), s);
    }

    /// A link whose scheme+host matches its parent's is never external,
    /// regardless of path.
    #[test]
    fn same_host_link_is_never_external(
        scheme in prop_oneof!["http", "https"],
        host in "[a-z]{3,10}\\.(com|org|net)",
        path in "/[a-z0-9/]{0,20}",
    ) {
        let parent = format!("{scheme}://{host}/");
        let url = format!("{scheme}://{host}{path}");
        let link = Link::new(&url, Some(&parent));
        prop_assert!(!link.is_external);
        prop_assert!(!link.is_subdomain);
    }

    /// A relative link always inherits its parent's scheme and is never
    /// marked `is_full`.
    #[test]
    fn relative_link_is_never_full(
        scheme in prop_oneof!["http", "https"],
        host in "[a-z]{3,10}\\.(com|org|net)",
        rel_path in "[a-z0-9]{1,20}",
    ) {
        let parent = format!("{scheme}://{host}/");
        let link = Link::new(&rel_path, Some(&parent));
        prop_assert!(!link.is_full);
        prop_assert_eq!(link.is_secure, scheme == "https");
    }

    /// `Link::new` always lower-cases its output URL, for any mixed-case
    /// absolute input.
    #[test]
    fn absolute_link_url_is_always_lowercased(
        host in "[a-zA-Z]{3,10}\\.(COM|com|Org)",
    ) {
        let url = format!("HTTP://{host}/Some/Path");
        let link = Link::new(&url, None);
        prop_assert_eq!(link.url.clone(), link.url.to_lowercase());
    }
}
