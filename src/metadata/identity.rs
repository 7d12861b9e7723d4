//! Person resolution and the tag set that always names the person.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::PersonAddresses;
use crate::model::address::EmailAddress;

use super::body::normalize;

/// Person used when neither an override nor a directory entry applies.
pub const UNKNOWN_PERSON: &str = "unknown";

/// Case-insensitive address → person lookup.
#[derive(Debug, Clone, Default)]
pub struct PersonDirectory {
    by_address: HashMap<String, String>,
}

impl PersonDirectory {
    /// Invert the configured person → address(es) table.
    ///
    /// Labels are normalized like body tags, so `Bob` and a tag `bob` name
    /// the same person. If an address is listed under two persons the first
    /// one (in label order) keeps it.
    pub fn from_table(persons: &BTreeMap<String, PersonAddresses>) -> Self {
        let mut by_address = HashMap::new();
        for (label, addresses) in persons {
            let person = normalize(label);
            for address in addresses.iter() {
                let key = address.trim().to_lowercase();
                if let Some(existing) = by_address.get(&key) {
                    warn!(
                        address = %key,
                        kept = %existing,
                        ignored = %person,
                        "Address listed for two persons"
                    );
                    continue;
                }
                by_address.insert(key, person.clone());
            }
        }
        Self { by_address }
    }

    /// Person registered for `address`, ignoring case.
    pub fn lookup(&self, address: &str) -> Option<&str> {
        self.by_address
            .get(&address.trim().to_lowercase())
            .map(String::as_str)
    }

    /// Number of known addresses.
    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    /// `true` if no address is known.
    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}

/// Resolve the person a mail is archived for.
///
/// A non-empty override wins; a blank override line counts as no override.
/// Otherwise the sender is looked up, and `"unknown"` is the last resort.
pub fn resolve(
    sender: &EmailAddress,
    person_override: Option<&str>,
    directory: &PersonDirectory,
) -> String {
    if let Some(person) = person_override.filter(|p| !p.is_empty()) {
        return person.to_string();
    }
    directory
        .lookup(&sender.lookup_key())
        .unwrap_or(UNKNOWN_PERSON)
        .to_string()
}

/// Where the person goes when it is not already one of the tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonTagPosition {
    Start,
    #[default]
    End,
}

/// Tags of one archived file. The person is always a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSet {
    tags: Vec<String>,
}

impl TagSet {
    /// Build the tag set, inserting `person` once if it is missing.
    ///
    /// Body order is kept and no other de-duplication happens.
    pub fn with_person(mut tags: Vec<String>, person: &str, position: PersonTagPosition) -> Self {
        if !tags.iter().any(|t| t == person) {
            match position {
                PersonTagPosition::Start => tags.insert(0, person.to_string()),
                PersonTagPosition::End => tags.push(person.to_string()),
            }
        }
        Self { tags }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.tags
    }

    pub fn join(&self, separator: &str) -> String {
        self.tags.join(separator)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> PersonDirectory {
        let mut table = BTreeMap::new();
        table.insert(
            "finance-jane".to_string(),
            PersonAddresses::Many(vec![
                "jane@example.com".to_string(),
                "Jane.Doe@Work.example".to_string(),
            ]),
        );
        table.insert(
            "bob".to_string(),
            PersonAddresses::One("bob@example.com".to_string()),
        );
        PersonDirectory::from_table(&table)
    }

    fn sender(address: &str) -> EmailAddress {
        EmailAddress::parse(address)
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let dir = directory();
        assert_eq!(dir.len(), 3);
        assert_eq!(dir.lookup("JANE@example.com"), Some("finance-jane"));
        assert_eq!(dir.lookup("jane.doe@work.example"), Some("finance-jane"));
        assert_eq!(dir.lookup("nobody@example.com"), None);
    }

    #[test]
    fn test_first_person_keeps_shared_address() {
        let mut table = BTreeMap::new();
        table.insert("alice".to_string(), PersonAddresses::One("x@example.com".into()));
        table.insert("zoe".to_string(), PersonAddresses::One("X@example.com".into()));
        let dir = PersonDirectory::from_table(&table);
        assert_eq!(dir.lookup("x@example.com"), Some("alice"));
    }

    #[test]
    fn test_labels_are_normalized_like_tags() {
        let mut table = BTreeMap::new();
        table.insert(" Bob  Smith".to_string(), PersonAddresses::One("bob@example.com".into()));
        let dir = PersonDirectory::from_table(&table);
        assert_eq!(dir.lookup("bob@example.com"), Some("bob--smith"));

        let mut table = BTreeMap::new();
        table.insert("Bob".to_string(), PersonAddresses::One("bob@example.com".into()));
        let dir = PersonDirectory::from_table(&table);
        let person = resolve(&sender("bob@example.com"), None, &dir);
        let tags = vec!["bob".to_string(), "finance".to_string()];
        let set = TagSet::with_person(tags, &person, PersonTagPosition::End);
        assert_eq!(set.as_slice(), ["bob", "finance"]);
    }

    #[test]
    fn test_override_wins() {
        let person = resolve(&sender("jane@example.com"), Some("bob"), &directory());
        assert_eq!(person, "bob");
    }

    #[test]
    fn test_lookup_when_no_override() {
        let person = resolve(&sender("Jane <JANE@EXAMPLE.COM>"), None, &directory());
        assert_eq!(person, "finance-jane");
    }

    #[test]
    fn test_empty_override_falls_through_to_lookup() {
        // A blank third line is "present" but carries no person.
        let person = resolve(&sender("jane@example.com"), Some(""), &directory());
        assert_eq!(person, "finance-jane");
    }

    #[test]
    fn test_unknown_fallback() {
        for over in [None, Some("")] {
            let person = resolve(&sender("stranger@example.org"), over, &directory());
            assert_eq!(person, UNKNOWN_PERSON);
        }
        let person = resolve(&EmailAddress::default(), None, &PersonDirectory::default());
        assert_eq!(person, UNKNOWN_PERSON);
    }

    #[test]
    fn test_tag_set_appends_missing_person() {
        let tags = vec!["finance".to_string(), "utilities".to_string()];
        let set = TagSet::with_person(tags, "finance-jane", PersonTagPosition::End);
        assert_eq!(set.as_slice(), ["finance", "utilities", "finance-jane"]);
        assert_eq!(set.join(" "), "finance utilities finance-jane");
    }

    #[test]
    fn test_tag_set_prepends_when_configured() {
        let tags = vec!["finance".to_string()];
        let set = TagSet::with_person(tags, "bob", PersonTagPosition::Start);
        assert_eq!(set.into_vec(), vec!["bob", "finance"]);
    }

    #[test]
    fn test_tag_set_keeps_existing_person_in_place() {
        let tags = vec!["a".to_string(), "bob".to_string(), "a".to_string()];
        let set = TagSet::with_person(tags.clone(), "bob", PersonTagPosition::Start);
        assert_eq!(set.as_slice(), tags.as_slice());
    }

    #[test]
    fn test_tag_set_always_contains_person() {
        let cases: [(&[&str], &str); 4] = [
            (&[], "unknown"),
            (&["x"], "x"),
            (&["x", "y"], "z"),
            (&["", "z"], ""),
        ];
        for (tags, person) in cases {
            for position in [PersonTagPosition::Start, PersonTagPosition::End] {
                let tags = tags.iter().map(|t| t.to_string()).collect();
                assert!(TagSet::with_person(tags, person, position).contains(person));
            }
        }
    }
}
