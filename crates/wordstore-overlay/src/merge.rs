use wordstore_store::Entries;

use crate::pending::Pending;

/// The effective contents of `pending` layered over `backing`.
///
/// Pending values come first in insertion order, then backing entries whose
/// key has no pending state, in the backing layer's native order. Deleted
/// keys and overridden backing entries are never yielded. Backing errors
/// pass through unchanged.
pub fn merged<'a>(pending: &'a Pending, backing: Entries<'a>) -> Entries<'a> {
    let overlay = pending
        .live()
        .map(|(key, value)| Ok((key.to_vec(), value.to_vec())));
    let rest = backing.filter(move |entry| match entry {
        Ok((key, _)) => !pending.contains_key(key),
        Err(_) => true,
    });
    Box::new(overlay.chain(rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wordstore_store::{InMemoryStore, ReadableStore};

    fn collect(entries: Entries<'_>) -> Vec<(Vec<u8>, Vec<u8>)> {
        entries.map(Result::unwrap).collect()
    }

    #[test]
    fn overlay_then_backing() {
        let backing: InMemoryStore = [("a", "1"), ("b", "2"), ("d", "5")].into_iter().collect();
        let mut pending = Pending::new();
        pending.set(b"b", b"3");
        pending.set(b"c", b"4");
        pending.delete(b"a");

        let got = collect(merged(&pending, backing.iter().unwrap()));
        assert_eq!(
            got,
            vec![
                (b"b".to_vec(), b"3".to_vec()),
                (b"c".to_vec(), b"4".to_vec()),
                (b"d".to_vec(), b"5".to_vec()),
            ]
        );
    }

    #[test]
    fn empty_pending_is_backing() {
        let backing: InMemoryStore = [("x", "1")].into_iter().collect();
        let got = collect(merged(&Pending::new(), backing.iter().unwrap()));
        assert_eq!(got, vec![(b"x".to_vec(), b"1".to_vec())]);
    }

    #[test]
    fn deleting_unknown_key_yields_nothing() {
        let backing = InMemoryStore::new();
        let mut pending = Pending::new();
        pending.delete(b"ghost");
        assert!(collect(merged(&pending, backing.iter().unwrap())).is_empty());
    }
}
