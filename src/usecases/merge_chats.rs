//! Chat list merge semantics: full replacement after an exhaustive fetch,
//! keyed partial merge after a tiered refresh. Both converge on the same
//! canonical ordering.

use std::collections::HashSet;

use crate::domain::chat::Chat;

/// Replaces the working list with an exhaustive fetch. Duplicates within the
/// fetched set are dropped, first occurrence wins.
pub fn replace_chat_list(fetched: Vec<Chat>) -> Vec<Chat> {
    let mut seen = HashSet::new();
    let mut chats: Vec<Chat> = fetched
        .into_iter()
        .filter(|chat| seen.insert(chat.id.clone()))
        .collect();
    sort_chat_list(&mut chats);
    chats
}

/// Folds a partial fetch into the existing list. Fetched entries win on
/// conflict; chats outside the refreshed window are retained unchanged.
pub fn merge_chat_list(existing: &[Chat], fetched: Vec<Chat>) -> Vec<Chat> {
    let mut chats = existing.to_vec();
    for incoming in fetched {
        match chats.iter_mut().find(|chat| chat.id == incoming.id) {
            Some(slot) => *slot = incoming,
            None => chats.push(incoming),
        }
    }
    sort_chat_list(&mut chats);
    chats
}

/// Canonical inbox order: `last_message_time` descending, ties broken by
/// `updated_at`, then `created_at`.
pub fn sort_chat_list(chats: &mut [Chat]) {
    chats.sort_by(|a, b| {
        let key = |chat: &Chat| {
            (
                chat.last_message_time.unwrap_or(i64::MIN),
                chat.updated_at.unwrap_or(i64::MIN),
                chat.created_at.unwrap_or(i64::MIN),
            )
        };
        key(b).cmp(&key(a))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chat::ContactRef;

    fn chat(id: &str, last_message_time: i64) -> Chat {
        let mut chat = Chat::new(id.to_owned(), ContactRef::default());
        chat.last_message_time = Some(last_message_time);
        chat
    }

    fn ids(chats: &[Chat]) -> Vec<&str> {
        chats.iter().map(|chat| chat.id.as_str()).collect()
    }

    #[test]
    fn replace_deduplicates_with_first_occurrence_winning() {
        let mut first = chat("a", 10);
        first.unread_count = 3;
        let mut duplicate = chat("a", 10);
        duplicate.unread_count = 9;

        let list = replace_chat_list(vec![first, duplicate, chat("b", 20)]);

        assert_eq!(ids(&list), vec!["b", "a"]);
        assert_eq!(list[1].unread_count, 3);
    }

    #[test]
    fn replace_sorts_by_last_message_time_descending() {
        let list = replace_chat_list(vec![chat("old", 5), chat("new", 50), chat("mid", 25)]);

        assert_eq!(ids(&list), vec!["new", "mid", "old"]);
    }

    #[test]
    fn merge_keeps_chats_outside_the_refreshed_window() {
        let existing = vec![chat("a", 10), chat("b", 5)];

        let merged = merge_chat_list(&existing, vec![chat("b", 20), chat("c", 15)]);

        assert_eq!(ids(&merged), vec!["b", "c", "a"]);
    }

    #[test]
    fn merge_lets_fetched_data_win_on_conflict() {
        let mut stale = chat("a", 10);
        stale.unread_count = 1;
        let mut fresh = chat("a", 30);
        fresh.unread_count = 4;

        let merged = merge_chat_list(&[stale], vec![fresh]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].unread_count, 4);
        assert_eq!(merged[0].last_message_time, Some(30));
    }

    #[test]
    fn ties_fall_back_to_updated_at_then_created_at() {
        let mut a = chat("a", 10);
        a.updated_at = Some(100);
        let mut b = chat("b", 10);
        b.updated_at = Some(200);
        let mut c = chat("c", 10);
        c.updated_at = Some(200);
        c.created_at = Some(5);
        let mut d = chat("d", 10);
        d.updated_at = Some(200);
        d.created_at = Some(50);

        let mut list = vec![a, b, c, d];
        sort_chat_list(&mut list);

        assert_eq!(ids(&list), vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn chats_without_any_message_sort_last() {
        let silent = Chat::new("silent".to_owned(), ContactRef::default());

        let list = replace_chat_list(vec![silent, chat("busy", 10)]);

        assert_eq!(ids(&list), vec!["busy", "silent"]);
    }
}
