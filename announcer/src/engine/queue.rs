use std::collections::HashSet;

use super::announcement::{Announcement, AnnouncementId, ItemType};

/// Build the presentation queue for one channel: announcements of `item_type`
/// that are not in `dismissed`, highest priority first.
///
/// The sort is stable, so equal priorities keep the order the backend returned.
pub fn compute_queue(
    announcements: &[Announcement],
    item_type: ItemType,
    dismissed: &HashSet<AnnouncementId>,
) -> Vec<Announcement> {
    let mut queue: Vec<Announcement> = announcements
        .iter()
        .filter(|a| a.item_type == item_type && !dismissed.contains(&a.id))
        .cloned()
        .collect();
    queue.sort_by_key(|a| std::cmp::Reverse(a.effective_priority()));
    queue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::announcement::sample;

    fn ids(queue: &[Announcement]) -> Vec<AnnouncementId> {
        queue.iter().map(|a| a.id).collect()
    }

    #[test]
    fn test_filters_by_type() {
        let list = vec![
            sample(1, ItemType::Modal, None),
            sample(2, ItemType::Popup, None),
            sample(3, ItemType::Modal, None),
        ];
        let queue = compute_queue(&list, ItemType::Modal, &HashSet::new());
        assert_eq!(ids(&queue), vec![1, 3]);
    }

    #[test]
    fn test_excludes_dismissed() {
        let list = vec![
            sample(1, ItemType::Modal, Some(10)),
            sample(2, ItemType::Modal, Some(5)),
        ];
        let dismissed: HashSet<_> = [1].into_iter().collect();
        let queue = compute_queue(&list, ItemType::Modal, &dismissed);
        assert_eq!(ids(&queue), vec![2]);
    }

    #[test]
    fn test_sorted_by_priority_descending() {
        let list = vec![
            sample(1, ItemType::Notification, Some(10)),
            sample(2, ItemType::Notification, Some(90)),
            sample(3, ItemType::Notification, Some(50)),
        ];
        let queue = compute_queue(&list, ItemType::Notification, &HashSet::new());
        assert_eq!(ids(&queue), vec![2, 3, 1]);
        for pair in queue.windows(2) {
            assert!(pair[0].effective_priority() >= pair[1].effective_priority());
        }
    }

    #[test]
    fn test_missing_priority_sorts_as_zero() {
        let list = vec![
            sample(1, ItemType::Popup, Some(-1)),
            sample(2, ItemType::Popup, None),
            sample(3, ItemType::Popup, Some(1)),
            sample(4, ItemType::Popup, Some(0)),
        ];
        let queue = compute_queue(&list, ItemType::Popup, &HashSet::new());
        // 2 and 4 both rank as 0 and keep fetch order.
        assert_eq!(ids(&queue), vec![3, 2, 4, 1]);
    }

    #[test]
    fn test_ties_keep_fetch_order() {
        let list: Vec<_> = (1..=6).map(|id| sample(id, ItemType::Modal, Some(5))).collect();
        let queue = compute_queue(&list, ItemType::Modal, &HashSet::new());
        assert_eq!(ids(&queue), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_all_dismissed_is_empty() {
        let list = vec![sample(9, ItemType::Modal, None)];
        let dismissed: HashSet<_> = [9].into_iter().collect();
        assert!(compute_queue(&list, ItemType::Modal, &dismissed).is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert!(compute_queue(&[], ItemType::Banner, &HashSet::new()).is_empty());
    }
}
