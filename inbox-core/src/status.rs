use serde::{Deserialize, Serialize};

/// Lifecycle of an inbox item. Transitions are validated by
/// [`can_transition`], which is the single source of truth for legality;
/// illegal transitions are no-ops for callers, never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Unread,
    Read,
    Resolved,
    Archived,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Unread => "unread",
            ItemStatus::Read => "read",
            ItemStatus::Resolved => "resolved",
            ItemStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<ItemStatus> {
        match s {
            "unread" => Some(ItemStatus::Unread),
            "read" => Some(ItemStatus::Read),
            "resolved" => Some(ItemStatus::Resolved),
            "archived" => Some(ItemStatus::Archived),
            _ => None,
        }
    }

    pub const ALL: [ItemStatus; 4] = [
        ItemStatus::Unread,
        ItemStatus::Read,
        ItemStatus::Resolved,
        ItemStatus::Archived,
    ];
}

/// Transition table: unread -> read -> resolved -> archived, with
/// resolved -> read as reopen. Archived is terminal.
pub fn can_transition(from: ItemStatus, to: ItemStatus) -> bool {
    use ItemStatus::*;
    matches!(
        (from, to),
        (Unread, Read) | (Read, Resolved) | (Resolved, Read) | (Resolved, Archived)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ItemStatus::*;

    #[test]
    fn test_legal_transitions() {
        assert!(can_transition(Unread, Read));
        assert!(can_transition(Read, Resolved));
        assert!(can_transition(Resolved, Read));
        assert!(can_transition(Resolved, Archived));
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let legal = [
            (Unread, Read),
            (Read, Resolved),
            (Resolved, Read),
            (Resolved, Archived),
        ];
        for from in ItemStatus::ALL {
            for to in ItemStatus::ALL {
                let expected = legal.contains(&(from, to));
                assert_eq!(
                    can_transition(from, to),
                    expected,
                    "transition {:?} -> {:?}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_archived_is_terminal() {
        for to in ItemStatus::ALL {
            assert!(!can_transition(Archived, to));
        }
    }

    #[test]
    fn test_archive_requires_resolved() {
        assert!(!can_transition(Unread, Archived));
        assert!(!can_transition(Read, Archived));
    }

    #[test]
    fn test_status_round_trip() {
        for status in ItemStatus::ALL {
            assert_eq!(ItemStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ItemStatus::parse("deleted"), None);
    }
}
