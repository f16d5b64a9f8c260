//! Identifier generation for tickets and incidents.
//!
//! Ids are `<PREFIX>-<unix millis>-<seq>`. The sequence number comes from a
//! process-wide counter so two ids minted in the same millisecond differ.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

pub const TICKET_PREFIX: &str = "TICKET";
pub const INCIDENT_PREFIX: &str = "INC";

fn next_id(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{:04}", prefix, millis, seq % 10_000)
}

/// Fresh ticket id, e.g. `TICKET-1718000000000-0007`.
pub fn ticket_id() -> String {
    next_id(TICKET_PREFIX)
}

/// Fresh incident id, e.g. `INC-1718000000000-0008`.
pub fn incident_id() -> String {
    next_id(INCIDENT_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_prefixes() {
        assert!(ticket_id().starts_with("TICKET-"));
        assert!(incident_id().starts_with("INC-"));
    }

    #[test]
    fn test_back_to_back_ids_are_distinct() {
        let ids: HashSet<String> = (0..1000).map(|_| ticket_id()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
