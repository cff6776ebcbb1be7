use std::collections::BTreeMap;
use std::time::Duration;

/// A single append-only timeline entry (spec §3 "Timeline Event").
///
/// `detail` is a free-form string-keyed map rather than a typed struct per
/// event kind, since consumers (Snapshot, tests) only ever need to read it
/// back for assertions, never branch on it structurally.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TimelineEvent {
    pub at: Duration,
    pub kind: String,
    pub detail: BTreeMap<String, String>,
}

/// Append-only, insertion-order-preserving timeline.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Timeline {
    events: Vec<TimelineEvent>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, at: Duration, kind: impl Into<String>, detail: BTreeMap<String, String>) {
        self.events.push(TimelineEvent {
            at,
            kind: kind.into(),
            detail,
        });
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Invariant check used by scenario tests (spec §8): timeline times are
    /// non-decreasing.
    pub fn is_time_ordered(&self) -> bool {
        self.events.windows(2).all(|w| w[0].at <= w[1].at)
    }
}

/// Convenience builder for timeline detail maps, matching the ad-hoc
/// `serde_json::json!`-style construction used elsewhere in the codebase but
/// for the flat string maps timelines store.
#[macro_export]
macro_rules! detail {
    ($($key:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut m = std::collections::BTreeMap::new();
        $(m.insert($key.to_string(), $value.to_string());)*
        m
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_preserves_insertion_order_and_is_time_ordered() {
        let mut tl = Timeline::new();
        tl.push(Duration::from_secs(0), "call.created", detail! {});
        tl.push(Duration::from_secs(1), "status.changed", detail! {"status" => "ringing"});
        assert_eq!(tl.events().len(), 2);
        assert!(tl.is_time_ordered());
        assert_eq!(tl.events()[1].kind, "status.changed");
    }
}
