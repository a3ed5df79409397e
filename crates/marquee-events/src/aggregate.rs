//! Grouping, sorting and deduplication of upcoming events.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use futures::future::try_join_all;
use serde::Serialize;

use crate::author::Author;
use crate::source::{EventSource, RawEvent, SourceError};

/// Events keyed by activity classifier, each group sorted by date and
/// deduplicated by title.
pub type GroupedEvents = BTreeMap<String, Vec<Event>>;

/// An upcoming event with every author associated with it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Event title, unique within its activity group
    pub title: String,

    /// Activity classifier
    pub activity: String,

    /// Period string as reported by the events service
    pub month: String,

    /// First day of the reported month
    pub date: NaiveDate,

    /// Authors associated with the event, in fetch order
    pub users: Vec<Author>,

    /// Pass-through fields from the events service
    #[serde(flatten)]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl Event {
    /// Build an event from a raw record, crediting a single author.
    pub fn from_raw(raw: RawEvent, author: &Author) -> Result<Self, AggregateError> {
        let mut details = raw.details;
        details.retain(|key, _| !RESERVED_FIELDS.contains(&key.as_str()));

        let date = parse_period(&raw.month).ok_or_else(|| AggregateError::InvalidPeriod {
            title: raw.title.clone(),
            period: raw.month.clone(),
        })?;

        Ok(Self {
            title: raw.title,
            activity: raw.activity,
            month: raw.month,
            date,
            users: vec![author.clone()],
            details,
        })
    }
}

/// Keys computed by aggregation; feed fields with these names are dropped.
const RESERVED_FIELDS: &[&str] = &["title", "activity", "month", "date", "users"];

/// Errors that can occur while aggregating events.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("Failed to fetch events for '{handle}': {source}")]
    Source {
        handle: String,
        #[source]
        source: SourceError,
    },

    #[error("Event '{title}' has an unreadable period: {period:?}")]
    InvalidPeriod { title: String, period: String },
}

/// Parse a month-year period such as "Jan 2024" into the first day of that month.
///
/// Full month names ("January 2024") are accepted as well.
pub fn parse_period(period: &str) -> Option<NaiveDate> {
    let day_one = format!("1 {}", period.trim());
    NaiveDate::parse_from_str(&day_one, "%d %b %Y")
        .or_else(|_| NaiveDate::parse_from_str(&day_one, "%d %B %Y"))
        .ok()
}

/// Fetch and aggregate upcoming events for every author with an events handle.
///
/// All fetches are issued at once; the first failure fails the whole run.
pub async fn aggregate<S>(source: &S, authors: &[Author]) -> Result<GroupedEvents, AggregateError>
where
    S: EventSource + ?Sized,
{
    let fetches = authors
        .iter()
        .filter_map(|author| author.event_handle().map(|handle| (author, handle)))
        .map(|(author, handle)| async move {
            let raw = source
                .upcoming_events(handle)
                .await
                .map_err(|err| AggregateError::Source {
                    handle: handle.to_string(),
                    source: err,
                })?;

            raw.into_iter()
                .map(|event| Event::from_raw(event, author))
                .collect::<Result<Vec<_>, _>>()
        });

    let per_author = try_join_all(fetches).await?;
    let fetched = per_author.len();
    let events: Vec<Event> = per_author.into_iter().flatten().collect();

    tracing::info!(
        "Fetched {} events for {} authors",
        events.len(),
        fetched
    );

    Ok(group_events(events))
}

/// Group events by activity, sort each group by date and merge events sharing a title.
pub fn group_events(events: Vec<Event>) -> GroupedEvents {
    let mut groups = GroupedEvents::new();
    for event in events {
        groups.entry(event.activity.clone()).or_default().push(event);
    }

    groups
        .into_iter()
        .map(|(activity, mut events)| {
            // Stable: equal dates keep their fetch order
            events.sort_by_key(|event| event.date);
            (activity, merge_by_title(events))
        })
        .collect()
}

fn merge_by_title(events: Vec<Event>) -> Vec<Event> {
    let mut positions: HashMap<String, usize> = HashMap::new();

    events.into_iter().fold(Vec::new(), |mut merged, event| {
        match positions.get(&event.title) {
            Some(&index) => merged[index].users.extend(event.users),
            None => {
                positions.insert(event.title.clone(), merged.len());
                merged.push(event);
            }
        }
        merged
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MockEventSource;

    fn author(name: &str, handle: Option<&str>) -> Author {
        Author {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            handle: handle.map(str::to_string),
            profile: BTreeMap::new(),
        }
    }

    fn raw(title: &str, activity: &str, month: &str) -> RawEvent {
        RawEvent {
            title: title.to_string(),
            activity: activity.to_string(),
            month: month.to_string(),
            details: BTreeMap::new(),
        }
    }

    fn names(event: &Event) -> Vec<&str> {
        event.users.iter().map(|u| u.name.as_str()).collect()
    }

    #[test]
    fn parses_periods() {
        assert_eq!(parse_period("Jan 2024"), NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(parse_period(" Sep 2023 "), NaiveDate::from_ymd_opt(2023, 9, 1));
        assert_eq!(parse_period("March 2025"), NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(parse_period("sometime"), None);
    }

    #[test]
    fn accepts_full_month_names() {
        let a = author("A", Some("a1"));

        let event = Event::from_raw(raw("Foo", "speaking", "September 2024"), &a).unwrap();

        assert_eq!(event.date, NaiveDate::from_ymd_opt(2024, 9, 1).unwrap());
        assert_eq!(event.month, "September 2024");
    }

    #[test]
    fn computed_fields_win_over_feed_fields() {
        let feed: RawEvent = serde_json::from_value(serde_json::json!({
            "title": "Foo",
            "activity": "speaking",
            "month": "Jan 2024",
            "users": "someone else",
            "date": "tomorrow",
            "url": "https://foo.example"
        }))
        .unwrap();

        let event = Event::from_raw(feed, &author("A", Some("a1"))).unwrap();
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["date"], "2024-01-01");
        assert_eq!(value["users"][0]["name"], "A");
        assert_eq!(value["url"], "https://foo.example");
        assert!(!event.details.contains_key("users"));
    }

    /// Answers only once every expected fetch is in flight.
    struct GatedSource {
        gate: tokio::sync::Barrier,
    }

    #[async_trait::async_trait]
    impl EventSource for GatedSource {
        async fn upcoming_events(&self, handle: &str) -> Result<Vec<RawEvent>, SourceError> {
            self.gate.wait().await;
            Ok(vec![raw(&format!("Event {}", handle), "speaking", "Jan 2024")])
        }
    }

    #[tokio::test]
    async fn fetches_all_authors_concurrently() {
        let source = GatedSource {
            gate: tokio::sync::Barrier::new(3),
        };
        let authors = vec![
            author("A", Some("a1")),
            author("B", Some("b1")),
            author("C", Some("c1")),
        ];

        let grouped = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            aggregate(&source, &authors),
        )
        .await
        .expect("fetches ran one at a time")
        .unwrap();

        assert_eq!(grouped["speaking"].len(), 3);
    }

    #[tokio::test]
    async fn merges_authors_sharing_an_event() {
        let mut source = MockEventSource::new();
        source
            .expect_upcoming_events()
            .withf(|handle| handle == "a1")
            .times(1)
            .returning(|_| Ok(vec![raw("Foo", "speaking", "Jan 2024")]));
        source
            .expect_upcoming_events()
            .withf(|handle| handle == "b1")
            .times(1)
            .returning(|_| Ok(vec![raw("Foo", "speaking", "Jan 2024")]));

        let authors = vec![author("A", Some("a1")), author("B", Some("b1"))];
        let grouped = aggregate(&source, &authors).await.unwrap();

        assert_eq!(grouped.len(), 1);
        let speaking = &grouped["speaking"];
        assert_eq!(speaking.len(), 1);
        assert_eq!(speaking[0].title, "Foo");
        assert_eq!(speaking[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(names(&speaking[0]), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn skips_authors_without_handle() {
        let mut source = MockEventSource::new();
        source.expect_upcoming_events().times(0);

        let authors = vec![author("C", None), author("D", Some(""))];
        let grouped = aggregate(&source, &authors).await.unwrap();

        assert!(grouped.is_empty());
    }

    #[tokio::test]
    async fn keeps_activities_apart() {
        let mut source = MockEventSource::new();
        source
            .expect_upcoming_events()
            .withf(|handle| handle == "a1")
            .returning(|_| Ok(vec![raw("Foo", "speaking", "Jan 2024")]));
        source
            .expect_upcoming_events()
            .withf(|handle| handle == "b1")
            .returning(|_| Ok(vec![raw("Foo", "attending", "Jan 2024")]));

        let authors = vec![author("A", Some("a1")), author("B", Some("b1"))];
        let grouped = aggregate(&source, &authors).await.unwrap();

        assert_eq!(grouped.len(), 2);
        assert_eq!(names(&grouped["speaking"][0]), vec!["A"]);
        assert_eq!(names(&grouped["attending"][0]), vec!["B"]);
    }

    #[tokio::test]
    async fn propagates_fetch_failure() {
        let mut source = MockEventSource::new();
        source
            .expect_upcoming_events()
            .withf(|handle| handle == "a1")
            .returning(|_| Ok(vec![raw("Foo", "speaking", "Jan 2024")]));
        source
            .expect_upcoming_events()
            .withf(|handle| handle == "b1")
            .returning(|handle| {
                Err(SourceError::NotFound {
                    handle: handle.to_string(),
                })
            });

        let authors = vec![author("A", Some("a1")), author("B", Some("b1"))];
        let err = aggregate(&source, &authors).await.unwrap_err();

        assert!(matches!(err, AggregateError::Source { ref handle, .. } if handle == "b1"));
    }

    #[tokio::test]
    async fn rejects_unreadable_period() {
        let mut source = MockEventSource::new();
        source
            .expect_upcoming_events()
            .returning(|_| Ok(vec![raw("Foo", "speaking", "soon")]));

        let err = aggregate(&source, &[author("A", Some("a1"))])
            .await
            .unwrap_err();

        assert!(matches!(err, AggregateError::InvalidPeriod { .. }));
    }

    #[test]
    fn sorts_by_date_keeping_ties_in_order() {
        let a = author("A", Some("a1"));
        let events = vec![
            Event::from_raw(raw("Late", "speaking", "Dec 2024"), &a).unwrap(),
            Event::from_raw(raw("First tie", "speaking", "Mar 2024"), &a).unwrap(),
            Event::from_raw(raw("Early", "speaking", "Jan 2024"), &a).unwrap(),
            Event::from_raw(raw("Second tie", "speaking", "Mar 2024"), &a).unwrap(),
        ];

        let grouped = group_events(events);
        let titles: Vec<&str> = grouped["speaking"].iter().map(|e| e.title.as_str()).collect();

        assert_eq!(titles, vec!["Early", "First tie", "Second tie", "Late"]);
    }

    #[test]
    fn merge_keeps_duplicate_authors_in_order() {
        let a = author("A", Some("a1"));
        let b = author("B", Some("b1"));
        let events = vec![
            Event::from_raw(raw("Foo", "tracking", "Feb 2024"), &a).unwrap(),
            Event::from_raw(raw("Foo", "tracking", "Feb 2024"), &b).unwrap(),
            Event::from_raw(raw("Foo", "tracking", "Feb 2024"), &a).unwrap(),
        ];

        let grouped = group_events(events);

        assert_eq!(grouped["tracking"].len(), 1);
        assert_eq!(names(&grouped["tracking"][0]), vec!["A", "B", "A"]);
    }

    #[test]
    fn merged_event_keeps_earliest_date() {
        let a = author("A", Some("a1"));
        let b = author("B", Some("b1"));
        let events = vec![
            Event::from_raw(raw("Foo", "speaking", "Jun 2024"), &a).unwrap(),
            Event::from_raw(raw("Foo", "speaking", "Feb 2024"), &b).unwrap(),
        ];

        let grouped = group_events(events);
        let foo = &grouped["speaking"][0];

        assert_eq!(foo.month, "Feb 2024");
        assert_eq!(names(foo), vec!["B", "A"]);
    }

    #[tokio::test]
    async fn aggregation_is_repeatable() {
        let mut source = MockEventSource::new();
        source.expect_upcoming_events().returning(|handle| {
            Ok(vec![
                raw("Shared", "speaking", "Apr 2024"),
                raw(&format!("Solo {}", handle), "attending", "Apr 2024"),
            ])
        });

        let authors = vec![author("A", Some("a1")), author("B", Some("b1"))];
        let first = aggregate(&source, &authors).await.unwrap();
        let second = aggregate(&source, &authors).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
