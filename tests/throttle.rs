//! Outbound pacing behaviour under sustained load.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::fmt;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use proptest::prelude::*;
use realmgate::error::QueueError;
use realmgate::service::throttle::{base_wait_ms, OutboundEntry, OutboundThrottle, MAX_QUEUED};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

fn entry(len: usize) -> OutboundEntry {
    OutboundEntry {
        bytes: Bytes::from(vec![0u8; len]),
    }
}

/// Polls every millisecond until the next entry leaves, returning the send time.
fn next_send(throttle: &mut OutboundThrottle, from_ms: u64) -> u64 {
    (from_ms..from_ms + 60_000)
        .find(|&now| throttle.poll_send(now).is_some())
        .expect("entry should leave within a minute")
}

#[test]
fn test_eleventh_entry_is_shed() {
    let mut throttle = OutboundThrottle::new();
    for depth in 1..=MAX_QUEUED {
        assert_eq!(throttle.push(entry(20)).unwrap(), depth);
    }
    assert_eq!(
        throttle.push(entry(20)),
        Err(QueueError::Overflow { depth: MAX_QUEUED })
    );
    assert_eq!(throttle.len(), MAX_QUEUED);
}

/// Records the `depth` field of every congestion warning.
#[derive(Clone, Default)]
struct CongestionWarnings(Arc<Mutex<Vec<u64>>>);

#[derive(Default)]
struct WarningFields {
    message: String,
    depth: Option<u64>,
}

impl Visit for WarningFields {
    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == "depth" {
            self.depth = Some(value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for CongestionWarnings {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::WARN {
            return;
        }
        let mut fields = WarningFields::default();
        event.record(&mut fields);
        if fields.message == "outbound queue congested" {
            if let Some(depth) = fields.depth {
                self.0.lock().unwrap().push(depth);
            }
        }
    }
}

#[test]
fn test_congestion_warned_from_eighth_entry() {
    let warnings = CongestionWarnings::default();
    let subscriber = tracing_subscriber::registry().with(warnings.clone());

    tracing::subscriber::with_default(subscriber, || {
        let mut throttle = OutboundThrottle::new();
        for _ in 0..MAX_QUEUED {
            throttle.push(entry(20)).unwrap();
        }
        assert!(throttle.push(entry(20)).is_err());
    });

    assert_eq!(*warnings.0.lock().unwrap(), vec![8, 9, 10]);
}

#[test]
fn test_back_to_back_sends_build_penalty() {
    let mut throttle = OutboundThrottle::new();
    throttle.start(0);
    for _ in 0..5 {
        throttle.push(entry(40)).unwrap();
    }

    let mut last = 0;
    let mut gaps = Vec::new();
    for _ in 0..5 {
        let sent = next_send(&mut throttle, last);
        gaps.push(sent - last);
        last = sent;
    }

    // first gap is sized for an empty history, then 3600 ms plus 60 ms per step
    assert_eq!(gaps, vec![1300, 3660, 3720, 3780, 3840]);
    assert_eq!(throttle.penalty(), 5);
}

#[test]
fn test_idle_period_clears_penalty() {
    let mut throttle = OutboundThrottle::new();
    throttle.start(0);
    throttle.push(entry(40)).unwrap();
    throttle.push(entry(40)).unwrap();
    let first = next_send(&mut throttle, 0);
    assert_eq!(throttle.penalty(), 1);

    // nothing queued for a while, then a late send
    let late = first + throttle.wait_ms() + 501;
    assert!(throttle.poll_send(late).is_some());
    assert_eq!(throttle.penalty(), 0);
    assert_eq!(throttle.wait_ms(), base_wait_ms(40));
}

#[test]
fn test_penalty_wraps_at_cap() {
    let mut throttle = OutboundThrottle::new();
    throttle.start(0);
    let mut now = 0;
    for _ in 0..101 {
        throttle.push(entry(5)).unwrap();
        now = next_send(&mut throttle, now);
    }
    // one hundred consecutive steps, then the reset
    assert_eq!(throttle.penalty(), 0);
}

#[test]
fn test_clear_reports_dropped() {
    let mut throttle = OutboundThrottle::new();
    throttle.push(entry(5)).unwrap();
    throttle.push(entry(5)).unwrap();
    assert_eq!(throttle.clear(), 2);
    assert!(throttle.is_empty());
    assert!(throttle.poll_send(u64::MAX / 2).is_none());
}

// Property: sends never happen closer together than the wait in force
proptest! {
    #[test]
    fn prop_sends_respect_wait(lens in prop::collection::vec(1usize..200, 1..10)) {
        let mut throttle = OutboundThrottle::new();
        throttle.start(0);
        for len in &lens {
            throttle.push(entry(*len)).unwrap();
        }

        let mut last = 0;
        let mut now = 0;
        while !throttle.is_empty() {
            let wait = throttle.wait_ms();
            now += 100;
            if throttle.poll_send(now).is_some() {
                prop_assert!(now - last >= wait);
                last = now;
            }
        }
    }
}

// Property: the wait never shrinks as the last packet grows
proptest! {
    #[test]
    fn prop_base_wait_is_monotonic(a in 0usize..2000, b in 0usize..2000) {
        let (small, large) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(base_wait_ms(small) <= base_wait_ms(large));
    }
}
