#![allow(missing_docs)] // proc macros don't play nicely with docstrings

//! # metrics
//!
//! prometheus counters and histograms for the DHCPv4 dispatcher, allocator
//! and expiry sweeper

use std::time::Instant;

use lazy_static::lazy_static;
use prometheus::{
    HistogramVec, IntCounter, IntCounterVec, IntGauge, register_histogram_vec,
    register_int_counter, register_int_counter_vec, register_int_gauge,
};
use prometheus_static_metric::make_static_metric;

make_static_metric! {
    pub label_enum MsgType {
        discover,
        request,
        decline,
        release,
        offer,
        ack,
        unknown,
    }
    pub struct RecvStats: IntCounter {
        "message_type" => MsgType
    }
    pub struct SentStats: IntCounter {
        "message_type" => MsgType
    }

    pub label_enum AllocOutcome {
        fresh,
        renewed,
        bound,
        range_exhausted,
        bound_address_stolen,
        error,
    }
    pub struct AllocStats: IntCounter {
        "outcome" => AllocOutcome
    }
}

lazy_static! {
    /// when the server started
    pub static ref START_TIME: Instant = Instant::now();

    /// datagrams received, by message type
    pub static ref RECV_COUNT_VEC: IntCounterVec = register_int_counter_vec!(
        "dhcp_datagrams_received_total",
        "DHCPv4 datagrams received, by message type",
        &["message_type"]
    )
    .unwrap();
    /// aggregate count of all received message types
    pub static ref RECV_TYPE_COUNT: RecvStats = RecvStats::from(&RECV_COUNT_VEC);

    /// replies sent, by message type
    pub static ref SENT_COUNT_VEC: IntCounterVec = register_int_counter_vec!(
        "dhcp_datagrams_sent_total",
        "DHCPv4 datagrams sent, by message type",
        &["message_type"]
    )
    .unwrap();
    /// aggregate count of all sent message types
    pub static ref SENT_TYPE_COUNT: SentStats = SentStats::from(&SENT_COUNT_VEC);

    /// allocator outcomes, by result
    pub static ref ALLOC_COUNT_VEC: IntCounterVec = register_int_counter_vec!(
        "dhcp_allocation_result_total",
        "Allocator outcomes, by result",
        &["outcome"]
    )
    .unwrap();
    /// aggregate count of all allocator outcomes
    pub static ref ALLOC_OUTCOME_COUNT: AllocStats = AllocStats::from(&ALLOC_COUNT_VEC);

    /// histogram of dispatcher handling time, by message type
    pub static ref DISPATCH_DURATION: HistogramVec = register_histogram_vec!(
        "dhcp_dispatch_duration_seconds",
        "dispatcher handling time in seconds, by message type",
        &["message_type"]
    )
    .unwrap();

    /// leases removed by the expiry sweeper, cumulative
    pub static ref LEASES_EXPIRED: IntCounter =
        register_int_counter!("dhcp_leases_expired_total", "leases removed by the expiry sweeper").unwrap();
    /// failed expiry sweeper ticks, cumulative
    pub static ref SWEEP_ERRORS: IntCounter =
        register_int_counter!("dhcp_sweep_errors_total", "expiry sweeper ticks that failed").unwrap();
    /// number of currently live leases, as of the last sweep
    pub static ref LIVE_LEASES: IntGauge =
        register_int_gauge!("dhcp_live_leases", "count of currently live leases, refreshed by the sweeper").unwrap();
    /// number of Options reads served from the degraded-read cache rather than the store
    pub static ref OPTIONS_CACHE_FALLBACKS: IntCounter = register_int_counter!(
        "dhcp_options_cache_fallbacks_total",
        "Options reads served from the cache because the store was unavailable"
    )
    .unwrap();
    /// server uptime, in seconds
    pub static ref UPTIME: IntGauge = register_int_gauge!("dhcp_uptime_seconds", "server uptime (seconds)").unwrap();
}

/// map a `dhcproto` v4 message type to its metric label
pub fn msg_type_label(msg_type: dhcproto::v4::MessageType) -> &'static str {
    use dhcproto::v4::MessageType::*;
    match msg_type {
        Discover => "discover",
        Request => "request",
        Decline => "decline",
        Release => "release",
        Offer => "offer",
        Ack => "ack",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use prometheus::gather;

    use super::*;

    #[test]
    fn histograms_and_counters_are_registered_and_exposed() {
        DISPATCH_DURATION.with_label_values(&["discover"]).observe(0.001);
        RECV_TYPE_COUNT.discover.inc();
        SENT_TYPE_COUNT.offer.inc();
        ALLOC_OUTCOME_COUNT.fresh.inc();

        let families = gather();
        let names = families
            .iter()
            .map(|family| family.get_name().to_string())
            .collect::<HashSet<_>>();

        assert!(names.contains("dhcp_dispatch_duration_seconds"));
        assert!(names.contains("dhcp_datagrams_received_total"));
        assert!(names.contains("dhcp_datagrams_sent_total"));
        assert!(names.contains("dhcp_allocation_result_total"));
    }

    #[test]
    fn msg_type_label_covers_dispatched_types() {
        use dhcproto::v4::MessageType;
        assert_eq!(msg_type_label(MessageType::Discover), "discover");
        assert_eq!(msg_type_label(MessageType::Ack), "ack");
        assert_eq!(msg_type_label(MessageType::Inform), "unknown");
    }
}
