use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use tracing::error;

lazy_static! {
    pub static ref MESSAGES_SENT: IntCounterVec = IntCounterVec::new(
        Opts::new("shared_messages_sent", "Wire messages handed to the transport"),
        &["cmd"]
    )
    .expect("metric can not be created");

    pub static ref SEND_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("shared_send_failures", "Wire messages the transport refused"),
        &["cmd"]
    )
    .expect("metric can not be created");

    pub static ref MESSAGES_APPLIED: IntCounterVec = IntCounterVec::new(
        Opts::new("shared_messages_applied", "Inbound wire messages applied to the registry"),
        &["cmd"]
    )
    .expect("metric can not be created");

    pub static ref DECODE_FAILURES: IntCounter = IntCounter::new(
        "shared_decode_failures",
        "Inbound wire messages rejected as malformed"
    )
    .expect("metric can not be created");

    pub static ref NOTIFICATIONS_DISPATCHED: IntCounterVec = IntCounterVec::new(
        Opts::new("shared_notifications_dispatched", "Notifications queued to subscribers"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref EVENTS_DROPPED: IntCounter = IntCounter::new(
        "shared_events_dropped",
        "Change events dropped because the event queue was full"
    )
    .expect("metric can not be created");

    pub static ref MESSAGE_SIZE_BYTES: HistogramVec = HistogramVec::new(
        HistogramOpts::new("shared_message_size_bytes", "Size of encoded wire messages")
            .buckets(exponential_buckets(64.0, 4.0, 10).expect("valid buckets")),
        &["cmd"]
    )
    .expect("metric can not be created");
}

/// Registers every shared-object collector with `registry`.
///
/// Collectors that are already registered are skipped, so the call is safe
/// to repeat.
pub fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(MESSAGES_SENT.clone()),
        Box::new(SEND_FAILURES.clone()),
        Box::new(MESSAGES_APPLIED.clone()),
        Box::new(DECODE_FAILURES.clone()),
        Box::new(NOTIFICATIONS_DISPATCHED.clone()),
        Box::new(EVENTS_DROPPED.clone()),
        Box::new(MESSAGE_SIZE_BYTES.clone()),
    ];

    for collector in collectors {
        match registry.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => error!(?e, "collector can not be registered"),
        }
    }
}

/// Text exposition of everything gathered by `registry`
pub fn encode_metrics(registry: &Registry) -> String {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!(?e, "could not encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
