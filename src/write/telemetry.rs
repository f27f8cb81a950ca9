//! Write-path telemetry instruments and recording helpers.

use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

struct WriteInstruments {
    enqueued_lines: Counter<u64>,
    flush_triggers: Counter<u64>,
    flush_duration_seconds: Histogram<f64>,
    flush_lines: Histogram<u64>,
    flush_bytes: Histogram<u64>,
    flush_outcomes: Counter<u64>,
    dropped_lines: Counter<u64>,
}

fn instruments() -> &'static WriteInstruments {
    static INSTRUMENTS: OnceLock<WriteInstruments> = OnceLock::new();
    INSTRUMENTS.get_or_init(|| {
        let meter = global::meter("pingsink.write");
        WriteInstruments {
            enqueued_lines: meter
                .u64_counter("pingsink.write.enqueued_lines")
                .with_description("Lines accepted into the write buffer")
                .init(),
            flush_triggers: meter
                .u64_counter("pingsink.write.flush.triggers")
                .with_description("Flush trigger counts by reason")
                .init(),
            flush_duration_seconds: meter
                .f64_histogram("pingsink.write.flush.duration")
                .with_description("Write request duration per flush")
                .with_unit("s")
                .init(),
            flush_lines: meter
                .u64_histogram("pingsink.write.flush.lines")
                .with_description("Lines sent in each flush")
                .init(),
            flush_bytes: meter
                .u64_histogram("pingsink.write.flush.bytes")
                .with_description("Payload bytes sent in each flush")
                .with_unit("By")
                .init(),
            flush_outcomes: meter
                .u64_counter("pingsink.write.flush.outcomes")
                .with_description("Flush outcomes")
                .init(),
            dropped_lines: meter
                .u64_counter("pingsink.write.dropped_lines")
                .with_description("Lines discarded after a failed flush")
                .init(),
        }
    })
}

pub fn record_enqueue() {
    instruments().enqueued_lines.add(1, &[]);
}

pub fn record_flush_trigger(reason: &'static str) {
    instruments()
        .flush_triggers
        .add(1, &[KeyValue::new("reason", reason)]);
}

pub fn record_flush(duration_seconds: f64, lines: u64, bytes: u64, outcome: &'static str) {
    let i = instruments();
    let attrs = [KeyValue::new("outcome", outcome)];
    i.flush_duration_seconds.record(duration_seconds, &attrs);
    i.flush_lines.record(lines, &[]);
    i.flush_bytes.record(bytes, &[]);
    i.flush_outcomes.add(1, &attrs);
}

pub fn record_dropped_lines(lines: u64) {
    instruments().dropped_lines.add(lines, &[]);
}
