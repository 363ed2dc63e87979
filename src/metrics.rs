// src/metrics.rs
use itchcast::builder::BuilderStats;
use itchcast::parser::ProducerReport;

/// End-of-run process counters, aggregated from the producer report and the
/// per-builder stats after the worker threads join.
#[derive(Default)]
pub struct Metrics {
    pub frames_total: u64,
    pub published: u64,
    pub unknown_types: u64,
    pub short_frames: u64,
    pub envelopes: u64,
    pub applied: u64,
    pub unknown_orders: u64,
    pub filtered: u64,
    pub ignored: u64,
    pub torn_reads: u64,
    pub lapped_msgs: u64,
    pub apply_lat: [u64; 5],
}

impl Metrics {
    pub fn absorb_producer(&mut self, r: &ProducerReport) {
        self.frames_total += r.frames;
        self.published += r.published;
        self.unknown_types += r.unknown_types;
        self.short_frames += r.short_frames;
    }

    pub fn absorb_builder(&mut self, s: &BuilderStats) {
        self.envelopes += s.envelopes;
        self.applied += s.applied;
        self.unknown_orders += s.unknown_orders;
        self.filtered += s.filtered;
        self.ignored += s.ignored;
        self.torn_reads += s.torn_reads;
        self.lapped_msgs += s.lapped_msgs;
        for (acc, v) in self.apply_lat.iter_mut().zip(s.apply_lat.iter()) {
            *acc += v;
        }
    }

    pub fn text_report(&self) -> String {
        let [b0, b1, b2, b3, b4] = self.apply_lat;
        format!(
            "\
# TYPE itchcast_frames_total counter
itchcast_frames_total {}
# TYPE itchcast_published_total counter
itchcast_published_total {}
# TYPE itchcast_unknown_type_total counter
itchcast_unknown_type_total {}
# TYPE itchcast_short_frame_total counter
itchcast_short_frame_total {}
# TYPE itchcast_envelopes_total counter
itchcast_envelopes_total {}
# TYPE itchcast_applied_total counter
itchcast_applied_total {}
# TYPE itchcast_unknown_order_total counter
itchcast_unknown_order_total {}
# TYPE itchcast_filtered_total counter
itchcast_filtered_total {}
# TYPE itchcast_ignored_total counter
itchcast_ignored_total {}
# TYPE itchcast_torn_read_total counter
itchcast_torn_read_total {}
# TYPE itchcast_lapped_msg_total counter
itchcast_lapped_msg_total {}
# TYPE itchcast_apply_latency_bucket counter
itchcast_apply_latency_bucket{{le=\"250\"}} {b0}
itchcast_apply_latency_bucket{{le=\"500\"}} {b1}
itchcast_apply_latency_bucket{{le=\"1000\"}} {b2}
itchcast_apply_latency_bucket{{le=\"2000\"}} {b3}
itchcast_apply_latency_bucket{{le=\"+Inf\"}} {b4}
",
            self.frames_total,
            self.published,
            self.unknown_types,
            self.short_frames,
            self.envelopes,
            self.applied,
            self.unknown_orders,
            self.filtered,
            self.ignored,
            self.torn_reads,
            self.lapped_msgs,
        )
    }
}
