// src/parser.rs
use crate::itch::{self, tag, Envelope};
use crate::queue::Producer;
use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;
use tracing::warn;
use zerocopy::AsBytes;

/// Read-only mapping over a capture file plus a frame cursor. The capture is
/// a concatenation of `[u16_be length][payload]` records.
pub struct CaptureReader {
    mmap: Mmap,
    cursor: usize,
}

impl CaptureReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open capture {:?}", path))?;
        let mmap =
            unsafe { Mmap::map(&file) }.with_context(|| format!("mmap capture {:?}", path))?;
        Ok(Self { mmap, cursor: 0 })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// The next message payload, or `None` at end of stream. A trailing
    /// frame cut short by the end of the file terminates iteration cleanly.
    pub fn next_frame(&mut self) -> Option<&[u8]> {
        let buf: &[u8] = &self.mmap;
        if self.cursor + 2 > buf.len() {
            return None;
        }
        let len = u16::from_be_bytes([buf[self.cursor], buf[self.cursor + 1]]) as usize;
        let start = self.cursor + 2;
        let end = start + len;
        if end > buf.len() {
            return None;
        }
        self.cursor = end;
        Some(&buf[start..end])
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ProducerReport {
    pub frames: u64,
    pub published: u64,
    pub unknown_types: u64,
    pub short_frames: u64,
}

/// Decodes frames and publishes envelopes. Constructed with an explicit
/// queue handle; publishing never fails and never allocates.
pub struct ItchProducer {
    tx: Producer<Envelope>,
}

impl ItchProducer {
    pub fn new(tx: Producer<Envelope>) -> Self {
        Self { tx }
    }

    /// Drain the capture, publishing every decodable message.
    pub fn run(&mut self, reader: &mut CaptureReader) -> ProducerReport {
        let mut report = ProducerReport::default();
        while let Some(frame) = reader.next_frame() {
            report.frames += 1;
            self.dispatch(frame, &mut report);
        }
        report
    }

    fn dispatch(&mut self, frame: &[u8], report: &mut ProducerReport) {
        let Some(&t) = frame.first() else {
            report.short_frames += 1;
            return;
        };
        let Some(need) = itch::wire_len(t) else {
            report.unknown_types += 1;
            warn!("unknown message type 0x{t:02x}, skipping");
            return;
        };
        if frame.len() < need {
            report.short_frames += 1;
            warn!(
                "short {} frame: {} of {} bytes, skipping",
                itch::kind_name(t).unwrap_or("?"),
                frame.len(),
                need
            );
            return;
        }

        match t {
            tag::SYSTEM_EVENT => self.publish(report, t, &itch::SystemEvent::parse(frame)),
            tag::STOCK_DIRECTORY => self.publish(report, t, &itch::StockDirectory::parse(frame)),
            tag::STOCK_TRADING_ACTION => {
                self.publish(report, t, &itch::StockTradingAction::parse(frame))
            }
            tag::REG_SHO_RESTRICTION => {
                self.publish(report, t, &itch::RegShoRestriction::parse(frame))
            }
            tag::MARKET_PARTICIPANT_POSITION => {
                self.publish(report, t, &itch::MarketParticipantPosition::parse(frame))
            }
            tag::MWCB_DECLINE_LEVEL => self.publish(report, t, &itch::MwcbDeclineLevel::parse(frame)),
            tag::MWCB_STATUS => self.publish(report, t, &itch::MwcbStatus::parse(frame)),
            tag::IPO_QUOTING_PERIOD => {
                self.publish(report, t, &itch::IpoQuotingPeriodUpdate::parse(frame))
            }
            tag::LULD_AUCTION_COLLAR => {
                self.publish(report, t, &itch::LuldAuctionCollar::parse(frame))
            }
            tag::OPERATIONAL_HALT => self.publish(report, t, &itch::OperationalHalt::parse(frame)),
            tag::ADD_ORDER => self.publish(report, t, &itch::AddOrder::parse(frame)),
            tag::ADD_ORDER_MPID => self.publish(report, t, &itch::AddOrderMpid::parse(frame)),
            tag::ORDER_EXECUTED => self.publish(report, t, &itch::OrderExecuted::parse(frame)),
            tag::ORDER_EXECUTED_WITH_PRICE => {
                self.publish(report, t, &itch::OrderExecutedWithPrice::parse(frame))
            }
            tag::ORDER_CANCEL => self.publish(report, t, &itch::OrderCancel::parse(frame)),
            tag::ORDER_DELETE => self.publish(report, t, &itch::OrderDelete::parse(frame)),
            tag::ORDER_REPLACE => self.publish(report, t, &itch::OrderReplace::parse(frame)),
            tag::TRADE => self.publish(report, t, &itch::Trade::parse(frame)),
            tag::CROSS_TRADE => self.publish(report, t, &itch::CrossTrade::parse(frame)),
            tag::BROKEN_TRADE => self.publish(report, t, &itch::BrokenTrade::parse(frame)),
            tag::NOII => self.publish(report, t, &itch::Noii::parse(frame)),
            tag::RETAIL_INTEREST => self.publish(report, t, &itch::RetailInterest::parse(frame)),
            tag::DIRECT_LISTING => self.publish(report, t, &itch::DirectListing::parse(frame)),
            // wire_len already screened the tag
            _ => {}
        }
    }

    #[inline]
    fn publish<T: AsBytes>(&mut self, report: &mut ProducerReport, t: u8, record: &T) {
        self.tx.push(Envelope::pack(t, record));
        report.published += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{Consumer, ReadOutcome, SpmcRing};
    use std::io::Write;

    fn frame(out: &mut Vec<u8>, body: &[u8]) {
        out.extend_from_slice(&(body.len() as u16).to_be_bytes());
        out.extend_from_slice(body);
    }

    fn write_capture(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn frames_are_sliced_by_length_prefix() {
        let mut cap = Vec::new();
        frame(&mut cap, b"abc");
        frame(&mut cap, b"defgh");
        let f = write_capture(&cap);

        let mut reader = CaptureReader::open(f.path()).unwrap();
        assert_eq!(reader.next_frame(), Some(&b"abc"[..]));
        assert_eq!(reader.next_frame(), Some(&b"defgh"[..]));
        assert_eq!(reader.next_frame(), None);
    }

    #[test]
    fn short_trailing_frame_ends_the_stream_cleanly() {
        let mut cap = Vec::new();
        frame(&mut cap, b"abc");
        // Length prefix promises 40 bytes the file does not have.
        cap.extend_from_slice(&40u16.to_be_bytes());
        cap.extend_from_slice(b"tail");
        let f = write_capture(&cap);

        let mut reader = CaptureReader::open(f.path()).unwrap();
        assert_eq!(reader.next_frame(), Some(&b"abc"[..]));
        assert_eq!(reader.next_frame(), None);
        assert_eq!(reader.next_frame(), None);
    }

    #[test]
    fn empty_capture_yields_no_frames() {
        let f = write_capture(&[]);
        let mut reader = CaptureReader::open(f.path()).unwrap();
        assert!(reader.next_frame().is_none());
    }

    #[test]
    fn producer_publishes_known_and_skips_unknown() {
        let add = itch::AddOrder {
            kind: tag::ADD_ORDER,
            locate: 7,
            tracking: 0,
            ts: 1,
            order_id: 55,
            side: itch::SIDE_BUY,
            qty: 10,
            ticker: *b"TEST    ",
            price: 100_000,
        };
        let mut body = Vec::new();
        add.encode_into(&mut body);

        let mut cap = Vec::new();
        frame(&mut cap, &body);
        frame(&mut cap, b"zzzz"); // unknown type byte
        frame(&mut cap, &body[..10]); // truncated AddOrder
        let f = write_capture(&cap);

        let ring = SpmcRing::<Envelope>::new(16);
        let mut producer = ItchProducer::new(Producer::claim(&ring));
        let mut reader = CaptureReader::open(f.path()).unwrap();
        let report = producer.run(&mut reader);

        assert_eq!(report.frames, 3);
        assert_eq!(report.published, 1);
        assert_eq!(report.unknown_types, 1);
        assert_eq!(report.short_frames, 1);

        let mut rx = Consumer::attach(&ring);
        let ReadOutcome::Ready(env) = rx.try_next() else {
            panic!("expected one envelope");
        };
        assert_eq!(env.tag(), tag::ADD_ORDER);
        let back: &itch::AddOrder = env.record().unwrap();
        assert_eq!(*back, add);
        assert!(matches!(rx.try_next(), ReadOutcome::NotReady));
    }
}
