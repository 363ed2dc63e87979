// src/builder.rs
use crate::book::{BookOp, OrderBook, Side};
use crate::itch::{self, tag, Envelope};
use crate::queue::{Consumer, ReadOutcome};
use anyhow::Result;
use hashbrown::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

const SPINS_BEFORE_SLEEP: u32 = 64;
const IDLE_SLEEP: Duration = Duration::from_micros(50);

#[derive(Clone, Copy, Debug, Default)]
pub struct BuilderStats {
    pub envelopes: u64,
    pub applied: u64,
    pub unknown_orders: u64,
    pub filtered: u64,
    pub ignored: u64,
    pub torn_reads: u64,
    pub lapped_msgs: u64,
    /// Apply latency buckets: <250ns, <500ns, <1us, <2us, >=2us.
    pub apply_lat: [u64; 5],
}

impl BuilderStats {
    #[inline]
    fn record_apply(&mut self, dur: Duration) {
        let ns = dur.as_nanos() as u64;
        let bucket = if ns < 250 {
            0
        } else if ns < 500 {
            1
        } else if ns < 1_000 {
            2
        } else if ns < 2_000 {
            3
        } else {
            4
        };
        self.apply_lat[bucket] += 1;
    }
}

pub struct BuilderOutput {
    pub books: HashMap<u16, OrderBook>,
    pub tickers: HashMap<u16, [u8; 8]>,
    pub stats: BuilderStats,
}

/// One consumer of the broadcast queue. Owns its read cursor and its books;
/// nothing here is shared with other builders. Securities are partitioned by
/// `locate % shard_count`, optionally narrowed further to an explicit locate
/// list.
pub struct BookBuilder {
    rx: Consumer<Envelope>,
    shard_id: usize,
    shard_count: usize,
    locates: Option<Vec<u16>>,
    books: HashMap<u16, OrderBook>,
    tickers: HashMap<u16, [u8; 8]>,
    stats: BuilderStats,
}

impl BookBuilder {
    pub fn new(rx: Consumer<Envelope>, shard_id: usize, shard_count: usize) -> Self {
        Self {
            rx,
            shard_id,
            shard_count: shard_count.max(1),
            locates: None,
            books: HashMap::new(),
            tickers: HashMap::new(),
            stats: BuilderStats::default(),
        }
    }

    /// Only build books for these locate codes.
    pub fn retain_only(&mut self, locates: &[u16]) {
        self.locates = Some(locates.to_vec());
    }

    #[inline]
    fn owns(&self, locate: u16) -> bool {
        if locate as usize % self.shard_count != self.shard_id {
            return false;
        }
        match &self.locates {
            Some(list) => list.contains(&locate),
            None => true,
        }
    }

    /// Poll the queue until `running` clears and the stream is drained.
    /// `on_top` fires whenever an applied op moves a book's top of book.
    pub fn run<F>(mut self, running: &AtomicBool, mut on_top: F) -> Result<BuilderOutput>
    where
        F: FnMut(u16, Option<(u32, u64)>, Option<(u32, u64)>),
    {
        let mut idle: u32 = 0;
        loop {
            match self.rx.try_next() {
                ReadOutcome::Ready(env) => {
                    idle = 0;
                    self.stats.envelopes += 1;
                    self.apply_envelope(&env, &mut on_top)?;
                }
                ReadOutcome::Torn => {
                    self.stats.torn_reads += 1;
                    std::hint::spin_loop();
                }
                ReadOutcome::Lapped => {
                    self.stats.lapped_msgs += self.rx.skip_to_latest();
                }
                ReadOutcome::NotReady => {
                    if !running.load(Ordering::Relaxed) && self.rx.lag() == 0 {
                        break;
                    }
                    idle += 1;
                    if idle < SPINS_BEFORE_SLEEP {
                        std::hint::spin_loop();
                    } else {
                        std::thread::sleep(IDLE_SLEEP);
                    }
                }
            }
        }
        Ok(BuilderOutput { books: self.books, tickers: self.tickers, stats: self.stats })
    }

    fn apply_envelope<F>(&mut self, env: &Envelope, on_top: &mut F) -> Result<()>
    where
        F: FnMut(u16, Option<(u32, u64)>, Option<(u32, u64)>),
    {
        // The locate code sits at the same offset in every record; filter
        // before bothering to reinterpret the payload.
        let p = env.payload();
        if p.len() < 3 {
            self.stats.ignored += 1;
            return Ok(());
        }
        let locate = u16::from_ne_bytes([p[1], p[2]]);
        if !self.owns(locate) {
            self.stats.filtered += 1;
            return Ok(());
        }

        match env.tag() {
            tag::STOCK_DIRECTORY => {
                if let Some(r) = env.record::<itch::StockDirectory>() {
                    self.tickers.insert(locate, r.ticker);
                }
                Ok(())
            }
            tag::ADD_ORDER => {
                let Some(r) = env.record::<itch::AddOrder>() else { return Ok(()) };
                let Some(side) = Side::from_order_side(r.side) else {
                    self.stats.ignored += 1;
                    return Ok(());
                };
                let op =
                    BookOp::Add { order_id: r.order_id, side, price: r.price, qty: r.qty };
                self.apply_op(locate, op, on_top)
            }
            tag::ADD_ORDER_MPID => {
                let Some(r) = env.record::<itch::AddOrderMpid>() else { return Ok(()) };
                let Some(side) = Side::from_order_side(r.side) else {
                    self.stats.ignored += 1;
                    return Ok(());
                };
                let op =
                    BookOp::Add { order_id: r.order_id, side, price: r.price, qty: r.qty };
                self.apply_op(locate, op, on_top)
            }
            tag::ORDER_EXECUTED => {
                let Some(r) = env.record::<itch::OrderExecuted>() else { return Ok(()) };
                self.apply_op(
                    locate,
                    BookOp::Execute { order_id: r.order_id, qty: r.executed_qty },
                    on_top,
                )
            }
            tag::ORDER_EXECUTED_WITH_PRICE => {
                let Some(r) = env.record::<itch::OrderExecutedWithPrice>() else {
                    return Ok(());
                };
                self.apply_op(
                    locate,
                    BookOp::Execute { order_id: r.order_id, qty: r.executed_qty },
                    on_top,
                )
            }
            tag::ORDER_CANCEL => {
                let Some(r) = env.record::<itch::OrderCancel>() else { return Ok(()) };
                self.apply_op(
                    locate,
                    BookOp::Cancel { order_id: r.order_id, qty: r.cancelled_qty },
                    on_top,
                )
            }
            tag::ORDER_DELETE => {
                let Some(r) = env.record::<itch::OrderDelete>() else { return Ok(()) };
                self.apply_op(locate, BookOp::Delete { order_id: r.order_id }, on_top)
            }
            tag::ORDER_REPLACE => {
                let Some(r) = env.record::<itch::OrderReplace>() else { return Ok(()) };
                let op = BookOp::Replace {
                    order_id: r.old_order_id,
                    new_order_id: r.new_order_id,
                    price: r.price,
                    qty: r.qty,
                };
                self.apply_op(locate, op, on_top)
            }
            // Trades, system events and the rest of the admin feed carry no
            // resting-liquidity changes.
            _ => {
                self.stats.ignored += 1;
                Ok(())
            }
        }
    }

    fn apply_op<F>(&mut self, locate: u16, op: BookOp, on_top: &mut F) -> Result<()>
    where
        F: FnMut(u16, Option<(u32, u64)>, Option<(u32, u64)>),
    {
        let book = self.books.entry(locate).or_insert_with(|| {
            let mut b = OrderBook::new();
            b.reserve_orders(250_000);
            b
        });

        let t0 = Instant::now();
        let out = book.apply(op)?;
        self.stats.record_apply(t0.elapsed());

        if out.applied {
            self.stats.applied += 1;
        } else {
            self.stats.unknown_orders += 1;
            debug!("locate {locate}: op on unseen order id, dropped");
        }
        if out.top_changed {
            on_top(locate, book.top_of_book(Side::Bid), book.top_of_book(Side::Ask));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{Producer, SpmcRing};
    use std::sync::atomic::AtomicBool;

    fn add_env(locate: u16, id: u64, side: u8, px: u32, qty: u32) -> Envelope {
        let rec = itch::AddOrder {
            kind: tag::ADD_ORDER,
            locate,
            tracking: 0,
            ts: 1,
            order_id: id,
            side,
            qty,
            ticker: *b"TEST    ",
            price: px,
        };
        Envelope::pack(tag::ADD_ORDER, &rec)
    }

    #[test]
    fn builder_applies_its_shard_and_filters_the_rest() {
        let ring = SpmcRing::<Envelope>::new(16);
        let mut tx = Producer::claim(&ring);
        let rx = Consumer::attach(&ring);

        tx.push(add_env(2, 1, itch::SIDE_BUY, 100_000, 10)); // locate 2: shard 0
        tx.push(add_env(3, 2, itch::SIDE_SELL, 100_100, 5)); // locate 3: shard 1

        let running = AtomicBool::new(false);
        let mut tops = Vec::new();
        let out = BookBuilder::new(rx, 0, 2)
            .run(&running, |locate, bid, ask| tops.push((locate, bid, ask)))
            .unwrap();

        assert_eq!(out.stats.envelopes, 2);
        assert_eq!(out.stats.applied, 1);
        assert_eq!(out.stats.filtered, 1);
        assert_eq!(out.books.len(), 1);
        assert_eq!(
            out.books.get(&2).and_then(|b| b.top_of_book(Side::Bid)),
            Some((100_000, 10))
        );
        assert_eq!(tops, vec![(2, Some((100_000, 10)), None)]);
    }

    #[test]
    fn builder_learns_tickers_and_runs_the_order_lifecycle() {
        let ring = SpmcRing::<Envelope>::new(32);
        let mut tx = Producer::claim(&ring);
        let rx = Consumer::attach(&ring);

        let dir = itch::StockDirectory {
            kind: tag::STOCK_DIRECTORY,
            locate: 7,
            tracking: 0,
            ts: 1,
            ticker: *b"TEST    ",
            market_category: b'Q',
            financial_status: b'N',
            round_lot_size: 100,
            round_lots_only: b'N',
            issue_classification: b'C',
            issue_subtype: *b"Z ",
            authenticity: b'P',
            short_sale_threshold: b'N',
            ipo_flag: b'N',
            luld_tier: b'1',
            etp_flag: b'N',
            etp_leverage: 0,
            inverse: b'N',
        };
        tx.push(Envelope::pack(tag::STOCK_DIRECTORY, &dir));
        tx.push(add_env(7, 1, itch::SIDE_SELL, 100_100, 50));

        let exec = itch::OrderExecuted {
            kind: tag::ORDER_EXECUTED,
            locate: 7,
            tracking: 0,
            ts: 2,
            order_id: 1,
            executed_qty: 20,
        };
        tx.push(Envelope::pack(tag::ORDER_EXECUTED, &exec));

        let cancel = itch::OrderCancel {
            kind: tag::ORDER_CANCEL,
            locate: 7,
            tracking: 0,
            ts: 3,
            order_id: 999, // never seen
            cancelled_qty: 1,
        };
        tx.push(Envelope::pack(tag::ORDER_CANCEL, &cancel));

        let running = AtomicBool::new(false);
        let out = BookBuilder::new(rx, 0, 1).run(&running, |_, _, _| {}).unwrap();

        assert_eq!(out.tickers.get(&7), Some(b"TEST    "));
        assert_eq!(out.stats.applied, 2);
        assert_eq!(out.stats.unknown_orders, 1);
        assert_eq!(
            out.books.get(&7).and_then(|b| b.top_of_book(Side::Ask)),
            Some((100_100, 30))
        );
    }
}
