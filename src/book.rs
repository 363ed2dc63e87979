// src/book.rs
//! Hybrid limit order book with constant-time access to the top of book.
//!
//! Each side keeps the best 100 price levels in a sorted ring buffer (`top`),
//! the next 100 in an adjacent ring (`mid`), and everything deeper in a
//! sorted associative container (`deep`). An order-id index maps live order
//! ids to their level so that executes, cancels and deletes are O(1) in the
//! common case.
//!
//! ## Key properties
//!
//! - **Dense top of book**: the top ring is contiguous and strictly sorted
//!   in the side's direction, so best/worst and depth snapshots are cheap
//! - **Interpolated lookup**: on a full ring a price maps to a slot guess in
//!   O(1); a miss falls back to a bounded linear scan
//! - **Eviction cascade**: inserts into a full top ring evict the worst
//!   level into `mid`; a full `mid` demotes its worst level into `deep`
//! - **Stale-pointer detection**: the id index stores the expected price
//!   next to the slot handle; a mismatch (the ring shifted under the
//!   handle) triggers a rescan of top, then mid, then deep, and a rebind
//!
//! ## Example
//!
//! ```rust
//! use itchcast::book::{OrderBook, Side};
//!
//! let mut book = OrderBook::new();
//! book.add_order(1, Side::Ask, 10_000, 500).unwrap();
//! book.add_order(2, Side::Ask, 10_100, 300).unwrap();
//! assert_eq!(book.top_of_book(Side::Ask), Some((10_000, 500)));
//!
//! book.execute(1, 500).unwrap();
//! assert_eq!(book.top_of_book(Side::Ask), Some((10_100, 300)));
//! ```

use hashbrown::HashMap;
use serde::Serialize;
use std::collections::BTreeMap;

/// Levels kept in each of the `top` and `mid` rings per side.
pub const TOP_LEVELS: usize = 100;

pub type OrderId = u64;
/// Fixed-point price in 1/10000 dollar units.
pub type Price = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// Map an ITCH order side byte ('B' buy / 'S' sell) to a book side.
    #[inline]
    pub fn from_order_side(b: u8) -> Option<Self> {
        match b {
            b'B' => Some(Side::Bid),
            b'S' => Some(Side::Ask),
            _ => None,
        }
    }

    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }

    /// Is `a` closer to the top of book than `b` on this side?
    #[inline]
    fn better(self, a: Price, b: Price) -> bool {
        match self {
            Side::Ask => a < b,
            Side::Bid => a > b,
        }
    }
}

/// Aggregate resting interest at one price. The `vol_ahead` / `vol_behind`
/// fields track queue position for a simulated own order resting at this
/// level and stay at the -1 sentinel until such an order exists.
#[derive(Clone, Copy, Debug)]
pub struct Level {
    pub price: Price,
    pub volume: u64,
    pub vol_ahead: i64,
    pub vol_behind: i64,
}

impl Level {
    const EMPTY: Level = Level { price: 0, volume: 0, vol_ahead: -1, vol_behind: -1 };

    #[inline]
    fn new(price: Price, volume: u64) -> Self {
        Level { price, volume, ..Level::EMPTY }
    }
}

/// A (price, quantity) pair as exposed by depth snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PriceLevel {
    pub px: Price,
    pub qty: u64,
}

/// Book mutations in the vocabulary of the ITCH order lifecycle.
#[derive(Clone, Debug)]
pub enum BookOp {
    Add { order_id: OrderId, side: Side, price: Price, qty: u32 },
    Execute { order_id: OrderId, qty: u32 },
    Cancel { order_id: OrderId, qty: u32 },
    Delete { order_id: OrderId },
    Replace { order_id: OrderId, new_order_id: OrderId, price: Price, qty: u32 },
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ApplyOut {
    /// False when the op referenced an order id the book has never seen (or
    /// already removed); such ops are no-ops by design.
    pub applied: bool,
    pub top_changed: bool,
}

/// Result of an aggressive fill walking the opposing side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FillReport {
    pub executed: u64,
    pub levels_cleared: usize,
    pub remaining: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum BookError {
    /// No insertion point in a non-full ring: the ring is no longer sorted.
    /// Unrecoverable; the caller should treat the book as corrupt.
    #[error("no insertion point for price {price} on {side:?} ring of size {size}")]
    NoInsertionPoint { side: Side, price: Price, size: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RingKind {
    Top,
    Mid,
}

/// Where the id index believes an order's level lives. Ring slots are
/// physical indices and may go stale when the ring shifts; `expected_price`
/// is the validation token.
#[derive(Clone, Copy, Debug)]
enum Loc {
    Ring { ring: RingKind, slot: u16 },
    Deep,
}

#[derive(Clone, Copy, Debug)]
struct OrderRef {
    side: Side,
    loc: Loc,
    expected_price: Price,
    resting: u32,
}

/// Fixed-capacity ring of sorted levels. Logical position 0 is the best
/// level (`head`); logical position `size - 1` is the worst.
#[repr(align(64))]
struct LevelRing {
    head: usize,
    tail: usize,
    size: usize,
    levels: [Level; TOP_LEVELS],
}

impl LevelRing {
    fn new() -> Self {
        Self { head: 0, tail: 0, size: 0, levels: [Level::EMPTY; TOP_LEVELS] }
    }

    #[inline]
    fn phys(&self, logical: usize) -> usize {
        (self.head + logical) % TOP_LEVELS
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.size == TOP_LEVELS
    }

    #[inline]
    fn at(&self, logical: usize) -> &Level {
        &self.levels[self.phys(logical)]
    }

    #[inline]
    fn best(&self) -> Option<Price> {
        (self.size > 0).then(|| self.levels[self.head].price)
    }

    #[inline]
    fn worst(&self) -> Option<Price> {
        (self.size > 0).then(|| self.levels[(self.tail + TOP_LEVELS - 1) % TOP_LEVELS].price)
    }

    fn push_front(&mut self, level: Level) {
        debug_assert!(!self.is_full());
        self.head = (self.head + TOP_LEVELS - 1) % TOP_LEVELS;
        self.levels[self.head] = level;
        self.size += 1;
    }

    fn push_back(&mut self, level: Level) {
        debug_assert!(!self.is_full());
        self.levels[self.tail] = level;
        self.tail = (self.tail + 1) % TOP_LEVELS;
        self.size += 1;
    }

    fn pop_front(&mut self) -> Level {
        debug_assert!(!self.is_empty());
        let level = self.levels[self.head];
        self.head = (self.head + 1) % TOP_LEVELS;
        self.size -= 1;
        level
    }

    fn pop_back(&mut self) -> Level {
        debug_assert!(!self.is_empty());
        self.tail = (self.tail + TOP_LEVELS - 1) % TOP_LEVELS;
        self.size -= 1;
        self.levels[self.tail]
    }

    /// Insert at a logical position, shifting the worse levels one slot
    /// toward the tail. Returns the physical slot written.
    fn insert_at(&mut self, logical: usize, level: Level) -> usize {
        debug_assert!(!self.is_full() && logical <= self.size);
        for j in (logical..self.size).rev() {
            let from = self.phys(j);
            self.levels[(from + 1) % TOP_LEVELS] = self.levels[from];
        }
        self.tail = (self.tail + 1) % TOP_LEVELS;
        self.size += 1;
        let slot = self.phys(logical);
        self.levels[slot] = level;
        slot
    }

    /// Remove the level at a logical position, shifting inward from
    /// whichever end is closer.
    fn remove_at(&mut self, logical: usize) -> Level {
        debug_assert!(logical < self.size);
        let removed = *self.at(logical);
        if logical < self.size / 2 {
            for j in (0..logical).rev() {
                self.levels[self.phys(j + 1)] = self.levels[self.phys(j)];
            }
            self.head = (self.head + 1) % TOP_LEVELS;
        } else {
            for j in logical..self.size - 1 {
                self.levels[self.phys(j)] = self.levels[self.phys(j + 1)];
            }
            self.tail = (self.tail + TOP_LEVELS - 1) % TOP_LEVELS;
        }
        self.size -= 1;
        removed
    }
}

enum ScanHit {
    At(usize),
    InsertAt(usize),
}

/// Scan a ring from best to worst, tracking the left/right prices around the
/// candidate. Returns `None` only when the ring has lost its sort order.
fn scan(ring: &LevelRing, side: Side, price: Price) -> Option<ScanHit> {
    let mut left: Option<Price> = None;
    for pos in 0..ring.size {
        let right = ring.at(pos).price;
        if right == price {
            return Some(ScanHit::At(pos));
        }
        let after_left = left.map_or(true, |l| side.better(l, price));
        if after_left && side.better(price, right) {
            return Some(ScanHit::InsertAt(pos));
        }
        left = Some(right);
    }
    if left.map_or(true, |l| side.better(l, price)) {
        return Some(ScanHit::InsertAt(ring.size));
    }
    None
}

struct BookSide {
    side: Side,
    top: LevelRing,
    mid: LevelRing,
    deep: BTreeMap<Price, Level>,
}

impl BookSide {
    fn new(side: Side) -> Self {
        Self { side, top: LevelRing::new(), mid: LevelRing::new(), deep: BTreeMap::new() }
    }

    #[inline]
    fn ring(&self, kind: RingKind) -> &LevelRing {
        match kind {
            RingKind::Top => &self.top,
            RingKind::Mid => &self.mid,
        }
    }

    #[inline]
    fn ring_mut(&mut self, kind: RingKind) -> &mut LevelRing {
        match kind {
            RingKind::Top => &mut self.top,
            RingKind::Mid => &mut self.mid,
        }
    }

    fn deep_best(&self) -> Option<Price> {
        match self.side {
            Side::Ask => self.deep.keys().next().copied(),
            Side::Bid => self.deep.keys().next_back().copied(),
        }
    }

    fn add_deep(&mut self, level: Level) {
        self.deep
            .entry(level.price)
            .and_modify(|l| l.volume += level.volume)
            .or_insert(level);
    }

    /// Insert (or aggregate) a level into a ring, evicting the ring's worst
    /// level downward when full. Returns the physical slot written.
    fn place_in_ring(&mut self, kind: RingKind, level: Level) -> Result<usize, BookError> {
        let side = self.side;

        // Interpolated slot guess: on a full top ring of tick-adjacent
        // prices the offset from the best price is the logical position.
        if kind == RingKind::Top && self.top.is_full() {
            if let Some(best) = self.top.best() {
                let delta = match side {
                    Side::Ask => i64::from(level.price) - i64::from(best),
                    Side::Bid => i64::from(best) - i64::from(level.price),
                };
                if (0..TOP_LEVELS as i64).contains(&delta) {
                    let slot = (self.top.head + delta as usize) % TOP_LEVELS;
                    if self.top.levels[slot].price == level.price {
                        self.top.levels[slot].volume += level.volume;
                        return Ok(slot);
                    }
                }
            }
        }

        let ring = self.ring(kind);
        let hit = scan(ring, side, level.price).ok_or(BookError::NoInsertionPoint {
            side,
            price: level.price,
            size: ring.size,
        })?;

        match hit {
            ScanHit::At(pos) => {
                let ring = self.ring_mut(kind);
                let slot = ring.phys(pos);
                ring.levels[slot].volume += level.volume;
                Ok(slot)
            }
            ScanHit::InsertAt(pos) => {
                if self.ring(kind).is_full() {
                    self.evict_worst(kind)?;
                }
                let ring = self.ring_mut(kind);
                let slot = if pos == 0 {
                    ring.push_front(level);
                    ring.head
                } else {
                    ring.insert_at(pos, level)
                };
                Ok(slot)
            }
        }
    }

    /// Demote the worst level of a ring one tier down.
    fn evict_worst(&mut self, kind: RingKind) -> Result<(), BookError> {
        match kind {
            RingKind::Top => {
                let level = self.top.pop_back();
                self.place_beyond_top(level).map(|_| ())
            }
            RingKind::Mid => {
                let level = self.mid.pop_back();
                self.add_deep(level);
                Ok(())
            }
        }
    }

    /// Place a level that does not belong in the top ring: into `mid`, or
    /// straight into `deep` when it is worse than a full mid's worst level.
    fn place_beyond_top(&mut self, level: Level) -> Result<Loc, BookError> {
        if self.mid.is_full() {
            if let Some(worst) = self.mid.worst() {
                if self.side.better(worst, level.price) {
                    self.add_deep(level);
                    return Ok(Loc::Deep);
                }
            }
        }
        let slot = self.place_in_ring(RingKind::Mid, level)?;
        Ok(Loc::Ring { ring: RingKind::Mid, slot: slot as u16 })
    }

    /// Refill freed ring capacity from the tier below: mid levels promote
    /// into the top ring's tail, deep levels into mid's tail.
    fn promote(&mut self) {
        while !self.top.is_full() && !self.mid.is_empty() {
            let level = self.mid.pop_front();
            self.top.push_back(level);
        }
        while !self.mid.is_full() {
            let Some(best) = self.deep_best() else { break };
            if let Some(level) = self.deep.remove(&best) {
                self.mid.push_back(level);
            }
        }
    }

    /// Re-locate an order's level. Fast path trusts the stored slot when its
    /// price still matches; otherwise rescans top, mid, then deep.
    fn resolve(&self, entry: &OrderRef) -> Option<Loc> {
        if let Loc::Ring { ring, slot } = entry.loc {
            let r = self.ring(ring);
            let slot = slot as usize;
            let pos = (slot + TOP_LEVELS - r.head) % TOP_LEVELS;
            if pos < r.size && r.levels[slot].price == entry.expected_price {
                return Some(entry.loc);
            }
        } else if self.deep.contains_key(&entry.expected_price) {
            return Some(Loc::Deep);
        }

        for kind in [RingKind::Top, RingKind::Mid] {
            let r = self.ring(kind);
            for pos in 0..r.size {
                let slot = r.phys(pos);
                if r.levels[slot].price == entry.expected_price {
                    return Some(Loc::Ring { ring: kind, slot: slot as u16 });
                }
            }
        }
        if self.deep.contains_key(&entry.expected_price) {
            return Some(Loc::Deep);
        }
        None
    }
}

/// Per-security order book: one `BookSide` per side plus the order-id index.
pub struct OrderBook {
    bids: BookSide,
    asks: BookSide,
    orders: HashMap<OrderId, OrderRef>,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            bids: BookSide::new(Side::Bid),
            asks: BookSide::new(Side::Ask),
            orders: HashMap::new(),
        }
    }

    /// Pre-size the id index. Order ids are session-unique, so the map only
    /// needs to hold the peak number of simultaneously live orders.
    #[inline]
    pub fn reserve_orders(&mut self, n: usize) {
        self.orders.reserve(n);
    }

    #[inline]
    fn side_ref(&self, side: Side) -> &BookSide {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    #[inline]
    fn side_mut(&mut self, side: Side) -> &mut BookSide {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    /// Add a resting order. Orders priced beyond a full top ring route into
    /// the mid ring or the deep container without disturbing the top.
    pub fn add_order(
        &mut self,
        order_id: OrderId,
        side: Side,
        price: Price,
        qty: u32,
    ) -> Result<(), BookError> {
        if qty == 0 {
            return Ok(());
        }
        if self.orders.contains_key(&order_id) {
            // Ids are session-unique on the wire; a re-add of a live id is
            // treated as a replace so no volume is orphaned.
            self.reduce_order(order_id, None)?;
        }
        let level = Level::new(price, u64::from(qty));
        let book_side = self.side_mut(side);

        let beyond_top = book_side.top.is_full()
            && book_side.top.worst().is_some_and(|w| side.better(w, price));
        let loc = if beyond_top {
            book_side.place_beyond_top(level)?
        } else {
            let slot = book_side.place_in_ring(RingKind::Top, level)?;
            Loc::Ring { ring: RingKind::Top, slot: slot as u16 }
        };

        self.orders.insert(order_id, OrderRef { side, loc, expected_price: price, resting: qty });
        Ok(())
    }

    /// Reduce an order's resting volume; `qty: None` removes it entirely.
    /// Returns false for ids the book has never seen (or already removed).
    fn reduce_order(&mut self, order_id: OrderId, qty: Option<u32>) -> Result<bool, BookError> {
        let Some(entry) = self.orders.get(&order_id).copied() else {
            return Ok(false);
        };

        let book_side = self.side_mut(entry.side);
        let Some(loc) = book_side.resolve(&entry) else {
            // The level was cleared out from under the order (aggressive
            // fill); the id is dead.
            self.orders.remove(&order_id);
            return Ok(false);
        };

        let take = qty.map_or(entry.resting, |q| q.min(entry.resting));
        match loc {
            Loc::Ring { ring, slot } => {
                let r = book_side.ring_mut(ring);
                let slot = slot as usize;
                r.levels[slot].volume = r.levels[slot].volume.saturating_sub(u64::from(take));
                if r.levels[slot].volume == 0 {
                    let pos = (slot + TOP_LEVELS - r.head) % TOP_LEVELS;
                    r.remove_at(pos);
                    book_side.promote();
                }
            }
            Loc::Deep => {
                if let Some(level) = book_side.deep.get_mut(&entry.expected_price) {
                    level.volume = level.volume.saturating_sub(u64::from(take));
                    if level.volume == 0 {
                        book_side.deep.remove(&entry.expected_price);
                    }
                }
            }
        }

        let remaining = entry.resting - take;
        if remaining == 0 {
            self.orders.remove(&order_id);
        } else {
            self.orders.insert(order_id, OrderRef { resting: remaining, loc, ..entry });
        }
        Ok(true)
    }

    /// ITCH order-executed: reduce the identified order and its level.
    #[inline]
    pub fn execute(&mut self, order_id: OrderId, qty: u32) -> Result<bool, BookError> {
        self.reduce_order(order_id, Some(qty))
    }

    #[inline]
    pub fn cancel(&mut self, order_id: OrderId, qty: u32) -> Result<bool, BookError> {
        self.reduce_order(order_id, Some(qty))
    }

    #[inline]
    pub fn delete(&mut self, order_id: OrderId) -> Result<bool, BookError> {
        self.reduce_order(order_id, None)
    }

    /// Delete the old order and add the replacement on the same side.
    pub fn replace(
        &mut self,
        order_id: OrderId,
        new_order_id: OrderId,
        price: Price,
        qty: u32,
    ) -> Result<bool, BookError> {
        let Some(entry) = self.orders.get(&order_id).copied() else {
            return Ok(false);
        };
        self.reduce_order(order_id, None)?;
        self.add_order(new_order_id, entry.side, price, qty)?;
        Ok(true)
    }

    /// Walk the side opposing the aggressor from the best level, consuming
    /// volume within the limit price. Cleared ring capacity refills from the
    /// tiers below; a sweep that drains the rings continues against deep.
    pub fn fill(&mut self, aggressor: Side, qty: u64, limit: Price) -> FillReport {
        let book_side = self.side_mut(aggressor.opposite());
        let mut remaining = qty;
        let mut cleared = 0usize;

        while remaining > 0 {
            if book_side.top.is_empty() {
                book_side.promote();
                if book_side.top.is_empty() {
                    break;
                }
            }
            let head_price = book_side.top.at(0).price;
            let crosses = match aggressor {
                Side::Bid => head_price <= limit,
                Side::Ask => head_price >= limit,
            };
            if !crosses {
                break;
            }

            let head = book_side.top.phys(0);
            let executed = remaining.min(book_side.top.levels[head].volume);
            book_side.top.levels[head].volume -= executed;
            remaining -= executed;
            if book_side.top.levels[head].volume == 0 {
                book_side.top.pop_front();
                cleared += 1;
            }
        }

        book_side.promote();
        FillReport { executed: qty - remaining, levels_cleared: cleared, remaining }
    }

    /// Apply one lifecycle op, reporting whether it hit a known order and
    /// whether the top of book moved.
    pub fn apply(&mut self, op: BookOp) -> Result<ApplyOut, BookError> {
        let before = (self.top_of_book(Side::Bid), self.top_of_book(Side::Ask));
        let applied = match op {
            BookOp::Add { order_id, side, price, qty } => {
                self.add_order(order_id, side, price, qty)?;
                true
            }
            BookOp::Execute { order_id, qty } => self.execute(order_id, qty)?,
            BookOp::Cancel { order_id, qty } => self.cancel(order_id, qty)?,
            BookOp::Delete { order_id } => self.delete(order_id)?,
            BookOp::Replace { order_id, new_order_id, price, qty } => {
                self.replace(order_id, new_order_id, price, qty)?
            }
        };
        let after = (self.top_of_book(Side::Bid), self.top_of_book(Side::Ask));
        Ok(ApplyOut { applied, top_changed: before != after })
    }

    // ---- read API -------------------------------------------------------

    #[inline]
    pub fn top_of_book(&self, side: Side) -> Option<(Price, u64)> {
        let top = &self.side_ref(side).top;
        (!top.is_empty()).then(|| {
            let best = top.at(0);
            (best.price, best.volume)
        })
    }

    /// Best `k` levels in side order, `k` clamped to the top ring.
    pub fn snapshot_top_k(&self, side: Side, k: usize) -> Vec<PriceLevel> {
        let top = &self.side_ref(side).top;
        let take = k.min(top.size);
        let mut out = Vec::with_capacity(take);
        for pos in 0..take {
            let level = top.at(pos);
            out.push(PriceLevel { px: level.price, qty: level.volume });
        }
        out
    }

    /// Logical index of `price` in the side's top ring, interpolation first.
    pub fn approx_level_for(&self, side: Side, price: Price) -> Option<usize> {
        let top = &self.side_ref(side).top;
        let best = top.best()?;
        let delta = match side {
            Side::Ask => i64::from(price) - i64::from(best),
            Side::Bid => i64::from(best) - i64::from(price),
        };
        if (0..top.size as i64).contains(&delta) && top.at(delta as usize).price == price {
            return Some(delta as usize);
        }
        (0..top.size).find(|&pos| top.at(pos).price == price)
    }

    #[inline]
    pub fn live_orders(&self) -> usize {
        self.orders.len()
    }
}

impl OrderBook {
    /// Exhaustive structural check, used by tests.
    pub fn assert_invariants(&self) {
        for book_side in [&self.bids, &self.asks] {
            let side = book_side.side;

            // 1) rings strictly sorted in the side's direction, and each
            //    tier strictly worse than the one above
            let mut prev: Option<Price> = None;
            for ring in [&book_side.top, &book_side.mid] {
                assert!(ring.size <= TOP_LEVELS, "{side:?} ring overflow");
                for pos in 0..ring.size {
                    let px = ring.at(pos).price;
                    if let Some(p) = prev {
                        assert!(side.better(p, px), "{side:?} ring out of order at {px}");
                    }
                    prev = Some(px);
                }
            }
            let mut deep_prices: Vec<Price> = book_side.deep.keys().copied().collect();
            if side == Side::Bid {
                deep_prices.reverse();
            }
            for px in deep_prices {
                if let Some(p) = prev {
                    assert!(side.better(p, px), "{side:?} deep out of order at {px}");
                }
                prev = Some(px);
            }

            // 2) no empty levels
            for ring in [&book_side.top, &book_side.mid] {
                for pos in 0..ring.size {
                    assert!(ring.at(pos).volume > 0, "{side:?} zero-volume level");
                }
            }
            assert!(book_side.deep.values().all(|l| l.volume > 0), "{side:?} zero deep level");

            // 3) every live order resolves to a level holding its price
            for (id, entry) in self.orders.iter().filter(|(_, e)| e.side == side) {
                assert!(entry.resting > 0, "zero resting volume for order {id}");
                assert!(book_side.resolve(entry).is_some(), "unresolvable order {id}");
            }

            // 4) conservation: level volume equals indexed resting volume
            let level_total: u64 = (0..book_side.top.size)
                .map(|p| book_side.top.at(p).volume)
                .chain((0..book_side.mid.size).map(|p| book_side.mid.at(p).volume))
                .chain(book_side.deep.values().map(|l| l.volume))
                .sum();
            let resting_total: u64 = self
                .orders
                .values()
                .filter(|e| e.side == side)
                .map(|e| u64::from(e.resting))
                .sum();
            assert_eq!(level_total, resting_total, "{side:?} volume not conserved");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ask(book: &mut OrderBook, id: OrderId, px: Price, qty: u32) {
        book.add_order(id, Side::Ask, px, qty).unwrap();
    }

    #[test]
    fn add_orders_build_a_sorted_ask_top() {
        let mut book = OrderBook::new();

        ask(&mut book, 1, 10_000, 500);
        assert_eq!(book.top_of_book(Side::Ask), Some((10_000, 500)));

        ask(&mut book, 2, 10_100, 300);
        assert_eq!(
            book.snapshot_top_k(Side::Ask, 10),
            vec![PriceLevel { px: 10_000, qty: 500 }, PriceLevel { px: 10_100, qty: 300 }]
        );

        // Front insert: better price becomes the new best.
        ask(&mut book, 3, 9_950, 200);
        assert_eq!(book.top_of_book(Side::Ask), Some((9_950, 200)));
        assert_eq!(
            book.snapshot_top_k(Side::Ask, 10),
            vec![
                PriceLevel { px: 9_950, qty: 200 },
                PriceLevel { px: 10_000, qty: 500 },
                PriceLevel { px: 10_100, qty: 300 },
            ]
        );
        book.assert_invariants();
    }

    #[test]
    fn aggressive_fill_walks_the_ask_side() {
        let mut book = OrderBook::new();
        ask(&mut book, 1, 10_000, 500);
        ask(&mut book, 2, 10_100, 300);
        ask(&mut book, 3, 9_950, 200);

        let report = book.fill(Side::Bid, 600, 10_100);
        assert_eq!(report, FillReport { executed: 600, levels_cleared: 1, remaining: 0 });
        assert_eq!(
            book.snapshot_top_k(Side::Ask, 10),
            vec![PriceLevel { px: 10_000, qty: 100 }, PriceLevel { px: 10_100, qty: 300 }]
        );
        assert_eq!(book.top_of_book(Side::Ask), Some((10_000, 100)));
    }

    #[test]
    fn fill_respects_the_limit_price() {
        let mut book = OrderBook::new();
        ask(&mut book, 1, 10_000, 100);
        ask(&mut book, 2, 10_100, 100);

        let report = book.fill(Side::Bid, 500, 10_000);
        assert_eq!(report.executed, 100);
        assert_eq!(report.remaining, 400);
        assert_eq!(book.top_of_book(Side::Ask), Some((10_100, 100)));
    }

    #[test]
    fn same_price_orders_aggregate_into_one_level() {
        let mut book = OrderBook::new();
        ask(&mut book, 1, 10_000, 100);
        ask(&mut book, 2, 10_000, 150);
        assert_eq!(book.top_of_book(Side::Ask), Some((10_000, 250)));

        book.cancel(1, 100).unwrap();
        assert_eq!(book.top_of_book(Side::Ask), Some((10_000, 150)));
        book.assert_invariants();
    }

    #[test]
    fn bid_side_is_symmetric() {
        let mut book = OrderBook::new();
        book.add_order(1, Side::Bid, 10_000, 100).unwrap();
        book.add_order(2, Side::Bid, 10_100, 200).unwrap();
        book.add_order(3, Side::Bid, 9_900, 300).unwrap();

        assert_eq!(book.top_of_book(Side::Bid), Some((10_100, 200)));
        assert_eq!(
            book.snapshot_top_k(Side::Bid, 3),
            vec![
                PriceLevel { px: 10_100, qty: 200 },
                PriceLevel { px: 10_000, qty: 100 },
                PriceLevel { px: 9_900, qty: 300 },
            ]
        );
        book.assert_invariants();
    }

    fn full_ask_top(book: &mut OrderBook) {
        // Prices 10_000, 10_002, .. 10_198: room to insert between levels.
        for i in 0..TOP_LEVELS as u32 {
            ask(book, u64::from(i) + 1, 10_000 + 2 * i, 10);
        }
    }

    #[test]
    fn worse_than_worst_routes_beyond_a_full_top() {
        let mut book = OrderBook::new();
        full_ask_top(&mut book);

        ask(&mut book, 500, 10_199, 1);
        // Top unchanged; the new level went to mid.
        let snap = book.snapshot_top_k(Side::Ask, TOP_LEVELS);
        assert_eq!(snap.len(), TOP_LEVELS);
        assert_eq!(snap.last().map(|l| l.px), Some(10_198));
        book.assert_invariants();
    }

    #[test]
    fn middle_insert_into_a_full_top_evicts_the_worst_level() {
        let mut book = OrderBook::new();
        full_ask_top(&mut book);

        ask(&mut book, 500, 10_001, 5);
        let snap = book.snapshot_top_k(Side::Ask, TOP_LEVELS);
        assert_eq!(snap.len(), TOP_LEVELS);
        assert_eq!(snap[0].px, 10_000);
        assert_eq!(snap[1], PriceLevel { px: 10_001, qty: 5 });
        // The former worst (10_198) was demoted to mid.
        assert_eq!(snap.last().map(|l| l.px), Some(10_196));

        // Cancelling a top order frees capacity; 10_198 promotes back.
        book.delete(99).unwrap(); // order 99 rested at 10_196
        let snap = book.snapshot_top_k(Side::Ask, TOP_LEVELS);
        assert_eq!(snap.last().map(|l| l.px), Some(10_198));
        book.assert_invariants();
    }

    #[test]
    fn front_insert_into_a_full_top_keeps_size_bounded() {
        let mut book = OrderBook::new();
        full_ask_top(&mut book);

        ask(&mut book, 500, 9_998, 7);
        assert_eq!(book.top_of_book(Side::Ask), Some((9_998, 7)));
        assert_eq!(book.snapshot_top_k(Side::Ask, TOP_LEVELS).len(), TOP_LEVELS);
        book.assert_invariants();
    }

    #[test]
    fn deep_orders_stay_reachable_through_the_id_index() {
        let mut book = OrderBook::new();
        // Fill top and mid completely with even prices.
        for i in 0..(2 * TOP_LEVELS) as u32 {
            ask(&mut book, u64::from(i) + 1, 10_000 + 2 * i, 10);
        }
        // Worse than everything: lands in deep.
        ask(&mut book, 9_000, 11_000, 42);
        book.assert_invariants();

        assert!(book.cancel(9_000, 12).unwrap());
        assert!(book.delete(9_000).unwrap());
        assert!(!book.delete(9_000).unwrap());
        book.assert_invariants();
    }

    #[test]
    fn stale_slot_rebinds_by_price_after_ring_shifts() {
        let mut book = OrderBook::new();
        ask(&mut book, 1, 10_000, 100);
        ask(&mut book, 2, 10_004, 200);
        // Middle insert shifts 10_004's physical slot.
        ask(&mut book, 3, 10_002, 50);

        assert!(book.cancel(2, 150).unwrap());
        assert_eq!(
            book.snapshot_top_k(Side::Ask, 3),
            vec![
                PriceLevel { px: 10_000, qty: 100 },
                PriceLevel { px: 10_002, qty: 50 },
                PriceLevel { px: 10_004, qty: 50 },
            ]
        );
        book.assert_invariants();
    }

    #[test]
    fn replace_moves_an_order_to_its_new_price() {
        let mut book = OrderBook::new();
        ask(&mut book, 1, 10_000, 100);
        assert!(book.replace(1, 2, 10_050, 80).unwrap());

        assert_eq!(book.top_of_book(Side::Ask), Some((10_050, 80)));
        assert!(!book.cancel(1, 10).unwrap());
        assert!(book.cancel(2, 30).unwrap());
        book.assert_invariants();
    }

    #[test]
    fn unknown_ids_are_no_ops() {
        let mut book = OrderBook::new();
        assert!(!book.execute(404, 10).unwrap());
        assert!(!book.cancel(404, 10).unwrap());
        assert!(!book.delete(404).unwrap());
        assert!(!book.replace(404, 405, 10_000, 10).unwrap());
        assert_eq!(book.live_orders(), 0);
    }

    #[test]
    fn sweeping_fill_promotes_iteratively_from_mid_and_deep() {
        let mut book = OrderBook::new();
        for i in 0..(2 * TOP_LEVELS + 10) as u32 {
            ask(&mut book, u64::from(i) + 1, 10_000 + i, 1);
        }
        // Clear the first 150 levels.
        let report = book.fill(Side::Bid, 150, 11_000);
        assert_eq!(report.executed, 150);
        assert_eq!(report.levels_cleared, 150);

        let snap = book.snapshot_top_k(Side::Ask, TOP_LEVELS);
        assert_eq!(snap.len(), 60);
        assert_eq!(snap[0].px, 10_150);
        assert_eq!(book.top_of_book(Side::Ask), Some((10_150, 1)));
    }

    #[test]
    fn approx_level_interpolates_on_dense_prices() {
        let mut book = OrderBook::new();
        full_ask_top(&mut book);
        assert_eq!(book.approx_level_for(Side::Ask, 10_000), Some(0));
        assert_eq!(book.approx_level_for(Side::Ask, 10_020), Some(10));
        assert_eq!(book.approx_level_for(Side::Ask, 10_001), None);
    }
}
