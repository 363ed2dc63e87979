// src/itch.rs
//! ITCH 5.0 message type tags, decoded record structs, and the broadcast
//! envelope. Records are `#[repr(C, packed)]` so their byte image can be
//! copied into an envelope payload and reinterpreted on the consumer side
//! without allocation.

use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// Payload capacity of one broadcast envelope. Every decoded record fits.
pub const MAX_PAYLOAD: usize = 64;

/// Message type bytes as they appear at payload offset 0.
pub mod tag {
    pub const SYSTEM_EVENT: u8 = b'S';
    pub const STOCK_DIRECTORY: u8 = b'R';
    pub const STOCK_TRADING_ACTION: u8 = b'H';
    pub const REG_SHO_RESTRICTION: u8 = b'Y';
    pub const MARKET_PARTICIPANT_POSITION: u8 = b'L';
    pub const MWCB_DECLINE_LEVEL: u8 = b'V';
    pub const MWCB_STATUS: u8 = b'W';
    pub const IPO_QUOTING_PERIOD: u8 = b'K';
    pub const LULD_AUCTION_COLLAR: u8 = b'J';
    pub const OPERATIONAL_HALT: u8 = b'h';
    pub const ADD_ORDER: u8 = b'A';
    pub const ADD_ORDER_MPID: u8 = b'F';
    pub const ORDER_EXECUTED: u8 = b'E';
    pub const ORDER_EXECUTED_WITH_PRICE: u8 = b'C';
    pub const ORDER_CANCEL: u8 = b'X';
    pub const ORDER_DELETE: u8 = b'D';
    pub const ORDER_REPLACE: u8 = b'U';
    pub const TRADE: u8 = b'P';
    pub const CROSS_TRADE: u8 = b'Q';
    pub const BROKEN_TRADE: u8 = b'B';
    pub const NOII: u8 = b'I';
    pub const RETAIL_INTEREST: u8 = b'N';
    pub const DIRECT_LISTING: u8 = b'O';
}

pub const SIDE_BUY: u8 = b'B';
pub const SIDE_SELL: u8 = b'S';

/// Wire size in bytes of a message payload (type byte included), or `None`
/// for an unknown tag.
pub const fn wire_len(t: u8) -> Option<usize> {
    Some(match t {
        tag::SYSTEM_EVENT => 12,
        tag::STOCK_DIRECTORY => 39,
        tag::STOCK_TRADING_ACTION => 25,
        tag::REG_SHO_RESTRICTION => 20,
        tag::MARKET_PARTICIPANT_POSITION => 26,
        tag::MWCB_DECLINE_LEVEL => 35,
        tag::MWCB_STATUS => 12,
        tag::IPO_QUOTING_PERIOD => 28,
        tag::LULD_AUCTION_COLLAR => 35,
        tag::OPERATIONAL_HALT => 21,
        tag::ADD_ORDER => 36,
        tag::ADD_ORDER_MPID => 40,
        tag::ORDER_EXECUTED => 23,
        tag::ORDER_EXECUTED_WITH_PRICE => 27,
        tag::ORDER_CANCEL => 23,
        tag::ORDER_DELETE => 19,
        tag::ORDER_REPLACE => 35,
        tag::TRADE => 44,
        tag::CROSS_TRADE => 39,
        tag::BROKEN_TRADE => 19,
        tag::NOII => 50,
        tag::RETAIL_INTEREST => 20,
        tag::DIRECT_LISTING => 48,
        _ => return None,
    })
}

pub const fn kind_name(t: u8) -> Option<&'static str> {
    Some(match t {
        tag::SYSTEM_EVENT => "SystemEvent",
        tag::STOCK_DIRECTORY => "StockDirectory",
        tag::STOCK_TRADING_ACTION => "StockTradingAction",
        tag::REG_SHO_RESTRICTION => "RegSHORestriction",
        tag::MARKET_PARTICIPANT_POSITION => "MarketParticipantPosition",
        tag::MWCB_DECLINE_LEVEL => "MWCBDeclineLevel",
        tag::MWCB_STATUS => "MWCBStatus",
        tag::IPO_QUOTING_PERIOD => "IPOQuotingPeriodUpdate",
        tag::LULD_AUCTION_COLLAR => "LULDAuctionCollar",
        tag::OPERATIONAL_HALT => "OperationalHalt",
        tag::ADD_ORDER => "AddOrder",
        tag::ADD_ORDER_MPID => "AddOrderWithMPID",
        tag::ORDER_EXECUTED => "OrderExecuted",
        tag::ORDER_EXECUTED_WITH_PRICE => "OrderExecutedWithPrice",
        tag::ORDER_CANCEL => "OrderCancel",
        tag::ORDER_DELETE => "OrderDelete",
        tag::ORDER_REPLACE => "OrderReplace",
        tag::TRADE => "Trade",
        tag::CROSS_TRADE => "CrossTrade",
        tag::BROKEN_TRADE => "BrokenTrade",
        tag::NOII => "NetOrderImbalanceIndicator",
        tag::RETAIL_INTEREST => "RetailInterest",
        tag::DIRECT_LISTING => "DirectListingPriceDiscovery",
        _ => return None,
    })
}

/// Trim the right-padded spaces from an 8-byte ticker field.
#[inline]
pub fn trim_ticker(t: &[u8; 8]) -> &str {
    let end = t.iter().position(|&b| b == b' ').unwrap_or(8);
    std::str::from_utf8(&t[..end]).unwrap_or("")
}

// ---------------------------------------------------------------------------
// Big-endian field readers. Timestamps are 48-bit nanoseconds since midnight,
// zero-extended to 64 bits. Offsets are fixed per message kind; callers must
// hand in a slice of at least the kind's wire length.

#[inline(always)]
fn be_u16(p: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([p[off], p[off + 1]])
}

#[inline(always)]
fn be_u32(p: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([p[off], p[off + 1], p[off + 2], p[off + 3]])
}

#[inline(always)]
fn be_u48(p: &[u8], off: usize) -> u64 {
    (u64::from(be_u16(p, off)) << 32) | u64::from(be_u32(p, off + 2))
}

#[inline(always)]
fn be_u64(p: &[u8], off: usize) -> u64 {
    u64::from_be_bytes([
        p[off],
        p[off + 1],
        p[off + 2],
        p[off + 3],
        p[off + 4],
        p[off + 5],
        p[off + 6],
        p[off + 7],
    ])
}

#[inline(always)]
fn bytes4(p: &[u8], off: usize) -> [u8; 4] {
    [p[off], p[off + 1], p[off + 2], p[off + 3]]
}

#[inline(always)]
fn bytes8(p: &[u8], off: usize) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&p[off..off + 8]);
    out
}

#[inline(always)]
fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

#[inline(always)]
fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

#[inline(always)]
fn put_u48(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_be_bytes()[2..]);
}

#[inline(always)]
fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// Every message starts with type(1) locate(2) tracking(2) timestamp(6).
#[inline(always)]
fn read_header(p: &[u8]) -> (u8, u16, u16, u64) {
    (p[0], be_u16(p, 1), be_u16(p, 3), be_u48(p, 5))
}

#[inline(always)]
fn put_header(out: &mut Vec<u8>, kind: u8, locate: u16, tracking: u16, ts: u64) {
    out.push(kind);
    put_u16(out, locate);
    put_u16(out, tracking);
    put_u48(out, ts);
}

// ---------------------------------------------------------------------------
// Decoded records. One struct per message kind; `parse` reads exactly the
// documented fields and never consults the record length.

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct SystemEvent {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub event_code: u8,
}

impl SystemEvent {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self { kind, locate, tracking, ts, event_code: p[11] }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        out.push(self.event_code);
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct StockDirectory {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub ticker: [u8; 8],
    pub market_category: u8,
    pub financial_status: u8,
    pub round_lot_size: u32,
    pub round_lots_only: u8,
    pub issue_classification: u8,
    pub issue_subtype: [u8; 2],
    pub authenticity: u8,
    pub short_sale_threshold: u8,
    pub ipo_flag: u8,
    pub luld_tier: u8,
    pub etp_flag: u8,
    pub etp_leverage: u32,
    pub inverse: u8,
}

impl StockDirectory {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self {
            kind,
            locate,
            tracking,
            ts,
            ticker: bytes8(p, 11),
            market_category: p[19],
            financial_status: p[20],
            round_lot_size: be_u32(p, 21),
            round_lots_only: p[25],
            issue_classification: p[26],
            issue_subtype: [p[27], p[28]],
            authenticity: p[29],
            short_sale_threshold: p[30],
            ipo_flag: p[31],
            luld_tier: p[32],
            etp_flag: p[33],
            etp_leverage: be_u32(p, 34),
            inverse: p[38],
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        out.extend_from_slice(&self.ticker);
        out.push(self.market_category);
        out.push(self.financial_status);
        put_u32(out, self.round_lot_size);
        out.push(self.round_lots_only);
        out.push(self.issue_classification);
        out.extend_from_slice(&self.issue_subtype);
        out.push(self.authenticity);
        out.push(self.short_sale_threshold);
        out.push(self.ipo_flag);
        out.push(self.luld_tier);
        out.push(self.etp_flag);
        put_u32(out, self.etp_leverage);
        out.push(self.inverse);
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct StockTradingAction {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub ticker: [u8; 8],
    pub trading_state: u8,
    pub reserved: u8,
    pub reason: [u8; 4],
}

impl StockTradingAction {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self {
            kind,
            locate,
            tracking,
            ts,
            ticker: bytes8(p, 11),
            trading_state: p[19],
            reserved: p[20],
            reason: bytes4(p, 21),
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        out.extend_from_slice(&self.ticker);
        out.push(self.trading_state);
        out.push(self.reserved);
        out.extend_from_slice(&self.reason);
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct RegShoRestriction {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub ticker: [u8; 8],
    pub action: u8,
}

impl RegShoRestriction {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self { kind, locate, tracking, ts, ticker: bytes8(p, 11), action: p[19] }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        out.extend_from_slice(&self.ticker);
        out.push(self.action);
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct MarketParticipantPosition {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub mpid: [u8; 4],
    pub ticker: [u8; 8],
    pub primary_market_maker: u8,
    pub market_maker_mode: u8,
    pub participant_state: u8,
}

impl MarketParticipantPosition {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self {
            kind,
            locate,
            tracking,
            ts,
            mpid: bytes4(p, 11),
            ticker: bytes8(p, 15),
            primary_market_maker: p[23],
            market_maker_mode: p[24],
            participant_state: p[25],
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        out.extend_from_slice(&self.mpid);
        out.extend_from_slice(&self.ticker);
        out.push(self.primary_market_maker);
        out.push(self.market_maker_mode);
        out.push(self.participant_state);
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct MwcbDeclineLevel {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub level1: u64,
    pub level2: u64,
    pub level3: u64,
}

impl MwcbDeclineLevel {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self {
            kind,
            locate,
            tracking,
            ts,
            level1: be_u64(p, 11),
            level2: be_u64(p, 19),
            level3: be_u64(p, 27),
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        put_u64(out, self.level1);
        put_u64(out, self.level2);
        put_u64(out, self.level3);
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct MwcbStatus {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub breached_level: u8,
}

impl MwcbStatus {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self { kind, locate, tracking, ts, breached_level: p[11] }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        out.push(self.breached_level);
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct IpoQuotingPeriodUpdate {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub ticker: [u8; 8],
    pub release_time: u32,
    pub release_qualifier: u8,
    pub price: u32,
}

impl IpoQuotingPeriodUpdate {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self {
            kind,
            locate,
            tracking,
            ts,
            ticker: bytes8(p, 11),
            release_time: be_u32(p, 19),
            release_qualifier: p[23],
            price: be_u32(p, 24),
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        out.extend_from_slice(&self.ticker);
        put_u32(out, self.release_time);
        out.push(self.release_qualifier);
        put_u32(out, self.price);
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct LuldAuctionCollar {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub ticker: [u8; 8],
    pub reference_price: u32,
    pub upper_price: u32,
    pub lower_price: u32,
    pub extension: u32,
}

impl LuldAuctionCollar {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self {
            kind,
            locate,
            tracking,
            ts,
            ticker: bytes8(p, 11),
            reference_price: be_u32(p, 19),
            upper_price: be_u32(p, 23),
            lower_price: be_u32(p, 27),
            extension: be_u32(p, 31),
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        out.extend_from_slice(&self.ticker);
        put_u32(out, self.reference_price);
        put_u32(out, self.upper_price);
        put_u32(out, self.lower_price);
        put_u32(out, self.extension);
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct OperationalHalt {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub ticker: [u8; 8],
    pub market_code: u8,
    pub action: u8,
}

impl OperationalHalt {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self {
            kind,
            locate,
            tracking,
            ts,
            ticker: bytes8(p, 11),
            market_code: p[19],
            action: p[20],
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        out.extend_from_slice(&self.ticker);
        out.push(self.market_code);
        out.push(self.action);
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct AddOrder {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub order_id: u64,
    pub side: u8,
    pub qty: u32,
    pub ticker: [u8; 8],
    pub price: u32,
}

impl AddOrder {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self {
            kind,
            locate,
            tracking,
            ts,
            order_id: be_u64(p, 11),
            side: p[19],
            qty: be_u32(p, 20),
            ticker: bytes8(p, 24),
            price: be_u32(p, 32),
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        put_u64(out, self.order_id);
        out.push(self.side);
        put_u32(out, self.qty);
        out.extend_from_slice(&self.ticker);
        put_u32(out, self.price);
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct AddOrderMpid {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub order_id: u64,
    pub side: u8,
    pub qty: u32,
    pub ticker: [u8; 8],
    pub price: u32,
    pub mpid: [u8; 4],
}

impl AddOrderMpid {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self {
            kind,
            locate,
            tracking,
            ts,
            order_id: be_u64(p, 11),
            side: p[19],
            qty: be_u32(p, 20),
            ticker: bytes8(p, 24),
            price: be_u32(p, 32),
            mpid: bytes4(p, 36),
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        put_u64(out, self.order_id);
        out.push(self.side);
        put_u32(out, self.qty);
        out.extend_from_slice(&self.ticker);
        put_u32(out, self.price);
        out.extend_from_slice(&self.mpid);
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct OrderExecuted {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub order_id: u64,
    pub executed_qty: u32,
}

impl OrderExecuted {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self { kind, locate, tracking, ts, order_id: be_u64(p, 11), executed_qty: be_u32(p, 19) }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        put_u64(out, self.order_id);
        put_u32(out, self.executed_qty);
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct OrderExecutedWithPrice {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub order_id: u64,
    pub executed_qty: u32,
    pub executed_price: u32,
}

impl OrderExecutedWithPrice {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self {
            kind,
            locate,
            tracking,
            ts,
            order_id: be_u64(p, 11),
            executed_qty: be_u32(p, 19),
            executed_price: be_u32(p, 23),
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        put_u64(out, self.order_id);
        put_u32(out, self.executed_qty);
        put_u32(out, self.executed_price);
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct OrderCancel {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub order_id: u64,
    pub cancelled_qty: u32,
}

impl OrderCancel {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self { kind, locate, tracking, ts, order_id: be_u64(p, 11), cancelled_qty: be_u32(p, 19) }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        put_u64(out, self.order_id);
        put_u32(out, self.cancelled_qty);
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct OrderDelete {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub order_id: u64,
}

impl OrderDelete {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self { kind, locate, tracking, ts, order_id: be_u64(p, 11) }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        put_u64(out, self.order_id);
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct OrderReplace {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub old_order_id: u64,
    pub new_order_id: u64,
    pub qty: u32,
    pub price: u32,
}

impl OrderReplace {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self {
            kind,
            locate,
            tracking,
            ts,
            old_order_id: be_u64(p, 11),
            new_order_id: be_u64(p, 19),
            qty: be_u32(p, 27),
            price: be_u32(p, 31),
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        put_u64(out, self.old_order_id);
        put_u64(out, self.new_order_id);
        put_u32(out, self.qty);
        put_u32(out, self.price);
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct Trade {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub order_id: u64,
    pub side: u8,
    pub qty: u32,
    pub ticker: [u8; 8],
    pub price: u32,
    pub match_id: u64,
}

impl Trade {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self {
            kind,
            locate,
            tracking,
            ts,
            order_id: be_u64(p, 11),
            side: p[19],
            qty: be_u32(p, 20),
            ticker: bytes8(p, 24),
            price: be_u32(p, 32),
            match_id: be_u64(p, 36),
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        put_u64(out, self.order_id);
        out.push(self.side);
        put_u32(out, self.qty);
        out.extend_from_slice(&self.ticker);
        put_u32(out, self.price);
        put_u64(out, self.match_id);
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct CrossTrade {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub qty: u64,
    pub ticker: [u8; 8],
    pub cross_price: u32,
    pub match_id: u64,
}

impl CrossTrade {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self {
            kind,
            locate,
            tracking,
            ts,
            qty: be_u64(p, 11),
            ticker: bytes8(p, 19),
            cross_price: be_u32(p, 27),
            match_id: be_u64(p, 31),
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        put_u64(out, self.qty);
        out.extend_from_slice(&self.ticker);
        put_u32(out, self.cross_price);
        put_u64(out, self.match_id);
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct BrokenTrade {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub match_id: u64,
}

impl BrokenTrade {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self { kind, locate, tracking, ts, match_id: be_u64(p, 11) }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        put_u64(out, self.match_id);
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct Noii {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub paired_shares: u64,
    pub imbalance_shares: u64,
    pub imbalance_direction: u8,
    pub ticker: [u8; 8],
    pub far_price: u32,
    pub near_price: u32,
    pub current_reference_price: u32,
    pub cross_type: u8,
    pub price_variation: u8,
}

impl Noii {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self {
            kind,
            locate,
            tracking,
            ts,
            paired_shares: be_u64(p, 11),
            imbalance_shares: be_u64(p, 19),
            imbalance_direction: p[27],
            ticker: bytes8(p, 28),
            far_price: be_u32(p, 36),
            near_price: be_u32(p, 40),
            current_reference_price: be_u32(p, 44),
            cross_type: p[48],
            price_variation: p[49],
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        put_u64(out, self.paired_shares);
        put_u64(out, self.imbalance_shares);
        out.push(self.imbalance_direction);
        out.extend_from_slice(&self.ticker);
        put_u32(out, self.far_price);
        put_u32(out, self.near_price);
        put_u32(out, self.current_reference_price);
        out.push(self.cross_type);
        out.push(self.price_variation);
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct RetailInterest {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub ticker: [u8; 8],
    pub interest_flag: u8,
}

impl RetailInterest {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self { kind, locate, tracking, ts, ticker: bytes8(p, 11), interest_flag: p[19] }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        out.extend_from_slice(&self.ticker);
        out.push(self.interest_flag);
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct DirectListing {
    pub kind: u8,
    pub locate: u16,
    pub tracking: u16,
    pub ts: u64,
    pub ticker: [u8; 8],
    pub open_eligibility: u8,
    pub min_allowable_price: u32,
    pub max_allowable_price: u32,
    pub near_execution_price: u32,
    pub near_execution_time: u64,
    pub lower_price_collar: u32,
    pub upper_price_collar: u32,
}

impl DirectListing {
    pub fn parse(p: &[u8]) -> Self {
        let (kind, locate, tracking, ts) = read_header(p);
        Self {
            kind,
            locate,
            tracking,
            ts,
            ticker: bytes8(p, 11),
            open_eligibility: p[19],
            min_allowable_price: be_u32(p, 20),
            max_allowable_price: be_u32(p, 24),
            near_execution_price: be_u32(p, 28),
            near_execution_time: be_u64(p, 32),
            lower_price_collar: be_u32(p, 40),
            upper_price_collar: be_u32(p, 44),
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        put_header(out, self.kind, self.locate, self.tracking, self.ts);
        out.extend_from_slice(&self.ticker);
        out.push(self.open_eligibility);
        put_u32(out, self.min_allowable_price);
        put_u32(out, self.max_allowable_price);
        put_u32(out, self.near_execution_price);
        put_u64(out, self.near_execution_time);
        put_u32(out, self.lower_price_collar);
        put_u32(out, self.upper_price_collar);
    }
}

// Every record must fit one envelope payload.
const _: () = assert!(std::mem::size_of::<StockDirectory>() <= MAX_PAYLOAD);
const _: () = assert!(std::mem::size_of::<AddOrderMpid>() <= MAX_PAYLOAD);
const _: () = assert!(std::mem::size_of::<Trade>() <= MAX_PAYLOAD);
const _: () = assert!(std::mem::size_of::<Noii>() <= MAX_PAYLOAD);
const _: () = assert!(std::mem::size_of::<DirectListing>() <= MAX_PAYLOAD);

/// Fixed-width carrier of one decoded record through the broadcast queue.
///
/// Self-describing: `tag` selects how a consumer interprets the payload, and
/// the payload's first byte repeats the tag (records lead with their `kind`
/// byte).
#[derive(Clone, Copy)]
pub struct Envelope {
    tag: u8,
    len: u16,
    payload: [u8; MAX_PAYLOAD],
}

impl Envelope {
    #[inline]
    pub fn pack<T: AsBytes>(tag: u8, record: &T) -> Self {
        let bytes = record.as_bytes();
        debug_assert!(bytes.len() <= MAX_PAYLOAD);
        let mut payload = [0u8; MAX_PAYLOAD];
        payload[..bytes.len()].copy_from_slice(bytes);
        Self { tag, len: bytes.len() as u16, payload }
    }

    #[inline]
    pub fn tag(&self) -> u8 {
        self.tag
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.len as usize]
    }

    /// Reinterpret the payload as a record of type `T`. Returns `None` when
    /// the payload length does not match `T`.
    #[inline]
    pub fn record<T: FromBytes>(&self) -> Option<&T> {
        T::ref_from(self.payload())
    }
}
