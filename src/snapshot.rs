// src/snapshot.rs
use bytes::Bytes;
use itoa::Buffer;

use crate::book::PriceLevel;

#[inline(always)]
fn push_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
}

#[inline(always)]
fn push_u64(out: &mut Vec<u8>, buf: &mut Buffer, v: u64) {
    push_str(out, buf.format(v));
}

#[inline(always)]
fn push_side(out: &mut Vec<u8>, buf: &mut Buffer, px_key: &str, qty_key: &str, v: Option<(u32, u64)>) {
    push_str(out, px_key);
    match v {
        Some((px, qty)) => {
            push_u64(out, buf, u64::from(px));
            push_str(out, qty_key);
            push_u64(out, buf, qty);
        }
        None => {
            push_str(out, "null");
            push_str(out, qty_key);
            push_str(out, "0");
        }
    }
}

pub fn encode_top(
    locate: u16,
    bid: Option<(u32, u64)>,
    ask: Option<(u32, u64)>,
) -> Bytes {
    let mut out = Vec::with_capacity(128);
    let mut b = Buffer::new();

    push_str(&mut out, "{\"type\":\"top\",\"locate\":");
    push_u64(&mut out, &mut b, u64::from(locate));

    push_side(&mut out, &mut b, ",\"bid_px\":", ",\"bid_qty\":", bid);
    push_side(&mut out, &mut b, ",\"ask_px\":", ",\"ask_qty\":", ask);

    out.push(b'}');
    Bytes::from(out)
}

pub fn encode_book(
    ticker: &str,
    locate: u16,
    bids: &[PriceLevel],
    asks: &[PriceLevel],
) -> Bytes {
    let mut out = Vec::with_capacity(96 + (bids.len() + asks.len()) * 28);
    let mut b = Buffer::new();

    push_str(&mut out, "{\"type\":\"book\",\"ticker\":\"");
    push_str(&mut out, ticker);
    push_str(&mut out, "\",\"locate\":");
    push_u64(&mut out, &mut b, u64::from(locate));

    push_str(&mut out, ",\"bids\":[");
    for (i, lv) in bids.iter().enumerate() {
        if i != 0 {
            out.push(b',');
        }
        push_str(&mut out, "{\"px\":");
        push_u64(&mut out, &mut b, u64::from(lv.px));
        push_str(&mut out, ",\"qty\":");
        push_u64(&mut out, &mut b, lv.qty);
        out.push(b'}');
    }

    push_str(&mut out, "],\"asks\":[");
    for (i, lv) in asks.iter().enumerate() {
        if i != 0 {
            out.push(b',');
        }
        push_str(&mut out, "{\"px\":");
        push_u64(&mut out, &mut b, u64::from(lv.px));
        push_str(&mut out, ",\"qty\":");
        push_u64(&mut out, &mut b, lv.qty);
        out.push(b'}');
    }

    push_str(&mut out, "]}");
    Bytes::from(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_line_is_valid_json() {
        let line = encode_top(7, Some((100_000, 10)), None);
        let v: serde_json::Value = serde_json::from_slice(&line).unwrap();
        assert_eq!(v["type"], "top");
        assert_eq!(v["locate"], 7);
        assert_eq!(v["bid_px"], 100_000);
        assert_eq!(v["bid_qty"], 10);
        assert!(v["ask_px"].is_null());
        assert_eq!(v["ask_qty"], 0);
    }

    #[test]
    fn book_line_lists_levels_in_order() {
        let bids = vec![PriceLevel { px: 100_000, qty: 10 }, PriceLevel { px: 99_900, qty: 4 }];
        let asks = vec![PriceLevel { px: 100_100, qty: 6 }];
        let line = encode_book("TEST", 7, &bids, &asks);
        let v: serde_json::Value = serde_json::from_slice(&line).unwrap();
        assert_eq!(v["ticker"], "TEST");
        assert_eq!(v["bids"][0]["px"], 100_000);
        assert_eq!(v["bids"][1]["qty"], 4);
        assert_eq!(v["asks"][0]["px"], 100_100);
    }
}
