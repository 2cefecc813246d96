//! Captive-portal DNS answer codec.
//!
//! Every query is answered with the portal's own address so that any
//! hostname a client resolves lands on the configuration page. The codec
//! is pure: the firmware feeds it raw UDP payloads and sends back whatever
//! it returns.

use std::net::Ipv4Addr;

const FLAG_RESPONSE: u16 = 0x8000;
// Response, recursion desired + available, no error.
const RESPONSE_FLAGS: u16 = 0x8180;
const TYPE_A: u16 = 1;
const CLASS_IN: u16 = 1;
const ANSWER_TTL: u32 = 60;

/// Build a response for a single DNS query packet, pointing the name at
/// `portal_ip`. Returns `None` for packets that are not well-formed
/// queries (truncated, already a response, or without a question).
pub fn answer_query(query: &[u8], portal_ip: Ipv4Addr) -> Option<Vec<u8>> {
    if query.len() < 12 {
        return None;
    }
    let flags = u16::from_be_bytes([query[2], query[3]]);
    if flags & FLAG_RESPONSE != 0 {
        return None;
    }
    let qdcount = u16::from_be_bytes([query[4], query[5]]);
    if qdcount == 0 {
        return None;
    }

    // Walk the first question name. Queries carry literal labels; a
    // compression pointer here means a malformed packet.
    let mut pos = 12;
    loop {
        let len = *query.get(pos)? as usize;
        if len == 0 {
            pos += 1;
            break;
        }
        if len > 63 {
            return None;
        }
        pos += 1 + len;
        if pos >= query.len() {
            return None;
        }
    }
    let question_end = pos + 4; // qtype + qclass
    if query.len() < question_end {
        return None;
    }

    let mut out = Vec::with_capacity(question_end + 16);
    out.extend_from_slice(&query[..2]); // transaction id
    out.extend_from_slice(&RESPONSE_FLAGS.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes()); // questions
    out.extend_from_slice(&1u16.to_be_bytes()); // answers
    out.extend_from_slice(&0u16.to_be_bytes()); // authority
    out.extend_from_slice(&0u16.to_be_bytes()); // additional
    out.extend_from_slice(&query[12..question_end]);
    out.extend_from_slice(&[0xC0, 0x0C]); // pointer back to the question name
    out.extend_from_slice(&TYPE_A.to_be_bytes());
    out.extend_from_slice(&CLASS_IN.to_be_bytes());
    out.extend_from_slice(&ANSWER_TTL.to_be_bytes());
    out.extend_from_slice(&4u16.to_be_bytes());
    out.extend_from_slice(&portal_ip.octets());
    Some(out)
}
