//! NetFlow/IPFIX window: traffic tables plus fumble detection.
//!
//! A fumble is traffic that looks like scanning or a failed handshake:
//! a TCP flow with every control flag set (a "christmas tree" scan) or
//! fewer than five packets. ICMP destination-unreachable (type 3) counts
//! against the destination address instead.

use std::net::IpAddr;

use chrono::{DateTime, Utc};

use logeye_core::record::tcp_flags;
use logeye_core::{FlowRecord, NetflowSummary, RecordDetail, SourceType, Summary};

use super::Accumulator;
use crate::services::{service_name, TCP};
use crate::topn::FrequencyTable;

const FUMBLE_PACKET_LIMIT: u64 = 5;
const ICMP_DEST_UNREACHABLE: u8 = 3;

/// Address that a fumbling flow should be charged to, if any.
pub fn is_fumble(flow: &FlowRecord) -> Option<IpAddr> {
    if flow.protocol == TCP {
        let all_flags = flow.tcp_flags & tcp_flags::ALL == tcp_flags::ALL;
        if all_flags || flow.packets < FUMBLE_PACKET_LIMIT {
            return Some(flow.src);
        }
        return None;
    }
    match flow.icmp_type() {
        Some(ICMP_DEST_UNREACHABLE) => Some(flow.dst),
        _ => None,
    }
}

fn is_global_unicast(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_unspecified()
                || v4.is_loopback()
                || v4.is_multicast()
                || v4.is_link_local()
                || v4.is_broadcast())
        }
        IpAddr::V6(v6) => {
            let link_local = (v6.segments()[0] & 0xffc0) == 0xfe80;
            !(v6.is_unspecified() || v6.is_loopback() || v6.is_multicast() || link_local)
        }
    }
}

fn sort_key(ip: &IpAddr) -> (bool, u8, u128) {
    match ip {
        IpAddr::V4(v4) => (!is_global_unicast(ip), 4, u32::from(*v4) as u128),
        IpAddr::V6(v6) => (!is_global_unicast(ip), 6, u128::from(*v6)),
    }
}

/// Direction-independent key for a flow between two addresses. The
/// globally routable, numerically smaller address comes first, so A→B and
/// B→A land on the same entry.
pub fn flow_key(a: &IpAddr, b: &IpAddr) -> String {
    let (first, second) = if sort_key(a) <= sort_key(b) { (a, b) } else { (b, a) };
    format!("{} <-> {}", first, second)
}

/// Tables ranked both by packets and by bytes.
#[derive(Debug, Default)]
struct TrafficTable {
    packets: FrequencyTable,
    bytes: FrequencyTable,
}

impl TrafficTable {
    fn add(&mut self, key: &str, packets: u64, bytes: u64) {
        self.packets.add(key, packets);
        self.bytes.add(key, bytes);
    }

    fn distinct(&self) -> u64 {
        self.packets.distinct()
    }
}

#[derive(Debug, Default)]
pub struct NetflowAccumulator {
    packets: u64,
    bytes: u64,
    macs: TrafficTable,
    ips: TrafficTable,
    flows: TrafficTable,
    protocols: TrafficTable,
    fumble_src: FrequencyTable,
}

impl NetflowAccumulator {
    fn update_flow(&mut self, flow: &FlowRecord) {
        let (packets, bytes) = (flow.packets, flow.bytes);
        self.packets = self.packets.saturating_add(packets);
        self.bytes = self.bytes.saturating_add(bytes);

        for mac in [&flow.src_mac, &flow.dst_mac].into_iter().flatten() {
            if !mac.is_empty() {
                self.macs.add(mac, packets, bytes);
            }
        }
        self.ips.add(&flow.src.to_string(), packets, bytes);
        self.ips.add(&flow.dst.to_string(), packets, bytes);
        self.flows.add(&flow_key(&flow.src, &flow.dst), packets, bytes);
        self.protocols.add(
            &service_name(flow.protocol, flow.src_port, flow.dst_port),
            packets,
            bytes,
        );

        if let Some(addr) = is_fumble(flow) {
            self.fumble_src.increment(addr.to_string());
        }
    }
}

impl Accumulator for NetflowAccumulator {
    fn source_type(&self) -> SourceType {
        SourceType::Netflow
    }

    fn update(&mut self, detail: &RecordDetail) {
        if let RecordDetail::Netflow(flow) = detail {
            self.update_flow(flow);
        }
    }

    fn flush(&mut self, time: DateTime<Utc>, top_n: usize) -> Summary {
        let summary = NetflowSummary {
            time,
            packets: self.packets,
            bytes: self.bytes,
            macs: self.macs.distinct(),
            ips: self.ips.distinct(),
            flows: self.flows.distinct(),
            protocols: self.protocols.distinct(),
            fumbles: self.fumble_src.distinct(),
            top_mac_packets: self.macs.packets.top(top_n),
            top_mac_bytes: self.macs.bytes.top(top_n),
            top_ip_packets: self.ips.packets.top(top_n),
            top_ip_bytes: self.ips.bytes.top(top_n),
            top_flow_packets: self.flows.packets.top(top_n),
            top_flow_bytes: self.flows.bytes.top(top_n),
            top_protocol_packets: self.protocols.packets.top(top_n),
            top_protocol_bytes: self.protocols.bytes.top(top_n),
            top_fumble_src: self.fumble_src.top(top_n),
        };
        *self = Self::default();
        Summary::Netflow(summary)
    }
}
