//! Attribute → entry mapper (C2): turns a parsed `RouteMessage` into a
//! family-specific [`RouteEntryV4`]/[`RouteEntryV6`].

use std::net::{Ipv4Addr, Ipv6Addr};

use netlink_packet_route::route::{RouteAddress, RouteAttribute, RouteMessage, RouteType};

use crate::route::entry::{RouteEntryV4, RouteEntryV6, RouteKind};

fn route_kind(kind: RouteType) -> RouteKind {
    match kind {
        RouteType::Unicast => RouteKind::Unicast,
        RouteType::Local => RouteKind::Local,
        RouteType::Broadcast => RouteKind::Broadcast,
        RouteType::Anycast => RouteKind::Anycast,
        RouteType::Multicast => RouteKind::Multicast,
        RouteType::Unreachable => RouteKind::Unreachable,
        other => RouteKind::Other(u8::from(other)),
    }
}

/// Maps a v4 `RouteMessage` into a zeroed [`RouteEntryV4`] with attributes filled
/// in where present, else the "any" sentinel. Mirrors `m46e_set_route_info`.
pub fn from_v4_message(msg: &RouteMessage) -> RouteEntryV4 {
    let mut entry = RouteEntryV4 {
        kind: route_kind(msg.header.kind),
        dst: Ipv4Addr::UNSPECIFIED,
        prefix_len: msg.header.destination_prefix_length,
        src: Ipv4Addr::UNSPECIFIED,
        gateway: Ipv4Addr::UNSPECIFIED,
        out_if_index: 0,
        priority: 0,
        sync: false,
    };

    for attr in &msg.attributes {
        match attr {
            RouteAttribute::Destination(RouteAddress::Inet(a)) => entry.dst = *a,
            RouteAttribute::PrefSource(RouteAddress::Inet(a)) => entry.src = *a,
            RouteAttribute::Gateway(RouteAddress::Inet(a)) => entry.gateway = *a,
            RouteAttribute::Oif(oif) => entry.out_if_index = *oif,
            RouteAttribute::Priority(p) => entry.priority = *p,
            _ => {}
        }
    }

    entry
}

/// Maps a v6 `RouteMessage` into a zeroed [`RouteEntryV6`]. Mirrors `m46e_set_route_info`.
pub fn from_v6_message(msg: &RouteMessage) -> RouteEntryV6 {
    let mut entry = RouteEntryV6 {
        kind: route_kind(msg.header.kind),
        dst: Ipv6Addr::UNSPECIFIED,
        prefix_len: msg.header.destination_prefix_length,
        src: Ipv6Addr::UNSPECIFIED,
        gateway: Ipv6Addr::UNSPECIFIED,
        out_if_index: 0,
        priority: 0,
        sync: false,
    };

    for attr in &msg.attributes {
        match attr {
            RouteAttribute::Destination(RouteAddress::Inet6(a)) => entry.dst = *a,
            RouteAttribute::PrefSource(RouteAddress::Inet6(a)) => entry.src = *a,
            RouteAttribute::Gateway(RouteAddress::Inet6(a)) => entry.gateway = *a,
            RouteAttribute::Oif(oif) => entry.out_if_index = *oif,
            RouteAttribute::Priority(p) => entry.priority = *p,
            _ => {}
        }
    }

    entry
}
