//! Observable dumps (CLI "show"): textual route and PMTU tables.
//!
//! Column layout grounded on `m46eapp_mng_v4_route.c`/`m46eapp_mng_v6_route.c`'s
//! `m46e_print_route`/`m46e_print_route6`/`m46e_route_print_v4table` and
//! `m46eapp_pmtudisc.c`'s PMTU table printer.

use std::fmt::Write as _;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::ifname::ifindex_to_name;
use crate::pmtu::PmtuCache;
use crate::route::{RouteEntryV4, RouteEntryV6, RouteTable};

const V4_HEADER: &str =
    "-----+---------------+------------------+---------------+---------------+-----+--------------------\n Sync|  Route  Type  | Dist v4 Addr/mask|   Gateway     | Src v4 addr   | Pri | Device name(index) \n-----+---------------+------------------+---------------+---------------+-----+--------------------";

const V6_HEADER: &str =
    "-----+-------------+--------------------------------------------+----------------------------------------+----------------------------------------+-----+--------------------\n Sync| Route Type  |   Dist v6 Addr/mask                        |     Gateway                            |   Src v6 addr                          | Pri | Device name(index) \n-----+-------------+--------------------------------------------+----------------------------------------+----------------------------------------+-----+--------------------";

fn sync_flag(sync: bool) -> &'static str {
    if sync {
        "  *  "
    } else {
        "     "
    }
}

fn priority_column(priority: u32) -> String {
    if priority != 0 {
        format!("{priority:>5}")
    } else {
        "     ".to_string()
    }
}

fn device_column(ifindex: u32) -> String {
    format!("{}({})", ifindex_to_name(ifindex), ifindex)
}

fn v4_row(out: &mut String, e: &RouteEntryV4) {
    let dst = if e.dst != Ipv4Addr::UNSPECIFIED {
        format!("{}/{}", e.dst, e.prefix_len)
    } else {
        "0.0.0.0/0".to_string()
    };
    let gw = if e.gateway != Ipv4Addr::UNSPECIFIED {
        e.gateway.to_string()
    } else {
        String::new()
    };
    let src = if e.src != Ipv4Addr::UNSPECIFIED {
        e.src.to_string()
    } else {
        String::new()
    };
    let _ = writeln!(
        out,
        "{}|{:>15}|{:>18}|{:>15}|{:>15}|{}|{}",
        sync_flag(e.sync),
        e.kind.to_string(),
        dst,
        gw,
        src,
        priority_column(e.priority),
        device_column(e.out_if_index),
    );
}

fn v6_row(out: &mut String, e: &RouteEntryV6) {
    let dst = if e.dst != Ipv6Addr::UNSPECIFIED {
        format!("{}/{}", e.dst, e.prefix_len)
    } else {
        "::/0".to_string()
    };
    let gw = if e.gateway != Ipv6Addr::UNSPECIFIED {
        e.gateway.to_string()
    } else {
        String::new()
    };
    let src = if e.src != Ipv6Addr::UNSPECIFIED {
        e.src.to_string()
    } else {
        String::new()
    };
    let _ = writeln!(
        out,
        "{}|{:>13}|{:>44}|{:>40}|{:>40}|{}|{}",
        sync_flag(e.sync),
        e.kind.to_string(),
        dst,
        gw,
        src,
        priority_column(e.priority),
        device_column(e.out_if_index),
    );
}

pub fn format_v4_table(table: &RouteTable<RouteEntryV4>) -> String {
    let entries = table.snapshot();
    let mut out = String::new();
    let _ = writeln!(out, "-------------  v4 route ----------------");
    let _ = writeln!(out, "max            = {}", table.capacity());
    let _ = writeln!(out, "num            = {}", entries.len());
    let _ = writeln!(out, "{V4_HEADER}");
    for e in &entries {
        v4_row(&mut out, e);
    }
    out
}

pub fn format_v6_table(table: &RouteTable<RouteEntryV6>) -> String {
    let entries = table.snapshot();
    let mut out = String::new();
    let _ = writeln!(out, "-------------  v6 route ----------------");
    let _ = writeln!(out, "max            = {}", table.capacity());
    let _ = writeln!(out, "num            = {}", entries.len());
    let _ = writeln!(out, "{V6_HEADER}");
    for e in &entries {
        v6_row(&mut out, e);
    }
    out
}

/// Columns: destination key, MTU, remaining seconds of timer (`-1` = no timer).
pub fn format_pmtu_table(cache: &PmtuCache) -> String {
    let mut rows = cache.snapshot();
    rows.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = String::new();
    let _ = writeln!(out, "{:<40} | {:>9} | {:>12}", "Dst Addr", "Path MTU", "remain time");
    for (key, mtu, remaining) in rows {
        let _ = writeln!(out, "{key:<40} | {mtu:>9} | {remaining:>12}");
    }
    out
}
