//! Bidirectional route translator (C3).
//!
//! Ground truth for the bit-level math is `m46eapp_sync_com_route.c`'s
//! `m46e_change_route_v4_to_v6`/`m46e_change_route_v6_to_v4`/`m46e_prefix_check`.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::TranslationError;
use crate::route::{RouteEntryV4, RouteEntryV6};

/// Selects which of the two M46E address-embedding schemes is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelMode {
    /// 96-bit prefix, IPv4 address in the low 32 bits of the IPv6 destination.
    Normal,
    /// 80-bit prefix, IPv4 address in bytes 10..14, 16 zero port bits after it.
    As,
}

const NORMAL_PREFIX_BITS: u8 = 96;
const NORMAL_PREFIX_BYTES: usize = 12;
const AS_PREFIX_BITS: u8 = 80;
const AS_PREFIX_BYTES: usize = 10;
const AS_MASK_MAX: u8 = AS_PREFIX_BITS + 32;

/// Bidirectional IPv4 ⇄ IPv6 translator, parameterized by tunnel mode, the
/// daemon's unicast prefix and the tunnel device index of each family's table.
#[derive(Debug, Clone)]
pub struct Translator {
    pub mode: TunnelMode,
    pub prefix: Ipv6Addr,
    pub tunnel_v4_idx: u32,
    pub tunnel_v6_idx: u32,
}

impl Translator {
    pub fn new(mode: TunnelMode, prefix: Ipv6Addr, tunnel_v4_idx: u32, tunnel_v6_idx: u32) -> Self {
        Self {
            mode,
            prefix,
            tunnel_v4_idx,
            tunnel_v6_idx,
        }
    }

    /// True if `addr` falls under the daemon's unicast prefix (C4's IPv6 filter).
    pub fn prefix_matches(&self, addr: &Ipv6Addr) -> bool {
        let bytes = addr.octets();
        let prefix = self.prefix.octets();
        let n = match self.mode {
            TunnelMode::Normal => NORMAL_PREFIX_BYTES,
            TunnelMode::As => AS_PREFIX_BYTES,
        };
        bytes[..n] == prefix[..n]
    }

    /// Translates an IPv4 entry into its IPv6 counterpart. Always produces
    /// `sync = true`, `gateway`/`src` = "any", `priority = 0`,
    /// `out_if_index = tunnel_v6_idx`.
    pub fn v4_to_v6(&self, src: &RouteEntryV4) -> Result<RouteEntryV6, TranslationError> {
        if src.dst == Ipv4Addr::UNSPECIFIED {
            return Err(TranslationError::ZeroAddress);
        }

        let (offset, prefix_bits) = match self.mode {
            TunnelMode::Normal => (NORMAL_PREFIX_BYTES, NORMAL_PREFIX_BITS),
            TunnelMode::As => (AS_PREFIX_BYTES, AS_PREFIX_BITS),
        };

        let mut octets = self.prefix.octets();
        octets[offset..offset + 4].copy_from_slice(&src.dst.octets());
        if matches!(self.mode, TunnelMode::As) {
            // bytes 14..16 carry a 16-bit port placeholder, always zero here.
            octets[14] = 0;
            octets[15] = 0;
        }

        Ok(RouteEntryV6 {
            kind: src.kind,
            dst: Ipv6Addr::from(octets),
            prefix_len: prefix_bits + src.prefix_len,
            src: Ipv6Addr::UNSPECIFIED,
            gateway: Ipv6Addr::UNSPECIFIED,
            out_if_index: self.tunnel_v6_idx,
            priority: 0,
            sync: true,
        })
    }

    /// Translates an IPv6 entry into its IPv4 counterpart.
    pub fn v6_to_v4(&self, src: &RouteEntryV6) -> Result<RouteEntryV4, TranslationError> {
        let octets = src.dst.octets();

        let (offset, prefix_bits) = match self.mode {
            TunnelMode::Normal => (NORMAL_PREFIX_BYTES, NORMAL_PREFIX_BITS),
            TunnelMode::As => (AS_PREFIX_BYTES, AS_PREFIX_BITS),
        };

        let dst_prefix_len = match self.mode {
            TunnelMode::Normal => src
                .prefix_len
                .checked_sub(prefix_bits)
                .ok_or(TranslationError::NormalMaskOutOfRange(src.prefix_len))?,
            TunnelMode::As => {
                if !(AS_PREFIX_BITS..=AS_MASK_MAX).contains(&src.prefix_len) {
                    return Err(TranslationError::AsMaskOutOfRange(src.prefix_len));
                }
                src.prefix_len - prefix_bits
            }
        };

        let mut v4 = [0u8; 4];
        v4.copy_from_slice(&octets[offset..offset + 4]);
        let dst = Ipv4Addr::from(v4);
        if dst == Ipv4Addr::UNSPECIFIED {
            return Err(TranslationError::ZeroAddress);
        }

        Ok(RouteEntryV4 {
            kind: src.kind,
            dst,
            prefix_len: dst_prefix_len,
            src: Ipv4Addr::UNSPECIFIED,
            gateway: Ipv4Addr::UNSPECIFIED,
            out_if_index: self.tunnel_v4_idx,
            priority: 0,
            sync: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::RouteKind;

    fn v4(dst: &str, prefix_len: u8) -> RouteEntryV4 {
        RouteEntryV4 {
            kind: RouteKind::Unicast,
            dst: dst.parse().unwrap(),
            prefix_len,
            src: Ipv4Addr::UNSPECIFIED,
            gateway: "192.168.1.1".parse().unwrap(),
            out_if_index: 5,
            priority: 7,
            sync: false,
        }
    }

    #[test]
    fn normal_mode_s1() {
        let t = Translator::new(TunnelMode::Normal, "2001:db8::".parse().unwrap(), 10, 20);
        let v6 = t.v4_to_v6(&v4("10.0.0.0", 24)).unwrap();
        assert_eq!(v6.dst, "2001:db8::0a00:0".parse::<Ipv6Addr>().unwrap());
        assert_eq!(v6.prefix_len, 120);
        assert_eq!(v6.out_if_index, 20);
        assert!(v6.sync);
        assert_eq!(v6.gateway, Ipv6Addr::UNSPECIFIED);
    }

    #[test]
    fn as_mode_boundary_s2() {
        let t = Translator::new(TunnelMode::As, "2001:db8::".parse().unwrap(), 10, 20);
        let v6 = RouteEntryV6 {
            kind: RouteKind::Unicast,
            dst: "2001:db8::0a00:0100:0000".parse().unwrap(),
            prefix_len: 112,
            src: Ipv6Addr::UNSPECIFIED,
            gateway: Ipv6Addr::UNSPECIFIED,
            out_if_index: 0,
            priority: 0,
            sync: false,
        };
        let v4r = t.v6_to_v4(&v6).unwrap();
        assert_eq!(v4r.dst, "10.0.1.0".parse::<Ipv4Addr>().unwrap());
        assert_eq!(v4r.prefix_len, 32);

        let mut too_short = v6.clone();
        too_short.prefix_len = 79;
        assert!(matches!(
            t.v6_to_v4(&too_short),
            Err(TranslationError::AsMaskOutOfRange(79))
        ));
    }

    #[test]
    fn round_trip_normal_mode() {
        let t = Translator::new(TunnelMode::Normal, "2001:db8::".parse().unwrap(), 10, 20);
        let original = v4("172.16.5.0", 28);
        let v6 = t.v4_to_v6(&original).unwrap();
        let back = t.v6_to_v4(&v6).unwrap();
        assert_eq!(back.dst, original.dst);
        assert_eq!(back.prefix_len, original.prefix_len);
        assert_eq!(back.kind, original.kind);
    }

    #[test]
    fn zero_address_is_an_error() {
        let t = Translator::new(TunnelMode::Normal, "2001:db8::".parse().unwrap(), 10, 20);
        assert!(matches!(
            t.v4_to_v6(&v4("0.0.0.0", 0)),
            Err(TranslationError::ZeroAddress)
        ));
    }
}
