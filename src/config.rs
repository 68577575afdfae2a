//! Typed configuration data model for the daemon's recognized configuration inputs.
//!
//! File parsing is explicitly out of scope; these structs exist so an external
//! loader has a `Deserialize` target to populate.

use std::net::Ipv6Addr;

use serde::Deserialize;

use crate::translate::TunnelMode as TranslatorMode;

/// Mirrors [`TranslatorMode`] but derives `Deserialize`, keeping the translator's
/// own type free of a serde dependency it otherwise has no use for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TunnelMode {
    Normal,
    As,
}

impl From<TunnelMode> for TranslatorMode {
    fn from(m: TunnelMode) -> Self {
        match m {
            TunnelMode::Normal => TranslatorMode::Normal,
            TunnelMode::As => TranslatorMode::As,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceType {
    Macvlan,
    Veth,
    Physical,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DeviceType,
    pub ifindex: u32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TunnelDeviceConfig {
    pub ipv4_ifindex: u32,
    pub ipv6_ifindex: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PmtudType {
    None,
    Tunnel,
    Host,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PmtudSettings {
    #[serde(rename = "type")]
    pub kind: PmtudType,
    pub expire_time_secs: u64,
    pub default_mtu: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    pub tunnel_mode: TunnelMode,
    pub route_sync: bool,
    pub route_entry_max: usize,
    pub unicast_prefix: Ipv6Addr,
    pub tunnel: TunnelDeviceConfig,
    pub device_list: Vec<DeviceConfig>,
    pub pmtud: PmtudSettings,
}

impl GeneralConfig {
    /// ifindices of every configured `MACVLAN` device — the only device kind that
    /// joins the IPv4 interest set.
    pub fn macvlan_ifindices(&self) -> impl Iterator<Item = u32> + '_ {
        self.device_list
            .iter()
            .filter(|d| d.kind == DeviceType::Macvlan)
            .map(|d| d.ifindex)
    }
}
