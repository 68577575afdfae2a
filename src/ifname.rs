//! Interface-index → name lookup via `SOCK_DGRAM`/`SIOCGIFNAME`, used only for
//! human-readable logging and table dumps.
//!
//! Uses the same raw-ioctl, `#[repr(C)]` style as this codebase's other ioctl
//! calls, rather than reaching for a higher-level crate.

use std::io;
use std::mem;

#[repr(C)]
struct IfReq {
    ifr_name: [libc::c_char; libc::IF_NAMESIZE],
    ifr_ifindex: libc::c_int,
}

/// Resolves `ifindex` to its interface name, e.g. `4` -> `"eth0"`. Falls back
/// to a parenthesized numeric form on lookup failure so dump formatting never
/// has to handle an error case of its own.
pub fn ifindex_to_name(ifindex: u32) -> String {
    match try_ifindex_to_name(ifindex) {
        Ok(name) => name,
        Err(_) => format!("if{ifindex}"),
    }
}

fn try_ifindex_to_name(ifindex: u32) -> io::Result<String> {
    // SAFETY: socket()/ioctl()/close() are standard libc calls on a
    // SOCK_DGRAM socket used only to resolve an interface name; no invariants
    // beyond checking each call's return value.
    unsafe {
        let fd = libc::socket(libc::PF_INET, libc::SOCK_DGRAM, 0);
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        let mut ifr: IfReq = mem::zeroed();
        ifr.ifr_ifindex = ifindex as libc::c_int;

        let ret = libc::ioctl(fd, libc::SIOCGIFNAME, &mut ifr as *mut IfReq);
        libc::close(fd);

        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        let cstr = std::ffi::CStr::from_ptr(ifr.ifr_name.as_ptr());
        Ok(cstr.to_string_lossy().into_owned())
    }
}
