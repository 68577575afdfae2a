pub mod config;
pub mod dispatch;
pub mod dump;
pub mod error;
pub mod handler;
pub mod ifname;
pub mod kernel;
pub mod observer;
pub mod peer;
pub mod pmtu;
pub mod route;
pub mod translate;
