//! Minimal CNI plugin-chain invoker: the control-plane side of the CNI
//! exec contract, not an implementation of any plugin itself.

pub mod conflist;
pub mod exec;
pub mod resultcache;

pub use conflist::ConfList;
pub use exec::{RuntimeConf, add_network_list};
