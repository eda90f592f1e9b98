pub mod cni;
pub mod mutate;
pub mod plugins;
pub mod util;
pub mod validate;
