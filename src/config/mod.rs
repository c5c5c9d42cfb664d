//! Configuration system
//!
//! - `macros`: the `config_struct!` macro
//! - `schemas`: every config section with embedded defaults
//! - `utils`: loading, saving and access helpers

#[macro_use]
pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::*;
pub use utils::{
    get_main_wallet_keypair, load_config, load_config_from_path, parse_keypair, save_config,
    with_config, CONFIG,
};
