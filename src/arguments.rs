/// Centralized argument handling for VolumeBot
///
/// Command-line arguments are captured once into `CMD_ARGS` and read through
/// the helpers below. Tests override them with `set_cmd_args`.
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

/// Global command-line arguments storage
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Replaces the stored arguments
pub fn set_cmd_args(args: Vec<String>) {
    if let Ok(mut cmd_args) = CMD_ARGS.lock() {
        *cmd_args = args;
    }
}

/// Returns a copy of the stored arguments
pub fn get_cmd_args() -> Vec<String> {
    match CMD_ARGS.lock() {
        Ok(args) => args.clone(),
        Err(_) => env::args().collect(),
    }
}

/// Checks if a specific argument is present
pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// Value following `flag`, if any
pub fn get_arg_value(flag: &str) -> Option<String> {
    get_arg_values(flag, 1).and_then(|mut values| values.pop())
}

/// The `count` values following `flag`; None unless all of them are present
pub fn get_arg_values(flag: &str, count: usize) -> Option<Vec<String>> {
    let args = get_cmd_args();
    let position = args.iter().position(|a| a == flag)?;
    let values: Vec<String> = args
        .iter()
        .skip(position + 1)
        .take(count)
        .cloned()
        .collect();

    if values.len() == count && values.iter().all(|v| !v.starts_with("--")) {
        Some(values)
    } else {
        None
    }
}

// =============================================================================
// DEBUG FLAG CHECKING FUNCTIONS
// =============================================================================

/// Engine control loop debug mode
pub fn is_debug_engine_enabled() -> bool {
    has_arg("--debug-engine")
}

/// Relay submission and polling debug mode
pub fn is_debug_relay_enabled() -> bool {
    has_arg("--debug-relay")
}

/// Quote gateway debug mode
pub fn is_debug_gateway_enabled() -> bool {
    has_arg("--debug-gateway")
}

/// Scheduler tick debug mode
pub fn is_debug_scheduler_enabled() -> bool {
    has_arg("--debug-scheduler")
}

/// Verbose output for every tag
pub fn is_verbose_enabled() -> bool {
    has_arg("--verbose")
}

/// Only warnings and errors
pub fn is_quiet_enabled() -> bool {
    has_arg("--quiet")
}

/// Logs which debug modes are switched on
pub fn print_debug_info() {
    let modes: Vec<&str> = [
        ("engine", is_debug_engine_enabled()),
        ("relay", is_debug_relay_enabled()),
        ("gateway", is_debug_gateway_enabled()),
        ("scheduler", is_debug_scheduler_enabled()),
        ("verbose", is_verbose_enabled()),
        ("quiet", is_quiet_enabled()),
    ]
    .iter()
    .filter(|(_, on)| *on)
    .map(|(name, _)| *name)
    .collect();

    if !modes.is_empty() {
        crate::logger::info(
            crate::logger::LogTag::System,
            &format!("Debug modes: {}", modes.join(", ")),
        );
    }
}

/// Prints the operator help text
pub fn print_help() {
    println!("VolumeBot - session-driven volume orchestration");
    println!();
    println!("USAGE:");
    println!("    volumebot [COMMAND] [OPTIONS]");
    println!();
    println!("COMMANDS (default: run the scheduler until Ctrl-C):");
    println!("    --create <user> <token_mint> <pool_kind>   Create a session for the configured main wallet");
    println!("    --start <session_id>                       Mark a session as running");
    println!("    --stop <session_id>                        Stop a session");
    println!("    --set-target <session_id> <volume>         Set the target volume");
    println!("    --set-principal <session_id> <lamports>    Set the principal amount per cycle");
    println!("    --set-pool <session_id> <amm|cpmm|clmm>    Set the pool kind");
    println!("    --assign-token <session_id> <token_mint>   Switch token and reset progress");
    println!("    --run-once <session_id>                    Drive one session loop in the foreground");
    println!("    --generate-wallets <count>                 Pre-generate wallet pool entries");
    println!("    --sweep <session_id> <start> <count>       Return pool wallet funds to the main wallet");
    println!("    --withdraw <session_id> <address> <lamports|all>  Send main wallet funds out");
    println!("    --list                                     List sessions");
    println!();
    println!("OPTIONS:");
    println!("    --debug-<tag>      Enable debug logs for a tag (engine, relay, gateway, scheduler, ...)");
    println!("    --verbose          Enable verbose logs");
    println!("    --quiet            Only warnings and errors");
    println!("    --help             Print this help");
}
