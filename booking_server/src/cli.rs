use std::{env, env::VarError};

/// The server takes no arguments. Passing any prints the help text and the current configuration.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Secrets are deliberately left off this list
    const DISPLAY_ENVS: [&str; 18] = [
        "RUST_LOG",
        "WB_HOST",
        "WB_PORT",
        "WB_DATABASE_URL",
        "WB_GATEWAY_BASE_URL",
        "WB_GATEWAY_KEY_ID",
        "WB_GATEWAY_CALLBACK_URL",
        "WB_GATEWAY_NOTIFY_CUSTOMER",
        "WB_CASHBACK_PERCENTAGE",
        "WB_REDEMPTION_CAP_PERCENTAGE",
        "WB_REDEMPTION_CAP_PER_WORKSHOP",
        "WB_REWARD_EXCHANGE_RATE",
        "WB_WELCOME_BONUS_AMOUNT",
        "WB_ORDER_LINK_EXPIRY_MINUTES",
        "WB_EXPIRY_SWEEP_INTERVAL_SECS",
        "WB_EXPIRY_SWEEP_MIN_SPACING_SECS",
        "WB_CASHBACK_SWEEP_INTERVAL_SECS",
        "WB_SWEEP_BATCH_SIZE",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
