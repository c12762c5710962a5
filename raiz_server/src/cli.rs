use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
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
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 17] = [
        "RUST_LOG",
        "RAIZ_HOST",
        "RAIZ_PORT",
        "RAIZ_DATABASE_URL",
        "RAIZ_FRONTEND_BASE_URL",
        "RAIZ_CORS_ORIGINS",
        "RAIZ_ACCESS_TOKEN_EXPIRE_MINUTES",
        "RAIZ_REFRESH_TOKEN_EXPIRE_DAYS",
        "RAIZ_STRIPE_PRICE_ID",
        "RAIZ_STRIPE_API_URL",
        "RAIZ_EMAIL_SENDER",
        "RAIZ_MAIL_API_URL",
        "RAIZ_SEARCH_WORKERS",
        "RAIZ_WORKER_POLL_INTERVAL",
        "RAIZ_SEARCH_SOURCE_TIMEOUT",
        "RAIZ_USE_X_FORWARDED_FOR",
        "RAIZ_USE_FORWARDED",
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
