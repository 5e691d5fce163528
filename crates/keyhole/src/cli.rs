//! Command-line interface

use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use std::path::PathBuf;

use crate::config::Config;

/// Keyhole - forwards one API prefix to one upstream with a bearer credential
#[derive(Parser, Debug)]
#[command(name = "keyhole")]
#[command(about = "Forward one API prefix to one upstream, injecting a bearer credential")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Start the gateway (default command)
    #[command(name = "serve")]
    Serve,

    /// Show the effective configuration
    #[command(name = "config")]
    Config {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// Effective configuration as JSON. The credential is reported only as
/// present or missing.
pub fn config_json(config: &Config, credential_present: bool) -> serde_json::Value {
    serde_json::json!({
        "server": {
            "listen_addr": config.server.listen_addr,
        },
        "upstream": {
            "origin": config.upstream.origin,
            "prefix": config.upstream.prefix,
            "api_key_env": config.upstream.api_key_env,
            "credential": credential_status(credential_present),
            "connect_timeout_secs": config.upstream.connect_timeout_secs,
            "response_timeout_secs": config.upstream.response_timeout_secs,
            "idle_timeout_secs": config.upstream.idle_timeout_secs,
        }
    })
}

/// Effective configuration as a table
pub fn config_table(config: &Config, credential_present: bool) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(["Setting", "Value"]);

    table.add_row(["server.listen_addr", config.server.listen_addr.as_str()]);
    table.add_row(["upstream.origin", config.upstream.origin.as_str()]);
    table.add_row(["upstream.prefix", config.upstream.prefix.as_str()]);
    table.add_row(["upstream.api_key_env", config.upstream.api_key_env.as_str()]);
    table.add_row(["credential", credential_status(credential_present)]);
    table.add_row([
        "upstream.connect_timeout_secs",
        config.upstream.connect_timeout_secs.to_string().as_str(),
    ]);
    table.add_row([
        "upstream.response_timeout_secs",
        config.upstream.response_timeout_secs.to_string().as_str(),
    ]);
    let idle = if config.upstream.idle_timeout_secs == 0 {
        "(disabled)".to_string()
    } else {
        config.upstream.idle_timeout_secs.to_string()
    };
    table.add_row(["upstream.idle_timeout_secs", idle.as_str()]);

    table
}

fn credential_status(present: bool) -> &'static str {
    if present { "set" } else { "missing" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_defaults_to_none() {
        let cli = Cli::parse_from(["keyhole"]);
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["keyhole", "serve", "--config", "/etc/keyhole.toml"]);
        assert_eq!(cli.command, Some(Command::Serve));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/keyhole.toml")));
    }

    #[test]
    fn test_config_json_flag() {
        let cli = Cli::parse_from(["keyhole", "config", "--json"]);
        assert_eq!(cli.command, Some(Command::Config { json: true }));
    }

    #[test]
    fn test_config_json_reports_credential_presence_only() {
        let json = config_json(&Config::default(), true);
        assert_eq!(json["upstream"]["credential"], "set");
        assert_eq!(json["upstream"]["origin"], "https://api.openai.com");
        assert_eq!(json["upstream"]["api_key_env"], "OPENAI_API_KEY");

        let json = config_json(&Config::default(), false);
        assert_eq!(json["upstream"]["credential"], "missing");
    }

    #[test]
    fn test_config_table_lists_settings() {
        let rendered = config_table(&Config::default(), false).to_string();
        assert!(rendered.contains("upstream.prefix"));
        assert!(rendered.contains("/v1/"));
        assert!(rendered.contains("missing"));
        assert!(rendered.contains("(disabled)"));
    }
}
