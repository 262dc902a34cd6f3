use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "azstate")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative state for Azure resource groups", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply every declaration in a state file
    Apply(ApplyArgs),

    /// Ensure a single resource group exists with the given tags
    Present(PresentArgs),

    /// Ensure a single resource group does not exist
    Absent(AbsentArgs),

    /// Validate a state file without contacting Azure
    Check(CheckArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Shared Arguments
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Show what would change without changing anything
    #[arg(short = 'n', long, visible_alias = "test")]
    pub dry_run: bool,

    /// Apply without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Request timeout in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    pub timeout: u64,

    /// How long to wait for a deletion to finish, in seconds
    #[arg(long, default_value = "600", value_name = "SECS")]
    pub operation_timeout: u64,
}

#[derive(Args, Debug, Clone)]
pub struct AuthArgs {
    /// Named credential profile
    #[arg(short = 'p', long, required_unless_present = "connection_auth")]
    pub auth_profile: Option<String>,

    /// Inline connection_auth as a JSON object
    #[arg(long, value_name = "JSON", conflicts_with = "auth_profile")]
    pub connection_auth: Option<String>,

    /// Auth profile file (default: ~/.config/azstate/auth.toml)
    #[arg(long, env = "AZSTATE_AUTH_FILE", value_name = "FILE")]
    pub auth_file: Option<PathBuf>,
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// State file (TOML, or JSON with a .json extension)
    pub file: PathBuf,

    /// Only apply matching resources: resource_group or resource_group.<name>
    #[arg(short, long)]
    pub target: Option<String>,

    /// Number of resource groups to reconcile concurrently
    #[arg(short, long, default_value = "1")]
    pub jobs: u16,

    /// Auth profile file (default: ~/.config/azstate/auth.toml)
    #[arg(long, env = "AZSTATE_AUTH_FILE", value_name = "FILE")]
    pub auth_file: Option<PathBuf>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Args, Debug)]
pub struct PresentArgs {
    /// Resource group name
    pub name: String,

    /// Azure region (e.g. westus)
    #[arg(short, long)]
    pub location: String,

    /// Resource id of the managing resource
    #[arg(long)]
    pub managed_by: Option<String>,

    /// Tag as key=value (repeatable)
    #[arg(long = "tag", value_name = "KEY=VALUE", value_parser = parse_tag)]
    pub tags: Vec<(String, String)>,

    #[command(flatten)]
    pub auth: AuthArgs,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Args, Debug)]
pub struct AbsentArgs {
    /// Resource group name
    pub name: String,

    #[command(flatten)]
    pub auth: AuthArgs,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// State file to validate
    pub file: PathBuf,

    /// Auth profile file (default: ~/.config/azstate/auth.toml)
    #[arg(long, env = "AZSTATE_AUTH_FILE", value_name = "FILE")]
    pub auth_file: Option<PathBuf>,
}

/// Parse a `key=value` tag
fn parse_tag(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.trim().is_empty() {
        return Err(format!("empty tag key in '{s}'"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_tag() {
        assert_eq!(
            parse_tag("env=prod").unwrap(),
            ("env".to_string(), "prod".to_string())
        );
        assert_eq!(
            parse_tag("expr=a=b").unwrap(),
            ("expr".to_string(), "a=b".to_string())
        );
        assert_eq!(parse_tag("empty=").unwrap().1, "");
        assert!(parse_tag("novalue").is_err());
        assert!(parse_tag("=x").is_err());
    }

    #[test]
    fn test_present_args() {
        let cli = Cli::try_parse_from([
            "azstate",
            "present",
            "my_rg",
            "--location",
            "westus",
            "--tag",
            "how_awesome=very",
            "--auth-profile",
            "prod",
            "--test",
        ])
        .unwrap();

        let Command::Present(args) = cli.command else {
            panic!("expected present");
        };
        assert_eq!(args.name, "my_rg");
        assert_eq!(args.tags, vec![("how_awesome".to_string(), "very".to_string())]);
        assert_eq!(args.auth.auth_profile.as_deref(), Some("prod"));
        assert!(args.run.dry_run);
    }

    #[test]
    fn test_absent_requires_auth() {
        assert!(Cli::try_parse_from(["azstate", "absent", "my_rg"]).is_err());
        assert!(
            Cli::try_parse_from([
                "azstate",
                "absent",
                "my_rg",
                "-p",
                "prod",
                "--connection-auth",
                "{}"
            ])
            .is_err()
        );
    }

    #[test]
    fn test_apply_args() {
        let cli = Cli::try_parse_from([
            "azstate", "-vv", "apply", "state.toml", "-j", "4", "--target", "resource_group.rg1",
            "--yes",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.jobs, 4);
        assert_eq!(args.target.as_deref(), Some("resource_group.rg1"));
        assert!(args.run.yes);
        assert!(!args.run.dry_run);
    }
}
