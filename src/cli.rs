use clap::{Parser, Subcommand};
use uuid::Uuid;

use todanni::token::ProjectId;

/// todanni — task tracker API and access-token tooling
#[derive(Parser)]
#[command(name = "todanni", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Port to bind (defaults to TODANNI_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Issue and inspect access tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Sign a token and print it
    Issue {
        #[arg(long)]
        user_id: String,
        /// Project ids, comma separated
        #[arg(long, value_delimiter = ',')]
        projects: Vec<ProjectId>,
        /// Dashboard ids, comma separated
        #[arg(long, value_delimiter = ',')]
        dashboards: Vec<Uuid>,
        /// Load the permission sets from the database instead
        #[arg(long, conflicts_with_all = ["projects", "dashboards"])]
        from_db: bool,
    },
    /// Verify a token and print its claims as JSON
    Inspect { token: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_issue_parses_lists() {
        let cli = Cli::try_parse_from([
            "todanni",
            "token",
            "issue",
            "--user-id",
            "u-1",
            "--projects",
            "1,42",
            "--dashboards",
            "00000000-0000-0000-0000-000000000000",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Token {
                command:
                    TokenCommands::Issue {
                        user_id,
                        projects,
                        dashboards,
                        from_db,
                    },
            }) => {
                assert_eq!(user_id, "u-1");
                assert_eq!(projects, vec![1, 42]);
                assert_eq!(dashboards, vec![Uuid::nil()]);
                assert!(!from_db);
            }
            _ => panic!("expected token issue"),
        }
    }

    #[test]
    fn test_from_db_conflicts_with_explicit_sets() {
        let res = Cli::try_parse_from([
            "todanni", "token", "issue", "--user-id", "u-1", "--projects", "1", "--from-db",
        ]);
        assert!(res.is_err());
    }
}
