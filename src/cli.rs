use clap::{Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct CLI {
    #[command(subcommand)]
    pub(crate) command: NexCommand,
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum NexCommand {
    /// Search the package registry
    Search {
        /// Search terms, matched against id, name, description and keywords
        query: Vec<String>,
    },
    /// Show details for a package
    Info {
        /// Full id (`author.name`) or short name
        package: String,
    },
    /// Install a package from the registry
    Install {
        /// Full id (`author.name`) or short name
        package: String,
    },
    /// Remove an installed package
    Remove {
        /// Full id (`author.name`) or short name
        package: String,
    },
    /// Update one installed package, or all of them
    Update {
        /// Package to update; omit to update everything
        package: Option<String>,
    },
    /// Check installed packages against the registry
    Outdated,
    /// List installed packages
    List,
    /// Run a package command. Installs the package first if needed
    Run {
        /// Full id (`author.name`) or short name
        package: String,
        /// Optional command name followed by its arguments; a leading `-`
        /// argument goes to the `default` command
        #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Link the package in the current directory for local development
    Link,
    /// Write a nex.lock snapshot of the installed packages
    Lock,
}
