use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "taskbot", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Act as this sender (defaults to the configured owner)
    #[arg(long, global = true, value_name = "ID")]
    pub owner: Option<String>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Create a task or reminder from free text
    ///
    /// Example: taskbot add Pastilla -cada 8h
    /// Example: taskbot add Parcial mañana a las 8
    Add {
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true, trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Show your pending tasks
    ///
    /// Example: taskbot list
    List,
    /// Delete a task by its number in `list`
    ///
    /// Example: taskbot delete 2
    Delete { index: String },
    /// Grade needed on the last component to pass
    ///
    /// Example: taskbot grade 4.5 30 3.8 30 40
    Grade {
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        values: Vec<String>,
    },
    /// Global counters (admin only)
    Stats,
    /// Registered groups (admin only)
    Groups,
    /// Register a group conversation
    ///
    /// Example: taskbot join-group 120363@g.us Clase de cálculo
    JoinGroup {
        id: String,
        #[arg(num_args = 0.., trailing_var_arg = true)]
        name: Vec<String>,
    },
    /// Send an announcement to every group (admin only)
    ///
    /// Example: taskbot broadcast Mañana no hay clase
    Broadcast {
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true, trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Run one reminder scan now
    Tick,
    /// Start the reminder loop and read commands from stdin
    Run,
}

/// Joins words captured by a variadic argument back into one message.
pub fn joined(words: &[String]) -> String {
    words.join(" ").trim().to_string()
}
