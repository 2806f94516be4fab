//! Typed terminal commands and their translation into intents

use shared::Packet;
use thiserror::Error;

/// A parsed line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join {
        name: String,
        theme_key: Option<String>,
    },
    /// Zero-based card position
    Flip(i64),
    Reset,
    Theme(String),
    Themes,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command '{0}', type 'help' for a list")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("'{0}' is not a card number")]
    BadCardNumber(String),
}

pub const HELP: &str = "\
commands:
  join <name> [--theme <key>]   join the game (first player picks the theme)
  flip <n> | f <n>              flip card number n
  reset | r                     start over (turn holder only)
  theme <key> | t <key>         switch theme and start over (turn holder only)
  themes                        list available themes
  help | h                      show this help
  quit | q                      leave the game";

impl Command {
    /// The packet this command sends, if it talks to the server at all
    pub fn to_packet(&self) -> Option<Packet> {
        match self {
            Command::Join { name, theme_key } => Some(Packet::JoinGame {
                name: name.clone(),
                theme_key: theme_key.clone(),
            }),
            Command::Flip(index) => Some(Packet::FlipCard { index: *index }),
            Command::Reset => Some(Packet::ResetGame),
            Command::Theme(theme_key) => Some(Packet::ChangeTheme {
                theme_key: theme_key.clone(),
            }),
            Command::Themes | Command::Help | Command::Quit => None,
        }
    }
}

/// Parses one line; blank lines yield `Ok(None)`.
///
/// Card numbers are typed as shown on the board, starting at 1.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match verb.to_lowercase().as_str() {
        "join" | "j" => parse_join(&args)?,
        "flip" | "f" => match args.as_slice() {
            [number] => {
                let number: i64 = number
                    .parse()
                    .map_err(|_| CommandError::BadCardNumber(number.to_string()))?;
                Command::Flip(number - 1)
            }
            _ => return Err(CommandError::Usage("flip <n>")),
        },
        "reset" | "r" => Command::Reset,
        "theme" | "t" => match args.as_slice() {
            [key] => Command::Theme(key.to_string()),
            _ => return Err(CommandError::Usage("theme <key>")),
        },
        "themes" => Command::Themes,
        "help" | "h" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };

    Ok(Some(command))
}

fn parse_join(args: &[&str]) -> Result<Command, CommandError> {
    const USAGE: &str = "join <name> [--theme <key>]";

    let mut name_parts = Vec::new();
    let mut theme_key = None;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if *arg == "--theme" {
            let key = iter.next().ok_or(CommandError::Usage(USAGE))?;
            theme_key = Some(key.to_string());
        } else {
            name_parts.push(*arg);
        }
    }

    if name_parts.is_empty() {
        return Err(CommandError::Usage(USAGE));
    }

    Ok(Command::Join {
        name: name_parts.join(" "),
        theme_key,
    })
}
