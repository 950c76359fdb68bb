#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Tasks,
    History,
    More,
    Reauth(String),
    Cancel,
    Retry,
    Add(String),
    Done(String),
    Delete(String),
    Panel,
    Quit,
    Unknown(String),
}

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (command, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim().to_string()),
        None => (trimmed, String::new()),
    };

    let parsed = match command {
        "/help" => SlashCommand::Help,
        "/tasks" => SlashCommand::Tasks,
        "/history" => SlashCommand::History,
        "/more" => SlashCommand::More,
        "/reauth" | "/login" => SlashCommand::Reauth(rest),
        "/cancel" => SlashCommand::Cancel,
        "/retry" => SlashCommand::Retry,
        "/add" => SlashCommand::Add(rest),
        "/done" => SlashCommand::Done(rest),
        "/delete" => SlashCommand::Delete(rest),
        "/panel" => SlashCommand::Panel,
        "/quit" | "/exit" => SlashCommand::Quit,
        _ => SlashCommand::Unknown(command.to_string()),
    };

    Some(parsed)
}
