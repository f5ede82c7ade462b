use serenity::model::id::UserId;

/// A chat command addressed to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join,
    Leave,
    Play(String),
    Pause,
    Resume,
    Stop,
    Skip,
    Loop,
    Queue,
    History,
    Help,
}

/// One line of the help embed.
pub struct CommandHelp {
    pub name: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
    pub takes_argument: bool,
}

const fn entry(name: &'static str, usage: &'static str, description: &'static str) -> CommandHelp {
    CommandHelp {
        name,
        usage,
        description,
        takes_argument: false,
    }
}

pub const COMMANDS: &[CommandHelp] = &[
    CommandHelp {
        name: "play",
        usage: "play <query/url>",
        description: "Plays a song from YouTube, Spotify, or SoundCloud.",
        takes_argument: true,
    },
    entry("pause", "pause", "Pauses the current song."),
    entry("resume", "resume", "Resumes the paused song."),
    entry("skip", "skip", "Skips the current song."),
    entry("stop", "stop", "Stops playback and clears the queue."),
    entry("loop", "loop", "Toggles looping of the current song."),
    entry("queue", "queue", "Shows what is playing and what is next."),
    entry("history", "history", "Shows your last played songs."),
    entry("join", "join", "Joins your voice channel."),
    entry("leave", "leave", "Leaves the voice channel."),
    entry("help", "help", "Shows this message."),
];

/// Strips the prefix (or a leading bot mention) and parses the command.
/// Returns `None` for messages not addressed to the bot and for unknown names.
pub fn parse(content: &str, prefix: &str, bot_id: Option<UserId>) -> Option<Command> {
    let content = content.trim_start();
    let rest = strip_mention(content, bot_id)
        .or_else(|| content.strip_prefix(prefix).filter(|_| !prefix.is_empty()))?;

    let rest = rest.trim_start();
    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    let command = match name.to_lowercase().as_str() {
        "join" | "connect" => Command::Join,
        "leave" | "disconnect" => Command::Leave,
        "play" | "p" => Command::Play(args.to_string()),
        "pause" => Command::Pause,
        "resume" => Command::Resume,
        "stop" => Command::Stop,
        "skip" => Command::Skip,
        "loop" => Command::Loop,
        "queue" | "q" => Command::Queue,
        "history" => Command::History,
        "help" => Command::Help,
        _ => return None,
    };
    Some(command)
}

fn strip_mention(content: &str, bot_id: Option<UserId>) -> Option<&str> {
    let id = bot_id?.get();
    content
        .strip_prefix(&format!("<@{}>", id))
        .or_else(|| content.strip_prefix(&format!("<@!{}>", id)))
}
