mod hardware;
mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use sensor_core::power::{ALL_RAILS, RailId};
use session::{CompletionResponse, Session, SessionOptions, TranscriptProfile};

const USAGE: &str = "Usage: sensor-emulator [--profile <bring-up|hdr|fault>] [--transcript <path>] \
                     [--qbc <0|2..5>] [--chip-id <hex>] [--fail-rail <vana|vdig|vddl>]";

fn main() -> io::Result<()> {
    let options = parse_options(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(&options)?;
    let mut line = String::new();

    writeln!(
        writer,
        "IMX708 sensor emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let raw = line.trim_end_matches(['\r', '\n']);
        if let Some(buffer) = raw.strip_suffix('\t') {
            for response in describe_completion(session.handle_completion(buffer, buffer.len())?) {
                writeln!(writer, "{response}")?;
            }
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for response in session.handle_command(trimmed)? {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

/// A line ending in TAB asks for completion instead of running a command.
fn describe_completion(response: CompletionResponse) -> Vec<String> {
    match response {
        CompletionResponse::NoMatches => vec!["(no completions)".to_string()],
        CompletionResponse::Applied { replacement } => {
            let space = if replacement.append_space { " " } else { "" };
            vec![format!("complete: {}{space}", replacement.value)]
        }
        CompletionResponse::Suggestions { options } => options
            .into_iter()
            .map(|option| format!("  {option}"))
            .collect(),
    }
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options(mut args: impl Iterator<Item = String>) -> Result<SessionOptions, String> {
    let mut options = SessionOptions::default();
    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        let mut value = || {
            inline
                .clone()
                .or_else(|| args.next())
                .ok_or_else(|| format!("Expected value after {flag}"))
        };

        match flag.as_str() {
            "--profile" => {
                let profile = TranscriptProfile::from_tag(&value()?)?;
                let base = profile.options();
                options.transcript = base.transcript;
                options.header = base.header;
                options.fail_rail = options.fail_rail.or(base.fail_rail);
            }
            "--transcript" => options.transcript = PathBuf::from(value()?),
            "--qbc" => {
                let raw = value()?;
                options.qbc = raw
                    .parse()
                    .map_err(|_| format!("Invalid remosaic strength `{raw}`"))?;
            }
            "--chip-id" => options.chip_id = parse_chip_id(&value()?)?,
            "--fail-rail" => options.fail_rail = Some(parse_rail(&value()?)?),
            _ => return Err(format!("Unknown argument `{flag}`")),
        }
    }
    Ok(options)
}

fn parse_chip_id(raw: &str) -> Result<u16, String> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    u16::from_str_radix(digits, 16).map_err(|_| format!("Invalid chip id `{raw}`"))
}

fn parse_rail(raw: &str) -> Result<RailId, String> {
    ALL_RAILS
        .into_iter()
        .find(|rail| rail.name().eq_ignore_ascii_case(raw))
        .ok_or_else(|| format!("Unknown rail `{raw}`"))
}
