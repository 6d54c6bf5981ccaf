//! Line-oriented console commands

use anyhow::{anyhow, bail, Context};
use radio_core::{DeviceId, Position};

pub const HELP: &str = "\
Commands:
  device <id>                 switch the console to another device id
  select <name>               select a channel (playlist/x, station/x, stream/x or a bare name)
  next <1|2|3>                select and play the next source in a category
  cycle <1|2|3>               select the next source without playing
  play | playbg | start       play the selection (playbg does not wait)
  pause | stop | forward | rewind
  volume [<percent>|up [step]|down [step]]
  track [<name>]              show or jump to a song
  fx <name> | fxstop          one-shot sound effects
  pos <ex> <ey> <ez> <lx> <ly> <lz>
  fade <min> <max> <pan>      per-device fade parameters (negative resets)
  status | channels | rescan | tick
  help | quit";

/// One parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Device(DeviceId),
    Select(String),
    NextSource(i32),
    CycleSource(i32),
    Play,
    PlayBackground,
    Start,
    Pause,
    Stop,
    Forward,
    Rewind,
    ShowVolume,
    SetVolume(f32),
    VolumeUp(f32),
    VolumeDown(f32),
    ShowTrack,
    SetTrack(String),
    PlayFx(String),
    StopFx,
    Positions { emitter: Position, listener: Position },
    Fade { min: f32, max: f32, pan: f32 },
    Status,
    Channels,
    Rescan,
    Tick,
    Help,
    Quit,
}

/// Parse one input line; blank lines and `#` comments yield `None`
pub fn parse(line: &str) -> anyhow::Result<Option<ConsoleCommand>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match word.to_ascii_lowercase().as_str() {
        "device" => ConsoleCommand::Device(DeviceId::new(
            rest.parse().with_context(|| format!("invalid device id '{rest}'"))?,
        )),
        "select" | "channel" => ConsoleCommand::Select(required(rest, "channel name")?),
        "next" => ConsoleCommand::NextSource(category(rest)?),
        "cycle" => ConsoleCommand::CycleSource(category(rest)?),
        "play" => ConsoleCommand::Play,
        "playbg" => ConsoleCommand::PlayBackground,
        "start" => ConsoleCommand::Start,
        "pause" => ConsoleCommand::Pause,
        "stop" => ConsoleCommand::Stop,
        "forward" | "skip" => ConsoleCommand::Forward,
        "rewind" | "back" => ConsoleCommand::Rewind,
        "volume" | "vol" => match args.as_slice() {
            [] => ConsoleCommand::ShowVolume,
            ["up"] => ConsoleCommand::VolumeUp(0.0),
            ["down"] => ConsoleCommand::VolumeDown(0.0),
            ["up", step] => ConsoleCommand::VolumeUp(number(step)?),
            ["down", step] => ConsoleCommand::VolumeDown(number(step)?),
            [percent] => ConsoleCommand::SetVolume(number(percent)?),
            _ => bail!("usage: volume [<percent>|up [step]|down [step]]"),
        },
        "track" => {
            if rest.is_empty() {
                ConsoleCommand::ShowTrack
            } else {
                ConsoleCommand::SetTrack(rest.to_string())
            }
        }
        "fx" => ConsoleCommand::PlayFx(required(rest, "effect name")?),
        "fxstop" => ConsoleCommand::StopFx,
        "pos" | "positions" => {
            let values = numbers(&args, 6, "pos <ex> <ey> <ez> <lx> <ly> <lz>")?;
            ConsoleCommand::Positions {
                emitter: Position::new(values[0], values[1], values[2]),
                listener: Position::new(values[3], values[4], values[5]),
            }
        }
        "fade" => {
            let values = numbers(&args, 3, "fade <min> <max> <pan>")?;
            ConsoleCommand::Fade {
                min: values[0],
                max: values[1],
                pan: values[2],
            }
        }
        "status" => ConsoleCommand::Status,
        "channels" | "list" => ConsoleCommand::Channels,
        "rescan" => ConsoleCommand::Rescan,
        "tick" => ConsoleCommand::Tick,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => bail!("unknown command '{other}' (try 'help')"),
    };

    Ok(Some(command))
}

fn required(rest: &str, what: &str) -> anyhow::Result<String> {
    if rest.is_empty() {
        bail!("missing {what}");
    }
    Ok(rest.to_string())
}

fn category(rest: &str) -> anyhow::Result<i32> {
    rest.parse()
        .map_err(|_| anyhow!("category must be 1 (playlists), 2 (stations) or 3 (streams)"))
}

fn number(text: &str) -> anyhow::Result<f32> {
    text.parse().with_context(|| format!("invalid number '{text}'"))
}

fn numbers(args: &[&str], count: usize, usage: &str) -> anyhow::Result<Vec<f32>> {
    if args.len() != count {
        bail!("usage: {usage}");
    }
    args.iter().map(|arg| number(arg)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_and_comment_lines() {
        assert_eq!(parse("   ").unwrap(), None);
        assert_eq!(parse("# warm up").unwrap(), None);
    }

    #[test]
    fn test_selection_keeps_spaces_in_names() {
        assert_eq!(
            parse("select  Stations/Morning Show ").unwrap(),
            Some(ConsoleCommand::Select("Stations/Morning Show".to_string()))
        );
        assert_eq!(parse("NEXT 3").unwrap(), Some(ConsoleCommand::NextSource(3)));
        assert!(parse("select").is_err());
        assert!(parse("next streams").is_err());
    }

    #[test]
    fn test_volume_forms() {
        assert_eq!(parse("volume").unwrap(), Some(ConsoleCommand::ShowVolume));
        assert_eq!(parse("vol 80").unwrap(), Some(ConsoleCommand::SetVolume(80.0)));
        assert_eq!(parse("volume up").unwrap(), Some(ConsoleCommand::VolumeUp(0.0)));
        assert_eq!(parse("volume down 10").unwrap(), Some(ConsoleCommand::VolumeDown(10.0)));
        assert!(parse("volume loud").is_err());
    }

    #[test]
    fn test_positions_and_fade() {
        assert_eq!(
            parse("pos 0 0 0 300 400 0").unwrap(),
            Some(ConsoleCommand::Positions {
                emitter: Position::new(0.0, 0.0, 0.0),
                listener: Position::new(300.0, 400.0, 0.0),
            })
        );
        assert_eq!(
            parse("fade -1 0 0").unwrap(),
            Some(ConsoleCommand::Fade { min: -1.0, max: 0.0, pan: 0.0 })
        );
        assert!(parse("pos 1 2 3").is_err());
    }

    #[test]
    fn test_device_and_unknown() {
        assert_eq!(parse("device 7").unwrap(), Some(ConsoleCommand::Device(DeviceId::new(7))));
        assert!(parse("device seven").is_err());
        assert!(parse("dance").is_err());
    }
}
