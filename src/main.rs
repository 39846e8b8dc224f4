use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};

use lifebot_town::game_state::{GameplayChanges, ViewMode};
use lifebot_town::{
    ContentPack, DomainEvent, KeyCode, KeyEvent, ManualClock, Session,
};

const DEMO_SCRIPT: &str = include_str!("../assets/demo.script");

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let pack = match &options.content {
        Some(path) => ContentPack::load(path)?,
        None => ContentPack::bundled()?,
    };
    let script = match &options.script {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("unable to read script {}", path.display()))?,
        None => DEMO_SCRIPT.to_string(),
    };
    let commands = parse_script(&script)?;

    println!(
        "Loaded Lifebot Town with {} quests, {} jobs and {} props",
        pack.quests.len(),
        pack.jobs.len(),
        pack.props.len()
    );

    let clock = Arc::new(ManualClock::new());
    let mut session = Session::new(&pack, clock.clone())?;
    session.tick();

    let mut printed = 0;
    for (line, command) in &commands {
        debug!("line {line}: {command:?}");
        command
            .apply(&mut session, &clock)
            .with_context(|| format!("script line {line} failed"))?;
        if !options.summary_only {
            printed = print_new_notifications(&session, printed);
        }
    }
    info!("script finished after {} commands", commands.len());

    print!("{}", session.summary());
    Ok(())
}

fn print_new_notifications(session: &Session, already_printed: usize) -> usize {
    let history = session.hud().history();
    for text in history.iter().skip(already_printed) {
        println!("  > {text}");
    }
    history.len()
}

#[derive(Debug, Clone, PartialEq)]
enum ScriptCommand {
    Look(String),
    LookAway,
    Press(KeyCode, usize),
    Hold(KeyCode),
    Release(KeyCode),
    Tick,
    Wait(f64),
    Emit(DomainEvent),
    Avatar { field: String, value: String },
    View(ViewMode),
    Dinosaurs(bool),
    Print,
}

impl ScriptCommand {
    fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or_else(|| anyhow!("empty command"))?;
        let args: Vec<&str> = words.collect();
        let arg = |index: usize| {
            args.get(index)
                .copied()
                .ok_or_else(|| anyhow!("{verb} expects at least {} argument(s)", index + 1))
        };
        let command = match verb {
            "look" => ScriptCommand::Look(arg(0)?.to_string()),
            "look-away" => ScriptCommand::LookAway,
            "press" => {
                let times = match args.get(1) {
                    Some(count) => count
                        .trim_start_matches('x')
                        .parse()
                        .with_context(|| format!("invalid repeat count {count}"))?,
                    None => 1,
                };
                ScriptCommand::Press(parse_key(arg(0)?)?, times)
            }
            "hold" => ScriptCommand::Hold(parse_key(arg(0)?)?),
            "release" => ScriptCommand::Release(parse_key(arg(0)?)?),
            "tick" => ScriptCommand::Tick,
            "wait" => {
                let millis = arg(0)?;
                ScriptCommand::Wait(
                    millis
                        .parse()
                        .with_context(|| format!("invalid duration {millis}"))?,
                )
            }
            "emit" => {
                let name = arg(0)?;
                let event = DomainEvent::from_name(name)
                    .unwrap_or_else(|| DomainEvent::Custom(name.to_string()));
                ScriptCommand::Emit(event)
            }
            "avatar" => ScriptCommand::Avatar {
                field: arg(0)?.to_string(),
                value: arg(1)?.to_string(),
            },
            "view" => ScriptCommand::View(match arg(0)? {
                "first-person" => ViewMode::FirstPerson,
                "third-person" | "third-person-back" => ViewMode::ThirdPersonBack,
                other => bail!("unknown view mode {other}"),
            }),
            "dinosaurs" => ScriptCommand::Dinosaurs(match arg(0)? {
                "on" => true,
                "off" => false,
                other => bail!("dinosaurs expects on or off, got {other}"),
            }),
            "print" => ScriptCommand::Print,
            other => bail!("unknown command {other}"),
        };
        Ok(command)
    }

    fn apply(&self, session: &mut Session, clock: &ManualClock) -> Result<()> {
        match self {
            ScriptCommand::Look(prop) => session.look_at(prop)?,
            ScriptCommand::LookAway => session.look_away(),
            ScriptCommand::Press(code, times) => {
                for _ in 0..*times {
                    session.press(*code);
                }
                session.tick();
            }
            ScriptCommand::Hold(code) => session.handle(&KeyEvent::pressed(*code)),
            ScriptCommand::Release(code) => session.handle(&KeyEvent::released(*code)),
            ScriptCommand::Tick => session.tick(),
            ScriptCommand::Wait(millis) => {
                clock.advance(*millis);
                session.tick();
            }
            ScriptCommand::Emit(event) => {
                session.state().emit(event.clone());
                session.tick();
            }
            ScriptCommand::Avatar { field, value } => {
                session.state().set_avatar_option(field, value)
            }
            ScriptCommand::View(mode) => session.state().update_gameplay_settings(GameplayChanges {
                view_mode: Some(*mode),
                ..GameplayChanges::default()
            }),
            ScriptCommand::Dinosaurs(enabled) => {
                session.state().update_gameplay_settings(GameplayChanges {
                    dinosaurs_enabled: Some(*enabled),
                    ..GameplayChanges::default()
                })
            }
            ScriptCommand::Print => print!("{}", session.summary()),
        }
        Ok(())
    }
}

fn parse_key(name: &str) -> Result<KeyCode> {
    KeyCode::from_name(name)
        .or_else(|| KeyCode::from_code(name))
        .ok_or_else(|| anyhow!("unknown key {name}"))
}

/// Parses one command per line; blank lines and `#` comments are skipped.
fn parse_script(source: &str) -> Result<Vec<(usize, ScriptCommand)>> {
    source
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.split('#').next().unwrap_or("").trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(number, line)| {
            ScriptCommand::parse(line)
                .map(|command| (number, command))
                .with_context(|| format!("line {number}: {line}"))
        })
        .collect()
}

struct CliOptions {
    content: Option<PathBuf>,
    script: Option<PathBuf>,
    summary_only: bool,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut args = env::args().skip(1);
        let mut options = CliOptions {
            content: None,
            script: None,
            summary_only: false,
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--content" => {
                    let path = args
                        .next()
                        .ok_or_else(|| anyhow!("--content expects a path"))?;
                    options.content = Some(PathBuf::from(path));
                }
                "--script" => {
                    let path = args
                        .next()
                        .ok_or_else(|| anyhow!("--script expects a path"))?;
                    options.script = Some(PathBuf::from(path));
                }
                "--summary-only" => options.summary_only = true,
                other => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Usage: lifebot-town [--content <pack.xml>] [--script <file>] [--summary-only]"
                    ));
                }
            }
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_skips_comments() {
        let commands = parse_script(
            "# warm up\nlook fountain\n\npress E # talk\npress A x5\nwait 12000\nemit secret-sequence\n",
        )
        .unwrap();
        assert_eq!(
            commands,
            vec![
                (2, ScriptCommand::Look("fountain".into())),
                (4, ScriptCommand::Press(KeyCode::Character('E'), 1)),
                (5, ScriptCommand::Press(KeyCode::Character('A'), 5)),
                (6, ScriptCommand::Wait(12_000.0)),
                (7, ScriptCommand::Emit(DomainEvent::SecretSequence)),
            ]
        );
    }

    #[test]
    fn reports_the_line_of_an_unknown_command() {
        let err = parse_script("look fountain\ndance\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }
}
