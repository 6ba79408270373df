//! Command-line parsing.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use snapish_core::models::{CatchUpdate, Coordinates, ProfileUpdate};
use snapish_core::Route;

pub const USAGE: &str = "\
Usage: snapish <command> [args]

Session:
  login [username]              Sign in (password from SNAPISH_PASSWORD or prompt)
  logout                        Sign out and forget cached data
  signup <username> <email>     Create an account
  profile [--name n] [--email e] [--age a]
                                Show or edit your profile
  status                        Show session and cache state
  home                          Refresh tide, catches and hot issues together

Sea:
  tide                          Today's tide table
  weather [lat lon]             Weather at a position (default: home location)
  station [lat lon]             Closest sea observation point

Catch log:
  catches                       List your catches
  catch-add <date> [memo]       Log a catch (date as YYYY-MM-DD)
  catch-update <id> [--memo m] [--weight kg] [--length cm] [--date d]
  catch-delete <id>
  predict <image>               Identify the fish in a photo
  consent [yes|no]              Show or set consent to photo analysis

Community:
  posts                         List community posts
  services                      List home-screen services
  hot-issues                    List hot issues

Other:
  open <route>                  Check whether a route may be opened
  socket                        Log events from the backend socket
";

#[derive(Debug, Clone)]
pub enum Command {
    Login { username: Option<String> },
    Logout,
    Signup { username: String, email: String },
    Profile { update: Option<ProfileUpdate> },
    Status,
    Home,
    Tide,
    Weather { at: Option<Coordinates> },
    Station { at: Option<Coordinates> },
    Catches,
    CatchAdd { date: String, memo: Option<String> },
    CatchUpdate { update: CatchUpdate },
    CatchDelete { id: String },
    Predict { image: PathBuf },
    Consent { set: Option<bool> },
    Posts,
    Services,
    HotIssues,
    Open { route: Route },
    Socket,
    Help,
}

fn required<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing <{}>", name))
}

fn parse_f64(value: &str, name: &str) -> Result<f64> {
    value
        .parse()
        .with_context(|| format!("{} must be a number, got '{}'", name, value))
}

fn parse_position(args: &[String]) -> Result<Option<Coordinates>> {
    match args {
        [] => Ok(None),
        [lat, lon] => Ok(Some(Coordinates::new(
            parse_f64(lat, "Latitude")?,
            parse_f64(lon, "Longitude")?,
        ))),
        _ => bail!("Expected both <lat> and <lon>"),
    }
}

/// Split `--flag value` pairs
fn flags(args: &[String]) -> Result<Vec<(&str, &str)>> {
    let mut pairs = Vec::new();
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let name = flag
            .strip_prefix("--")
            .ok_or_else(|| anyhow!("Unexpected argument '{}'", flag))?;
        let value = iter
            .next()
            .ok_or_else(|| anyhow!("--{} needs a value", name))?;
        pairs.push((name, value.as_str()));
    }
    Ok(pairs)
}

fn parse_profile_update(args: &[String]) -> Result<Option<ProfileUpdate>> {
    if args.is_empty() {
        return Ok(None);
    }

    let mut update = ProfileUpdate::default();
    for (name, value) in flags(args)? {
        match name {
            "name" => update.full_name = Some(value.to_string()),
            "email" => update.email = Some(value.to_string()),
            "age" => {
                update.age = Some(
                    value
                        .parse()
                        .with_context(|| format!("Age must be a whole number, got '{}'", value))?,
                )
            }
            other => bail!("Unknown profile field --{}", other),
        }
    }
    Ok(Some(update))
}

fn parse_catch_update(args: &[String]) -> Result<CatchUpdate> {
    let id = required(args, 0, "id")?;
    let mut update = CatchUpdate {
        id: Some(id.to_string()),
        ..Default::default()
    };

    for (name, value) in flags(&args[1..])? {
        match name {
            "memo" => update.memo = Some(value.to_string()),
            "weight" => update.weight_kg = Some(parse_f64(value, "Weight")?),
            "length" => update.length_cm = Some(parse_f64(value, "Length")?),
            "date" => update.catch_date = Some(value.to_string()),
            other => bail!("Unknown catch field --{}", other),
        }
    }
    Ok(update)
}

impl Command {
    /// Parse the arguments after the program name
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            return Ok(Command::Help);
        };

        let command = match name.as_str() {
            "login" => Command::Login {
                username: rest.first().cloned(),
            },
            "logout" => Command::Logout,
            "signup" => Command::Signup {
                username: required(rest, 0, "username")?.to_string(),
                email: required(rest, 1, "email")?.to_string(),
            },
            "profile" => Command::Profile {
                update: parse_profile_update(rest)?,
            },
            "status" => Command::Status,
            "home" => Command::Home,
            "tide" => Command::Tide,
            "weather" => Command::Weather {
                at: parse_position(rest)?,
            },
            "station" => Command::Station {
                at: parse_position(rest)?,
            },
            "catches" => Command::Catches,
            "catch-add" => Command::CatchAdd {
                date: required(rest, 0, "date")?.to_string(),
                memo: (rest.len() > 1).then(|| rest[1..].join(" ")),
            },
            "catch-update" => Command::CatchUpdate {
                update: parse_catch_update(rest)?,
            },
            "catch-delete" => Command::CatchDelete {
                id: required(rest, 0, "id")?.to_string(),
            },
            "predict" => Command::Predict {
                image: PathBuf::from(required(rest, 0, "image")?),
            },
            "consent" => Command::Consent {
                set: match rest.first().map(String::as_str) {
                    None => None,
                    Some("yes") | Some("y") => Some(true),
                    Some("no") | Some("n") => Some(false),
                    Some(other) => bail!("Expected yes or no, got '{}'", other),
                },
            },
            "posts" => Command::Posts,
            "services" => Command::Services,
            "hot-issues" => Command::HotIssues,
            "open" => Command::Open {
                route: required(rest, 0, "route")?.parse()?,
            },
            "socket" => Command::Socket,
            "help" | "-h" | "--help" => Command::Help,
            other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
        };
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_parse_simple_commands() {
        assert!(matches!(Command::parse(&[]), Ok(Command::Help)));
        assert!(matches!(Command::parse(&args("tide")), Ok(Command::Tide)));
        assert!(matches!(Command::parse(&args("home")), Ok(Command::Home)));
        assert!(matches!(
            Command::parse(&args("login gull")),
            Ok(Command::Login { username: Some(u) }) if u == "gull"
        ));
        assert!(Command::parse(&args("fly")).is_err());
    }

    #[test]
    fn test_parse_position() {
        match Command::parse(&args("weather 35.1 129.04")) {
            Ok(Command::Weather { at: Some(at) }) => {
                assert_eq!(at, Coordinates::new(35.1, 129.04));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(Command::parse(&args("weather 35.1")).is_err());
        assert!(Command::parse(&args("station north east")).is_err());
    }

    #[test]
    fn test_parse_catch_update_flags() {
        let parsed = Command::parse(&args("catch-update 42 --weight 1.5 --memo rockfish"));
        match parsed {
            Ok(Command::CatchUpdate { update }) => {
                assert_eq!(update.id.as_deref(), Some("42"));
                assert_eq!(update.weight_kg, Some(1.5));
                assert_eq!(update.memo.as_deref(), Some("rockfish"));
                assert_eq!(update.length_cm, None);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(Command::parse(&args("catch-update 42 --weight")).is_err());
        assert!(Command::parse(&args("catch-update 42 --colour red")).is_err());
    }

    #[test]
    fn test_parse_catch_add_joins_memo() {
        match Command::parse(&args("catch-add 2024-05-01 big black porgy")) {
            Ok(Command::CatchAdd { date, memo }) => {
                assert_eq!(date, "2024-05-01");
                assert_eq!(memo.as_deref(), Some("big black porgy"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_open_route() {
        assert!(matches!(
            Command::parse(&args("open /catches")),
            Ok(Command::Open { route: Route::Catches })
        ));
        assert!(Command::parse(&args("open /nowhere")).is_err());
    }

    #[test]
    fn test_parse_consent() {
        assert!(matches!(
            Command::parse(&args("consent yes")),
            Ok(Command::Consent { set: Some(true) })
        ));
        assert!(matches!(
            Command::parse(&args("consent")),
            Ok(Command::Consent { set: None })
        ));
        assert!(Command::parse(&args("consent maybe")).is_err());
    }
}
