//! Line commands understood by the terminal host.

use chrono::{DateTime, NaiveDate, Utc};

use crate::filter::PAGE_SIZE_OPTIONS;
use crate::selection::ProjectScope;

pub const HELP: &str = "\
Commands:
  page N             jump to page N
  next | prev        move one page
  limit N            rows per page (5, 10, 20, 50)
  project ID|all     select a project, or all projects
  from DATE|none     pick the start date (YYYY-MM-DD or RFC 3339)
  to DATE|none       pick the end date
  apply              apply the picked date range
  clear              reset filters, keeping the selected project
  refresh            fetch the current page again
  login U P          log in
  register U E P     create an account and log in
  logout             log out
  whoami             show the logged-in user
  help               show this help
  quit               exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Page(u32),
    Next,
    Prev,
    Limit(u32),
    Project(ProjectScope),
    From(Option<DateTime<Utc>>),
    To(Option<DateTime<Utc>>),
    Apply,
    Clear,
    Refresh,
    Login { username: String, password: String },
    Register { username: String, email: String, password: String },
    Logout,
    WhoAmI,
    Help,
    Quit,
}

/// Accepts `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(at) = date.and_hms_opt(0, 0, 0) {
            return Ok(at.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|_| format!("'{}' is not a date (use YYYY-MM-DD)", raw))
}

fn parse_date_arg(arg: Option<&str>) -> Result<Option<DateTime<Utc>>, String> {
    match arg {
        None | Some("none") | Some("-") => Ok(None),
        Some(raw) => parse_date(raw).map(Some),
    }
}

fn expect_args(name: &str, args: &[&str], count: usize) -> Result<(), String> {
    if args.len() != count {
        return Err(format!("'{}' takes {} argument(s), see 'help'", name, count));
    }
    Ok(())
}

pub fn parse(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let name = words.next().ok_or_else(|| "empty command".to_string())?;
    let args: Vec<&str> = words.collect();

    let command = match name.to_ascii_lowercase().as_str() {
        "page" => {
            expect_args(name, &args, 1)?;
            let page: u32 = args[0]
                .parse()
                .map_err(|_| format!("'{}' is not a page number", args[0]))?;
            if page == 0 {
                return Err("pages start at 1".to_string());
            }
            Command::Page(page)
        }
        "next" | "n" => Command::Next,
        "prev" | "p" => Command::Prev,
        "limit" => {
            expect_args(name, &args, 1)?;
            let limit: u32 = args[0]
                .parse()
                .map_err(|_| format!("'{}' is not a number", args[0]))?;
            if !PAGE_SIZE_OPTIONS.contains(&limit) {
                return Err(format!("limit must be one of {:?}", PAGE_SIZE_OPTIONS));
            }
            Command::Limit(limit)
        }
        "project" => {
            expect_args(name, &args, 1)?;
            Command::Project(ProjectScope::normalize(Some(args[0])))
        }
        "from" => Command::From(parse_date_arg(args.first().copied())?),
        "to" => Command::To(parse_date_arg(args.first().copied())?),
        "apply" => Command::Apply,
        "clear" => Command::Clear,
        "refresh" | "r" => Command::Refresh,
        "login" => {
            expect_args(name, &args, 2)?;
            Command::Login {
                username: args[0].to_string(),
                password: args[1].to_string(),
            }
        }
        "register" => {
            expect_args(name, &args, 3)?;
            Command::Register {
                username: args[0].to_string(),
                email: args[1].to_string(),
                password: args[2].to_string(),
            }
        }
        "logout" => Command::Logout,
        "whoami" => Command::WhoAmI,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command '{}', try 'help'", other)),
    };
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_paging_commands() {
        assert_eq!(parse("page 3"), Ok(Command::Page(3)));
        assert_eq!(parse("  NEXT "), Ok(Command::Next));
        assert_eq!(parse("prev"), Ok(Command::Prev));
        assert!(parse("page 0").is_err());
        assert!(parse("page two").is_err());
        assert!(parse("page").is_err());
    }

    #[test]
    fn test_limit_must_be_an_option() {
        assert_eq!(parse("limit 20"), Ok(Command::Limit(20)));
        assert!(parse("limit 7").is_err());
    }

    #[test]
    fn test_project_all_is_normalized() {
        assert_eq!(parse("project all"), Ok(Command::Project(ProjectScope::All)));
        assert_eq!(
            parse("project p1"),
            Ok(Command::Project(ProjectScope::Project("p1".to_string())))
        );
    }

    #[test]
    fn test_dates() {
        let midnight = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        assert_eq!(parse("from 2024-03-02"), Ok(Command::From(Some(midnight))));

        let noon = Utc.with_ymd_and_hms(2024, 3, 2, 12, 30, 0).unwrap();
        assert_eq!(parse("to 2024-03-02T14:30:00+02:00"), Ok(Command::To(Some(noon))));

        assert_eq!(parse("from none"), Ok(Command::From(None)));
        assert_eq!(parse("to"), Ok(Command::To(None)));
        assert!(parse("from yesterday").is_err());
    }

    #[test]
    fn test_auth_commands() {
        assert_eq!(
            parse("login ayu secret"),
            Ok(Command::Login {
                username: "ayu".to_string(),
                password: "secret".to_string()
            })
        );
        assert!(parse("register ayu secret").is_err());
        assert_eq!(parse("whoami"), Ok(Command::WhoAmI));
    }

    #[test]
    fn test_unknown_and_empty() {
        assert!(parse("").is_err());
        assert!(parse("dance").unwrap_err().contains("unknown command"));
    }
}
