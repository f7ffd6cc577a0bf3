//! Compact line notation for records
//!
//! Used by fixtures, the bindings and the worker. The editor's full syntax is
//! handled by its own parser; this reader covers what the records carry.
//!
//! ```text
//! user:Actor
//! /order:Order           # created later
//! shop:Shop[v] "The shop" # active object with a label
//!                         # blank line ends the objects
//! user:shop.buy()
//! shop:order.new()
//! shop[m]:<<user.done     # explicit return from shop (mnemonic m) to user
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{char, digit1, space0},
    combinator::{map, opt, value},
    multi::separated_list1,
    sequence::{delimited, preceded, terminated},
    IResult, Parser,
};

use crate::record::{Marker, MessageRecord, ObjectFlags, ObjectRecord, Record, NO_CALLER};

/// Notation error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NotationError {
    #[error("Syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },
}

/// Read all records of `input`
pub fn read(input: &str) -> Result<Vec<Record>, NotationError> {
    let mut records = Vec::new();
    let mut declaring = true;
    let mut offset = 0;

    for (index, raw) in input.split_inclusive('\n').enumerate() {
        let position = offset;
        offset += raw.len();
        let line = strip_comment(raw).trim();

        if line.is_empty() {
            if declaring && !records.is_empty() {
                records.push(Record::EndOfObjects);
                declaring = false;
            }
            continue;
        }

        let error = |message: String| NotationError::Syntax {
            line: index + 1,
            message,
        };

        if declaring {
            let (rest, mut object) = parse_object(line)
                .map_err(|e| error(format!("expected an object declaration: {:?}", e)))?;
            if !rest.trim().is_empty() {
                return Err(error(format!("unexpected input: {}", rest)));
            }
            object.position = position;
            records.push(Record::Object(object));
            continue;
        }

        if let Some(marker) = parse_marker(line) {
            records.push(Record::Marker { marker, position });
            continue;
        }

        let (_, mut message) =
            parse_message(line).map_err(|e| error(format!("expected a message: {:?}", e)))?;
        message.position = position;
        records.push(Record::Message(message));
    }

    Ok(records)
}

/// A comment starts at a `#` outside quotes that opens the line or follows whitespace
fn strip_comment(line: &str) -> &str {
    let mut quoted = false;
    let mut previous = ' ';
    for (i, c) in line.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '#' if !quoted && previous.is_whitespace() => return &line[..i],
            _ => {}
        }
        previous = c;
    }
    line
}

fn parse_identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_').parse(input)
}

/// `[/]name:Type[flags] ["label"]`
fn parse_object(input: &str) -> IResult<&str, ObjectRecord> {
    let (input, not_alive) = opt(char('/')).parse(input)?;
    let (input, name) = parse_identifier(input)?;
    let (input, _) = char(':').parse(input)?;
    let (input, type_name) = parse_identifier(input)?;
    let (input, flags) = opt(delimited(
        char('['),
        take_while(|c: char| c.is_ascii_alphabetic()),
        char(']'),
    ))
    .parse(input)?;
    let (input, _) = space0.parse(input)?;
    let (input, label) = opt(delimited(char('"'), take_until("\""), char('"'))).parse(input)?;

    let flags = flags.unwrap_or("");
    let mut record = ObjectRecord::new(name, type_name);
    record.label = label.map(|s| s.to_string());
    record.flags = ObjectFlags {
        alive_from_start: not_alive.is_none(),
        anonymous: flags.contains('a'),
        role: flags.contains('r'),
        active_object: flags.contains('v'),
        always_active: flags.contains('p'),
        has_thread: flags.contains('t'),
        autodestroy: flags.contains('x'),
        external: flags.contains('e'),
    };
    Ok((input, record))
}

fn parse_marker(line: &str) -> Option<Marker> {
    if line == "[/c]" {
        return Some(Marker::FragmentEnd);
    }
    if let Some(rest) = line.strip_prefix("[c") {
        let label = rest.strip_suffix(']').unwrap_or(rest).trim();
        return Some(Marker::FragmentStart {
            label: label.to_string(),
        });
    }
    if let Some(rest) = line.strip_prefix("--") {
        return Some(Marker::Section {
            label: rest.trim().to_string(),
        });
    }
    line.strip_prefix('*').map(|rest| Marker::Note {
        text: rest.trim().to_string(),
    })
}

/// What follows the caller's `:`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prefix {
    Spawn,
    Instant,
    Return,
}

/// Caller bracket: thread number or mnemonic
enum CallerTag<'a> {
    Thread(u32),
    Mnemonic(&'a str),
}

fn parse_caller_tag(input: &str) -> IResult<&str, CallerTag<'_>> {
    delimited(
        char('['),
        alt((
            map(digit1, |n: &str| CallerTag::Thread(n.parse().unwrap_or(u32::MAX))),
            map(parse_identifier, CallerTag::Mnemonic),
        )),
        char(']'),
    )
    .parse(input)
}

fn parse_prefix(input: &str) -> IResult<&str, Prefix> {
    alt((
        value(Prefix::Return, tag("<<")),
        value(Prefix::Spawn, tag(">")),
        value(Prefix::Instant, tag("<")),
    ))
    .parse(input)
}

/// `callee[,callee...][\[mnemonic\]].`
fn parse_target(input: &str) -> IResult<&str, (Vec<&str>, Option<&str>)> {
    let (input, callees) = separated_list1(char(','), parse_identifier).parse(input)?;
    let (input, mnemonic) =
        opt(delimited(char('['), parse_identifier, char(']'))).parse(input)?;
    let (input, _) = char('.').parse(input)?;
    Ok((input, (callees, mnemonic)))
}

/// `caller[^level][\[thread|mnemonic\]]:[>|<|<<][answer=]target.text` or `caller:text`
fn parse_message(input: &str) -> IResult<&str, MessageRecord> {
    let (input, caller) = alt((tag(NO_CALLER), parse_identifier)).parse(input)?;
    let (input, level) = opt(preceded(char('^'), digit1)).parse(input)?;
    let (input, caller_tag) = opt(parse_caller_tag).parse(input)?;
    let (input, _) = char(':').parse(input)?;
    let (input, prefix) = opt(parse_prefix).parse(input)?;
    let (input, answer) = opt(terminated(parse_identifier, char('='))).parse(input)?;
    let (input, target) = opt(parse_target).parse(input)?;

    let text = input.trim().to_string();
    let mut record = MessageRecord {
        caller: caller.to_string(),
        level: level.and_then(|l| l.parse().ok()).unwrap_or(0),
        answer: answer.map(|a| a.to_string()),
        spawns: prefix == Some(Prefix::Spawn),
        returns_instantly: prefix == Some(Prefix::Instant),
        returning: prefix == Some(Prefix::Return),
        ..MessageRecord::default()
    };
    match caller_tag {
        Some(CallerTag::Thread(n)) => record.thread = Some(n),
        Some(CallerTag::Mnemonic(m)) => record.caller_mnemonic = Some(m.to_string()),
        None => {}
    }
    if let Some((callees, mnemonic)) = target {
        record.broadcast = callees.len() > 1;
        record.callees = callees.into_iter().map(|c| c.to_string()).collect();
        record.callee_mnemonic = mnemonic.map(|m| m.to_string());
        record.is_new = is_keyword(&text, "new");
        record.destroys = is_keyword(&text, "destroy");
    }
    record.text = text;
    Ok(("", record))
}

/// `new`, `new(...)` or `new ...`
fn is_keyword(text: &str, keyword: &str) -> bool {
    text.strip_prefix(keyword)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('(') || rest.starts_with(' '))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn messages(input: &str) -> Vec<MessageRecord> {
        read(input)
            .unwrap()
            .into_iter()
            .filter_map(|r| match r {
                Record::Message(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_objects_then_messages() {
        let records = read("a:A\nb:B\n\na:b.foo()\n").unwrap();
        assert_eq!(records.len(), 4);
        assert!(matches!(records[2], Record::EndOfObjects));
        match &records[3] {
            Record::Message(m) => {
                assert_eq!(m.caller, "a");
                assert_eq!(m.callees, vec!["b".to_string()]);
                assert_eq!(m.text, "foo()");
                assert_eq!(m.position, 9);
            }
            _ => panic!("Expected Message"),
        }
    }

    #[test]
    fn test_object_flags_and_label() {
        let records = read("/shop:Shop[vx] \"The shop\"\n").unwrap();
        match &records[0] {
            Record::Object(o) => {
                assert_eq!(o.name, "shop");
                assert_eq!(o.type_name, "Shop");
                assert_eq!(o.label.as_deref(), Some("The shop"));
                assert!(!o.flags.alive_from_start);
                assert!(o.flags.active_object);
                assert!(o.flags.autodestroy);
                assert!(!o.flags.has_thread);
            }
            _ => panic!("Expected Object"),
        }
    }

    #[test]
    fn test_message_decorations() {
        let m = &messages("a:A\n\na^1[2]:>r=b[m].run()\n")[0];
        assert_eq!(m.level, 1);
        assert_eq!(m.thread, Some(2));
        assert!(m.spawns);
        assert_eq!(m.answer.as_deref(), Some("r"));
        assert_eq!(m.callee_mnemonic.as_deref(), Some("m"));
        assert_eq!(m.text, "run()");
    }

    #[test]
    fn test_constructor_destroy_and_primitive() {
        let ms = messages("a:A\n\na:b.new()\na:b.destroy\na:stop\na:b.newsletter()\n");
        assert!(ms[0].is_new);
        assert!(ms[1].destroys);
        assert!(ms[2].is_stop());
        assert!(!ms[3].is_new);
    }

    #[test]
    fn test_broadcast_and_returns() {
        let ms = messages("a:A\n\na:b,c.go()\nb[x]:<<a.ok\n$:>b.run\nc:<d.ping\n");
        assert!(ms[0].broadcast);
        assert_eq!(ms[0].callees.len(), 2);
        assert!(ms[1].returning);
        assert_eq!(ms[1].caller_mnemonic.as_deref(), Some("x"));
        assert!(ms[2].has_no_caller());
        assert!(ms[3].returns_instantly);
    }

    #[test]
    fn test_markers_and_comments() {
        let records = read("a:A # the only object\n\n[c loop forever]\n* thinking\n--\n[/c]\n").unwrap();
        let markers: Vec<_> = records
            .iter()
            .filter_map(|r| match r {
                Record::Marker { marker, .. } => Some(marker.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            markers,
            vec![
                Marker::FragmentStart {
                    label: "loop forever".to_string()
                },
                Marker::Note {
                    text: "thinking".to_string()
                },
                Marker::Section {
                    label: String::new()
                },
                Marker::FragmentEnd,
            ]
        );
    }

    #[test]
    fn test_hash_inside_text_is_kept() {
        let records = read("t:Ticket \"Ticket #42\" # tracked\n\nt:t.close(#42)\nt:t.tag(a #b)\n# whole line\n").unwrap();
        match &records[0] {
            Record::Object(o) => assert_eq!(o.label.as_deref(), Some("Ticket #42")),
            _ => panic!("Expected Object"),
        }
        let texts: Vec<_> = records
            .iter()
            .filter_map(|r| match r {
                Record::Message(m) => Some(m.text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["close(#42)", "tag(a"]);
    }

    #[test]
    fn test_syntax_error_reports_line() {
        let err = read("a:A\n\n:b.x\n").unwrap_err();
        assert!(matches!(err, NotationError::Syntax { line: 3, .. }));
        let err = read("a:A extra\n").unwrap_err();
        assert!(matches!(err, NotationError::Syntax { line: 1, .. }));
    }
}
