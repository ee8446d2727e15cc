use codee::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::messages::{
    Command, Location, ProcessId, ProcessReply, ProcessStatus, STATUS_FINISHED_SUCCESSFULLY, STATUS_IN_PROGRESS,
    STATUS_TERMINATED_WITH_ERROR,
};

/// Separator between the command name and each parameter.
pub const SEPARATOR: char = '%';

/// Codec for the MockRobot text protocol.
///
/// Requests are `name%param1%param2...` with no escaping and no terminator.
/// Replies are either a signed integer (process id, negative means rejected)
/// or one of the three status literals.
///
/// ## Usage
///
/// ```rust
/// use codee::{Decoder, Encoder};
/// use mockrobot_common::codec::PercentCodec;
/// use mockrobot_common::{Command, Location, ProcessReply, ProcessStatus};
///
/// let wire = PercentCodec::encode(&Command::Pick(Location(10))).unwrap();
/// assert_eq!(wire, "pick%10");
///
/// let reply: ProcessReply = PercentCodec::decode("7").unwrap();
/// assert!(matches!(reply, ProcessReply::Accepted(_)));
///
/// let status: ProcessStatus = PercentCodec::decode("In Progress").unwrap();
/// assert!(!status.is_terminal());
/// ```
pub struct PercentCodec;

impl Encoder<Command> for PercentCodec {
    type Error = ProtocolError;
    type Encoded = String;

    fn encode(val: &Command) -> Result<Self::Encoded, Self::Error> {
        encode(val.name(), &val.params())
    }
}

impl Decoder<ProcessReply> for PercentCodec {
    type Error = ProtocolError;
    type Encoded = str;

    fn decode(val: &Self::Encoded) -> Result<ProcessReply, Self::Error> {
        decode_process_id(val).map(ProcessReply::from)
    }
}

impl Decoder<ProcessStatus> for PercentCodec {
    type Error = ProtocolError;
    type Encoded = str;

    fn decode(val: &Self::Encoded) -> Result<ProcessStatus, Self::Error> {
        decode_status(val)
    }
}

impl Decoder<Command> for PercentCodec {
    type Error = ProtocolError;
    type Encoded = str;

    fn decode(val: &Self::Encoded) -> Result<Command, Self::Error> {
        decode_command(val)
    }
}

/// Joins `name` and `params` with [`SEPARATOR`], in order.
///
/// Fails when any piece already contains the separator, since the protocol
/// has no way to escape it.
pub fn encode<P: AsRef<str>>(name: &str, params: &[P]) -> Result<String, ProtocolError> {
    let mut wire = String::with_capacity(name.len() + params.len() * 4);
    push_piece(&mut wire, name)?;
    for param in params {
        wire.push(SEPARATOR);
        push_piece(&mut wire, param.as_ref())?;
    }
    Ok(wire)
}

fn push_piece(wire: &mut String, piece: &str) -> Result<(), ProtocolError> {
    if piece.contains(SEPARATOR) {
        return Err(ProtocolError::ReservedSeparator(piece.to_string()));
    }
    wire.push_str(piece);
    Ok(())
}

/// Parses a process-starting reply as a signed integer.
///
/// Negative values are returned as-is; turning them into a rejection is the
/// caller's job (see [`ProcessReply`]).
pub fn decode_process_id(reply: &str) -> Result<i64, ProtocolError> {
    let trimmed = trim_reply(reply);
    trimmed
        .parse::<i64>()
        .map_err(|_| ProtocolError::MalformedProcessId(trimmed.to_string()))
}

/// Maps one of the three status literals to [`ProcessStatus`].
pub fn decode_status(reply: &str) -> Result<ProcessStatus, ProtocolError> {
    match trim_reply(reply) {
        STATUS_IN_PROGRESS => Ok(ProcessStatus::InProgress),
        STATUS_FINISHED_SUCCESSFULLY => Ok(ProcessStatus::FinishedSuccessfully),
        STATUS_TERMINATED_WITH_ERROR => Ok(ProcessStatus::TerminatedWithError),
        other => Err(ProtocolError::UnknownStatus(other.to_string())),
    }
}

/// Parses a request the way the onboard software does.
///
/// Used by the simulator; the driver itself only ever encodes commands.
pub fn decode_command(request: &str) -> Result<Command, ProtocolError> {
    let request = trim_reply(request);
    let mut pieces = request.split(SEPARATOR);
    let name = pieces.next().unwrap_or_default();
    let params: Vec<&str> = pieces.collect();

    let (name, build): (&'static str, fn(i64) -> Option<Command>) = match name {
        "home" if params.is_empty() => return Ok(Command::Home),
        "home" => ("home", |_| None),
        "pick" => ("pick", |n| Some(Command::Pick(Location(n)))),
        "place" => ("place", |n| Some(Command::Place(Location(n)))),
        "status" => ("status", |n| {
            u64::try_from(n).ok().map(|id| Command::Status(ProcessId::new(id)))
        }),
        other => return Err(ProtocolError::UnknownCommand(other.to_string())),
    };

    let malformed = || ProtocolError::MalformedCommand {
        name,
        request: request.to_string(),
    };
    match params.as_slice() {
        [param] => param
            .parse::<i64>()
            .ok()
            .and_then(build)
            .ok_or_else(malformed),
        _ => Err(malformed()),
    }
}

// Socket reads may carry a trailing newline or NUL padding.
fn trim_reply(reply: &str) -> &str {
    reply.trim_matches(|c: char| c.is_ascii_whitespace() || c == '\0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Location, ProcessId};

    #[test]
    fn encodes_commands_in_wire_order() {
        assert_eq!(PercentCodec::encode(&Command::Home).unwrap(), "home");
        assert_eq!(
            PercentCodec::encode(&Command::Pick(Location(10))).unwrap(),
            "pick%10"
        );
        assert_eq!(
            PercentCodec::encode(&Command::Place(Location(5))).unwrap(),
            "place%5"
        );
        assert_eq!(
            PercentCodec::encode(&Command::Status(ProcessId::new(42))).unwrap(),
            "status%42"
        );
        assert_eq!(encode("move", &["1", "2", "3"]).unwrap(), "move%1%2%3");
    }

    #[test]
    fn separator_inside_a_piece_is_rejected() {
        assert_eq!(
            encode("pick", &["1%2"]),
            Err(ProtocolError::ReservedSeparator("1%2".into()))
        );
        assert!(encode::<&str>("pi%ck", &[]).is_err());
    }

    #[test]
    fn process_id_replies() {
        assert_eq!(decode_process_id("42"), Ok(42));
        assert_eq!(decode_process_id("-1"), Ok(-1));
        assert_eq!(decode_process_id("7\n"), Ok(7));
        assert_eq!(decode_process_id("7\0\0"), Ok(7));
        assert_eq!(
            decode_process_id("Error"),
            Err(ProtocolError::MalformedProcessId("Error".into()))
        );
        assert!(decode_process_id("").is_err());

        let reply: ProcessReply = PercentCodec::decode("-3").unwrap();
        assert_eq!(reply, ProcessReply::Rejected(-3));
    }

    #[test]
    fn status_decoding_is_defined_for_the_three_literals_only() {
        assert_eq!(decode_status("In Progress"), Ok(ProcessStatus::InProgress));
        assert_eq!(
            decode_status("Finished Successfully"),
            Ok(ProcessStatus::FinishedSuccessfully)
        );
        assert_eq!(
            decode_status("Terminated With Error"),
            Ok(ProcessStatus::TerminatedWithError)
        );

        for other in ["in progress", "Finished", "Unknown Process", "42", ""] {
            assert_eq!(
                decode_status(other),
                Err(ProtocolError::UnknownStatus(other.to_string())),
                "`{other}` must not decode"
            );
        }
    }

    #[test]
    fn requests_decode_like_the_onboard_software_reads_them() {
        assert_eq!(decode_command("home"), Ok(Command::Home));
        assert_eq!(decode_command("pick%10"), Ok(Command::Pick(Location(10))));
        assert_eq!(decode_command("place%5\n"), Ok(Command::Place(Location(5))));
        assert_eq!(
            decode_command("status%42"),
            Ok(Command::Status(ProcessId::new(42)))
        );

        assert_eq!(
            decode_command("dance%1"),
            Err(ProtocolError::UnknownCommand("dance".into()))
        );
        for bad in ["home%1", "pick", "pick%1%2", "pick%ten", "status%-1"] {
            assert!(
                matches!(decode_command(bad), Err(ProtocolError::MalformedCommand { .. })),
                "`{bad}` must not decode"
            );
        }
    }

    #[test]
    fn status_literals_survive_the_wire() {
        for status in [
            ProcessStatus::InProgress,
            ProcessStatus::FinishedSuccessfully,
            ProcessStatus::TerminatedWithError,
        ] {
            let decoded: ProcessStatus = PercentCodec::decode(status.as_wire()).unwrap();
            assert_eq!(decoded, status);
        }
    }
}
