//! Typed client/server message set built on top of the §4.1 text codec.
//! Every variant has a serde derive, matching the pack's convention of
//! giving wire types a typed Rust representation even when the wire
//! format itself is hand-rolled, for use in tests and logging.

use crate::codec::{decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientMessage {
    Hello,
    Choose { course_id: i64 },
    Unchoose { course_id: i64 },
    Confirm,
    Unconfirm,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    Hi { course_ids: Vec<i64> },
    Start,
    Stop,
    Accepted { course_id: i64 },
    Rejected { course_id: i64 },
    Full { course_id: i64 },
    GroupConflict { course_id: i64 },
    SeatCount { course_id: i64, selected: u32 },
    Confirmed,
    Unconfirmed,
    ConfirmRejected { reason: String },
    Unauthenticated,
    Error { reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty frame")]
    Empty,
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("wrong argument count for {0:?}")]
    WrongArgCount(String),
    #[error("invalid course id {0:?}")]
    InvalidCourseId(String),
}

impl ClientMessage {
    /// Parses a decoded frame's fields into a typed client command. Mirrors
    /// the dispatch `switch` the connection session performs per §4.7,
    /// surfaced here as a reusable parser for the protocol crate's own
    /// tests and for `cca-test-utils`.
    pub fn from_fields(fields: &[String]) -> Result<ClientMessage, DecodeError> {
        let Some(cmd) = fields.first() else {
            return Err(DecodeError::Empty);
        };
        match cmd.as_str() {
            "HELLO" => {
                if fields.len() != 1 {
                    return Err(DecodeError::WrongArgCount(cmd.clone()));
                }
                Ok(ClientMessage::Hello)
            }
            "Y" | "N" => {
                if fields.len() != 2 {
                    return Err(DecodeError::WrongArgCount(cmd.clone()));
                }
                let course_id = fields[1]
                    .parse::<i64>()
                    .map_err(|_| DecodeError::InvalidCourseId(fields[1].clone()))?;
                Ok(if cmd == "Y" {
                    ClientMessage::Choose { course_id }
                } else {
                    ClientMessage::Unchoose { course_id }
                })
            }
            "YC" => {
                if fields.len() != 1 {
                    return Err(DecodeError::WrongArgCount(cmd.clone()));
                }
                Ok(ClientMessage::Confirm)
            }
            "NC" => {
                if fields.len() != 1 {
                    return Err(DecodeError::WrongArgCount(cmd.clone()));
                }
                Ok(ClientMessage::Unconfirm)
            }
            other => Err(DecodeError::UnknownCommand(other.to_owned())),
        }
    }

    pub fn parse(frame: &str) -> Result<ClientMessage, DecodeError> {
        ClientMessage::from_fields(&decode(frame))
    }

    pub fn to_frame(&self) -> String {
        match self {
            ClientMessage::Hello => "HELLO".to_owned(),
            ClientMessage::Choose { course_id } => encode(&["Y", &course_id.to_string()]),
            ClientMessage::Unchoose { course_id } => encode(&["N", &course_id.to_string()]),
            ClientMessage::Confirm => "YC".to_owned(),
            ClientMessage::Unconfirm => "NC".to_owned(),
        }
    }
}

impl ServerMessage {
    pub fn to_frame(&self) -> String {
        match self {
            ServerMessage::Hi { course_ids } => {
                let joined = course_ids
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                encode(&["HI", &joined])
            }
            ServerMessage::Start => "START".to_owned(),
            ServerMessage::Stop => "STOP".to_owned(),
            ServerMessage::Accepted { course_id } => encode(&["Y", &course_id.to_string()]),
            ServerMessage::Rejected { course_id } => encode(&["N", &course_id.to_string()]),
            ServerMessage::Full { course_id } => {
                encode(&["R", &course_id.to_string(), "Full"])
            }
            ServerMessage::GroupConflict { course_id } => {
                encode(&["R", &course_id.to_string(), "Group conflict"])
            }
            ServerMessage::SeatCount { course_id, selected } => {
                encode(&["M", &course_id.to_string(), &selected.to_string()])
            }
            ServerMessage::Confirmed => "YC".to_owned(),
            ServerMessage::Unconfirmed => "NC".to_owned(),
            ServerMessage::ConfirmRejected { reason } => encode(&["RC", reason]),
            ServerMessage::Unauthenticated => "U".to_owned(),
            ServerMessage::Error { reason } => encode(&["E", reason]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hello() {
        assert_eq!(ClientMessage::parse("HELLO"), Ok(ClientMessage::Hello));
    }

    #[test]
    fn parses_choose_and_unchoose() {
        assert_eq!(
            ClientMessage::parse("Y 42"),
            Ok(ClientMessage::Choose { course_id: 42 })
        );
        assert_eq!(
            ClientMessage::parse("N 42"),
            Ok(ClientMessage::Unchoose { course_id: 42 })
        );
    }

    #[test]
    fn rejects_bad_course_id() {
        assert_eq!(
            ClientMessage::parse("Y abc"),
            Err(DecodeError::InvalidCourseId("abc".to_owned()))
        );
    }

    #[test]
    fn rejects_wrong_arg_count() {
        assert_eq!(
            ClientMessage::parse("Y"),
            Err(DecodeError::WrongArgCount("Y".to_owned()))
        );
        assert_eq!(
            ClientMessage::parse("HELLO extra"),
            Err(DecodeError::WrongArgCount("HELLO".to_owned()))
        );
    }

    #[test]
    fn rejects_unknown_command() {
        assert_eq!(
            ClientMessage::parse("WAT"),
            Err(DecodeError::UnknownCommand("WAT".to_owned()))
        );
    }

    #[test]
    fn server_message_frames_match_wire_vocabulary() {
        assert_eq!(ServerMessage::Start.to_frame(), "START");
        assert_eq!(
            ServerMessage::Full { course_id: 42 }.to_frame(),
            "R 42 :Full"
        );
        assert_eq!(
            ServerMessage::GroupConflict { course_id: 11 }.to_frame(),
            "R 11 :Group conflict"
        );
        assert_eq!(
            ServerMessage::Hi {
                course_ids: vec![1, 2, 3]
            }
            .to_frame(),
            "HI :1,2,3"
        );
        assert_eq!(
            ServerMessage::Hi { course_ids: vec![] }.to_frame(),
            "HI :"
        );
        assert_eq!(
            ServerMessage::SeatCount {
                course_id: 42,
                selected: 7
            }
            .to_frame(),
            "M 42 7"
        );
    }
}
