use serde::{Deserialize, Serialize};
use std::fmt;

/// Playable coordinates run 1..=ARENA_SIZE on both axes.
pub const ARENA_SIZE: usize = 20;
pub const GRID_BYTES: usize = ARENA_SIZE * ARENA_SIZE;
pub const MAX_PLAYERS: usize = 8;
pub const TICKET_LEN: usize = 6;

pub const EMPTY_GLYPH: u8 = b' ';
pub const ALIEN_GLYPH: u8 = b'*';
pub const HORIZONTAL_BEAM_GLYPH: u8 = b'-';
pub const VERTICAL_BEAM_GLYPH: u8 = b'|';

/// Ticket text sent back in a join reply when every zone is taken.
pub const FULL_TICKET: &str = "FULL";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Join,
    Move,
    Fire,
    Leave,
}

/// UP/DOWN change the row, LEFT/RIGHT change the column.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];
}

/// Session secret: up to six ASCII bytes followed by a NUL terminator.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ticket([u8; TICKET_LEN + 1]);

impl Ticket {
    /// Builds a ticket from text, keeping at most `TICKET_LEN` bytes.
    pub fn new(text: &str) -> Self {
        let mut bytes = [0u8; TICKET_LEN + 1];
        for (slot, byte) in bytes.iter_mut().zip(text.bytes().take(TICKET_LEN)) {
            *slot = byte;
        }
        Self(bytes)
    }

    pub fn full() -> Self {
        Self::new(FULL_TICKET)
    }

    pub fn as_str(&self) -> &str {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(TICKET_LEN);
        std::str::from_utf8(&self.0[..end]).unwrap_or("")
    }

    pub fn is_full(&self) -> bool {
        self.as_str() == FULL_TICKET
    }
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ticket({:?})", self.as_str())
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-size control message exchanged on the request/reply channel.
///
/// Join replies reuse this structure: the server fills in the assigned glyph
/// and ticket, or sets the ticket to `FULL` when the arena has no free zone.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ControlMessage {
    pub msg_type: MessageType,
    pub glyph: u8,
    pub ticket: Ticket,
    /// Only meaningful for `MessageType::Move`.
    pub direction: Direction,
}

impl ControlMessage {
    pub fn join() -> Self {
        Self {
            msg_type: MessageType::Join,
            glyph: 0,
            ticket: Ticket::default(),
            direction: Direction::Up,
        }
    }

    pub fn movement(glyph: u8, ticket: Ticket, direction: Direction) -> Self {
        Self {
            msg_type: MessageType::Move,
            glyph,
            ticket,
            direction,
        }
    }

    pub fn fire(glyph: u8, ticket: Ticket) -> Self {
        Self {
            msg_type: MessageType::Fire,
            glyph,
            ticket,
            direction: Direction::Up,
        }
    }

    pub fn leave(glyph: u8, ticket: Ticket) -> Self {
        Self {
            msg_type: MessageType::Leave,
            glyph,
            ticket,
            direction: Direction::Up,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ScoreEntry {
    pub glyph: u8,
    pub score: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Packet {
    // Control channel
    Request(ControlMessage),
    Joined(ControlMessage),
    Score {
        text: String,
    },

    // Broadcast channel
    Subscribe,
    Unsubscribe,
    Scoreboard {
        entries: Vec<ScoreEntry>,
    },
    Grid {
        cells: Vec<u8>,
    },
    GameOver {
        winner: Option<u8>,
        score: u32,
    },
}

/// Index of a 1-based (row, col) coordinate inside a grid snapshot.
pub fn cell_index(row: usize, col: usize) -> usize {
    (row - 1) * ARENA_SIZE + (col - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bincode::{deserialize, serialize};

    #[test]
    fn test_ticket_round_trips_text() {
        let ticket = Ticket::new("aB3xY9");
        assert_eq!(ticket.as_str(), "aB3xY9");
        assert!(!ticket.is_full());
    }

    #[test]
    fn test_ticket_truncates_long_text() {
        let ticket = Ticket::new("abcdefghij");
        assert_eq!(ticket.as_str(), "abcdef");
    }

    #[test]
    fn test_full_ticket() {
        let ticket = Ticket::full();
        assert!(ticket.is_full());
        assert_eq!(ticket.to_string(), "FULL");
    }

    #[test]
    fn test_default_ticket_is_empty() {
        assert_eq!(Ticket::default().as_str(), "");
    }

    #[test]
    fn test_control_messages_have_fixed_size() {
        let join = serialize(&ControlMessage::join()).unwrap();
        let movement = serialize(&ControlMessage::movement(
            b'A',
            Ticket::new("abc123"),
            Direction::Right,
        ))
        .unwrap();
        let leave = serialize(&ControlMessage::leave(b'H', Ticket::full())).unwrap();

        assert_eq!(join.len(), movement.len());
        assert_eq!(join.len(), leave.len());
    }

    #[test]
    fn test_message_type_wire_values() {
        // Variant indices are the numeric message codes (0=join .. 3=leave).
        let codes: Vec<u32> = [
            MessageType::Join,
            MessageType::Move,
            MessageType::Fire,
            MessageType::Leave,
        ]
        .iter()
        .map(|t| {
            let bytes = serialize(t).unwrap();
            u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
        })
        .collect();

        assert_eq!(codes, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_packet_serialization_request() {
        let packet = Packet::Request(ControlMessage::fire(b'C', Ticket::new("zzzzzz")));
        let serialized = serialize(&packet).unwrap();
        let deserialized: Packet = deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Request(message) => {
                assert_eq!(message.msg_type, MessageType::Fire);
                assert_eq!(message.glyph, b'C');
                assert_eq!(message.ticket.as_str(), "zzzzzz");
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_scoreboard() {
        let packet = Packet::Scoreboard {
            entries: vec![
                ScoreEntry {
                    glyph: b'A',
                    score: 3,
                },
                ScoreEntry {
                    glyph: b'F',
                    score: 0,
                },
            ],
        };

        let deserialized: Packet = deserialize(&serialize(&packet).unwrap()).unwrap();
        assert_eq!(deserialized, packet);
    }

    #[test]
    fn test_cell_index_is_row_major() {
        assert_eq!(cell_index(1, 1), 0);
        assert_eq!(cell_index(1, 20), 19);
        assert_eq!(cell_index(2, 1), 20);
        assert_eq!(cell_index(20, 20), GRID_BYTES - 1);
    }

    #[test]
    fn test_direction_all_is_complete() {
        assert_eq!(Direction::ALL.len(), 4);
        assert!(Direction::ALL.contains(&Direction::Left));
    }
}
