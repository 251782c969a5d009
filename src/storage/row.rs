//! Fixed-width row codec.
use crate::errors::Error;
use std::str::FromStr;

pub const ID_SIZE: usize = 4;
pub const USERNAME_SIZE: usize = 32;
pub const EMAIL_SIZE: usize = 255;
pub const ROW_SIZE: usize = ID_SIZE + USERNAME_SIZE + EMAIL_SIZE;

const ID_OFFSET: usize = 0;
const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;

/// One record: a non-negative id, a NUL-terminated username, a
/// NUL-terminated email. Both strings are stored in fixed buffers,
/// padded with zero bytes past the terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u32,
    pub username: [u8; USERNAME_SIZE],
    pub email: [u8; EMAIL_SIZE],
}

impl Row {
    pub fn new(id: u32, username: &str, email: &str) -> Result<Self, Error> {
        if username.len() > USERNAME_SIZE || email.len() > EMAIL_SIZE {
            return Err(Error::Parse("String is too long.".to_string()));
        }

        let mut row = Row {
            id,
            username: [0u8; USERNAME_SIZE],
            email: [0u8; EMAIL_SIZE],
        };
        row.username[..username.len()].copy_from_slice(username.as_bytes());
        row.email[..email.len()].copy_from_slice(email.as_bytes());
        Ok(row)
    }

    pub fn username(&self) -> String {
        let end = self.username.iter().position(|&b| b == 0).unwrap_or(USERNAME_SIZE);
        String::from_utf8_lossy(&self.username[..end]).into_owned()
    }

    pub fn email(&self) -> String {
        let end = self.email.iter().position(|&b| b == 0).unwrap_or(EMAIL_SIZE);
        String::from_utf8_lossy(&self.email[..end]).into_owned()
    }

    /// Copy this row's fields into `buf`, in the exact byte layout the
    /// node codec expects (no length prefixes, fixed offsets).
    pub fn serialize(&self, buf: &mut [u8]) {
        buf[ID_OFFSET..ID_OFFSET + ID_SIZE].copy_from_slice(&self.id.to_le_bytes());
        buf[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE].copy_from_slice(&self.username);
        buf[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE].copy_from_slice(&self.email);
    }

    pub fn deserialize(buf: &[u8]) -> Self {
        let mut id_bytes = [0u8; ID_SIZE];
        id_bytes.copy_from_slice(&buf[ID_OFFSET..ID_OFFSET + ID_SIZE]);
        let mut username = [0u8; USERNAME_SIZE];
        username.copy_from_slice(&buf[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE]);
        let mut email = [0u8; EMAIL_SIZE];
        email.copy_from_slice(&buf[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE]);

        Row {
            id: u32::from_le_bytes(id_bytes),
            username,
            email,
        }
    }
}

impl FromStr for Row {
    type Err = Error;

    /// Parses `insert <id> <username> <email>` argument text (the part
    /// after the `insert` keyword).
    fn from_str(s: &str) -> Result<Self, Error> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(Error::Parse(
                "Syntax error. Could not parse statement.".to_string(),
            ));
        }

        let id: i64 = parts[0]
            .parse()
            .map_err(|_| Error::Parse("Syntax error. Could not parse statement.".to_string()))?;
        if id < 0 {
            return Err(Error::Parse("ID must be positive.".to_string()));
        }

        Row::new(id as u32, parts[1], parts[2])
    }
}

impl std::fmt::Display for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.username(), self.email())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let row = Row::new(7, "alice", "alice@example.com").unwrap();
        let mut buf = [0u8; ROW_SIZE];
        row.serialize(&mut buf);
        let back = Row::deserialize(&buf);
        assert_eq!(row, back);
    }

    #[test]
    fn rejects_username_too_long() {
        let long = "a".repeat(USERNAME_SIZE + 1);
        assert!(matches!(
            Row::new(1, &long, "x@y.com"),
            Err(Error::Parse(msg)) if msg == "String is too long."
        ));
    }

    #[test]
    fn rejects_email_too_long() {
        let long = "a".repeat(EMAIL_SIZE + 1);
        assert!(matches!(
            Row::new(1, "bob", &long),
            Err(Error::Parse(msg)) if msg == "String is too long."
        ));
    }

    #[test]
    fn allows_maximum_length_strings() {
        let username = "a".repeat(USERNAME_SIZE);
        let email = "a".repeat(EMAIL_SIZE);
        assert!(Row::new(1, &username, &email).is_ok());
    }

    #[test]
    fn parses_insert_args() {
        let row: Row = "1 bob bob@example.com".parse().unwrap();
        assert_eq!(row.id, 1);
        assert_eq!(row.username(), "bob");
        assert_eq!(row.email(), "bob@example.com");
    }

    #[test]
    fn rejects_negative_id() {
        let err = "-1 bob bob@example.com".parse::<Row>().unwrap_err();
        assert_eq!(err.to_string(), "ID must be positive.");
    }

    #[test]
    fn allows_zero_id() {
        let row: Row = "0 bob bob@example.com".parse().unwrap();
        assert_eq!(row.id, 0);
    }
}
