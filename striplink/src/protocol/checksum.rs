//! Frame checksum shared by both protocol roles.
//!
//! The receiver hashes the payload lines it buffered; the sender hashes the
//! message it is about to send. Both go through [`normalize_and_checksum`]
//! so the two sides cannot drift apart: CRC-32 (IEEE) over the concatenated
//! UTF-8 bytes of the lines, without separators and without trimming.

/// CRC-32 over the concatenation of `lines`.
pub fn normalize_and_checksum<I, S>(lines: I) -> u32
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = crc32fast::Hasher::new();
    for line in lines {
        hasher.update(line.as_ref().as_bytes());
    }
    hasher.finalize()
}

/// Split a raw outgoing message into the lines the receiver will buffer.
pub fn message_lines(message: &str) -> impl Iterator<Item = &str> {
    message
        .split(['\n', '\r'])
        .filter(|line| !line.is_empty())
}

/// Checksum the receiver will report for `message`.
pub fn message_checksum(message: &str) -> u32 {
    normalize_and_checksum(message_lines(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_check_value() {
        assert_eq!(normalize_and_checksum(["123456789"]), 0xCBF4_3926);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize_and_checksum(Vec::<String>::new()), 0);
        assert_eq!(message_checksum(""), 0);
        assert_eq!(message_checksum("\n\r\n"), 0);
    }

    #[test]
    fn test_sender_and_receiver_agree() {
        let sender = message_checksum("HELLO\nWORLD");
        let receiver = normalize_and_checksum(vec!["HELLO".to_string(), "WORLD".to_string()]);
        assert_eq!(sender, receiver);
        assert_eq!(sender, normalize_and_checksum(["HELLOWORLD"]));
    }

    #[test]
    fn test_message_lines_strip_every_separator() {
        let lines: Vec<&str> = message_lines("\r\nA\n\rB\r\r\nC\n").collect();
        assert_eq!(lines, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_whitespace_is_significant() {
        assert_ne!(message_checksum(" HELLO"), message_checksum("HELLO"));
    }

    #[test]
    fn test_blank_lines_count() {
        assert_ne!(message_checksum("A\n   \nB"), message_checksum("A\nB"));
    }
}
