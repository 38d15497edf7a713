//! MIME message parsing: walking parts and pulling out attachment payloads.

use mail_parser::decoders::base64::base64_decode;
use mail_parser::decoders::quoted_printable::quoted_printable_decode;
use mail_parser::{Encoding, Message, MessageParser, MessagePart, MimeHeaders, PartType};

use crate::error::{MailError, Result};

/// Maximum depth for descending into attached `message/rfc822` parts
/// (to prevent stack overflow on adversarial input).
const MAX_DEPTH: usize = 10;

/// A decoded payload taken from a part that carries a `Content-Disposition`.
#[derive(Debug, Clone)]
pub struct ExtractedPart {
    /// Filename from the disposition or content-type parameters, if any.
    pub filename: Option<String>,
    /// MIME content type (e.g. `"image/jpeg"`).
    pub content_type: String,
    /// `true` for `Content-Disposition: inline`.
    pub is_inline: bool,
    /// Transfer-decoded payload. Text parts keep their original charset.
    pub data: Vec<u8>,
}

/// A parsed digest email: the subject for logging plus its extracted parts.
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    pub subject: Option<String>,
    pub parts: Vec<ExtractedPart>,
}

/// Parse a complete raw RFC 822 message and collect every non-multipart part
/// that has a `Content-Disposition` header, in document order.
///
/// Attached messages are searched recursively.
pub fn parse_message(raw_message: &[u8]) -> Result<ParsedMessage> {
    let message_bytes = skip_bom(raw_message);

    let parser = MessageParser::default();
    let msg = parser
        .parse(message_bytes)
        .ok_or_else(|| MailError::MimeError("Failed to parse message".into()))?;

    let mut parts = Vec::new();
    collect_disposition_parts(&msg, &mut parts, 0);

    Ok(ParsedMessage {
        subject: msg.subject().map(String::from),
        parts,
    })
}

fn collect_disposition_parts(
    msg: &Message<'_>,
    out: &mut Vec<ExtractedPart>,
    depth: usize,
) {
    if depth > MAX_DEPTH {
        return;
    }

    for part in &msg.parts {
        match &part.body {
            PartType::Multipart(_) => continue,
            PartType::Message(inner) => {
                collect_disposition_parts(inner, out, depth + 1);
                continue;
            }
            _ => {}
        }

        let Some(disposition) = part.content_disposition() else {
            continue;
        };

        let content_type = part
            .content_type()
            .map(|ct: &mail_parser::ContentType| {
                let main = ct.ctype();
                match ct.subtype() {
                    Some(sub) => format!("{main}/{sub}"),
                    None => main.to_string(),
                }
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());

        out.push(ExtractedPart {
            filename: part.attachment_name().map(String::from),
            content_type,
            is_inline: disposition.ctype().eq_ignore_ascii_case("inline"),
            data: payload(msg, part),
        });
    }
}

/// The part body with only the transfer encoding undone.
///
/// mail-parser converts text bodies to UTF-8; the bytes as sent are taken
/// from the raw message instead.
fn payload(msg: &Message<'_>, part: &MessagePart<'_>) -> Vec<u8> {
    if !matches!(part.body, PartType::Text(_) | PartType::Html(_)) {
        return part.contents().to_vec();
    }
    let raw = msg
        .raw_message
        .get(part.raw_body_offset()..part.raw_end_offset())
        .unwrap_or_default();
    let decoded = match part.encoding {
        Encoding::Base64 => base64_decode(raw),
        Encoding::QuotedPrintable => quoted_printable_decode(raw),
        Encoding::None => Some(raw.to_vec()),
    };
    decoded.unwrap_or_else(|| part.contents().to_vec())
}

/// Strip a UTF-8 byte order mark some servers leave in front of the message.
fn skip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}
