//! Reassembly of chunked messages.

use tracing::debug;

use courier_types::{ContentHash, Envelope, MessageType, MultiPartMessagePart};

use crate::error::{FactoryError, FactoryResult};

/// Reassemble the original content from the part envelopes of one multipart
/// message.
///
/// The input may arrive in any order. Validation stops on the first
/// violation and never returns partial data:
///
/// 1. every envelope is a MULTIPART_MESSAGE_PART;
/// 2. all parts share one message id;
/// 3. all parts share one complete-message hash;
/// 4. sorted by part number, the parts are exactly `1..=total_parts` with a
///    consistent total, no gaps or duplicates;
/// 5. the concatenated content hashes to the complete-message hash.
pub fn reconstruct_content(envelopes: &[Envelope]) -> FactoryResult<Vec<u8>> {
    if envelopes.is_empty() {
        return Err(FactoryError::NoEnvelopes);
    }

    let mut parts = Vec::with_capacity(envelopes.len());
    for (index, envelope) in envelopes.iter().enumerate() {
        if envelope.message_type != MessageType::MultiPartMessagePart {
            return Err(FactoryError::NotMultipart {
                index,
                found: envelope.message_type,
            });
        }
        parts.push(MultiPartMessagePart::from_bytes(&envelope.message)?);
    }

    let message_id = parts[0].message_id.clone();
    let complete_hash = parts[0].complete_message_hash;
    let total_parts = parts[0].total_parts;

    for part in &parts {
        if part.message_id != message_id {
            return Err(FactoryError::MessageIdMismatch {
                part_number: part.part_number,
                expected: message_id,
                actual: part.message_id.clone(),
            });
        }
        if part.complete_message_hash != complete_hash {
            return Err(FactoryError::MessageHashMismatch {
                part_number: part.part_number,
                expected: complete_hash.to_hex(),
                actual: part.complete_message_hash.to_hex(),
            });
        }
        if part.total_parts != total_parts {
            return Err(FactoryError::TotalPartsMismatch {
                part_number: part.part_number,
                expected: total_parts,
                actual: part.total_parts,
            });
        }
    }

    // Strict equality: a surplus part is just as invalid as a missing one.
    if parts.len() as u32 != total_parts {
        return Err(FactoryError::PartCountMismatch {
            expected: total_parts,
            actual: parts.len() as u32,
        });
    }

    parts.sort_by_key(|part| part.part_number);
    for (index, part) in parts.iter().enumerate() {
        let expected = index as u32 + 1;
        if part.part_number != expected {
            return Err(FactoryError::PartSequence {
                expected,
                actual: part.part_number,
            });
        }
    }

    let mut content = Vec::with_capacity(parts.iter().map(|p| p.content.len()).sum());
    for part in &parts {
        content.extend_from_slice(&part.content);
    }

    let computed = ContentHash::of(&content);
    if computed != complete_hash {
        return Err(FactoryError::ReconstructedHashMismatch {
            expected: complete_hash.to_hex(),
            computed: computed.to_hex(),
        });
    }

    debug!(
        message_id = %message_id,
        parts = parts.len(),
        bytes = content.len(),
        "multipart message reconstructed"
    );
    Ok(content)
}
