use pocc_types::{Block, BlockVersion, Transaction, TxKind, TxVersion};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("trailing bytes after record")]
    TrailingBytes,
    #[error("unknown record version")]
    InvalidVersion,
    #[error("unknown tag {0}")]
    InvalidTag(u8),
    #[error("length does not fit in u32")]
    LengthOverflow,
    #[error("string field is not valid utf-8")]
    InvalidUtf8,
}

fn take<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8], CodecError> {
    if input.len() < n {
        return Err(CodecError::UnexpectedEof);
    }
    let (a, b) = input.split_at(n);
    *input = b;
    Ok(a)
}

fn read_u8(input: &mut &[u8]) -> Result<u8, CodecError> {
    Ok(take(input, 1)?[0])
}

fn read_u32_le(input: &mut &[u8]) -> Result<u32, CodecError> {
    let b = take(input, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_u64_le(input: &mut &[u8]) -> Result<u64, CodecError> {
    let b = take(input, 8)?;
    Ok(u64::from_le_bytes([
        b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
    ]))
}

fn read_f64_le(input: &mut &[u8]) -> Result<f64, CodecError> {
    Ok(f64::from_bits(read_u64_le(input)?))
}

fn read_string(input: &mut &[u8]) -> Result<String, CodecError> {
    let len = read_u32_le(input)? as usize;
    let b = take(input, len)?;
    String::from_utf8(b.to_vec()).map_err(|_| CodecError::InvalidUtf8)
}

fn write_u8(out: &mut Vec<u8>, v: u8) {
    out.push(v);
}

fn write_u32_le(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_u64_le(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Amounts and scores are hashed by their IEEE-754 bit pattern.
fn write_f64_le(out: &mut Vec<u8>, v: f64) {
    write_u64_le(out, v.to_bits());
}

fn write_len(out: &mut Vec<u8>, len: usize) -> Result<(), CodecError> {
    let len_u32: u32 = len.try_into().map_err(|_| CodecError::LengthOverflow)?;
    write_u32_le(out, len_u32);
    Ok(())
}

fn write_bytes(out: &mut Vec<u8>, b: &[u8]) -> Result<(), CodecError> {
    write_len(out, b.len())?;
    out.extend_from_slice(b);
    Ok(())
}

/// Length-prefixed concatenation of opaque fields, in the given order.
///
/// Used wherever a digest must be taken over several strings without
/// ambiguity between `("ab", "c")` and `("a", "bc")`.
pub fn encode_fields(fields: &[&[u8]]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    for f in fields {
        write_bytes(&mut out, f)?;
    }
    Ok(out)
}

fn write_tx_v1(out: &mut Vec<u8>, tx: &Transaction) -> Result<(), CodecError> {
    write_u8(out, tx.version as u8);
    write_bytes(out, tx.sender.as_bytes())?;
    write_bytes(out, tx.recipient.as_bytes())?;
    write_f64_le(out, tx.amount);
    write_u8(out, tx.kind as u8);
    match &tx.extra_data {
        None => write_u8(out, 0),
        Some(extra) => {
            write_u8(out, 1);
            write_bytes(out, extra.as_bytes())?;
        }
    }
    write_u64_le(out, tx.timestamp);
    Ok(())
}

fn read_tx_v1(input: &mut &[u8]) -> Result<Transaction, CodecError> {
    let version = TxVersion::from_u8(read_u8(input)?).ok_or(CodecError::InvalidVersion)?;
    let sender = read_string(input)?;
    let recipient = read_string(input)?;
    let amount = read_f64_le(input)?;
    let tag = read_u8(input)?;
    let kind = TxKind::from_u8(tag).ok_or(CodecError::InvalidTag(tag))?;
    let extra_data = match read_u8(input)? {
        0 => None,
        1 => Some(read_string(input)?),
        other => return Err(CodecError::InvalidTag(other)),
    };
    let timestamp = read_u64_le(input)?;

    Ok(Transaction {
        version,
        sender,
        recipient,
        amount,
        kind,
        extra_data,
        timestamp,
    })
}

/// Canonical encoding of a transaction.
/// Field order is CONSENSUS-RELEVANT. Changing it changes every block hash.
pub fn encode_tx_v1(tx: &Transaction) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    write_tx_v1(&mut out, tx)?;
    Ok(out)
}

pub fn decode_tx_v1(bytes: &[u8]) -> Result<Transaction, CodecError> {
    let mut input = bytes;
    let tx = read_tx_v1(&mut input)?;
    if !input.is_empty() {
        return Err(CodecError::TrailingBytes);
    }
    Ok(tx)
}

/// Canonical encoding of a block's hashed fields. `block.hash` is excluded.
pub fn encode_block_v1(block: &Block) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    write_u8(&mut out, block.version as u8);
    write_u64_le(&mut out, block.index);
    write_u64_le(&mut out, block.timestamp);
    write_len(&mut out, block.transactions.len())?;
    for tx in &block.transactions {
        write_tx_v1(&mut out, tx)?;
    }
    write_u64_le(&mut out, block.proof);
    write_bytes(&mut out, block.previous_hash.as_bytes())?;
    Ok(out)
}

/// Decode a block and recompute its hash from the decoded fields.
pub fn decode_block_v1(bytes: &[u8]) -> Result<Block, CodecError> {
    let mut input = bytes;
    let version = BlockVersion::from_u8(read_u8(&mut input)?).ok_or(CodecError::InvalidVersion)?;
    let index = read_u64_le(&mut input)?;
    let timestamp = read_u64_le(&mut input)?;
    let count = read_u32_le(&mut input)? as usize;

    // Never trust `count` for the allocation; it is attacker-controlled.
    let mut transactions = Vec::with_capacity(count.min(input.len()));
    for _ in 0..count {
        transactions.push(read_tx_v1(&mut input)?);
    }
    let proof = read_u64_le(&mut input)?;
    let previous_hash = read_string(&mut input)?;

    if !input.is_empty() {
        return Err(CodecError::TrailingBytes);
    }

    let mut block = Block {
        version,
        index,
        timestamp,
        transactions,
        proof,
        previous_hash,
        hash: String::new(),
    };
    block.hash = block_hash(&block)?;
    Ok(block)
}

/// Helper: block hash as lowercase hex of blake3(encode_block_v1(block)).
pub fn block_hash(block: &Block) -> Result<String, CodecError> {
    let bytes = encode_block_v1(block)?;
    Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
}
