//! Legacy transaction wire format.
//!
//! ```text
//! transaction = shortvec(signatures) message
//! message     = header(3 bytes) shortvec(account_keys) blockhash shortvec(instructions)
//! instruction = program_id_index shortvec(account_indexes) shortvec(data)
//! ```
//!
//! `shortvec` is a little-endian base-128 length prefix of at most three bytes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::{Signer, SigningKey};

use super::types::{Hash, Pubkey, Signature};
use crate::wallet::WalletError;

/// The system program.
pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new([0; 32]);

const SYSTEM_TRANSFER: u32 = 2;

/// Append `len` as a shortvec prefix.
pub fn encode_short_vec(len: usize, out: &mut Vec<u8>) {
    let mut rem = len;
    loop {
        #[allow(clippy::cast_possible_truncation)]
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(byte);
            return;
        }
        byte |= 0x80;
        out.push(byte);
    }
}

/// Decode a shortvec prefix. Returns `(len, bytes consumed)`.
#[must_use]
pub fn decode_short_vec(bytes: &[u8]) -> Option<(usize, usize)> {
    let mut len = 0usize;
    for (i, byte) in bytes.iter().take(3).enumerate() {
        len |= usize::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((len, i + 1));
        }
    }
    None
}

/// An account referenced by an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountMeta {
    /// Account address.
    pub pubkey: Pubkey,
    /// Whether the account must sign.
    pub is_signer: bool,
    /// Whether the instruction may modify the account.
    pub is_writable: bool,
}

impl AccountMeta {
    /// A writable account.
    #[must_use]
    pub const fn new(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    /// A read-only account.
    #[must_use]
    pub const fn new_readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// An instruction before account compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Program to invoke.
    pub program_id: Pubkey,
    /// Accounts passed to the program, in order.
    pub accounts: Vec<AccountMeta>,
    /// Opaque program input.
    pub data: Vec<u8>,
}

/// System program transfer of `lamports` from `from` to `to`.
#[must_use]
pub fn system_transfer(from: &Pubkey, to: &Pubkey, lamports: u64) -> Instruction {
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());
    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![AccountMeta::new(*from, true), AccountMeta::new(*to, false)],
        data,
    }
}

/// Signature and read-only counts of a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageHeader {
    /// Number of leading account keys that must sign.
    pub num_required_signatures: u8,
    /// Trailing read-only keys among the signers.
    pub num_readonly_signed_accounts: u8,
    /// Trailing read-only keys among the non-signers.
    pub num_readonly_unsigned_accounts: u8,
}

/// An instruction with accounts replaced by indexes into the key list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    /// Index of the program id.
    pub program_id_index: u8,
    /// Indexes of the instruction's accounts.
    pub accounts: Vec<u8>,
    /// Opaque program input.
    pub data: Vec<u8>,
}

/// A legacy message: the signed part of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Counts describing `account_keys`.
    pub header: MessageHeader,
    /// Signers first (writable before read-only), then non-signers.
    pub account_keys: Vec<Pubkey>,
    /// Recent blockhash the transaction expires with.
    pub recent_blockhash: Hash,
    /// Compiled instructions.
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compile `instructions` with `payer` as the fee payer.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Transaction`] if more than 256 accounts are
    /// referenced.
    pub fn new(
        instructions: &[Instruction],
        payer: &Pubkey,
        recent_blockhash: Hash,
    ) -> Result<Self, WalletError> {
        // Merged by key in first-seen order.
        let mut metas: Vec<AccountMeta> = vec![AccountMeta::new(*payer, true)];
        let mut upsert = |meta: AccountMeta| {
            if let Some(existing) = metas.iter_mut().find(|m| m.pubkey == meta.pubkey) {
                existing.is_signer |= meta.is_signer;
                existing.is_writable |= meta.is_writable;
            } else {
                metas.push(meta);
            }
        };
        for ix in instructions {
            for meta in &ix.accounts {
                upsert(*meta);
            }
            upsert(AccountMeta::new_readonly(ix.program_id, false));
        }

        // Stable sort keeps the payer first.
        metas.sort_by_key(|m| match (m.is_signer, m.is_writable) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        });

        let count = |signer: bool, writable: bool| {
            metas
                .iter()
                .filter(|m| m.is_signer == signer && m.is_writable == writable)
                .count()
        };
        let to_u8 = |n: usize| {
            u8::try_from(n)
                .map_err(|_| WalletError::transaction("message references too many accounts"))
        };
        let header = MessageHeader {
            num_required_signatures: to_u8(count(true, true) + count(true, false))?,
            num_readonly_signed_accounts: to_u8(count(true, false))?,
            num_readonly_unsigned_accounts: to_u8(count(false, false))?,
        };

        let account_keys: Vec<Pubkey> = metas.iter().map(|m| m.pubkey).collect();
        let index_of = |key: &Pubkey| {
            account_keys
                .iter()
                .position(|k| k == key)
                .map_or_else(|| Err(WalletError::transaction("account missing")), to_u8)
        };
        let instructions = instructions
            .iter()
            .map(|ix| -> Result<CompiledInstruction, WalletError> {
                Ok(CompiledInstruction {
                    program_id_index: index_of(&ix.program_id)?,
                    accounts: ix
                        .accounts
                        .iter()
                        .map(|m| index_of(&m.pubkey))
                        .collect::<Result<_, WalletError>>()?,
                    data: ix.data.clone(),
                })
            })
            .collect::<Result<_, WalletError>>()?;

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        })
    }

    /// The keys that must sign, in signature order.
    #[must_use]
    pub fn signers(&self) -> &[Pubkey] {
        let n = usize::from(self.header.num_required_signatures).min(self.account_keys.len());
        &self.account_keys[..n]
    }

    /// Wire encoding; these are the bytes every signer signs.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = vec![
            self.header.num_required_signatures,
            self.header.num_readonly_signed_accounts,
            self.header.num_readonly_unsigned_accounts,
        ];
        encode_short_vec(self.account_keys.len(), &mut out);
        for key in &self.account_keys {
            out.extend_from_slice(key.as_ref());
        }
        out.extend_from_slice(self.recent_blockhash.as_ref());
        encode_short_vec(self.instructions.len(), &mut out);
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            encode_short_vec(ix.accounts.len(), &mut out);
            out.extend_from_slice(&ix.accounts);
            encode_short_vec(ix.data.len(), &mut out);
            out.extend_from_slice(&ix.data);
        }
        out
    }

    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, WalletError> {
        let header_bytes = reader.take(3)?;
        if header_bytes[0] & 0x80 != 0 {
            return Err(WalletError::invalid_argument(
                "versioned messages are not supported",
            ));
        }
        let header = MessageHeader {
            num_required_signatures: header_bytes[0],
            num_readonly_signed_accounts: header_bytes[1],
            num_readonly_unsigned_accounts: header_bytes[2],
        };
        let key_count = reader.short_vec()?;
        let account_keys = (0..key_count)
            .map(|_| Pubkey::try_from_slice(reader.take(Pubkey::LEN)?))
            .collect::<Result<_, _>>()?;
        let recent_blockhash = Hash::try_from_slice(reader.take(Hash::LEN)?)?;
        let ix_count = reader.short_vec()?;
        let instructions = (0..ix_count)
            .map(|_| -> Result<CompiledInstruction, WalletError> {
                let program_id_index = reader.take(1)?[0];
                let n = reader.short_vec()?;
                let accounts = reader.take(n)?.to_vec();
                let n = reader.short_vec()?;
                let data = reader.take(n)?.to_vec();
                Ok(CompiledInstruction {
                    program_id_index,
                    accounts,
                    data,
                })
            })
            .collect::<Result<_, WalletError>>()?;
        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        })
    }
}

/// A message plus one signature slot per required signer.
///
/// Unfilled slots hold the all-zero signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Signatures in signer order.
    pub signatures: Vec<Signature>,
    /// The signed message.
    pub message: Message,
}

impl Transaction {
    /// A transaction with every signature slot empty.
    #[must_use]
    pub fn new_unsigned(message: Message) -> Self {
        Self {
            signatures: vec![Signature::default(); message.signers().len()],
            message,
        }
    }

    /// The transaction id: the fee payer's signature.
    #[must_use]
    pub fn signature(&self) -> Option<&Signature> {
        self.signatures
            .first()
            .filter(|s| **s != Signature::default())
    }

    /// Whether every signature slot is filled.
    #[must_use]
    pub fn is_fully_signed(&self) -> bool {
        !self.signatures.is_empty() && self.signatures.iter().all(|s| *s != Signature::default())
    }

    /// Sign with `key`, filling the slot of its public key.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Signing`] if `key` is not a required signer.
    pub fn sign(&mut self, key: &SigningKey) -> Result<(), WalletError> {
        let pubkey = Pubkey::new(key.verifying_key().to_bytes());
        let index = self
            .message
            .signers()
            .iter()
            .position(|k| *k == pubkey)
            .ok_or_else(|| {
                WalletError::signing(format!("{pubkey} is not a signer of this transaction"))
            })?;
        let signature = key.sign(&self.message.serialize());
        if self.signatures.len() < self.message.signers().len() {
            self.signatures
                .resize(self.message.signers().len(), Signature::default());
        }
        self.signatures[index] = Signature::new(signature.to_bytes());
        Ok(())
    }

    /// Wire encoding.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_short_vec(self.signatures.len(), &mut out);
        for sig in &self.signatures {
            out.extend_from_slice(sig.as_ref());
        }
        out.extend_from_slice(&self.message.serialize());
        out
    }

    /// Decode the wire encoding.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidArgument`] for truncated or trailing
    /// input and for versioned transactions.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, WalletError> {
        let mut reader = Reader { bytes, pos: 0 };
        let n = reader.short_vec()?;
        let signatures = (0..n)
            .map(|_| Signature::try_from_slice(reader.take(Signature::LEN)?))
            .collect::<Result<_, _>>()?;
        let message = Message::deserialize(&mut reader)?;
        if reader.pos != bytes.len() {
            return Err(WalletError::invalid_argument(format!(
                "{} trailing bytes after transaction",
                bytes.len() - reader.pos
            )));
        }
        Ok(Self {
            signatures,
            message,
        })
    }

    /// Base64 of the wire encoding, as RPC nodes and custodians expect.
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.serialize())
    }

    /// Decode a base64 wire encoding.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidArgument`] for bad base64 or a bad
    /// encoding.
    pub fn from_base64(encoded: &str) -> Result<Self, WalletError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| WalletError::invalid_argument(format!("invalid base64 transaction: {e}")))?;
        Self::deserialize(&bytes)
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], WalletError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| WalletError::invalid_argument("truncated transaction"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn short_vec(&mut self) -> Result<usize, WalletError> {
        let (len, used) = decode_short_vec(&self.bytes[self.pos..])
            .ok_or_else(|| WalletError::invalid_argument("malformed length prefix"))?;
        self.pos += used;
        Ok(len)
    }
}
