use crate::constants::*;
use crate::error::KrbError;

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut};
use aes::Aes256;
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use rand::Rng;
use sha1::Sha1;
use tracing::error;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

type Aes256Block = GenericArray<u8, <aes::Aes256 as aes::cipher::BlockSizeUser>::BlockSize>;
type Aes256Key = GenericArray<u8, <aes::Aes256 as aes::cipher::KeySizeUser>::KeySize>;

type HmacSha1 = Hmac<Sha1>;
type HmacMd5 = Hmac<Md5>;

// RFC3961 5.3 derived key constants.
const DK_CHECKSUM: u8 = 0x99;
const DK_ENCRYPTION: u8 = 0xAA;
const DK_INTEGRITY: u8 = 0x55;

/// Given the users passphrase and salt (realm + client name) derive the base key. Only
/// the tests need this, service keys always come from a keytab.
#[cfg(test)]
pub(crate) fn derive_key_aes256_cts_hmac_sha1_96(
    passphrase: &[u8],
    salt: &[u8],
    iter_count: u32,
) -> Result<[u8; AES_256_KEY_LEN], KrbError> {
    let mut buf = [0u8; AES_256_KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha1>(passphrase, salt, iter_count, &mut buf);

    Ok(dk_aes_256(&buf, b"kerberos"))
}

/// RFC3961 5.1 n-fold. Replicates `input` to the lcm of both lengths, rotating each
/// copy right by 13 bits, then adds the `out_len` sized chunks with ones complement
/// addition.
pub(crate) fn n_fold(input: &[u8], out_len: usize) -> Vec<u8> {
    let mut out = vec![0u8; out_len];
    let in_len = input.len();
    if in_len == 0 || out_len == 0 {
        return out;
    }

    let lcm = out_len * in_len / gcd(out_len, in_len);
    let in_bits = in_len << 3;
    let mut carry: u32 = 0;

    for i in (0..lcm).rev() {
        // The most significant bit of the input that lands in this output byte.
        let msbit = ((in_bits - 1)
            + ((in_bits + 13) * (i / in_len))
            + ((in_len - (i % in_len)) << 3))
            % in_bits;

        let hi = input[((in_len - 1) - (msbit >> 3)) % in_len] as u32;
        let lo = input[(in_len - (msbit >> 3)) % in_len] as u32;
        carry += (((hi << 8) | lo) >> ((msbit & 7) + 1)) & 0xff;

        carry += out[i % out_len] as u32;
        out[i % out_len] = (carry & 0xff) as u8;
        carry >>= 8;
    }

    // End around carry.
    if carry != 0 {
        for byte in out.iter_mut().rev() {
            carry += *byte as u32;
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
    }

    out
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// RFC3961 DK(key, constant) for a 256 bit key. The n-folded constant is encrypted,
/// then the output block is encrypted again to fill out the second half.
fn dk_aes_256(key: &[u8; AES_256_KEY_LEN], constant: &[u8]) -> [u8; AES_256_KEY_LEN] {
    let mut folded = [0u8; AES_BLOCK_SIZE];
    folded.copy_from_slice(&n_fold(constant, AES_BLOCK_SIZE));

    let mut out_buf = [0u8; AES_256_KEY_LEN];
    let (lower, upper) = out_buf.split_at_mut(AES_BLOCK_SIZE);
    dk_encrypt_aes_256_cbc(key.into(), &folded.into(), lower.into());
    dk_encrypt_aes_256_cbc(key.into(), (&*lower).into(), upper.into());
    out_buf
}

fn dk_usage_aes_256(
    key: &[u8; AES_256_KEY_LEN],
    key_usage: i32,
    purpose: u8,
) -> [u8; AES_256_KEY_LEN] {
    let mut constant = [0u8; 5];
    constant[..4].copy_from_slice(&key_usage.to_be_bytes());
    constant[4] = purpose;
    dk_aes_256(key, &constant)
}

fn dk_encrypt_aes_256_cbc(key: &Aes256Key, plaintext: &Aes256Block, out_buf: &mut Aes256Block) {
    use aes::cipher::KeyIvInit;
    Aes256CbcEnc::new(key, &IV_ZERO.into()).encrypt_block_b2b_mut(plaintext, out_buf)
}

fn hmac_sha1_96(key: &[u8], parts: &[&[u8]]) -> Result<HmacSha1, KrbError> {
    let mut mac = HmacSha1::new_from_slice(key).map_err(|_| KrbError::InvalidHmacSha1Key)?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac)
}

/// Given the base key and the key_usage value decrypt and authenticate the
/// provided ciphertext.
pub(crate) fn decrypt_aes256_cts_hmac_sha1_96(
    key: &[u8; AES_256_KEY_LEN],
    ciphertext: &[u8],
    key_usage: i32,
) -> Result<Vec<u8>, KrbError> {
    let Some((ciphertext, msg_hmac)) = ciphertext.split_last_chunk::<SHA1_HMAC_LEN>() else {
        return Err(KrbError::InsufficientData);
    };

    if ciphertext.is_empty() {
        return Err(KrbError::MessageEmpty);
    };

    let ke = dk_usage_aes_256(key, key_usage, DK_ENCRYPTION);
    let ki = dk_usage_aes_256(key, key_usage, DK_INTEGRITY);

    let mut plaintext = decrypt_aes256_cts(&ke, ciphertext)?;

    // The truncated comparison is constant time.
    hmac_sha1_96(&ki, &[plaintext.as_slice()])?
        .verify_truncated_left(msg_hmac)
        .map_err(|_| {
            error!(?key_usage, "message authentication failed");
            KrbError::MessageAuthenticationFailed
        })?;

    // The first block is a "confounder" or a random block that exists to setup
    // the IV for the next block. Ignore it.
    Ok(plaintext.split_off(AES_BLOCK_SIZE))
}

/// Given the base key and the key_usage value encrypt and authenticate the
/// provided plaintext.
pub(crate) fn encrypt_aes256_cts_hmac_sha1_96(
    key: &[u8; AES_256_KEY_LEN],
    plaintext: &[u8],
    key_usage: i32,
) -> Result<Vec<u8>, KrbError> {
    if plaintext.is_empty() {
        return Err(KrbError::PlaintextEmpty);
    };
    let ke = dk_usage_aes_256(key, key_usage, DK_ENCRYPTION);
    let ki = dk_usage_aes_256(key, key_usage, DK_INTEGRITY);

    let mut confounder = [0u8; AES_BLOCK_SIZE];
    rand::rng().fill(&mut confounder);

    let my_hmac = hmac_sha1_96(&ki, &[confounder.as_slice(), plaintext])?
        .finalize()
        .into_bytes();

    let mut ciphertext = vec![0u8; AES_BLOCK_SIZE + plaintext.len() + SHA1_HMAC_LEN];
    let (cipher, hmac) = ciphertext.split_at_mut(AES_BLOCK_SIZE + plaintext.len());

    encrypt_aes256_cts(&ke, &confounder, plaintext, cipher)?;
    hmac.copy_from_slice(&my_hmac[..SHA1_HMAC_LEN]);

    Ok(ciphertext)
}

fn encrypt_aes256_cts(
    key: &[u8; AES_256_KEY_LEN],
    confounder: &[u8; AES_BLOCK_SIZE],
    plaintext: &[u8],
    ciphertext: &mut [u8],
) -> Result<(), KrbError> {
    use aes::cipher::{KeyInit, KeyIvInit};

    let plaintext_chunks = plaintext.chunks(AES_BLOCK_SIZE);
    let mut ciphertext_chunks = ciphertext.chunks_mut(AES_BLOCK_SIZE);

    // The first ciphertext chunk holds the confounder.
    let mut previous_chunk = ciphertext_chunks
        .next()
        .ok_or(KrbError::InsufficientData)?;

    let mut chunks = std::iter::zip(ciphertext_chunks, plaintext_chunks);
    // The last chunk may be short and needs the CTS handling.
    let (c_n_chunk, p_n_star_chunk) = chunks.next_back().ok_or(KrbError::InsufficientData)?;

    let mut cipher = Aes256CbcEnc::new(key.into(), &IV_ZERO.into());

    let mut previous_block = *confounder;
    cipher.encrypt_block_mut((&mut previous_block).into());
    previous_chunk.copy_from_slice(&previous_block);

    for (cipher_chunk, plain_chunk) in chunks {
        previous_block.copy_from_slice(plain_chunk);
        cipher.encrypt_block_mut((&mut previous_block).into());
        cipher_chunk.copy_from_slice(&previous_block);
        previous_chunk = cipher_chunk;
    }

    // previous_chunk and previous_block both hold Cn-1 now.
    let c_n1_chunk = previous_chunk;
    let c_n1_block = previous_block;
    let p_n_star_len = p_n_star_chunk.len();

    // Pn is zero padded, and that padding XOR Cn-1 is just the tail of Cn-1.
    let mut c_n_block: Aes256Block = [0u8; AES_BLOCK_SIZE].into();
    let (p_n_star, c_n_star_2) = c_n_block.split_at_mut(p_n_star_len);
    let (c_n1_star, c_n1_star_2) = c_n1_block.split_at(p_n_star_len);
    for ((out, p), c) in p_n_star.iter_mut().zip(p_n_star_chunk).zip(c_n1_star) {
        *out = p ^ c;
    }
    c_n_star_2.copy_from_slice(c_n1_star_2);

    let mut raw_cipher = Aes256::new(key.into());
    raw_cipher.encrypt_block_mut(&mut c_n_block);

    // CS3 always swaps the final two blocks.
    c_n1_chunk.copy_from_slice(&c_n_block);
    c_n_chunk.copy_from_slice(c_n1_star);

    Ok(())
}

fn decrypt_aes256_cts(key: &[u8; AES_256_KEY_LEN], ciphertext: &[u8]) -> Result<Vec<u8>, KrbError> {
    use aes::cipher::{KeyInit, KeyIvInit};

    let ctxt_len = ciphertext.len();

    // There is always at least the confounder block and one block of data.
    if ctxt_len <= AES_BLOCK_SIZE {
        return Err(KrbError::CtsCiphertextInvalid);
    }

    let mut cipher = Aes256CbcDec::new(key.into(), &IV_ZERO.into());
    let mut plaintext = vec![0u8; ctxt_len];

    let plaintext_chunks = plaintext.chunks_mut(AES_BLOCK_SIZE);
    let ciphertext_chunks = ciphertext.chunks(AES_BLOCK_SIZE);

    let mut chunks = std::iter::zip(ciphertext_chunks, plaintext_chunks);

    // The last two blocks are swapped, the final one may be short.
    let (c_n1_chunk, p_n_chunk) = chunks.next_back().ok_or(KrbError::InsufficientData)?;
    let (c_n_chunk, p_n1_chunk) = chunks.next_back().ok_or(KrbError::InsufficientData)?;

    // Everything before is plain CBC.
    for (cipher_chunk, plain_chunk) in chunks {
        cipher.decrypt_block_b2b_mut(cipher_chunk.into(), plain_chunk.into())
    }

    // Decrypting Cn with the raw cipher gives Z. Z* XOR Cn-1* is Pn, and Cn-1* with
    // Z** appended is the real Cn-1 to finish the CBC chain with.
    let mut z: Aes256Block = [0u8; AES_BLOCK_SIZE].into();
    let mut raw_cipher = Aes256::new(key.into());
    raw_cipher.decrypt_block_b2b_mut(c_n_chunk.into(), &mut z);

    let (z_star, z_star_2) = z.split_at(c_n1_chunk.len());
    for ((out, c), z) in p_n_chunk.iter_mut().zip(c_n1_chunk).zip(z_star) {
        *out = c ^ z;
    }

    let mut cn1_block: Aes256Block = [0u8; AES_BLOCK_SIZE].into();
    let (cn1_block_star, cn1_block_star_2) = cn1_block.split_at_mut(c_n1_chunk.len());
    cn1_block_star.copy_from_slice(c_n1_chunk);
    cn1_block_star_2.copy_from_slice(z_star_2);

    // The cbc cipher still carries Cn-2 as its chaining state.
    cipher.decrypt_block_b2b_mut(&cn1_block, p_n1_chunk.into());

    Ok(plaintext)
}

pub(crate) fn checksum_hmac_sha1_96_aes256(
    plaintext: &[u8],
    key: &[u8; AES_256_KEY_LEN],
    key_usage: i32,
) -> Result<Vec<u8>, KrbError> {
    if plaintext.is_empty() {
        return Err(KrbError::PlaintextEmpty);
    };

    let kc = dk_usage_aes_256(key, key_usage, DK_CHECKSUM);
    let my_hmac = hmac_sha1_96(&kc, &[plaintext])?.finalize().into_bytes();

    // Truncate to 96 bits.
    Ok(my_hmac[..SHA1_HMAC_LEN].to_vec())
}

/// RFC4757 keyed checksum, which MS-SFU mandates for PA-FOR-USER regardless of the
/// session key type.
pub(crate) fn checksum_hmac_md5(
    plaintext: &[u8],
    key: &[u8],
    key_usage: i32,
) -> Result<Vec<u8>, KrbError> {
    let mut mac = HmacMd5::new_from_slice(key).map_err(|_| KrbError::InvalidHmacMd5Key)?;
    mac.update(b"signaturekey\0");
    let ksign = mac.finalize().into_bytes();

    let mut hasher = Md5::new();
    hasher.update(key_usage.to_le_bytes());
    hasher.update(plaintext);
    let tmp = hasher.finalize();

    let mut mac = HmacMd5::new_from_slice(&ksign).map_err(|_| KrbError::InvalidHmacMd5Key)?;
    mac.update(&tmp);
    Ok(mac.finalize().into_bytes().to_vec())
}
